// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The worker pool and its state machine.
//!
//! The three states are three types.  An idle `Scheduler` can only be
//! turned into a `Run` by `start`, and a `Run` can only be turned
//! back into a `Scheduler` by waiting for every one of its workers to
//! exit.  There is no way to hold a second `Run` while the first one's
//! workers are alive, so a new generation never overlaps an old one.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, warn};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::frame::Frame;
use crate::worker::{self, Role, Tuning, WorkerReport};

/// Where the pool is in its lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// No workers.
    Idle,
    /// Workers are filling a frame.
    Running,
    /// Workers have been told to stop and have not all exited yet.
    Cancelling,
}

/// An idle worker pool.
#[derive(Debug)]
pub struct Scheduler {
    stochastic_workers: usize,
    tuning: Tuning,
    generation: u64,
}

impl Scheduler {
    /// An idle pool sized by `config`.
    pub fn new(config: &Config) -> Scheduler {
        Scheduler {
            stochastic_workers: config.stochastic_workers(),
            tuning: Tuning {
                kernel: config.kernel(),
                sample_batch: config.sample_batch,
                fill_delay: config.fill_delay,
                reverse_fill: config.reverse_fill,
                idle_poll: config.idle_poll,
            },
            generation: 0,
        }
    }

    /// An idle pool that carries on numbering after `generation`.
    pub fn resume(config: &Config, generation: u64) -> Scheduler {
        Scheduler {
            generation,
            ..Scheduler::new(config)
        }
    }

    /// Generations started so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Spawns the raster worker and the stochastic workers against
    /// `frame`.  A worker that fails to spawn is logged and left out;
    /// the run carries on with the rest.
    pub fn start(mut self, frame: Arc<Frame>) -> Run {
        self.generation += 1;
        let generation = self.generation;
        let token = CancelToken::new();
        let (reports, receiver) = channel::unbounded();

        let roles = std::iter::once((Role::Raster, 0))
            .chain((0..self.stochastic_workers).map(|index| (Role::Stochastic, index)));

        let mut handles = Vec::with_capacity(self.stochastic_workers + 1);
        for (role, index) in roles {
            match spawn(role, index, generation, &frame, &token, self.tuning, reports.clone()) {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("could not spawn {:?} worker {}: {}", role, index, e),
            }
        }

        debug!(
            "generation {} started: {} workers, {} kernel, {}x{} buffer",
            generation,
            handles.len(),
            self.tuning.kernel.name(),
            frame.dimensions().0,
            frame.dimensions().1
        );

        Run {
            scheduler: self,
            token,
            pending: handles.len(),
            handles,
            receiver,
            generation,
        }
    }
}

fn spawn(
    role: Role,
    index: usize,
    generation: u64,
    frame: &Arc<Frame>,
    token: &CancelToken,
    tuning: Tuning,
    reports: Sender<WorkerReport>,
) -> std::io::Result<JoinHandle<()>> {
    let frame = frame.clone();
    let token = token.clone();
    let name = match role {
        Role::Raster => format!("raster-{}", generation),
        Role::Stochastic => format!("stochastic-{}-{}", generation, index),
    };

    thread::Builder::new().name(name).spawn(move || {
        let mut exit = ExitGuard {
            report: WorkerReport::new(role, index),
            reports,
        };
        match role {
            Role::Raster => worker::raster(&frame, &token, &tuning, &mut exit.report),
            Role::Stochastic => worker::stochastic(&frame, &token, &tuning, &mut exit.report),
        }
        // Let go of the frame before reporting, so that by the time the
        // scheduler hears back this worker holds nothing.
        drop(frame);
    })
}

/// Reports a worker's exit, on return or on unwind.
struct ExitGuard {
    report: WorkerReport,
    reports: Sender<WorkerReport>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.report.panicked = thread::panicking();
        let _ = self.reports.send(self.report.clone());
    }
}

/// A running generation.
#[derive(Debug)]
pub struct Run {
    scheduler: Scheduler,
    token: CancelToken,
    handles: Vec<JoinHandle<()>>,
    receiver: Receiver<WorkerReport>,
    pending: usize,
    generation: u64,
}

impl Run {
    /// This run's generation number.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Workers spawned for this generation.
    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Signals cancellation without waiting.
    pub fn signal(self) -> Cancelling {
        debug!("generation {} cancelling", self.generation);
        self.token.cancel();
        Cancelling { run: self }
    }

    /// Signals cancellation and blocks until every worker has exited.
    pub fn cancel(self) -> Scheduler {
        self.signal().wait()
    }

    /// Like `cancel`, but gives up waiting after `timeout`.  The
    /// returned `Cancelling` can be waited on again.
    pub fn cancel_within(self, timeout: Duration) -> Result<Scheduler, Cancelling> {
        self.signal().wait_within(timeout)
    }
}

/// A generation that has been told to stop.
#[derive(Debug)]
pub struct Cancelling {
    run: Run,
}

impl Cancelling {
    /// The cancelled run's generation number.
    pub fn generation(&self) -> u64 {
        self.run.generation
    }

    /// Workers that have not reported their exit yet.
    pub fn pending(&self) -> usize {
        self.run.pending
    }

    /// Blocks until every worker has exited.
    pub fn wait(mut self) -> Scheduler {
        while self.run.pending > 0 {
            match self.run.receiver.recv() {
                Ok(report) => self.acknowledge(report),
                // Every sender is gone, so every worker is gone.
                Err(_) => self.run.pending = 0,
            }
        }
        self.finish()
    }

    /// Blocks until every worker has exited or `timeout` has passed.
    pub fn wait_within(mut self, timeout: Duration) -> Result<Scheduler, Cancelling> {
        let deadline = Instant::now() + timeout;
        while self.run.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.run.receiver.recv_timeout(remaining) {
                Ok(report) => self.acknowledge(report),
                Err(RecvTimeoutError::Timeout) => return Err(self),
                Err(RecvTimeoutError::Disconnected) => self.run.pending = 0,
            }
        }
        Ok(self.finish())
    }

    fn acknowledge(&mut self, report: WorkerReport) {
        self.run.pending -= 1;
        if report.panicked {
            error!(
                "generation {}: {:?} worker {} panicked",
                self.run.generation, report.role, report.index
            );
        } else {
            debug!(
                "generation {}: {:?} worker {} exited after {} samples, {} sweeps",
                self.run.generation, report.role, report.index, report.samples, report.sweeps
            );
        }
    }

    fn finish(self) -> Scheduler {
        let Run {
            scheduler,
            handles,
            generation,
            ..
        } = self.run;
        for handle in handles {
            // Every worker has reported; these joins return at once.
            if handle.join().is_err() {
                error!("generation {}: a worker thread ended in a panic", generation);
            }
        }
        debug!("generation {} quiesced", generation);
        scheduler
    }
}
