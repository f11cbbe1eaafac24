// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The render session: turns viewport, parameter and size changes
//! into the right sequence of scheduler operations.
//!
//! A change that keeps the buffer size publishes a new view to the
//! running generation, which restarts its raster sweep (the cheap
//! path).  A change of size stops the generation, waits for it,
//! retires the old buffer, allocates a new one and starts a fresh
//! generation (the expensive path).

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::buffer::SampleBuffer;
use crate::config::{Config, Params};
use crate::error::Error;
use crate::frame::Frame;
use crate::planes::Viewport;
use crate::scheduler::{Run, Scheduler, State};

enum Workers {
    Idle(Scheduler),
    Running(Run),
}

/// Owns the viewport, the parameters, the active buffer and the pool
/// that fills it.
pub struct Session {
    config: Config,
    viewport: Viewport,
    params: Params,
    frame: Option<Arc<Frame>>,
    // Only ever None transiently, while a transition is in progress.
    workers: Option<Workers>,
    // Last generation started, for rebuilding the pool if a transition
    // was interrupted by a panic.
    generation: u64,
}

impl Session {
    /// A session with the default viewport and parameters and no
    /// buffer yet.  Nothing runs until the first `resize` or `render`.
    pub fn new(config: Config) -> Result<Session, Error> {
        config.validate()?;
        let scheduler = Scheduler::new(&config);
        Ok(Session {
            config,
            viewport: Viewport::default(),
            params: Params::default(),
            frame: None,
            workers: Some(Workers::Idle(scheduler)),
            generation: 0,
        })
    }

    /// The pool configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// The current iteration parameters.
    pub fn params(&self) -> Params {
        self.params
    }

    /// Where the worker pool is in its lifecycle.
    pub fn state(&self) -> State {
        match self.workers {
            Some(Workers::Running(_)) => State::Running,
            Some(Workers::Idle(_)) => State::Idle,
            None => State::Cancelling,
        }
    }

    /// Generations started over the life of the session.
    pub fn generation(&self) -> u64 {
        match self.workers {
            Some(Workers::Running(ref run)) => run.generation(),
            Some(Workers::Idle(ref scheduler)) => scheduler.generation(),
            None => self.generation,
        }
    }

    /// Replaces the viewport and iteration parameters.  Invalid values
    /// are rejected before anything changes.
    pub fn configure(&mut self, viewport: Viewport, max_iterations: u32, escape_radius: f64) -> Result<(), Error> {
        let params = Params::new(max_iterations, escape_radius)?;
        self.viewport = viewport;
        self.params = params;
        self.on_view_changed()
    }

    /// Zooms the current viewport; see `Viewport::zoom`.
    pub fn zoom(&mut self, dx: f64, dy: f64, factor: f64) -> Result<(), Error> {
        let mut viewport = self.viewport;
        viewport.zoom(dx, dy, factor)?;
        self.viewport = viewport;
        self.on_view_changed()
    }

    fn on_view_changed(&mut self) -> Result<(), Error> {
        match self.frame {
            Some(ref frame) => {
                let epoch = frame.update(self.viewport, self.params)?;
                debug!("view updated in place, epoch {}", epoch);
                Ok(())
            }
            // Picked up by the next resize.
            None => Ok(()),
        }
    }

    /// Replaces the buffer with one of the given size and restarts the
    /// workers against it.  Always takes the expensive path.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<(), Error> {
        let buffer = Arc::new(SampleBuffer::allocate(width, height)?);
        let frame = Arc::new(Frame::new(buffer, self.viewport, self.params)?);

        let scheduler = self.stop();
        if let Some(old) = self.frame.take() {
            old.buffer().retire();
        }

        info!("rendering {}x{} with {} threads", width, height, self.config.threads);
        self.frame = Some(frame.clone());
        let run = scheduler.start(frame);
        self.generation = run.generation();
        self.workers = Some(Workers::Running(run));
        Ok(())
    }

    /// Makes sure a buffer of the given size is being filled, taking the
    /// expensive path only if the size changed, and returns it.
    pub fn render(&mut self, width: usize, height: usize) -> Result<&SampleBuffer, Error> {
        let current = self.buffer_dimensions();
        let running = self.state() == State::Running;
        if current != Some((width, height)) || !running {
            self.resize(width, height)?;
        }
        match self.frame {
            Some(ref frame) => Ok(&**frame.buffer()),
            None => Err(Error::InvalidDimensions(width, height)),
        }
    }

    // Cancels the running generation, if any, and waits for it.
    fn stop(&mut self) -> Scheduler {
        match self.workers.take() {
            Some(Workers::Running(run)) => run.cancel(),
            Some(Workers::Idle(scheduler)) => scheduler,
            None => Scheduler::resume(&self.config, self.generation),
        }
    }

    /// The active buffer, if one has been allocated.
    pub fn buffer(&self) -> Option<&SampleBuffer> {
        self.frame.as_ref().map(|frame| &**frame.buffer())
    }

    /// A shared handle on the active buffer.  It stays readable after
    /// it has been replaced, but is retired and no longer written.
    pub fn buffer_handle(&self) -> Option<Arc<SampleBuffer>> {
        self.frame.as_ref().map(|frame| frame.buffer().clone())
    }

    /// Start of the active buffer for texture upload.  Read-only.
    pub fn buffer_pointer(&self) -> Option<*const u32> {
        self.buffer().map(SampleBuffer::as_ptr)
    }

    /// Width and height of the active buffer.
    pub fn buffer_dimensions(&self) -> Option<(usize, usize)> {
        self.buffer().map(SampleBuffer::dimensions)
    }

    /// Whether the raster fill has covered the current view.
    pub fn is_converged(&self) -> bool {
        self.frame.as_ref().map_or(false, |frame| frame.is_complete())
    }

    /// Polls until the current view has converged or `timeout` passes.
    pub fn wait_converged(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_converged() {
                return true;
            }
            if Instant::now() >= deadline || self.state() != State::Running {
                return false;
            }
            thread::sleep(self.config.idle_poll.max(Duration::from_millis(1)));
        }
    }

    /// Stops the workers and releases the buffer.  The session can be
    /// started again with `resize`.
    pub fn shutdown(&mut self) {
        let scheduler = self.stop();
        if let Some(frame) = self.frame.take() {
            frame.buffer().retire();
        }
        self.workers = Some(Workers::Idle(scheduler));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
