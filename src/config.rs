// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Iteration parameters and the knobs of the worker pool.

use std::time::Duration;

use crate::error::Error;
use crate::kernel::Kernel;

/// Number of iterations before announcing a point non-divergent.
pub const DEFAULT_MAX_ITERATIONS: u32 = 200;

/// Default escape radius.
pub const DEFAULT_ESCAPE_RADIUS: f64 = 2.0;

/// Iteration parameters.  Owned by the session, read-only to the
/// workers of a run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Params {
    max_iterations: u32,
    escape_radius: f64,
}

impl Params {
    /// Rejects a zero iteration cap and a radius that is not a
    /// positive, finite number.
    pub fn new(max_iterations: u32, escape_radius: f64) -> Result<Params, Error> {
        if max_iterations == 0 {
            return Err(Error::InvalidIterations(max_iterations));
        }
        if !(escape_radius.is_finite() && escape_radius > 0.0) {
            return Err(Error::InvalidEscapeRadius(escape_radius));
        }
        Ok(Params {
            max_iterations,
            escape_radius,
        })
    }

    /// The iteration cap.
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// The escape radius.
    pub fn escape_radius(&self) -> f64 {
        self.escape_radius
    }

    /// The kernel compares against the squared modulus.
    pub fn radius_squared(&self) -> f64 {
        self.escape_radius * self.escape_radius
    }
}

impl Default for Params {
    fn default() -> Self {
        Params {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            escape_radius: DEFAULT_ESCAPE_RADIUS,
        }
    }
}

/// How the worker pool is sized and how the two refinement passes
/// are mixed.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Hardware threads to use.  One goes to the raster fill, the
    /// rest sample stochastically.
    pub threads: usize,
    /// Samples a stochastic worker takes between view reloads.
    pub sample_batch: usize,
    /// Pause before the raster fill (re)starts a sweep, giving the
    /// stochastic workers the CPU for a first impression.
    pub fill_delay: Duration,
    /// Sweep rows bottom-up instead of top-down.
    pub reverse_fill: bool,
    /// How often idle workers wake to look for a new viewport.
    pub idle_poll: Duration,
    /// Force a kernel instead of detecting one.
    pub kernel: Option<Kernel>,
}

impl Config {
    /// Sizes the pool from the hardware concurrency of the machine.
    pub fn detect() -> Config {
        Config {
            threads: num_cpus::get(),
            sample_batch: 1000,
            fill_delay: Duration::from_millis(100),
            reverse_fill: true,
            idle_poll: Duration::from_millis(5),
            kernel: None,
        }
    }

    /// Sets the number of threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the stochastic batch size.
    pub fn with_sample_batch(mut self, sample_batch: usize) -> Self {
        self.sample_batch = sample_batch;
        self
    }

    /// Sets the pause before each raster sweep.
    pub fn with_fill_delay(mut self, fill_delay: Duration) -> Self {
        self.fill_delay = fill_delay;
        self
    }

    /// Sets the raster direction.
    pub fn with_reverse_fill(mut self, reverse_fill: bool) -> Self {
        self.reverse_fill = reverse_fill;
        self
    }

    /// Sets the idle wake-up interval.
    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    /// Forces a kernel.
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Rejects a pool with no threads or a zero idle poll.
    pub fn validate(&self) -> Result<(), Error> {
        if self.threads == 0 {
            return Err(Error::InvalidThreads(self.threads));
        }
        // Idle workers sleep this long between checks; zero would spin.
        if self.idle_poll == Duration::from_millis(0) {
            return Err(Error::InvalidIdlePoll(self.idle_poll));
        }
        Ok(())
    }

    /// Number of stochastic workers per run.
    pub fn stochastic_workers(&self) -> usize {
        self.threads.saturating_sub(1)
    }

    /// The kernel the workers will run.
    pub fn kernel(&self) -> Kernel {
        self.kernel.unwrap_or_else(Kernel::detect)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::detect()
    }
}
