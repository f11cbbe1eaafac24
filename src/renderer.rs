// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The face the display code talks to.  A `Renderer` is built with a
//! strategy and from then on offers the same handful of operations
//! whichever strategy is underneath:
//!
//! - `Progressive` drives a `Session`: frames fill in over time.
//! - `Parallel` renders whole frames with a `ParallelRenderer`.
//! - `Accelerated` renders whole frames with an external `Backend`.
//!   If it cannot be initialised, or fails later, the renderer logs
//!   it and carries on as `Progressive`.

use log::{info, warn};

use crate::backend::Backend;
use crate::buffer::SampleBuffer;
use crate::config::{Config, Params};
use crate::error::Error;
use crate::parallel::ParallelRenderer;
use crate::planes::Viewport;
use crate::session::Session;

/// How frames get computed.
pub enum Strategy {
    /// Stochastic plus raster refinement on a worker pool.
    Progressive,
    /// One-shot rendering on scoped threads.
    Parallel,
    /// One-shot rendering on an external backend.
    Accelerated(Box<dyn Backend>),
}

/// The pixels of the latest frame.
pub enum Pixels<'a> {
    /// A buffer still being refined by workers.
    Live(&'a SampleBuffer),
    /// A finished frame.
    Still {
        /// Row-major counts.
        counts: &'a [u32],
        /// Pixels per row.
        width: usize,
        /// Rows.
        height: usize,
    },
}

impl<'a> Pixels<'a> {
    /// Width and height of the frame.
    pub fn dimensions(&self) -> (usize, usize) {
        match *self {
            Pixels::Live(buffer) => buffer.dimensions(),
            Pixels::Still { width, height, .. } => (width, height),
        }
    }

    /// Start of the row-major counts, for texture upload.
    pub fn as_ptr(&self) -> *const u32 {
        match *self {
            Pixels::Live(buffer) => buffer.as_ptr(),
            Pixels::Still { counts, .. } => counts.as_ptr(),
        }
    }

    /// The count at `(x, y)`, or `None` out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        match *self {
            Pixels::Live(buffer) => buffer.get(x, y),
            Pixels::Still { counts, width, height } => {
                if x < width && y < height {
                    Some(counts[y * width + x])
                } else {
                    None
                }
            }
        }
    }

    /// Copies the counts out.
    pub fn to_vec(&self) -> Vec<u32> {
        match *self {
            Pixels::Live(buffer) => buffer.snapshot(),
            Pixels::Still { counts, .. } => counts.to_vec(),
        }
    }
}

struct OneShot {
    backend: Box<dyn Backend>,
    viewport: Viewport,
    params: Params,
    counts: Vec<u32>,
    dimensions: (usize, usize),
    dirty: bool,
}

impl OneShot {
    fn new(backend: Box<dyn Backend>) -> OneShot {
        OneShot {
            backend,
            viewport: Viewport::default(),
            params: Params::default(),
            counts: Vec::new(),
            dimensions: (0, 0),
            dirty: true,
        }
    }

    fn render(&mut self, width: usize, height: usize) -> Result<(), Error> {
        if !self.dirty && self.dimensions == (width, height) {
            return Ok(());
        }
        let counts = self.backend.render(&self.viewport, &self.params, width, height)?;
        if counts.len() != width * height {
            return Err(Error::Backend(format!(
                "{} returned {} counts for a {}x{} frame",
                self.backend.name(),
                counts.len(),
                width,
                height
            )));
        }
        self.counts = counts;
        self.dimensions = (width, height);
        self.dirty = false;
        Ok(())
    }
}

enum Engine {
    Progressive(Session),
    OneShot(OneShot),
}

/// Renders the Mandelbrot set with a strategy chosen at construction.
pub struct Renderer {
    engine: Engine,
    config: Config,
}

impl Renderer {
    /// Builds and initialises the strategy.  An accelerated backend that
    /// fails to initialise is replaced by the progressive one.
    pub fn new(strategy: Strategy, config: Config) -> Result<Renderer, Error> {
        config.validate()?;
        let engine = match strategy {
            Strategy::Progressive => Engine::Progressive(Session::new(config.clone())?),
            Strategy::Parallel => {
                let backend = ParallelRenderer::new(config.threads, config.kernel())?;
                Engine::OneShot(OneShot::new(Box::new(backend)))
            }
            Strategy::Accelerated(mut backend) => match backend.initialize() {
                Ok(()) => {
                    info!("using {} backend", backend.name());
                    Engine::OneShot(OneShot::new(backend))
                }
                Err(e) => {
                    warn!("{} backend unavailable, falling back to software: {}", backend.name(), e);
                    Engine::Progressive(Session::new(config.clone())?)
                }
            },
        };
        Ok(Renderer { engine, config })
    }

    /// Which strategy is in use, after any fallback.
    pub fn name(&self) -> &str {
        match self.engine {
            Engine::Progressive(_) => "progressive",
            Engine::OneShot(ref one_shot) => one_shot.backend.name(),
        }
    }

    /// Whether frames are refined progressively.
    pub fn is_progressive(&self) -> bool {
        match self.engine {
            Engine::Progressive(_) => true,
            Engine::OneShot(_) => false,
        }
    }

    /// The current viewport and iteration parameters.
    pub fn parameters(&self) -> (Viewport, Params) {
        match self.engine {
            Engine::Progressive(ref session) => (session.viewport(), session.params()),
            Engine::OneShot(ref one_shot) => (one_shot.viewport, one_shot.params),
        }
    }

    /// Replaces the viewport and iteration parameters.
    pub fn configure(&mut self, viewport: Viewport, max_iterations: u32, escape_radius: f64) -> Result<(), Error> {
        match self.engine {
            Engine::Progressive(ref mut session) => session.configure(viewport, max_iterations, escape_radius),
            Engine::OneShot(ref mut one_shot) => {
                one_shot.params = Params::new(max_iterations, escape_radius)?;
                one_shot.viewport = viewport;
                one_shot.dirty = true;
                Ok(())
            }
        }
    }

    /// Keeps the viewport and changes only the iteration parameters.
    pub fn set_parameters(&mut self, max_iterations: u32, escape_radius: f64) -> Result<(), Error> {
        let (viewport, _) = self.parameters();
        self.configure(viewport, max_iterations, escape_radius)
    }

    /// Zooms on the point at fractional offset `(dx, dy)` of the window.
    pub fn zoom(&mut self, dx: f64, dy: f64, factor: f64) -> Result<(), Error> {
        let (mut viewport, params) = self.parameters();
        viewport.zoom(dx, dy, factor)?;
        self.configure(viewport, params.max_iterations(), params.escape_radius())
    }

    /// Produces the pixels for a `width * height` frame.  A failing
    /// one-shot backend is dropped in favour of the progressive
    /// strategy, keeping the current viewport and parameters.
    pub fn render(&mut self, width: usize, height: usize) -> Result<Pixels<'_>, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions(width, height));
        }

        let failure = match self.engine {
            Engine::OneShot(ref mut one_shot) => match one_shot.render(width, height) {
                Ok(()) => None,
                Err(e) => Some((one_shot.backend.name().to_string(), e)),
            },
            Engine::Progressive(_) => None,
        };

        if let Some((name, e)) = failure {
            warn!("{} backend failed, falling back to software: {}", name, e);
            let (viewport, params) = self.parameters();
            let mut session = Session::new(self.config.clone())?;
            session.configure(viewport, params.max_iterations(), params.escape_radius())?;
            self.engine = Engine::Progressive(session);
        }

        match self.engine {
            Engine::Progressive(ref mut session) => Ok(Pixels::Live(session.render(width, height)?)),
            Engine::OneShot(ref one_shot) => Ok(Pixels::Still {
                counts: &one_shot.counts,
                width,
                height,
            }),
        }
    }

    /// Whether the latest frame is final.  One-shot frames always are.
    pub fn is_converged(&self) -> bool {
        match self.engine {
            Engine::Progressive(ref session) => session.is_converged(),
            Engine::OneShot(ref one_shot) => !one_shot.dirty,
        }
    }

    /// The progressive session, when that is the strategy in use.
    pub fn session(&self) -> Option<&Session> {
        match self.engine {
            Engine::Progressive(ref session) => Some(session),
            Engine::OneShot(_) => None,
        }
    }

    /// Stops any workers and frees the frame.
    pub fn shutdown(&mut self) {
        match self.engine {
            Engine::Progressive(ref mut session) => session.shutdown(),
            Engine::OneShot(ref mut one_shot) => {
                one_shot.counts = Vec::new();
                one_shot.dimensions = (0, 0);
                one_shot.dirty = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Missing;

    impl Backend for Missing {
        fn name(&self) -> &str {
            "missing"
        }

        fn initialize(&mut self) -> Result<(), Error> {
            Err(Error::BackendUnavailable("no OpenCL platform".to_string()))
        }

        fn render(&mut self, _: &Viewport, _: &Params, _: usize, _: usize) -> Result<Vec<u32>, Error> {
            unreachable!("never initialised")
        }
    }

    struct Flaky;

    impl Backend for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn render(&mut self, _: &Viewport, _: &Params, _: usize, _: usize) -> Result<Vec<u32>, Error> {
            Err(Error::Backend("device lost".to_string()))
        }
    }

    fn config() -> Config {
        Config::detect()
            .with_threads(2)
            .with_fill_delay(Duration::from_millis(0))
            .with_idle_poll(Duration::from_millis(1))
    }

    #[test]
    fn missing_backend_falls_back_to_progressive() {
        let renderer = Renderer::new(Strategy::Accelerated(Box::new(Missing)), config()).unwrap();
        assert!(renderer.is_progressive());
        assert_eq!(renderer.name(), "progressive");
    }

    #[test]
    fn failing_backend_falls_back_on_render() {
        let mut renderer = Renderer::new(Strategy::Accelerated(Box::new(Flaky)), config()).unwrap();
        assert_eq!(renderer.name(), "flaky");
        renderer.set_parameters(64, 2.0).unwrap();
        let dims = renderer.render(8, 8).unwrap().dimensions();
        assert_eq!(dims, (8, 8));
        assert!(renderer.is_progressive());
        assert_eq!(renderer.parameters().1, Params::new(64, 2.0).unwrap());
    }

    #[test]
    fn parallel_and_progressive_agree() {
        let mut parallel = Renderer::new(Strategy::Parallel, config()).unwrap();
        let mut progressive = Renderer::new(Strategy::Progressive, config()).unwrap();
        for renderer in [&mut parallel, &mut progressive].iter_mut() {
            renderer.zoom(0.4, 0.5, 2.0).unwrap();
            renderer.set_parameters(90, 2.0).unwrap();
        }

        let still = parallel.render(12, 9).unwrap().to_vec();
        progressive.render(12, 9).unwrap();
        assert!(progressive
            .session()
            .unwrap()
            .wait_converged(Duration::from_secs(30)));
        let live = progressive.render(12, 9).unwrap().to_vec();
        assert_eq!(still, live);
    }

    #[test]
    fn one_shot_frames_are_cached_until_dirty() {
        let mut renderer = Renderer::new(Strategy::Parallel, config()).unwrap();
        assert!(!renderer.is_converged());
        let first = renderer.render(6, 4).unwrap().as_ptr();
        assert!(renderer.is_converged());
        let second = renderer.render(6, 4).unwrap().as_ptr();
        assert_eq!(first, second);
        renderer.zoom(0.5, 0.5, 2.0).unwrap();
        assert!(!renderer.is_converged());
    }

    #[test]
    fn render_rejects_empty_frames() {
        let mut renderer = Renderer::new(Strategy::Parallel, config()).unwrap();
        assert!(renderer.render(0, 3).is_err());
    }
}
