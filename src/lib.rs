#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Progressive Mandelbrot renderer
//!
//! The Mandelbrot set is the set of points `c` on the complex plane
//! for which iterating `z -> z² + c` from the origin never runs off to
//! infinity.  A point's escape time, the number of iterations it takes
//! to leave a circle of a given radius, is what gets drawn.
//!
//! Rendering here is progressive.  A pool of workers fills a shared
//! buffer of escape times: most of them sample random pixels, which
//! gives a rough impression of the whole image at once, while one
//! sweeps the buffer row by row until every pixel is exact.  Panning
//! or zooming publishes a new view to the running workers, which simply
//! start over; resizing replaces the buffer and restarts the pool.
//!
//! The `Session` is the progressive engine.  The `Renderer` puts it,
//! the one-shot `ParallelRenderer` and any external `Backend` behind a
//! single interface.

extern crate crossbeam;
extern crate image;
extern crate itertools;
extern crate num;
extern crate num_cpus;

pub mod backend;
pub mod buffer;
pub mod cancel;
pub mod colour;
pub mod config;
pub mod controls;
pub mod error;
pub mod frame;
pub mod kernel;
pub mod parallel;
pub mod planes;
pub mod renderer;
pub mod scheduler;
pub mod session;
mod worker;

pub use backend::Backend;
pub use buffer::SampleBuffer;
pub use cancel::CancelToken;
pub use config::{Config, Params};
pub use controls::{Button, Controls, WheelMode};
pub use error::Error;
pub use kernel::{iterate, iterate_lanes, Kernel};
pub use parallel::ParallelRenderer;
pub use planes::{PlaneMapper, Viewport};
pub use renderer::{Pixels, Renderer, Strategy};
pub use scheduler::{Cancelling, Run, Scheduler, State};
pub use session::Session;
