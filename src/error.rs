// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The single error type returned by every fallible operation in the
//! crate.  Configuration errors are reported before anything is
//! mutated, so a caller that gets one of these back can carry on with
//! whatever state it had before the call.

use std::time::Duration;

use failure::Fail;

/// Everything that can go wrong at the API boundary.
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum Error {
    /// A buffer or window was asked for with a zero dimension.
    #[fail(display = "invalid dimensions {}x{}: both must be positive", _0, _1)]
    InvalidDimensions(usize, usize),

    /// The corners of the viewport are inverted, degenerate, or not finite.
    #[fail(display = "invalid viewport: {}", _0)]
    InvalidViewport(String),

    /// The iteration cap must be at least one.
    #[fail(display = "invalid iteration count {}: must be positive", _0)]
    InvalidIterations(u32),

    /// The escape radius must be positive and finite.
    #[fail(display = "invalid escape radius {}: must be positive", _0)]
    InvalidEscapeRadius(f64),

    /// Zooming by a non-positive or non-finite factor makes no sense.
    #[fail(display = "invalid zoom factor {}: must be positive", _0)]
    InvalidZoom(f64),

    /// The worker pool needs at least one thread for the raster fill.
    #[fail(display = "invalid thread count {}: must be at least 1", _0)]
    InvalidThreads(usize),

    /// Idle workers need a non-zero interval between checks.
    #[fail(display = "invalid idle poll interval {:?}: must be positive", _0)]
    InvalidIdlePoll(Duration),

    /// An accelerated backend could not be brought up.
    #[fail(display = "backend unavailable: {}", _0)]
    BackendUnavailable(String),

    /// An accelerated backend failed while rendering.
    #[fail(display = "backend failure: {}", _0)]
    Backend(String),
}
