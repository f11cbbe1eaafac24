// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mouse and keyboard handling for an interactive viewer, kept free of
//! any windowing library so it can be driven headless.
//!
//! The wheel adjusts one setting at a time; which one is the wheel
//! mode, cycled with `next`.  A positive delta (wheel away) lowers the
//! setting, a negative one raises it.  Clicks zoom on the clicked point.

use std::fmt;
use std::time::Duration;

use crate::error::Error;
use crate::renderer::Renderer;

const MIN_RESOLUTION: u32 = 25;
const RESOLUTION_STEP: i32 = 25;
const MIN_ITERATIONS: u32 = 25;
const ITERATIONS_STEP: i32 = 25;
const MIN_ZOOM_FACTOR: f64 = 1.0;
const MIN_RADIUS: f64 = 2.0;
const MAX_RADIUS: f64 = 32768.0;

/// The setting the mouse wheel changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WheelMode {
    /// Render size as a percentage of the window.
    Resolution,
    /// How far a click zooms.
    ZoomFactor,
    /// The iteration cap.
    Iterations,
    /// The escape radius, in powers of two.
    EscapeRadius,
}

impl WheelMode {
    /// The following mode, wrapping around.
    pub fn next(self) -> WheelMode {
        match self {
            WheelMode::Resolution => WheelMode::ZoomFactor,
            WheelMode::ZoomFactor => WheelMode::Iterations,
            WheelMode::Iterations => WheelMode::EscapeRadius,
            WheelMode::EscapeRadius => WheelMode::Resolution,
        }
    }
}

impl fmt::Display for WheelMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            WheelMode::Resolution => "Resolution",
            WheelMode::ZoomFactor => "ZoomFactor",
            WheelMode::Iterations => "Iterations",
            WheelMode::EscapeRadius => "EscapeRadius",
        };
        f.write_str(name)
    }
}

/// Mouse buttons that mean something to the viewer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Button {
    /// Zoom in.
    Primary,
    /// Zoom out.
    Secondary,
}

/// Viewer state that lives outside the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct Controls {
    mode: WheelMode,
    zoom_factor: f64,
    resolution: u32,
}

impl Default for Controls {
    fn default() -> Self {
        Controls {
            mode: WheelMode::ZoomFactor,
            zoom_factor: 2.0,
            resolution: 100,
        }
    }
}

impl Controls {
    /// The current wheel mode.
    pub fn mode(&self) -> WheelMode {
        self.mode
    }

    /// How far a primary click zooms in.
    pub fn zoom_factor(&self) -> f64 {
        self.zoom_factor
    }

    /// Render size as a percentage of the window.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Moves to the next wheel mode.
    pub fn cycle(&mut self) {
        self.mode = self.mode.next();
    }

    /// Applies a wheel movement.  Returns whether the frame has to be
    /// redrawn; changing the zoom factor alone does not.
    pub fn wheel(&mut self, delta: i32, renderer: &mut Renderer) -> Result<bool, Error> {
        match self.mode {
            WheelMode::Resolution => {
                self.resolution = step(self.resolution, delta, RESOLUTION_STEP, MIN_RESOLUTION);
                Ok(true)
            }
            WheelMode::ZoomFactor => {
                self.zoom_factor = (self.zoom_factor - f64::from(delta)).max(MIN_ZOOM_FACTOR);
                Ok(false)
            }
            WheelMode::Iterations => {
                let (_, params) = renderer.parameters();
                let iterations = step(params.max_iterations(), delta, ITERATIONS_STEP, MIN_ITERATIONS);
                renderer.set_parameters(iterations, params.escape_radius())?;
                Ok(true)
            }
            WheelMode::EscapeRadius => {
                let (_, params) = renderer.parameters();
                let radius = (params.escape_radius() / 2_f64.powi(delta)).floor();
                let radius = num::clamp(radius, MIN_RADIUS, MAX_RADIUS);
                renderer.set_parameters(params.max_iterations(), radius)?;
                Ok(true)
            }
        }
    }

    /// Zooms on the clicked window position: in by the zoom factor for
    /// the primary button, out by it for the secondary.
    pub fn click(&self, x: f64, y: f64, window: (usize, usize), button: Button, renderer: &mut Renderer) -> Result<(), Error> {
        let factor = match button {
            Button::Primary => self.zoom_factor,
            Button::Secondary => 1.0 / self.zoom_factor,
        };
        renderer.zoom(x / window.0 as f64, y / window.1 as f64, factor)
    }

    /// The render size for a window, never smaller than one pixel.
    pub fn render_size(&self, window: (usize, usize)) -> (usize, usize) {
        let scale = |side: usize| (side * self.resolution as usize / 100).max(1);
        (scale(window.0), scale(window.1))
    }

    /// The status line: resolution, zoom, timing, iteration cap,
    /// escape radius, wheel mode and the magnitude of the view width.
    pub fn title(&self, renderer: &Renderer, elapsed: Duration) -> String {
        let (viewport, params) = renderer.parameters();
        format!(
            "Mandelbrot Set - Res: {}% - Zoom: {}x, 10^{:.1} - Speed: {:.3}s - N: {} - R: {} - Mode: {} - {}",
            self.resolution,
            self.zoom_factor,
            viewport.width().log10(),
            elapsed.as_secs_f64(),
            params.max_iterations(),
            params.escape_radius(),
            self.mode,
            renderer.name()
        )
    }
}

fn step(value: u32, delta: i32, size: i32, min: u32) -> u32 {
    let stepped = i64::from(value) - i64::from(size) * i64::from(delta);
    num::clamp(stepped, i64::from(min), i64::from(u32::max_value())) as u32
}
