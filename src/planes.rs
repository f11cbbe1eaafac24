// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the Viewport, which describes the window onto the
//! complex plane that is currently on screen, and the PlaneMapper,
//! which relates a rectangle on the integral plane with an origin at
//! 0,0 (the pixel buffer) to that window.
use num::Complex;

use crate::error::Error;

/// Default window: the whole set, with a little room on either side.
pub const DEFAULT_BOUNDS: (f64, f64, f64, f64) = (-2.5, 1.5, -1.25, 1.25);

/// The visible rectangle of the complex plane, treating the real part
/// as the x-component and the imaginary part as the y-component.
/// Always satisfies `x_max > x_min` and `y_max > y_min`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Viewport {
    /// Constructor.  Rejects corners that are not finite or that are
    /// not strictly ordered.
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<Viewport, Error> {
        if !(x_min.is_finite() && x_max.is_finite() && y_min.is_finite() && y_max.is_finite()) {
            return Err(Error::InvalidViewport(format!(
                "bounds [{}, {}] x [{}, {}] are not finite",
                x_min, x_max, y_min, y_max
            )));
        }

        if x_max <= x_min {
            return Err(Error::InvalidViewport(format!(
                "x_max {} is not to the right of x_min {}",
                x_max, x_min
            )));
        }

        if y_max <= y_min {
            return Err(Error::InvalidViewport(format!(
                "y_max {} is not above y_min {}",
                y_max, y_min
            )));
        }

        Ok(Viewport {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    /// Builds a viewport from its left-lower and right-upper corners.
    pub fn from_corners(leftlower: Complex<f64>, rightupper: Complex<f64>) -> Result<Viewport, Error> {
        Viewport::new(leftlower.re, rightupper.re, leftlower.im, rightupper.im)
    }

    /// Left edge.
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    /// Right edge.
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Bottom edge.
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    /// Top edge.
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    /// Extent along the real axis.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Extent along the imaginary axis.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Middle of the window.
    pub fn center(&self) -> Complex<f64> {
        Complex::new(
            self.x_min + self.width() / 2.0,
            self.y_min + self.height() / 2.0,
        )
    }

    /// Recentres the window on the point at fractional offset
    /// `(dx, dy)` of the current window, then scales both extents by
    /// `1 / factor`.  A factor above one zooms in, below one zooms out.
    /// On error the viewport is left untouched.
    pub fn zoom(&mut self, dx: f64, dy: f64, factor: f64) -> Result<(), Error> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(Error::InvalidZoom(factor));
        }
        if !(dx.is_finite() && dy.is_finite()) {
            return Err(Error::InvalidViewport(format!(
                "zoom offset ({}, {}) is not finite",
                dx, dy
            )));
        }

        let new_x = self.x_min + self.width() * dx;
        let new_y = self.y_min + self.height() * dy;

        let half_width = self.width() / (2.0 * factor);
        let half_height = self.height() / (2.0 * factor);

        *self = Viewport::new(
            new_x - half_width,
            new_x + half_width,
            new_y - half_height,
            new_y + half_height,
        )?;
        Ok(())
    }
}

impl Default for Viewport {
    fn default() -> Self {
        let (x_min, x_max, y_min, y_max) = DEFAULT_BOUNDS;
        Viewport {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }
}

/// Describes the width and height of an integral plane that is assumed to start at
/// 0,0 and all values are assumed to be non-negative integers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntegralPlane(pub usize, pub usize);

/// Describes the x, y of a pixel in the integral plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// Maps pixels of a buffer onto samples of a viewport.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaneMapper {
    /// The right-upper hand corner of the integral cartesian plane.
    /// The left-lower is assumed to be at 0,0
    pub integral_plane: IntegralPlane,
    /// The window of the complex plane the integral plane covers.
    pub viewport: Viewport,
    // Size of one pixel on the complex plane, along each axis.
    steps: (f64, f64),
}

impl PlaneMapper {
    /// Constructor.  Takes the pixel dimensions of the buffer and the
    /// viewport it should show.
    pub fn new(width: usize, height: usize, viewport: Viewport) -> Result<PlaneMapper, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions(width, height));
        }

        let steps = (
            viewport.width() / (width as f64),
            viewport.height() / (height as f64),
        );

        Ok(PlaneMapper {
            integral_plane: IntegralPlane(width, height),
            viewport,
            steps,
        })
    }

    /// The total number of points in the integral grid.
    pub fn len(&self) -> usize {
        self.integral_plane.0 * self.integral_plane.1
    }

    /// Describes that the integral plane is of a size.
    pub fn is_empty(&self) -> bool {
        self.integral_plane.0 == 0 || self.integral_plane.1 == 0
    }

    /// Complex distance between adjacent pixels, per axis.
    pub fn steps(&self) -> (f64, f64) {
        self.steps
    }

    /// Real part of the samples in column `x`.
    #[inline]
    pub fn column_re(&self, x: usize) -> f64 {
        (x as f64).mul_add(self.steps.0, self.viewport.x_min)
    }

    /// Imaginary part of the samples in row `y`.
    #[inline]
    pub fn row_im(&self, y: usize) -> f64 {
        (y as f64).mul_add(self.steps.1, self.viewport.y_min)
    }

    /// The real parts of every column, in order.  Every row shares
    /// them, so workers compute this once per viewport.
    pub fn columns(&self) -> Vec<f64> {
        (0..self.integral_plane.0).map(|x| self.column_re(x)).collect()
    }

    /// Given a pixel on the integral cartesian plane, map it to the
    /// sample on the complex cartesian plane.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        Complex::new(self.column_re(pixel.0), self.row_im(pixel.1))
    }
}
