// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A one-shot renderer: computes the whole frame before returning.
//! Threads pull rows off a shared iterator until it runs dry, so a
//! thread that lands on the cheap rows outside the set simply takes
//! more of them.

use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::Backend;
use crate::config::Params;
use crate::error::Error;
use crate::kernel::Kernel;
use crate::planes::{PlaneMapper, Viewport};

/// Renders complete frames with a fixed number of scoped threads.
pub struct ParallelRenderer {
    threads: usize,
    kernel: Kernel,
}

impl ParallelRenderer {
    /// Requires the number of threads to render with.
    pub fn new(threads: usize, kernel: Kernel) -> Result<Self, Error> {
        if threads == 0 {
            return Err(Error::InvalidThreads(threads));
        }
        Ok(ParallelRenderer { threads, kernel })
    }

    /// The single-threaded version; also the reference the threaded
    /// one is tested against.
    pub fn render_single(&self, plane: &PlaneMapper, params: &Params) -> Vec<u32> {
        let width = plane.integral_plane.0;
        let columns = plane.columns();
        let mut buffer = vec![0_u32; plane.len()];
        for (y, row) in buffer.chunks_mut(width).enumerate() {
            self.kernel.iterate_span(
                &columns,
                plane.row_im(y),
                params.max_iterations(),
                params.radius_squared(),
                row,
            );
        }
        buffer
    }

    /// The multi-threaded version.
    pub fn render_threaded(&self, plane: &PlaneMapper, params: &Params) -> Vec<u32> {
        let width = plane.integral_plane.0;
        let columns = plane.columns();
        let mut buffer = vec![0_u32; plane.len()];
        {
            let rows = Arc::new(Mutex::new(buffer.chunks_mut(width).enumerate()));
            let columns = &columns;
            let kernel = self.kernel;
            crossbeam::scope(|spawner| {
                for _ in 0..self.threads {
                    let rows = rows.clone();
                    spawner.spawn(move |_| loop {
                        let row = { rows.lock().unwrap_or_else(PoisonError::into_inner).next() };
                        match row {
                            Some((y, row)) => kernel.iterate_span(
                                columns,
                                plane.row_im(y),
                                params.max_iterations(),
                                params.radius_squared(),
                                row,
                            ),
                            None => {
                                break;
                            }
                        }
                    });
                }
            })
            // A panicking row thread is a bug in the kernel, not a
            // runtime condition; surface it.
            .unwrap_or_else(|e| std::panic::resume_unwind(e));
        }
        buffer
    }
}

impl Backend for ParallelRenderer {
    fn name(&self) -> &str {
        "parallel"
    }

    fn render(&mut self, viewport: &Viewport, params: &Params, width: usize, height: usize) -> Result<Vec<u32>, Error> {
        let plane = PlaneMapper::new(width, height, *viewport)?;
        if self.threads == 1 {
            Ok(self.render_single(&plane, params))
        } else {
            Ok(self.render_threaded(&plane, params))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::iterate;
    use crate::planes::Pixel;

    #[test]
    fn zero_threads_is_rejected() {
        assert!(ParallelRenderer::new(0, Kernel::Scalar).is_err());
    }

    #[test]
    fn threaded_matches_single() {
        let plane = PlaneMapper::new(37, 23, Viewport::default()).unwrap();
        let params = Params::new(120, 2.0).unwrap();
        let renderer = ParallelRenderer::new(4, Kernel::Vector).unwrap();
        assert_eq!(renderer.render_threaded(&plane, &params), renderer.render_single(&plane, &params));
    }

    #[test]
    fn backend_render_matches_the_kernel() {
        let mut renderer = ParallelRenderer::new(3, Kernel::Scalar).unwrap();
        let viewport = Viewport::default();
        let params = Params::new(50, 2.0).unwrap();
        let out = renderer.render(&viewport, &params, 4, 4).unwrap();
        let plane = PlaneMapper::new(4, 4, viewport).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let c = plane.pixel_to_point(&Pixel(x, y));
                assert_eq!(out[y * 4 + x], iterate(c.re, c.im, 50, 4.0));
            }
        }
        assert_eq!(out[2 * 4 + 2], 0);
    }

    #[test]
    fn backend_render_rejects_empty_frames() {
        let mut renderer = ParallelRenderer::new(2, Kernel::Scalar).unwrap();
        assert_eq!(
            renderer.render(&Viewport::default(), &Params::default(), 0, 5),
            Err(Error::InvalidDimensions(0, 5))
        );
    }
}
