// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The two worker loops.  Stochastic workers scatter samples over the
//! frame for a quick first impression; the raster worker sweeps every
//! row so the frame eventually converges.  Both run until the token is
//! cancelled and never touch scheduler state.

use std::time::Duration;

use log::trace;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::ThreadRng;

use crate::cancel::CancelToken;
use crate::frame::Frame;
use crate::kernel::{Kernel, LANES};

/// What a worker does.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Samples random pixels.
    Stochastic,
    /// Sweeps every row in order.
    Raster,
}

/// Sent by each worker as it exits.
#[derive(Clone, Debug)]
pub struct WorkerReport {
    pub role: Role,
    pub index: usize,
    /// Pixels computed and stored.
    pub samples: u64,
    /// Full sweeps finished (raster only).
    pub sweeps: u64,
    pub panicked: bool,
}

impl WorkerReport {
    pub fn new(role: Role, index: usize) -> WorkerReport {
        WorkerReport {
            role,
            index,
            samples: 0,
            sweeps: 0,
            panicked: false,
        }
    }
}

/// Tuning shared by the workers of one run.
#[derive(Copy, Clone, Debug)]
pub struct Tuning {
    pub kernel: Kernel,
    pub sample_batch: usize,
    pub fill_delay: Duration,
    pub reverse_fill: bool,
    pub idle_poll: Duration,
}

/// A pixel picker, in the manner of a cell sampler: one distribution
/// per axis and the thread's generator.
struct PixelPicker {
    columns: Uniform<usize>,
    rows: Uniform<usize>,
    rng: ThreadRng,
}

impl PixelPicker {
    /// Picks the left end of a `span`-wide run and a row.
    fn new(width: usize, height: usize, span: usize) -> Self {
        PixelPicker {
            columns: Uniform::new_inclusive(0, width - span),
            rows: Uniform::new(0, height),
            rng: rand::thread_rng(),
        }
    }

    fn get(&mut self) -> (usize, usize) {
        (self.columns.sample(&mut self.rng), self.rows.sample(&mut self.rng))
    }
}

/// Runs a stochastic worker until cancelled.
pub fn stochastic(frame: &Frame, token: &CancelToken, tuning: &Tuning, report: &mut WorkerReport) {
    let (width, height) = frame.dimensions();
    let span = tuning.kernel.lanes().min(width);
    let mut picker = PixelPicker::new(width, height, span);
    let mut counts = [0_u32; LANES];
    let counts = &mut counts[..span];
    let batch = tuning.sample_batch.max(1);

    'reload: while !token.is_cancelled() {
        if frame.is_complete() {
            // The raster fill has covered this view; nothing left to add.
            if token.sleep(tuning.idle_poll) {
                break;
            }
            continue;
        }

        let view = frame.view();
        let max_iterations = view.params.max_iterations();
        let radius_squared = view.params.radius_squared();

        for _ in 0..batch {
            if token.is_cancelled() {
                break 'reload;
            }
            let (x, y) = picker.get();
            let im = view.mapper.row_im(y);
            tuning
                .kernel
                .iterate_span(&view.columns[x..x + span], im, max_iterations, radius_squared, counts);
            if !frame.store_if_current(view.epoch, x, y, counts) {
                continue 'reload;
            }
            report.samples += span as u64;
        }
    }
}

/// Runs the raster worker until cancelled.  Restarts its sweep from
/// the top whenever the view changes.
pub fn raster(frame: &Frame, token: &CancelToken, tuning: &Tuning, report: &mut WorkerReport) {
    let (width, height) = frame.dimensions();
    let mut row = vec![0_u32; width];

    'sweep: while !token.is_cancelled() {
        if frame.is_complete() {
            if token.sleep(tuning.idle_poll) {
                break;
            }
            continue;
        }

        if token.sleep(tuning.fill_delay) {
            break;
        }

        let view = frame.view();
        let max_iterations = view.params.max_iterations();
        let radius_squared = view.params.radius_squared();
        trace!("raster sweep begins for epoch {}", view.epoch);

        for i in 0..height {
            if token.is_cancelled() {
                break 'sweep;
            }
            if frame.epoch() != view.epoch {
                continue 'sweep;
            }

            let y = if tuning.reverse_fill { height - 1 - i } else { i };
            let im = view.mapper.row_im(y);
            tuning
                .kernel
                .iterate_span(&view.columns, im, max_iterations, radius_squared, &mut row);
            if !frame.store_row(view.epoch, y, &row) {
                continue 'sweep;
            }
            report.samples += width as u64;
        }

        if frame.mark_complete(view.epoch) {
            report.sweeps += 1;
            trace!("raster sweep complete for epoch {}", view.epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleBuffer;
    use crate::config::Params;
    use crate::kernel::iterate;
    use crate::planes::{Pixel, Viewport};
    use std::sync::Arc;
    use std::thread;

    fn tuning(kernel: Kernel) -> Tuning {
        Tuning {
            kernel,
            sample_batch: 64,
            fill_delay: Duration::from_millis(0),
            reverse_fill: true,
            idle_poll: Duration::from_millis(1),
        }
    }

    fn expected(frame: &Frame) -> Vec<u32> {
        let view = frame.view();
        let (width, height) = frame.dimensions();
        let mut out = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let c = view.mapper.pixel_to_point(&Pixel(x, y));
                out.push(iterate(c.re, c.im, view.params.max_iterations(), view.params.radius_squared()));
            }
        }
        out
    }

    #[test]
    fn raster_fills_the_frame_then_idles() {
        let buffer = Arc::new(SampleBuffer::allocate(9, 5).unwrap());
        let frame = Arc::new(Frame::new(buffer, Viewport::default(), Params::new(60, 2.0).unwrap()).unwrap());
        let token = CancelToken::new();

        let handle = {
            let (frame, token) = (frame.clone(), token.clone());
            thread::spawn(move || {
                let mut report = WorkerReport::new(Role::Raster, 0);
                raster(&frame, &token, &tuning(Kernel::Vector), &mut report);
                report
            })
        };

        while !frame.is_complete() {
            thread::sleep(Duration::from_millis(1));
        }
        token.cancel();
        let report = handle.join().unwrap();
        assert_eq!(report.sweeps, 1);
        assert_eq!(report.samples, 45);
        assert_eq!(frame.buffer().snapshot(), expected(&frame));
    }

    #[test]
    fn stochastic_writes_only_correct_counts() {
        let buffer = Arc::new(SampleBuffer::allocate(16, 8).unwrap());
        let frame = Arc::new(Frame::new(buffer, Viewport::default(), Params::new(40, 2.0).unwrap()).unwrap());
        let token = CancelToken::new();

        let handle = {
            let (frame, token) = (frame.clone(), token.clone());
            thread::spawn(move || {
                let mut report = WorkerReport::new(Role::Stochastic, 0);
                stochastic(&frame, &token, &tuning(Kernel::Scalar), &mut report);
                report
            })
        };

        thread::sleep(Duration::from_millis(50));
        token.cancel();
        let report = handle.join().unwrap();
        assert!(report.samples > 0);

        // Every cell is either untouched or holds its true count.
        let want = expected(&frame);
        for (got, want) in frame.buffer().snapshot().iter().zip(want.iter()) {
            assert!(*got == 0 || got == want);
        }
    }

    #[test]
    fn stochastic_handles_frames_narrower_than_a_lane() {
        let buffer = Arc::new(SampleBuffer::allocate(1, 3).unwrap());
        let frame = Arc::new(Frame::new(buffer, Viewport::default(), Params::default()).unwrap());
        let token = CancelToken::new();
        token.cancel();
        let mut report = WorkerReport::new(Role::Stochastic, 0);
        stochastic(&frame, &token, &tuning(Kernel::Vector), &mut report);
        assert_eq!(report.samples, 0);
    }
}
