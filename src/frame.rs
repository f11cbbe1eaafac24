// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! What one generation of workers shares: the buffer they fill and the
//! view they fill it from.
//!
//! The view can change while a generation runs (the cheap path of a
//! viewport change).  Each change bumps the epoch.  Workers poll the
//! epoch and reload the view when it moves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::buffer::SampleBuffer;
use crate::config::Params;
use crate::error::Error;
use crate::planes::{PlaneMapper, Viewport};

/// An immutable snapshot of the viewport and parameters, with the
/// per-column sample coordinates precomputed.
#[derive(Debug)]
pub struct View {
    /// Bumped on every `update`.
    pub epoch: u64,
    /// Pixel to complex mapping.
    pub mapper: PlaneMapper,
    /// Iteration parameters.
    pub params: Params,
    /// Real part of each column.
    pub columns: Vec<f64>,
}

impl View {
    fn new(epoch: u64, mapper: PlaneMapper, params: Params) -> View {
        let columns = mapper.columns();
        View {
            epoch,
            mapper,
            params,
            columns,
        }
    }
}

/// The buffer and the current view of one generation.
#[derive(Debug)]
pub struct Frame {
    buffer: Arc<SampleBuffer>,
    view: RwLock<Arc<View>>,
    epoch: AtomicU64,
    completed: AtomicU64,
}

impl Frame {
    /// A frame at epoch 1 over `buffer`.
    pub fn new(buffer: Arc<SampleBuffer>, viewport: Viewport, params: Params) -> Result<Frame, Error> {
        let (width, height) = buffer.dimensions();
        let mapper = PlaneMapper::new(width, height, viewport)?;
        Ok(Frame {
            buffer,
            view: RwLock::new(Arc::new(View::new(1, mapper, params))),
            epoch: AtomicU64::new(1),
            completed: AtomicU64::new(0),
        })
    }

    /// The buffer being filled.
    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Width and height of the buffer.
    pub fn dimensions(&self) -> (usize, usize) {
        self.buffer.dimensions()
    }

    /// The current epoch.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// The current view.
    pub fn view(&self) -> Arc<View> {
        self.view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publishes a new view and returns its epoch.  Any worker still
    /// holding the old one notices on its next poll.
    pub fn update(&self, viewport: Viewport, params: Params) -> Result<u64, Error> {
        let (width, height) = self.dimensions();
        let mapper = PlaneMapper::new(width, height, viewport)?;
        let mut view = self.view.write().unwrap_or_else(PoisonError::into_inner);
        let epoch = view.epoch + 1;
        *view = Arc::new(View::new(epoch, mapper, params));
        self.epoch.store(epoch, Ordering::Release);
        Ok(epoch)
    }

    /// Stores `counts` at `(x, y)` only if they were computed for the
    /// current view.  Holding the read lock across the check and the
    /// store means no store from an old view can land after `update`
    /// has returned.
    pub fn store_if_current(&self, epoch: u64, x: usize, y: usize, counts: &[u32]) -> bool {
        let view = self.view.read().unwrap_or_else(PoisonError::into_inner);
        if view.epoch != epoch {
            return false;
        }
        self.buffer.store_span(x, y, counts)
    }

    /// Stores a whole row, under the same rule as `store_if_current`.
    pub fn store_row(&self, epoch: u64, y: usize, counts: &[u32]) -> bool {
        let view = self.view.read().unwrap_or_else(PoisonError::into_inner);
        if view.epoch != epoch {
            return false;
        }
        self.buffer.store_row(y, counts)
    }

    /// Records that every pixel holds its count for `epoch`, unless the
    /// view has moved on in the meantime.
    pub fn mark_complete(&self, epoch: u64) -> bool {
        let view = self.view.read().unwrap_or_else(PoisonError::into_inner);
        if view.epoch != epoch {
            return false;
        }
        self.completed.store(epoch, Ordering::Release);
        true
    }

    /// Whether the whole buffer has converged for the current view.
    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire) == self.epoch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        let buffer = Arc::new(SampleBuffer::allocate(4, 4).unwrap());
        Frame::new(buffer, Viewport::default(), Params::default()).unwrap()
    }

    #[test]
    fn update_bumps_epoch_and_rebuilds_columns() {
        let frame = frame();
        assert_eq!(frame.epoch(), 1);
        assert_eq!(frame.view().columns, vec![-2.5, -1.5, -0.5, 0.5]);
        let epoch = frame
            .update(Viewport::new(0.0, 4.0, 0.0, 1.0).unwrap(), Params::default())
            .unwrap();
        assert_eq!(epoch, 2);
        assert_eq!(frame.view().epoch, 2);
        assert_eq!(frame.view().columns, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn stale_stores_are_refused() {
        let frame = frame();
        assert!(frame.store_if_current(1, 0, 0, &[9]));
        frame.update(Viewport::default(), Params::default()).unwrap();
        assert!(!frame.store_if_current(1, 1, 0, &[9]));
        assert_eq!(frame.buffer().get(0, 0), Some(9));
        assert_eq!(frame.buffer().get(1, 0), Some(0));
    }

    #[test]
    fn stale_rows_are_refused() {
        let frame = frame();
        assert!(frame.store_row(1, 2, &[5, 5, 5, 5]));
        assert!(frame.store_if_current(1, 0, 3, &[4]));
        frame.update(Viewport::default(), Params::default()).unwrap();
        assert!(frame.store_if_current(2, 0, 3, &[6]));
        assert!(!frame.store_row(1, 3, &[1, 1, 1, 1]));
        assert_eq!(frame.buffer().get(0, 3), Some(6));
        assert_eq!(frame.buffer().get(1, 3), Some(0));
        assert_eq!(frame.buffer().get(3, 2), Some(5));
        assert!(frame.store_row(2, 3, &[7, 7, 7, 7]));
        assert_eq!(frame.buffer().get(0, 3), Some(7));
    }

    #[test]
    fn completion_tracks_the_current_epoch() {
        let frame = frame();
        assert!(!frame.is_complete());
        assert!(frame.mark_complete(1));
        assert!(frame.is_complete());
        frame.update(Viewport::default(), Params::default()).unwrap();
        assert!(!frame.is_complete());
        assert!(!frame.mark_complete(1));
        assert!(frame.mark_complete(2));
        assert!(frame.is_complete());
    }
}
