// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The grid of escape-time counts that the workers fill and the
//! display reads.
//!
//! Cells are `AtomicU32`, written with relaxed stores.  On every
//! target we care about that is a single aligned 32-bit store, so a
//! reader racing a writer sees either the old count or the new one,
//! never a mix.  The cells live in a boxed slice that is never
//! resized, so `as_ptr` stays valid for as long as the buffer does.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::error::Error;

/// A `width * height`, row-major grid of counts.
pub struct SampleBuffer {
    width: usize,
    height: usize,
    cells: Box<[AtomicU32]>,
    retired: AtomicBool,
    stale_writes: AtomicUsize,
}

impl SampleBuffer {
    /// A zeroed buffer.  Zero is also the "never escaped" count, so a
    /// fresh buffer reads as an all-black frame.
    pub fn allocate(width: usize, height: usize) -> Result<SampleBuffer, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions(width, height));
        }
        let len = width
            .checked_mul(height)
            .ok_or(Error::InvalidDimensions(width, height))?;
        let cells: Vec<AtomicU32> = (0..len).map(|_| AtomicU32::new(0)).collect();
        Ok(SampleBuffer {
            width,
            height,
            cells: cells.into_boxed_slice(),
            retired: AtomicBool::new(false),
            stale_writes: AtomicUsize::new(0),
        })
    }

    /// Width and height in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; zero dimensions are rejected.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Bytes from the start of one row to the start of the next.
    pub fn stride(&self) -> usize {
        self.width * std::mem::size_of::<u32>()
    }

    /// Start of the grid, for handing to a texture upload.  The memory
    /// is `len()` consecutive `u32`s.  Workers may be writing while it
    /// is read; the caller must not write through it.
    pub fn as_ptr(&self) -> *const u32 {
        // AtomicU32 has the same size, alignment and bit validity as u32.
        self.cells.as_ptr() as *const u32
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    /// The count at `(x, y)`, or `None` out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        self.offset(x, y)
            .map(|offset| self.cells[offset].load(Ordering::Relaxed))
    }

    /// Stores one count.  Returns false when `(x, y)` is out of bounds
    /// or the buffer has been retired.
    pub fn set(&self, x: usize, y: usize, count: u32) -> bool {
        match self.offset(x, y) {
            Some(_) => self.store_span(x, y, &[count]),
            None => false,
        }
    }

    /// Stores a horizontal run of counts starting at `(x, y)`.  Panics
    /// if the run leaves the row.
    pub(crate) fn store_span(&self, x: usize, y: usize, counts: &[u32]) -> bool {
        if self.retired.load(Ordering::Relaxed) {
            self.stale_writes.fetch_add(counts.len(), Ordering::Relaxed);
            return false;
        }
        assert!(y < self.height && x + counts.len() <= self.width);
        let start = y * self.width + x;
        let cells = &self.cells[start..start + counts.len()];
        for (cell, count) in cells.iter().zip(counts) {
            cell.store(*count, Ordering::Relaxed);
        }
        true
    }

    /// Stores a full row.
    pub(crate) fn store_row(&self, y: usize, counts: &[u32]) -> bool {
        debug_assert_eq!(counts.len(), self.width);
        self.store_span(0, y, counts)
    }

    /// Copies the current contents out.  Cells still being written may
    /// hold either value.
    pub fn snapshot(&self) -> Vec<u32> {
        self.cells
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }

    /// Zeroes every cell.
    pub fn clear(&self) {
        for cell in self.cells.iter() {
            cell.store(0, Ordering::Relaxed);
        }
    }

    /// Marks the buffer as replaced.  From here on every write is
    /// dropped and counted in `stale_writes`, which must stay at zero
    /// if the scheduler has really quiesced its workers.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    /// Whether `retire` has been called.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Writes attempted after `retire`.
    pub fn stale_writes(&self) -> usize {
        self.stale_writes.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("retired", &self.is_retired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_rejects_empty_grids() {
        assert_eq!(SampleBuffer::allocate(0, 3).unwrap_err(), Error::InvalidDimensions(0, 3));
        assert_eq!(SampleBuffer::allocate(3, 0).unwrap_err(), Error::InvalidDimensions(3, 0));
    }

    #[test]
    fn fresh_buffer_is_zeroed() {
        let buffer = SampleBuffer::allocate(5, 3).unwrap();
        assert_eq!(buffer.dimensions(), (5, 3));
        assert_eq!(buffer.len(), 15);
        assert_eq!(buffer.stride(), 20);
        assert!(buffer.snapshot().iter().all(|c| *c == 0));
    }

    #[test]
    fn get_and_set_are_bounds_checked() {
        let buffer = SampleBuffer::allocate(4, 2).unwrap();
        assert!(buffer.set(3, 1, 17));
        assert_eq!(buffer.get(3, 1), Some(17));
        assert!(!buffer.set(4, 0, 1));
        assert!(!buffer.set(0, 2, 1));
        assert_eq!(buffer.get(4, 0), None);
    }

    #[test]
    fn layout_is_row_major() {
        let buffer = SampleBuffer::allocate(3, 2).unwrap();
        buffer.store_row(1, &[7, 8, 9]);
        buffer.store_span(1, 0, &[5, 6]);
        assert_eq!(buffer.snapshot(), vec![0, 5, 6, 7, 8, 9]);
        let raw = unsafe { std::slice::from_raw_parts(buffer.as_ptr(), buffer.len()) };
        assert_eq!(raw, &[0, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn retired_buffer_counts_and_drops_writes() {
        let buffer = SampleBuffer::allocate(2, 2).unwrap();
        buffer.set(0, 0, 3);
        buffer.retire();
        assert!(buffer.is_retired());
        assert!(!buffer.set(1, 1, 4));
        assert!(!buffer.store_row(0, &[1, 1]));
        assert_eq!(buffer.stale_writes(), 3);
        assert_eq!(buffer.snapshot(), vec![3, 0, 0, 0]);
    }

    #[test]
    fn clear_zeroes_everything() {
        let buffer = SampleBuffer::allocate(2, 1).unwrap();
        buffer.store_row(0, &[1, 2]);
        buffer.clear();
        assert_eq!(buffer.snapshot(), vec![0, 0]);
    }
}
