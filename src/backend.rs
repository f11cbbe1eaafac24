// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The boundary to whole-frame renderers: anything that can turn a
//! viewport and parameters into a finished grid of counts in one call.
//! A native or GPU renderer plugs in here; the crate's own
//! `ParallelRenderer` does too.

use crate::config::Params;
use crate::error::Error;
use crate::planes::Viewport;

/// A whole-frame renderer.
pub trait Backend: Send {
    /// Short name for logs and status lines.
    fn name(&self) -> &str;

    /// Brings up whatever the backend needs (devices, libraries,
    /// compiled kernels).  An error here means the backend cannot be
    /// used at all.
    fn initialize(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Renders a `width * height`, row-major grid of escape-time
    /// counts with the same meaning as `kernel::iterate`.
    fn render(&mut self, viewport: &Viewport, params: &Params, width: usize, height: usize) -> Result<Vec<u32>, Error>;
}
