// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Maps escape-time counts to colours.
//!
//! Each channel follows `127 * (1 - cos(f * ln(v) / k))`, with a
//! different frequency `f` per channel, so slowly escaping points
//! cycle through hues while the set itself stays black.

use image::{Rgba, RgbaImage};
use itertools::Itertools;
use num::clamp;

const RED: f64 = 1.4427;
const GREEN: f64 = 0.34;
const BLUE: f64 = 0.18;
const SPREAD: f64 = 2.0;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

fn channel(frequency: f64, x: f64) -> u8 {
    clamp((127.0 * (1.0 - (frequency * x).cos())).floor(), 0.0, 255.0) as u8
}

/// The colour of a positive value.  Zero, negative and non-finite
/// values are black.
pub fn shade(v: f64) -> Rgba<u8> {
    if !(v.is_finite() && v > 0.0) {
        return BLACK;
    }
    let x = v.ln() / SPREAD;
    Rgba([channel(RED, x), channel(GREEN, x), channel(BLUE, x), 255])
}

/// The colour of an escape-time count.  `0`, the count of points that
/// never escaped, is black.
pub fn palette(count: u32) -> Rgba<u8> {
    match count {
        0 => BLACK,
        n => shade(f64::from(n)),
    }
}

/// Colours a row-major grid of counts.  Cells past the end of a short
/// `counts` are black.
pub fn colorize(counts: &[u32], width: usize, height: usize) -> RgbaImage {
    RgbaImage::from_fn(width as u32, height as u32, |x, y| {
        counts
            .get(y as usize * width + x as usize)
            .map_or(BLACK, |count| palette(*count))
    })
}

const RAMP: &[u8] = b" .:-=+*#%@";

/// A text rendering of a grid of counts, one line per row.  Points in
/// the set are `@`; escaping points get lighter the faster they leave.
pub fn ascii(counts: &[u32], width: usize, height: usize) -> String {
    let deepest = counts.iter().cloned().max().unwrap_or(0).max(1);
    let glyph = |count: u32| -> char {
        if count == 0 {
            return '@';
        }
        let level = (f64::from(count).ln() / f64::from(deepest).ln().max(1.0) * (RAMP.len() - 2) as f64) as usize;
        RAMP[level.min(RAMP.len() - 2)] as char
    };
    counts
        .chunks(width.max(1))
        .take(height)
        .map(|row| row.iter().map(|count| glyph(*count)).collect::<String>())
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_escaped_is_black() {
        assert_eq!(palette(0), BLACK);
    }

    #[test]
    fn bad_values_are_clamped_to_black() {
        assert_eq!(shade(0.0), BLACK);
        assert_eq!(shade(-3.0), BLACK);
        assert_eq!(shade(std::f64::NAN), BLACK);
        assert_eq!(shade(std::f64::INFINITY), BLACK);
    }

    #[test]
    fn palette_follows_the_cosine_curve() {
        // ln(1) = 0, so every channel is 127 * (1 - 1).
        assert_eq!(palette(1), Rgba([0, 0, 0, 255]));
        let x = (50.0_f64).ln() / 2.0;
        let red = (127.0 * (1.0 - (1.4427 * x).cos())).floor() as u8;
        assert_eq!(palette(50).0[0], red);
        assert!(palette(50).0[..3].iter().all(|c| *c <= 254));
        assert_eq!(palette(50).0[3], 255);
    }

    #[test]
    fn colorize_lays_out_rows() {
        let image = colorize(&[0, 7, 7, 0, 3, 0], 3, 2);
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(*image.get_pixel(0, 0), BLACK);
        assert_eq!(*image.get_pixel(1, 0), palette(7));
        assert_eq!(*image.get_pixel(1, 1), palette(3));
    }

    #[test]
    fn ascii_has_one_line_per_row() {
        let text = ascii(&[1, 2, 0, 0, 9, 1], 3, 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].chars().count(), 3);
        assert_eq!(lines[0].chars().nth(2), Some('@'));
        assert_eq!(lines[1].chars().nth(0), Some('@'));
    }
}
