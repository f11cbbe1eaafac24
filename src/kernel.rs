// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time iteration, in a scalar flavour and a lane flavour
//! that works on `LANES` samples at once.
//!
//! Both flavours iterate `z -> z² + c` from `z = 0`, tracking the
//! squares of the real and imaginary parts so each step costs three
//! multiplies, and both compute the imaginary part with a fused
//! multiply-add.  An FMA is correctly rounded whether the hardware
//! does it or libm emulates it, so the two flavours return the same
//! count for the same input on every machine; only the speed differs.
//!
//! The count is the index of the first iterate whose squared modulus
//! exceeds the squared escape radius.  The zeroth iterate is the
//! origin, which never escapes, so `0` doubles as the "never escaped
//! within the cap" sentinel.

/// Samples processed per step by the lane kernel.
pub const LANES: usize = 2;

#[inline(always)]
fn escape_time(c_re: f64, c_im: f64, max_iterations: u32, radius_squared: f64) -> u32 {
    let (mut z_re, mut z_im) = (0.0_f64, 0.0_f64);
    let (mut z_re_sqr, mut z_im_sqr) = (0.0_f64, 0.0_f64);

    for i in 0..max_iterations {
        if z_re_sqr + z_im_sqr > radius_squared {
            return i;
        }

        z_im = z_im.mul_add(z_re + z_re, c_im);
        z_re = z_re_sqr - z_im_sqr + c_re;
        z_re_sqr = z_re * z_re;
        z_im_sqr = z_im * z_im;
    }
    0
}

#[inline(always)]
fn escape_time_lanes(
    c_re: [f64; LANES],
    c_im: [f64; LANES],
    max_iterations: u32,
    radius_squared: f64,
) -> [u32; LANES] {
    let mut z_re = [0.0_f64; LANES];
    let mut z_im = [0.0_f64; LANES];
    let mut z_re_sqr = [0.0_f64; LANES];
    let mut z_im_sqr = [0.0_f64; LANES];

    let mut escaped = [false; LANES];
    let mut counts = [0_u32; LANES];

    for i in 0..max_iterations {
        let mut all_escaped = true;
        for lane in 0..LANES {
            let outside = z_re_sqr[lane] + z_im_sqr[lane] > radius_squared;
            // First transition of the sticky mask records the count.
            counts[lane] = if outside && !escaped[lane] { i } else { counts[lane] };
            escaped[lane] |= outside;
            all_escaped &= escaped[lane];
        }
        if all_escaped {
            break;
        }

        // Escaped lanes keep iterating and may overflow to inf or NaN;
        // the mask is sticky, so that never changes their count.
        for lane in 0..LANES {
            z_im[lane] = z_im[lane].mul_add(z_re[lane] + z_re[lane], c_im[lane]);
            z_re[lane] = z_re_sqr[lane] - z_im_sqr[lane] + c_re[lane];
            z_re_sqr[lane] = z_re[lane] * z_re[lane];
            z_im_sqr[lane] = z_im[lane] * z_im[lane];
        }
    }
    counts
}

#[cfg(target_arch = "x86_64")]
mod fused {
    use super::LANES;

    #[target_feature(enable = "fma")]
    pub unsafe fn escape_time(c_re: f64, c_im: f64, max_iterations: u32, radius_squared: f64) -> u32 {
        super::escape_time(c_re, c_im, max_iterations, radius_squared)
    }

    #[target_feature(enable = "fma")]
    pub unsafe fn escape_time_lanes(
        c_re: [f64; LANES],
        c_im: [f64; LANES],
        max_iterations: u32,
        radius_squared: f64,
    ) -> [u32; LANES] {
        super::escape_time_lanes(c_re, c_im, max_iterations, radius_squared)
    }
}

/// Whether the machine can run the lane kernel with hardware FMA.
fn fused_multiply_add() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("fma")
    }
    #[cfg(target_arch = "aarch64")]
    {
        true
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        false
    }
}

/// Escape-time count of the sample `c_re + c_im i`, or `0` if it has
/// not escaped after `max_iterations` iterates.
pub fn iterate(c_re: f64, c_im: f64, max_iterations: u32, radius_squared: f64) -> u32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("fma") {
            // Safety: the required CPU feature was detected just above.
            return unsafe { fused::escape_time(c_re, c_im, max_iterations, radius_squared) };
        }
    }
    escape_time(c_re, c_im, max_iterations, radius_squared)
}

/// `iterate` over `LANES` samples at once.  Stops as soon as every
/// lane has escaped.
pub fn iterate_lanes(
    c_re: [f64; LANES],
    c_im: [f64; LANES],
    max_iterations: u32,
    radius_squared: f64,
) -> [u32; LANES] {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("fma") {
            // Safety: the required CPU feature was detected just above.
            return unsafe { fused::escape_time_lanes(c_re, c_im, max_iterations, radius_squared) };
        }
    }
    escape_time_lanes(c_re, c_im, max_iterations, radius_squared)
}

/// Which inner loop the workers run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kernel {
    /// One sample at a time.
    Scalar,
    /// `LANES` adjacent samples at a time.
    Vector,
}

impl Kernel {
    /// The lane kernel when the hardware has FMA, otherwise the scalar
    /// one.  Both give the same answers.
    pub fn detect() -> Kernel {
        if fused_multiply_add() {
            Kernel::Vector
        } else {
            Kernel::Scalar
        }
    }

    /// Adjacent pixels computed per kernel invocation.
    pub fn lanes(self) -> usize {
        match self {
            Kernel::Scalar => 1,
            Kernel::Vector => LANES,
        }
    }

    /// Short name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Kernel::Scalar => "scalar",
            Kernel::Vector => "vector",
        }
    }

    /// Computes the counts of a horizontal run of samples sharing the
    /// imaginary part `im`.  `re` and `out` must have the same length;
    /// any length is fine, a tail shorter than the lane width falls back
    /// to the scalar loop.
    pub fn iterate_span(self, re: &[f64], im: f64, max_iterations: u32, radius_squared: f64, out: &mut [u32]) {
        debug_assert_eq!(re.len(), out.len());
        match self {
            Kernel::Scalar => {
                for (count, c_re) in out.iter_mut().zip(re) {
                    *count = iterate(*c_re, im, max_iterations, radius_squared);
                }
            }
            Kernel::Vector => {
                let mut re_chunks = re.chunks_exact(LANES);
                let mut out_chunks = out.chunks_exact_mut(LANES);
                for (counts, c_re) in (&mut out_chunks).zip(&mut re_chunks) {
                    let mut lanes = [0.0_f64; LANES];
                    lanes.copy_from_slice(c_re);
                    counts.copy_from_slice(&iterate_lanes(lanes, [im; LANES], max_iterations, radius_squared));
                }
                for (count, c_re) in out_chunks.into_remainder().iter_mut().zip(re_chunks.remainder()) {
                    *count = iterate(*c_re, im, max_iterations, radius_squared);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_never_escapes() {
        for max in &[1, 2, 10, 200, 10_000] {
            assert_eq!(iterate(0.0, 0.0, *max, 4.0), 0);
            assert_eq!(iterate_lanes([0.0; LANES], [0.0; LANES], *max, 4.0), [0; LANES]);
        }
    }

    #[test]
    fn far_point_escapes_quickly() {
        let count = iterate(-2.5, 0.0, 200, 4.0);
        assert!(count >= 1 && count <= 3, "count was {}", count);
        assert_eq!(count, 1);
    }

    #[test]
    fn escape_test_is_strict_at_the_boundary() {
        // c = -2 lands on -2, 2, 2, ... and |z|² = 4 is never > 4.
        assert_eq!(iterate(-2.0, 0.0, 100, 4.0), 0);
        // c = 2: z1 = 2 sits on the circle, z2 = 6 is outside.
        assert_eq!(iterate(2.0, 0.0, 100, 4.0), 2);
        // c = 2i: z1 = 2i on the circle, z2 = -4 + 2i outside.
        assert_eq!(iterate(0.0, 2.0, 100, 4.0), 2);
        // The cusp of the cardioid stays bounded.
        assert_eq!(iterate(0.25, 0.0, 500, 4.0), 0);
    }

    #[test]
    fn lanes_agree_on_boundary_cases() {
        let cases = [(-2.0, 0.0), (2.0, 0.0), (0.0, 2.0), (0.25, 0.0), (-2.5, 0.0), (-0.75, 0.1)];
        for a in cases.iter() {
            for b in cases.iter() {
                let lanes = iterate_lanes([a.0, b.0], [a.1, b.1], 100, 4.0);
                assert_eq!(lanes, [iterate(a.0, a.1, 100, 4.0), iterate(b.0, b.1, 100, 4.0)]);
            }
        }
    }

    #[test]
    fn cap_of_one_never_reports_escape() {
        assert_eq!(iterate(-2.5, 0.0, 1, 4.0), 0);
        assert_eq!(iterate(100.0, 100.0, 0, 4.0), 0);
    }

    #[test]
    fn iterate_is_deterministic() {
        let first = iterate(-0.743_643_887, 0.131_825_904, 5000, 4.0);
        for _ in 0..10 {
            assert_eq!(iterate(-0.743_643_887, 0.131_825_904, 5000, 4.0), first);
        }
    }

    #[test]
    fn scalar_and_lanes_agree_over_a_grid() {
        let (width, height) = (161, 97);
        for y in 0..height {
            let im = -1.3 + 2.6 * (y as f64) / (height as f64);
            for x in (0..width).step_by(LANES) {
                let re0 = -2.2 + 3.0 * (x as f64) / (width as f64);
                let re1 = -2.2 + 3.0 * ((x + 1) as f64) / (width as f64);
                let lanes = iterate_lanes([re0, re1], [im, im], 150, 4.0);
                assert_eq!(lanes[0], iterate(re0, im, 150, 4.0), "at ({}, {})", re0, im);
                assert_eq!(lanes[1], iterate(re1, im, 150, 4.0), "at ({}, {})", re1, im);
            }
        }
    }

    #[test]
    fn larger_radius_takes_longer() {
        let small = iterate(0.5, 0.5, 1000, 4.0);
        let large = iterate(0.5, 0.5, 1000, 1.0e6);
        assert!(small > 0);
        assert!(large > small);
        assert_eq!(iterate_lanes([0.5, 0.5], [0.5, 0.5], 1000, 1.0e6), [large, large]);
    }

    #[test]
    fn spans_match_between_kernels() {
        let re: Vec<f64> = (0..11).map(|x| -2.0 + 0.25 * x as f64).collect();
        let mut scalar = vec![0; re.len()];
        let mut vector = vec![0; re.len()];
        Kernel::Scalar.iterate_span(&re, 0.3, 100, 4.0, &mut scalar);
        Kernel::Vector.iterate_span(&re, 0.3, 100, 4.0, &mut vector);
        assert_eq!(scalar, vector);
        assert_eq!(scalar[0], iterate(-2.0, 0.3, 100, 4.0));
    }

    #[test]
    fn lane_counts() {
        assert_eq!(Kernel::Scalar.lanes(), 1);
        assert_eq!(Kernel::Vector.lanes(), LANES);
        let detected = Kernel::detect();
        assert!(detected == Kernel::Scalar || detected == Kernel::Vector);
    }
}
