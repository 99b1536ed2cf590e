//! Direct-summation DFT backend.
//!
//! Slow (`O(n^3)` for an `n x n` grid) but dependency-free and exact to
//! rounding, which makes it the yardstick for the FFT backends and the
//! backend of choice for unit tests on small grids.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::{backend::SpectralBackend, field::Field2D};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceBackend;

impl ReferenceBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SpectralBackend for ReferenceBackend {
    fn forward_fft_2d(&self, field: &mut Field2D) {
        separable_dft(field, false);
    }

    fn inverse_fft_2d(&self, field: &mut Field2D) {
        separable_dft(field, true);
    }

    fn name(&self) -> &'static str {
        "reference-dft"
    }
}

fn separable_dft(field: &mut Field2D, inverse: bool) {
    let grid = field.grid();
    let nx = grid.nx;
    let ny = grid.ny;
    let sign = if inverse { 1.0 } else { -1.0 };
    let twiddles_x = twiddles(nx, sign);
    let twiddles_y = twiddles(ny, sign);
    let data = field.as_mut_slice();

    let mut rows = vec![Complex64::default(); data.len()];
    for iy in 0..ny {
        let row = &data[iy * nx..(iy + 1) * nx];
        for kx in 0..nx {
            let mut sum = Complex64::default();
            for (x, &value) in row.iter().enumerate() {
                sum += value * twiddles_x[(kx * x) % nx];
            }
            rows[iy * nx + kx] = sum;
        }
    }

    let norm = if inverse { 1.0 / (nx * ny) as f64 } else { 1.0 };
    for kx in 0..nx {
        for ky in 0..ny {
            let mut sum = Complex64::default();
            for y in 0..ny {
                sum += rows[y * nx + kx] * twiddles_y[(ky * y) % ny];
            }
            data[ky * nx + kx] = sum * norm;
        }
    }
}

fn twiddles(n: usize, sign: f64) -> Vec<Complex64> {
    (0..n)
        .map(|k| Complex64::from_polar(1.0, sign * 2.0 * PI * k as f64 / n as f64))
        .collect()
}
