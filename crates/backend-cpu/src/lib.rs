//! CPU spectral backend built on rustfft.
//!
//! Rows are transformed in place, columns through a transposed scratch
//! buffer. Plans come from a shared [`FftPlanner`], which caches them by
//! length and direction, so repeated transforms on one grid size plan once.

use std::sync::Arc;

use num_complex::Complex64;
use parking_lot::Mutex;
use ptycho_core::backend::SpectralBackend;
use ptycho_core::field::Field2D;
use rayon::prelude::*;
use rustfft::{Fft, FftDirection, FftPlanner};

#[cfg(test)]
mod _tests_lib;

/// Grids with fewer pixels than this are transformed on the calling thread.
const PARALLEL_MIN_LEN: usize = 128 * 128;

pub struct CpuBackend {
    planner: Mutex<FftPlanner<f64>>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    fn plans(
        &self,
        nx: usize,
        ny: usize,
        direction: FftDirection,
    ) -> (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>) {
        let mut planner = self.planner.lock();
        (planner.plan_fft(nx, direction), planner.plan_fft(ny, direction))
    }

    fn transform(&self, field: &mut Field2D, direction: FftDirection) {
        let grid = field.grid();
        let (nx, ny) = (grid.nx, grid.ny);
        if nx == 0 || ny == 0 {
            return;
        }
        let (fft_x, fft_y) = self.plans(nx, ny, direction);
        let scale = match direction {
            FftDirection::Forward => None,
            FftDirection::Inverse => Some(1.0 / (nx * ny) as f64),
        };
        let parallel = grid.len() >= PARALLEL_MIN_LEN;
        let data = field.as_mut_slice();

        process_lines(fft_x.as_ref(), data, nx, parallel);

        let mut columns = transpose(data, nx, ny);
        process_lines(fft_y.as_ref(), &mut columns, ny, parallel);

        for (ix, column) in columns.chunks_exact(ny).enumerate() {
            for (iy, &value) in column.iter().enumerate() {
                data[iy * nx + ix] = match scale {
                    Some(s) => value * s,
                    None => value,
                };
            }
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `fft` to every contiguous line of length `len`.
fn process_lines(fft: &dyn Fft<f64>, data: &mut [Complex64], len: usize, parallel: bool) {
    if parallel {
        data.par_chunks_mut(len).for_each(|line| fft.process(line));
    } else {
        fft.process(data);
    }
}

/// Row-major `ny x nx` to row-major `nx x ny`.
fn transpose(data: &[Complex64], nx: usize, ny: usize) -> Vec<Complex64> {
    let mut out = vec![Complex64::default(); data.len()];
    for iy in 0..ny {
        for ix in 0..nx {
            out[ix * ny + iy] = data[iy * nx + ix];
        }
    }
    out
}

impl SpectralBackend for CpuBackend {
    fn forward_fft_2d(&self, field: &mut Field2D) {
        self.transform(field, FftDirection::Forward);
    }

    fn inverse_fft_2d(&self, field: &mut Field2D) {
        self.transform(field, FftDirection::Inverse);
    }

    fn batch_forward_fft_2d(&self, fields: &mut [Field2D]) {
        fields
            .par_iter_mut()
            .for_each(|field| self.transform(field, FftDirection::Forward));
    }

    fn batch_inverse_fft_2d(&self, fields: &mut [Field2D]) {
        fields
            .par_iter_mut()
            .for_each(|field| self.transform(field, FftDirection::Inverse));
    }

    fn name(&self) -> &'static str {
        "cpu-rustfft"
    }
}
