//! Sub-pixel beam translation by Fourier phase ramps.
//!
//! A translation by `(y, x)` is a multiplication of the spectrum by
//! `exp(-2 pi i (qy y + qx x))`. This is exact for non-integer shifts and
//! introduces no interpolation error, at the price of periodic wrap-around
//! at the grid edges.

use std::f64::consts::PI;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::{backend::SpectralBackend, field::Field2D, grid::Grid2D};

/// Spectra of every beam mode plus the frequency axes, computed once and
/// reused for all scan positions.
#[derive(Debug, Clone)]
pub struct BeamSpectrum {
    pub(crate) grid: Grid2D,
    pub(crate) qy: Vec<f64>,
    pub(crate) qx: Vec<f64>,
    pub(crate) spectra: Vec<Field2D>,
}

impl BeamSpectrum {
    pub fn new<B: SpectralBackend>(backend: &B, beam_modes: &[Field2D]) -> Self {
        let grid = beam_modes
            .first()
            .map(Field2D::grid)
            .unwrap_or_else(|| Grid2D::new(0, 0, 1.0, 1.0));
        let mut spectra = beam_modes.to_vec();
        backend.batch_forward_fft_2d(&mut spectra);
        Self {
            grid,
            qy: grid.qy(),
            qx: grid.qx(),
            spectra,
        }
    }

    pub fn num_modes(&self) -> usize {
        self.spectra.len()
    }

    /// `exp(-2 pi i (qy y + qx x))` on the FFT-ordered grid.
    pub fn phase_ramp(&self, position: [f64; 2]) -> Vec<Complex64> {
        let [y, x] = position;
        let nx = self.grid.nx;
        let mut ramp = Vec::with_capacity(self.grid.len());
        for &qy in &self.qy {
            for ix in 0..nx {
                ramp.push(Complex64::from_polar(1.0, -2.0 * PI * (qy * y + self.qx[ix] * x)));
            }
        }
        ramp
    }

    /// Every mode translated to `position`, back in real space.
    pub fn shifted<B: SpectralBackend>(&self, backend: &B, position: [f64; 2]) -> Vec<Field2D> {
        let ramp = self.phase_ramp(position);
        let mut shifted: Vec<Field2D> = self
            .spectra
            .iter()
            .map(|spectrum| {
                let mut field = spectrum.clone();
                field.mul_assign_elementwise(&ramp);
                field
            })
            .collect();
        backend.batch_inverse_fft_2d(&mut shifted);
        shifted
    }
}

/// Shift every beam mode to every position.
///
/// Output is indexed `[position][mode]` and preserves the input position
/// order. Positions are `(y, x)` in the same length unit as the grid
/// calibration.
pub fn shift_beam_fourier<B: SpectralBackend>(
    backend: &B,
    beam_modes: &[Field2D],
    positions: &[[f64; 2]],
) -> Vec<Vec<Field2D>> {
    let spectrum = BeamSpectrum::new(backend, beam_modes);
    positions
        .par_iter()
        .map(|&position| spectrum.shifted(backend, position))
        .collect()
}
