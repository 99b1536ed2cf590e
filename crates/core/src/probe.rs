//! Aberrated electron probe formation and probe-mode initialisation.

use std::f64::consts::PI;

use num_complex::Complex64;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::{
    backend::SpectralBackend,
    field::{Field2D, RealField2D},
    grid::{fft_shift, Grid2D},
    units::wavelength_ang,
};

/// Scale applied to C3 and C5 (millimetre → ångström).
const MM_TO_ANGSTROM: f64 = 1e7;

/// Round-lens aberration coefficients. Defocus in Å, C3 and C5 in mm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AberrationCoefficients {
    pub defocus: f64,
    pub c3: f64,
    pub c5: f64,
}

/// Probe-forming optics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeParams {
    /// Convergence semi-angle of the condenser aperture in mrad.
    pub aperture_mrad: f64,
    pub voltage_kv: f64,
    #[serde(default)]
    pub aberrations: AberrationCoefficients,
}

/// Aberration phase `2 pi chi / lambda` evaluated at spatial frequencies
/// `freq` (1/Å).
///
/// `chi = defocus p^2 / 2 + c3 1e7 p^4 / 4 + c5 1e7 p^6 / 6` with
/// `p = lambda |q|`.
pub fn aberration(freq: &RealField2D, lambda: f64, coeffs: AberrationCoefficients) -> RealField2D {
    let phase = freq
        .as_slice()
        .iter()
        .map(|&q| {
            let p2 = (lambda * q).powi(2);
            let chi = coeffs.defocus * p2 / 2.0
                + coeffs.c3 * MM_TO_ANGSTROM * p2.powi(2) / 4.0
                + coeffs.c5 * MM_TO_ANGSTROM * p2.powi(3) / 6.0;
            2.0 * PI * chi / lambda
        })
        .collect();
    RealField2D::from_vec(freq.grid(), phase)
}

/// Real-space probe from a circular pupil with aberrations.
///
/// The pupil passes `|q| <= alpha / lambda`, is multiplied by `exp(-i chi)`,
/// inverse transformed and centred on pixel `(ny / 2, nx / 2)`.
pub fn make_probe<B: SpectralBackend>(backend: &B, grid: Grid2D, params: &ProbeParams) -> Field2D {
    let lambda = wavelength_ang(params.voltage_kv);
    let q_max = params.aperture_mrad * 1e-3 / lambda;
    let qy = grid.qy();
    let qx = grid.qx();
    let q_mag = RealField2D::from_fn(grid, |ix, iy| qy[iy].hypot(qx[ix]));
    let chi = aberration(&q_mag, lambda, params.aberrations);

    let pupil: Vec<Complex64> = q_mag
        .as_slice()
        .iter()
        .zip(chi.as_slice())
        .map(|(&q, &phase)| {
            if q <= q_max {
                Complex64::from_polar(1.0, -phase)
            } else {
                Complex64::default()
            }
        })
        .collect();
    let mut probe = Field2D::from_vec(grid, pupil);
    backend.inverse_fft_2d(&mut probe);
    Field2D::from_vec(grid, fft_shift(probe.as_slice(), grid.nx, grid.ny))
}

/// `num_modes` random orthonormal modes drawn from a seeded complex normal
/// distribution and orthonormalised with modified Gram-Schmidt.
pub fn initialize_random_modes(grid: Grid2D, num_modes: usize, seed: u64) -> Vec<Field2D> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut modes: Vec<Field2D> = Vec::with_capacity(num_modes);
    for _ in 0..num_modes {
        let mut mode = Field2D::from_fn(grid, |_, _| {
            let re: f64 = StandardNormal.sample(&mut rng);
            let im: f64 = StandardNormal.sample(&mut rng);
            Complex64::new(re, im)
        });
        for previous in &modes {
            let overlap: Complex64 = previous
                .as_slice()
                .iter()
                .zip(mode.as_slice())
                .map(|(a, b)| a.conj() * b)
                .sum();
            mode.axpy(-overlap, previous);
        }
        let norm = mode.power().sqrt();
        if norm > 0.0 {
            mode.scale(1.0 / norm);
        }
        modes.push(mode);
    }
    modes
}
