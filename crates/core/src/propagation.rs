//! Slice transmission, Fresnel propagation and Fourier-space coordinates.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::{
    calibrated::CalibratedArray,
    error::Result,
    field::{Field2D, RealField2D},
    grid::Grid2D,
    units::{interaction_sigma, wavelength_ang},
};

/// Complex transmission function `exp(i sigma V)` of one potential slice.
///
/// A real potential gives a pure phase object: `|t| == 1` everywhere. The
/// input is assumed clean (finite potential, positive voltage).
pub fn transmission_func(pot_slice: &RealField2D, voltage_kv: f64) -> Field2D {
    transmission_with_sigma(pot_slice, interaction_sigma(voltage_kv))
}

pub(crate) fn transmission_with_sigma(pot_slice: &RealField2D, sigma: f64) -> Field2D {
    Field2D::from_vec(
        pot_slice.grid(),
        pot_slice
            .as_slice()
            .iter()
            .map(|&v| Complex64::from_polar(1.0, sigma * v))
            .collect(),
    )
}

/// Fresnel free-space propagator over `thickness` Å, in FFT order.
///
/// `P(q) = exp(-i pi lambda t |q|^2)` with `q` sampled by
/// [`crate::grid::fft_freq`], so it multiplies an FFT output directly.
pub fn propagation_func(grid: Grid2D, thickness: f64, voltage_kv: f64) -> Field2D {
    let lambda = wavelength_ang(voltage_kv);
    let qy = grid.qy();
    let qx = grid.qx();
    Field2D::from_fn(grid, |ix, iy| {
        let q_sq = qy[iy] * qy[iy] + qx[ix] * qx[ix];
        Complex64::from_polar(1.0, -PI * lambda * thickness * q_sq)
    })
}

/// Fourier-space calibration `[1 / fov_y, 1 / fov_x]`.
pub fn fourier_calib(grid: Grid2D) -> [f64; 2] {
    let [fov_y, fov_x] = grid.field_of_view();
    [1.0 / fov_y, 1.0 / fov_x]
}

/// Radial spatial frequency `|q|` on the FFT-ordered grid, tagged as Fourier
/// space and calibrated with [`fourier_calib`].
pub fn fourier_coords(grid: Grid2D) -> Result<CalibratedArray<f64>> {
    let qy = grid.qy();
    let qx = grid.qx();
    let [calib_y, calib_x] = fourier_calib(grid);
    let magnitude = RealField2D::from_fn(grid, |ix, iy| qy[iy].hypot(qx[ix]));
    let inverse_grid = Grid2D::new(grid.nx, grid.ny, calib_x, calib_y);
    CalibratedArray::new(magnitude.into(), inverse_grid, false)
}
