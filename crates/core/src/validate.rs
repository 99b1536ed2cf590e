//! Precondition checks run before any numerical work.
//!
//! The kernels assume clean input. Entry points that accept user data (the
//! reconstruction loops, the CLI) call these first and surface a
//! [`PtychoError`] instead of producing NaNs deep inside an FFT.

use crate::{
    error::{PtychoError, Result},
    field::{Field2D, RealField2D},
    grid::Grid2D,
};

/// Relative tolerance when comparing calibrations of two grids.
const CALIB_RTOL: f64 = 1e-9;

/// Values that can be scanned for NaN or infinity.
pub trait Finite {
    fn all_finite(&self) -> bool;
}

impl Finite for RealField2D {
    fn all_finite(&self) -> bool {
        self.is_finite()
    }
}

impl Finite for Field2D {
    fn all_finite(&self) -> bool {
        self.is_finite()
    }
}

impl Finite for [f64; 2] {
    fn all_finite(&self) -> bool {
        self[0].is_finite() && self[1].is_finite()
    }
}

impl<T: Finite> Finite for [T] {
    fn all_finite(&self) -> bool {
        self.iter().all(Finite::all_finite)
    }
}

impl<T: Finite> Finite for Vec<T> {
    fn all_finite(&self) -> bool {
        self.as_slice().all_finite()
    }
}

pub fn check_voltage(voltage_kv: f64) -> Result<()> {
    if voltage_kv.is_finite() && voltage_kv > 0.0 {
        Ok(())
    } else {
        Err(PtychoError::InvalidInput(format!(
            "accelerating voltage must be positive and finite, got {voltage_kv} kV"
        )))
    }
}

pub fn check_thickness(thickness: f64) -> Result<()> {
    if thickness.is_finite() && thickness >= 0.0 {
        Ok(())
    } else {
        Err(PtychoError::InvalidInput(format!(
            "slice thickness must be non-negative and finite, got {thickness}"
        )))
    }
}

pub fn check_calibration(calib: f64) -> Result<()> {
    if calib.is_finite() && calib > 0.0 {
        Ok(())
    } else {
        Err(PtychoError::InvalidInput(format!(
            "calibration must be positive and finite, got {calib}"
        )))
    }
}

/// Reject NaN or infinite entries in `value`; `what` names it in the error.
pub fn check_finite<T: Finite + ?Sized>(what: &str, value: &T) -> Result<()> {
    if value.all_finite() {
        Ok(())
    } else {
        Err(PtychoError::InvalidInput(format!(
            "{what} contains non-finite values"
        )))
    }
}

/// Pixel counts must agree and calibrations must match to `1e-9` relative.
pub fn check_grid_match(what: &str, expected: Grid2D, actual: Grid2D) -> Result<()> {
    if !expected.same_shape(&actual) {
        return Err(PtychoError::ShapeMismatch(format!(
            "{what}: expected {}x{} grid, got {}x{}",
            expected.ny, expected.nx, actual.ny, actual.nx
        )));
    }
    let close = |a: f64, b: f64| (a - b).abs() <= CALIB_RTOL * a.abs().max(b.abs());
    if !(close(expected.dx, actual.dx) && close(expected.dy, actual.dy)) {
        return Err(PtychoError::ShapeMismatch(format!(
            "{what}: calibration ({}, {}) does not match ({}, {})",
            actual.dy, actual.dx, expected.dy, expected.dx
        )));
    }
    Ok(())
}

/// At least one position, all finite. Positions outside the field of view
/// are allowed; the Fourier shift wraps them periodically.
pub fn check_positions(positions: &[[f64; 2]]) -> Result<()> {
    if positions.is_empty() {
        return Err(PtychoError::InvalidInput(
            "scan position list is empty".into(),
        ));
    }
    check_finite("scan positions", positions)
}

/// One finite pattern per scan position, each on the beam's pixel grid.
pub fn check_data(data: &[RealField2D], num_positions: usize, grid: Grid2D) -> Result<()> {
    if data.len() != num_positions {
        return Err(PtychoError::ShapeMismatch(format!(
            "{} diffraction patterns for {num_positions} scan positions",
            data.len()
        )));
    }
    for (index, pattern) in data.iter().enumerate() {
        if !pattern.grid().same_shape(&grid) {
            return Err(PtychoError::ShapeMismatch(format!(
                "pattern {index} is {}x{}, expected {}x{}",
                pattern.grid().ny,
                pattern.grid().nx,
                grid.ny,
                grid.nx
            )));
        }
    }
    check_finite("experimental data", data)
}
