//! Calibrated arrays and incoherent probe-mode stacks.

use num_complex::Complex64;

use crate::{
    error::{PtychoError, Result},
    field::{Field2D, RealField2D},
    grid::Grid2D,
};

/// A 2D array with per-axis calibration and a fixed real/Fourier space tag.
///
/// The calibrations live on the grid (`dy`, `dx`). The `real_space` flag is
/// set once at construction and has no setter.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedArray<T> {
    grid: Grid2D,
    data: Vec<T>,
    real_space: bool,
}

impl<T> CalibratedArray<T> {
    pub fn new(data: Vec<T>, grid: Grid2D, real_space: bool) -> Result<Self> {
        if !(grid.dx.is_finite() && grid.dx > 0.0 && grid.dy.is_finite() && grid.dy > 0.0) {
            return Err(PtychoError::InvalidInput(format!(
                "calibrations must be positive and finite (dy={}, dx={})",
                grid.dy, grid.dx
            )));
        }
        if data.len() != grid.len() {
            return Err(PtychoError::ShapeMismatch(format!(
                "array has {} elements but grid {}x{} needs {}",
                data.len(),
                grid.ny,
                grid.nx,
                grid.len()
            )));
        }
        Ok(Self {
            grid,
            data,
            real_space,
        })
    }

    pub fn grid(&self) -> Grid2D {
        self.grid
    }

    pub fn calib_y(&self) -> f64 {
        self.grid.dy
    }

    pub fn calib_x(&self) -> f64 {
        self.grid.dx
    }

    pub fn real_space(&self) -> bool {
        self.real_space
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<T> {
        self.data
    }
}

impl CalibratedArray<f64> {
    pub fn from_real_field(field: RealField2D, real_space: bool) -> Result<Self> {
        let grid = field.grid();
        Self::new(field.into(), grid, real_space)
    }

    pub fn to_real_field(&self) -> RealField2D {
        RealField2D::from_vec(self.grid, self.data.clone())
    }
}

impl CalibratedArray<Complex64> {
    pub fn from_field(field: Field2D, real_space: bool) -> Result<Self> {
        let grid = field.grid();
        Self::new(field.into(), grid, real_space)
    }

    pub fn to_field(&self) -> Field2D {
        Field2D::from_vec(self.grid, self.data.clone())
    }
}

/// Relative tolerance when checking that mode pixels are square.
const SQUARE_RTOL: f64 = 1e-9;

fn square_pixels(grid: &Grid2D) -> bool {
    (grid.dx - grid.dy).abs() <= SQUARE_RTOL * grid.dx.abs().max(grid.dy.abs())
}

/// Mutually incoherent probe modes with non-negative weights summing to one.
///
/// Modes must have square pixels; they are relabelled onto a square grid
/// with pixel size `calib`.
/// The forward model consumes [`ProbeModes::weighted_fields`], i.e. each
/// mode scaled by `sqrt(weight)`, so the incoherent intensity sum is
/// `sum_m w_m |F(mode_m)|^2`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeModes {
    modes: Vec<Field2D>,
    weights: Vec<f64>,
    calib: f64,
}

impl ProbeModes {
    pub fn new(modes: Vec<Field2D>, weights: Vec<f64>, calib: f64) -> Result<Self> {
        if modes.is_empty() {
            return Err(PtychoError::InvalidInput(
                "probe needs at least one mode".into(),
            ));
        }
        if modes.len() != weights.len() {
            return Err(PtychoError::ShapeMismatch(format!(
                "{} modes but {} weights",
                modes.len(),
                weights.len()
            )));
        }
        let grid = modes[0].grid();
        if modes.iter().any(|mode| !mode.grid().same_shape(&grid)) {
            return Err(PtychoError::ShapeMismatch(
                "all probe modes must share one grid".into(),
            ));
        }
        if let Some(skewed) = modes.iter().map(Field2D::grid).find(|g| !square_pixels(g)) {
            return Err(PtychoError::ShapeMismatch(format!(
                "probe modes need square pixels, got dx={} dy={}",
                skewed.dx, skewed.dy
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(PtychoError::InvalidInput(
                "mode weights must be finite and non-negative".into(),
            ));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(PtychoError::InvalidInput(
                "mode weights must not all be zero".into(),
            ));
        }
        if !(calib.is_finite() && calib > 0.0) {
            return Err(PtychoError::InvalidInput(format!(
                "probe calibration must be positive, got {calib}"
            )));
        }
        let grid = Grid2D::square(grid.nx, grid.ny, calib);
        Ok(Self {
            modes: modes.into_iter().map(|mode| mode.with_grid(grid)).collect(),
            weights: normalize_mode_weights(&weights),
            calib,
        })
    }

    /// A single coherent mode with weight one.
    pub fn single(mode: Field2D, calib: f64) -> Result<Self> {
        Self::new(vec![mode], vec![1.0], calib)
    }

    /// Split a stack of weighted fields back into unit-power modes and power
    /// weights. Inverse of [`ProbeModes::weighted_fields`] up to the overall
    /// probe intensity, which is folded into the modes.
    pub fn from_weighted_fields(fields: Vec<Field2D>, calib: f64) -> Result<Self> {
        let powers: Vec<f64> = fields.iter().map(Field2D::power).collect();
        let total: f64 = powers.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(PtychoError::InvalidInput(
                "weighted probe fields carry no power".into(),
            ));
        }
        let modes = fields
            .into_iter()
            .zip(&powers)
            .map(|(mut field, &power)| {
                if power > 0.0 {
                    field.scale((total / power).sqrt());
                }
                field
            })
            .collect();
        Self::new(modes, powers, calib)
    }

    pub fn modes(&self) -> &[Field2D] {
        &self.modes
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn calib(&self) -> f64 {
        self.calib
    }

    pub fn num_modes(&self) -> usize {
        self.modes.len()
    }

    pub fn grid(&self) -> Grid2D {
        self.modes[0].grid()
    }

    /// `sqrt(w_m) * mode_m` for every mode.
    pub fn weighted_fields(&self) -> Vec<Field2D> {
        self.modes
            .iter()
            .zip(&self.weights)
            .map(|(mode, &weight)| {
                let mut field = mode.clone();
                field.scale(weight.sqrt());
                field
            })
            .collect()
    }
}

/// Normalise mode weights to sum to one.
pub fn normalize_mode_weights(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| w / total).collect()
}
