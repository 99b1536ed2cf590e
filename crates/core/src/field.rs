//! Contiguous complex and real field storage on a uniform 2D grid.
//!
//! Everything is stored in double precision. Phase-sensitive work such as the
//! multislice recursion and the adjoint accumulates rounding error quickly in
//! single precision, so there is no reduced-precision storage mode.

use num_complex::Complex64;

use crate::grid::Grid2D;

/// Complex wave field (probe, exit wave, transfer function).
#[derive(Debug, Clone, PartialEq)]
pub struct Field2D {
    grid: Grid2D,
    data: Vec<Complex64>,
}

impl Field2D {
    pub fn zeros(grid: Grid2D) -> Self {
        Self {
            data: vec![Complex64::default(); grid.len()],
            grid,
        }
    }

    pub fn from_vec(grid: Grid2D, data: Vec<Complex64>) -> Self {
        assert_eq!(data.len(), grid.len(), "data length must match grid size");
        Self { grid, data }
    }

    /// Build a field by evaluating `f(ix, iy)` at every pixel.
    pub fn from_fn<F>(grid: Grid2D, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> Complex64,
    {
        let mut data = Vec::with_capacity(grid.len());
        for iy in 0..grid.ny {
            for ix in 0..grid.nx {
                data.push(f(ix, iy));
            }
        }
        Self { grid, data }
    }

    /// Promote a real array to a complex field with zero imaginary part.
    pub fn from_real(real: &RealField2D) -> Self {
        Self {
            grid: real.grid(),
            data: real
                .as_slice()
                .iter()
                .map(|&v| Complex64::new(v, 0.0))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn grid(&self) -> Grid2D {
        self.grid
    }

    pub fn idx(&self, ix: usize, iy: usize) -> usize {
        self.grid.idx(ix, iy)
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    pub fn get(&self, ix: usize, iy: usize) -> &Complex64 {
        let idx = self.idx(ix, iy);
        &self.data[idx]
    }

    pub fn get_mut(&mut self, ix: usize, iy: usize) -> &mut Complex64 {
        let idx = self.idx(ix, iy);
        &mut self.data[idx]
    }

    pub fn fill(&mut self, value: Complex64) {
        self.data.fill(value);
    }

    /// Elementwise product in place.
    pub fn mul_assign_elementwise(&mut self, other: &[Complex64]) {
        for (value, &factor) in self.data.iter_mut().zip(other) {
            *value *= factor;
        }
    }

    /// `self += alpha * other`.
    pub fn axpy(&mut self, alpha: Complex64, other: &Field2D) {
        for (dst, src) in self.data.iter_mut().zip(other.as_slice()) {
            *dst += alpha * src;
        }
    }

    pub fn scale(&mut self, alpha: f64) {
        for value in &mut self.data {
            *value *= alpha;
        }
    }

    /// `|z|^2` per pixel.
    pub fn intensity(&self) -> RealField2D {
        RealField2D::from_vec(self.grid, self.data.iter().map(|v| v.norm_sqr()).collect())
    }

    /// Total power `sum |z|^2`.
    pub fn power(&self) -> f64 {
        self.data.iter().map(|v| v.norm_sqr()).sum()
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.re.is_finite() && v.im.is_finite())
    }

    /// Same data re-labelled with a different calibration.
    pub fn with_grid(mut self, grid: Grid2D) -> Self {
        assert_eq!(grid.len(), self.data.len(), "data length must match grid size");
        self.grid = grid;
        self
    }
}

impl From<Field2D> for Vec<Complex64> {
    fn from(field: Field2D) -> Self {
        field.data
    }
}

/// Real-valued array on a grid (potential slice, diffraction pattern).
#[derive(Debug, Clone, PartialEq)]
pub struct RealField2D {
    grid: Grid2D,
    data: Vec<f64>,
}

impl RealField2D {
    pub fn zeros(grid: Grid2D) -> Self {
        Self {
            data: vec![0.0; grid.len()],
            grid,
        }
    }

    pub fn filled(grid: Grid2D, value: f64) -> Self {
        Self {
            data: vec![value; grid.len()],
            grid,
        }
    }

    pub fn from_vec(grid: Grid2D, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), grid.len(), "data length must match grid size");
        Self { grid, data }
    }

    pub fn from_fn<F>(grid: Grid2D, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut data = Vec::with_capacity(grid.len());
        for iy in 0..grid.ny {
            for ix in 0..grid.nx {
                data.push(f(ix, iy));
            }
        }
        Self { grid, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn grid(&self) -> Grid2D {
        self.grid
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        self.data[self.grid.idx(ix, iy)]
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn with_grid(mut self, grid: Grid2D) -> Self {
        assert_eq!(grid.len(), self.data.len(), "data length must match grid size");
        self.grid = grid;
        self
    }
}

impl From<RealField2D> for Vec<f64> {
    fn from(field: RealField2D) -> Self {
        field.data
    }
}
