#![cfg(test)]

use num_complex::Complex64;

use super::field::{Field2D, RealField2D};
use super::grid::Grid2D;

#[test]
fn zeros_initializes_all_entries_to_zero() {
    let grid = Grid2D::new(2, 3, 1.0, 1.0);
    let field = Field2D::zeros(grid);
    assert_eq!(field.len(), grid.len());
    assert!(field.as_slice().iter().all(|value| *value == Complex64::default()));
}

#[test]
#[should_panic(expected = "data length must match grid size")]
fn from_vec_rejects_mismatched_lengths() {
    let grid = Grid2D::new(2, 2, 1.0, 1.0);
    let data = vec![Complex64::default(); grid.len() - 1];
    let _ = Field2D::from_vec(grid, data);
}

#[test]
fn idx_matches_underlying_grid_row_major_convention() {
    let grid = Grid2D::new(3, 2, 1.0, 1.0);
    let field = Field2D::zeros(grid);
    for iy in 0..grid.ny {
        for ix in 0..grid.nx {
            assert_eq!(field.idx(ix, iy), iy * grid.nx + ix);
        }
    }
}

#[test]
fn from_fn_and_get_agree() {
    let grid = Grid2D::new(3, 2, 1.0, 1.0);
    let mut field = Field2D::from_fn(grid, |ix, iy| Complex64::new(ix as f64, iy as f64));
    assert_eq!(*field.get(2, 1), Complex64::new(2.0, 1.0));
    *field.get_mut(0, 1) = Complex64::new(-5.0, 0.5);
    assert_eq!(field.as_slice()[3], Complex64::new(-5.0, 0.5));
}

#[test]
fn axpy_scale_and_elementwise_product() {
    let grid = Grid2D::new(2, 2, 1.0, 1.0);
    let mut y = Field2D::from_fn(grid, |_, _| Complex64::new(1.0, 0.0));
    let x = Field2D::from_fn(grid, |ix, _| Complex64::new(0.0, ix as f64));
    y.axpy(Complex64::new(2.0, 0.0), &x);
    assert_eq!(*y.get(1, 0), Complex64::new(1.0, 2.0));

    y.scale(0.5);
    assert_eq!(*y.get(1, 1), Complex64::new(0.5, 1.0));

    let factor = vec![Complex64::new(0.0, 1.0); grid.len()];
    y.mul_assign_elementwise(&factor);
    assert_eq!(*y.get(0, 0), Complex64::new(0.0, 0.5));
}

#[test]
fn intensity_and_power() {
    let grid = Grid2D::new(2, 1, 1.0, 1.0);
    let field = Field2D::from_vec(grid, vec![Complex64::new(3.0, 4.0), Complex64::new(0.0, 1.0)]);
    let intensity = field.intensity();
    assert_eq!(intensity.as_slice(), &[25.0, 1.0]);
    assert!((field.power() - 26.0).abs() < 1e-12);
}

#[test]
fn finiteness_checks_catch_nan() {
    let grid = Grid2D::new(2, 1, 1.0, 1.0);
    let mut field = Field2D::zeros(grid);
    assert!(field.is_finite());
    field.as_mut_slice()[1] = Complex64::new(0.0, f64::NAN);
    assert!(!field.is_finite());

    let mut real = RealField2D::filled(grid, 2.0);
    assert!(real.is_finite());
    real.as_mut_slice()[0] = f64::INFINITY;
    assert!(!real.is_finite());
}

#[test]
fn real_field_reductions() {
    let grid = Grid2D::new(3, 1, 1.0, 1.0);
    let real = RealField2D::from_vec(grid, vec![1.0, -2.0, 4.0]);
    assert_eq!(real.sum(), 3.0);
    assert_eq!(real.max(), 4.0);
    assert_eq!(real.get(1, 0), -2.0);
}

#[test]
fn from_real_promotes_with_zero_imaginary_part() {
    let grid = Grid2D::new(2, 2, 1.0, 1.0);
    let real = RealField2D::from_fn(grid, |ix, iy| (ix + 2 * iy) as f64);
    let field = Field2D::from_real(&real);
    for (z, r) in field.as_slice().iter().zip(real.as_slice()) {
        assert_eq!(z.re, *r);
        assert_eq!(z.im, 0.0);
    }
}

#[test]
fn with_grid_relabels_calibration() {
    let grid = Grid2D::new(2, 2, 1.0, 1.0);
    let field = Field2D::zeros(grid).with_grid(Grid2D::square(2, 2, 0.25));
    assert_eq!(field.grid().dx, 0.25);
    assert_eq!(field.grid().dy, 0.25);
}
