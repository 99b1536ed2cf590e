#![cfg(test)]

use num_complex::Complex64;

use super::field::Field2D;
use super::grid::{roll, Grid2D};
use super::reference::ReferenceBackend;
use super::shift::{shift_beam_fourier, BeamSpectrum};

fn blob(grid: Grid2D) -> Field2D {
    Field2D::from_fn(grid, |ix, iy| {
        let x = ix as f64 - grid.nx as f64 / 2.0;
        let y = iy as f64 - grid.ny as f64 / 2.0;
        Complex64::new((-(x * x + y * y) / 4.0).exp(), 0.1 * x)
    })
}

fn max_diff(a: &Field2D, b: &Field2D) -> f64 {
    a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (x - y).norm())
        .fold(0.0, f64::max)
}

#[test]
fn zero_shift_is_identity() {
    let grid = Grid2D::square(8, 8, 0.5);
    let beam = blob(grid);
    let shifted = shift_beam_fourier(&ReferenceBackend, &[beam.clone()], &[[0.0, 0.0]]);
    assert_eq!(shifted.len(), 1);
    assert_eq!(shifted[0].len(), 1);
    assert!(max_diff(&shifted[0][0], &beam) < 1e-12);
}

#[test]
fn whole_pixel_shift_matches_roll() {
    let grid = Grid2D::square(8, 6, 0.5);
    let beam = blob(grid);
    // One pixel down and two to the right.
    let shifted = shift_beam_fourier(&ReferenceBackend, &[beam.clone()], &[[0.5, 1.0]]);
    let expected = Field2D::from_vec(grid, roll(beam.as_slice(), grid.nx, grid.ny, 1, 2));
    let diff = max_diff(&shifted[0][0], &expected);
    assert!(diff < 1e-10, "shift vs roll mismatch: {diff}");
}

#[test]
fn shift_and_shift_back_recovers_beam() {
    let grid = Grid2D::square(8, 8, 0.3);
    let beam = blob(grid);
    let backend = ReferenceBackend;
    let there = shift_beam_fourier(&backend, &[beam.clone()], &[[0.37, -0.81]]);
    let back = shift_beam_fourier(&backend, &there[0], &[[-0.37, 0.81]]);
    let diff = max_diff(&back[0][0], &beam);
    assert!(diff < 1e-10, "round trip error {diff}");
}

#[test]
fn subpixel_shift_preserves_power() {
    let grid = Grid2D::square(8, 8, 0.3);
    let beam = blob(grid);
    let shifted = shift_beam_fourier(&ReferenceBackend, &[beam.clone()], &[[0.11, 0.23]]);
    assert!((shifted[0][0].power() - beam.power()).abs() < 1e-10);
}

#[test]
fn output_is_indexed_position_then_mode() {
    let grid = Grid2D::square(4, 4, 1.0);
    let a = blob(grid);
    let mut b = blob(grid);
    b.scale(2.0);
    let positions = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
    let shifted = shift_beam_fourier(&ReferenceBackend, &[a.clone(), b.clone()], &positions);
    assert_eq!(shifted.len(), 3);
    for per_position in &shifted {
        assert_eq!(per_position.len(), 2);
        assert!((per_position[1].power() - 4.0 * per_position[0].power()).abs() < 1e-9);
    }
    assert!(max_diff(&shifted[0][1], &b) < 1e-12);
}

#[test]
fn phase_ramp_is_unit_modulus() {
    let grid = Grid2D::new(5, 3, 0.7, 0.4);
    let spectrum = BeamSpectrum::new(&ReferenceBackend, &[blob(grid)]);
    assert_eq!(spectrum.num_modes(), 1);
    let ramp = spectrum.phase_ramp([0.3, -1.2]);
    assert_eq!(ramp.len(), grid.len());
    assert!(ramp.iter().all(|r| (r.norm() - 1.0).abs() < 1e-12));
    assert!((ramp[0] - Complex64::new(1.0, 0.0)).norm() < 1e-12);
}
