//! Tests for the CPU backend.
//!
//! The FFT is checked against analytic transforms and against the
//! direct-summation reference backend on non-square and non-power-of-two
//! grids.

#![cfg(test)]

use crate::CpuBackend;
use num_complex::Complex64;
use ptycho_core::backend::SpectralBackend;
use ptycho_core::field::Field2D;
use ptycho_core::grid::Grid2D;
use ptycho_core::reference::ReferenceBackend;
use std::f64::consts::PI;

fn textured(grid: Grid2D) -> Field2D {
    Field2D::from_fn(grid, |ix, iy| {
        let t = (iy * grid.nx + ix) as f64;
        Complex64::new((0.7 * t).sin() + 0.1 * t, (1.3 * t).cos())
    })
}

fn assert_fields_close(a: &Field2D, b: &Field2D, tol: f64) {
    for (idx, (x, y)) in a.as_slice().iter().zip(b.as_slice()).enumerate() {
        let diff = (*x - *y).norm();
        assert!(diff < tol, "index {idx}: {x} vs {y} (diff={diff})");
    }
}

// ============================================================================
// FFT Tests
// ============================================================================

#[test]
fn fft_roundtrip_recovers_signal() {
    let backend = CpuBackend::new();
    let mut field = textured(Grid2D::new(4, 4, 1.0, 1.0));
    let original = field.clone();

    backend.forward_fft_2d(&mut field);
    backend.inverse_fft_2d(&mut field);

    assert_fields_close(&field, &original, 1e-9);
}

#[test]
fn fft_preserves_energy_up_to_n() {
    let backend = CpuBackend::new();
    let mut field = textured(Grid2D::new(6, 2, 1.0, 1.0));
    let before = field.power();
    backend.forward_fft_2d(&mut field);
    let after = field.power() / 12.0;

    assert!(
        (before - after).abs() < 1e-9 * before,
        "Parseval violated: {before} vs {after}"
    );
}

#[test]
fn fft_forward_of_constant_is_dc_component() {
    let backend = CpuBackend::new();
    let grid = Grid2D::new(4, 4, 1.0, 1.0);
    let n = grid.len() as f64;
    let mut field = Field2D::zeros(grid);
    field.fill(Complex64::new(1.0, 0.0));

    backend.forward_fft_2d(&mut field);

    let dc = field.as_slice()[0];
    assert!(
        (dc - Complex64::new(n, 0.0)).norm() < 1e-9,
        "DC component should be {n}, got {dc}"
    );
    for (idx, &value) in field.as_slice().iter().enumerate().skip(1) {
        assert!(
            value.norm() < 1e-9,
            "Non-DC component at index {idx} should be zero, got {value}"
        );
    }
}

#[test]
fn fft_of_plane_wave_is_single_peak() {
    let backend = CpuBackend::new();
    let (nx, ny) = (8, 4);
    let grid = Grid2D::new(nx, ny, 1.0, 1.0);
    // one cycle along x, two along y
    let mut field = Field2D::from_fn(grid, |ix, iy| {
        let phase = 2.0 * PI * (ix as f64 / nx as f64 + 2.0 * iy as f64 / ny as f64);
        Complex64::from_polar(1.0, phase)
    });

    backend.forward_fft_2d(&mut field);

    let peak_idx = grid.idx(1, 2);
    let n = grid.len() as f64;
    for (idx, value) in field.as_slice().iter().enumerate() {
        let expected = if idx == peak_idx { n } else { 0.0 };
        assert!(
            (value.norm() - expected).abs() < 1e-9,
            "index {idx}: expected |F| = {expected}, got {value}"
        );
    }
}

#[test]
fn matches_reference_dft_on_odd_rectangular_grid() {
    let backend = CpuBackend::new();
    let grid = Grid2D::new(7, 5, 0.3, 0.2);
    let mut fast = textured(grid);
    let mut slow = fast.clone();

    backend.forward_fft_2d(&mut fast);
    ReferenceBackend.forward_fft_2d(&mut slow);
    assert_fields_close(&fast, &slow, 1e-9);

    backend.inverse_fft_2d(&mut fast);
    ReferenceBackend.inverse_fft_2d(&mut slow);
    assert_fields_close(&fast, &slow, 1e-9);
}

#[test]
fn large_grids_take_the_parallel_path() {
    let backend = CpuBackend::new();
    let grid = Grid2D::new(256, 128, 1.0, 1.0);
    let mut field = textured(grid);
    let original = field.clone();

    backend.forward_fft_2d(&mut field);
    let dc: Complex64 = original.as_slice().iter().sum();
    assert!((field.as_slice()[0] - dc).norm() < 1e-6 * dc.norm());

    backend.inverse_fft_2d(&mut field);
    assert_fields_close(&field, &original, 1e-8);
}

#[test]
fn transform_keeps_grid_calibration() {
    let backend = CpuBackend::new();
    let grid = Grid2D::new(6, 3, 0.25, 0.5);
    let mut field = textured(grid);
    backend.forward_fft_2d(&mut field);
    assert_eq!(field.grid(), grid);
}

// ============================================================================
// Batch Tests
// ============================================================================

#[test]
fn batch_transforms_match_individual_calls() {
    let backend = CpuBackend::new();
    let grid = Grid2D::new(6, 4, 1.0, 1.0);
    let originals: Vec<Field2D> = (0..3)
        .map(|k| {
            let mut field = textured(grid);
            field.scale(1.0 + k as f64);
            field
        })
        .collect();

    let mut batch = originals.clone();
    backend.batch_forward_fft_2d(&mut batch);
    for (batched, original) in batch.iter().zip(&originals) {
        let mut single = original.clone();
        backend.forward_fft_2d(&mut single);
        assert_fields_close(batched, &single, 1e-12);
    }

    backend.batch_inverse_fft_2d(&mut batch);
    for (restored, original) in batch.iter().zip(&originals) {
        assert_fields_close(restored, original, 1e-9);
    }
}

#[test]
fn plans_are_reused_across_grid_sizes() {
    let backend = CpuBackend::default();
    for n in [4, 5, 4, 9, 5] {
        let mut field = textured(Grid2D::new(n, n, 1.0, 1.0));
        let original = field.clone();
        backend.forward_fft_2d(&mut field);
        backend.inverse_fft_2d(&mut field);
        assert_fields_close(&field, &original, 1e-9);
    }
    assert_eq!(backend.name(), "cpu-rustfft");
}
