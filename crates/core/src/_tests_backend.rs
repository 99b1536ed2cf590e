#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};

use num_complex::Complex64;

use super::backend::SpectralBackend;
use super::field::Field2D;
use super::grid::Grid2D;
use super::reference::ReferenceBackend;

/// Counts transform calls so the default batch methods can be checked.
#[derive(Default)]
struct CountingBackend {
    forward: AtomicUsize,
    inverse: AtomicUsize,
}

impl SpectralBackend for CountingBackend {
    fn forward_fft_2d(&self, field: &mut Field2D) {
        self.forward.fetch_add(1, Ordering::Relaxed);
        ReferenceBackend.forward_fft_2d(field);
    }

    fn inverse_fft_2d(&self, field: &mut Field2D) {
        self.inverse.fetch_add(1, Ordering::Relaxed);
        ReferenceBackend.inverse_fft_2d(field);
    }
}

fn test_field(grid: Grid2D) -> Field2D {
    Field2D::from_fn(grid, |ix, iy| {
        Complex64::new((ix as f64 * 0.7).sin() + iy as f64, (iy as f64 * 1.3).cos() - ix as f64)
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
fn reference_roundtrip_recovers_input() {
    let grid = Grid2D::new(5, 4, 1.0, 1.0);
    let original = test_field(grid);
    let mut field = original.clone();
    let backend = ReferenceBackend::new();
    backend.forward_fft_2d(&mut field);
    backend.inverse_fft_2d(&mut field);
    let diff = max_diff(&field, &original);
    assert!(diff < 1e-12, "roundtrip error too large: {diff}");
}

#[test]
fn forward_transform_is_unnormalised() {
    let grid = Grid2D::new(4, 3, 1.0, 1.0);
    let mut field = Field2D::from_fn(grid, |_, _| Complex64::new(1.0, 0.0));
    ReferenceBackend.forward_fft_2d(&mut field);
    let dc = field.as_slice()[0];
    assert!((dc - Complex64::new(12.0, 0.0)).norm() < 1e-12, "dc = {dc}");
    for value in &field.as_slice()[1..] {
        assert!(value.norm() < 1e-12, "non-dc bin should vanish, got {value}");
    }
}

#[test]
fn plane_wave_lands_in_single_bin() {
    let grid = Grid2D::new(6, 4, 1.0, 1.0);
    let (kx, ky) = (2usize, 1usize);
    let mut field = Field2D::from_fn(grid, |ix, iy| {
        let phase = 2.0 * std::f64::consts::PI
            * (kx as f64 * ix as f64 / grid.nx as f64 + ky as f64 * iy as f64 / grid.ny as f64);
        Complex64::from_polar(1.0, phase)
    });
    ReferenceBackend.forward_fft_2d(&mut field);
    for iy in 0..grid.ny {
        for ix in 0..grid.nx {
            let value = field.get(ix, iy).norm();
            if ix == kx && iy == ky {
                assert!((value - grid.len() as f64).abs() < 1e-9);
            } else {
                assert!(value < 1e-9, "leakage at ({ix}, {iy}): {value}");
            }
        }
    }
}

#[test]
fn batch_defaults_visit_every_field() {
    let grid = Grid2D::new(3, 3, 1.0, 1.0);
    let backend = CountingBackend::default();
    let mut fields = vec![test_field(grid); 4];
    backend.batch_forward_fft_2d(&mut fields);
    backend.batch_inverse_fft_2d(&mut fields);
    assert_eq!(backend.forward.load(Ordering::Relaxed), 4);
    assert_eq!(backend.inverse.load(Ordering::Relaxed), 4);
    let diff = max_diff(&fields[2], &test_field(grid));
    assert!(diff < 1e-12);
}

#[test]
fn backend_names_are_reported() {
    assert_eq!(ReferenceBackend.name(), "reference-dft");
    assert!(CountingBackend::default().name().contains("CountingBackend"));
}
