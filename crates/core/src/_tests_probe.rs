#![cfg(test)]

use std::f64::consts::PI;

use num_complex::Complex64;

use super::field::RealField2D;
use super::grid::Grid2D;
use super::probe::{
    aberration, initialize_random_modes, make_probe, AberrationCoefficients, ProbeParams,
};
use super::reference::ReferenceBackend;
use super::units::wavelength_ang;

#[test]
fn aberration_vanishes_without_coefficients() {
    let grid = Grid2D::square(4, 4, 1.0);
    let freq = RealField2D::from_fn(grid, |ix, iy| (ix + iy) as f64 * 0.1);
    let chi = aberration(&freq, 0.025, AberrationCoefficients::default());
    assert!(chi.as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn defocus_term_is_quadratic_in_frequency() {
    let grid = Grid2D::square(3, 1, 1.0);
    let freq = RealField2D::from_vec(grid, vec![0.0, 0.1, 0.2]);
    let lambda = 0.025;
    let coeffs = AberrationCoefficients {
        defocus: 100.0,
        ..Default::default()
    };
    let chi = aberration(&freq, lambda, coeffs);
    for (&q, &value) in freq.as_slice().iter().zip(chi.as_slice()) {
        let expected = PI * coeffs.defocus * lambda * q * q;
        assert!((value - expected).abs() < 1e-9, "q={q}: {value} vs {expected}");
    }
}

#[test]
fn spherical_aberration_uses_millimetre_scale() {
    let grid = Grid2D::square(1, 1, 1.0);
    let freq = RealField2D::from_vec(grid, vec![0.5]);
    let lambda = 0.02;
    let coeffs = AberrationCoefficients {
        c3: 1.0,
        ..Default::default()
    };
    let chi = aberration(&freq, lambda, coeffs);
    let p = lambda * 0.5;
    let expected = 2.0 * PI * (1e7 * p.powi(4) / 4.0) / lambda;
    assert!((chi.as_slice()[0] - expected).abs() < 1e-9 * expected.abs());
}

fn probe_params() -> ProbeParams {
    ProbeParams {
        aperture_mrad: 20.0,
        voltage_kv: 200.0,
        aberrations: AberrationCoefficients::default(),
    }
}

#[test]
fn unaberrated_probe_peaks_at_centre() {
    let grid = Grid2D::square(16, 16, 0.2);
    let probe = make_probe(&ReferenceBackend, grid, &probe_params());
    let intensity = probe.intensity();
    let centre = intensity.get(grid.nx / 2, grid.ny / 2);
    assert!((centre - intensity.max()).abs() < 1e-12);
}

#[test]
fn probe_power_matches_pupil_area() {
    let grid = Grid2D::square(16, 16, 0.2);
    let params = probe_params();
    let probe = make_probe(&ReferenceBackend, grid, &params);
    let q_max = params.aperture_mrad * 1e-3 / wavelength_ang(params.voltage_kv);
    let qx = grid.qx();
    let qy = grid.qy();
    let mut inside = 0usize;
    for &y in &qy {
        for &x in &qx {
            if y.hypot(x) <= q_max {
                inside += 1;
            }
        }
    }
    assert!(inside > 1, "aperture should pass more than the DC pixel");
    let expected = inside as f64 / grid.len() as f64;
    assert!((probe.power() - expected).abs() < 1e-9);
}

#[test]
fn defocus_spreads_the_probe() {
    let grid = Grid2D::square(16, 16, 0.2);
    let focused = make_probe(&ReferenceBackend, grid, &probe_params());
    let mut params = probe_params();
    params.aberrations.defocus = 200.0;
    let defocused = make_probe(&ReferenceBackend, grid, &params);
    let peak_focused = focused.intensity().max();
    let peak_defocused = defocused.intensity().max();
    assert!(peak_defocused < peak_focused);
    assert!((focused.power() - defocused.power()).abs() < 1e-9);
}

#[test]
fn random_modes_are_orthonormal_and_seeded() {
    let grid = Grid2D::square(6, 6, 1.0);
    let modes = initialize_random_modes(grid, 3, 42);
    assert_eq!(modes.len(), 3);
    for (i, a) in modes.iter().enumerate() {
        for (j, b) in modes.iter().enumerate() {
            let overlap: Complex64 = a
                .as_slice()
                .iter()
                .zip(b.as_slice())
                .map(|(x, y)| x.conj() * y)
                .sum();
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((overlap - Complex64::new(expected, 0.0)).norm() < 1e-10);
        }
    }
    let again = initialize_random_modes(grid, 3, 42);
    assert_eq!(modes, again);
    let other = initialize_random_modes(grid, 3, 7);
    assert_ne!(modes, other);
}
