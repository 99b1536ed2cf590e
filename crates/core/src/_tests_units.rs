#![cfg(test)]

use super::units::{interaction_sigma, wavelength_ang};

#[test]
fn wavelength_matches_reference_values() {
    let cases = [
        (200.0, 0.025_079_3, 1e-6),
        (300.0, 0.019_687_5, 1e-6),
        (1000.0, 0.008_719_2, 1e-6),
        (150.0, 0.029_57, 1e-5),
        (100.0, 0.037_014, 1e-5),
    ];
    for (kv, expected, atol) in cases {
        let lambda = wavelength_ang(kv);
        assert!(
            (lambda - expected).abs() < atol,
            "{kv} kV: got {lambda}, expected {expected}"
        );
    }
}

#[test]
fn wavelength_decreases_with_voltage() {
    let voltages = [20.0, 60.0, 80.0, 120.0, 200.0, 300.0, 1000.0];
    for pair in voltages.windows(2) {
        assert!(wavelength_ang(pair[1]) < wavelength_ang(pair[0]));
    }
}

#[test]
fn wavelength_is_positive_and_finite() {
    for kv in [1.0, 10.0, 100.0, 1e4] {
        let lambda = wavelength_ang(kv);
        assert!(lambda.is_finite() && lambda > 0.0);
    }
}

#[test]
fn interaction_constant_at_200kv() {
    let sigma = interaction_sigma(200.0);
    assert!((sigma - 7.288e-4).abs() < 1e-6, "sigma = {sigma}");
}

#[test]
fn interaction_constant_decreases_with_voltage() {
    assert!(interaction_sigma(300.0) < interaction_sigma(200.0));
    assert!(interaction_sigma(200.0) < interaction_sigma(80.0));
}
