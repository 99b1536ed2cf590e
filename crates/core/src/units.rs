//! Physical constants and the relativistic electron wavelength.
//!
//! None of these functions validate their input. Non-positive or non-finite
//! voltages produce NaN or infinities; callers go through
//! [`crate::validate::check_voltage`] first.

use std::f64::consts::PI;

/// Electron rest mass (kg).
pub const ELECTRON_MASS: f64 = 9.109383e-31;
/// Elementary charge (C).
pub const ELEMENTARY_CHARGE: f64 = 1.602177e-19;
/// Speed of light (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Planck constant (J s).
pub const PLANCK: f64 = 6.62607e-34;

const METRES_TO_ANGSTROM: f64 = 1e10;

/// Relativistic de Broglie wavelength in ångström for an accelerating
/// voltage in kV.
///
/// `lambda = h c / sqrt(eV (2 m c^2 + eV))`, with the numerator and
/// denominator formed separately so the small `h^2 c^2` term is not lost
/// against the rest-energy term.
pub fn wavelength_ang(voltage_kv: f64) -> f64 {
    let ev = voltage_kv * 1000.0 * ELEMENTARY_CHARGE;
    let c2 = SPEED_OF_LIGHT * SPEED_OF_LIGHT;
    let numerator = PLANCK * PLANCK * c2;
    let denominator = ev * (2.0 * ELECTRON_MASS * c2 + ev);
    METRES_TO_ANGSTROM * (numerator / denominator).sqrt()
}

/// Interaction constant sigma in rad / (V Å) for a voltage in kV.
///
/// Multiplying a projected potential in Kirkland units by sigma gives the
/// phase shift imparted on the electron wave.
pub fn interaction_sigma(voltage_kv: f64) -> f64 {
    let voltage = voltage_kv * 1000.0;
    let ev = ELEMENTARY_CHARGE * voltage;
    let rest_energy = ELECTRON_MASS * SPEED_OF_LIGHT * SPEED_OF_LIGHT;
    let lambda = wavelength_ang(voltage_kv);
    ((2.0 * PI / (lambda * voltage)) * (rest_energy + ev)) / (2.0 * rest_energy + ev)
}
