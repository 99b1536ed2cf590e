//! Core physics, forward models, and reconstruction loops for multislice
//! electron ptychography.

pub mod adjoint;
pub mod backend;
pub mod calibrated;
pub mod error;
pub mod field;
pub mod grid;
pub mod io;
pub mod loss;
pub mod metrics;
pub mod multislice;
pub mod optimizer;
pub mod photons;
pub mod probe;
pub mod propagation;
pub mod reconstruction;
pub mod reference;
pub mod shift;
pub mod units;
pub mod validate;

#[cfg(test)]
mod _tests_adjoint;
#[cfg(test)]
mod _tests_backend;
#[cfg(test)]
mod _tests_field;
#[cfg(test)]
mod _tests_grid;
#[cfg(test)]
mod _tests_probe;
#[cfg(test)]
mod _tests_shift;
#[cfg(test)]
mod _tests_units;
