//! Multislice CBED engine and 4D-STEM simulation.
//!
//! The wave is carried through the specimen one slice at a time: multiply by
//! the slice transmission function, then (except after the last slice)
//! propagate to the next slice in Fourier space. The exit wave is transformed
//! to the far field and its intensity summed incoherently over probe modes.
//!
//! No function here validates its input. Mismatched grids or empty stacks are
//! caller errors; see [`crate::validate`].

use rayon::prelude::*;

use crate::{
    backend::SpectralBackend,
    field::{Field2D, RealField2D},
    grid::{fft_shift, Grid2D},
    propagation::{propagation_func, transmission_with_sigma},
    shift::BeamSpectrum,
    units::interaction_sigma,
};

/// Quantities shared by every slice and every scan position.
#[derive(Debug, Clone)]
pub struct MultisliceSetup {
    pub grid: Grid2D,
    pub thickness: f64,
    pub voltage_kv: f64,
    pub sigma: f64,
    pub kernel: Field2D,
}

impl MultisliceSetup {
    pub fn new(grid: Grid2D, thickness: f64, voltage_kv: f64) -> Self {
        Self {
            grid,
            thickness,
            voltage_kv,
            sigma: interaction_sigma(voltage_kv),
            kernel: propagation_func(grid, thickness, voltage_kv),
        }
    }

    /// Transmission function of every slice in the stack.
    pub fn transmissions(&self, pot_slices: &[RealField2D]) -> Vec<Field2D> {
        pot_slices
            .iter()
            .map(|slice| transmission_with_sigma(slice, self.sigma))
            .collect()
    }

    /// Free-space propagation to the next slice: FFT, kernel, IFFT.
    pub(crate) fn propagate<B: SpectralBackend>(&self, backend: &B, wave: &mut Field2D) {
        backend.forward_fft_2d(wave);
        wave.mul_assign_elementwise(self.kernel.as_slice());
        backend.inverse_fft_2d(wave);
    }

    /// Adjoint of [`Self::propagate`]: FFT, conjugate kernel, IFFT. The
    /// transform scales cancel, so no extra normalisation is applied.
    pub(crate) fn propagate_adjoint<B: SpectralBackend>(&self, backend: &B, wave: &mut Field2D) {
        backend.forward_fft_2d(wave);
        for (value, k) in wave.as_mut_slice().iter_mut().zip(self.kernel.as_slice()) {
            *value *= k.conj();
        }
        backend.inverse_fft_2d(wave);
    }

    /// Real-space exit wave of one mode after the last slice.
    pub fn exit_wave<B: SpectralBackend>(
        &self,
        backend: &B,
        transmissions: &[Field2D],
        mut wave: Field2D,
    ) -> Field2D {
        let last = transmissions.len().saturating_sub(1);
        for (s, transmission) in transmissions.iter().enumerate() {
            wave.mul_assign_elementwise(transmission.as_slice());
            if s != last {
                self.propagate(backend, &mut wave);
            }
        }
        wave
    }

    /// Diffraction-plane amplitude: FFT of the exit wave, zero frequency
    /// moved to the centre.
    pub fn far_field<B: SpectralBackend>(&self, backend: &B, mut exit: Field2D) -> Field2D {
        backend.forward_fft_2d(&mut exit);
        let grid = exit.grid();
        Field2D::from_vec(grid, fft_shift(exit.as_slice(), grid.nx, grid.ny))
    }

    /// Incoherent CBED pattern `sum_m |far_field_m|^2`.
    pub fn pattern<B: SpectralBackend>(
        &self,
        backend: &B,
        transmissions: &[Field2D],
        modes: Vec<Field2D>,
    ) -> RealField2D {
        let mut pattern = RealField2D::zeros(self.grid);
        for mode in modes {
            let exit = self.exit_wave(backend, transmissions, mode);
            let far = self.far_field(backend, exit);
            for (acc, value) in pattern.as_mut_slice().iter_mut().zip(far.as_slice()) {
                *acc += value.norm_sqr();
            }
        }
        pattern
    }
}

/// CBED pattern for a stack of potential slices and a stack of probe modes.
///
/// Single-slice and single-mode inputs are one-element slices; there is no
/// special case. The beam grid defines the output grid.
pub fn cbed<B: SpectralBackend>(
    backend: &B,
    pot_slices: &[RealField2D],
    beam_modes: &[Field2D],
    thickness: f64,
    voltage_kv: f64,
) -> RealField2D {
    let grid = beam_modes[0].grid();
    let setup = MultisliceSetup::new(grid, thickness, voltage_kv);
    let transmissions = setup.transmissions(pot_slices);
    setup.pattern(backend, &transmissions, beam_modes.to_vec())
}

/// One CBED pattern per scan position.
///
/// The beam is Fourier-shifted to each `(y, x)` position and run through the
/// multislice engine independently; positions are processed in parallel and
/// the output order matches `positions`.
pub fn stem_4d<B: SpectralBackend>(
    backend: &B,
    pot_slices: &[RealField2D],
    beam_modes: &[Field2D],
    positions: &[[f64; 2]],
    thickness: f64,
    voltage_kv: f64,
) -> Vec<RealField2D> {
    let grid = beam_modes[0].grid();
    let setup = MultisliceSetup::new(grid, thickness, voltage_kv);
    let transmissions = setup.transmissions(pot_slices);
    let spectrum = BeamSpectrum::new(backend, beam_modes);
    simulate_positions(backend, &setup, &transmissions, &spectrum, positions)
}

pub(crate) fn simulate_positions<B: SpectralBackend>(
    backend: &B,
    setup: &MultisliceSetup,
    transmissions: &[Field2D],
    spectrum: &BeamSpectrum,
    positions: &[[f64; 2]],
) -> Vec<RealField2D> {
    positions
        .par_iter()
        .map(|&position| {
            let shifted = spectrum.shifted(backend, position);
            setup.pattern(backend, transmissions, shifted)
        })
        .collect()
}
