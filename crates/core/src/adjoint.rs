//! Reverse-mode gradients of the 4D-STEM loss.
//!
//! The forward chain for one scan position and one probe mode is
//!
//! ```text
//! psi --FFT--> Psi --*R(p)--> --IFFT--> w_0
//! u_s = T_s * w_s,  w_{s+1} = IFFT(K * FFT(u_s))
//! Phi = fftshift(FFT(u_{S-1})),  I += |Phi|^2,  L = loss(I, data)
//! ```
//!
//! and [`Stem4dObjective`] walks it backwards by hand. Complex gradients use
//! the steepest-ascent convention `dL/dRe z + i dL/dIm z`, so a descent step
//! is `z -= lr * grad` with no conjugation. The per-slice incident waves are
//! recomputed per position during the backward sweep instead of being kept
//! for the whole scan.

use std::f64::consts::PI;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::{
    backend::SpectralBackend,
    error::{PtychoError, Result},
    field::{Field2D, RealField2D},
    grid::ifft_shift,
    loss::{LossEval, LossKind},
    multislice::{simulate_positions, MultisliceSetup},
    shift::BeamSpectrum,
};

/// Everything the forward model depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Potential slices, entrance side first.
    pub potential: Vec<RealField2D>,
    /// Probe modes as weighted fields (`sqrt(w) * mode`).
    pub beam: Vec<Field2D>,
    /// Scan positions `(y, x)` in grid length units.
    pub positions: Vec<[f64; 2]>,
}

/// Which parameter groups to differentiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Wrt {
    pub potential: bool,
    pub beam: bool,
    pub positions: bool,
}

impl Wrt {
    pub const OBJECT_AND_BEAM: Wrt = Wrt {
        potential: true,
        beam: true,
        positions: false,
    };

    pub const ALL: Wrt = Wrt {
        potential: true,
        beam: true,
        positions: true,
    };
}

/// Gradients of the requested groups; `None` for groups not asked for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gradients {
    pub potential: Option<Vec<RealField2D>>,
    pub beam: Option<Vec<Field2D>>,
    pub positions: Option<Vec<[f64; 2]>>,
}

impl Gradients {
    pub fn is_finite(&self) -> bool {
        let potential_ok = self
            .potential
            .as_ref()
            .map_or(true, |slices| slices.iter().all(RealField2D::is_finite));
        let beam_ok = self
            .beam
            .as_ref()
            .map_or(true, |modes| modes.iter().all(Field2D::is_finite));
        let positions_ok = self.positions.as_ref().map_or(true, |positions| {
            positions.iter().flatten().all(|v| v.is_finite())
        });
        potential_ok && beam_ok && positions_ok
    }
}

/// A differentiable scalar objective over [`Parameters`].
pub trait GradientSource {
    fn value(&self, params: &Parameters) -> Result<f64>;

    fn value_and_grad(&self, params: &Parameters, wrt: Wrt) -> Result<(f64, Gradients)>;
}

/// Loss between simulated 4D-STEM patterns and measured data.
pub struct Stem4dObjective<'a, B: SpectralBackend> {
    backend: &'a B,
    data: &'a [RealField2D],
    loss: LossKind,
    thickness: f64,
    voltage_kv: f64,
}

impl<'a, B: SpectralBackend> Stem4dObjective<'a, B> {
    pub fn new(
        backend: &'a B,
        data: &'a [RealField2D],
        loss: LossKind,
        thickness: f64,
        voltage_kv: f64,
    ) -> Self {
        Self {
            backend,
            data,
            loss,
            thickness,
            voltage_kv,
        }
    }

    pub fn loss_kind(&self) -> LossKind {
        self.loss
    }

    /// Forward model only.
    pub fn simulate(&self, params: &Parameters) -> Result<Vec<RealField2D>> {
        self.check(params)?;
        let (setup, transmissions, spectrum) = self.prepare(params);
        Ok(simulate_positions(
            self.backend,
            &setup,
            &transmissions,
            &spectrum,
            &params.positions,
        ))
    }

    fn check(&self, params: &Parameters) -> Result<()> {
        if params.potential.is_empty() {
            return Err(PtychoError::InvalidInput(
                "at least one potential slice is required".into(),
            ));
        }
        if params.beam.is_empty() {
            return Err(PtychoError::InvalidInput(
                "at least one probe mode is required".into(),
            ));
        }
        if params.positions.len() != self.data.len() {
            return Err(PtychoError::ShapeMismatch(format!(
                "{} scan positions but {} diffraction patterns",
                params.positions.len(),
                self.data.len()
            )));
        }
        Ok(())
    }

    fn prepare(&self, params: &Parameters) -> (MultisliceSetup, Vec<Field2D>, BeamSpectrum) {
        let grid = params.beam[0].grid();
        let setup = MultisliceSetup::new(grid, self.thickness, self.voltage_kv);
        let transmissions = setup.transmissions(&params.potential);
        let spectrum = BeamSpectrum::new(self.backend, &params.beam);
        (setup, transmissions, spectrum)
    }
}

impl<B: SpectralBackend> GradientSource for Stem4dObjective<'_, B> {
    fn value(&self, params: &Parameters) -> Result<f64> {
        let model = self.simulate(params)?;
        Ok(self.loss.value(&model, self.data))
    }

    fn value_and_grad(&self, params: &Parameters, wrt: Wrt) -> Result<(f64, Gradients)> {
        self.check(params)?;
        let (setup, transmissions, spectrum) = self.prepare(params);
        let model = simulate_positions(
            self.backend,
            &setup,
            &transmissions,
            &spectrum,
            &params.positions,
        );
        let eval = self.loss.evaluate(&model, self.data);
        if wrt == Wrt::default() {
            return Ok((eval.value, Gradients::default()));
        }

        let sweep = BackwardSweep {
            backend: self.backend,
            setup: &setup,
            transmissions: &transmissions,
            spectrum: &spectrum,
            eval: &eval,
            wrt,
        };
        let acc = sweep.run(&params.positions);
        Ok((eval.value, sweep.finish(acc)))
    }
}

/// Gradient sums over scan positions.
struct Accumulator {
    /// `dL/dT_s` per slice.
    d_transmission: Vec<Field2D>,
    /// `dL/dPsi_m` per mode, in Fourier space.
    d_spectrum: Vec<Field2D>,
    d_positions: Vec<[f64; 2]>,
}

impl Accumulator {
    fn zeros(sweep: &BackwardSweep<'_, impl SpectralBackend>, num_positions: usize) -> Self {
        let grid = sweep.setup.grid;
        let slices = if sweep.wrt.potential {
            sweep.transmissions.len()
        } else {
            0
        };
        let modes = if sweep.wrt.beam {
            sweep.spectrum.num_modes()
        } else {
            0
        };
        let positions = if sweep.wrt.positions { num_positions } else { 0 };
        Self {
            d_transmission: vec![Field2D::zeros(grid); slices],
            d_spectrum: vec![Field2D::zeros(grid); modes],
            d_positions: vec![[0.0; 2]; positions],
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (dst, src) in self.d_transmission.iter_mut().zip(&other.d_transmission) {
            dst.axpy(Complex64::new(1.0, 0.0), src);
        }
        for (dst, src) in self.d_spectrum.iter_mut().zip(&other.d_spectrum) {
            dst.axpy(Complex64::new(1.0, 0.0), src);
        }
        for (dst, src) in self.d_positions.iter_mut().zip(&other.d_positions) {
            dst[0] += src[0];
            dst[1] += src[1];
        }
        self
    }
}

struct BackwardSweep<'s, B: SpectralBackend> {
    backend: &'s B,
    setup: &'s MultisliceSetup,
    transmissions: &'s [Field2D],
    spectrum: &'s BeamSpectrum,
    eval: &'s LossEval,
    wrt: Wrt,
}

impl<B: SpectralBackend> BackwardSweep<'_, B> {
    fn run(&self, positions: &[[f64; 2]]) -> Accumulator {
        positions
            .par_iter()
            .enumerate()
            .fold(
                || Accumulator::zeros(self, positions.len()),
                |mut acc, (index, &position)| {
                    self.accumulate_position(&mut acc, index, position);
                    acc
                },
            )
            .reduce(|| Accumulator::zeros(self, positions.len()), Accumulator::merge)
    }

    fn accumulate_position(&self, acc: &mut Accumulator, index: usize, position: [f64; 2]) {
        let grid = self.setup.grid;
        let n = grid.len() as f64;
        let ramp = self.spectrum.phase_ramp(position);
        let d_pattern = self.eval.d_model[index].as_slice();
        let num_slices = self.transmissions.len();

        for (mode, spectrum) in self.spectrum.spectra.iter().enumerate() {
            // Forward tape: incident wave of every slice.
            let mut wave = spectrum.clone();
            wave.mul_assign_elementwise(&ramp);
            self.backend.inverse_fft_2d(&mut wave);
            let mut incident = Vec::with_capacity(num_slices);
            for (s, transmission) in self.transmissions.iter().enumerate() {
                if s > 0 {
                    self.setup.propagate(self.backend, &mut wave);
                }
                incident.push(wave.clone());
                wave.mul_assign_elementwise(transmission.as_slice());
            }
            let far = self.setup.far_field(self.backend, wave);

            // |Phi|^2 -> Phi -> unshifted spectrum -> exit wave.
            let d_far: Vec<Complex64> = far
                .as_slice()
                .iter()
                .zip(d_pattern)
                .map(|(&phi, &g)| phi * (2.0 * g))
                .collect();
            let mut d_wave = Field2D::from_vec(grid, ifft_shift(&d_far, grid.nx, grid.ny));
            self.backend.inverse_fft_2d(&mut d_wave);
            d_wave.scale(n);

            for s in (0..num_slices).rev() {
                let transmission = self.transmissions[s].as_slice();
                if self.wrt.potential {
                    let d_t = acc.d_transmission[s].as_mut_slice();
                    for ((dst, w), g) in d_t.iter_mut().zip(incident[s].as_slice()).zip(d_wave.as_slice()) {
                        *dst += w.conj() * g;
                    }
                }
                for (g, t) in d_wave.as_mut_slice().iter_mut().zip(transmission) {
                    *g *= t.conj();
                }
                if s > 0 {
                    self.setup.propagate_adjoint(self.backend, &mut d_wave);
                }
            }

            // Entrance wave -> shifted spectrum.
            self.backend.forward_fft_2d(&mut d_wave);
            d_wave.scale(1.0 / n);

            if self.wrt.beam {
                let d_spec = acc.d_spectrum[mode].as_mut_slice();
                for ((dst, r), g) in d_spec.iter_mut().zip(&ramp).zip(d_wave.as_slice()) {
                    *dst += r.conj() * g;
                }
            }
            if self.wrt.positions {
                let [dy, dx] = self.position_gradient(spectrum, &ramp, &d_wave);
                acc.d_positions[index][0] += dy;
                acc.d_positions[index][1] += dx;
            }
        }
    }

    /// `dR/dy = -2 pi i qy R`, so `dL/dy = sum 2 pi qy Im(Psi R conj(g))`.
    fn position_gradient(&self, spectrum: &Field2D, ramp: &[Complex64], d_shifted: &Field2D) -> [f64; 2] {
        let nx = self.setup.grid.nx;
        let qy = &self.spectrum.qy;
        let qx = &self.spectrum.qx;
        let mut dy = 0.0;
        let mut dx = 0.0;
        for (i, ((psi, r), g)) in spectrum
            .as_slice()
            .iter()
            .zip(ramp)
            .zip(d_shifted.as_slice())
            .enumerate()
        {
            let im = (psi * r * g.conj()).im;
            dy += qy[i / nx] * im;
            dx += qx[i % nx] * im;
        }
        [2.0 * PI * dy, 2.0 * PI * dx]
    }

    fn finish(&self, acc: Accumulator) -> Gradients {
        let potential = self.wrt.potential.then(|| {
            acc.d_transmission
                .iter()
                .zip(self.transmissions)
                .map(|(d_t, t)| {
                    let values = d_t
                        .as_slice()
                        .iter()
                        .zip(t.as_slice())
                        .map(|(g, t)| -self.setup.sigma * (g.conj() * t).im)
                        .collect();
                    RealField2D::from_vec(self.setup.grid, values)
                })
                .collect()
        });
        let beam = self.wrt.beam.then(|| {
            let n = self.setup.grid.len() as f64;
            let mut modes = acc.d_spectrum;
            self.backend.batch_inverse_fft_2d(&mut modes);
            for mode in &mut modes {
                mode.scale(n);
            }
            modes
        });
        let positions = self.wrt.positions.then_some(acc.d_positions);
        Gradients {
            potential,
            beam,
            positions,
        }
    }
}
