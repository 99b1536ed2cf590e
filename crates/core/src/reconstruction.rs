//! Gradient-based ptychographic reconstruction loops.
//!
//! All four public entry points share one engine: validate inputs, build a
//! [`Stem4dObjective`], then for a fixed number of iterations take the loss
//! and gradient of the active parameter groups and apply the configured
//! update rule to each group with its own optimizer state. There is no
//! convergence check; the iteration budget is the only stopping condition.

use std::time::Instant;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{
    adjoint::{GradientSource, Parameters, Stem4dObjective, Wrt},
    backend::SpectralBackend,
    calibrated::{CalibratedArray, ProbeModes},
    error::{PtychoError, Result},
    field::{Field2D, RealField2D},
    grid::Grid2D,
    loss::LossKind,
    metrics::{MetricsEvent, MetricsRecorder},
    optimizer::{Optimizer, OptimizerKind, ParamSlot},
    validate,
};

/// Default position learning rate of [`multi_slice_multi_modal`].
pub const DEFAULT_POS_LEARNING_RATE: f64 = 0.01;

/// Fallback learning rate of `single_slice_ptychography` and
/// `multi_slice_multi_modal`.
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;

/// Fallback learning rate of the single-slice variants that also refine
/// positions.
pub const DEFAULT_POSCORRECTED_LEARNING_RATE: f64 = 0.01;

/// Learning rate as a scalar or one value per parameter group.
///
/// A per-group list has one entry (applies to all), two entries
/// `[object, positions]` where the object rate covers potential and beam,
/// or three entries `[potential, beam, positions]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LearningRate {
    Scalar(f64),
    PerGroup(Vec<f64>),
}

impl From<f64> for LearningRate {
    fn from(value: f64) -> Self {
        LearningRate::Scalar(value)
    }
}

/// Learning rate resolved per parameter group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupRates {
    pub potential: f64,
    pub beam: f64,
    pub positions: f64,
}

impl LearningRate {
    pub fn resolve(&self) -> Result<GroupRates> {
        let rates = match self {
            LearningRate::Scalar(rate) => [*rate; 3],
            LearningRate::PerGroup(values) => match values.as_slice() {
                [all] => [*all; 3],
                [object, positions] => [*object, *object, *positions],
                [potential, beam, positions] => [*potential, *beam, *positions],
                other => {
                    return Err(PtychoError::InvalidConfig(format!(
                        "learning_rate array must have 1, 2 or 3 entries, got {}",
                        other.len()
                    )))
                }
            },
        };
        if rates.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(PtychoError::InvalidConfig(format!(
                "learning rates must be non-negative and finite, got {rates:?}"
            )));
        }
        Ok(GroupRates {
            potential: rates[0],
            beam: rates[1],
            positions: rates[2],
        })
    }
}

fn default_save_every() -> usize {
    10
}

fn default_num_iterations() -> usize {
    1000
}

fn default_halt_on_non_finite() -> bool {
    true
}

/// Per-call reconstruction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionOptions {
    /// Snapshot and progress-report cadence in iterations.
    #[serde(default = "default_save_every")]
    pub save_every: usize,
    #[serde(default = "default_num_iterations")]
    pub num_iterations: usize,
    /// `None` picks the variant's fallback rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<LearningRate>,
    #[serde(default)]
    pub loss: LossKind,
    #[serde(default)]
    pub optimizer: OptimizerKind,
    /// Stop with [`PtychoError::NonFinite`] when the loss or a gradient
    /// becomes NaN or infinite. When false a warning is logged and the
    /// values are propagated.
    #[serde(default = "default_halt_on_non_finite")]
    pub halt_on_non_finite: bool,
}

impl Default for ReconstructionOptions {
    fn default() -> Self {
        Self {
            save_every: default_save_every(),
            num_iterations: default_num_iterations(),
            learning_rate: None,
            loss: LossKind::default(),
            optimizer: OptimizerKind::default(),
            halt_on_non_finite: default_halt_on_non_finite(),
        }
    }
}

impl ReconstructionOptions {
    pub fn validate(&self) -> Result<()> {
        if self.save_every == 0 {
            return Err(PtychoError::InvalidConfig(
                "save_every must be at least 1".into(),
            ));
        }
        match &self.learning_rate {
            Some(rate) => rate.resolve().map(|_| ()),
            None => Ok(()),
        }
    }

    /// Configured rates, or `fallback` for every group when unset.
    pub fn rates_or(&self, fallback: f64) -> Result<GroupRates> {
        match &self.learning_rate {
            Some(rate) => rate.resolve(),
            None => LearningRate::Scalar(fallback).resolve(),
        }
    }
}

/// Slice thickness (Å) and accelerating voltage (kV) shared by every slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    pub slice_thickness: f64,
    pub voltage_kv: f64,
}

/// Number of snapshot slots needed for `num_iterations` at `save_every`.
pub fn snapshot_count(num_iterations: usize, save_every: usize) -> usize {
    num_iterations.div_ceil(save_every)
}

/// Fixed-size snapshot buffer. Slot `k` holds the state after iteration
/// `k * save_every`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshots<T> {
    save_every: usize,
    slots: Vec<Option<T>>,
}

impl<T> Snapshots<T> {
    pub fn new(num_iterations: usize, save_every: usize) -> Self {
        let count = snapshot_count(num_iterations, save_every);
        Self {
            save_every,
            slots: (0..count).map(|_| None).collect(),
        }
    }

    /// Store `value` if `iteration` falls on the cadence. Returns whether it
    /// was stored.
    ///
    /// # Panics
    /// If the slot index exceeds the buffer, which means `iteration` is past
    /// the `num_iterations` the buffer was sized for.
    pub fn record(&mut self, iteration: usize, value: T) -> bool {
        if iteration % self.save_every != 0 {
            return false;
        }
        let slot = iteration / self.save_every;
        assert!(
            slot < self.slots.len(),
            "snapshot slot {slot} out of range for {} slots",
            self.slots.len()
        );
        self.slots[slot] = Some(value);
        true
    }

    pub fn save_every(&self) -> usize {
        self.save_every
    }

    /// Allocated slot count.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Recorded snapshots as `(iteration, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(slot, value)| value.as_ref().map(|v| (slot * self.save_every, v)))
    }

    pub fn try_map<U, F>(self, mut f: F) -> Result<Snapshots<U>>
    where
        F: FnMut(T) -> Result<U>,
    {
        let slots = self
            .slots
            .into_iter()
            .map(|slot| slot.map(&mut f).transpose())
            .collect::<Result<Vec<_>>>()?;
        Ok(Snapshots {
            save_every: self.save_every,
            slots,
        })
    }
}

/// Final estimates plus snapshot history of one reconstruction.
#[derive(Debug, Clone)]
pub struct Reconstruction<P, M> {
    pub potential: P,
    pub beam: M,
    pub positions: Vec<[f64; 2]>,
    pub potential_snapshots: Snapshots<P>,
    pub beam_snapshots: Snapshots<M>,
    pub position_snapshots: Snapshots<Vec<[f64; 2]>>,
    /// Loss before each iteration's update, one entry per iteration.
    pub loss_history: Vec<f64>,
}

pub type SingleSliceReconstruction =
    Reconstruction<CalibratedArray<f64>, CalibratedArray<Complex64>>;
pub type MultiModalReconstruction = Reconstruction<CalibratedArray<f64>, ProbeModes>;
pub type MultiSliceReconstruction = Reconstruction<Vec<CalibratedArray<f64>>, ProbeModes>;

/// Single-slice reconstruction of potential and beam at fixed positions.
///
/// A Fourier-space beam guess is brought to real space first.
pub fn single_slice_ptychography<B: SpectralBackend>(
    backend: &B,
    experimental: &[RealField2D],
    initial_potential: &CalibratedArray<f64>,
    initial_beam: &CalibratedArray<Complex64>,
    positions: &[[f64; 2]],
    acquisition: Acquisition,
    options: &ReconstructionOptions,
) -> Result<SingleSliceReconstruction> {
    single_slice_impl(
        backend,
        experimental,
        initial_potential,
        initial_beam,
        positions,
        acquisition,
        options,
        Wrt::OBJECT_AND_BEAM,
        None,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn single_slice_ptychography_with_metrics<B: SpectralBackend>(
    backend: &B,
    experimental: &[RealField2D],
    initial_potential: &CalibratedArray<f64>,
    initial_beam: &CalibratedArray<Complex64>,
    positions: &[[f64; 2]],
    acquisition: Acquisition,
    options: &ReconstructionOptions,
    metrics: Option<&MetricsRecorder>,
) -> Result<SingleSliceReconstruction> {
    single_slice_impl(
        backend,
        experimental,
        initial_potential,
        initial_beam,
        positions,
        acquisition,
        options,
        Wrt::OBJECT_AND_BEAM,
        metrics,
    )
}

/// Like [`single_slice_ptychography`], additionally refining positions.
pub fn single_slice_poscorrected<B: SpectralBackend>(
    backend: &B,
    experimental: &[RealField2D],
    initial_potential: &CalibratedArray<f64>,
    initial_beam: &CalibratedArray<Complex64>,
    positions: &[[f64; 2]],
    acquisition: Acquisition,
    options: &ReconstructionOptions,
) -> Result<SingleSliceReconstruction> {
    single_slice_impl(
        backend,
        experimental,
        initial_potential,
        initial_beam,
        positions,
        acquisition,
        options,
        Wrt::ALL,
        None,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn single_slice_poscorrected_with_metrics<B: SpectralBackend>(
    backend: &B,
    experimental: &[RealField2D],
    initial_potential: &CalibratedArray<f64>,
    initial_beam: &CalibratedArray<Complex64>,
    positions: &[[f64; 2]],
    acquisition: Acquisition,
    options: &ReconstructionOptions,
    metrics: Option<&MetricsRecorder>,
) -> Result<SingleSliceReconstruction> {
    single_slice_impl(
        backend,
        experimental,
        initial_potential,
        initial_beam,
        positions,
        acquisition,
        options,
        Wrt::ALL,
        metrics,
    )
}

/// Single slice, incoherent probe modes, with position correction.
pub fn single_slice_multi_modal<B: SpectralBackend>(
    backend: &B,
    experimental: &[RealField2D],
    initial_potential: &CalibratedArray<f64>,
    initial_beam: &ProbeModes,
    positions: &[[f64; 2]],
    acquisition: Acquisition,
    options: &ReconstructionOptions,
) -> Result<MultiModalReconstruction> {
    single_slice_multi_modal_with_metrics(
        backend,
        experimental,
        initial_potential,
        initial_beam,
        positions,
        acquisition,
        options,
        None,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn single_slice_multi_modal_with_metrics<B: SpectralBackend>(
    backend: &B,
    experimental: &[RealField2D],
    initial_potential: &CalibratedArray<f64>,
    initial_beam: &ProbeModes,
    positions: &[[f64; 2]],
    acquisition: Acquisition,
    options: &ReconstructionOptions,
    metrics: Option<&MetricsRecorder>,
) -> Result<MultiModalReconstruction> {
    let potential = initial_potential.to_real_field();
    validate::check_grid_match("potential", initial_beam.grid(), potential.grid())?;
    let problem = Problem {
        variant: "single_slice_multi_modal",
        experimental,
        potential: vec![potential],
        beam: initial_beam.weighted_fields(),
        positions: positions.to_vec(),
        acquisition,
        wrt: Wrt::ALL,
        rates: options.rates_or(DEFAULT_POSCORRECTED_LEARNING_RATE)?,
    };
    let calib = initial_beam.calib();
    let potential_grid = initial_potential.grid();
    let trajectory = optimize(backend, problem, options, metrics)?;
    trajectory.into_reconstruction(
        |mut slices| single_potential(slices.pop(), potential_grid),
        |fields| ProbeModes::from_weighted_fields(fields, calib),
    )
}

/// Multi-slice, multi-modal reconstruction with position correction.
///
/// Potential and beam use `options.learning_rate` (default
/// [`DEFAULT_LEARNING_RATE`]); positions use
/// `pos_learning_rate`.
#[allow(clippy::too_many_arguments)]
pub fn multi_slice_multi_modal<B: SpectralBackend>(
    backend: &B,
    experimental: &[RealField2D],
    initial_slices: &[CalibratedArray<f64>],
    initial_beam: &ProbeModes,
    positions: &[[f64; 2]],
    acquisition: Acquisition,
    options: &ReconstructionOptions,
    pos_learning_rate: f64,
) -> Result<MultiSliceReconstruction> {
    multi_slice_multi_modal_with_metrics(
        backend,
        experimental,
        initial_slices,
        initial_beam,
        positions,
        acquisition,
        options,
        pos_learning_rate,
        None,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn multi_slice_multi_modal_with_metrics<B: SpectralBackend>(
    backend: &B,
    experimental: &[RealField2D],
    initial_slices: &[CalibratedArray<f64>],
    initial_beam: &ProbeModes,
    positions: &[[f64; 2]],
    acquisition: Acquisition,
    options: &ReconstructionOptions,
    pos_learning_rate: f64,
    metrics: Option<&MetricsRecorder>,
) -> Result<MultiSliceReconstruction> {
    let base = options.rates_or(DEFAULT_LEARNING_RATE)?;
    if !(pos_learning_rate.is_finite() && pos_learning_rate >= 0.0) {
        return Err(PtychoError::InvalidConfig(format!(
            "pos_learning_rate must be non-negative and finite, got {pos_learning_rate}"
        )));
    }
    let slice_grids: Vec<Grid2D> = initial_slices.iter().map(CalibratedArray::grid).collect();
    for (index, grid) in slice_grids.iter().enumerate() {
        validate::check_grid_match(&format!("potential slice {index}"), initial_beam.grid(), *grid)?;
    }
    let problem = Problem {
        variant: "multi_slice_multi_modal",
        experimental,
        potential: initial_slices
            .iter()
            .map(CalibratedArray::to_real_field)
            .collect(),
        beam: initial_beam.weighted_fields(),
        positions: positions.to_vec(),
        acquisition,
        wrt: Wrt::ALL,
        rates: GroupRates {
            positions: pos_learning_rate,
            ..base
        },
    };
    let calib = initial_beam.calib();
    let trajectory = optimize(backend, problem, options, metrics)?;
    trajectory.into_reconstruction(
        |slices| {
            slices
                .into_iter()
                .zip(&slice_grids)
                .map(|(slice, grid)| CalibratedArray::new(slice.into(), *grid, true))
                .collect::<Result<Vec<_>>>()
        },
        |fields| ProbeModes::from_weighted_fields(fields, calib),
    )
}

#[allow(clippy::too_many_arguments)]
fn single_slice_impl<B: SpectralBackend>(
    backend: &B,
    experimental: &[RealField2D],
    initial_potential: &CalibratedArray<f64>,
    initial_beam: &CalibratedArray<Complex64>,
    positions: &[[f64; 2]],
    acquisition: Acquisition,
    options: &ReconstructionOptions,
    wrt: Wrt,
    metrics: Option<&MetricsRecorder>,
) -> Result<SingleSliceReconstruction> {
    let potential = initial_potential.to_real_field();
    let mut beam = initial_beam.to_field();
    if !initial_beam.real_space() {
        backend.inverse_fft_2d(&mut beam);
        beam = beam.with_grid(real_space_grid(initial_beam.grid()));
    }
    let beam_grid = beam.grid();
    validate::check_grid_match("potential", beam_grid, potential.grid())?;
    let (variant, fallback_rate) = if wrt.positions {
        ("single_slice_poscorrected", DEFAULT_POSCORRECTED_LEARNING_RATE)
    } else {
        ("single_slice_ptychography", DEFAULT_LEARNING_RATE)
    };
    let problem = Problem {
        variant,
        experimental,
        potential: vec![potential],
        beam: vec![beam],
        positions: positions.to_vec(),
        acquisition,
        wrt,
        rates: options.rates_or(fallback_rate)?,
    };
    let potential_grid = initial_potential.grid();
    let trajectory = optimize(backend, problem, options, metrics)?;
    trajectory.into_reconstruction(
        |mut slices| single_potential(slices.pop(), potential_grid),
        |mut modes| match modes.pop() {
            Some(mode) => CalibratedArray::new(mode.into(), beam_grid, true),
            None => Err(PtychoError::InvalidInput("reconstruction lost the beam".into())),
        },
    )
}

/// Real-space grid of a Fourier-space array with calibrations `1 / fov`.
fn real_space_grid(fourier: Grid2D) -> Grid2D {
    Grid2D::new(
        fourier.nx,
        fourier.ny,
        1.0 / (fourier.nx as f64 * fourier.dx),
        1.0 / (fourier.ny as f64 * fourier.dy),
    )
}

fn single_potential(slice: Option<RealField2D>, grid: Grid2D) -> Result<CalibratedArray<f64>> {
    match slice {
        Some(slice) => CalibratedArray::new(slice.into(), grid, true),
        None => Err(PtychoError::InvalidInput(
            "reconstruction lost the potential slice".into(),
        )),
    }
}

/// Inputs of the shared engine.
struct Problem<'a> {
    variant: &'static str,
    experimental: &'a [RealField2D],
    potential: Vec<RealField2D>,
    beam: Vec<Field2D>,
    positions: Vec<[f64; 2]>,
    acquisition: Acquisition,
    wrt: Wrt,
    rates: GroupRates,
}

impl Problem<'_> {
    fn validate(&self) -> Result<()> {
        validate::check_voltage(self.acquisition.voltage_kv)?;
        validate::check_thickness(self.acquisition.slice_thickness)?;
        let grid = match self.beam.first() {
            Some(mode) => mode.grid(),
            None => {
                return Err(PtychoError::InvalidInput(
                    "at least one probe mode is required".into(),
                ))
            }
        };
        validate::check_calibration(grid.dx)?;
        validate::check_calibration(grid.dy)?;
        if self.potential.is_empty() {
            return Err(PtychoError::InvalidInput(
                "at least one potential slice is required".into(),
            ));
        }
        for slice in &self.potential {
            validate::check_grid_match("potential slice", grid, slice.grid())?;
        }
        for mode in &self.beam {
            validate::check_grid_match("probe mode", grid, mode.grid())?;
        }
        validate::check_finite("potential", &self.potential)?;
        validate::check_finite("beam", &self.beam)?;
        validate::check_positions(&self.positions)?;
        validate::check_data(self.experimental, self.positions.len(), grid)
    }
}

/// Raw output of the engine before wrapping into calibrated containers.
struct Trajectory {
    params: Parameters,
    snapshots: Snapshots<Parameters>,
    loss_history: Vec<f64>,
}

impl Trajectory {
    fn into_reconstruction<P, M, FP, FM>(
        self,
        mut wrap_potential: FP,
        mut wrap_beam: FM,
    ) -> Result<Reconstruction<P, M>>
    where
        FP: FnMut(Vec<RealField2D>) -> Result<P>,
        FM: FnMut(Vec<Field2D>) -> Result<M>,
    {
        let potential_snapshots = self
            .snapshots
            .clone()
            .try_map(|params| wrap_potential(params.potential))?;
        let beam_snapshots = self
            .snapshots
            .clone()
            .try_map(|params| wrap_beam(params.beam))?;
        let position_snapshots = self.snapshots.try_map(|params| Ok(params.positions))?;
        Ok(Reconstruction {
            potential: wrap_potential(self.params.potential)?,
            beam: wrap_beam(self.params.beam)?,
            positions: self.params.positions,
            potential_snapshots,
            beam_snapshots,
            position_snapshots,
            loss_history: self.loss_history,
        })
    }
}

fn optimize<B: SpectralBackend>(
    backend: &B,
    problem: Problem<'_>,
    options: &ReconstructionOptions,
    metrics: Option<&MetricsRecorder>,
) -> Result<Trajectory> {
    options.validate()?;
    problem.validate()?;

    let start = Instant::now();
    let grid = problem.beam[0].grid();
    let optimizer = Optimizer::from(options.optimizer);
    log::debug!(
        "[setup] {} backend={} grid={}x{} slices={} modes={} positions={} optimizer={} loss={} rates={:?}",
        problem.variant,
        backend.name(),
        grid.nx,
        grid.ny,
        problem.potential.len(),
        problem.beam.len(),
        problem.positions.len(),
        options.optimizer,
        options.loss,
        problem.rates
    );
    if let Some(recorder) = metrics {
        recorder.emit(MetricsEvent::ReconstructionStart {
            variant: problem.variant,
            backend: backend.name(),
            grid_nx: grid.nx,
            grid_ny: grid.ny,
            slices: problem.potential.len(),
            modes: problem.beam.len(),
            positions: problem.positions.len(),
            num_iterations: options.num_iterations,
            save_every: options.save_every,
            loss: options.loss,
            optimizer: options.optimizer,
        });
    }

    let objective = Stem4dObjective::new(
        backend,
        problem.experimental,
        options.loss,
        problem.acquisition.slice_thickness,
        problem.acquisition.voltage_kv,
    );
    let mut params = Parameters {
        potential: problem.potential,
        beam: problem.beam,
        positions: problem.positions,
    };
    let wrt = problem.wrt;
    let rates = problem.rates;
    let potential_len: usize = params.potential.iter().map(RealField2D::len).sum();
    let beam_len: usize = params.beam.iter().map(|mode| 2 * mode.len()).sum();
    let mut potential_slot = ParamSlot::new(&optimizer, potential_len);
    let mut beam_slot = ParamSlot::new(&optimizer, beam_len);
    let mut position_slot = ParamSlot::new(&optimizer, 2 * params.positions.len());

    let mut snapshots = Snapshots::new(options.num_iterations, options.save_every);
    let mut loss_history = Vec::with_capacity(options.num_iterations);
    let mut last_report = Instant::now();

    for iteration in 0..options.num_iterations {
        let (loss, grads) = objective.value_and_grad(&params, wrt)?;
        if !loss.is_finite() || !grads.is_finite() {
            let quantity = if loss.is_finite() { "gradient" } else { "loss" };
            if options.halt_on_non_finite {
                return Err(PtychoError::NonFinite {
                    iteration,
                    quantity,
                });
            }
            log::warn!("non-finite {quantity} at iteration {iteration}, continuing");
            if let Some(recorder) = metrics {
                recorder.emit(MetricsEvent::NonFinite {
                    iteration,
                    quantity,
                });
            }
        }

        if let Some(grad) = &grads.potential {
            potential_slot.step_real(&optimizer, &mut params.potential, grad, rates.potential);
        }
        if let Some(grad) = &grads.beam {
            beam_slot.step_complex(&optimizer, &mut params.beam, grad, rates.beam);
        }
        if let Some(grad) = &grads.positions {
            position_slot.step_positions(&optimizer, &mut params.positions, grad, rates.positions);
        }
        loss_history.push(loss);

        if iteration % options.save_every == 0 {
            snapshots.record(iteration, params.clone());
            log::info!("iteration {iteration}, loss={loss}");
            if let Some(recorder) = metrics {
                recorder.emit(MetricsEvent::Snapshot {
                    iteration,
                    loss,
                    duration_ms: last_report.elapsed().as_secs_f64() * 1000.0,
                });
            }
            last_report = Instant::now();
        }
    }

    let final_loss = loss_history.last().copied().unwrap_or(f64::NAN);
    log::debug!(
        "[done] {} iterations in {:.2?}, final loss={final_loss}",
        options.num_iterations,
        start.elapsed()
    );
    if let Some(recorder) = metrics {
        recorder.emit(MetricsEvent::ReconstructionDone {
            iterations: options.num_iterations,
            final_loss,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        });
    }

    Ok(Trajectory {
        params,
        snapshots,
        loss_history,
    })
}
