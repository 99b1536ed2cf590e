//! First-order update rules for the reconstruction loops.
//!
//! Every rule works on a flat `f64` parameter vector. Complex fields are
//! flattened into interleaved `(re, im)` pairs by [`flatten_complex`], so the
//! real and imaginary parts carry independent moment estimates.

use std::{fmt, str::FromStr};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{
    error::{PtychoError, Result},
    field::{Field2D, RealField2D},
};

/// Per-parameter running statistics of an update rule.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerState {
    /// Number of updates applied so far.
    pub step: u64,
    /// First moment (Adam) or unused.
    pub first: Vec<f64>,
    /// Second moment (Adam, RMSProp) or accumulated squares (Adagrad).
    pub second: Vec<f64>,
}

impl OptimizerState {
    fn zeros(len: usize, with_first: bool) -> Self {
        Self {
            step: 0,
            first: if with_first { vec![0.0; len] } else { Vec::new() },
            second: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.second.len()
    }

    pub fn is_empty(&self) -> bool {
        self.second.is_empty()
    }
}

/// A gradient-descent update rule.
pub trait UpdateRule {
    /// Fresh state for a parameter vector of `len` elements.
    fn init(&self, len: usize) -> OptimizerState;

    /// One descent step: `params` moves against `grads` in place.
    fn update(
        &self,
        params: &mut [f64],
        grads: &[f64],
        state: &mut OptimizerState,
        learning_rate: f64,
    );
}

/// Adam with bias-corrected moments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adam {
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl Default for Adam {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

impl UpdateRule for Adam {
    fn init(&self, len: usize) -> OptimizerState {
        OptimizerState::zeros(len, true)
    }

    fn update(
        &self,
        params: &mut [f64],
        grads: &[f64],
        state: &mut OptimizerState,
        learning_rate: f64,
    ) {
        state.step += 1;
        let t = state.step as i32;
        let correction1 = 1.0 - self.beta1.powi(t);
        let correction2 = 1.0 - self.beta2.powi(t);
        for (((p, &g), m), v) in params
            .iter_mut()
            .zip(grads)
            .zip(state.first.iter_mut())
            .zip(state.second.iter_mut())
        {
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= learning_rate * m_hat / (v_hat.sqrt() + self.eps);
        }
    }
}

/// Adagrad: step size shrinks with the accumulated squared gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adagrad {
    pub eps: f64,
}

impl Default for Adagrad {
    fn default() -> Self {
        Self { eps: 1e-8 }
    }
}

impl UpdateRule for Adagrad {
    fn init(&self, len: usize) -> OptimizerState {
        OptimizerState::zeros(len, false)
    }

    fn update(
        &self,
        params: &mut [f64],
        grads: &[f64],
        state: &mut OptimizerState,
        learning_rate: f64,
    ) {
        state.step += 1;
        for ((p, &g), acc) in params.iter_mut().zip(grads).zip(state.second.iter_mut()) {
            *acc += g * g;
            *p -= learning_rate * g / (acc.sqrt() + self.eps);
        }
    }
}

/// RMSProp with an exponentially decaying squared-gradient average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsProp {
    pub decay: f64,
    pub eps: f64,
}

impl Default for RmsProp {
    fn default() -> Self {
        Self {
            decay: 0.9,
            eps: 1e-8,
        }
    }
}

impl UpdateRule for RmsProp {
    fn init(&self, len: usize) -> OptimizerState {
        OptimizerState::zeros(len, false)
    }

    fn update(
        &self,
        params: &mut [f64],
        grads: &[f64],
        state: &mut OptimizerState,
        learning_rate: f64,
    ) {
        state.step += 1;
        for ((p, &g), avg) in params.iter_mut().zip(grads).zip(state.second.iter_mut()) {
            *avg = self.decay * *avg + (1.0 - self.decay) * g * g;
            *p -= learning_rate * g / (avg.sqrt() + self.eps);
        }
    }
}

/// Name of a supported update rule, as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Adagrad,
    RmsProp,
}

impl FromStr for OptimizerKind {
    type Err = PtychoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adam" => Ok(Self::Adam),
            "adagrad" => Ok(Self::Adagrad),
            "rmsprop" => Ok(Self::RmsProp),
            _ => Err(PtychoError::UnknownOptimizer(s.to_string())),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Adam => write!(f, "adam"),
            OptimizerKind::Adagrad => write!(f, "adagrad"),
            OptimizerKind::RmsProp => write!(f, "rmsprop"),
        }
    }
}

/// A configured update rule with default hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Optimizer {
    Adam(Adam),
    Adagrad(Adagrad),
    RmsProp(RmsProp),
}

impl Optimizer {
    pub fn kind(&self) -> OptimizerKind {
        match self {
            Optimizer::Adam(_) => OptimizerKind::Adam,
            Optimizer::Adagrad(_) => OptimizerKind::Adagrad,
            Optimizer::RmsProp(_) => OptimizerKind::RmsProp,
        }
    }
}

impl From<OptimizerKind> for Optimizer {
    fn from(kind: OptimizerKind) -> Self {
        match kind {
            OptimizerKind::Adam => Optimizer::Adam(Adam::default()),
            OptimizerKind::Adagrad => Optimizer::Adagrad(Adagrad::default()),
            OptimizerKind::RmsProp => Optimizer::RmsProp(RmsProp::default()),
        }
    }
}

impl UpdateRule for Optimizer {
    fn init(&self, len: usize) -> OptimizerState {
        match self {
            Optimizer::Adam(rule) => rule.init(len),
            Optimizer::Adagrad(rule) => rule.init(len),
            Optimizer::RmsProp(rule) => rule.init(len),
        }
    }

    fn update(
        &self,
        params: &mut [f64],
        grads: &[f64],
        state: &mut OptimizerState,
        learning_rate: f64,
    ) {
        match self {
            Optimizer::Adam(rule) => rule.update(params, grads, state, learning_rate),
            Optimizer::Adagrad(rule) => rule.update(params, grads, state, learning_rate),
            Optimizer::RmsProp(rule) => rule.update(params, grads, state, learning_rate),
        }
    }
}

/// Resolve an optimizer by name: `adam`, `adagrad` or `rmsprop`.
pub fn get_optimizer(name: &str) -> Result<Optimizer> {
    name.parse::<OptimizerKind>().map(Optimizer::from)
}

/// Interleave a complex field into `[re0, im0, re1, im1, ...]`.
pub fn flatten_complex(field: &Field2D) -> Vec<f64> {
    field
        .as_slice()
        .iter()
        .flat_map(|z| [z.re, z.im])
        .collect()
}

/// Inverse of [`flatten_complex`], written back into `field`.
pub fn unflatten_complex(flat: &[f64], field: &mut Field2D) {
    for (z, pair) in field.as_mut_slice().iter_mut().zip(flat.chunks_exact(2)) {
        *z = Complex64::new(pair[0], pair[1]);
    }
}

/// Optimizer state plus the flat buffers for one parameter group.
///
/// Keeps the flat view alive between iterations so the loops do not
/// reallocate per step.
#[derive(Debug, Clone)]
pub(crate) struct ParamSlot {
    state: OptimizerState,
    flat: Vec<f64>,
}

impl ParamSlot {
    pub(crate) fn new(optimizer: &Optimizer, len: usize) -> Self {
        Self {
            state: optimizer.init(len),
            flat: vec![0.0; len],
        }
    }

    pub(crate) fn step_real(
        &mut self,
        optimizer: &Optimizer,
        fields: &mut [RealField2D],
        grads: &[RealField2D],
        learning_rate: f64,
    ) {
        gather_real(fields, &mut self.flat);
        let mut flat_grads = vec![0.0; self.flat.len()];
        gather_real(grads, &mut flat_grads);
        optimizer.update(&mut self.flat, &flat_grads, &mut self.state, learning_rate);
        let mut offset = 0;
        for field in fields {
            let len = field.len();
            field
                .as_mut_slice()
                .copy_from_slice(&self.flat[offset..offset + len]);
            offset += len;
        }
    }

    pub(crate) fn step_complex(
        &mut self,
        optimizer: &Optimizer,
        fields: &mut [Field2D],
        grads: &[Field2D],
        learning_rate: f64,
    ) {
        gather_complex(fields, &mut self.flat);
        let mut flat_grads = vec![0.0; self.flat.len()];
        gather_complex(grads, &mut flat_grads);
        optimizer.update(&mut self.flat, &flat_grads, &mut self.state, learning_rate);
        let mut offset = 0;
        for field in fields {
            let len = 2 * field.len();
            unflatten_complex(&self.flat[offset..offset + len], field);
            offset += len;
        }
    }

    pub(crate) fn step_positions(
        &mut self,
        optimizer: &Optimizer,
        positions: &mut [[f64; 2]],
        grads: &[[f64; 2]],
        learning_rate: f64,
    ) {
        let flat_grads: Vec<f64> = grads.iter().flatten().copied().collect();
        for (dst, src) in self.flat.iter_mut().zip(positions.iter().flatten()) {
            *dst = *src;
        }
        optimizer.update(&mut self.flat, &flat_grads, &mut self.state, learning_rate);
        for (position, pair) in positions.iter_mut().zip(self.flat.chunks_exact(2)) {
            *position = [pair[0], pair[1]];
        }
    }
}

fn gather_real(fields: &[RealField2D], out: &mut [f64]) {
    let mut offset = 0;
    for field in fields {
        let len = field.len();
        out[offset..offset + len].copy_from_slice(field.as_slice());
        offset += len;
    }
}

fn gather_complex(fields: &[Field2D], out: &mut [f64]) {
    let mut offset = 0;
    for field in fields {
        for (pair, z) in out[offset..offset + 2 * field.len()]
            .chunks_exact_mut(2)
            .zip(field.as_slice())
        {
            pair[0] = z.re;
            pair[1] = z.im;
        }
        offset += 2 * field.len();
    }
}
