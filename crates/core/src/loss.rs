//! Loss functions comparing simulated and experimental diffraction data.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{PtychoError, Result},
    field::RealField2D,
};

/// Reduction applied to the elementwise residual `model - data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    /// Mean absolute error.
    Mae,
    /// Mean squared error.
    #[default]
    Mse,
    /// Root mean squared error.
    Rmse,
}

impl FromStr for LossKind {
    type Err = PtychoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mae" => Ok(Self::Mae),
            "mse" => Ok(Self::Mse),
            "rmse" => Ok(Self::Rmse),
            _ => Err(PtychoError::UnknownLoss(s.to_string())),
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossKind::Mae => write!(f, "mae"),
            LossKind::Mse => write!(f, "mse"),
            LossKind::Rmse => write!(f, "rmse"),
        }
    }
}

/// Loss value plus its derivative with respect to every model element,
/// laid out like the model stack.
#[derive(Debug, Clone)]
pub struct LossEval {
    pub value: f64,
    pub d_model: Vec<RealField2D>,
}

impl LossKind {
    /// Scalar loss only.
    pub fn value(self, model: &[RealField2D], data: &[RealField2D]) -> f64 {
        let (sum, count) = residuals(model, data).fold((0.0, 0usize), |(sum, count), r| {
            let term = match self {
                LossKind::Mae => r.abs(),
                LossKind::Mse | LossKind::Rmse => r * r,
            };
            (sum + term, count + 1)
        });
        let mean = if count == 0 { 0.0 } else { sum / count as f64 };
        match self {
            LossKind::Rmse => mean.sqrt(),
            _ => mean,
        }
    }

    /// Loss and `dL/d model`.
    ///
    /// The MAE derivative uses `sign(r)` with `sign(0) = 0`; the RMSE
    /// derivative is defined as zero when the loss itself is zero.
    pub fn evaluate(self, model: &[RealField2D], data: &[RealField2D]) -> LossEval {
        let value = self.value(model, data);
        let count: usize = model.iter().map(RealField2D::len).sum();
        let inv_n = if count == 0 { 0.0 } else { 1.0 / count as f64 };
        let d_model = model
            .iter()
            .zip(data)
            .map(|(m, d)| {
                let grad = m
                    .as_slice()
                    .iter()
                    .zip(d.as_slice())
                    .map(|(&mv, &dv)| {
                        let r = mv - dv;
                        match self {
                            LossKind::Mae => {
                                if r > 0.0 {
                                    inv_n
                                } else if r < 0.0 {
                                    -inv_n
                                } else {
                                    0.0
                                }
                            }
                            LossKind::Mse => 2.0 * r * inv_n,
                            LossKind::Rmse => {
                                if value > 0.0 {
                                    r * inv_n / value
                                } else {
                                    0.0
                                }
                            }
                        }
                    })
                    .collect();
                RealField2D::from_vec(m.grid(), grad)
            })
            .collect();
        LossEval { value, d_model }
    }
}

fn residuals<'a>(
    model: &'a [RealField2D],
    data: &'a [RealField2D],
) -> impl Iterator<Item = f64> + 'a {
    model.iter().zip(data).flat_map(|(m, d)| {
        m.as_slice()
            .iter()
            .zip(d.as_slice())
            .map(|(&mv, &dv)| mv - dv)
    })
}

/// Wrap a forward model into a closure returning the loss against fixed
/// experimental data.
///
/// The loss key is resolved here, so an unknown name fails before the
/// forward model is ever called.
pub fn create_loss_function<'a, P, F>(
    forward: F,
    experimental: &'a [RealField2D],
    loss_type: &str,
) -> Result<impl Fn(&P) -> f64 + 'a>
where
    F: Fn(&P) -> Vec<RealField2D> + 'a,
    P: ?Sized + 'a,
{
    let kind: LossKind = loss_type.parse()?;
    Ok(move |params: &P| kind.value(&forward(params), experimental))
}
