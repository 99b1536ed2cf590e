#![cfg(test)]

use num_complex::Complex64;

use super::adjoint::{GradientSource, Gradients, Parameters, Stem4dObjective, Wrt};
use super::error::PtychoError;
use super::field::{Field2D, RealField2D};
use super::grid::Grid2D;
use super::loss::LossKind;
use super::multislice::stem_4d;
use super::reference::ReferenceBackend;

const VOLTAGE: f64 = 200.0;
const THICKNESS: f64 = 1.5;

fn grid() -> Grid2D {
    Grid2D::square(6, 6, 0.3)
}

fn params(shift: f64) -> Parameters {
    let grid = grid();
    let potential = (0..2)
        .map(|s| {
            RealField2D::from_fn(grid, |ix, iy| {
                300.0 * ((ix as f64 * 0.8 + s as f64 + shift).sin() + (iy as f64 * 0.5 - shift).cos())
            })
        })
        .collect();
    let beam = (0..2)
        .map(|m| {
            Field2D::from_fn(grid, |ix, iy| {
                let x = ix as f64 - 3.0;
                let y = iy as f64 - 3.0;
                let amp = 0.3 * (-(x * x + y * y) / (2.0 + m as f64)).exp();
                Complex64::from_polar(amp, 0.3 * x * (1.0 + m as f64) + shift)
            })
        })
        .collect();
    let positions = vec![[0.1 + shift, -0.2], [0.35, 0.4 - shift], [-0.25, 0.05]];
    Parameters {
        potential,
        beam,
        positions,
    }
}

fn measured() -> Vec<RealField2D> {
    let truth = params(0.4);
    stem_4d(
        &ReferenceBackend,
        &truth.potential,
        &truth.beam,
        &truth.positions,
        THICKNESS,
        VOLTAGE,
    )
}

fn direction_real(grid: Grid2D, seed: f64) -> RealField2D {
    RealField2D::from_fn(grid, |ix, iy| ((ix * 7 + iy * 3) as f64 * 0.61 + seed).sin())
}

fn direction_complex(grid: Grid2D, seed: f64) -> Field2D {
    Field2D::from_fn(grid, |ix, iy| {
        Complex64::new(
            ((ix * 5 + iy) as f64 * 0.37 + seed).cos(),
            ((ix + iy * 11) as f64 * 0.23 - seed).sin(),
        )
    })
}

fn assert_close(fd: f64, analytic: f64, what: &str) {
    let scale = fd.abs().max(analytic.abs()).max(1e-12);
    assert!(
        (fd - analytic).abs() / scale < 1e-4,
        "{what}: finite difference {fd} vs adjoint {analytic}"
    );
}

fn central_difference<F>(objective: &impl GradientSource, eps: f64, perturb: F) -> f64
where
    F: Fn(&mut Parameters, f64),
{
    let mut plus = params(0.0);
    perturb(&mut plus, eps);
    let mut minus = params(0.0);
    perturb(&mut minus, -eps);
    let up = objective.value(&plus).unwrap();
    let down = objective.value(&minus).unwrap();
    (up - down) / (2.0 * eps)
}

fn gradients(objective: &impl GradientSource) -> Gradients {
    objective.value_and_grad(&params(0.0), Wrt::ALL).unwrap().1
}

#[test]
fn potential_gradient_matches_finite_differences() {
    let data = measured();
    for loss in [LossKind::Mse, LossKind::Rmse] {
        let objective = Stem4dObjective::new(&ReferenceBackend, &data, loss, THICKNESS, VOLTAGE);
        let grads = gradients(&objective);
        let d_potential = grads.potential.as_ref().unwrap();
        for slice in 0..2 {
            let dir = direction_real(grid(), slice as f64);
            let analytic: f64 = d_potential[slice]
                .as_slice()
                .iter()
                .zip(dir.as_slice())
                .map(|(g, d)| g * d)
                .sum();
            let fd = central_difference(&objective, 1e-2, |p, eps| {
                for (v, d) in p.potential[slice].as_mut_slice().iter_mut().zip(dir.as_slice()) {
                    *v += eps * d;
                }
            });
            assert_close(fd, analytic, &format!("{loss} potential slice {slice}"));
        }
    }
}

#[test]
fn beam_gradient_matches_finite_differences() {
    let data = measured();
    let objective = Stem4dObjective::new(&ReferenceBackend, &data, LossKind::Mse, THICKNESS, VOLTAGE);
    let grads = gradients(&objective);
    let d_beam = grads.beam.as_ref().unwrap();
    for mode in 0..2 {
        let dir = direction_complex(grid(), mode as f64 + 0.5);
        // dL = Re sum conj(g) dz for the steepest-ascent convention.
        let analytic: f64 = d_beam[mode]
            .as_slice()
            .iter()
            .zip(dir.as_slice())
            .map(|(g, d)| (g.conj() * d).re)
            .sum();
        let fd = central_difference(&objective, 1e-6, |p, eps| {
            p.beam[mode].axpy(Complex64::new(eps, 0.0), &dir);
        });
        assert_close(fd, analytic, &format!("beam mode {mode}"));
    }
}

#[test]
fn position_gradient_matches_finite_differences() {
    let data = measured();
    let objective = Stem4dObjective::new(&ReferenceBackend, &data, LossKind::Mse, THICKNESS, VOLTAGE);
    let grads = gradients(&objective);
    let d_positions = grads.positions.as_ref().unwrap();
    for index in 0..3 {
        for axis in 0..2 {
            let fd = central_difference(&objective, 1e-6, |p, eps| {
                p.positions[index][axis] += eps;
            });
            assert_close(fd, d_positions[index][axis], &format!("position {index} axis {axis}"));
        }
    }
}

#[test]
fn value_and_grad_reports_the_forward_loss() {
    let data = measured();
    let objective = Stem4dObjective::new(&ReferenceBackend, &data, LossKind::Mae, THICKNESS, VOLTAGE);
    let value = objective.value(&params(0.0)).unwrap();
    let (with_grad, _) = objective.value_and_grad(&params(0.0), Wrt::ALL).unwrap();
    assert!(value > 0.0);
    assert!((value - with_grad).abs() < 1e-12);
}

#[test]
fn loss_vanishes_at_the_true_parameters() {
    let data = measured();
    let objective = Stem4dObjective::new(&ReferenceBackend, &data, LossKind::Mse, THICKNESS, VOLTAGE);
    let (value, grads) = objective.value_and_grad(&params(0.4), Wrt::ALL).unwrap();
    assert!(value < 1e-20);
    for slice in grads.potential.unwrap() {
        assert!(slice.as_slice().iter().all(|g| g.abs() < 1e-12));
    }
}

#[test]
fn only_requested_groups_are_returned() {
    let data = measured();
    let objective = Stem4dObjective::new(&ReferenceBackend, &data, LossKind::Mse, THICKNESS, VOLTAGE);
    let (_, grads) = objective
        .value_and_grad(&params(0.0), Wrt::OBJECT_AND_BEAM)
        .unwrap();
    assert!(grads.potential.is_some());
    assert!(grads.beam.is_some());
    assert!(grads.positions.is_none());
    assert!(grads.is_finite());

    let (_, none) = objective.value_and_grad(&params(0.0), Wrt::default()).unwrap();
    assert_eq!(none, Gradients::default());
}

#[test]
fn mismatched_positions_and_data_are_rejected() {
    let data = measured();
    let objective = Stem4dObjective::new(&ReferenceBackend, &data[..2], LossKind::Mse, THICKNESS, VOLTAGE);
    let err = objective.value(&params(0.0)).unwrap_err();
    assert!(matches!(err, PtychoError::ShapeMismatch(_)));
}
