use crate::error::{NumericsError, Result};
use crate::output::Printer;
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{
    after_accepted_step, ensure_finite, prepare, DerivativeHistory, PrintSchedule, Solver,
    SolverConfig, SolverReport, TIME_EPS,
};

// Cash-Karp embedded Runge-Kutta pair (Numerical Recipes).
const B21: f64 = 0.2;
const B31: f64 = 3.0 / 40.0;
const B32: f64 = 9.0 / 40.0;
const B41: f64 = 0.3;
const B42: f64 = -0.9;
const B43: f64 = 1.2;
const B51: f64 = -11.0 / 54.0;
const B52: f64 = 2.5;
const B53: f64 = -70.0 / 27.0;
const B54: f64 = 35.0 / 27.0;
const B61: f64 = 1631.0 / 55296.0;
const B62: f64 = 175.0 / 512.0;
const B63: f64 = 575.0 / 13824.0;
const B64: f64 = 44275.0 / 110592.0;
const B65: f64 = 253.0 / 4096.0;
const C1: f64 = 37.0 / 378.0;
const C3: f64 = 250.0 / 621.0;
const C4: f64 = 125.0 / 594.0;
const C6: f64 = 512.0 / 1771.0;
const DC1: f64 = C1 - 2825.0 / 27648.0;
const DC3: f64 = C3 - 18575.0 / 48384.0;
const DC4: f64 = C4 - 13525.0 / 55296.0;
const DC5: f64 = -277.0 / 14336.0;
const DC6: f64 = C6 - 0.25;

const SAFETY: f64 = 0.9;
/// Largest factor the step may grow by after an accepted step.
const MAX_GROW: f64 = 5.0;
/// Smallest factor the step may shrink by after a rejection.
const MIN_SHRINK: f64 = 0.1;

/// Cash-Karp fifth-order embedded Runge-Kutta with per-variable error
/// control.
///
/// The error scale per variable is
/// `eps_abs + eps_rel * (|y| + |h * sdy/dt|)`, where `sdy/dt` accumulates
/// absolute derivative magnitudes via `derivs_with_abs`, so reactions whose
/// contributions cancel numerically still register in the scale. A trial
/// step is accepted when the largest normalized error is at most one;
/// otherwise the step shrinks and retries, failing fatally below `h_min`.
pub struct Rk5Adaptive {
    config: SolverConfig,
    history: DerivativeHistory,
}

struct Stages {
    dydt: TissueState,
    sdydt: TissueState,
    k2: TissueState,
    k3: TissueState,
    k4: TissueState,
    k5: TissueState,
    k6: TissueState,
    y_temp: TissueState,
    y_out: TissueState,
    y_err: TissueState,
}

impl Stages {
    fn fresh(state: &TissueState) -> Self {
        Self {
            dydt: state.zeroed_like(),
            sdydt: state.zeroed_like(),
            k2: state.zeroed_like(),
            k3: state.zeroed_like(),
            k4: state.zeroed_like(),
            k5: state.zeroed_like(),
            k6: state.zeroed_like(),
            y_temp: state.zeroed_like(),
            y_out: state.zeroed_like(),
            y_err: state.zeroed_like(),
        }
    }
}

impl Rk5Adaptive {
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        let history = DerivativeHistory::new(config.derivative_history);
        Self { config, history }
    }

    /// Retained derivative snapshots (empty unless configured).
    #[must_use]
    pub fn history(&self) -> &DerivativeHistory {
        &self.history
    }

    /// Evaluates one Cash-Karp trial step of size `h` into
    /// `stages.y_out`/`stages.y_err`. `stages.dydt` must already hold
    /// `f(state)`.
    fn trial_step(&self, tissue: &Tissue, state: &TissueState, stages: &mut Stages, h: f64) {
        stages.y_temp.assign(state);
        stages.y_temp.add_scaled(&stages.dydt, B21 * h);
        tissue.derivs(&stages.y_temp, &mut stages.k2);

        stages.y_temp.assign(state);
        stages.y_temp.add_scaled(&stages.dydt, B31 * h);
        stages.y_temp.add_scaled(&stages.k2, B32 * h);
        tissue.derivs(&stages.y_temp, &mut stages.k3);

        stages.y_temp.assign(state);
        stages.y_temp.add_scaled(&stages.dydt, B41 * h);
        stages.y_temp.add_scaled(&stages.k2, B42 * h);
        stages.y_temp.add_scaled(&stages.k3, B43 * h);
        tissue.derivs(&stages.y_temp, &mut stages.k4);

        stages.y_temp.assign(state);
        stages.y_temp.add_scaled(&stages.dydt, B51 * h);
        stages.y_temp.add_scaled(&stages.k2, B52 * h);
        stages.y_temp.add_scaled(&stages.k3, B53 * h);
        stages.y_temp.add_scaled(&stages.k4, B54 * h);
        tissue.derivs(&stages.y_temp, &mut stages.k5);

        stages.y_temp.assign(state);
        stages.y_temp.add_scaled(&stages.dydt, B61 * h);
        stages.y_temp.add_scaled(&stages.k2, B62 * h);
        stages.y_temp.add_scaled(&stages.k3, B63 * h);
        stages.y_temp.add_scaled(&stages.k4, B64 * h);
        stages.y_temp.add_scaled(&stages.k5, B65 * h);
        tissue.derivs(&stages.y_temp, &mut stages.k6);

        stages.y_out.assign(state);
        stages.y_out.add_scaled(&stages.dydt, C1 * h);
        stages.y_out.add_scaled(&stages.k3, C3 * h);
        stages.y_out.add_scaled(&stages.k4, C4 * h);
        stages.y_out.add_scaled(&stages.k6, C6 * h);

        stages.y_err.zero();
        stages.y_err.add_scaled(&stages.dydt, DC1 * h);
        stages.y_err.add_scaled(&stages.k3, DC3 * h);
        stages.y_err.add_scaled(&stages.k4, DC4 * h);
        stages.y_err.add_scaled(&stages.k5, DC5 * h);
        stages.y_err.add_scaled(&stages.k6, DC6 * h);
    }

    fn max_normalized_error(&self, state: &TissueState, stages: &Stages, h: f64) -> f64 {
        let mut worst: f64 = 0.0;
        let matrices = [
            (
                &stages.y_err.cell_data,
                &state.cell_data,
                &stages.sdydt.cell_data,
            ),
            (
                &stages.y_err.wall_data,
                &state.wall_data,
                &stages.sdydt.wall_data,
            ),
            (
                &stages.y_err.vertex_data,
                &state.vertex_data,
                &stages.sdydt.vertex_data,
            ),
        ];
        for (errors, values, scales) in matrices {
            for ((err_row, val_row), scale_row) in errors.iter().zip(values).zip(scales) {
                for ((e, y), s) in err_row.iter().zip(val_row).zip(scale_row) {
                    let scale =
                        self.config.eps_abs + self.config.eps_rel * (y.abs() + (h * s).abs());
                    if scale > 0.0 {
                        worst = worst.max(e.abs() / scale);
                    }
                }
            }
        }
        worst
    }
}

impl Solver for Rk5Adaptive {
    fn simulate(
        &mut self,
        tissue: &mut Tissue,
        state: &mut TissueState,
        mut printer: Option<&mut dyn Printer>,
    ) -> Result<SolverReport> {
        prepare(tissue, state)?;

        let mut report = SolverReport::default();
        let mut schedule =
            PrintSchedule::new(self.config.t_begin, self.config.t_end, self.config.num_print);
        let mut t = self.config.t_begin;
        schedule.fire_due(tissue, state, t, &mut printer, &mut report)?;

        let mut stages = Stages::fresh(state);
        let mut h = self.config.h;

        while t < self.config.t_end - TIME_EPS {
            // Land exactly on the next checkpoint and the end time.
            h = h.min(self.config.t_end - t);
            if let Some(due) = schedule.next_time() {
                if due > t + TIME_EPS {
                    h = h.min(due - t);
                }
            }

            tissue.derivs_with_abs(state, &mut stages.dydt, &mut stages.sdydt);
            self.history.push(t, &stages.dydt);

            // Shrink until the embedded error estimate accepts the step.
            let (accepted_h, accepted_error) = loop {
                self.trial_step(tissue, state, &mut stages, h);
                let error = self.max_normalized_error(state, &stages, h);
                if error <= 1.0 {
                    break (h, error);
                }
                report.rejected_steps += 1;
                let shrink = (SAFETY * error.powf(-0.25)).max(MIN_SHRINK);
                h *= shrink;
                if h < self.config.h_min {
                    tracing::warn!(time = t, h, "adaptive step underflow");
                    return Err(NumericsError::StepUnderflow {
                        time: t,
                        h,
                        h_min: self.config.h_min,
                    }
                    .into());
                }
            };

            state.assign(&stages.y_out);
            t += accepted_h;
            report.steps += 1;
            ensure_finite(state, t)?;

            // Grow the next trial step from the accepted error level.
            let grow = if accepted_error > 0.0 {
                (SAFETY * accepted_error.powf(-0.2)).min(MAX_GROW)
            } else {
                MAX_GROW
            };
            h = accepted_h * grow.max(MIN_SHRINK);

            let changed = after_accepted_step(tissue, state, accepted_h)?;
            if changed {
                stages = Stages::fresh(state);
            }
            schedule.fire_due(tissue, state, t, &mut printer, &mut report)?;
        }

        report.time = t;
        tracing::info!(
            steps = report.steps,
            rejected = report.rejected_steps,
            time = t,
            "adaptive rk5 run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::reaction::{create_reaction, ReactionSpec};
    use crate::topology::fixtures;

    fn config(t_end: f64, h: f64) -> SolverConfig {
        SolverConfig {
            id: "rk5_adaptive".to_string(),
            t_begin: 0.0,
            t_end,
            num_print: 0,
            h,
            eps_rel: 1e-6,
            eps_abs: 1e-12,
            ..SolverConfig::default()
        }
    }

    #[test]
    fn linear_decay_matches_analytics_within_tolerance() {
        let (mut tissue, mut state) = fixtures::single_square();
        state.cell_data[0][0] = 1.0;
        tissue.add_reaction(
            create_reaction(&ReactionSpec::new(
                "cell::degradation",
                vec![2.0],
                vec![vec![0]],
            ))
            .unwrap(),
        );

        let mut solver = Rk5Adaptive::new(config(3.0, 0.1));
        let report = solver.simulate(&mut tissue, &mut state, None).unwrap();

        let expected = (-6.0_f64).exp();
        assert!((state.cell_data[0][0] - expected).abs() < 1e-6);
        assert!(report.steps > 0);
    }

    #[test]
    fn stiff_spring_forces_rejections_then_converges() {
        // A 10^6 stiffness spring makes the generous initial step
        // untenable; the controller must shrink, register rejections, and
        // still land on the analytical equilibrium (the resting shape).
        // The relaxation time is ~1e-6, so 1e-4 time units is deep in
        // equilibrium.
        let (mut tissue, mut state) = fixtures::single_triangle();
        // Start off-equilibrium: push one vertex outward.
        state.vertex_data[2][1] = 1.5;
        tissue.add_reaction(
            create_reaction(&ReactionSpec::new(
                "wall::spring",
                vec![1e6],
                vec![vec![]],
            ))
            .unwrap(),
        );

        let mut solver = Rk5Adaptive::new(config(1e-4, 0.5));
        let report = solver.simulate(&mut tissue, &mut state, None).unwrap();

        assert!(report.rejected_steps > 0, "expected at least one rejection");
        // Equilibrium: every wall back at its resting length.
        for wall in tissue.walls() {
            let length = crate::math::row_distance(
                &state.vertex_data[wall.vertex1],
                &state.vertex_data[wall.vertex2],
            );
            assert!((length - state.wall_data[wall.index][0]).abs() < 1e-4);
        }
    }

    #[test]
    fn underflow_is_fatal() {
        let (mut tissue, mut state) = fixtures::single_triangle();
        state.vertex_data[2][1] = 1.5;
        tissue.add_reaction(
            create_reaction(&ReactionSpec::new(
                "wall::spring",
                vec![1e6],
                vec![vec![]],
            ))
            .unwrap(),
        );

        let mut cfg = config(1.0, 0.5);
        cfg.h_min = 0.4; // nothing between 0.5 and 0.4 will satisfy 1e6
        let mut solver = Rk5Adaptive::new(cfg);
        let result = solver.simulate(&mut tissue, &mut state, None);
        assert!(matches!(
            result,
            Err(crate::error::CytolisError::Numerics(
                NumericsError::StepUnderflow { .. }
            ))
        ));
    }
}
