use crate::error::Result;
use crate::output::Printer;
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{
    after_accepted_step, ensure_finite, prepare, DerivativeHistory, PrintSchedule, Solver,
    SolverConfig, SolverReport, TIME_EPS,
};

/// Classical four-stage Runge-Kutta with a fixed step.
pub struct Rk4 {
    config: SolverConfig,
    history: DerivativeHistory,
}

impl Rk4 {
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
}

/// Stage buffers, reallocated whenever a topology mutation resizes the
/// state.
struct Stages {
    k1: TissueState,
    k2: TissueState,
    k3: TissueState,
    k4: TissueState,
    y_temp: TissueState,
}

impl Stages {
    fn fresh(state: &TissueState) -> Self {
        Self {
            k1: state.zeroed_like(),
            k2: state.zeroed_like(),
            k3: state.zeroed_like(),
            k4: state.zeroed_like(),
            y_temp: state.zeroed_like(),
        }
    }
}

impl Solver for Rk4 {
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
        while t < self.config.t_end - TIME_EPS {
            let h = self.config.h.min(self.config.t_end - t);

            tissue.derivs(state, &mut stages.k1);
            self.history.push(t, &stages.k1);

            stages.y_temp.assign(state);
            stages.y_temp.add_scaled(&stages.k1, 0.5 * h);
            tissue.derivs(&stages.y_temp, &mut stages.k2);

            stages.y_temp.assign(state);
            stages.y_temp.add_scaled(&stages.k2, 0.5 * h);
            tissue.derivs(&stages.y_temp, &mut stages.k3);

            stages.y_temp.assign(state);
            stages.y_temp.add_scaled(&stages.k3, h);
            tissue.derivs(&stages.y_temp, &mut stages.k4);

            let sixth = h / 6.0;
            state.add_scaled(&stages.k1, sixth);
            state.add_scaled(&stages.k2, 2.0 * sixth);
            state.add_scaled(&stages.k3, 2.0 * sixth);
            state.add_scaled(&stages.k4, sixth);

            t += h;
            report.steps += 1;
            ensure_finite(state, t)?;

            let changed = after_accepted_step(tissue, state, h)?;
            if changed {
                stages = Stages::fresh(state);
            }
            schedule.fire_due(tissue, state, t, &mut printer, &mut report)?;
        }

        report.time = t;
        tracing::info!(steps = report.steps, time = t, "rk4 run finished");
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::reaction::{create_reaction, ReactionSpec};
    use crate::topology::fixtures;

    #[test]
    fn decay_is_fourth_order_accurate() {
        let (mut tissue, mut state) = fixtures::single_square();
        state.cell_data[0][0] = 1.0;
        tissue.add_reaction(
            create_reaction(&ReactionSpec::new(
                "cell::degradation",
                vec![1.0],
                vec![vec![0]],
            ))
            .unwrap(),
        );

        let config = SolverConfig {
            id: "rk4".to_string(),
            t_begin: 0.0,
            t_end: 1.0,
            num_print: 0,
            h: 0.01,
            ..SolverConfig::default()
        };
        let mut solver = Rk4::new(config);
        solver.simulate(&mut tissue, &mut state, None).unwrap();

        let expected = (-1.0_f64).exp();
        assert!((state.cell_data[0][0] - expected).abs() < 1e-9);
    }

    #[test]
    fn two_cell_diffusion_equilibrates_and_conserves() {
        // Two squares share a wall; concentrations 1 and 0 must meet at
        // one half with the total conserved.
        let (mut tissue, mut state) = fixtures::two_squares();
        state.cell_data[0][0] = 1.0;
        state.cell_data[1][0] = 0.0;
        tissue.add_reaction(
            create_reaction(&ReactionSpec::new(
                "cell::diffusion",
                vec![0.1],
                vec![vec![0]],
            ))
            .unwrap(),
        );

        let config = SolverConfig {
            id: "rk4".to_string(),
            t_begin: 0.0,
            t_end: 50.0,
            num_print: 0,
            h: 0.05,
            ..SolverConfig::default()
        };
        let mut solver = Rk4::new(config);
        solver.simulate(&mut tissue, &mut state, None).unwrap();

        let total = state.cell_data[0][0] + state.cell_data[1][0];
        assert!((total - 1.0).abs() < 1e-9);
        assert!((state.cell_data[0][0] - 0.5).abs() < 1e-3);
        assert!((state.cell_data[1][0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn membrane_ring_diffusion_uniformizes() {
        // Unit mass on one wall of a hexagonal cell spreads evenly around
        // the ring with the total conserved.
        let (mut tissue, mut state) = fixtures::hexagon();
        state.wall_data[0][1] = 1.0;
        tissue.add_reaction(
            create_reaction(&ReactionSpec::new(
                "wall::membrane_diffusion",
                vec![1.0],
                vec![vec![1, 1]],
            ))
            .unwrap(),
        );

        let config = SolverConfig {
            id: "rk4".to_string(),
            t_begin: 0.0,
            t_end: 20.0,
            num_print: 0,
            h: 0.01,
            ..SolverConfig::default()
        };
        let mut solver = Rk4::new(config);
        solver.simulate(&mut tissue, &mut state, None).unwrap();

        let total: f64 = state.wall_data.iter().map(|row| row[1]).sum();
        assert!((total - 1.0).abs() < 1e-9);
        let uniform = 1.0 / 6.0;
        for row in &state.wall_data {
            assert!((row[1] - uniform).abs() < 1e-3);
        }
    }
}
