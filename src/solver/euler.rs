use crate::error::Result;
use crate::output::Printer;
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{
    after_accepted_step, ensure_finite, prepare, DerivativeHistory, PrintSchedule, Solver,
    SolverConfig, SolverReport, TIME_EPS,
};

/// Explicit Euler with a fixed step: `y += h * f(y)`.
///
/// The cheapest strategy, adequate for heavily damped mechanics with a
/// small step; the default choice of the regression scenarios.
pub struct Euler {
    config: SolverConfig,
    history: DerivativeHistory,
}

impl Euler {
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

impl Solver for Euler {
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

        let mut dydt = state.zeroed_like();
        while t < self.config.t_end - TIME_EPS {
            let h = self.config.h.min(self.config.t_end - t);
            tissue.derivs(state, &mut dydt);
            self.history.push(t, &dydt);
            state.add_scaled(&dydt, h);
            t += h;
            report.steps += 1;
            ensure_finite(state, t)?;

            let changed = after_accepted_step(tissue, state, h)?;
            if changed {
                dydt = state.zeroed_like();
            }
            schedule.fire_due(tissue, state, t, &mut printer, &mut report)?;
        }

        report.time = t;
        tracing::info!(steps = report.steps, time = t, "euler run finished");
        Ok(report)
    }
}
