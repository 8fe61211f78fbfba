//! Numerical integrators driving the tissue state through time.
//!
//! Every solver runs the same outer protocol: initiate reactions and the
//! direction field once, then step; after each accepted step copy vertex
//! positions back into the vertices, run reaction updates, refresh the
//! direction field, and apply compartment changes. A topology mutation is
//! a hard reset for the stage buffers.

pub mod euler;
pub mod heun_ito;
pub mod rk4;
pub mod rk5;

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, NumericsError, Result};
use crate::output::Printer;
use crate::state::TissueState;
use crate::topology::Tissue;

pub use euler::Euler;
pub use heun_ito::HeunIto;
pub use rk4::Rk4;
pub use rk5::Rk5Adaptive;

/// Slack when comparing times, so accumulated rounding does not drop the
/// final step or a print checkpoint.
pub(crate) const TIME_EPS: f64 = 1e-12;

/// Integration schedule and tolerances, shared by all solver strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Solver strategy: `euler`, `rk4`, `rk5_adaptive`, or `heun_ito`.
    pub id: String,
    pub t_begin: f64,
    pub t_end: f64,
    /// Number of evenly spaced print checkpoints (including both ends).
    pub num_print: usize,
    /// Step size for the fixed-step solvers, initial step for the adaptive
    /// one.
    pub h: f64,
    /// Relative error tolerance (adaptive).
    pub eps_rel: f64,
    /// Absolute error tolerance (adaptive).
    pub eps_abs: f64,
    /// Fatal lower bound for the adaptive step.
    pub h_min: f64,
    /// Noise amplitude for the stochastic solver.
    pub noise_amplitude: f64,
    /// RNG seed for the stochastic solver.
    pub seed: u64,
    /// Retain the last N derivative snapshots for debugging (0 = off).
    pub derivative_history: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            id: "rk5_adaptive".to_string(),
            t_begin: 0.0,
            t_end: 1.0,
            num_print: 2,
            h: 0.01,
            eps_rel: 1e-6,
            eps_abs: 1e-9,
            h_min: 1e-12,
            noise_amplitude: 0.0,
            seed: 1,
            derivative_history: 0,
        }
    }
}

/// What a finished `simulate` call reports back.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverReport {
    /// Accepted steps.
    pub steps: usize,
    /// Rejected adaptive trial steps.
    pub rejected_steps: usize,
    /// Fired print checkpoints.
    pub prints: usize,
    /// Final simulation time.
    pub time: f64,
}

/// A time integrator over the tissue state.
pub trait Solver {
    /// Drives time from `t_begin` to `t_end`, firing the printer at every
    /// checkpoint.
    ///
    /// # Errors
    ///
    /// Propagates reaction, topology, numerical, and output failures.
    fn simulate(
        &mut self,
        tissue: &mut Tissue,
        state: &mut TissueState,
        printer: Option<&mut dyn Printer>,
    ) -> Result<SolverReport>;
}

/// Builds a solver from its configuration.
///
/// # Errors
///
/// Returns `ConfigError::UnknownSolver` for an unknown id.
pub fn create_solver(config: &SolverConfig) -> Result<Box<dyn Solver>> {
    match config.id.as_str() {
        "euler" => Ok(Box::new(Euler::new(config.clone()))),
        "rk4" => Ok(Box::new(Rk4::new(config.clone()))),
        "rk5_adaptive" => Ok(Box::new(Rk5Adaptive::new(config.clone()))),
        "heun_ito" => {
            let rng = StdRng::seed_from_u64(config.seed);
            Ok(Box::new(HeunIto::new(config.clone(), rng)))
        }
        other => Err(ConfigError::UnknownSolver(other.to_string()).into()),
    }
}

/// Ring buffer of recent derivative snapshots, kept when debug output is
/// requested.
#[derive(Debug, Default)]
pub struct DerivativeHistory {
    capacity: usize,
    snapshots: VecDeque<(f64, TissueState)>,
}

impl DerivativeHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            snapshots: VecDeque::new(),
        }
    }

    pub fn push(&mut self, time: f64, derivs: &TissueState) {
        if self.capacity == 0 {
            return;
        }
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back((time, derivs.clone()));
    }

    /// Retained snapshots, oldest first.
    #[must_use]
    pub fn snapshots(&self) -> &VecDeque<(f64, TissueState)> {
        &self.snapshots
    }
}

/// Evenly spaced print checkpoints over `[t_begin, t_end]`.
pub(crate) struct PrintSchedule {
    times: Vec<f64>,
    next: usize,
}

impl PrintSchedule {
    pub(crate) fn new(t_begin: f64, t_end: f64, num_print: usize) -> Self {
        let times = match num_print {
            0 => Vec::new(),
            1 => vec![t_end],
            n => (0..n)
                .map(|k| t_begin + (t_end - t_begin) * k as f64 / (n - 1) as f64)
                .collect(),
        };
        Self { times, next: 0 }
    }

    /// The next pending checkpoint, if any.
    pub(crate) fn next_time(&self) -> Option<f64> {
        self.times.get(self.next).copied()
    }

    /// Fires every checkpoint due at time `t`.
    pub(crate) fn fire_due(
        &mut self,
        tissue: &Tissue,
        state: &TissueState,
        t: f64,
        printer: &mut Option<&mut dyn Printer>,
        report: &mut SolverReport,
    ) -> Result<()> {
        while let Some(due) = self.next_time() {
            if due > t + TIME_EPS {
                break;
            }
            if let Some(p) = printer.as_deref_mut() {
                p.print(tissue, state, t, report.prints)?;
            }
            report.prints += 1;
            self.next += 1;
        }
        Ok(())
    }
}

/// One-time setup shared by every solver: reaction initiation, direction
/// initiation, column validation, and the first position sync.
pub(crate) fn prepare(tissue: &mut Tissue, state: &mut TissueState) -> Result<()> {
    let mut derivs = state.zeroed_like();
    tissue.initiate_reactions(state, &mut derivs)?;
    tissue.initiate_direction(state)?;
    tissue.sync_vertex_positions(state);
    tissue.refresh_cell_planes(state);
    tracing::info!(
        cells = tissue.num_cells(),
        walls = tissue.num_walls(),
        vertices = tissue.num_vertices(),
        "simulation prepared"
    );
    Ok(())
}

/// Post-step protocol after an accepted step of size `step`. Returns
/// `true` when a topology mutation resized the matrices, in which case the
/// caller must rebuild its stage buffers before the next step.
pub(crate) fn after_accepted_step(
    tissue: &mut Tissue,
    state: &mut TissueState,
    step: f64,
) -> Result<bool> {
    tissue.sync_vertex_positions(state);
    tissue.update_reactions(state, step)?;
    tissue.update_direction(state, step)?;
    let changed = tissue.check_compartment_change(state)?;
    if changed {
        tissue.sync_vertex_positions(state);
    }
    // Positions moved either way; 3D plane caches must follow.
    tissue.refresh_cell_planes(state);
    Ok(changed)
}

/// Fails the integration when the state picked up a NaN or infinity.
pub(crate) fn ensure_finite(state: &TissueState, time: f64) -> Result<()> {
    if state.all_finite() {
        Ok(())
    } else {
        Err(NumericsError::NonFinite { time }.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn schedule_spaces_checkpoints_evenly() {
        let s = PrintSchedule::new(0.0, 10.0, 5);
        assert_eq!(s.times, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    }

    #[test]
    fn schedule_handles_degenerate_counts() {
        assert!(PrintSchedule::new(0.0, 1.0, 0).times.is_empty());
        assert_eq!(PrintSchedule::new(0.0, 1.0, 1).times, vec![1.0]);
    }

    #[test]
    fn unknown_solver_id_is_rejected() {
        let config = SolverConfig {
            id: "leapfrog".to_string(),
            ..SolverConfig::default()
        };
        assert!(create_solver(&config).is_err());
    }

    #[test]
    fn known_solver_ids_construct() {
        for id in ["euler", "rk4", "rk5_adaptive", "heun_ito"] {
            let config = SolverConfig {
                id: id.to_string(),
                ..SolverConfig::default()
            };
            assert!(create_solver(&config).is_ok(), "{id} should construct");
        }
    }

    #[test]
    fn history_caps_snapshots() {
        let state = TissueState {
            cell_data: vec![vec![1.0]],
            wall_data: Vec::new(),
            vertex_data: Vec::new(),
        };
        let mut history = DerivativeHistory::new(2);
        for k in 0..5 {
            history.push(k as f64, &state);
        }
        assert_eq!(history.snapshots().len(), 2);
        assert!((history.snapshots()[0].0 - 3.0).abs() < 1e-12);
    }
}
