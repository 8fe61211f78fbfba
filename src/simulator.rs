//! Orchestration: load a mesh and a model, pick a solver and a serializer,
//! and run the simulation to its end time.

use std::path::Path;

use crate::config::{InitOutputFormat, SimConfig};
use crate::error::{ConfigError, Result};
use crate::io::init::{read_init_str, write_init, write_init_full};
use crate::io::model::{apply_model, read_model_str};
use crate::output::{create_printer, PrintMode, Printer};
use crate::solver::{create_solver, SolverReport};
use crate::state::TissueState;
use crate::topology::Tissue;

/// One configured simulation: the tissue, its state, and the runtime
/// configuration steering solver and output.
pub struct Simulator {
    tissue: Tissue,
    state: TissueState,
    config: SimConfig,
}

impl Simulator {
    /// Wraps an already-assembled tissue and state.
    #[must_use]
    pub fn new(tissue: Tissue, state: TissueState, config: SimConfig) -> Self {
        Self {
            tissue,
            state,
            config,
        }
    }

    /// Builds a simulation from init and model sources.
    ///
    /// # Errors
    ///
    /// Returns parse and construction failures, and rejects input formats
    /// the core does not read (those go through the external converter).
    pub fn from_sources(init: &str, model: &str, config: SimConfig) -> Result<Self> {
        if config.init_format != "standard" {
            return Err(ConfigError::Invalid(format!(
                "init format `{}` is produced by the external converter; \
                 this kernel reads `standard`",
                config.init_format
            ))
            .into());
        }
        let (mut tissue, state) = read_init_str(init)?;
        let model_spec = read_model_str(model)?;
        apply_model(&mut tissue, &model_spec)?;
        Ok(Self::new(tissue, state, config))
    }

    /// Builds a simulation from init and model files.
    ///
    /// # Errors
    ///
    /// See [`Self::from_sources`].
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        init_path: P,
        model_path: Q,
        config: SimConfig,
    ) -> Result<Self> {
        let init = std::fs::read_to_string(init_path)?;
        let model = std::fs::read_to_string(model_path)?;
        Self::from_sources(&init, &model, config)
    }

    /// Runs the simulation to its end time, firing the configured
    /// serializer at every checkpoint and dumping the final state.
    ///
    /// # Errors
    ///
    /// Propagates solver, topology, and output failures.
    pub fn run(&mut self) -> Result<SolverReport> {
        let mut solver = create_solver(&self.config.solver)?;
        let mut printer: Option<Box<dyn Printer>> = if self.config.solver.num_print > 0 {
            let mode = PrintMode::from_id(self.config.print_mode)?;
            Some(create_printer(mode, &self.config.output_dir)?)
        } else {
            None
        };
        let printer_ref: Option<&mut dyn Printer> = match &mut printer {
            Some(p) => Some(p.as_mut()),
            None => None,
        };

        let report = solver.simulate(&mut self.tissue, &mut self.state, printer_ref)?;

        if self.config.write_final_state {
            std::fs::create_dir_all(&self.config.output_dir)?;
            let path = self.config.output_dir.join("final.init");
            let file = std::io::BufWriter::new(std::fs::File::create(path)?);
            match self.config.init_output_format {
                InitOutputFormat::Standard => write_init(&self.tissue, &self.state, file)?,
                InitOutputFormat::Triangulated => {
                    write_init_full(&self.tissue, &self.state, file)?;
                }
            }
        }
        tracing::info!(
            steps = report.steps,
            cells = self.tissue.num_cells(),
            "simulation finished"
        );
        Ok(report)
    }

    /// The simulated tissue.
    #[must_use]
    pub fn tissue(&self) -> &Tissue {
        &self.tissue
    }

    /// The current state matrices.
    #[must_use]
    pub fn state(&self) -> &TissueState {
        &self.state
    }

    /// The runtime configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::solver::SolverConfig;

    const SQUARE_INIT: &str = "\
1 4 4
0 0 -1 0 1
1 0 -1 1 2
2 0 -1 2 3
3 0 -1 3 0

4 2
0 0
1 0
1 1
0 1

4 1 0
1
1
1
1

1 1
0
";

    /// Proportional wall growth relaxed by springs, with volume-threshold
    /// division through the longest wall.
    const GROWTH_MODEL: &str = "\
2 1 0
wall::spring 1 1 0
5.0
wall::growth 2 0
0.1 1.0
division::longest_wall 2 1 0
2.0 0.05
";

    fn quiet_config(t_end: f64, h: f64) -> SimConfig {
        SimConfig {
            solver: SolverConfig {
                id: "euler".to_string(),
                t_begin: 0.0,
                t_end,
                num_print: 0,
                h,
                ..SolverConfig::default()
            },
            write_final_state: false,
            ..SimConfig::default()
        }
    }

    #[test]
    fn growth_and_division_end_to_end() {
        let mut sim =
            Simulator::from_sources(SQUARE_INIT, GROWTH_MODEL, quiet_config(8.0, 0.01))
                .unwrap();
        let report = sim.run().unwrap();

        assert!(report.steps > 0);
        // Growth pushed the cell past twice its initial volume at least
        // once, so the tissue divided.
        assert!(sim.tissue().num_cells() >= 2);
        sim.tissue().check_connectivity(false).unwrap();

        // No cell sits above the division threshold after the run, and the
        // tissue as a whole has grown.
        let mut total = 0.0;
        for cell in sim.tissue().cells() {
            let area = cell.area(sim.state(), 2);
            assert!(area > 0.0);
            assert!(area <= 2.0 + 0.1);
            total += area;
        }
        assert!(total > 1.0);
    }

    #[test]
    fn rejects_non_standard_init_format() {
        let config = SimConfig {
            init_format: "voronoi".to_string(),
            ..SimConfig::default()
        };
        assert!(Simulator::from_sources(SQUARE_INIT, "0 0 0\n", config).is_err());
    }

    #[test]
    fn final_state_dump_round_trips() {
        let dir = crate::output::scratch_dir("simulator-final");
        let mut config = quiet_config(0.1, 0.01);
        config.write_final_state = true;
        config.output_dir = dir.clone();

        let mut sim = Simulator::from_sources(SQUARE_INIT, "0 0 0\n", config).unwrap();
        sim.run().unwrap();

        let text = std::fs::read_to_string(dir.join("final.init")).unwrap();
        let (tissue, _) = crate::io::init::read_init_str(&text).unwrap();
        assert_eq!(tissue.num_cells(), 1);
    }

    #[test]
    fn printer_fires_at_checkpoints() {
        let dir = crate::output::scratch_dir("simulator-prints");
        let mut config = quiet_config(1.0, 0.01);
        config.solver.num_print = 3;
        config.print_mode = 5; // init rewrite per checkpoint
        config.output_dir = dir.clone();

        let mut sim = Simulator::from_sources(SQUARE_INIT, "0 0 0\n", config).unwrap();
        let report = sim.run().unwrap();
        assert_eq!(report.prints, 3);
        for k in 0..3 {
            assert!(dir.join(format!("tissue_{k:05}.init")).exists());
        }
    }
}
