//! Runtime configuration for the orchestration layer, loadable from JSON
//! with full defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::solver::SolverConfig;

/// Style of the final-state dump written when a run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitOutputFormat {
    /// Plain init format (round-trips through the reader).
    #[default]
    Standard,
    /// Init format with full cell rows, center-triangulation payload
    /// included.
    Triangulated,
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Integrator schedule and tolerances.
    pub solver: SolverConfig,
    /// Print-mode id resolved through the output dispatch table.
    pub print_mode: u32,
    /// Directory all serializers write under.
    pub output_dir: PathBuf,
    /// Input format selector. Only `standard` is consumed here;
    /// alternative formats (sphere packings, Voronoi, PLY, MGX meshes) go
    /// through the external converter first.
    pub init_format: String,
    /// Style of the final-state dump.
    pub init_output_format: InitOutputFormat,
    /// Write a final-state init file when the run finishes.
    pub write_final_state: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            print_mode: 0,
            output_dir: PathBuf::from("output"),
            init_format: "standard".to_string(),
            init_output_format: InitOutputFormat::Standard,
            write_final_state: true,
        }
    }
}

impl SimConfig {
    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the malformed field.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ConfigError::Invalid(format!("configuration: {e}")).into())
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns I/O and parse failures.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Loads a configuration file, falling back to defaults when the file
    /// is missing or malformed.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "falling back to default configuration"
                );
                Self::default()
            }
        }
    }
}
