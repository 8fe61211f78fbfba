//! Output adapters: pluggable serializers for the current tissue state,
//! selected by a print-mode id through a dispatch table.

pub mod gnuplot;
pub mod init_dump;
pub mod ply;
pub mod vtk;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::state::TissueState;
use crate::topology::Tissue;

pub use gnuplot::GnuplotPrinter;
pub use init_dump::{InitPrinter, TriangulatedInitPrinter};
pub use ply::PlyPrinter;
pub use vtk::VtuPrinter;

/// A serializer for the current state, invoked at every print checkpoint.
pub trait Printer {
    /// Writes the state at simulation time `time`; `t_count` is the
    /// zero-based checkpoint number.
    ///
    /// # Errors
    ///
    /// Returns I/O failures.
    fn print(
        &mut self,
        tissue: &Tissue,
        state: &TissueState,
        time: f64,
        t_count: usize,
    ) -> Result<()>;
}

/// The print modes of the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMode {
    /// Plain polygon dump, one block per checkpoint.
    Default,
    /// Dual VTU series (cells + walls) with PVD indices.
    Vtu,
    /// VTU series with every wall split into its two half-segments so the
    /// per-side variables can be rendered separately.
    VtuSplitWalls,
    /// PLY geometry per checkpoint.
    Ply,
    /// Gnuplot row dump, one file for the whole run.
    Gnuplot,
    /// Init-format rewrite per checkpoint (round-trips through the
    /// reader).
    Init,
    /// Init-format rewrite including the center-triangulation payload.
    TriangulatedInit,
}

impl PrintMode {
    /// Decodes the configuration integer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownPrintMode` for an unmapped id.
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(Self::Default),
            1 => Ok(Self::Vtu),
            2 => Ok(Self::VtuSplitWalls),
            3 => Ok(Self::Ply),
            4 => Ok(Self::Gnuplot),
            5 => Ok(Self::Init),
            6 => Ok(Self::TriangulatedInit),
            other => Err(ConfigError::UnknownPrintMode(other).into()),
        }
    }
}

/// Builds the serializer for a mode, writing under `directory`.
///
/// # Errors
///
/// Returns I/O failures from creating the output directory.
pub fn create_printer(mode: PrintMode, directory: &Path) -> Result<Box<dyn Printer>> {
    std::fs::create_dir_all(directory)?;
    let dir = directory.to_path_buf();
    Ok(match mode {
        PrintMode::Default => Box::new(DefaultPrinter::create(&dir)?),
        PrintMode::Vtu => Box::new(VtuPrinter::new(dir, false)),
        PrintMode::VtuSplitWalls => Box::new(VtuPrinter::new(dir, true)),
        PrintMode::Ply => Box::new(PlyPrinter::new(dir)),
        PrintMode::Gnuplot => Box::new(GnuplotPrinter::create(&dir)?),
        PrintMode::Init => Box::new(InitPrinter::new(dir)),
        PrintMode::TriangulatedInit => Box::new(TriangulatedInitPrinter::new(dir)),
    })
}

/// Opens `name` under `dir` for buffered writing, truncating.
pub(crate) fn create_file(dir: &Path, name: &str) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(dir.join(name))?))
}

/// Number of per-cell variable columns excluding any center-triangulation
/// payload.
pub(crate) fn cell_base_width(tissue: &Tissue, state: &TissueState) -> usize {
    tissue
        .cells()
        .iter()
        .map(|c| c.center_offset.unwrap_or(state.cell_data[c.index].len()))
        .min()
        .unwrap_or(0)
}

/// Uniform wall row width.
pub(crate) fn wall_width(state: &TissueState) -> usize {
    state.wall_data.iter().map(Vec::len).min().unwrap_or(0)
}

/// The default polygon dump: per checkpoint one block holding the time,
/// then every cell's vertex ring and variable row.
pub struct DefaultPrinter {
    out: BufWriter<File>,
}

impl DefaultPrinter {
    /// Creates `tissue.data` under `dir`.
    ///
    /// # Errors
    ///
    /// Returns I/O failures.
    pub fn create(dir: &PathBuf) -> Result<Self> {
        Ok(Self {
            out: create_file(dir, "tissue.data")?,
        })
    }
}

impl Printer for DefaultPrinter {
    fn print(
        &mut self,
        tissue: &Tissue,
        state: &TissueState,
        time: f64,
        _t_count: usize,
    ) -> Result<()> {
        let width = cell_base_width(tissue, state);
        writeln!(self.out, "{} {}", time, tissue.num_cells())?;
        for cell in tissue.cells() {
            write!(self.out, "{}", cell.vertices.len())?;
            for &v in &cell.vertices {
                for x in &state.vertex_data[v] {
                    write!(self.out, " {x}")?;
                }
            }
            for column in 0..width {
                write!(self.out, " {}", state.cell_data[cell.index][column])?;
            }
            writeln!(self.out)?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Fresh per-test output directory under the system temp dir.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join("cytolis-tests")
        .join(format!("{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::topology::fixtures;

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(PrintMode::from_id(99).is_err());
        assert!(PrintMode::from_id(4).is_ok());
    }

    #[test]
    fn default_dump_writes_one_block_per_checkpoint() {
        let dir = scratch_dir("default-dump");
        let (tissue, state) = fixtures::two_squares();
        let mut printer = create_printer(PrintMode::Default, &dir).unwrap();
        printer.print(&tissue, &state, 0.0, 0).unwrap();
        printer.print(&tissue, &state, 1.0, 1).unwrap();

        let text = std::fs::read_to_string(dir.join("tissue.data")).unwrap();
        assert!(text.starts_with("0 2"));
        assert!(text.contains("1 2"));
        // One line per cell per block plus separators.
        assert_eq!(text.lines().filter(|l| !l.is_empty()).count(), 6);
    }
}
