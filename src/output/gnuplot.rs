use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::error::Result;
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{cell_base_width, create_file, Printer};

/// Gnuplot row dump: one file for the whole run, one row per cell vertex
/// per checkpoint (`time cell x y [z] cell_vars...`), with cells separated
/// by single blank lines and checkpoints by double blank lines so gnuplot's
/// `index` addressing works.
pub struct GnuplotPrinter {
    out: BufWriter<File>,
}

impl GnuplotPrinter {
    /// Creates `tissue.gnuplot` under `dir`.
    ///
    /// # Errors
    ///
    /// Returns I/O failures.
    pub fn create(dir: &PathBuf) -> Result<Self> {
        Ok(Self {
            out: create_file(dir, "tissue.gnuplot")?,
        })
    }
}

impl Printer for GnuplotPrinter {
    fn print(
        &mut self,
        tissue: &Tissue,
        state: &TissueState,
        time: f64,
        _t_count: usize,
    ) -> Result<()> {
        let width = cell_base_width(tissue, state);
        for cell in tissue.cells() {
            for &v in &cell.vertices {
                write!(self.out, "{time} {}", cell.index)?;
                for x in &state.vertex_data[v] {
                    write!(self.out, " {x}")?;
                }
                for column in 0..width {
                    write!(self.out, " {}", state.cell_data[cell.index][column])?;
                }
                writeln!(self.out)?;
            }
            writeln!(self.out)?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
