use std::io::Write;
use std::path::PathBuf;

use crate::error::Result;
use crate::math::position3;
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{create_file, Printer};

/// ASCII PLY geometry, one file per checkpoint: the vertex table plus one
/// polygonal face per cell.
pub struct PlyPrinter {
    dir: PathBuf,
}

impl PlyPrinter {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Printer for PlyPrinter {
    fn print(
        &mut self,
        tissue: &Tissue,
        state: &TissueState,
        _time: f64,
        t_count: usize,
    ) -> Result<()> {
        let mut out = create_file(&self.dir, &format!("tissue_{t_count:05}.ply"))?;
        writeln!(out, "ply")?;
        writeln!(out, "format ascii 1.0")?;
        writeln!(out, "element vertex {}", tissue.num_vertices())?;
        writeln!(out, "property float x")?;
        writeln!(out, "property float y")?;
        writeln!(out, "property float z")?;
        writeln!(out, "element face {}", tissue.num_cells())?;
        writeln!(out, "property list uchar int vertex_index")?;
        writeln!(out, "end_header")?;
        for row in &state.vertex_data {
            let p = position3(row);
            writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
        }
        for cell in tissue.cells() {
            write!(out, "{}", cell.vertices.len())?;
            for &v in &cell.vertices {
                write!(out, " {v}")?;
            }
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }
}
