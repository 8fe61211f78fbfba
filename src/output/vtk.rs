use std::io::Write;
use std::path::PathBuf;

use crate::error::Result;
use crate::math::position3;
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{cell_base_width, create_file, wall_width, Printer};

/// Dual VTU series: one `UnstructuredGrid` file per checkpoint for the
/// cells (polygons) and one for the walls (lines), each indexed by a PVD
/// collection rewritten at every print.
///
/// In split mode every wall side flanked by a proper cell becomes its own
/// line segment, pulled slightly toward that cell, so per-side wall
/// variables can be rendered separately.
pub struct VtuPrinter {
    dir: PathBuf,
    split_walls: bool,
    cell_series: Vec<(f64, String)>,
    wall_series: Vec<(f64, String)>,
}

const VTK_LINE: u8 = 3;
const VTK_POLYGON: u8 = 7;

/// Fraction a split wall segment is pulled toward its cell's center.
const SPLIT_PULL: f64 = 0.1;

impl VtuPrinter {
    #[must_use]
    pub fn new(dir: PathBuf, split_walls: bool) -> Self {
        Self {
            dir,
            split_walls,
            cell_series: Vec::new(),
            wall_series: Vec::new(),
        }
    }

    fn write_cells(&self, name: &str, tissue: &Tissue, state: &TissueState) -> Result<()> {
        let mut out = create_file(&self.dir, name)?;
        let num_points = tissue.num_vertices();
        let num_cells = tissue.num_cells();
        writeln!(out, r#"<?xml version="1.0"?>"#)?;
        writeln!(
            out,
            r#"<VTKFile type="UnstructuredGrid" version="0.1" byte_order="LittleEndian">"#
        )?;
        writeln!(out, "  <UnstructuredGrid>")?;
        writeln!(
            out,
            r#"    <Piece NumberOfPoints="{num_points}" NumberOfCells="{num_cells}">"#
        )?;

        writeln!(out, "      <Points>")?;
        writeln!(
            out,
            r#"        <DataArray type="Float64" NumberOfComponents="3" format="ascii">"#
        )?;
        for row in &state.vertex_data {
            let p = position3(row);
            writeln!(out, "          {} {} {}", p.x, p.y, p.z)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Points>")?;

        writeln!(out, "      <Cells>")?;
        writeln!(
            out,
            r#"        <DataArray type="Int32" Name="connectivity" format="ascii">"#
        )?;
        for cell in tissue.cells() {
            write!(out, "         ")?;
            for &v in &cell.vertices {
                write!(out, " {v}")?;
            }
            writeln!(out)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(
            out,
            r#"        <DataArray type="Int32" Name="offsets" format="ascii">"#
        )?;
        let mut offset = 0;
        for cell in tissue.cells() {
            offset += cell.vertices.len();
            writeln!(out, "          {offset}")?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(
            out,
            r#"        <DataArray type="UInt8" Name="types" format="ascii">"#
        )?;
        for _ in tissue.cells() {
            writeln!(out, "          {VTK_POLYGON}")?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Cells>")?;

        writeln!(out, "      <CellData>")?;
        for column in 0..cell_base_width(tissue, state) {
            writeln!(
                out,
                r#"        <DataArray type="Float64" Name="cell_var_{column}" format="ascii">"#
            )?;
            for cell in tissue.cells() {
                writeln!(out, "          {}", state.cell_data[cell.index][column])?;
            }
            writeln!(out, "        </DataArray>")?;
        }
        writeln!(out, "      </CellData>")?;

        writeln!(out, "    </Piece>")?;
        writeln!(out, "  </UnstructuredGrid>")?;
        writeln!(out, "</VTKFile>")?;
        out.flush()?;
        Ok(())
    }

    fn write_walls(&self, name: &str, tissue: &Tissue, state: &TissueState) -> Result<()> {
        let mut out = create_file(&self.dir, name)?;
        let num_points = tissue.num_vertices();
        let num_lines = tissue.num_walls();
        writeln!(out, r#"<?xml version="1.0"?>"#)?;
        writeln!(
            out,
            r#"<VTKFile type="UnstructuredGrid" version="0.1" byte_order="LittleEndian">"#
        )?;
        writeln!(out, "  <UnstructuredGrid>")?;
        writeln!(
            out,
            r#"    <Piece NumberOfPoints="{num_points}" NumberOfCells="{num_lines}">"#
        )?;

        writeln!(out, "      <Points>")?;
        writeln!(
            out,
            r#"        <DataArray type="Float64" NumberOfComponents="3" format="ascii">"#
        )?;
        for row in &state.vertex_data {
            let p = position3(row);
            writeln!(out, "          {} {} {}", p.x, p.y, p.z)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Points>")?;

        writeln!(out, "      <Cells>")?;
        writeln!(
            out,
            r#"        <DataArray type="Int32" Name="connectivity" format="ascii">"#
        )?;
        for wall in tissue.walls() {
            writeln!(out, "          {} {}", wall.vertex1, wall.vertex2)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(
            out,
            r#"        <DataArray type="Int32" Name="offsets" format="ascii">"#
        )?;
        for k in 1..=num_lines {
            writeln!(out, "          {}", 2 * k)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(
            out,
            r#"        <DataArray type="UInt8" Name="types" format="ascii">"#
        )?;
        for _ in 0..num_lines {
            writeln!(out, "          {VTK_LINE}")?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Cells>")?;

        writeln!(out, "      <CellData>")?;
        for column in 0..wall_width(state) {
            writeln!(
                out,
                r#"        <DataArray type="Float64" Name="wall_var_{column}" format="ascii">"#
            )?;
            for wall in tissue.walls() {
                writeln!(out, "          {}", state.wall_data[wall.index][column])?;
            }
            writeln!(out, "        </DataArray>")?;
        }
        writeln!(out, "      </CellData>")?;

        writeln!(out, "    </Piece>")?;
        writeln!(out, "  </UnstructuredGrid>")?;
        writeln!(out, "</VTKFile>")?;
        out.flush()?;
        Ok(())
    }

    fn write_walls_split(&self, name: &str, tissue: &Tissue, state: &TissueState) -> Result<()> {
        // One segment per (wall, proper-cell side), with its own two
        // points pulled toward that cell.
        let mut points: Vec<[f64; 3]> = Vec::new();
        let mut segments: Vec<(usize, u8)> = Vec::new(); // (wall index, side)
        for wall in tissue.walls() {
            for (side, flank) in [wall.cell1, wall.cell2].into_iter().enumerate() {
                let Some(c) = flank.cell() else { continue };
                let center = tissue.cell(c).center(state);
                for v in [wall.vertex1, wall.vertex2] {
                    let p = position3(&state.vertex_data[v]);
                    let pulled = p + (center - p) * SPLIT_PULL;
                    points.push([pulled.x, pulled.y, pulled.z]);
                }
                segments.push((wall.index, side as u8));
            }
        }

        let mut out = create_file(&self.dir, name)?;
        writeln!(out, r#"<?xml version="1.0"?>"#)?;
        writeln!(
            out,
            r#"<VTKFile type="UnstructuredGrid" version="0.1" byte_order="LittleEndian">"#
        )?;
        writeln!(out, "  <UnstructuredGrid>")?;
        writeln!(
            out,
            r#"    <Piece NumberOfPoints="{}" NumberOfCells="{}">"#,
            points.len(),
            segments.len()
        )?;

        writeln!(out, "      <Points>")?;
        writeln!(
            out,
            r#"        <DataArray type="Float64" NumberOfComponents="3" format="ascii">"#
        )?;
        for p in &points {
            writeln!(out, "          {} {} {}", p[0], p[1], p[2])?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Points>")?;

        writeln!(out, "      <Cells>")?;
        writeln!(
            out,
            r#"        <DataArray type="Int32" Name="connectivity" format="ascii">"#
        )?;
        for k in 0..segments.len() {
            writeln!(out, "          {} {}", 2 * k, 2 * k + 1)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(
            out,
            r#"        <DataArray type="Int32" Name="offsets" format="ascii">"#
        )?;
        for k in 1..=segments.len() {
            writeln!(out, "          {}", 2 * k)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(
            out,
            r#"        <DataArray type="UInt8" Name="types" format="ascii">"#
        )?;
        for _ in &segments {
            writeln!(out, "          {VTK_LINE}")?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Cells>")?;

        writeln!(out, "      <CellData>")?;
        writeln!(
            out,
            r#"        <DataArray type="UInt8" Name="side" format="ascii">"#
        )?;
        for (_, side) in &segments {
            writeln!(out, "          {side}")?;
        }
        writeln!(out, "        </DataArray>")?;
        for column in 0..wall_width(state) {
            writeln!(
                out,
                r#"        <DataArray type="Float64" Name="wall_var_{column}" format="ascii">"#
            )?;
            for (wall, _) in &segments {
                writeln!(out, "          {}", state.wall_data[*wall][column])?;
            }
            writeln!(out, "        </DataArray>")?;
        }
        writeln!(out, "      </CellData>")?;

        writeln!(out, "    </Piece>")?;
        writeln!(out, "  </UnstructuredGrid>")?;
        writeln!(out, "</VTKFile>")?;
        out.flush()?;
        Ok(())
    }

    fn write_pvd(&self, name: &str, series: &[(f64, String)]) -> Result<()> {
        let mut out = create_file(&self.dir, name)?;
        writeln!(out, r#"<?xml version="1.0"?>"#)?;
        writeln!(
            out,
            r#"<VTKFile type="Collection" version="0.1" byte_order="LittleEndian">"#
        )?;
        writeln!(out, "  <Collection>")?;
        for (time, file) in series {
            writeln!(
                out,
                r#"    <DataSet timestep="{time}" group="" part="0" file="{file}"/>"#
            )?;
        }
        writeln!(out, "  </Collection>")?;
        writeln!(out, "</VTKFile>")?;
        out.flush()?;
        Ok(())
    }
}

impl Printer for VtuPrinter {
    fn print(
        &mut self,
        tissue: &Tissue,
        state: &TissueState,
        time: f64,
        t_count: usize,
    ) -> Result<()> {
        let cells_name = format!("cells_{t_count:05}.vtu");
        self.write_cells(&cells_name, tissue, state)?;
        self.cell_series.push((time, cells_name));

        let walls_name = format!("walls_{t_count:05}.vtu");
        if self.split_walls {
            self.write_walls_split(&walls_name, tissue, state)?;
        } else {
            self.write_walls(&walls_name, tissue, state)?;
        }
        self.wall_series.push((time, walls_name));

        self.write_pvd("cells.pvd", &self.cell_series)?;
        self.write_pvd("walls.pvd", &self.wall_series)?;
        Ok(())
    }
}
