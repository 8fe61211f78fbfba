//! The default plain-text init format:
//!
//! ```text
//! <numCell> <numWall> <numVertex>
//! for each wall:  <wallIdx> <cell1|-1> <cell2|-1> <v1> <v2>
//! <numVertex> <dimension>
//! for each vertex:  <x> <y> [<z>]
//! <numWall> 1 <numWallVar>
//! for each wall:  <length> <var...>
//! <numCell> <numCellVar>
//! for each cell:  <var...>
//! ```
//!
//! Cell index `-1` denotes the background.

use std::io::{Read, Write};

use crate::error::{ParseError, Result};
use crate::state::TissueState;
use crate::topology::{CellRef, Tissue, WallTopology};

use super::TokenStream;

/// Parses an init source and assembles the tissue plus its state matrices.
///
/// # Errors
///
/// Returns a parse error with line context for malformed input, or a
/// topology error when the described mesh is inconsistent.
pub fn read_init<R: Read>(mut reader: R) -> Result<(Tissue, TissueState)> {
    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(ParseError::Io)?;
    read_init_str(&text)
}

/// [`read_init`] over an in-memory string.
///
/// # Errors
///
/// See [`read_init`].
pub fn read_init_str(text: &str) -> Result<(Tissue, TissueState)> {
    let mut tokens = TokenStream::new(text);

    let num_cells = tokens.next_usize("cell count")?;
    let num_walls = tokens.next_usize("wall count")?;
    let num_vertices = tokens.next_usize("vertex count")?;

    let mut wall_topology = Vec::with_capacity(num_walls);
    for expected_index in 0..num_walls {
        let index = tokens.next_usize("wall index")?;
        if index != expected_index {
            return Err(ParseError::Malformed {
                line: tokens.line(),
                what: format!("wall index {index}, expected {expected_index}"),
            }
            .into());
        }
        let cell1 = CellRef::from_signed(tokens.next_i64("cell index or -1")?);
        let cell2 = CellRef::from_signed(tokens.next_i64("cell index or -1")?);
        let vertex1 = tokens.next_usize("vertex index")?;
        let vertex2 = tokens.next_usize("vertex index")?;
        wall_topology.push(WallTopology {
            vertex1,
            vertex2,
            cell1,
            cell2,
        });
    }

    let vertex_rows = tokens.next_usize("vertex count")?;
    if vertex_rows != num_vertices {
        return Err(ParseError::Malformed {
            line: tokens.line(),
            what: format!("vertex table holds {vertex_rows} rows, header said {num_vertices}"),
        }
        .into());
    }
    let dimension = tokens.next_usize("dimension")?;
    if dimension != 2 && dimension != 3 {
        return Err(ParseError::Malformed {
            line: tokens.line(),
            what: format!("dimension {dimension}, expected 2 or 3"),
        }
        .into());
    }
    let mut vertex_data = Vec::with_capacity(num_vertices);
    for _ in 0..num_vertices {
        let mut row = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            row.push(tokens.next_f64("coordinate")?);
        }
        vertex_data.push(row);
    }

    let wall_rows = tokens.next_usize("wall count")?;
    let length_columns = tokens.next_usize("length column count")?;
    let num_wall_vars = tokens.next_usize("wall variable count")?;
    if wall_rows != num_walls || length_columns != 1 {
        return Err(ParseError::Malformed {
            line: tokens.line(),
            what: format!(
                "wall data header {wall_rows} {length_columns}, expected {num_walls} 1"
            ),
        }
        .into());
    }
    let mut wall_data = Vec::with_capacity(num_walls);
    for _ in 0..num_walls {
        let mut row = Vec::with_capacity(1 + num_wall_vars);
        for _ in 0..=num_wall_vars {
            row.push(tokens.next_f64("wall variable")?);
        }
        wall_data.push(row);
    }

    let cell_rows = tokens.next_usize("cell count")?;
    let num_cell_vars = tokens.next_usize("cell variable count")?;
    if cell_rows != num_cells {
        return Err(ParseError::Malformed {
            line: tokens.line(),
            what: format!("cell data holds {cell_rows} rows, header said {num_cells}"),
        }
        .into());
    }
    let mut cell_data = Vec::with_capacity(num_cells);
    for _ in 0..num_cells {
        let mut row = Vec::with_capacity(num_cell_vars);
        for _ in 0..num_cell_vars {
            row.push(tokens.next_f64("cell variable")?);
        }
        cell_data.push(row);
    }

    let state = TissueState {
        cell_data,
        wall_data,
        vertex_data,
    };
    let tissue = Tissue::read_from_data(dimension, &wall_topology, &state)?;
    Ok((tissue, state))
}

/// Writes the init format, truncating cell rows at the
/// center-triangulation offset so the output round-trips through
/// [`read_init`].
///
/// # Errors
///
/// Returns I/O failures.
pub fn write_init<W: Write>(tissue: &Tissue, state: &TissueState, writer: W) -> Result<()> {
    write_init_rows(tissue, state, writer, false)
}

/// Writes the init format with full cell rows, center-triangulation
/// payload included.
///
/// # Errors
///
/// Returns I/O failures.
pub fn write_init_full<W: Write>(tissue: &Tissue, state: &TissueState, writer: W) -> Result<()> {
    write_init_rows(tissue, state, writer, true)
}

fn write_init_rows<W: Write>(
    tissue: &Tissue,
    state: &TissueState,
    mut out: W,
    full_rows: bool,
) -> Result<()> {
    writeln!(
        out,
        "{} {} {}",
        tissue.num_cells(),
        tissue.num_walls(),
        tissue.num_vertices()
    )?;
    for wall in tissue.walls() {
        writeln!(
            out,
            "{} {} {} {} {}",
            wall.index,
            wall.cell1.to_signed(),
            wall.cell2.to_signed(),
            wall.vertex1,
            wall.vertex2
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{} {}", tissue.num_vertices(), tissue.dimension())?;
    for row in &state.vertex_data {
        let text: Vec<String> = row.iter().map(f64::to_string).collect();
        writeln!(out, "{}", text.join(" "))?;
    }

    let wall_vars = state.wall_data.iter().map(Vec::len).min().unwrap_or(1);
    writeln!(out)?;
    writeln!(out, "{} 1 {}", tissue.num_walls(), wall_vars - 1)?;
    for row in &state.wall_data {
        let text: Vec<String> = row.iter().map(f64::to_string).collect();
        writeln!(out, "{}", text.join(" "))?;
    }

    let cell_vars = if full_rows {
        state.cell_data.iter().map(Vec::len).max().unwrap_or(0)
    } else {
        tissue
            .cells()
            .iter()
            .map(|c| c.center_offset.unwrap_or(state.cell_data[c.index].len()))
            .min()
            .unwrap_or(0)
    };
    writeln!(out)?;
    writeln!(out, "{} {}", tissue.num_cells(), cell_vars)?;
    for row in &state.cell_data {
        let take = if full_rows { row.len() } else { cell_vars.min(row.len()) };
        let text: Vec<String> = row[..take].iter().map(f64::to_string).collect();
        writeln!(out, "{}", text.join(" "))?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Two unit squares sharing a wall, in the literal init format.
    const TWO_SQUARES: &str = "\
2 7 6
0 0 -1 0 1
1 1 -1 1 2
2 1 -1 2 3
3 1 -1 3 4
4 0 -1 4 5
5 0 -1 5 0
6 0 1 1 4

6 2
0 0
1 0
2 0
2 1
1 1
0 1

7 1 1
1 0.5
1 0.5
1 0.5
1 0.5
1 0.5
1 0.5
1 0.5

2 2
1 0
0 0.25
";

    #[test]
    fn reads_a_literal_mesh() {
        let (tissue, state) = read_init_str(TWO_SQUARES).unwrap();
        assert_eq!(tissue.num_cells(), 2);
        assert_eq!(tissue.num_walls(), 7);
        assert_eq!(tissue.num_vertices(), 6);
        assert_eq!(tissue.dimension(), 2);
        assert!((state.cell_data[0][0] - 1.0).abs() < 1e-12);
        assert!((state.wall_data[6][1] - 0.5).abs() < 1e-12);
        tissue.check_connectivity(false).unwrap();
    }

    #[test]
    fn write_then_read_round_trips() {
        let (tissue, state) = read_init_str(TWO_SQUARES).unwrap();
        let mut buffer = Vec::new();
        write_init(&tissue, &state, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let (tissue2, state2) = read_init_str(&text).unwrap();
        assert_eq!(tissue2.num_cells(), tissue.num_cells());
        assert_eq!(tissue2.num_walls(), tissue.num_walls());
        assert_eq!(state, state2);
        for (a, b) in tissue.walls().iter().zip(tissue2.walls()) {
            assert_eq!(a.vertex1, b.vertex1);
            assert_eq!(a.vertex2, b.vertex2);
            assert_eq!(a.cell1, b.cell1);
            assert_eq!(a.cell2, b.cell2);
        }
    }

    #[test]
    fn bad_token_reports_its_line() {
        let broken = TWO_SQUARES.replace("2 0\n2 1", "2 0\n2 oops");
        let err = read_init_str(&broken).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("line 14"), "got: {text}");
        assert!(text.contains("oops"));
    }

    #[test]
    fn truncated_input_fails_cleanly() {
        let truncated = &TWO_SQUARES[..60];
        assert!(read_init_str(truncated).is_err());
    }

    #[test]
    fn bad_dimension_is_rejected() {
        let broken = TWO_SQUARES.replace("6 2\n0 0", "6 4\n0 0");
        assert!(read_init_str(&broken).is_err());
    }

    #[test]
    fn full_writer_keeps_center_payload() {
        let (mut tissue, mut state) = read_init_str(TWO_SQUARES).unwrap();
        tissue.init_center_triangulation(&mut state);

        let mut base = Vec::new();
        write_init(&tissue, &state, &mut base).unwrap();
        let base_text = String::from_utf8(base).unwrap();
        assert!(base_text.contains("\n2 2\n"));

        let mut full = Vec::new();
        write_init_full(&tissue, &state, &mut full).unwrap();
        let full_text = String::from_utf8(full).unwrap();
        // Payload: 2 centroid coordinates + 4 edge lengths on top of the
        // 2 base variables.
        assert!(full_text.contains("\n2 8\n"));
    }
}
