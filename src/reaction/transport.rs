//! Transport reactions: diffusion between cells, diffusion along a cell's
//! membrane, and carrier-polarized active transport.

use std::collections::HashMap;

use crate::error::Result;
use crate::state::TissueState;
use crate::topology::{CellRef, Tissue};

use super::{
    check_cell_column, check_wall_column, expect_index_shape, expect_parameters, Constructor,
    Reaction, ReactionSpec,
};

pub(super) fn register(table: &mut HashMap<&'static str, Constructor>) {
    table.insert(CellCellDiffusion::ID, |spec| {
        Ok(Box::new(CellCellDiffusion::from_spec(spec)?))
    });
    table.insert(MembraneDiffusion::ID, |spec| {
        Ok(Box::new(MembraneDiffusion::from_spec(spec)?))
    });
    table.insert(ActiveTransport::ID, |spec| {
        Ok(Box::new(ActiveTransport::from_spec(spec)?))
    });
    table.insert(CarrierCycling::ID, |spec| {
        Ok(Box::new(CarrierCycling::from_spec(spec)?))
    });
}

/// Fickian exchange of one cell variable across every internal wall:
/// `dc_i/dt += D (c_j - c_i)` per shared wall. Total amount is conserved
/// exactly because every flux enters one cell and leaves the other.
///
/// Parameters: `[diffusion_rate]`. Indices: `[[column]]`.
pub struct CellCellDiffusion {
    rate: f64,
    column: usize,
}

impl CellCellDiffusion {
    pub const ID: &'static str = "cell::diffusion";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 1)?;
        expect_index_shape(Self::ID, spec, &[1])?;
        Ok(Self {
            rate: spec.parameters[0],
            column: spec.indices[0][0],
        })
    }
}

impl Reaction for CellCellDiffusion {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for wall in tissue.walls() {
            let (CellRef::Cell(i), CellRef::Cell(j)) = (wall.cell1, wall.cell2) else {
                continue;
            };
            let flux = self.rate * (state.cell_data[j][self.column] - state.cell_data[i][self.column]);
            derivs.cell_data[i][self.column] += flux;
            derivs.cell_data[j][self.column] -= flux;
        }
    }

    fn print_state(
        &self,
        tissue: &Tissue,
        state: &TissueState,
        out: &mut dyn std::io::Write,
    ) -> std::io::Result<()> {
        let total: f64 = (0..tissue.num_cells())
            .map(|i| state.cell_data[i][self.column])
            .sum();
        writeln!(out, "total {} over {} cells", total, tissue.num_cells())
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        check_cell_column(Self::ID, self.column, state)
    }
}

/// Diffusion of a wall species around each cell's ring of walls: adjacent
/// walls in the cyclic order exchange at rate `D`. The species column is
/// chosen per side, so each cell's ring only touches the compartments
/// facing it.
///
/// Parameters: `[diffusion_rate]`. Indices: `[[side1_column, side2_column]]`
/// (pass the same column twice for a single shared compartment per wall).
pub struct MembraneDiffusion {
    rate: f64,
    side_columns: [usize; 2],
}

impl MembraneDiffusion {
    pub const ID: &'static str = "wall::membrane_diffusion";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 1)?;
        expect_index_shape(Self::ID, spec, &[2])?;
        Ok(Self {
            rate: spec.parameters[0],
            side_columns: [spec.indices[0][0], spec.indices[0][1]],
        })
    }

    fn side_column(&self, tissue: &Tissue, wall: usize, cell: usize) -> usize {
        if tissue.wall(wall).cell1 == CellRef::Cell(cell) {
            self.side_columns[0]
        } else {
            self.side_columns[1]
        }
    }
}

impl Reaction for MembraneDiffusion {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for cell in tissue.cells() {
            let n = cell.walls.len();
            for k in 0..n {
                let wa = cell.walls[k];
                let wb = cell.walls[(k + 1) % n];
                let col_a = self.side_column(tissue, wa, cell.index);
                let col_b = self.side_column(tissue, wb, cell.index);
                let flux = self.rate * (state.wall_data[wb][col_b] - state.wall_data[wa][col_a]);
                derivs.wall_data[wa][col_a] += flux;
                derivs.wall_data[wb][col_b] -= flux;
            }
        }
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        for column in self.side_columns {
            check_wall_column(Self::ID, column, state)?;
        }
        Ok(())
    }
}

/// Carrier-polarized transport of a cell species across internal walls:
/// the efflux from cell `i` through a wall is `T * c_i * P_i`, where `P_i`
/// is the carrier concentration on cell `i`'s side of the wall. Net flux
/// is the difference of the two directed effluxes; total amount is
/// conserved.
///
/// Parameters: `[transport_rate]`.
/// Indices: `[[concentration_column], [carrier_side1, carrier_side2]]`.
pub struct ActiveTransport {
    rate: f64,
    concentration: usize,
    carrier_columns: [usize; 2],
}

impl ActiveTransport {
    pub const ID: &'static str = "cell::active_transport";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 1)?;
        expect_index_shape(Self::ID, spec, &[1, 2])?;
        Ok(Self {
            rate: spec.parameters[0],
            concentration: spec.indices[0][0],
            carrier_columns: [spec.indices[1][0], spec.indices[1][1]],
        })
    }
}

impl Reaction for ActiveTransport {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for wall in tissue.walls() {
            let (CellRef::Cell(i), CellRef::Cell(j)) = (wall.cell1, wall.cell2) else {
                continue;
            };
            let row = &state.wall_data[wall.index];
            let efflux_i = self.rate
                * state.cell_data[i][self.concentration]
                * row[self.carrier_columns[0]];
            let efflux_j = self.rate
                * state.cell_data[j][self.concentration]
                * row[self.carrier_columns[1]];
            let net = efflux_i - efflux_j; // positive: i -> j
            derivs.cell_data[i][self.concentration] -= net;
            derivs.cell_data[j][self.concentration] += net;
        }
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        check_cell_column(Self::ID, self.concentration, state)?;
        for column in self.carrier_columns {
            check_wall_column(Self::ID, column, state)?;
        }
        Ok(())
    }
}

/// Exchange of carrier between a cell's interior pool and its wall sides:
/// `dP/dt = k_on * c - k_off * P` on each side facing a proper cell. The
/// interior pool is not depleted (the carrier variable is treated as
/// membrane occupancy, not conserved mass).
///
/// Parameters: `[k_on, k_off]`.
/// Indices: `[[pool_column], [carrier_side1, carrier_side2]]`.
pub struct CarrierCycling {
    k_on: f64,
    k_off: f64,
    pool: usize,
    carrier_columns: [usize; 2],
}

impl CarrierCycling {
    pub const ID: &'static str = "wall::carrier_cycling";

    /// # Errors
    ///
    /// Returns an error for a wrong parameter count or index shape.
    pub fn from_spec(spec: &ReactionSpec) -> Result<Self> {
        expect_parameters(Self::ID, spec, 2)?;
        expect_index_shape(Self::ID, spec, &[1, 2])?;
        Ok(Self {
            k_on: spec.parameters[0],
            k_off: spec.parameters[1],
            pool: spec.indices[0][0],
            carrier_columns: [spec.indices[1][0], spec.indices[1][1]],
        })
    }
}

impl Reaction for CarrierCycling {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn derivs(&self, tissue: &Tissue, state: &TissueState, derivs: &mut TissueState) {
        for wall in tissue.walls() {
            let row = &state.wall_data[wall.index];
            for (side, flank) in [wall.cell1, wall.cell2].into_iter().enumerate() {
                let Some(c) = flank.cell() else { continue };
                let column = self.carrier_columns[side];
                derivs.wall_data[wall.index][column] +=
                    self.k_on * state.cell_data[c][self.pool] - self.k_off * row[column];
            }
        }
    }

    fn check_columns(&self, state: &TissueState) -> Result<()> {
        check_cell_column(Self::ID, self.pool, state)?;
        for column in self.carrier_columns {
            check_wall_column(Self::ID, column, state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::topology::fixtures;

    #[test]
    fn diffusion_moves_downhill_and_conserves() {
        let (tissue, mut state) = fixtures::two_squares();
        state.cell_data[0][0] = 1.0;
        state.cell_data[1][0] = 0.0;
        let r = CellCellDiffusion::from_spec(&ReactionSpec::new(
            "cell::diffusion",
            vec![0.1],
            vec![vec![0]],
        ))
        .unwrap();
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);

        assert!((derivs.cell_data[0][0] + 0.1).abs() < 1e-12);
        assert!((derivs.cell_data[1][0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn diffusion_ignores_boundary_walls() {
        let (tissue, mut state) = fixtures::single_square();
        state.cell_data[0][0] = 5.0;
        let r = CellCellDiffusion::from_spec(&ReactionSpec::new(
            "cell::diffusion",
            vec![0.1],
            vec![vec![0]],
        ))
        .unwrap();
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);
        assert!(derivs.cell_data[0][0].abs() < 1e-12);
    }

    #[test]
    fn diffusion_print_state_reports_total() {
        let (tissue, mut state) = fixtures::two_squares();
        state.cell_data[0][0] = 0.75;
        state.cell_data[1][0] = 0.25;
        let r = CellCellDiffusion::from_spec(&ReactionSpec::new(
            "cell::diffusion",
            vec![0.1],
            vec![vec![0]],
        ))
        .unwrap();
        let mut buffer = Vec::new();
        r.print_state(&tissue, &state, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("total 1 over 2 cells"));
    }

    #[test]
    fn membrane_diffusion_conserves_ring_mass() {
        let (tissue, mut state) = fixtures::hexagon();
        state.wall_data[0][1] = 1.0;
        let r = MembraneDiffusion::from_spec(&ReactionSpec::new(
            "wall::membrane_diffusion",
            vec![1.0],
            vec![vec![1, 1]],
        ))
        .unwrap();
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);

        let net: f64 = derivs.wall_data.iter().map(|row| row[1]).sum();
        assert!(net.abs() < 1e-12);
        // The loaded wall leaks to both neighbors.
        assert!(derivs.wall_data[0][1] < 0.0);
    }

    #[test]
    fn active_transport_follows_carrier_polarity() {
        let (tissue, mut state) = fixtures::two_squares();
        state.cell_data[0][0] = 1.0;
        state.cell_data[1][0] = 1.0;
        let shared = tissue
            .walls()
            .iter()
            .find(|w| w.cell1.cell().is_some() && w.cell2.cell().is_some())
            .unwrap()
            .index;
        // Carrier only on the side of cell1 of the shared wall; the sides
        // get distinct columns so only that cell exports.
        let exporter = tissue.wall(shared).cell1.cell().unwrap();
        let importer = tissue.wall(shared).cell2.cell().unwrap();
        state.wall_data[shared][1] = 2.0;

        let mut state2 = state.clone();
        for row in &mut state2.wall_data {
            row.push(0.0);
        }
        let r = ActiveTransport::from_spec(&ReactionSpec::new(
            "cell::active_transport",
            vec![0.5],
            vec![vec![0], vec![1, 2]],
        ))
        .unwrap();
        let mut derivs = state2.zeroed_like();
        r.derivs(&tissue, &state2, &mut derivs);

        assert!(derivs.cell_data[exporter][0] < 0.0);
        assert!(derivs.cell_data[importer][0] > 0.0);
        let total: f64 = derivs.cell_data.iter().map(|row| row[0]).sum();
        assert!(total.abs() < 1e-12);
    }

    #[test]
    fn carrier_cycling_relaxes_to_balance() {
        let (tissue, mut state) = fixtures::two_squares();
        state.cell_data[0][0] = 2.0;
        state.cell_data[1][0] = 2.0;
        let r = CarrierCycling::from_spec(&ReactionSpec::new(
            "wall::carrier_cycling",
            vec![1.0, 0.5],
            vec![vec![0], vec![1, 1]],
        ))
        .unwrap();

        // At P = k_on c / k_off = 4 the membrane occupancy is stationary.
        let shared = tissue
            .walls()
            .iter()
            .find(|w| w.cell1.cell().is_some() && w.cell2.cell().is_some())
            .unwrap()
            .index;
        state.wall_data[shared][1] = 4.0;
        let mut derivs = state.zeroed_like();
        r.derivs(&tissue, &state, &mut derivs);
        // Both sides share one column here: contributions sum to zero only
        // because each side is separately stationary.
        assert!(derivs.wall_data[shared][1].abs() < 1e-12);
    }
}
