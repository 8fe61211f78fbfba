/// One side of a wall: a proper cell, or the background outside the tissue.
///
/// The background is a shared sentinel, not an owned entity; every wall side
/// facing out of the tissue refers to the same `Background` value. Init
/// files encode it as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRef {
    Cell(usize),
    Background,
}

impl CellRef {
    /// True for the background sentinel.
    #[must_use]
    pub fn is_background(self) -> bool {
        matches!(self, Self::Background)
    }

    /// The cell index, or `None` for background.
    #[must_use]
    pub fn cell(self) -> Option<usize> {
        match self {
            Self::Cell(i) => Some(i),
            Self::Background => None,
        }
    }

    /// Decodes the init-file convention (`-1` = background).
    #[must_use]
    pub fn from_signed(value: i64) -> Self {
        if value < 0 {
            Self::Background
        } else {
            Self::Cell(value as usize)
        }
    }

    /// Encodes the init-file convention (`-1` = background).
    #[must_use]
    pub fn to_signed(self) -> i64 {
        match self {
            Self::Cell(i) => i as i64,
            Self::Background => -1,
        }
    }
}

/// Orientation of a wall relative to one flanking cell's cyclic order:
/// `+1` when the wall's `(vertex1, vertex2)` follows the cell's boundary
/// direction, `-1` when reversed, `0` before sorting.
pub type WallSort = i8;

/// A shared boundary between two cells (or a cell and the background).
///
/// In 2D a line segment, in 3D a facet edge. The resting length lives in
/// `wall_data[index][0]`; further wall variables (per-side stiffness,
/// per-side transporter concentration) follow in the same row.
#[derive(Debug, Clone)]
pub struct Wall {
    /// Stable position in the tissue's wall table.
    pub index: usize,
    /// First endpoint vertex.
    pub vertex1: usize,
    /// Second endpoint vertex.
    pub vertex2: usize,
    /// Flanking cell on side 1.
    pub cell1: CellRef,
    /// Flanking cell on side 2.
    pub cell2: CellRef,
    /// Orientation flag for `cell1`'s cyclic order.
    pub sort1: WallSort,
    /// Orientation flag for `cell2`'s cyclic order.
    pub sort2: WallSort,
}

impl Wall {
    /// Creates a new wall between two vertices with the given flanks.
    #[must_use]
    pub fn new(index: usize, vertex1: usize, vertex2: usize, cell1: CellRef, cell2: CellRef) -> Self {
        Self {
            index,
            vertex1,
            vertex2,
            cell1,
            cell2,
            sort1: 0,
            sort2: 0,
        }
    }

    /// True when this wall touches the given vertex.
    #[must_use]
    pub fn has_vertex(&self, vertex: usize) -> bool {
        self.vertex1 == vertex || self.vertex2 == vertex
    }

    /// The endpoint opposite `vertex`, or `None` if `vertex` is not an
    /// endpoint.
    #[must_use]
    pub fn other_vertex(&self, vertex: usize) -> Option<usize> {
        if self.vertex1 == vertex {
            Some(self.vertex2)
        } else if self.vertex2 == vertex {
            Some(self.vertex1)
        } else {
            None
        }
    }

    /// True when the given cell flanks this wall.
    #[must_use]
    pub fn has_cell(&self, cell: usize) -> bool {
        self.cell1 == CellRef::Cell(cell) || self.cell2 == CellRef::Cell(cell)
    }

    /// The flank opposite the given cell, or `None` if the cell does not
    /// flank this wall.
    #[must_use]
    pub fn other_cell(&self, cell: usize) -> Option<CellRef> {
        if self.cell1 == CellRef::Cell(cell) {
            Some(self.cell2)
        } else if self.cell2 == CellRef::Cell(cell) {
            Some(self.cell1)
        } else {
            None
        }
    }

    /// Replaces endpoint `from` with `to`.
    pub fn replace_vertex(&mut self, from: usize, to: usize) {
        if self.vertex1 == from {
            self.vertex1 = to;
        }
        if self.vertex2 == from {
            self.vertex2 = to;
        }
    }

    /// Replaces flank `from` with `to`.
    pub fn replace_cell(&mut self, from: CellRef, to: CellRef) {
        if self.cell1 == from {
            self.cell1 = to;
        }
        if self.cell2 == from {
            self.cell2 = to;
        }
    }

    /// Sets the orientation flag on the side flanked by `cell`.
    pub fn set_sort_for(&mut self, cell: usize, sort: WallSort) {
        if self.cell1 == CellRef::Cell(cell) {
            self.sort1 = sort;
        } else if self.cell2 == CellRef::Cell(cell) {
            self.sort2 = sort;
        }
    }

    /// Returns the orientation flag on the side flanked by `cell`.
    #[must_use]
    pub fn sort_for(&self, cell: usize) -> WallSort {
        if self.cell1 == CellRef::Cell(cell) {
            self.sort1
        } else if self.cell2 == CellRef::Cell(cell) {
            self.sort2
        } else {
            0
        }
    }

    /// True when both flanks are background; such a wall is dangling and
    /// must be removed.
    #[must_use]
    pub fn is_dangling(&self) -> bool {
        self.cell1.is_background() && self.cell2.is_background()
    }
}
