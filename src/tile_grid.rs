use pursuit_common::Vec2;
use serde::{Deserialize, Serialize};

/// Integer tile coordinate `(x, y)`.
pub type Cell = (i32, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    Empty,
    Wall,
}

/// Read-only view of the level the navigation core runs on.
///
/// Coordinates outside `0..width` x `0..height` always report [`CellState::Wall`],
/// so callers never have to bounds-check before asking.
pub trait TileSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// World units covered by one tile along each axis.
    fn tile_size(&self) -> f32;
    fn cell_state(&self, x: i32, y: i32) -> CellState;

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as i64) < self.width() as i64 && (y as i64) < self.height() as i64
    }

    /// Tile containing a world position.
    fn cell_at(&self, pos: Vec2) -> Cell {
        let inv = 1.0 / self.tile_size();
        ((pos.x * inv).floor() as i32, (pos.y * inv).floor() as i32)
    }

    /// State of the tile under a world position.
    fn tile_at(&self, pos: Vec2) -> CellState {
        let (x, y) = self.cell_at(pos);
        self.cell_state(x, y)
    }

    /// World position of the lower-left corner of the tile containing `pos`.
    fn tile_origin(&self, pos: Vec2) -> Vec2 {
        let (x, y) = self.cell_at(pos);
        Vec2::new(x as f32 * self.tile_size(), y as f32 * self.tile_size())
    }

    /// World position of a tile's centre.
    fn cell_center(&self, cell: Cell) -> Vec2 {
        let half = self.tile_size() * 0.5;
        Vec2::new(
            cell.0 as f32 * self.tile_size() + half,
            cell.1 as f32 * self.tile_size() + half,
        )
    }
}

/// Row-major wall/empty grid; linear index is `y * width + x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: f32,
    cells: Vec<CellState>,
}

impl TileGrid {
    /// Creates an all-empty grid.
    pub fn new(width: u32, height: u32, tile_size: f32) -> Self {
        Self {
            width,
            height,
            tile_size,
            cells: vec![CellState::Empty; width as usize * height as usize],
        }
    }

    /// Wraps an existing row-major cell buffer.
    pub fn from_cells(width: u32, height: u32, tile_size: f32, cells: Vec<CellState>) -> anyhow::Result<Self> {
        if cells.len() != width as usize * height as usize {
            anyhow::bail!(
                "cell buffer holds {} entries, expected {}x{} = {}",
                cells.len(),
                width,
                height,
                width as usize * height as usize
            );
        }
        if tile_size <= 0.0 {
            anyhow::bail!("tile_size must be positive, got {}", tile_size);
        }
        Ok(Self { width, height, tile_size, cells })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Linear index of `(x, y)`, or `None` when outside the grid.
    #[inline(always)]
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if self.in_bounds(x, y) {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    #[inline(always)]
    pub fn coords(&self, idx: usize) -> Cell {
        let w = self.width.max(1) as usize;
        ((idx % w) as i32, (idx / w) as i32)
    }

    pub fn set(&mut self, x: i32, y: i32, state: CellState) {
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] = state;
        }
    }

    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    pub fn empty_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == CellState::Empty)
            .map(|(idx, _)| self.coords(idx))
    }
}

impl TileSource for TileGrid {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn tile_size(&self) -> f32 {
        self.tile_size
    }

    fn cell_state(&self, x: i32, y: i32) -> CellState {
        match self.index(x, y) {
            Some(idx) => self.cells[idx],
            None => CellState::Wall,
        }
    }
}
