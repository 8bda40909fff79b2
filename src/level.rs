use anyhow::{bail, Result};
use log::{debug, warn};
use pursuit_common::{GridConfig, LayoutKind, Vec2};
use rand::prelude::*;

use crate::tile_grid::{CellState, TileGrid, TileSource};

/// Builds the level described by `config`. Every tile touched by a square of half-side
/// `half_size` around a `keep_clear` point is forced empty, so bodies placed there start free.
pub fn build_tile_grid(config: &GridConfig, keep_clear: &[Vec2], half_size: f32) -> Result<TileGrid> {
    let mut tiles = match config.layout {
        LayoutKind::Open => TileGrid::new(config.width, config.height, config.tile_size),
        LayoutKind::Random => random_layout(config)?,
        LayoutKind::Rows => rows_layout(config)?,
    };

    for &pos in keep_clear {
        let (x, y) = tiles.cell_at(pos);
        if !tiles.in_bounds(x, y) {
            warn!("Position ({:.2}, {:.2}) lies outside the level.", pos.x, pos.y);
            continue;
        }
        for sx in [-half_size, half_size] {
            for sy in [-half_size, half_size] {
                let (cx, cy) = tiles.cell_at(Vec2::new(pos.x + sx, pos.y + sy));
                tiles.set(cx, cy, CellState::Empty);
            }
        }
    }

    debug!(
        "Built {:?} level {}x{} with {} empty tiles.",
        config.layout,
        config.width,
        config.height,
        tiles.empty_cells().count()
    );
    Ok(tiles)
}

fn random_layout(config: &GridConfig) -> Result<TileGrid> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let p = config.wall_probability.clamp(0.0, 1.0) as f64;
    let cells = (0..config.width as usize * config.height as usize)
        .map(|_| if rng.random_bool(p) { CellState::Wall } else { CellState::Empty })
        .collect();
    TileGrid::from_cells(config.width, config.height, config.tile_size, cells)
}

/// `rows[0]` is `y = 0`. `#` marks a wall, any other character is empty.
fn rows_layout(config: &GridConfig) -> Result<TileGrid> {
    if config.rows.len() != config.height as usize {
        bail!("layout has {} rows, expected {}.", config.rows.len(), config.height);
    }
    let mut cells = Vec::with_capacity(config.width as usize * config.height as usize);
    for (y, row) in config.rows.iter().enumerate() {
        let len = row.chars().count();
        if len != config.width as usize {
            bail!("layout row {} has {} columns, expected {}.", y, len, config.width);
        }
        cells.extend(row.chars().map(|c| if c == '#' { CellState::Wall } else { CellState::Empty }));
    }
    TileGrid::from_cells(config.width, config.height, config.tile_size, cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_config(layout: LayoutKind, rows: &[&str]) -> GridConfig {
        GridConfig {
            width: 4,
            height: 3,
            tile_size: 2.0,
            layout,
            wall_probability: 0.5,
            seed: 7,
            rows: rows.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn rows_layout_reads_walls() {
        let config = grid_config(LayoutKind::Rows, &["....", ".##.", "...#"]);
        let tiles = build_tile_grid(&config, &[], 0.5).unwrap();
        assert_eq!(tiles.cell_state(1, 1), CellState::Wall);
        assert_eq!(tiles.cell_state(2, 1), CellState::Wall);
        assert_eq!(tiles.cell_state(3, 2), CellState::Wall);
        assert_eq!(tiles.cell_state(0, 0), CellState::Empty);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let config = grid_config(LayoutKind::Rows, &["....", "..", "...."]);
        assert!(build_tile_grid(&config, &[], 0.5).is_err());
        let config = grid_config(LayoutKind::Rows, &["...."]);
        assert!(build_tile_grid(&config, &[], 0.5).is_err());
    }

    #[test]
    fn keep_clear_overrides_walls() {
        let config = grid_config(LayoutKind::Rows, &["####", "####", "####"]);
        let tiles = build_tile_grid(&config, &[Vec2::new(3.0, 3.0)], 0.5).unwrap();
        assert_eq!(tiles.cell_state(1, 1), CellState::Empty);
        assert_eq!(tiles.empty_cells().count(), 1);

        // a body straddling a tile corner clears all four tiles
        let tiles = build_tile_grid(&config, &[Vec2::new(4.0, 2.0)], 0.5).unwrap();
        for cell in [(1, 0), (2, 0), (1, 1), (2, 1)] {
            assert_eq!(tiles.cell_state(cell.0, cell.1), CellState::Empty);
        }
        assert_eq!(tiles.empty_cells().count(), 4);
    }

    #[test]
    fn random_layout_is_seeded() {
        let config = grid_config(LayoutKind::Random, &[]);
        let a = build_tile_grid(&config, &[], 0.5).unwrap();
        let b = build_tile_grid(&config, &[], 0.5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn open_layout_has_no_walls() {
        let tiles = build_tile_grid(&grid_config(LayoutKind::Open, &[]), &[], 0.5).unwrap();
        assert_eq!(tiles.empty_cells().count(), 12);
    }
}
