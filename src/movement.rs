use pursuit_common::{clamp, Vec2};

use crate::agent::{Agent, Player};
use crate::tile_grid::{CellState, TileSource};

/// Gap kept between a clamped body and the tile edge so the next corner probe stays inside.
const EDGE_EPSILON: f32 = 0.001;

/// True when any corner of the square footprint centred on `pos` touches a non-empty tile.
#[inline(always)]
pub fn footprint_blocked<T: TileSource + ?Sized>(tiles: &T, pos: Vec2, half_size: f32) -> bool {
    for sx in [-half_size, half_size] {
        for sy in [-half_size, half_size] {
            if tiles.tile_at(Vec2::new(pos.x + sx, pos.y + sy)) != CellState::Empty {
                return true;
            }
        }
    }
    false
}

/// Axis-separated move: X is applied and resolved first, then Y.
///
/// A blocked axis is clamped back inside the tile the body started the move in, which lets
/// bodies slide along walls instead of sticking on diagonal contact.
pub fn move_and_collide<T: TileSource + ?Sized>(tiles: &T, pos: Vec2, delta: Vec2, half_size: f32) -> Vec2 {
    let start_tile = tiles.tile_origin(pos);
    let tile_size = tiles.tile_size();
    let mut next = pos;

    for axis in 0..2 {
        next.set_axis(axis, next.axis(axis) + delta.axis(axis));
        if footprint_blocked(tiles, next, half_size) {
            let lo = start_tile.axis(axis) + half_size + EDGE_EPSILON;
            let hi = start_tile.axis(axis) + tile_size - half_size - EDGE_EPSILON;
            next.set_axis(axis, clamp(next.axis(axis), lo, hi));
        }
    }

    next
}

/// Shared movement capability for every body that walks the tile grid.
pub trait Mover {
    fn position(&self) -> Vec2;
    fn set_position(&mut self, pos: Vec2);
    fn half_extent(&self) -> f32;

    fn move_and_collide<T: TileSource + ?Sized>(&mut self, tiles: &T, delta: Vec2) {
        let next = move_and_collide(tiles, self.position(), delta, self.half_extent());
        self.set_position(next);
    }
}

impl Mover for Agent {
    fn position(&self) -> Vec2 {
        self.pos
    }

    fn set_position(&mut self, pos: Vec2) {
        self.pos = pos;
    }

    fn half_extent(&self) -> f32 {
        self.half_size
    }
}

impl Mover for Player {
    fn position(&self) -> Vec2 {
        self.pos
    }

    fn set_position(&mut self, pos: Vec2) {
        self.pos = pos;
    }

    fn half_extent(&self) -> f32 {
        self.half_size
    }
}
