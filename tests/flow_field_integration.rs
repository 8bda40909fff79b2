use pursuit_common::{GridConfig, LayoutKind, Vec2};
use pursuit_engine::level::build_tile_grid;
use pursuit_engine::pathfinder::is_finite;
use pursuit_engine::{Agent, FlowFieldPathfinder, FlowMode, SliceBudget, StepStatus, TileGrid, TileSource, WALL};
use rstest::rstest;
use std::collections::VecDeque;

const MAZE: [&str; 7] = [
    "..........",
    ".########.",
    ".#......#.",
    ".#.####.#.",
    ".#.#..#...",
    "...#..###.",
    "####......",
];

fn maze() -> TileGrid {
    let config = GridConfig {
        width: 10,
        height: 7,
        tile_size: 1.0,
        layout: LayoutKind::Rows,
        wall_probability: 0.0,
        seed: 0,
        rows: MAZE.iter().map(|r| r.to_string()).collect(),
    };
    build_tile_grid(&config, &[], 0.0).unwrap()
}

/// Unit-cost breadth-first distances, used as the reference for an uncrowded field.
fn bfs(tiles: &TileGrid, source: (i32, i32)) -> Vec<Option<u32>> {
    let w = tiles.width() as i32;
    let h = tiles.height() as i32;
    let mut dist = vec![None; (w * h) as usize];
    let mut queue = VecDeque::new();
    dist[(source.1 * w + source.0) as usize] = Some(0);
    queue.push_back(source);
    while let Some((x, y)) = queue.pop_front() {
        let d = dist[(y * w + x) as usize].unwrap();
        for (nx, ny) in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
            if !tiles.in_bounds(nx, ny) || tiles.cell_state(nx, ny) == pursuit_engine::CellState::Wall {
                continue;
            }
            let slot = &mut dist[(ny * w + nx) as usize];
            if slot.is_none() {
                *slot = Some(d + 1);
                queue.push_back((nx, ny));
            }
        }
    }
    dist
}

#[rstest]
#[case::unbounded(SliceBudget::Unbounded)]
#[case::one_entry(SliceBudget::Entries(1))]
#[case::few_entries(SliceBudget::Entries(5))]
fn maze_distances_match_breadth_first(#[case] budget: SliceBudget) {
    let tiles = maze();
    let source = (0, 0);
    let mut pf = FlowFieldPathfinder::new(&tiles, budget);
    pf.compute(&tiles, &[], &[source], FlowMode::Pursue);

    let mut slices = 0;
    while !pf.is_idle() {
        pf.step();
        slices += 1;
        assert!(slices < 10_000, "pathfinder never finished");
    }

    let reference = bfs(&tiles, source);
    for y in 0..7 {
        for x in 0..10 {
            let got = pf.distance_at(x, y);
            match (tiles.cell_state(x, y), reference[(y * 10 + x) as usize]) {
                (pursuit_engine::CellState::Wall, _) => assert_eq!(got, WALL),
                (_, Some(d)) => assert_eq!(got, d, "cell ({}, {})", x, y),
                (_, None) => assert!(!is_finite(got), "cell ({}, {}) should be unreachable", x, y),
            }
        }
    }
}

#[test]
fn gradient_always_points_downhill() {
    let tiles = maze();
    let mut pf = FlowFieldPathfinder::new(&tiles, SliceBudget::Unbounded);
    pf.compute(&tiles, &[], &[(9, 6)], FlowMode::Pursue);
    pf.run_to_completion();

    for y in 0..7 {
        for x in 0..10 {
            let d = pf.distance_at(x, y);
            if !is_finite(d) || d == 0 {
                continue;
            }
            let lower: Vec<(i32, i32)> = [(1, 0), (-1, 0), (0, 1), (0, -1)]
                .into_iter()
                .filter(|&(dx, dy)| {
                    let n = pf.distance_at(x + dx, y + dy);
                    is_finite(n) && n < d
                })
                .collect();
            assert!(!lower.is_empty(), "cell ({}, {}) has no lower neighbour", x, y);

            let g = pf.gradient_at(x, y);
            if g == Vec2::ZERO {
                // only possible when lower neighbours sit on opposite sides
                assert!(lower.len() >= 2);
                continue;
            }
            assert!((g.length() - 1.0).abs() < 1e-5, "cell ({}, {}) has gradient {:?}", x, y, g);
            let downhill = lower
                .iter()
                .any(|&(dx, dy)| g.dot(Vec2::new(dx as f32, dy as f32)) > 0.0);
            assert!(downhill, "cell ({}, {}) gradient {:?} points uphill", x, y, g);
        }
    }
}

#[test]
fn crowd_reroutes_the_cheapest_path() {
    // Two equal routes around a central wall; crowding the top one pushes the field below.
    let config = GridConfig {
        width: 5,
        height: 3,
        tile_size: 1.0,
        layout: LayoutKind::Rows,
        wall_probability: 0.0,
        seed: 0,
        rows: vec![".....".into(), ".###.".into(), ".....".into()],
    };
    let tiles = build_tile_grid(&config, &[], 0.0).unwrap();
    let crowd: Vec<Agent> = (0..3).map(|_| Agent::new(Vec2::new(2.5, 0.5), 0.2)).collect();

    let mut pf = FlowFieldPathfinder::new(&tiles, SliceBudget::Unbounded);
    pf.compute(&tiles, &crowd, &[(4, 1)], FlowMode::Pursue);
    pf.run_to_completion();

    // From (0, 1) going down and around costs 6; the top route pays 3 extra at (2, 0).
    assert_eq!(pf.distance_at(0, 1), 6);
    let g = pf.gradient_at(0, 1);
    assert!(g.y > 0.0 && g.x == 0.0, "expected a downward gradient, got {:?}", g);
}

#[test]
fn restart_mid_search_only_publishes_the_newest_field() {
    let tiles = maze();
    let mut pf = FlowFieldPathfinder::new(&tiles, SliceBudget::Entries(2));
    pf.compute(&tiles, &[], &[(0, 0)], FlowMode::Pursue);
    assert_eq!(pf.step(), StepStatus::InProgress);

    pf.compute(&tiles, &[], &[(9, 6)], FlowMode::Flee);
    pf.set_budget(SliceBudget::Unbounded);
    assert_eq!(pf.step(), StepStatus::Completed);

    assert_eq!(pf.generation(), 1);
    assert_eq!(pf.mode(), FlowMode::Flee);
    assert_eq!(pf.distance_at(9, 6), 0);
}
