//! Препятствия комнат: архетипы layout, проверка связности, коллизии
//!
//! Шесть архетипов на тайловой сетке. После генерации — flood fill по
//! проходимым тайлам: все дверные тайлы должны быть взаимодостижимы.
//! Непрошедший layout перегенерируется (≤ 15 попыток), дальше fallback
//! на пустую комнату. Старт и босс — фиксированные раскладки без проверки
//! (спроектированы связными).

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::constants::*;
use crate::dungeon::RoomKind;

/// AABB препятствия в пикселях комнаты
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Obstacle {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Obstacle {
    /// Из тайловых координат (колонка, строка, ширина, высота в тайлах)
    fn from_tiles(col: usize, row: usize, tw: usize, th: usize) -> Self {
        Self {
            x: col as f32 * TILE_SIZE,
            y: row as f32 * TILE_SIZE,
            w: tw as f32 * TILE_SIZE,
            h: th as f32 * TILE_SIZE,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    pub fn contains_tile(&self, col: usize, row: usize) -> bool {
        let px = (col as f32 + 0.5) * TILE_SIZE;
        let py = (row as f32 + 0.5) * TILE_SIZE;
        px >= self.x && px < self.x + self.w && py >= self.y && py < self.y + self.h
    }
}

/// Пересечение круга с AABB
pub fn circle_rect_overlap(pos: Vec2, radius: f32, rect: &Obstacle) -> bool {
    let nearest = Vec2::new(
        pos.x.clamp(rect.x, rect.x + rect.w),
        pos.y.clamp(rect.y, rect.y + rect.h),
    );
    pos.distance_squared(nearest) < radius * radius
}

/// Выталкивание круга из AABB по кратчайшей оси. Возвращает исправленную
/// позицию; если пересечения нет — исходную.
pub fn resolve_circle_rect(pos: Vec2, radius: f32, rect: &Obstacle) -> Vec2 {
    if !circle_rect_overlap(pos, radius, rect) {
        return pos;
    }
    let nearest = Vec2::new(
        pos.x.clamp(rect.x, rect.x + rect.w),
        pos.y.clamp(rect.y, rect.y + rect.h),
    );
    let delta = pos - nearest;
    let dist = delta.length();
    if dist > 1e-4 {
        // Центр снаружи: выталкиваем вдоль нормали до касания
        return nearest + delta / dist * radius;
    }
    // Центр внутри: наружу по ближайшей грани
    let left = pos.x - rect.x;
    let right = rect.x + rect.w - pos.x;
    let top = pos.y - rect.y;
    let bottom = rect.y + rect.h - pos.y;
    let min = left.min(right).min(top).min(bottom);
    if min == left {
        Vec2::new(rect.x - radius, pos.y)
    } else if min == right {
        Vec2::new(rect.x + rect.w + radius, pos.y)
    } else if min == top {
        Vec2::new(pos.x, rect.y - radius)
    } else {
        Vec2::new(pos.x, rect.y + rect.h + radius)
    }
}

#[derive(Debug, Clone, Copy)]
enum Archetype {
    Pillars,
    DualWing,
    CentralHub,
    SPath,
    ChokeSplit,
    Gauntlet,
}

const ARCHETYPES: [Archetype; 6] = [
    Archetype::Pillars,
    Archetype::DualWing,
    Archetype::CentralHub,
    Archetype::SPath,
    Archetype::ChokeSplit,
    Archetype::Gauntlet,
];

/// Дверные тайлы комнаты: тайл сразу за стеной по центру стороны
fn door_tiles(doors: &[bool; 4], cols: usize, rows: usize) -> Vec<(usize, usize)> {
    let mut tiles = Vec::new();
    if doors[0] {
        tiles.push((cols / 2, 1)); // север
    }
    if doors[1] {
        tiles.push((cols / 2, rows - 2)); // юг
    }
    if doors[2] {
        tiles.push((1, rows / 2)); // запад
    }
    if doors[3] {
        tiles.push((cols - 2, rows / 2)); // восток
    }
    tiles
}

/// Flood fill: все дверные тайлы взаимодостижимы по интерьеру без препятствий
fn doors_connected(layout: &[Obstacle], doors: &[bool; 4], cols: usize, rows: usize) -> bool {
    let targets = door_tiles(doors, cols, rows);
    if targets.len() < 2 {
        return true;
    }

    let walkable = |col: usize, row: usize| -> bool {
        // Интерьер без кольца стен
        if col == 0 || row == 0 || col >= cols - 1 || row >= rows - 1 {
            return false;
        }
        !layout.iter().any(|o| o.contains_tile(col, row))
    };

    // Дверной тайл, перекрытый препятствием — сразу провал
    if targets.iter().any(|&(c, r)| !walkable(c, r)) {
        return false;
    }

    let mut seen = vec![false; cols * rows];
    let mut queue = VecDeque::new();
    seen[targets[0].1 * cols + targets[0].0] = true;
    queue.push_back(targets[0]);

    while let Some((col, row)) = queue.pop_front() {
        for (dc, dr) in [(0i32, -1i32), (0, 1), (-1, 0), (1, 0)] {
            let nc = col as i32 + dc;
            let nr = row as i32 + dr;
            if nc < 0 || nr < 0 {
                continue;
            }
            let (nc, nr) = (nc as usize, nr as usize);
            if nc >= cols || nr >= rows || seen[nr * cols + nc] || !walkable(nc, nr) {
                continue;
            }
            seen[nr * cols + nc] = true;
            queue.push_back((nc, nr));
        }
    }

    targets.iter().all(|&(c, r)| seen[r * cols + c])
}

fn layout_pillars(rng: &mut ChaCha8Rng, cols: usize, rows: usize) -> Vec<Obstacle> {
    let count = rng.gen_range(4..=6);
    let mut out = Vec::new();
    for _ in 0..count {
        let size = rng.gen_range(1..=2usize);
        let col = rng.gen_range(3..cols - 3 - size);
        let row = rng.gen_range(3..rows - 3 - size);
        out.push(Obstacle::from_tiles(col, row, size, size));
    }
    out
}

/// Две стены от боковых стен с проёмами на противоположных концах
fn layout_dual_wing(rng: &mut ChaCha8Rng, cols: usize, rows: usize) -> Vec<Obstacle> {
    let len = cols / 2 + rng.gen_range(0..2);
    let upper = rows / 3;
    let lower = rows * 2 / 3;
    vec![
        Obstacle::from_tiles(1, upper, len, 1),
        Obstacle::from_tiles(cols - 1 - len, lower, len, 1),
    ]
}

/// Кольцо вокруг центра с проёмами на случайных сторонах
fn layout_central_hub(rng: &mut ChaCha8Rng, cols: usize, rows: usize) -> Vec<Obstacle> {
    let cx = cols / 2;
    let cy = rows / 2;
    let rx = 4;
    let ry = 3;
    let mut out = Vec::new();

    let gap_top = rng.gen_bool(0.5);
    let gap_left = rng.gen_bool(0.5);

    // Горизонтальные сегменты кольца (с проёмом шириной 2 по центру одной из сторон)
    for (row, gapped) in [(cy - ry, gap_top), (cy + ry, !gap_top)] {
        if gapped {
            out.push(Obstacle::from_tiles(cx - rx, row, rx - 1, 1));
            out.push(Obstacle::from_tiles(cx + 1, row, rx, 1));
        } else {
            out.push(Obstacle::from_tiles(cx - rx, row, rx * 2 + 1, 1));
        }
    }
    // Вертикальные сегменты
    for (col, gapped) in [(cx - rx, gap_left), (cx + rx, !gap_left)] {
        if gapped {
            out.push(Obstacle::from_tiles(col, cy - ry + 1, 1, ry - 2));
            out.push(Obstacle::from_tiles(col, cy + 1, 1, ry - 1));
        } else {
            out.push(Obstacle::from_tiles(col, cy - ry + 1, 1, ry * 2 - 1));
        }
    }
    out
}

/// S-образный коридор: две длинные стены с противоположных сторон
fn layout_s_path(_rng: &mut ChaCha8Rng, cols: usize, rows: usize) -> Vec<Obstacle> {
    let len = cols * 2 / 3;
    vec![
        Obstacle::from_tiles(1, rows / 3, len, 1),
        Obstacle::from_tiles(cols - 1 - len, rows * 2 / 3, len, 1),
    ]
}

/// Вертикальная стена по центру с двумя проёмами + боковые блоки
fn layout_choke_split(rng: &mut ChaCha8Rng, cols: usize, rows: usize) -> Vec<Obstacle> {
    let cx = cols / 2;
    let gap1 = rng.gen_range(2..rows / 2 - 1);
    let gap2 = rng.gen_range(rows / 2 + 1..rows - 3);
    let mut out = Vec::new();
    let mut run_start = 1;
    for row in 1..rows - 1 {
        if row == gap1 || row == gap2 {
            if row > run_start {
                out.push(Obstacle::from_tiles(cx, run_start, 1, row - run_start));
            }
            run_start = row + 1;
        }
    }
    if rows - 1 > run_start {
        out.push(Obstacle::from_tiles(cx, run_start, 1, rows - 1 - run_start));
    }
    out.push(Obstacle::from_tiles(cx / 2, rows / 2, 2, 2));
    out.push(Obstacle::from_tiles(cx + cx / 2 - 1, rows / 2 - 1, 2, 2));
    out
}

/// Шахматные блоки рядами
fn layout_gauntlet(rng: &mut ChaCha8Rng, cols: usize, rows: usize) -> Vec<Obstacle> {
    let mut out = Vec::new();
    let row_step = 3;
    let mut offset = rng.gen_range(0..3usize);
    let mut row = 3;
    while row < rows - 3 {
        let mut col = 3 + offset;
        while col < cols - 4 {
            out.push(Obstacle::from_tiles(col, row, 2, 1));
            col += 5;
        }
        offset = (offset + 2) % 4;
        row += row_step;
    }
    out
}

fn generate_layout(
    archetype: Archetype,
    rng: &mut ChaCha8Rng,
    cols: usize,
    rows: usize,
) -> Vec<Obstacle> {
    match archetype {
        Archetype::Pillars => layout_pillars(rng, cols, rows),
        Archetype::DualWing => layout_dual_wing(rng, cols, rows),
        Archetype::CentralHub => layout_central_hub(rng, cols, rows),
        Archetype::SPath => layout_s_path(rng, cols, rows),
        Archetype::ChokeSplit => layout_choke_split(rng, cols, rows),
        Archetype::Gauntlet => layout_gauntlet(rng, cols, rows),
    }
}

/// Стартовая комната: четыре угловых столба, центр свободен
fn start_layout(cols: usize, rows: usize) -> Vec<Obstacle> {
    vec![
        Obstacle::from_tiles(3, 3, 2, 2),
        Obstacle::from_tiles(cols - 5, 3, 2, 2),
        Obstacle::from_tiles(3, rows - 5, 2, 2),
        Obstacle::from_tiles(cols - 5, rows - 5, 2, 2),
    ]
}

/// Комната босса: симметричные столбы по четвертям, центр чист под арену
fn boss_layout(cols: usize, rows: usize) -> Vec<Obstacle> {
    vec![
        Obstacle::from_tiles(cols / 4, rows / 4, 1, 1),
        Obstacle::from_tiles(cols * 3 / 4, rows / 4, 1, 1),
        Obstacle::from_tiles(cols / 4, rows * 3 / 4, 1, 1),
        Obstacle::from_tiles(cols * 3 / 4, rows * 3 / 4, 1, 1),
    ]
}

/// Генерация препятствий комнаты. Случайный архетип + проверка связности
/// дверей; после OBSTACLE_MAX_RETRIES неудач — пустая комната.
pub fn generate_room_obstacles(
    kind: RoomKind,
    doors: &[bool; 4],
    rng: &mut ChaCha8Rng,
    dims: &ActiveDims,
) -> Vec<Obstacle> {
    let (cols, rows) = dims.tile_grid();

    match kind {
        RoomKind::Start => return start_layout(cols, rows),
        RoomKind::Boss => return boss_layout(cols, rows),
        _ => {}
    }

    for _ in 0..OBSTACLE_MAX_RETRIES {
        let archetype = ARCHETYPES[rng.gen_range(0..ARCHETYPES.len())];
        let layout = generate_layout(archetype, rng, cols, rows);
        if doors_connected(&layout, doors, cols, rows) {
            return layout;
        }
    }

    crate::log_warning("Room layout failed connectivity 15 times, using empty room");
    Vec::new()
}

/// Спавн-регионы комнаты: 1–3 круга (центр, радиус) в пикселях,
/// в свободных карманах между препятствиями
pub fn spawn_regions(
    layout: &[Obstacle],
    rng: &mut ChaCha8Rng,
    dims: &ActiveDims,
) -> Vec<(Vec2, f32)> {
    let candidates = [
        (dims.center(), dims.gh * 0.3),
        (Vec2::new(dims.gw * 0.27, dims.gh * 0.3), dims.gh * 0.2),
        (Vec2::new(dims.gw * 0.73, dims.gh * 0.3), dims.gh * 0.2),
        (Vec2::new(dims.gw * 0.27, dims.gh * 0.7), dims.gh * 0.2),
        (Vec2::new(dims.gw * 0.73, dims.gh * 0.7), dims.gh * 0.2),
    ];

    // Кандидат годен, если его центр не внутри препятствия
    let mut open: Vec<(Vec2, f32)> = candidates
        .iter()
        .copied()
        .filter(|(c, _)| !layout.iter().any(|o| circle_rect_overlap(*c, 10.0, o)))
        .collect();

    if open.is_empty() {
        return vec![(dims.center(), dims.gh * 0.25)];
    }

    let take = rng.gen_range(1..=3usize).min(open.len());
    while open.len() > take {
        let idx = rng.gen_range(0..open.len());
        open.swap_remove(idx);
    }
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_circle_rect_overlap() {
        let rect = Obstacle {
            x: 100.0,
            y: 100.0,
            w: 40.0,
            h: 40.0,
        };
        assert!(circle_rect_overlap(Vec2::new(120.0, 120.0), 5.0, &rect));
        assert!(circle_rect_overlap(Vec2::new(95.0, 120.0), 10.0, &rect));
        assert!(!circle_rect_overlap(Vec2::new(80.0, 120.0), 10.0, &rect));
    }

    #[test]
    fn test_resolve_pushes_out_along_shortest_axis() {
        let rect = Obstacle {
            x: 100.0,
            y: 100.0,
            w: 40.0,
            h: 40.0,
        };
        // Заходим слева — выталкивает влево до касания
        let resolved = resolve_circle_rect(Vec2::new(98.0, 120.0), 10.0, &rect);
        assert!((resolved.x - 90.0).abs() < 1e-3);
        assert_eq!(resolved.y, 120.0);

        // Вне препятствия — без изменений
        let pos = Vec2::new(50.0, 50.0);
        assert_eq!(resolve_circle_rect(pos, 10.0, &rect), pos);
    }

    #[test]
    fn test_resolve_center_inside_rect() {
        let rect = Obstacle {
            x: 100.0,
            y: 100.0,
            w: 40.0,
            h: 40.0,
        };
        let resolved = resolve_circle_rect(Vec2::new(105.0, 120.0), 10.0, &rect);
        // Ближайшая грань — левая
        assert!((resolved.x - 90.0).abs() < 1e-3);
        assert!(!circle_rect_overlap(resolved, 9.9, &rect));
    }

    #[test]
    fn test_doors_connected_empty_room() {
        let dims = ActiveDims::default();
        let (cols, rows) = dims.tile_grid();
        assert!(doors_connected(&[], &[true; 4], cols, rows));
    }

    #[test]
    fn test_doors_disconnected_by_full_wall() {
        let dims = ActiveDims::default();
        let (cols, rows) = dims.tile_grid();
        // Сплошная вертикальная стена по центру: запад и восток разрезаны
        let wall = vec![Obstacle::from_tiles(cols / 2, 1, 1, rows - 2)];
        let doors = [false, false, true, true];
        assert!(!doors_connected(&wall, &doors, cols, rows));
    }

    #[test]
    fn test_generated_layouts_keep_doors_connected() {
        let dims = ActiveDims::default();
        let (cols, rows) = dims.tile_grid();
        for seed in 0..50u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let doors = [true, true, true, true];
            let layout = generate_room_obstacles(RoomKind::Normal, &doors, &mut rng, &dims);
            assert!(
                doors_connected(&layout, &doors, cols, rows),
                "seed {} produced disconnected layout",
                seed
            );
        }
    }

    #[test]
    fn test_boss_layout_center_clear() {
        let dims = ActiveDims::default();
        let (cols, rows) = dims.tile_grid();
        let layout = boss_layout(cols, rows);
        assert!(!layout
            .iter()
            .any(|o| circle_rect_overlap(dims.center(), 80.0, o)));
    }
}
