//! Процедурный генератор данжа
//!
//! Граф комнат — random walk по сетке от центра; двери симметричны и
//! выводятся из наличия соседа. Босс — комната с максимальной манхэттенской
//! дистанцией от старта (при равенстве побеждает первая по порядку обхода).
//! Спец-комнаты раздаются шаффлом не-стартовых/не-боссовых индексов.
//!
//! Политика отказов: генерация никогда не фейлится жёстко — худший случай
//! это комната без препятствий (доступность важнее эстетики).

use bevy::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::*;
use crate::enemy::EnemyKind;

pub mod obstacles;
pub mod traps;

pub use obstacles::{circle_rect_overlap, resolve_circle_rect, Obstacle};
pub use traps::HiddenTrap;

/// Тип комнаты
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomKind {
    Start,
    Boss,
    Normal,
    Treasure,
    Trap,
    Shrine,
    Vendor,
}

/// Стороны света; индексы в `Room::doors`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    North,
    South,
    West,
    East,
}

impl Dir {
    pub const ALL: [Dir; 4] = [Dir::North, Dir::South, Dir::West, Dir::East];

    pub fn index(&self) -> usize {
        match self {
            Dir::North => 0,
            Dir::South => 1,
            Dir::West => 2,
            Dir::East => 3,
        }
    }

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Dir::North => (0, -1),
            Dir::South => (0, 1),
            Dir::West => (-1, 0),
            Dir::East => (1, 0),
        }
    }

    pub fn opposite(&self) -> Dir {
        match self {
            Dir::North => Dir::South,
            Dir::South => Dir::North,
            Dir::West => Dir::East,
            Dir::East => Dir::West,
        }
    }

    /// Центр двери на стене комнаты (пиксели)
    pub fn door_center(&self, dims: &ActiveDims) -> Vec2 {
        match self {
            Dir::North => Vec2::new(dims.gw * 0.5, TILE_SIZE * 0.5),
            Dir::South => Vec2::new(dims.gw * 0.5, dims.gh - TILE_SIZE * 0.5),
            Dir::West => Vec2::new(TILE_SIZE * 0.5, dims.gh * 0.5),
            Dir::East => Vec2::new(dims.gw - TILE_SIZE * 0.5, dims.gh * 0.5),
        }
    }

    /// Позиция входа в комнату при проходе через эту дверь (с противоположной стороны)
    pub fn entry_position(&self, dims: &ActiveDims) -> Vec2 {
        match self {
            Dir::North => Vec2::new(dims.gw * 0.5, dims.gh - TILE_SIZE * 2.0),
            Dir::South => Vec2::new(dims.gw * 0.5, TILE_SIZE * 2.0),
            Dir::West => Vec2::new(dims.gw - TILE_SIZE * 2.0, dims.gh * 0.5),
            Dir::East => Vec2::new(TILE_SIZE * 2.0, dims.gh * 0.5),
        }
    }
}

/// Точка спавна врага (plain f32 — сериализуемо без glam)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
}

/// Комната данжа
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub grid: (i32, i32),
    pub kind: RoomKind,
    /// Индексация по Dir::index; дверь есть там, где есть сосед в графе
    pub doors: [bool; 4],
    pub obstacles: Vec<Obstacle>,
    pub spawns: Vec<SpawnPoint>,
    pub traps: Vec<HiddenTrap>,
    pub cleared: bool,
    pub visited: bool,
    pub treasure_collected: bool,
    pub shrine_used: bool,
}

impl Room {
    pub fn has_door(&self, dir: Dir) -> bool {
        self.doors[dir.index()]
    }
}

/// Данж одного этажа. Заменяется целиком на переходе этажа.
#[derive(Resource, Debug, Clone)]
pub struct Dungeon {
    pub rooms: HashMap<(i32, i32), Room>,
    pub current: (i32, i32),
    pub floor: u32,
}

impl Dungeon {
    pub fn current_room(&self) -> Option<&Room> {
        self.rooms.get(&self.current)
    }

    pub fn current_room_mut(&mut self) -> Option<&mut Room> {
        self.rooms.get_mut(&self.current)
    }

    pub fn neighbor_key(&self, dir: Dir) -> (i32, i32) {
        let (dx, dy) = dir.delta();
        (self.current.0 + dx, self.current.1 + dy)
    }
}

/// Пул типов врагов, открывающийся по этажам
fn kind_pool(floor: u32) -> Vec<EnemyKind> {
    let mut pool = vec![
        EnemyKind::Chaser,
        EnemyKind::Chaser, // chaser вдвое чаще — костяк волн
        EnemyKind::Swarm,
        EnemyKind::Shooter,
        EnemyKind::Bomber,
    ];
    if floor >= 2 {
        pool.extend([
            EnemyKind::Tank,
            EnemyKind::Wraith,
            EnemyKind::Stalker,
            EnemyKind::Spitter,
        ]);
    }
    if floor >= 3 {
        pool.extend([
            EnemyKind::Necromancer,
            EnemyKind::FlashHunter,
            EnemyKind::FlickerFiend,
            EnemyKind::Accelerator,
        ]);
    }
    if floor >= 4 {
        pool.extend([EnemyKind::Distortion, EnemyKind::Warper, EnemyKind::Brute]);
    }
    pool
}

/// Сколько врагов спавнить в комнате данного типа
fn spawn_count(kind: RoomKind, floor: u32, rng: &mut ChaCha8Rng) -> u32 {
    match kind {
        RoomKind::Normal => 3 + floor.min(4) + rng.gen_range(0..=2),
        RoomKind::Trap => 2 + rng.gen_range(0..=1),
        RoomKind::Treasure => 2,
        // Босс спавнится скриптом интро, старт/шрайн/вендор — мирные
        RoomKind::Boss | RoomKind::Start | RoomKind::Shrine | RoomKind::Vendor => 0,
    }
}

/// Генерация данжа этажа. Никогда не возвращает ошибку.
pub fn generate_dungeon(floor: u32, rng: &mut ChaCha8Rng, dims: &ActiveDims) -> Dungeon {
    // --- Random walk от центра ---
    let target = rng.gen_range(MIN_ROOMS..=MAX_ROOMS) as usize;
    let mut order: Vec<(i32, i32)> = vec![(0, 0)];
    let mut cursor = (0, 0);
    let mut attempts = 0;

    while order.len() < target && attempts < WALK_MAX_ATTEMPTS {
        attempts += 1;
        let dir = Dir::ALL[rng.gen_range(0..4)];
        let (dx, dy) = dir.delta();
        cursor = (cursor.0 + dx, cursor.1 + dy);
        if !order.contains(&cursor) {
            order.push(cursor);
        }
    }

    // --- Босс: максимальная манхэттенская дистанция, первая по порядку обхода ---
    let mut boss_key = order[0];
    let mut best = -1;
    for key in &order[1..] {
        let d = key.0.abs() + key.1.abs();
        if d > best {
            best = d;
            boss_key = *key;
        }
    }

    // --- Спец-комнаты: шафл кандидатов, список типов по размеру данжа ---
    let mut kinds: HashMap<(i32, i32), RoomKind> = HashMap::new();
    kinds.insert((0, 0), RoomKind::Start);
    kinds.insert(boss_key, RoomKind::Boss);

    let mut eligible: Vec<(i32, i32)> = order
        .iter()
        .copied()
        .filter(|k| *k != (0, 0) && *k != boss_key)
        .collect();
    eligible.shuffle(rng);

    // Вендор первым: гарантирован при ≥1 кандидате
    let mut specials = vec![RoomKind::Vendor, RoomKind::Treasure, RoomKind::Trap];
    if order.len() >= 10 {
        specials.push(RoomKind::Shrine);
    }
    for special in specials {
        if let Some(key) = eligible.pop() {
            kinds.insert(key, special);
        }
    }

    // --- Сборка комнат ---
    let mut rooms = HashMap::new();
    for key in &order {
        let kind = kinds.get(key).copied().unwrap_or(RoomKind::Normal);

        let mut doors = [false; 4];
        for dir in Dir::ALL {
            let (dx, dy) = dir.delta();
            if order.contains(&(key.0 + dx, key.1 + dy)) {
                doors[dir.index()] = true;
            }
        }

        let room_obstacles = obstacles::generate_room_obstacles(kind, &doors, rng, dims);
        let spawns = roll_spawns(kind, floor, &room_obstacles, &doors, rng, dims);
        let traps = traps::generate_hidden_traps(kind, floor, &room_obstacles, rng, dims);

        rooms.insert(
            *key,
            Room {
                grid: *key,
                kind,
                doors,
                obstacles: room_obstacles,
                spawns,
                traps,
                cleared: matches!(
                    kind,
                    RoomKind::Start | RoomKind::Shrine | RoomKind::Vendor
                ),
                visited: *key == (0, 0),
                treasure_collected: false,
                shrine_used: false,
            },
        );
    }

    crate::log_info(&format!(
        "Dungeon floor {}: {} rooms, boss at {:?}",
        floor,
        rooms.len(),
        boss_key
    ));

    Dungeon {
        rooms,
        current: (0, 0),
        floor,
    }
}

/// Раскладка спавнов: 1–3 региона-кармана от layout, reroll при попадании
/// в препятствие (≤ 3×count попыток суммарно), fallback — центр комнаты.
fn roll_spawns(
    kind: RoomKind,
    floor: u32,
    room_obstacles: &[Obstacle],
    doors: &[bool; 4],
    rng: &mut ChaCha8Rng,
    dims: &ActiveDims,
) -> Vec<SpawnPoint> {
    let count = spawn_count(kind, floor, rng);
    if count == 0 {
        return Vec::new();
    }

    let regions = obstacles::spawn_regions(room_obstacles, rng, dims);
    let pool = kind_pool(floor);
    let mut spawns = Vec::new();
    let mut budget = count * SPAWN_REROLL_FACTOR;

    for _ in 0..count {
        let enemy_kind = pool[rng.gen_range(0..pool.len())];
        let mut placed = dims.center();
        loop {
            let (center, radius) = regions[rng.gen_range(0..regions.len())];
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let r = rng.gen_range(0.0..radius);
            let candidate = dims.clamp_to_interior(center + Vec2::from_angle(angle) * r, 20.0);

            let blocked = room_obstacles
                .iter()
                .any(|o| circle_rect_overlap(candidate, 20.0, o))
                || near_any_door(candidate, doors, dims);

            if !blocked {
                placed = candidate;
                break;
            }
            if budget == 0 {
                break; // fallback: центр (гарантированно свободен не всегда, но доступен)
            }
            budget -= 1;
        }
        spawns.push(SpawnPoint {
            kind: enemy_kind,
            x: placed.x,
            y: placed.y,
        });
    }
    spawns
}

/// Спавн вплотную к двери — мёртвая зона: игрок входит прямо во врага
fn near_any_door(point: Vec2, doors: &[bool; 4], dims: &ActiveDims) -> bool {
    for dir in Dir::ALL {
        if doors[dir.index()] && point.distance(dir.door_center(dims)) < TILE_SIZE * 3.0 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_walk_produces_connected_graph() {
        let dims = ActiveDims::default();
        for seed in 0..20u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let dungeon = generate_dungeon(1, &mut rng, &dims);
            assert!(dungeon.rooms.len() >= 2);
            assert!(dungeon.rooms.contains_key(&(0, 0)));

            // Каждая дверь ведёт в существующую комнату и симметрична
            for (key, room) in &dungeon.rooms {
                for dir in Dir::ALL {
                    if room.has_door(dir) {
                        let (dx, dy) = dir.delta();
                        let neighbor_key = (key.0 + dx, key.1 + dy);
                        let neighbor = dungeon
                            .rooms
                            .get(&neighbor_key)
                            .expect("door leads to missing room");
                        assert!(neighbor.has_door(dir.opposite()));
                    }
                }
            }
        }
    }

    #[test]
    fn test_exactly_one_start_and_boss() {
        let dims = ActiveDims::default();
        for seed in 0..20u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let dungeon = generate_dungeon(2, &mut rng, &dims);
            let starts = dungeon
                .rooms
                .values()
                .filter(|r| r.kind == RoomKind::Start)
                .count();
            let bosses = dungeon
                .rooms
                .values()
                .filter(|r| r.kind == RoomKind::Boss)
                .count();
            assert_eq!(starts, 1);
            assert_eq!(bosses, 1);
        }
    }

    #[test]
    fn test_boss_room_is_max_manhattan() {
        let dims = ActiveDims::default();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let dungeon = generate_dungeon(1, &mut rng, &dims);
        let boss_key = dungeon
            .rooms
            .iter()
            .find(|(_, r)| r.kind == RoomKind::Boss)
            .map(|(k, _)| *k)
            .unwrap();
        let boss_dist = boss_key.0.abs() + boss_key.1.abs();
        for key in dungeon.rooms.keys() {
            assert!(key.0.abs() + key.1.abs() <= boss_dist);
        }
    }

    #[test]
    fn test_vendor_always_present() {
        let dims = ActiveDims::default();
        for seed in 0..30u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let dungeon = generate_dungeon(1, &mut rng, &dims);
            if dungeon.rooms.len() > 2 {
                assert!(
                    dungeon.rooms.values().any(|r| r.kind == RoomKind::Vendor),
                    "seed {} has no vendor",
                    seed
                );
            }
        }
    }

    #[test]
    fn test_boss_room_has_no_prespawns() {
        let dims = ActiveDims::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let dungeon = generate_dungeon(3, &mut rng, &dims);
        let boss = dungeon
            .rooms
            .values()
            .find(|r| r.kind == RoomKind::Boss)
            .unwrap();
        assert!(boss.spawns.is_empty());
        assert!(!boss.cleared);
    }

    #[test]
    fn test_traps_only_in_trap_rooms() {
        let dims = ActiveDims::default();
        for seed in 0..10u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let dungeon = generate_dungeon(2, &mut rng, &dims);
            for room in dungeon.rooms.values() {
                if room.kind != RoomKind::Trap {
                    assert!(room.traps.is_empty());
                }
            }
        }
    }
}
