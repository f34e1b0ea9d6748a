//! Property-based тесты детерминизма
//!
//! Одинаковый seed + одинаковый скрипт ввода → бит-в-бит одинаковый забег

use bevy::prelude::*;
use shadows_simulation::engine::RunStats;
use shadows_simulation::player::PlayerInput;
use shadows_simulation::Shadows;

const TICK_COUNT: u32 = 600;

/// Скриптованный бот: бегает по кругу, машет мечом, постреливает
fn scripted_input(tick: u32, sim: &mut Shadows) -> PlayerInput {
    let t = tick as f32 / 60.0;
    let mut input = PlayerInput::default();
    input.move_dir = Vec2::new(t.cos(), (t * 0.7).sin());
    input.aim = sim.player_position() + input.move_dir * 120.0;
    input.melee_pressed = tick % 25 == 0;
    input.ranged_pressed = tick % 40 == 0;
    input.interact_pressed = tick % 180 == 0;
    input
}

/// Прогоняет забег и возвращает snapshot состояния (биты f32 без округления)
fn run_simulation(seed: u64) -> Vec<u8> {
    let mut sim = Shadows::new(seed);
    let mut snapshot = Vec::new();

    for tick in 0..TICK_COUNT {
        let input = scripted_input(tick, &mut sim);
        sim.set_input(input);
        sim.tick();
        sim.drain_events();

        if tick % 100 == 0 {
            let pos = sim.player_position();
            let (hp, max_hp) = sim.player_health();
            snapshot.extend_from_slice(&pos.x.to_bits().to_le_bytes());
            snapshot.extend_from_slice(&pos.y.to_bits().to_le_bytes());
            snapshot.extend_from_slice(&hp.to_bits().to_le_bytes());
            snapshot.extend_from_slice(&max_hp.to_bits().to_le_bytes());
            snapshot.extend_from_slice(&sim.floor().to_le_bytes());
        }
    }

    let stats = sim.world().resource::<RunStats>();
    snapshot.extend_from_slice(&stats.kills.to_le_bytes());
    snapshot.extend_from_slice(&stats.souls_earned.to_le_bytes());
    snapshot
}

#[test]
fn test_determinism_same_seed() {
    const SEED: u64 = 12345;

    let snapshot1 = run_simulation(SEED);
    let snapshot2 = run_simulation(SEED);

    assert_eq!(
        snapshot1, snapshot2,
        "Забег с одинаковым seed ({}) дал разные результаты!",
        SEED
    );
}

#[test]
fn test_determinism_multiple_runs() {
    const SEED: u64 = 42;

    let snapshots: Vec<_> = (0..3).map(|_| run_simulation(SEED)).collect();

    for (i, snapshot) in snapshots.iter().enumerate().skip(1) {
        assert_eq!(
            snapshots[0], *snapshot,
            "Прогон {} дал результат отличный от прогона 0",
            i
        );
    }
}
