//! Интеграционный прогон забега headless
//!
//! Проверяем:
//! - Инварианты (hp в [0, max], игрок внутри комнаты)
//! - Пауза реально замораживает мир
//! - Level-up: пауза, выбор, очередь уровней при избытке xp
//! - Game-over при летальном контактном уроне

use bevy::prelude::*;
use shadows_simulation::constants::ActiveDims;
use shadows_simulation::enemy::{spawn_enemy, Enemy, EnemyKind};
use shadows_simulation::events::{EnemyDied, HostEvent, KillSource};
use shadows_simulation::player::{Player, PlayerInput};
use shadows_simulation::{Health, Shadows};

fn scripted_input(tick: u32, sim: &mut Shadows) -> PlayerInput {
    let t = tick as f32 / 60.0;
    let mut input = PlayerInput::default();
    input.move_dir = Vec2::new(t.cos(), (t * 0.7).sin());
    input.aim = sim.player_position() + input.move_dir * 120.0;
    input.melee_pressed = tick % 25 == 0;
    input.ranged_pressed = tick % 40 == 0;
    input
}

/// Test: 1000 тиков скриптованного бота без краша, инварианты каждые 100
#[test]
fn test_scripted_run_1000_ticks() {
    let mut sim = Shadows::new(42);

    for tick in 0..1000u32 {
        let input = scripted_input(tick, &mut sim);
        sim.set_input(input);
        sim.tick();

        // Level-up блокирует симуляцию до выбора — бот берёт первый
        for event in sim.drain_events() {
            if let HostEvent::LevelUpReady { choices, .. } = event {
                sim.apply_upgrade(choices[0]);
            }
        }

        if tick % 100 == 0 {
            let (hp, max_hp) = sim.player_health();
            assert!(hp >= 0.0, "tick {}: hp {} < 0", tick, hp);
            assert!(hp <= max_hp, "tick {}: hp {} > max {}", tick, hp, max_hp);

            let pos = sim.player_position();
            let dims = *sim.world().resource::<ActiveDims>();
            assert!(
                pos.x >= 0.0 && pos.x <= dims.gw && pos.y >= 0.0 && pos.y <= dims.gh,
                "tick {}: игрок вне комнаты {:?}",
                tick,
                pos
            );
        }

        if sim.is_game_over() {
            break;
        }
    }
}

/// Test: пауза замораживает движение
#[test]
fn test_pause_freezes_world() {
    let mut sim = Shadows::new(7);

    let mut input = PlayerInput::default();
    input.move_dir = Vec2::X;
    sim.set_input(input.clone());
    sim.tick();
    let moved = sim.player_position();

    sim.pause();
    sim.set_input(input);
    for _ in 0..30 {
        sim.tick();
    }
    assert_eq!(sim.player_position(), moved);

    sim.resume();
    sim.tick();
    assert_ne!(sim.player_position(), moved);
}

/// Test: level-up ставит паузу и предлагает 3 апгрейда; избыток xp
/// ставит следующий уровень в очередь после выбора
#[test]
fn test_level_up_flow() {
    let mut sim = Shadows::new(3);

    sim.world_mut().send_event(EnemyDied {
        kind: EnemyKind::Chaser,
        position: Vec2::ZERO,
        source: KillSource::Melee,
        xp: 500,
        souls_min: 1,
        souls_max: 2,
        was_boss: false,
    });
    sim.tick();

    assert!(sim.is_paused(), "level-up должен ставить паузу");
    let choices = sim
        .drain_events()
        .into_iter()
        .find_map(|e| match e {
            HostEvent::LevelUpReady { choices, .. } => Some(choices),
            _ => None,
        })
        .expect("нет LevelUpReady");
    assert_eq!(choices.len(), 3);

    // 500 xp хватает на несколько уровней — выбираем пока не отпустит
    let mut rounds = 0;
    let mut pending = choices;
    while sim.is_paused() && rounds < 20 {
        sim.apply_upgrade(pending[0]);
        rounds += 1;
        if sim.is_paused() {
            pending = sim
                .drain_events()
                .into_iter()
                .find_map(|e| match e {
                    HostEvent::LevelUpReady { choices, .. } => Some(choices),
                    _ => None,
                })
                .expect("пауза без нового LevelUpReady");
        }
    }
    assert!(!sim.is_paused(), "очередь уровней не закончилась за 20 выборов");
    assert!(rounds >= 2, "500 xp должно дать минимум 2 уровня");
    assert!(sim.player_level() >= 3);
}

/// Test: спуск на следующий этаж не тащит за собой выживших врагов
#[test]
fn test_floor_advance_sweeps_previous_floor() {
    use shadows_simulation::engine::RoomSession;

    let mut sim = Shadows::new(7);
    let spawn_pos = sim.player_position() + Vec2::new(220.0, 0.0);
    {
        let world = sim.world_mut();
        let mut commands = world.commands();
        spawn_enemy(&mut commands, EnemyKind::Chaser, spawn_pos, 1);
        world.flush();
        world.resource_mut::<RoomSession>().victory_countdown = 0.05;
    }

    for _ in 0..10 {
        sim.tick();
    }

    assert_eq!(sim.floor(), 2, "отсчёт должен спустить на этаж 2");
    let world = sim.world_mut();
    let survivors = world.query::<&Enemy>().iter(world).count();
    assert_eq!(survivors, 0, "враг прошлого этажа пережил спуск");
}

/// Test: враг вплотную добивает раненого игрока — game-over и пауза
#[test]
fn test_contact_damage_game_over() {
    let mut sim = Shadows::new(11);

    let spawn_pos = sim.player_position();
    {
        let world = sim.world_mut();
        let mut query = world.query_filtered::<&mut Health, With<Player>>();
        if let Ok(mut health) = query.single_mut(world) {
            health.current = 15.0;
        }
        let mut commands = world.commands();
        spawn_enemy(&mut commands, EnemyKind::Brute, spawn_pos, 1);
    }
    sim.world_mut().flush();

    let mut down_seen = false;
    for _ in 0..900 {
        sim.tick();
        for event in sim.drain_events() {
            if matches!(event, HostEvent::GameOver { .. }) {
                down_seen = true;
            }
        }
        if sim.is_game_over() {
            break;
        }
    }

    assert!(sim.is_game_over(), "игрок с 15 hp должен умереть от Brute");
    assert!(sim.is_paused());
    assert!(down_seen, "GameOver событие не дошло до хоста");
}
