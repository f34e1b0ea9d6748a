//! Поток комнат: зачистка, двери, интро босса, спуск по этажам
//!
//! Двери открываются только в зачищенной комнате (и если их не заперла
//! ловушка/босс). Переход переносит игрока к противоположной стене новой
//! комнаты, сбрасывает эффекты и снаряды, спавнит врагов при первом входе.
//! Комната босса: интро BOSS_INTRO_TIME с замороженным боем, потом спавн.
//! Room-clear в ней засчитывается только после `boss_was_spawned` — пустая
//! комната до интро не считается зачищенной.

use bevy::prelude::*;
use rand::Rng;

use crate::combat::projectile::{EnemyProjectile, Projectile};
use crate::components::{Health, Position};
use crate::constants::*;
use crate::dungeon::traps::TrapEffects;
use crate::dungeon::{generate_dungeon, Dir, Dungeon, RoomKind};
use crate::engine::rewards::open_level_choices;
use crate::engine::{
    DespawnQueue, EngineControl, RoomSession, ScheduledEffect, ScheduledEffects, ScheduledKind,
};
use crate::enemy::ai::AiOutput;
use crate::enemy::boss::{BossPattern, BossScript};
use crate::enemy::{spawn_enemy, Enemy, EnemyAi, EnemyKind};
use crate::events::{CueKind, HostEvent, OutboundEvents, ShopListing};
use crate::items::amulets::ALL_AMULETS;
use crate::items::upgrades::TakenUpgrades;
use crate::persistence::LifetimeRecord;
use crate::player::{CombatStats, Level, Player, PlayerInput};
use crate::DeterministicRng;

/// Система: интро босса — таймер, затем спавн со скриптом этажа
pub fn boss_intro(
    mut commands: Commands,
    ctrl: Res<EngineControl>,
    dims: Res<ActiveDims>,
    dungeon: Res<Dungeon>,
    mut session: ResMut<RoomSession>,
    mut outbound: ResMut<OutboundEvents>,
) {
    if session.boss_intro_timer <= 0.0 {
        return;
    }
    session.boss_intro_timer -= ctrl.dt;
    if session.boss_intro_timer > 0.0 {
        return;
    }
    session.boss_intro_timer = 0.0;

    let pattern = BossPattern::for_floor(dungeon.floor);
    let position = Vec2::new(dims.gw * 0.5, dims.gh * 0.3);
    let entity = spawn_enemy(&mut commands, EnemyKind::Boss, position, dungeon.floor);
    commands
        .entity(entity)
        .insert(EnemyAi::Boss(BossScript::new(pattern)));
    session.boss_was_spawned = true;

    outbound.cue(CueKind::BossRoar);
    outbound.push(HostEvent::ScreenShake {
        strength: 7.0,
        duration: 0.8,
    });
    crate::log_info(&format!("👑 Boss spawned: {}", pattern.name()));
}

/// Система: зачистка комнаты — нет живых врагов и отложенных спавнов
pub fn check_room_cleared(
    session: Res<RoomSession>,
    scheduled: Res<ScheduledEffects>,
    out: Res<AiOutput>,
    mut dungeon: ResMut<Dungeon>,
    mut outbound: ResMut<OutboundEvents>,
    enemies: Query<(), With<Enemy>>,
) {
    let boss_gate = session.boss_was_spawned;
    let Some(room) = dungeon.current_room_mut() else {
        return;
    };
    if room.cleared {
        return;
    }
    if room.kind == RoomKind::Boss && !boss_gate {
        return;
    }
    if !enemies.is_empty() || !scheduled.0.is_empty() || !out.summons.is_empty() {
        return;
    }

    room.cleared = true;
    outbound.cue(CueKind::DoorOpen);
    crate::log_info(&format!("Room {:?} cleared", room.grid));
}

/// Система: переход через дверь
#[allow(clippy::too_many_arguments)]
pub fn door_transitions(
    mut commands: Commands,
    dims: Res<ActiveDims>,
    mut dungeon: ResMut<Dungeon>,
    mut session: ResMut<RoomSession>,
    mut outbound: ResMut<OutboundEvents>,
    mut despawn: ResMut<DespawnQueue>,
    mut scheduled: ResMut<ScheduledEffects>,
    mut out: ResMut<AiOutput>,
    mut fx: ResMut<TrapEffects>,
    mut player: Query<(&mut Position, &mut CombatStats), With<Player>>,
    shots: Query<Entity, Or<(With<Projectile>, With<EnemyProjectile>)>>,
) {
    let Ok((mut pos, mut stats)) = player.single_mut() else {
        return;
    };

    let Some(room) = dungeon.current_room() else {
        return;
    };
    if !room.cleared || fx.doors_locked() {
        return;
    }

    let mut crossed: Option<Dir> = None;
    for dir in Dir::ALL {
        if room.has_door(dir) && pos.0.distance(dir.door_center(&dims)) < DOOR_THRESHOLD {
            crossed = Some(dir);
            break;
        }
    }
    let Some(dir) = crossed else {
        return;
    };

    let leaving_shrine = room.kind == RoomKind::Shrine;

    // Смена комнаты: эффекты и снаряды не переживают переход
    fx.reset(&mut stats);
    scheduled.0.clear();
    out.shots.clear();
    out.explosions.clear();
    out.summons.clear();
    for entity in shots.iter() {
        despawn.push(entity);
    }

    dungeon.current = dungeon.neighbor_key(dir);
    pos.0 = dir.entry_position(&dims);
    session.boss_was_spawned = false;

    if session.shop_open {
        session.shop_open = false;
        outbound.push(HostEvent::ShopClosed);
    }
    if leaving_shrine {
        outbound.push(HostEvent::SanctuaryClosed);
    }

    enter_current_room(
        &mut commands,
        &mut dungeon,
        &mut session,
        &mut outbound,
        &dims,
    );
}

/// Вход в текущую комнату: события хосту, спавн врагов при первом входе,
/// запуск интро босса
pub fn enter_current_room(
    commands: &mut Commands,
    dungeon: &mut Dungeon,
    session: &mut RoomSession,
    outbound: &mut OutboundEvents,
    _dims: &ActiveDims,
) {
    let floor = dungeon.floor;
    let Some(room) = dungeon.current_room_mut() else {
        return;
    };

    outbound.push(HostEvent::RoomEntered { kind: room.kind });
    crate::log_info(&format!("Entered room {:?} ({:?})", room.grid, room.kind));

    match room.kind {
        RoomKind::Boss if !room.cleared => {
            session.boss_intro_timer = BOSS_INTRO_TIME;
            outbound.cue(CueKind::HorrorWhisper);
        }
        RoomKind::Shrine => {
            outbound.push(HostEvent::SanctuaryOpened);
        }
        _ => {}
    }

    if !room.cleared && !room.visited {
        room.visited = true;
        for spawn in &room.spawns {
            spawn_enemy(commands, spawn.kind, Vec2::new(spawn.x, spawn.y), floor);
        }
    }
}

/// Система: интеракции в спец-комнатах (сундук, алтарь, прилавок)
#[allow(clippy::too_many_arguments)]
pub fn special_room_interact(
    dims: Res<ActiveDims>,
    mut ctrl: ResMut<EngineControl>,
    mut input: ResMut<PlayerInput>,
    mut dungeon: ResMut<Dungeon>,
    mut session: ResMut<RoomSession>,
    mut rng: ResMut<DeterministicRng>,
    mut scheduled: ResMut<ScheduledEffects>,
    mut outbound: ResMut<OutboundEvents>,
    mut lifetime: ResMut<LifetimeRecord>,
    mut run_stats: ResMut<crate::engine::RunStats>,
    taken: Res<TakenUpgrades>,
    mut player: Query<(&Position, &mut CombatStats, &mut Health, &mut Level), With<Player>>,
) {
    if !input.interact_pressed {
        return;
    }
    input.interact_pressed = false;

    let Ok((pos, mut stats, mut health, mut level)) = player.single_mut() else {
        return;
    };
    let near_center = pos.0.distance(dims.center()) < TILE_SIZE * 2.0;
    if !near_center {
        return;
    }

    let floor = dungeon.floor;
    let Some(room) = dungeon.current_room_mut() else {
        return;
    };

    match room.kind {
        RoomKind::Treasure if room.cleared && !room.treasure_collected => {
            room.treasure_collected = true;
            health.heal(25.0);
            let souls =
                ((20 + floor * 10) as f32 * stats.souls_multiplier).floor() as u32;
            lifetime.souls += souls;
            run_stats.souls_earned += souls;
            outbound.cue(CueKind::TreasureCollected);

            if level.add_xp(20.0 * stats.xp_multiplier) {
                open_level_choices(
                    &mut ctrl,
                    &mut session,
                    &mut outbound,
                    &taken,
                    &mut rng.rng,
                    level.level,
                );
            }

            // Редкий амулет из сундука
            if rng.rng.gen_bool(0.25) {
                let unowned: Vec<_> = ALL_AMULETS
                    .iter()
                    .map(|d| d.id)
                    .filter(|id| !lifetime.owned_amulets.contains(id))
                    .collect();
                if !unowned.is_empty() {
                    let dropped = unowned[rng.rng.gen_range(0..unowned.len())];
                    lifetime.owned_amulets.push(dropped);
                    outbound.push(HostEvent::AmuletDropped { amulet: dropped });
                }
            }
            crate::log_info(&format!("💰 Treasure collected: {} souls", souls));
        }
        RoomKind::Shrine if !room.shrine_used => {
            room.shrine_used = true;
            // Кровавая сделка: треть текущего hp за постоянный урон
            let blood_cost = health.current * 0.3;
            health.take_damage(blood_cost);
            stats.damage_multiplier += 0.15;

            // Алтарь будит стражей: волна врагов, двери заперты до зачистки
            room.cleared = false;
            let wave_kinds = [EnemyKind::Chaser, EnemyKind::Swarm, EnemyKind::Shooter];
            for i in 0..3 + floor.min(2) {
                let kind = wave_kinds[rng.rng.gen_range(0..wave_kinds.len())];
                let angle = rng.rng.gen_range(0.0..std::f32::consts::TAU);
                let offset = Vec2::from_angle(angle) * rng.rng.gen_range(150.0..240.0);
                let spawn_pos = dims.clamp_to_interior(dims.center() + offset, 20.0);
                scheduled.0.push(ScheduledEffect {
                    delay: 0.4 + 0.2 * i as f32,
                    kind: ScheduledKind::SpawnEnemy {
                        kind,
                        x: spawn_pos.x,
                        y: spawn_pos.y,
                    },
                });
            }
            outbound.cue(CueKind::ShrineUsed);
            crate::log_info("🩸 Shrine pact sealed: +15% damage");
        }
        RoomKind::Vendor if !session.shop_open => {
            session.shop_open = true;
            let listings: Vec<ShopListing> = ALL_AMULETS
                .iter()
                .filter(|d| !lifetime.owned_amulets.contains(&d.id))
                .take(4)
                .map(|d| ShopListing {
                    name: d.name.to_string(),
                    description: d.description.to_string(),
                    cost: d.cost,
                })
                .collect();
            outbound.push(HostEvent::ShopOpened {
                listings,
                souls: lifetime.souls,
            });
        }
        _ => {}
    }
}

/// Система: отсчёт после босса — спуск на следующий этаж или победа
#[allow(clippy::too_many_arguments)]
pub fn floor_advance(
    mut ctrl: ResMut<EngineControl>,
    dims: Res<ActiveDims>,
    mut commands: Commands,
    mut dungeon: ResMut<Dungeon>,
    mut session: ResMut<RoomSession>,
    mut rng: ResMut<DeterministicRng>,
    mut outbound: ResMut<OutboundEvents>,
    mut lifetime: ResMut<LifetimeRecord>,
    mut despawn: ResMut<DespawnQueue>,
    mut scheduled: ResMut<ScheduledEffects>,
    mut out: ResMut<AiOutput>,
    mut fx: ResMut<TrapEffects>,
    mut player: Query<(&mut Position, &mut Health, &mut CombatStats), With<Player>>,
    leftovers: Query<Entity, Or<(With<Enemy>, With<Projectile>, With<EnemyProjectile>)>>,
) {
    if session.victory_countdown <= 0.0 {
        return;
    }
    session.victory_countdown -= ctrl.dt;
    if session.victory_countdown > 0.0 {
        return;
    }
    session.victory_countdown = 0.0;

    let Ok((mut pos, mut health, mut stats)) = player.single_mut() else {
        return;
    };

    if dungeon.floor >= FINAL_FLOOR {
        ctrl.victory = true;
        ctrl.paused = true;
        lifetime.victories += 1;
        lifetime.best_floor = lifetime.best_floor.max(dungeon.floor);
        outbound.push(HostEvent::Victory {
            floor: dungeon.floor,
        });
        crate::log_info("🏆 Victory! The Abyss Matriarch has fallen");
        return;
    }

    // Этаж позади: недобитки, снаряды и отложенные эффекты вниз не едут
    fx.reset(&mut stats);
    scheduled.0.clear();
    out.shots.clear();
    out.explosions.clear();
    out.summons.clear();
    for entity in leftovers.iter() {
        despawn.push(entity);
    }

    let next_floor = dungeon.floor + 1;
    *dungeon = generate_dungeon(next_floor, &mut rng.rng, &dims);
    pos.0 = dims.center();
    let descent_heal = health.max * 0.25;
    health.heal(descent_heal);
    session.boss_was_spawned = false;
    session.boss_intro_timer = 0.0;

    outbound.push(HostEvent::FloorChanged { floor: next_floor });
    enter_current_room(
        &mut commands,
        &mut dungeon,
        &mut session,
        &mut outbound,
        &dims,
    );
}
