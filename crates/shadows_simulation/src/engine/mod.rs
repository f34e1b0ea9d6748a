//! Ядро движка: глобальное состояние, порядок систем, тик
//!
//! Весь геймплей живёт в FixedUpdate цепочкой SimSet-ов — порядок
//! детерминирован, никакого параллелизма внутри тика. `EngineControl.dt`
//! считается один раз за тик (fixed delta × slow-mo) и читается всеми
//! системами; пауза гейтит цепочку целиком через run conditions.
//!
//! Despawn — только через `DespawnQueue` (mark-and-sweep в конце тика):
//! системы никогда не деспавнят сущности посреди итерации.

use bevy::prelude::*;
use rand::Rng;

use crate::combat::CombatPlugin;
use crate::constants::*;
use crate::dungeon::traps::{self, TrapEffects};
use crate::enemy::ai::{update_enemy_ai, AiOutput};
use crate::enemy::boss::{BossAction, PendingBossAction};
use crate::enemy::{spawn_enemy, Enemy, EnemyKind};
use crate::events::{DamageDealt, EnemyDied, HostEvent, OutboundEvents, PlayerDown, RunSummary};
use crate::items::upgrades::UpgradeId;
use crate::player::{self, Player};
use crate::DeterministicRng;

pub mod contact;
pub mod rewards;
pub mod rooms;

/// Лимит живых врагов в комнате: призывы сверх лимита молча отбрасываются
pub const MAX_LIVE_ENEMIES: usize = 30;

/// Глобальное управление движком
#[derive(Resource, Debug, Clone)]
pub struct EngineControl {
    pub paused: bool,
    pub game_over: bool,
    pub victory: bool,
    /// Эффективная дельта тика: fixed delta × slow-mo. Считается в tick_clock,
    /// все остальные системы только читают.
    pub dt: f32,
    pub game_time: f32,
    pub slow_mo_factor: f32,
    pub slow_mo_timer: f32,
    pub autosave_accum: f32,
}

impl Default for EngineControl {
    fn default() -> Self {
        Self {
            paused: false,
            game_over: false,
            victory: false,
            dt: 0.0,
            game_time: 0.0,
            slow_mo_factor: 1.0,
            slow_mo_timer: 0.0,
            autosave_accum: 0.0,
        }
    }
}

impl EngineControl {
    pub fn start_slow_mo(&mut self, factor: f32, duration: f32) {
        self.slow_mo_factor = factor;
        self.slow_mo_timer = duration;
    }
}

/// Свет вокруг игрока (радиус в пикселях). Считается каждый тик из базы
/// и активных эффектов; accelerator-ы читают его для своего триггера.
#[derive(Resource, Debug, Clone, Copy)]
pub struct LightState {
    pub radius: f32,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            radius: PLAYER_LIGHT_RADIUS,
        }
    }
}

/// Очередь на despawn (mark-and-sweep). Дубликаты допустимы — sweep дедупит.
#[derive(Resource, Debug, Default)]
pub struct DespawnQueue(pub Vec<Entity>);

impl DespawnQueue {
    pub fn push(&mut self, entity: Entity) {
        self.0.push(entity);
    }
}

/// Состояние сценариев текущей комнаты
#[derive(Resource, Debug, Default)]
pub struct RoomSession {
    /// Босс этажа уже заспавнен (гейт room-clear в боссовой комнате)
    pub boss_was_spawned: bool,
    /// > 0 — идёт интро босса, боевые системы стоят
    pub boss_intro_timer: f32,
    /// > 0 — отсчёт после смерти босса до спуска/победы
    pub victory_countdown: f32,
    /// Непустой — ждём выбора апгрейда (движок на паузе)
    pub pending_level_choices: Vec<UpgradeId>,
    pub shop_open: bool,
}

/// Отложенный эффект (замена setTimeout-подхода: всё в симулированном времени)
#[derive(Debug, Clone)]
pub enum ScheduledKind {
    SpawnEnemy { kind: EnemyKind, x: f32, y: f32 },
    /// Эхо ranged-залпа (амулет Echoing Shot): тот же прицел, позиция свежая
    EchoVolley { x: f32, y: f32 },
}

#[derive(Debug, Clone)]
pub struct ScheduledEffect {
    pub delay: f32,
    pub kind: ScheduledKind,
}

#[derive(Resource, Debug, Default)]
pub struct ScheduledEffects(pub Vec<ScheduledEffect>);

/// Статистика забега (для game-over сводки и lifetime-рекорда)
#[derive(Resource, Debug, Default, Clone)]
pub struct RunStats {
    pub kills: u32,
    pub souls_earned: u32,
    pub damage_dealt: f32,
    pub damage_taken: f32,
}

impl RunStats {
    pub fn summary(&self, floor: u32, level: u32, playtime: f32) -> RunSummary {
        RunSummary {
            floor,
            level,
            kills: self.kills,
            souls_earned: self.souls_earned,
            damage_dealt: self.damage_dealt,
            damage_taken: self.damage_taken,
            playtime,
        }
    }
}

/// Фазы тика. Цепочка строго упорядочена.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimSet {
    Clock,
    PlayerMove,
    Attack,
    Ai,
    Projectiles,
    Contact,
    Traps,
    Support,
    Rewards,
    Rooms,
    Flush,
}

fn sim_active(ctrl: Res<EngineControl>) -> bool {
    !ctrl.paused && !ctrl.game_over
}

fn combat_active(ctrl: Res<EngineControl>, session: Res<RoomSession>) -> bool {
    !ctrl.paused
        && !ctrl.game_over
        && session.boss_intro_timer <= 0.0
        && session.victory_countdown <= 0.0
}

/// Система: тик часов. Единственное место, где пишется `dt`.
///
/// Шаг всегда ровно 1/FIXED_HZ: фасад гоняет FixedUpdate сам, аккумулятор
/// и clamp больших дельт (MAX_FRAME_DT) — забота хоста.
fn tick_clock(mut ctrl: ResMut<EngineControl>) {
    let fixed = (1.0 / FIXED_HZ) as f32;

    if ctrl.slow_mo_timer > 0.0 {
        ctrl.slow_mo_timer -= fixed;
        if ctrl.slow_mo_timer <= 0.0 {
            ctrl.slow_mo_timer = 0.0;
            ctrl.slow_mo_factor = 1.0;
        }
    }

    ctrl.dt = fixed * ctrl.slow_mo_factor;
    ctrl.game_time += ctrl.dt;
    ctrl.autosave_accum += fixed;
}

/// Система: выталкивание тел из препятствий комнаты
fn push_out_of_obstacles(
    dungeon: Res<crate::dungeon::Dungeon>,
    mut player: Query<&mut crate::components::Position, With<Player>>,
    mut enemies: Query<(&mut crate::components::Position, &Enemy), Without<Player>>,
) {
    let Some(room) = dungeon.current_room() else {
        return;
    };

    for mut pos in player.iter_mut() {
        for rect in &room.obstacles {
            pos.0 = crate::dungeon::resolve_circle_rect(pos.0, PLAYER_RADIUS, rect);
        }
    }
    for (mut pos, enemy) in enemies.iter_mut() {
        // Wraith в фазе и warper между прыжками проходят сквозь стены
        if matches!(enemy.kind, EnemyKind::Wraith | EnemyKind::Warper) {
            continue;
        }
        for rect in &room.obstacles {
            pos.0 = crate::dungeon::resolve_circle_rect(pos.0, enemy.radius, rect);
        }
    }
}

/// Система: эффективный радиус света из базы и активных эффектов
fn update_light(fx: Res<TrapEffects>, mut light: ResMut<LightState>) {
    let mut radius = PLAYER_LIGHT_RADIUS;
    if fx.blindness_active() {
        radius *= 0.45;
    }
    if fx.lights_out_active() {
        radius = radius.min(LIGHTS_OUT_RADIUS);
    }
    light.radius = radius;
}

/// Система: потребление спец-действия босса (максимум одно за тик)
fn consume_boss_action(
    mut pending: ResMut<PendingBossAction>,
    mut fx: ResMut<TrapEffects>,
    mut outbound: ResMut<OutboundEvents>,
) {
    let Some(action) = pending.0.take() else {
        return;
    };
    match action {
        BossAction::ScreenShake { strength } => outbound.push(HostEvent::ScreenShake {
            strength,
            duration: 0.5,
        }),
        BossAction::SpawnMinions { .. } => {
            // Сами призывы идут через AiOutput.summons; хосту — только тряска
            outbound.push(HostEvent::ScreenShake {
                strength: 3.0,
                duration: 0.3,
            });
        }
        BossAction::LightsOut => {
            fx.lights_out_timer = LIGHTS_OUT_DURATION;
            outbound.push(HostEvent::ScreenFlash { duration: 0.3 });
        }
        BossAction::LockDoors => fx.doors_locked_timer = DOORS_LOCKED_DURATION,
        BossAction::Panic => {
            fx.panic_timer = PANIC_DURATION;
            outbound.push(HostEvent::ScreenShake {
                strength: 5.0,
                duration: 0.6,
            });
        }
    }
}

/// Система: материализация призывов со стаггером + обработка отложенных
/// эффектов. Призывы сверх лимита живых врагов отбрасываются.
#[allow(clippy::too_many_arguments)]
fn spawn_summons(
    mut commands: Commands,
    ctrl: Res<EngineControl>,
    dims: Res<ActiveDims>,
    dungeon: Res<crate::dungeon::Dungeon>,
    mut rng: ResMut<DeterministicRng>,
    mut out: ResMut<AiOutput>,
    mut scheduled: ResMut<ScheduledEffects>,
    mut volley: ResMut<crate::combat::projectile::VolleyCounter>,
    mut outbound: ResMut<OutboundEvents>,
    enemies: Query<(), With<Enemy>>,
    player: Query<(&crate::components::Position, &crate::player::CombatStats), With<Player>>,
) {
    for request in out.summons.drain(..) {
        for i in 0..request.count {
            let angle = rng.rng.gen_range(0.0..std::f32::consts::TAU);
            let offset = Vec2::from_angle(angle) * rng.rng.gen_range(40.0..90.0);
            let pos = dims.clamp_to_interior(request.position + offset, 20.0);
            scheduled.0.push(ScheduledEffect {
                delay: 0.15 * i as f32,
                kind: ScheduledKind::SpawnEnemy {
                    kind: request.kind,
                    x: pos.x,
                    y: pos.y,
                },
            });
        }
    }

    let mut alive = enemies.iter().count();
    let dt = ctrl.dt;
    let floor = dungeon.floor;
    let mut i = 0;
    while i < scheduled.0.len() {
        scheduled.0[i].delay -= dt;
        if scheduled.0[i].delay <= 0.0 {
            let effect = scheduled.0.swap_remove(i);
            match effect.kind {
                ScheduledKind::SpawnEnemy { kind, x, y } => {
                    if alive < MAX_LIVE_ENEMIES {
                        spawn_enemy(&mut commands, kind, Vec2::new(x, y), floor);
                        alive += 1;
                    }
                }
                ScheduledKind::EchoVolley { x, y } => {
                    if let Ok((pos, stats)) = player.single() {
                        let to_aim = Vec2::new(x, y) - pos.0;
                        let dir = if to_aim.length_squared() > 0.01 {
                            to_aim.normalize()
                        } else {
                            Vec2::X
                        };
                        volley.0 = volley.0.wrapping_add(1);
                        crate::combat::projectile::spawn_volley(
                            &mut commands,
                            pos.0,
                            dir,
                            stats,
                            volley.0,
                        );
                        outbound.cue(crate::events::CueKind::RangedShot);
                    }
                }
            }
        } else {
            i += 1;
        }
    }
}

/// Система: mark-and-sweep despawn в конце тика
fn sweep_despawns(mut commands: Commands, mut queue: ResMut<DespawnQueue>) {
    if queue.0.is_empty() {
        return;
    }
    queue.0.sort_unstable();
    queue.0.dedup();
    for entity in queue.0.drain(..) {
        commands.entity(entity).try_despawn();
    }
}

/// Система: ручное старение очередей событий (FixedUpdate гоняется напрямую
/// фасадом, автоматика First-расписания не срабатывает)
fn update_event_queues(
    mut damage: ResMut<Events<DamageDealt>>,
    mut died: ResMut<Events<EnemyDied>>,
    mut down: ResMut<Events<PlayerDown>>,
) {
    damage.update();
    died.update();
    down.update();
}

/// EnginePlugin: ресурсы + вся цепочка FixedUpdate
pub struct EnginePlugin;

impl Plugin for EnginePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(CombatPlugin)
            .init_resource::<EngineControl>()
            .init_resource::<LightState>()
            .init_resource::<DespawnQueue>()
            .init_resource::<RoomSession>()
            .init_resource::<ScheduledEffects>()
            .init_resource::<RunStats>()
            .init_resource::<TrapEffects>()
            .init_resource::<AiOutput>()
            .init_resource::<PendingBossAction>()
            .init_resource::<OutboundEvents>()
            .init_resource::<player::PlayerInput>();

        app.configure_sets(
            FixedUpdate,
            (
                SimSet::Clock,
                SimSet::PlayerMove,
                SimSet::Attack,
                SimSet::Ai,
                SimSet::Projectiles,
                SimSet::Contact,
                SimSet::Traps,
                SimSet::Support,
                SimSet::Rewards,
                SimSet::Rooms,
                SimSet::Flush,
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            tick_clock.in_set(SimSet::Clock).run_if(sim_active),
        );

        app.add_systems(
            FixedUpdate,
            (
                player::tick_player_cooldowns,
                player::player_movement,
                player::player_regen,
            )
                .chain()
                .in_set(SimSet::PlayerMove)
                .run_if(sim_active),
        );

        app.add_systems(
            FixedUpdate,
            (
                crate::combat::player_melee_attack,
                crate::combat::projectile::player_ranged_attack,
            )
                .chain()
                .in_set(SimSet::Attack)
                .run_if(combat_active),
        );

        app.add_systems(
            FixedUpdate,
            update_enemy_ai.in_set(SimSet::Ai).run_if(combat_active),
        );

        app.add_systems(
            FixedUpdate,
            (
                crate::combat::projectile::apply_ai_output,
                crate::combat::projectile::move_projectiles,
                crate::combat::projectile::player_projectile_hits,
                crate::combat::projectile::enemy_projectile_hits,
            )
                .chain()
                .in_set(SimSet::Projectiles)
                .run_if(combat_active),
        );

        app.add_systems(
            FixedUpdate,
            (
                push_out_of_obstacles,
                contact::contact_damage,
                contact::resolve_explosions,
                contact::doom_execute,
                contact::shadow_clone_strikes,
            )
                .chain()
                .in_set(SimSet::Contact)
                .run_if(combat_active),
        );

        app.add_systems(
            FixedUpdate,
            (traps::check_trap_collision, traps::update_trap_effects)
                .chain()
                .in_set(SimSet::Traps)
                .run_if(combat_active),
        );

        app.add_systems(
            FixedUpdate,
            (update_light, consume_boss_action, spawn_summons)
                .chain()
                .in_set(SimSet::Support)
                .run_if(sim_active),
        );

        app.add_systems(
            FixedUpdate,
            (
                rewards::track_damage,
                rewards::kill_rewards,
                rewards::revive_or_game_over,
            )
                .chain()
                .in_set(SimSet::Rewards)
                .run_if(sim_active),
        );

        app.add_systems(
            FixedUpdate,
            (
                rooms::boss_intro,
                rooms::check_room_cleared,
                rooms::door_transitions,
                rooms::special_room_interact,
                rooms::floor_advance,
            )
                .chain()
                .in_set(SimSet::Rooms)
                .run_if(sim_active),
        );

        app.add_systems(
            FixedUpdate,
            (rewards::autosave, sweep_despawns, update_event_queues)
                .chain()
                .in_set(SimSet::Flush),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_mo_expires_back_to_unity() {
        let mut ctrl = EngineControl::default();
        ctrl.start_slow_mo(0.25, 1.0);
        assert_eq!(ctrl.slow_mo_factor, 0.25);

        // Симулируем тики часов руками
        let fixed = 1.0 / 60.0;
        for _ in 0..70 {
            if ctrl.slow_mo_timer > 0.0 {
                ctrl.slow_mo_timer -= fixed;
                if ctrl.slow_mo_timer <= 0.0 {
                    ctrl.slow_mo_timer = 0.0;
                    ctrl.slow_mo_factor = 1.0;
                }
            }
        }
        assert_eq!(ctrl.slow_mo_factor, 1.0);
    }

    #[test]
    fn test_despawn_queue_dedups() {
        let mut queue = DespawnQueue::default();
        let e = Entity::from_raw(7);
        queue.push(e);
        queue.push(e);
        queue.0.sort_unstable();
        queue.0.dedup();
        assert_eq!(queue.0.len(), 1);
    }
}
