//! Скрытые ловушки и активные эффекты
//!
//! Ловушки генерируются только в trap-комнатах, невидимы до срабатывания
//! (хост рисует слабый hint-шиммер). Дебаффы игрока капчурят оригинальное
//! значение стата и восстанавливают его бит-в-бит на истечении; повторное
//! срабатывание того же типа лишь обновляет таймер. Комнатные эффекты
//! (lights-out, panic, lock-doors, баффы врагов) — таймеры в `TrapEffects`,
//! читаются остальными системами. Выход из комнаты сбрасывает всё.

use bevy::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::Position;
use crate::constants::*;
use crate::dungeon::{circle_rect_overlap, Dungeon, Obstacle, RoomKind};
use crate::engine::EngineControl;
use crate::enemy::ai::SummonRequest;
use crate::enemy::EnemyKind;
use crate::events::{CueKind, HostEvent, OutboundEvents};
use crate::player::{CombatStats, Player};
use crate::DeterministicRng;

/// Тип ловушки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapKind {
    /// Скорость игрока ×0.5 на 6s
    Slowness,
    /// Радиус света ×0.45 на 6s
    Blindness,
    /// Урон игрока ×0.6 на 6s
    Weakness,
    /// Dash запрещён на 6s
    NoDash,
    /// Волна swarm/chaser вокруг игрока
    SummonHorrors,
    /// Скорость ×1.2 и урон ×1.3 врагов на 8s
    EnemyFrenzy,
    /// Свет комнаты до минимума
    LightsOut,
    /// Визуальная паника хоста (инверсия, тряска)
    Panic,
    /// Двери комнаты заперты на 10s
    LockDoors,
    /// Скорость врагов ×1.4 на 8s
    EnemyHaste,
    /// LightsOut + пара сталкеров: свет гаснет, из тьмы выходят
    DarkAmbush,
}

const ALL_TRAPS: [TrapKind; 11] = [
    TrapKind::Slowness,
    TrapKind::Blindness,
    TrapKind::Weakness,
    TrapKind::NoDash,
    TrapKind::SummonHorrors,
    TrapKind::EnemyFrenzy,
    TrapKind::LightsOut,
    TrapKind::Panic,
    TrapKind::LockDoors,
    TrapKind::EnemyHaste,
    TrapKind::DarkAmbush,
];

/// Скрытая ловушка в комнате (plain f32 — сериализуемо)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HiddenTrap {
    pub x: f32,
    pub y: f32,
    pub kind: TrapKind,
    pub triggered: bool,
}

/// Какой стат дебаффается (капчур-восстановление применимо только к статам)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebuffTarget {
    MoveSpeed,
    Damage,
    Light,
    Dash,
}

impl DebuffTarget {
    fn of(kind: TrapKind) -> Option<DebuffTarget> {
        match kind {
            TrapKind::Slowness => Some(DebuffTarget::MoveSpeed),
            TrapKind::Weakness => Some(DebuffTarget::Damage),
            TrapKind::Blindness => Some(DebuffTarget::Light),
            TrapKind::NoDash => Some(DebuffTarget::Dash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveDebuff {
    target: DebuffTarget,
    remaining: f32,
    /// Значение стата до применения; восстанавливается ровно оно
    original: f32,
}

/// Активные эффекты ловушек текущей комнаты (resource).
///
/// Blindness и lights-out не трогают стат напрямую: системы света читают
/// флаги и считают эффективный радиус сами, восстановление не требуется.
#[derive(Resource, Debug, Default)]
pub struct TrapEffects {
    debuffs: Vec<ActiveDebuff>,
    pub lights_out_timer: f32,
    pub panic_timer: f32,
    pub doors_locked_timer: f32,
    pub enemy_haste_timer: f32,
    pub enemy_frenzy_timer: f32,
}

impl TrapEffects {
    pub fn no_dash_active(&self) -> bool {
        self.debuffs.iter().any(|d| d.target == DebuffTarget::Dash)
    }

    pub fn blindness_active(&self) -> bool {
        self.debuffs.iter().any(|d| d.target == DebuffTarget::Light)
    }

    pub fn lights_out_active(&self) -> bool {
        self.lights_out_timer > 0.0
    }

    pub fn doors_locked(&self) -> bool {
        self.doors_locked_timer > 0.0
    }

    /// Суммарный множитель скорости врагов от haste/frenzy
    pub fn enemy_speed_mult(&self) -> f32 {
        let mut mult = 1.0;
        if self.enemy_haste_timer > 0.0 {
            mult += 0.4;
        }
        if self.enemy_frenzy_timer > 0.0 {
            mult += 0.2;
        }
        mult
    }

    pub fn enemy_damage_mult(&self) -> f32 {
        if self.enemy_frenzy_timer > 0.0 {
            1.3
        } else {
            1.0
        }
    }

    /// Применение стат-дебаффа: первый раз капчурит оригинал и ослабляет,
    /// повторный того же типа лишь освежает таймер
    fn apply_debuff(&mut self, target: DebuffTarget, stats: &mut CombatStats) {
        if let Some(existing) = self.debuffs.iter_mut().find(|d| d.target == target) {
            existing.remaining = TRAP_DEBUFF_DURATION;
            return;
        }
        let original = match target {
            DebuffTarget::MoveSpeed => {
                let orig = stats.move_speed_mult;
                stats.move_speed_mult = orig * 0.5;
                orig
            }
            DebuffTarget::Damage => {
                let orig = stats.damage_multiplier;
                stats.damage_multiplier = orig * 0.6;
                orig
            }
            // Флаговые дебаффы: системы читают наличие, восстанавливать нечего
            DebuffTarget::Light | DebuffTarget::Dash => 0.0,
        };
        self.debuffs.push(ActiveDebuff {
            target,
            remaining: TRAP_DEBUFF_DURATION,
            original,
        });
    }

    /// Тик таймеров; истёкшие дебаффы восстанавливают стат бит-в-бит
    pub fn tick(&mut self, dt: f32, stats: &mut CombatStats) {
        self.lights_out_timer = (self.lights_out_timer - dt).max(0.0);
        self.panic_timer = (self.panic_timer - dt).max(0.0);
        self.doors_locked_timer = (self.doors_locked_timer - dt).max(0.0);
        self.enemy_haste_timer = (self.enemy_haste_timer - dt).max(0.0);
        self.enemy_frenzy_timer = (self.enemy_frenzy_timer - dt).max(0.0);

        let mut i = 0;
        while i < self.debuffs.len() {
            self.debuffs[i].remaining -= dt;
            if self.debuffs[i].remaining <= 0.0 {
                let expired = self.debuffs.swap_remove(i);
                Self::restore(expired, stats);
            } else {
                i += 1;
            }
        }
    }

    fn restore(debuff: ActiveDebuff, stats: &mut CombatStats) {
        match debuff.target {
            DebuffTarget::MoveSpeed => stats.move_speed_mult = debuff.original,
            DebuffTarget::Damage => stats.damage_multiplier = debuff.original,
            DebuffTarget::Light | DebuffTarget::Dash => {}
        }
    }

    /// Полный сброс на выходе из комнаты: все дебаффы восстанавливаются немедленно
    pub fn reset(&mut self, stats: &mut CombatStats) {
        for debuff in self.debuffs.drain(..) {
            Self::restore(debuff, stats);
        }
        self.lights_out_timer = 0.0;
        self.panic_timer = 0.0;
        self.doors_locked_timer = 0.0;
        self.enemy_haste_timer = 0.0;
        self.enemy_frenzy_timer = 0.0;
    }
}

fn tile_key(x: f32, y: f32) -> (i32, i32) {
    ((x / TILE_SIZE) as i32, (y / TILE_SIZE) as i32)
}

/// Генерация скрытых ловушек: только trap-комнаты,
/// count = 2 + rand(0..=1) + min(floor, 3).
/// Типы тянутся из перетасованного пула без повторов, позиции
/// дедуплицируются по тайлу.
pub fn generate_hidden_traps(
    kind: RoomKind,
    floor: u32,
    room_obstacles: &[Obstacle],
    rng: &mut ChaCha8Rng,
    dims: &ActiveDims,
) -> Vec<HiddenTrap> {
    if kind != RoomKind::Trap {
        return Vec::new();
    }

    let count = (2 + rng.gen_range(0..=1) + floor.min(3)) as usize;
    let mut pool = ALL_TRAPS;
    pool.shuffle(rng);
    let mut traps: Vec<HiddenTrap> = Vec::new();

    for &trap_kind in pool.iter().take(count) {
        for _ in 0..TRAP_PLACE_RETRIES {
            let candidate = Vec2::new(
                rng.gen_range(TILE_SIZE * 2.0..dims.gw - TILE_SIZE * 2.0),
                rng.gen_range(TILE_SIZE * 2.0..dims.gh - TILE_SIZE * 2.0),
            );
            let key = tile_key(candidate.x, candidate.y);
            let blocked = room_obstacles
                .iter()
                .any(|o| circle_rect_overlap(candidate, TRAP_TRIGGER_RADIUS, o))
                || traps.iter().any(|t| tile_key(t.x, t.y) == key);
            if !blocked {
                traps.push(HiddenTrap {
                    x: candidate.x,
                    y: candidate.y,
                    kind: trap_kind,
                    triggered: false,
                });
                break;
            }
            // Не нашлось места за 30 попыток — ловушек будет меньше задуманного
        }
    }
    traps
}

/// Активация ловушки: эффект + звуковой cue. Призывы складываются в out_summons
/// (спавнит движок тем же путём, что и некромантские).
pub fn activate_trap(
    kind: TrapKind,
    player_pos: Vec2,
    floor: u32,
    fx: &mut TrapEffects,
    stats: &mut CombatStats,
    rng: &mut ChaCha8Rng,
    out_summons: &mut Vec<SummonRequest>,
    outbound: &mut OutboundEvents,
) {
    outbound.cue(CueKind::TrapTriggered);

    match kind {
        TrapKind::Slowness => fx.apply_debuff(DebuffTarget::MoveSpeed, stats),
        TrapKind::Weakness => fx.apply_debuff(DebuffTarget::Damage, stats),
        TrapKind::Blindness => fx.apply_debuff(DebuffTarget::Light, stats),
        TrapKind::NoDash => fx.apply_debuff(DebuffTarget::Dash, stats),
        TrapKind::SummonHorrors => {
            let count = 3 + floor.min(3);
            out_summons.push(SummonRequest {
                kind: if rng.gen_bool(0.5) {
                    EnemyKind::Swarm
                } else {
                    EnemyKind::Chaser
                },
                position: player_pos,
                count,
            });
        }
        TrapKind::EnemyFrenzy => fx.enemy_frenzy_timer = 8.0,
        TrapKind::LightsOut => {
            fx.lights_out_timer = LIGHTS_OUT_DURATION;
            outbound.push(HostEvent::ScreenFlash { duration: 0.3 });
        }
        TrapKind::Panic => {
            fx.panic_timer = PANIC_DURATION;
            outbound.push(HostEvent::ScreenShake {
                strength: 5.0,
                duration: 0.4,
            });
        }
        TrapKind::LockDoors => fx.doors_locked_timer = DOORS_LOCKED_DURATION,
        TrapKind::EnemyHaste => fx.enemy_haste_timer = 8.0,
        TrapKind::DarkAmbush => {
            fx.lights_out_timer = LIGHTS_OUT_DURATION;
            out_summons.push(SummonRequest {
                kind: EnemyKind::Stalker,
                position: player_pos,
                count: 2,
            });
            outbound.push(HostEvent::ScreenFlash { duration: 0.3 });
        }
    }
}

/// Система: коллизия игрока со скрытыми ловушками текущей комнаты.
/// Максимум одна активация за тик (первая найденная).
pub fn check_trap_collision(
    mut dungeon: ResMut<Dungeon>,
    mut fx: ResMut<TrapEffects>,
    mut rng: ResMut<DeterministicRng>,
    mut outbound: ResMut<OutboundEvents>,
    mut out: ResMut<crate::enemy::ai::AiOutput>,
    mut player: Query<(&Position, &mut CombatStats), With<Player>>,
) {
    let Ok((pos, mut stats)) = player.single_mut() else {
        return;
    };
    let floor = dungeon.floor;
    let player_pos = pos.0;

    let Some(room) = dungeon.current_room_mut() else {
        return;
    };

    for trap in room.traps.iter_mut() {
        if trap.triggered {
            continue;
        }
        if Vec2::new(trap.x, trap.y).distance(player_pos) < TRAP_TRIGGER_RADIUS {
            trap.triggered = true;
            crate::log_info(&format!("💥 Trap triggered: {:?}", trap.kind));
            activate_trap(
                trap.kind,
                player_pos,
                floor,
                &mut fx,
                &mut stats,
                &mut rng.rng,
                &mut out.summons,
                &mut outbound,
            );
            break;
        }
    }
}

/// Система: тик таймеров эффектов (истечение дебаффов восстанавливает статы)
pub fn update_trap_effects(
    ctrl: Res<EngineControl>,
    mut fx: ResMut<TrapEffects>,
    mut player: Query<&mut CombatStats, With<Player>>,
) {
    let Ok(mut stats) = player.single_mut() else {
        return;
    };
    fx.tick(ctrl.dt, &mut stats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn stats() -> CombatStats {
        CombatStats::default()
    }

    #[test]
    fn test_debuff_restores_exact_original() {
        let mut fx = TrapEffects::default();
        let mut s = stats();
        s.move_speed_mult = 1.2345678;

        fx.apply_debuff(DebuffTarget::MoveSpeed, &mut s);
        assert!((s.move_speed_mult - 0.6172839).abs() < 1e-6);

        fx.tick(TRAP_DEBUFF_DURATION + 0.01, &mut s);
        assert_eq!(s.move_speed_mult, 1.2345678);
    }

    #[test]
    fn test_reapply_refreshes_without_stacking() {
        let mut fx = TrapEffects::default();
        let mut s = stats();
        s.damage_multiplier = 2.0;

        fx.apply_debuff(DebuffTarget::Damage, &mut s);
        assert!((s.damage_multiplier - 1.2).abs() < 1e-6);

        // Повторная активация того же типа: множитель не падает дальше
        fx.apply_debuff(DebuffTarget::Damage, &mut s);
        assert!((s.damage_multiplier - 1.2).abs() < 1e-6);

        fx.tick(TRAP_DEBUFF_DURATION + 0.01, &mut s);
        assert_eq!(s.damage_multiplier, 2.0);
    }

    #[test]
    fn test_reset_restores_all_immediately() {
        let mut fx = TrapEffects::default();
        let mut s = stats();
        fx.apply_debuff(DebuffTarget::MoveSpeed, &mut s);
        fx.apply_debuff(DebuffTarget::Damage, &mut s);
        fx.apply_debuff(DebuffTarget::Dash, &mut s);
        fx.lights_out_timer = 5.0;

        fx.reset(&mut s);
        assert_eq!(s.move_speed_mult, 1.0);
        assert_eq!(s.damage_multiplier, 1.0);
        assert!(!fx.no_dash_active());
        assert!(!fx.lights_out_active());
    }

    #[test]
    fn test_enemy_mults() {
        let mut fx = TrapEffects::default();
        assert_eq!(fx.enemy_speed_mult(), 1.0);
        fx.enemy_haste_timer = 1.0;
        assert!((fx.enemy_speed_mult() - 1.4).abs() < 1e-6);
        fx.enemy_frenzy_timer = 1.0;
        assert!((fx.enemy_speed_mult() - 1.6).abs() < 1e-6);
        assert!((fx.enemy_damage_mult() - 1.3).abs() < 1e-6);
    }

    #[test]
    fn test_trap_generation_only_in_trap_rooms() {
        let dims = ActiveDims::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(generate_hidden_traps(RoomKind::Normal, 1, &[], &mut rng, &dims).is_empty());

        let traps = generate_hidden_traps(RoomKind::Trap, 2, &[], &mut rng, &dims);
        // count = 2 + rand(0..=1) + min(2,3) → 4..=5
        assert!(traps.len() >= 4 && traps.len() <= 5);
        assert!(traps.iter().all(|t| !t.triggered));
    }

    #[test]
    fn test_trap_kinds_and_tiles_unique_per_room() {
        let dims = ActiveDims::default();
        for seed in 0..50u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let traps = generate_hidden_traps(RoomKind::Trap, 3, &[], &mut rng, &dims);
            assert!(!traps.is_empty());

            let mut kinds: Vec<u8> = traps.iter().map(|t| t.kind as u8).collect();
            kinds.sort_unstable();
            kinds.dedup();
            assert_eq!(kinds.len(), traps.len(), "seed {}: повтор типа ловушки", seed);

            let mut tiles: Vec<(i32, i32)> = traps.iter().map(|t| tile_key(t.x, t.y)).collect();
            tiles.sort_unstable();
            tiles.dedup();
            assert_eq!(tiles.len(), traps.len(), "seed {}: две ловушки в одном тайле", seed);
        }
    }

    #[test]
    fn test_summon_trap_emits_request() {
        let mut fx = TrapEffects::default();
        let mut s = stats();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut summons = Vec::new();
        let mut outbound = OutboundEvents::default();

        activate_trap(
            TrapKind::SummonHorrors,
            Vec2::new(300.0, 300.0),
            2,
            &mut fx,
            &mut s,
            &mut rng,
            &mut summons,
            &mut outbound,
        );
        assert_eq!(summons.len(), 1);
        assert_eq!(summons[0].count, 5); // 3 + min(2,3)
    }
}
