//! Игрок: статы, прогрессия, кулдауны, движение
//!
//! ECS ответственность:
//! - Game state: CombatStats, Level, Abilities, Cooldowns
//! - Движение: скорость из композиции множителей с diminishing returns,
//!   dash с окном неуязвимости, clamp к интерьеру комнаты
//!
//! Хост пишет `PlayerInput` (resource) перед тиком; системы читают и
//! сбрасывают one-shot нажатия.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{Health, Position, Trail, Velocity};
use crate::constants::*;
use crate::dungeon::traps::TrapEffects;
use crate::engine::EngineControl;
use crate::events::{CueKind, OutboundEvents};

/// Маркер игрока (одна сущность на забег)
#[derive(Component, Debug, Default, Reflect)]
#[reflect(Component)]
pub struct Player;

/// Боевые статы игрока. Мутируются апгрейдами, амулетами и ловушками;
/// ловушки обязаны восстанавливать исходные значения бит-в-бит (см. traps).
#[derive(Component, Debug, Clone, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct CombatStats {
    pub base_damage: f32,
    pub projectile_damage: f32,
    pub projectile_count: u32,
    pub attack_speed_mult: f32,
    pub move_speed_mult: f32,
    pub damage_multiplier: f32,
    pub area_multiplier: f32,
    pub armor: f32,
    pub crit_chance: f32,
    pub crit_multiplier: f32,
    /// Доля хила от урона при добивании (kill reward)
    pub lifesteal: f32,
    pub piercing: bool,
    pub explosive: bool,
    pub chain_bounces: u32,
    pub thorns: f32,
    pub berserker: bool,
    pub xp_multiplier: f32,
    pub souls_multiplier: f32,
    pub hp_regen: f32,
    /// Временные множители от амулетов (отдельно от апгрейдных — проще снять)
    pub amulet_damage_mult: f32,
    pub amulet_speed_mult: f32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            base_damage: 12.0,
            projectile_damage: 8.0,
            projectile_count: 1,
            attack_speed_mult: 1.0,
            move_speed_mult: 1.0,
            damage_multiplier: 1.0,
            area_multiplier: 1.0,
            armor: 0.0,
            crit_chance: 0.05,
            crit_multiplier: 2.0,
            lifesteal: 0.0,
            piercing: false,
            explosive: false,
            chain_bounces: 0,
            thorns: 0.0,
            berserker: false,
            xp_multiplier: 1.0,
            souls_multiplier: 1.0,
            hp_regen: 0.0,
            amulet_damage_mult: 1.0,
            amulet_speed_mult: 1.0,
        }
    }
}

impl CombatStats {
    /// Композиция множителей скорости с diminishing returns выше soft cap
    pub fn speed_multiplier(&self, burst: f32) -> f32 {
        let raw = self.move_speed_mult * self.amulet_speed_mult * (1.0 + burst);
        if raw > SPEED_SOFT_CAP {
            SPEED_SOFT_CAP + (raw - SPEED_SOFT_CAP) * SPEED_SOFT_FACTOR
        } else {
            raw
        }
    }
}

/// Прогрессия забега
#[derive(Component, Debug, Clone, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct Level {
    pub xp: f32,
    pub xp_to_next: f32,
    pub level: u32,
}

impl Default for Level {
    fn default() -> Self {
        Self {
            xp: 0.0,
            xp_to_next: XP_BASE,
            level: 1,
        }
    }
}

impl Level {
    /// Начисляет xp; возвращает true ровно один раз на пересечение границы.
    /// Остаток переносится; следующий вызов может пересечь снова.
    pub fn add_xp(&mut self, amount: f32) -> bool {
        self.xp += amount;
        if self.xp >= self.xp_to_next {
            self.xp -= self.xp_to_next;
            self.level += 1;
            self.xp_to_next = (XP_BASE * XP_GROWTH.powi(self.level as i32 - 1)).floor();
            true
        } else {
            false
        }
    }
}

/// Кулдауны и таймеры игрока
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct Cooldowns {
    pub dash: f32,
    pub melee: f32,
    pub ranged: f32,
    pub invincibility: f32,
    /// Окно комбо: по истечении шаг сбрасывается на 1
    pub combo_window: f32,
    /// Шаг комбо ∈ {1,2,3,4}, циклится
    pub combo_step: u8,
    /// Первые MELEE_SWING_SLOW секунды замаха скорость вдвое
    pub swing_slow: f32,
    /// Остаток dash-рывка (скорость DASH_SPEED вдоль dash_dir)
    pub dash_time: f32,
    pub dash_dir: Vec2,
}

impl Cooldowns {
    pub fn tick(&mut self, dt: f32) {
        self.dash = (self.dash - dt).max(0.0);
        self.melee = (self.melee - dt).max(0.0);
        self.ranged = (self.ranged - dt).max(0.0);
        self.invincibility = (self.invincibility - dt).max(0.0);
        self.swing_slow = (self.swing_slow - dt).max(0.0);
        self.dash_time = (self.dash_time - dt).max(0.0);
        if self.combo_window > 0.0 {
            self.combo_window -= dt;
            if self.combo_window <= 0.0 {
                self.combo_window = 0.0;
                self.combo_step = 0;
            }
        }
    }

    /// Следующий шаг комбо: 1→2→3→4→1
    pub fn advance_combo(&mut self) -> u8 {
        self.combo_step = if self.combo_step >= 4 { 1 } else { self.combo_step + 1 };
        self.combo_window = COMBO_WINDOW;
        self.combo_step
    }
}

/// Флаги способностей и временные бафы
#[derive(Component, Debug, Clone, Default, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct Abilities {
    pub shadow_clone: bool,
    #[serde(skip)]
    pub clone_attack_timer: f32,
    #[serde(skip)]
    pub clone_angle: f32,
    pub has_revive: bool,
    pub revive_used: bool,
    pub doom_execute: bool,
    /// Аддитивный временный бонус скорости (melee-kill burst). Аддитивность
    /// вместо мутации move_speed_mult исключает дрейф при наложении.
    #[serde(skip)]
    pub speed_burst: f32,
    #[serde(skip)]
    pub speed_burst_timer: f32,
}

/// Стаки War Rhythm (амулет): урон растёт от убийств, распадается вне боя
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct WarRhythm {
    pub stacks: u32,
    pub decay_timer: f32,
}

impl WarRhythm {
    pub const MAX_STACKS: u32 = 8;
    pub const DAMAGE_PER_STACK: f32 = 0.04;
    pub const DECAY_AFTER: f32 = 4.0;

    pub fn on_kill(&mut self) {
        self.stacks = (self.stacks + 1).min(Self::MAX_STACKS);
        self.decay_timer = Self::DECAY_AFTER;
    }

    pub fn damage_bonus(&self) -> f32 {
        1.0 + self.stacks as f32 * Self::DAMAGE_PER_STACK
    }

    pub fn tick(&mut self, dt: f32) {
        if self.stacks == 0 {
            return;
        }
        self.decay_timer -= dt;
        if self.decay_timer <= 0.0 {
            self.stacks -= 1;
            self.decay_timer = 1.0; // дальше теряем по стаку в секунду
        }
    }
}

/// Ввод от хоста. move_dir — зажатая ось, остальное — one-shot нажатия,
/// сбрасываются потребившей системой.
#[derive(Resource, Debug, Clone, Default)]
pub struct PlayerInput {
    pub move_dir: Vec2,
    /// Точка прицеливания в координатах комнаты
    pub aim: Vec2,
    pub melee_pressed: bool,
    pub ranged_pressed: bool,
    pub dash_pressed: bool,
    pub interact_pressed: bool,
}

/// Сущность игрока (lookup для фасада и систем без Query)
#[derive(Resource, Debug, Clone, Copy)]
pub struct PlayerEntity(pub Entity);

/// Полный набор компонентов игрока
pub fn player_bundle(position: Vec2) -> impl Bundle {
    (
        Player,
        Position(position),
        Velocity::default(),
        Health::new(PLAYER_BASE_HP),
        CombatStats::default(),
        Level::default(),
        Cooldowns::default(),
        Abilities::default(),
        WarRhythm::default(),
        Trail::new(8),
    )
}

/// Spawn helper: полный набор компонентов игрока
pub fn spawn_player(commands: &mut Commands, position: Vec2) -> Entity {
    commands.spawn(player_bundle(position)).id()
}

/// Система: тик кулдаунов игрока
pub fn tick_player_cooldowns(
    ctrl: Res<EngineControl>,
    mut query: Query<(&mut Cooldowns, &mut Abilities, &mut WarRhythm), With<Player>>,
) {
    let dt = ctrl.dt;
    for (mut cooldowns, mut abilities, mut rhythm) in query.iter_mut() {
        cooldowns.tick(dt);
        rhythm.tick(dt);
        if abilities.speed_burst_timer > 0.0 {
            abilities.speed_burst_timer -= dt;
            if abilities.speed_burst_timer <= 0.0 {
                abilities.speed_burst_timer = 0.0;
                abilities.speed_burst = 0.0;
            }
        }
    }
}

/// Система: движение игрока + dash
///
/// Скорость = база × композиция множителей (см. CombatStats::speed_multiplier),
/// hard cap, вдвое ниже в начале замаха. Позиция clamp-ится к интерьеру.
pub fn player_movement(
    ctrl: Res<EngineControl>,
    dims: Res<crate::constants::ActiveDims>,
    trap_fx: Res<TrapEffects>,
    mut input: ResMut<PlayerInput>,
    mut outbound: ResMut<OutboundEvents>,
    mut query: Query<
        (
            &mut Position,
            &mut Velocity,
            &mut Cooldowns,
            &CombatStats,
            &Abilities,
            &mut Trail,
        ),
        With<Player>,
    >,
) {
    let dt = ctrl.dt;
    let Ok((mut pos, mut vel, mut cooldowns, stats, abilities, mut trail)) =
        query.single_mut()
    else {
        return;
    };

    // Dash request: гейт по кулдауну и trap-эффекту no_dash
    if input.dash_pressed {
        input.dash_pressed = false;
        if cooldowns.dash <= 0.0 && !trap_fx.no_dash_active() {
            let dir = if input.move_dir.length_squared() > 0.01 {
                input.move_dir.normalize()
            } else {
                let to_aim = input.aim - pos.0;
                if to_aim.length_squared() > 0.01 {
                    to_aim.normalize()
                } else {
                    Vec2::X
                }
            };
            cooldowns.dash = DASH_COOLDOWN;
            cooldowns.dash_time = DASH_DURATION;
            cooldowns.dash_dir = dir;
            // Неуязвимость на время рывка
            cooldowns.invincibility = cooldowns.invincibility.max(DASH_DURATION);
            outbound.cue(CueKind::Dash);
        }
    }

    if cooldowns.dash_time > 0.0 {
        vel.0 = cooldowns.dash_dir * DASH_SPEED;
    } else {
        let mut speed = PLAYER_BASE_SPEED * stats.speed_multiplier(abilities.speed_burst);
        speed = speed.min(SPEED_HARD_CAP);
        if cooldowns.swing_slow > 0.0 {
            // Вес замаха
            speed *= 0.5;
        }
        vel.0 = if input.move_dir.length_squared() > 0.01 {
            input.move_dir.normalize() * speed
        } else {
            Vec2::ZERO
        };
    }

    pos.0 += vel.0 * dt;
    pos.0 = dims.clamp_to_interior(pos.0, PLAYER_RADIUS);

    if vel.0.length_squared() > 1.0 {
        trail.push(pos.0);
    }
}

/// Система: пассивный реген (апгрейд)
pub fn player_regen(
    ctrl: Res<EngineControl>,
    mut query: Query<(&CombatStats, &mut Health), With<Player>>,
) {
    let dt = ctrl.dt;
    for (stats, mut health) in query.iter_mut() {
        if stats.hp_regen > 0.0 && health.is_alive() {
            health.heal(stats.hp_regen * dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_xp_boundary_crossed_once() {
        let mut level = Level::default();
        // xp_to_next = 30 на уровне 1
        assert!(!level.add_xp(29.0));
        assert_eq!(level.level, 1);

        assert!(level.add_xp(1.0));
        assert_eq!(level.level, 2);
        assert_eq!(level.xp, 0.0);
        // floor(30 × 1.4^1) = 42
        assert_eq!(level.xp_to_next, 42.0);
    }

    #[test]
    fn test_add_xp_carries_remainder() {
        let mut level = Level::default();
        assert!(level.add_xp(40.0));
        assert_eq!(level.level, 2);
        assert_eq!(level.xp, 10.0);
    }

    #[test]
    fn test_xp_curve() {
        let mut level = Level::default();
        level.level = 3;
        level.add_xp(0.0);
        // Кривая пересчитывается только на пересечении; проверяем формулу напрямую
        let expected = (XP_BASE * XP_GROWTH.powi(2)).floor();
        assert_eq!(expected, 58.0); // 30 × 1.96 = 58.8 → 58
    }

    #[test]
    fn test_combo_cycles_1_2_3_4_1() {
        let mut cd = Cooldowns::default();
        assert_eq!(cd.advance_combo(), 1);
        assert_eq!(cd.advance_combo(), 2);
        assert_eq!(cd.advance_combo(), 3);
        assert_eq!(cd.advance_combo(), 4);
        assert_eq!(cd.advance_combo(), 1);
    }

    #[test]
    fn test_combo_resets_after_window() {
        let mut cd = Cooldowns::default();
        cd.advance_combo();
        cd.advance_combo();
        assert_eq!(cd.combo_step, 2);
        cd.tick(COMBO_WINDOW + 0.1);
        assert_eq!(cd.combo_step, 0);
        assert_eq!(cd.advance_combo(), 1);
    }

    #[test]
    fn test_speed_diminishing_returns() {
        let mut stats = CombatStats::default();
        stats.move_speed_mult = 2.0;
        // raw 2.0 > 1.5 → 1.5 + 0.5×0.4 = 1.7
        assert!((stats.speed_multiplier(0.0) - 1.7).abs() < 1e-6);

        stats.move_speed_mult = 1.2;
        assert!((stats.speed_multiplier(0.0) - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_war_rhythm_caps_and_decays() {
        let mut rhythm = WarRhythm::default();
        for _ in 0..20 {
            rhythm.on_kill();
        }
        assert_eq!(rhythm.stacks, WarRhythm::MAX_STACKS);

        rhythm.tick(WarRhythm::DECAY_AFTER + 0.01);
        assert_eq!(rhythm.stacks, WarRhythm::MAX_STACKS - 1);
    }
}
