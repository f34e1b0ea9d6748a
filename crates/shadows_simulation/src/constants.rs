//! Игровые константы и активные размеры комнаты
//!
//! Все tunables в одном месте (скорости, урон, дистанции AI, размеры данжа).
//! `ActiveDims` — resource с фактическими размерами комнаты, пересчитывается
//! под aspect ratio экрана хоста (одна из осей растягивается от базовой).

use bevy::prelude::*;

// --- Геометрия комнаты ---
pub const TILE_SIZE: f32 = 40.0;
pub const BASE_GAME_WIDTH: f32 = 960.0;
pub const BASE_GAME_HEIGHT: f32 = 640.0;
/// Максимальный aspect, дальше не растягиваем (ultra-wide ломает баланс дистанций)
pub const MAX_ASPECT: f32 = 2.4;

// --- Тайминг ---
pub const FIXED_HZ: f64 = 60.0;
/// Clamp дельты на кадр (tab-switch / stutter не должны взрывать физику)
pub const MAX_FRAME_DT: f32 = 0.05;
pub const AUTOSAVE_INTERVAL: f32 = 30.0;

// --- Игрок ---
pub const PLAYER_RADIUS: f32 = 14.0;
pub const PLAYER_BASE_SPEED: f32 = 220.0;
/// Diminishing returns: множители скорости выше этого порога режутся
pub const SPEED_SOFT_CAP: f32 = 1.5;
pub const SPEED_SOFT_FACTOR: f32 = 0.4;
pub const SPEED_HARD_CAP: f32 = 520.0;
pub const PLAYER_BASE_HP: f32 = 100.0;
pub const PLAYER_LIGHT_RADIUS: f32 = 140.0;
pub const LIGHTS_OUT_RADIUS: f32 = 60.0;

pub const DASH_SPEED: f32 = 700.0;
pub const DASH_DURATION: f32 = 0.16;
pub const DASH_COOLDOWN: f32 = 1.1;

pub const MELEE_RANGE: f32 = 68.0;
pub const MELEE_ARC: f32 = 2.0; // радианы, полная ширина дуги
pub const MELEE_COOLDOWN: f32 = 0.42;
pub const MELEE_SWING_SLOW: f32 = 0.1; // первые 0.1s замаха скорость вдвое
pub const COMBO_WINDOW: f32 = 2.0;
pub const RANGED_COOLDOWN: f32 = 0.55;
pub const PROJECTILE_SPEED: f32 = 420.0;
pub const PROJECTILE_LIFETIME: f32 = 1.6;
pub const VOLLEY_FAN_STEP: f32 = 0.09; // радианы между снарядами залпа

pub const CHAIN_BOUNCE_RANGE: f32 = 80.0;
pub const CHAIN_BOUNCE_FALLOFF: f32 = 0.6;
pub const EXPLOSIVE_RADIUS: f32 = 30.0;
pub const EXPLOSIVE_FACTOR: f32 = 0.5;
pub const BERSERK_THRESHOLD: f32 = 0.3;
pub const BERSERK_MULT: f32 = 1.8;
pub const DOOM_THRESHOLD: f32 = 0.15;
pub const REVIVE_HP_FRACTION: f32 = 0.3;

// --- Враги (общее) ---
pub const SPAWN_GRACE: f32 = 0.8;
pub const HIT_FLASH: f32 = 0.12;
pub const KNOCKBACK_IMPULSE: f32 = 30.0;
/// Экспоненциальный распад knockback: v *= 0.05^dt
pub const KNOCKBACK_DECAY_BASE: f32 = 0.05;
pub const KNOCKBACK_EPSILON: f32 = 0.5;
pub const SEPARATION_FACTOR: f32 = 0.7;

// --- Дистанции поведений ---
pub const TANK_CHARGE_DIST: f32 = 180.0;
pub const TANK_CHARGE_TIME: f32 = 0.6;
pub const TANK_CHARGE_SPEED: f32 = 480.0;
pub const TANK_COOLDOWN: f32 = 1.2;

pub const WRAITH_PHASE_SPEED_MULT: f32 = 1.5;
pub const WRAITH_PHASE_WINDOW: f32 = 1.5;

pub const BOMBER_FUSE_DIST: f32 = 120.0;
pub const BOMBER_FUSE_TIME: f32 = 1.5;
pub const BOMBER_RUSH_SPEED: f32 = 380.0;
pub const BOMBER_DETONATE_DIST: f32 = 12.0;
pub const BOMBER_BLAST_RADIUS: f32 = 50.0;

pub const NECRO_ORBIT_NEAR: f32 = 100.0;
pub const NECRO_ORBIT_FAR: f32 = 160.0;
pub const NECRO_SUMMON_COOLDOWN: f32 = 6.0;

pub const STALKER_STEALTH_ALPHA: f32 = 0.05;
pub const STALKER_LUNGE_DIST: f32 = 130.0;
pub const STALKER_LUNGE_SPEED: f32 = 520.0;
pub const STALKER_LUNGE_TIME: f32 = 0.35;
pub const STALKER_LUNGE_COOLDOWN: f32 = 3.0;

pub const FLASH_CHARGE_TIME: f32 = 0.15;
pub const FLASH_CHARGE_SPEED: f32 = 620.0;

pub const SHOOTER_PREFERRED_RANGE: f32 = 240.0;
pub const SHOOTER_RETREAT_RANGE: f32 = 140.0;
pub const SHOOTER_FIRE_COOLDOWN: f32 = 1.8;

pub const WARPER_TELEPORT_INTERVAL: f32 = 2.2;
pub const ACCELERATOR_LIGHT_MULT: f32 = 6.0;

// --- Данж ---
pub const MIN_ROOMS: u32 = 8;
pub const MAX_ROOMS: u32 = 12;
pub const WALK_MAX_ATTEMPTS: u32 = 200;
pub const OBSTACLE_MAX_RETRIES: u32 = 15;
pub const SPAWN_REROLL_FACTOR: u32 = 3;
pub const DOOR_WIDTH: f32 = TILE_SIZE * 2.0;
/// Порог срабатывания перехода через дверь (от центра двери)
pub const DOOR_THRESHOLD: f32 = 26.0;

// --- Ловушки ---
pub const TRAP_TRIGGER_RADIUS: f32 = TILE_SIZE * 0.7;
pub const TRAP_PLACE_RETRIES: u32 = 30;
pub const TRAP_DEBUFF_DURATION: f32 = 6.0;
pub const LIGHTS_OUT_DURATION: f32 = 8.0;
pub const PANIC_DURATION: f32 = 5.0;
pub const DOORS_LOCKED_DURATION: f32 = 10.0;

// --- Прогрессия ---
pub const XP_BASE: f32 = 30.0;
pub const XP_GROWTH: f32 = 1.4;
pub const FLOOR_HP_SCALE: f32 = 0.3;
pub const FLOOR_DMG_SCALE: f32 = 0.2;
pub const FLOOR_SPEED_SCALE: f32 = 0.05;

/// Босс этого этажа — финальный: его смерть даёт победу вместо спуска
pub const FINAL_FLOOR: u32 = 3;

// --- Сценарии босса / победы ---
pub const BOSS_INTRO_TIME: f32 = 2.2;
pub const VICTORY_COUNTDOWN: f32 = 5.0;
pub const BOSS_KILL_SLOWMO: f32 = 0.25;
pub const BOSS_KILL_SLOWMO_TIME: f32 = 1.4;
pub const MELEE_KILL_HEAL: f32 = 2.0;
pub const MELEE_KILL_SPEED_BURST: f32 = 0.15;
pub const MELEE_KILL_BURST_TIME: f32 = 1.2;

/// Активные размеры комнаты (resource)
///
/// Хост сообщает aspect ratio экрана; одна из осей растягивается от базовой
/// константы, вторая остаётся базовой. Инвариант: gw ≥ BASE_GAME_WIDTH,
/// gh ≥ BASE_GAME_HEIGHT, ровно одна ось может превышать базу.
#[derive(Resource, Debug, Clone, Copy)]
pub struct ActiveDims {
    pub gw: f32,
    pub gh: f32,
}

impl Default for ActiveDims {
    fn default() -> Self {
        Self {
            gw: BASE_GAME_WIDTH,
            gh: BASE_GAME_HEIGHT,
        }
    }
}

impl ActiveDims {
    /// Пересчёт под aspect экрана (w/h в пикселях CSS, значения не важны — только ratio)
    pub fn set_aspect(&mut self, screen_w: f32, screen_h: f32) {
        if screen_w <= 0.0 || screen_h <= 0.0 {
            return;
        }
        let aspect = (screen_w / screen_h).clamp(1.0 / MAX_ASPECT, MAX_ASPECT);
        let base_aspect = BASE_GAME_WIDTH / BASE_GAME_HEIGHT;
        if aspect >= base_aspect {
            // Шире базы — растягиваем ширину
            self.gw = BASE_GAME_HEIGHT * aspect;
            self.gh = BASE_GAME_HEIGHT;
        } else {
            // Уже базы — растягиваем высоту
            self.gw = BASE_GAME_WIDTH;
            self.gh = BASE_GAME_WIDTH / aspect;
        }
    }

    /// Clamp позиции к внутренней зоне комнаты (отступ = стена + радиус тела)
    pub fn clamp_to_interior(&self, pos: Vec2, radius: f32) -> Vec2 {
        let margin = TILE_SIZE + radius;
        Vec2::new(
            pos.x.clamp(margin, self.gw - margin),
            pos.y.clamp(margin, self.gh - margin),
        )
    }

    /// Центр комнаты
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.gw * 0.5, self.gh * 0.5)
    }

    /// Сетка тайлов (колонки, строки)
    pub fn tile_grid(&self) -> (usize, usize) {
        (
            (self.gw / TILE_SIZE).round() as usize,
            (self.gh / TILE_SIZE).round() as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_wider_extends_width() {
        let mut dims = ActiveDims::default();
        dims.set_aspect(1920.0, 800.0); // aspect 2.4
        assert_eq!(dims.gh, BASE_GAME_HEIGHT);
        assert!(dims.gw > BASE_GAME_WIDTH);
    }

    #[test]
    fn test_aspect_taller_extends_height() {
        let mut dims = ActiveDims::default();
        dims.set_aspect(800.0, 1200.0);
        assert_eq!(dims.gw, BASE_GAME_WIDTH);
        assert!(dims.gh > BASE_GAME_HEIGHT);
    }

    #[test]
    fn test_clamp_to_interior() {
        let dims = ActiveDims::default();
        let clamped = dims.clamp_to_interior(Vec2::new(-50.0, 10_000.0), PLAYER_RADIUS);
        assert_eq!(clamped.x, TILE_SIZE + PLAYER_RADIUS);
        assert_eq!(clamped.y, dims.gh - TILE_SIZE - PLAYER_RADIUS);
    }

    #[test]
    fn test_zero_aspect_ignored() {
        let mut dims = ActiveDims::default();
        dims.set_aspect(0.0, 0.0);
        assert_eq!(dims.gw, BASE_GAME_WIDTH);
        assert_eq!(dims.gh, BASE_GAME_HEIGHT);
    }
}
