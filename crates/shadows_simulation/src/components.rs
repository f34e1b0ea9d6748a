//! Базовые ECS компоненты симуляции
//!
//! 2D top-down мир: позиции в пикселях комнаты, ось Y вниз (canvas-координаты
//! хоста). Все компоненты table storage для детерминизма.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{KNOCKBACK_DECAY_BASE, KNOCKBACK_EPSILON};

/// Позиция в координатах текущей комнаты (пиксели)
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Position(pub Vec2);

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self(Vec2::new(x, y))
    }
}

impl Default for Position {
    fn default() -> Self {
        Self(Vec2::ZERO)
    }
}

/// Скорость (пиксели/сек), чистая кинематика — ускорений нет
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct Velocity(pub Vec2);

/// Здоровье
///
/// Инвариант: 0 ≤ current ≤ max
#[derive(Component, Debug, Clone, Copy, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            self.current / self.max
        }
    }

    pub fn take_damage(&mut self, amount: f32) {
        self.current = (self.current - amount).max(0.0);
    }

    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount).min(self.max);
    }

    /// Поднять максимум, текущее растёт на ту же величину
    pub fn raise_max(&mut self, amount: f32) {
        self.max += amount;
        self.current = (self.current + amount).min(self.max);
    }
}

/// Импульс отбрасывания, распадается экспоненциально
///
/// v *= KNOCKBACK_DECAY_BASE^dt, ниже KNOCKBACK_EPSILON зануляется
/// (иначе хвост микродвижения живёт вечно).
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct Knockback(pub Vec2);

impl Knockback {
    pub fn impulse(&mut self, kx: f32, ky: f32) {
        self.0.x += kx;
        self.0.y += ky;
    }

    pub fn decay(&mut self, dt: f32) {
        let factor = KNOCKBACK_DECAY_BASE.powf(dt);
        self.0 *= factor;
        if self.0.x.abs() < KNOCKBACK_EPSILON {
            self.0.x = 0.0;
        }
        if self.0.y.abs() < KNOCKBACK_EPSILON {
            self.0.y = 0.0;
        }
    }
}

/// Окно неуязвимости после спавна: пока > 0 — враг не коллайдится
/// и не получает урон
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct SpawnGrace(pub f32);

impl SpawnGrace {
    pub fn active(&self) -> bool {
        self.0 > 0.0
    }

    pub fn tick(&mut self, dt: f32) {
        self.0 = (self.0 - dt).max(0.0);
    }
}

/// Кольцевой буфер следа для рендера хоста (ограничен по длине)
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Trail {
    pub points: Vec<Vec2>,
    pub cap: usize,
}

impl Trail {
    pub fn new(cap: usize) -> Self {
        Self {
            points: Vec::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, point: Vec2) {
        self.points.push(point);
        if self.points.len() > self.cap {
            self.points.remove(0);
        }
    }
}

impl Default for Trail {
    fn default() -> Self {
        Self::new(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage_clamps_at_zero() {
        let mut health = Health::new(100.0);
        health.take_damage(30.0);
        assert_eq!(health.current, 70.0);
        assert!(health.is_alive());

        health.take_damage(500.0);
        assert_eq!(health.current, 0.0);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_health_heal_clamps_at_max() {
        let mut health = Health::new(100.0);
        health.take_damage(50.0);
        health.heal(30.0);
        assert_eq!(health.current, 80.0);

        health.heal(100.0);
        assert_eq!(health.current, 100.0);
    }

    #[test]
    fn test_health_raise_max() {
        let mut health = Health::new(100.0);
        health.take_damage(40.0);
        health.raise_max(20.0);
        assert_eq!(health.max, 120.0);
        assert_eq!(health.current, 80.0);
    }

    #[test]
    fn test_knockback_decay_snaps_to_zero() {
        let mut kb = Knockback(Vec2::new(30.0, -30.0));
        // Несколько секунд распада: 0.05^3 ≈ 1.25e-4, хвост должен занулиться
        kb.decay(3.0);
        assert_eq!(kb.0, Vec2::ZERO);
    }

    #[test]
    fn test_knockback_decay_partial() {
        let mut kb = Knockback(Vec2::new(100.0, 0.0));
        kb.decay(0.5);
        // 0.05^0.5 ≈ 0.2236
        assert!((kb.0.x - 22.36).abs() < 0.1);
    }

    #[test]
    fn test_trail_bounded() {
        let mut trail = Trail::new(8);
        for i in 0..20 {
            trail.push(Vec2::new(i as f32, 0.0));
        }
        assert_eq!(trail.points.len(), 8);
        assert_eq!(trail.points[0].x, 12.0); // старые выталкиваются
    }

    #[test]
    fn test_spawn_grace_ticks_down() {
        let mut grace = SpawnGrace(0.5);
        assert!(grace.active());
        grace.tick(0.3);
        assert!(grace.active());
        grace.tick(0.3);
        assert!(!grace.active());
        assert_eq!(grace.0, 0.0);
    }
}
