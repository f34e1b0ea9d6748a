//! Враги: таблица типов, фабрика с поэтажным скейлингом, нанесение урона
//!
//! ~15 типов + боссы. Базовые статы — статическая таблица; фабрика
//! масштабирует hp/damage/speed по номеру этажа. AI-автоматы в `ai`,
//! скриптованные боссы в `boss`.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{Health, Knockback, Position, SpawnGrace};
use crate::constants::*;

pub mod ai;
pub mod boss;

pub use ai::EnemyAi;
pub use boss::{BossAction, BossScript, PendingBossAction};

/// Тип врага. Вся диспетчеризация поведения — exhaustive match по этому enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum EnemyKind {
    Chaser,
    Shooter,
    Tank,
    Wraith,
    Bomber,
    Swarm,
    Necromancer,
    Stalker,
    FlashHunter,
    Distortion,
    FlickerFiend,
    Warper,
    Accelerator,
    Brute,
    Spitter,
    Boss,
}

/// Базовые статы типа (до поэтажного скейлинга)
#[derive(Debug, Clone, Copy)]
pub struct EnemyTemplate {
    pub hp: f32,
    pub speed: f32,
    pub damage: f32,
    pub radius: f32,
    pub xp: u32,
    pub souls_min: u32,
    pub souls_max: u32,
}

impl EnemyKind {
    pub const ALL_REGULAR: [EnemyKind; 15] = [
        EnemyKind::Chaser,
        EnemyKind::Shooter,
        EnemyKind::Tank,
        EnemyKind::Wraith,
        EnemyKind::Bomber,
        EnemyKind::Swarm,
        EnemyKind::Necromancer,
        EnemyKind::Stalker,
        EnemyKind::FlashHunter,
        EnemyKind::Distortion,
        EnemyKind::FlickerFiend,
        EnemyKind::Warper,
        EnemyKind::Accelerator,
        EnemyKind::Brute,
        EnemyKind::Spitter,
    ];

    pub fn template(&self) -> EnemyTemplate {
        match self {
            EnemyKind::Chaser => EnemyTemplate {
                hp: 30.0,
                speed: 120.0,
                damage: 8.0,
                radius: 13.0,
                xp: 6,
                souls_min: 1,
                souls_max: 2,
            },
            EnemyKind::Shooter => EnemyTemplate {
                hp: 26.0,
                speed: 95.0,
                damage: 7.0,
                radius: 12.0,
                xp: 8,
                souls_min: 1,
                souls_max: 3,
            },
            EnemyKind::Tank => EnemyTemplate {
                hp: 85.0,
                speed: 70.0,
                damage: 16.0,
                radius: 19.0,
                xp: 14,
                souls_min: 2,
                souls_max: 4,
            },
            EnemyKind::Wraith => EnemyTemplate {
                hp: 34.0,
                speed: 105.0,
                damage: 10.0,
                radius: 13.0,
                xp: 11,
                souls_min: 2,
                souls_max: 3,
            },
            EnemyKind::Bomber => EnemyTemplate {
                hp: 24.0,
                speed: 110.0,
                damage: 25.0,
                radius: 12.0,
                xp: 9,
                souls_min: 1,
                souls_max: 3,
            },
            EnemyKind::Swarm => EnemyTemplate {
                hp: 10.0,
                speed: 170.0,
                damage: 4.0,
                radius: 8.0,
                xp: 3,
                souls_min: 0,
                souls_max: 1,
            },
            EnemyKind::Necromancer => EnemyTemplate {
                hp: 40.0,
                speed: 85.0,
                damage: 6.0,
                radius: 14.0,
                xp: 16,
                souls_min: 3,
                souls_max: 5,
            },
            EnemyKind::Stalker => EnemyTemplate {
                hp: 28.0,
                speed: 75.0,
                damage: 14.0,
                radius: 12.0,
                xp: 12,
                souls_min: 2,
                souls_max: 4,
            },
            EnemyKind::FlashHunter => EnemyTemplate {
                hp: 22.0,
                speed: 100.0,
                damage: 12.0,
                radius: 11.0,
                xp: 12,
                souls_min: 2,
                souls_max: 4,
            },
            EnemyKind::Distortion => EnemyTemplate {
                hp: 55.0,
                speed: 55.0,
                damage: 18.0,
                radius: 16.0,
                xp: 15,
                souls_min: 2,
                souls_max: 5,
            },
            EnemyKind::FlickerFiend => EnemyTemplate {
                hp: 26.0,
                speed: 130.0,
                damage: 9.0,
                radius: 11.0,
                xp: 11,
                souls_min: 2,
                souls_max: 3,
            },
            EnemyKind::Warper => EnemyTemplate {
                hp: 30.0,
                speed: 45.0,
                damage: 11.0,
                radius: 12.0,
                xp: 13,
                souls_min: 2,
                souls_max: 4,
            },
            EnemyKind::Accelerator => EnemyTemplate {
                hp: 20.0,
                speed: 40.0,
                damage: 10.0,
                radius: 11.0,
                xp: 10,
                souls_min: 1,
                souls_max: 3,
            },
            EnemyKind::Brute => EnemyTemplate {
                hp: 120.0,
                speed: 55.0,
                damage: 22.0,
                radius: 22.0,
                xp: 20,
                souls_min: 3,
                souls_max: 6,
            },
            EnemyKind::Spitter => EnemyTemplate {
                hp: 32.0,
                speed: 80.0,
                damage: 9.0,
                radius: 13.0,
                xp: 10,
                souls_min: 1,
                souls_max: 3,
            },
            EnemyKind::Boss => EnemyTemplate {
                hp: 600.0,
                speed: 90.0,
                damage: 20.0,
                radius: 30.0,
                xp: 120,
                souls_min: 25,
                souls_max: 40,
            },
        }
    }
}

/// Компонент врага: тип + рантайм-скаляры после поэтажного скейлинга
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Enemy {
    pub kind: EnemyKind,
    pub speed: f32,
    pub damage: f32,
    pub radius: f32,
    pub xp: u32,
    pub souls_min: u32,
    pub souls_max: u32,
    /// Таймер hit-flash (рендер хоста)
    pub flash: f32,
    /// Фазовый аккумулятор синусоидального движения
    pub wobble: f32,
    /// Прозрачность для рендера (stealth/фазы); геймплейно значима только
    /// для flicker fiend (intangible) и accelerator (подсветка)
    pub alpha: f32,
}

/// Поэтажный скейлинг шаблона. hp округляется вниз до целого
/// (floor 3, chaser: 30 × 1.6 = 48).
pub fn scale_for_floor(template: &EnemyTemplate, floor: u32) -> EnemyTemplate {
    let f = floor.max(1) as f32 - 1.0;
    EnemyTemplate {
        hp: (template.hp * (1.0 + FLOOR_HP_SCALE * f)).floor(),
        damage: template.damage * (1.0 + FLOOR_DMG_SCALE * f),
        speed: template.speed * (1.0 + FLOOR_SPEED_SCALE * f),
        ..*template
    }
}

/// Spawn helper: полная сущность врага с AI-автоматом и spawn grace
pub fn spawn_enemy(
    commands: &mut Commands,
    kind: EnemyKind,
    position: Vec2,
    floor: u32,
) -> Entity {
    let template = scale_for_floor(&kind.template(), floor);
    commands
        .spawn((
            Enemy {
                kind,
                speed: template.speed,
                damage: template.damage,
                radius: template.radius,
                xp: template.xp,
                souls_min: template.souls_min,
                souls_max: template.souls_max,
                flash: 0.0,
                wobble: position.x * 0.013 + position.y * 0.007,
                alpha: 1.0,
            },
            Position(position),
            Health::new(template.hp),
            Knockback::default(),
            SpawnGrace(SPAWN_GRACE),
            EnemyAi::initial(kind),
        ))
        .id()
}

/// Наносит урон врагу: вычитание hp + hit-flash + knockback импульс.
///
/// Возвращает true iff hp пересекло ноль этим ударом. Caller обязан
/// despawn-ить сущность (mark-and-sweep) и выдать kill-reward ровно один раз.
pub fn damage_enemy(
    health: &mut Health,
    enemy: &mut Enemy,
    knockback: &mut Knockback,
    damage: f32,
    kx: f32,
    ky: f32,
) -> bool {
    let was_alive = health.is_alive();
    health.take_damage(damage);
    enemy.flash = HIT_FLASH;
    knockback.impulse(kx * KNOCKBACK_IMPULSE, ky * KNOCKBACK_IMPULSE);
    was_alive && !health.is_alive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_scaling_chaser() {
        // Спек-сценарий: chaser hp=30, этаж 3 → floor(30 × 1.6) = 48
        let scaled = scale_for_floor(&EnemyKind::Chaser.template(), 3);
        assert_eq!(scaled.hp, 48.0);
        // damage 8 × 1.4 = 11.2
        assert!((scaled.damage - 11.2).abs() < 1e-4);
        // speed 120 × 1.1 = 132
        assert!((scaled.speed - 132.0).abs() < 1e-4);
    }

    #[test]
    fn test_all_templates_sane() {
        for kind in EnemyKind::ALL_REGULAR {
            let t = kind.template();
            assert!(t.hp > 0.0, "{:?}", kind);
            assert!(t.speed > 0.0, "{:?}", kind);
            assert!(t.radius > 0.0, "{:?}", kind);
            assert!(t.xp > 0 || kind == EnemyKind::Swarm, "{:?}", kind);
            assert!(t.souls_max >= t.souls_min, "{:?}", kind);
        }
    }

    #[test]
    fn test_floor_one_unscaled() {
        let base = EnemyKind::Tank.template();
        let scaled = scale_for_floor(&base, 1);
        assert_eq!(scaled.hp, base.hp.floor());
        assert_eq!(scaled.damage, base.damage);
    }

    #[test]
    fn test_damage_enemy_returns_true_on_kill_only() {
        let template = EnemyKind::Chaser.template();
        let mut health = Health::new(template.hp);
        let mut enemy = Enemy {
            kind: EnemyKind::Chaser,
            speed: template.speed,
            damage: template.damage,
            radius: template.radius,
            xp: template.xp,
            souls_min: template.souls_min,
            souls_max: template.souls_max,
            flash: 0.0,
            wobble: 0.0,
            alpha: 1.0,
        };
        let mut kb = Knockback::default();

        assert!(!damage_enemy(&mut health, &mut enemy, &mut kb, 10.0, 1.0, 0.0));
        assert_eq!(health.current, 20.0);
        assert_eq!(enemy.flash, HIT_FLASH);
        assert_eq!(kb.0.x, KNOCKBACK_IMPULSE);

        assert!(damage_enemy(&mut health, &mut enemy, &mut kb, 25.0, 0.0, 1.0));
        assert_eq!(health.current, 0.0);

        // Повторный удар по трупу не возвращает true второй раз
        assert!(!damage_enemy(&mut health, &mut enemy, &mut kb, 5.0, 0.0, 0.0));
    }
}
