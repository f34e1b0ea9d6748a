//! Скриптованные боссы (один на этаж)
//!
//! Три скрипта, циклятся по этажам: 1 — Bone Warden (радиальные залпы +
//! charge), 2 — Hollow King (волны призыва + lights-out + телепорт),
//! 3+ — Abyss Matriarch (спиральные залпы + panic/lock-doors + enrage).
//!
//! Контракт тот же, что у обычных AI: функция получает scratch-состояние,
//! возвращает скорость, выстрелы кладёт в `AiOutput`. Спец-действие кадра
//! (`BossAction`) публикуется в `PendingBossAction` — движок потребляет
//! максимум одно за тик.

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::constants::*;
use crate::enemy::ai::{AiOutput, EnemyShot, SummonRequest};
use crate::enemy::{Enemy, EnemyKind};
use crate::events::{CueKind, OutboundEvents};

/// Спец-действие босса, потребляется движком (максимум одно за кадр)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BossAction {
    ScreenShake { strength: f32 },
    SpawnMinions { count: u32 },
    LightsOut,
    LockDoors,
    Panic,
}

/// Pending-слот действия. Босс пишет только в пустой слот: действия
/// не стакаются между кадрами.
#[derive(Resource, Debug, Default)]
pub struct PendingBossAction(pub Option<BossAction>);

/// Какой скрипт играет босс
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum BossPattern {
    BoneWarden,
    HollowKing,
    AbyssMatriarch,
}

impl BossPattern {
    /// Скрипт этажа: 1 → Warden, 2 → King, 3+ → Matriarch
    pub fn for_floor(floor: u32) -> Self {
        match floor {
            0 | 1 => BossPattern::BoneWarden,
            2 => BossPattern::HollowKing,
            _ => BossPattern::AbyssMatriarch,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BossPattern::BoneWarden => "Bone Warden",
            BossPattern::HollowKing => "Hollow King",
            BossPattern::AbyssMatriarch => "Abyss Matriarch",
        }
    }
}

/// Scratch-состояние скрипта босса
#[derive(Debug, Clone, Reflect)]
pub struct BossScript {
    pub pattern: BossPattern,
    /// До следующего спец-паттерна (залп/призыв/панические действия)
    pub action_timer: f32,
    /// Остаток текущего charge (Warden)
    pub charge_timer: f32,
    pub charge_dir: Vec2,
    /// Спиральный угол (Matriarch)
    pub spiral_angle: f32,
    pub spiral_timer: f32,
    pub enraged: bool,
}

impl Default for BossScript {
    fn default() -> Self {
        Self::new(BossPattern::BoneWarden)
    }
}

impl BossScript {
    pub fn new(pattern: BossPattern) -> Self {
        Self {
            pattern,
            action_timer: 2.0,
            charge_timer: 0.0,
            charge_dir: Vec2::ZERO,
            spiral_angle: 0.0,
            spiral_timer: 0.0,
            enraged: false,
        }
    }
}

/// Радиальный залп из count снарядов
fn radial_burst(out: &mut AiOutput, position: Vec2, count: u32, speed: f32, damage: f32) {
    for i in 0..count {
        let angle = std::f32::consts::TAU * i as f32 / count as f32;
        out.shots.push(EnemyShot {
            position,
            velocity: Vec2::from_angle(angle) * speed,
            damage,
            size: 7.0,
        });
    }
}

fn publish(pending: &mut PendingBossAction, action: BossAction) {
    if pending.0.is_none() {
        pending.0 = Some(action);
    }
}

/// Обновление босса; возвращает скорость за тик
#[allow(clippy::too_many_arguments)]
pub fn update_boss_ai(
    script: &mut BossScript,
    enemy: &mut Enemy,
    pos: &mut Vec2,
    player_pos: Vec2,
    dist: f32,
    dt: f32,
    dims: &ActiveDims,
    rng: &mut ChaCha8Rng,
    hp_fraction: f32,
    pending: &mut PendingBossAction,
    out: &mut AiOutput,
    outbound: &mut OutboundEvents,
) -> Vec2 {
    let dir = (player_pos - *pos) / dist.max(0.001);
    script.action_timer -= dt;

    match script.pattern {
        BossPattern::BoneWarden => {
            if script.charge_timer > 0.0 {
                script.charge_timer -= dt;
                return script.charge_dir * TANK_CHARGE_SPEED * 1.1;
            }
            if script.action_timer <= 0.0 {
                if dist < 260.0 && rng.gen_bool(0.4) {
                    // Рывок по зафиксированному вектору
                    script.charge_timer = 0.7;
                    script.charge_dir = dir;
                    script.action_timer = 2.5;
                    publish(pending, BossAction::ScreenShake { strength: 6.0 });
                    outbound.cue(CueKind::BossRoar);
                } else {
                    radial_burst(out, *pos, 10, 200.0, enemy.damage * 0.6);
                    script.action_timer = 2.5;
                }
            }
            dir * enemy.speed
        }

        BossPattern::HollowKing => {
            if script.action_timer <= 0.0 {
                script.action_timer = 4.0;
                match rng.gen_range(0..3u32) {
                    0 => {
                        let count = rng.gen_range(2..=3u32);
                        out.summons.push(SummonRequest {
                            kind: EnemyKind::Chaser,
                            position: *pos,
                            count,
                        });
                        publish(pending, BossAction::SpawnMinions { count });
                        outbound.cue(CueKind::NecromancerSummon);
                    }
                    1 => {
                        publish(pending, BossAction::LightsOut);
                        outbound.cue(CueKind::BossRoar);
                    }
                    _ => {
                        // Частичный телепорт к игроку
                        let step = dir * dist * rng.gen_range(0.4..0.6);
                        *pos = dims.clamp_to_interior(*pos + step, enemy.radius);
                        outbound.cue(CueKind::WarperTeleport);
                    }
                }
            }
            // Держит среднюю дистанцию
            if dist < 120.0 {
                -dir * enemy.speed * 0.6
            } else if dist > 220.0 {
                dir * enemy.speed
            } else {
                Vec2::new(-dir.y, dir.x) * enemy.speed * 0.5
            }
        }

        BossPattern::AbyssMatriarch => {
            if !script.enraged && hp_fraction < 0.35 {
                script.enraged = true;
                publish(pending, BossAction::ScreenShake { strength: 9.0 });
                outbound.cue(CueKind::BossRoar);
            }
            let rate = if script.enraged { 0.16 } else { 0.25 };

            script.spiral_timer -= dt;
            if script.spiral_timer <= 0.0 {
                script.spiral_timer = rate;
                script.spiral_angle += 0.5;
                out.shots.push(EnemyShot {
                    position: *pos,
                    velocity: Vec2::from_angle(script.spiral_angle) * 180.0,
                    damage: enemy.damage * 0.5,
                    size: 6.0,
                });
            }

            if script.action_timer <= 0.0 {
                script.action_timer = 5.0;
                let action = if rng.gen_bool(0.5) {
                    BossAction::Panic
                } else {
                    BossAction::LockDoors
                };
                publish(pending, action);
                outbound.cue(CueKind::BossRoar);
            }

            let speed_mult = if script.enraged { 1.4 } else { 1.0 };
            dir * enemy.speed * speed_mult
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_pattern_cycles_by_floor() {
        assert_eq!(BossPattern::for_floor(1), BossPattern::BoneWarden);
        assert_eq!(BossPattern::for_floor(2), BossPattern::HollowKing);
        assert_eq!(BossPattern::for_floor(3), BossPattern::AbyssMatriarch);
        assert_eq!(BossPattern::for_floor(7), BossPattern::AbyssMatriarch);
    }

    #[test]
    fn test_radial_burst_count_and_spread() {
        let mut out = AiOutput::default();
        radial_burst(&mut out, Vec2::new(100.0, 100.0), 10, 200.0, 12.0);
        assert_eq!(out.shots.len(), 10);
        // Все скорости одной длины, направления различны
        for shot in &out.shots {
            assert!((shot.velocity.length() - 200.0).abs() < 0.01);
        }
        assert_ne!(out.shots[0].velocity, out.shots[5].velocity);
    }

    #[test]
    fn test_pending_action_does_not_stack() {
        let mut pending = PendingBossAction::default();
        publish(&mut pending, BossAction::LightsOut);
        publish(&mut pending, BossAction::Panic);
        assert_eq!(pending.0, Some(BossAction::LightsOut));
    }

    #[test]
    fn test_matriarch_enrages_once_below_threshold() {
        let mut script = BossScript::new(BossPattern::AbyssMatriarch);
        let mut enemy = Enemy {
            kind: EnemyKind::Boss,
            speed: 90.0,
            damage: 20.0,
            radius: 30.0,
            xp: 120,
            souls_min: 25,
            souls_max: 40,
            flash: 0.0,
            wobble: 0.0,
            alpha: 1.0,
        };
        let mut pos = Vec2::new(300.0, 300.0);
        let dims = ActiveDims::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut pending = PendingBossAction::default();
        let mut out = AiOutput::default();
        let mut outbound = crate::events::OutboundEvents::default();

        update_boss_ai(
            &mut script,
            &mut enemy,
            &mut pos,
            Vec2::new(500.0, 300.0),
            200.0,
            1.0 / 60.0,
            &dims,
            &mut rng,
            0.3, // ниже порога 35%
            &mut pending,
            &mut out,
            &mut outbound,
        );
        assert!(script.enraged);
        assert_eq!(pending.0, Some(BossAction::ScreenShake { strength: 9.0 }));
    }
}
