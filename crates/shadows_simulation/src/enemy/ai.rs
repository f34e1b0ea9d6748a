//! AI-автоматы врагов
//!
//! Один автомат на тип: enum `EnemyAi` с данными состояния, exhaustive match
//! в `update_enemy_ai`. Поведенческие функции чистые (без Bevy-query),
//! тестируются напрямую.
//!
//! Общая механика для всех типов:
//! - wobble/flash/cooldown таймеры тикают каждый кадр
//! - boid-разделение против остальных врагов в радиусе 0.7×(сумма радиусов),
//!   считается по read-only снапшоту позиций (ссылки не сохраняются)
//! - финальный clamp позиции к интерьеру комнаты

use bevy::prelude::*;
use rand::Rng;

use crate::components::{Health, Knockback, Position, SpawnGrace};
use crate::constants::*;
use crate::dungeon::traps::TrapEffects;
use crate::engine::{EngineControl, LightState};
use crate::enemy::boss::{self, BossScript, PendingBossAction};
use crate::enemy::{Enemy, EnemyKind};
use crate::events::{CueKind, OutboundEvents};
use crate::player::Player;
use crate::DeterministicRng;

/// Фазы tank-автомата
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum TankPhase {
    Chase,
    Charge,
    Cooldown,
}

/// Фазы wraith-автомата
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum WraithPhase {
    Chase,
    FadeOut,
    Phasing,
}

/// Фазы flash hunter
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum FlashPhase {
    Hidden,
    Charge,
}

/// Состояние AI. Вариант на тип врага, scratch-поля внутри варианта.
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub enum EnemyAi {
    Chaser,
    Shooter {
        cooldown: f32,
        strafe_dir: f32,
    },
    Tank {
        phase: TankPhase,
        timer: f32,
        charge_dir: Vec2,
    },
    Wraith {
        phase: WraithPhase,
        timer: f32,
        teleport_target: Vec2,
    },
    Bomber {
        /// None — погоня; Some(t) — фитиль горит, t секунд до взрыва
        fuse: Option<f32>,
    },
    Swarm {
        seed: f32,
    },
    Necromancer {
        summon_timer: f32,
        orbit_dir: f32,
    },
    Stalker {
        lunge_timer: f32,
        lunge_dir: Vec2,
        cooldown: f32,
    },
    FlashHunter {
        phase: FlashPhase,
        timer: f32,
        charge_dir: Vec2,
    },
    Distortion {
        charge_timer: f32,
        revealed: bool,
    },
    FlickerFiend,
    Warper {
        teleport_timer: f32,
    },
    Accelerator {
        in_light: bool,
    },
    Brute {
        slam_cooldown: f32,
    },
    Spitter {
        cooldown: f32,
    },
    Boss(BossScript),
}

impl EnemyAi {
    /// Начальное состояние автомата для типа
    pub fn initial(kind: EnemyKind) -> Self {
        match kind {
            EnemyKind::Chaser => EnemyAi::Chaser,
            EnemyKind::Shooter => EnemyAi::Shooter {
                cooldown: SHOOTER_FIRE_COOLDOWN * 0.5,
                strafe_dir: 1.0,
            },
            EnemyKind::Tank => EnemyAi::Tank {
                phase: TankPhase::Chase,
                timer: 0.0,
                charge_dir: Vec2::ZERO,
            },
            EnemyKind::Wraith => EnemyAi::Wraith {
                phase: WraithPhase::Chase,
                timer: 3.0,
                teleport_target: Vec2::ZERO,
            },
            EnemyKind::Bomber => EnemyAi::Bomber { fuse: None },
            EnemyKind::Swarm => EnemyAi::Swarm { seed: 0.0 },
            EnemyKind::Necromancer => EnemyAi::Necromancer {
                summon_timer: NECRO_SUMMON_COOLDOWN * 0.6,
                orbit_dir: 1.0,
            },
            EnemyKind::Stalker => EnemyAi::Stalker {
                lunge_timer: 0.0,
                lunge_dir: Vec2::ZERO,
                cooldown: 0.0,
            },
            EnemyKind::FlashHunter => EnemyAi::FlashHunter {
                phase: FlashPhase::Hidden,
                timer: 1.2,
                charge_dir: Vec2::ZERO,
            },
            EnemyKind::Distortion => EnemyAi::Distortion {
                charge_timer: 5.0,
                revealed: false,
            },
            EnemyKind::FlickerFiend => EnemyAi::FlickerFiend,
            EnemyKind::Warper => EnemyAi::Warper {
                teleport_timer: WARPER_TELEPORT_INTERVAL,
            },
            EnemyKind::Accelerator => EnemyAi::Accelerator { in_light: false },
            EnemyKind::Brute => EnemyAi::Brute { slam_cooldown: 1.5 },
            EnemyKind::Spitter => EnemyAi::Spitter { cooldown: 1.4 },
            EnemyKind::Boss => EnemyAi::Boss(BossScript::default()),
        }
    }
}

/// Duty cycle мерцания flicker fiend: видим iff sin(wobble×4) > -0.2
pub fn flicker_visible(wobble: f32) -> bool {
    (wobble * 4.0).sin() > -0.2
}

impl Enemy {
    /// Неуязвим ли враг для попаданий прямо сейчас. Невидимая фаза flicker
    /// fiend даёт hit-immunity: снаряды пролетают, melee не попадает.
    pub fn intangible(&self) -> bool {
        self.kind == EnemyKind::FlickerFiend && !flicker_visible(self.wobble)
    }
}

/// Дескриптор вражеского выстрела (снаряды спавнит projectile-система)
#[derive(Debug, Clone, Copy)]
pub struct EnemyShot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: f32,
    pub size: f32,
}

/// Взрыв (bomber, brute slam, boss) — резолвится движком после итерации
#[derive(Debug, Clone, Copy)]
pub struct Explosion {
    pub position: Vec2,
    pub damage: f32,
    pub radius: f32,
    /// Задевает ли соседних врагов (вполовину урона)
    pub harms_enemies: bool,
}

/// Запрос на призыв (necromancer, ловушки, боссы)
#[derive(Debug, Clone, Copy)]
pub struct SummonRequest {
    pub kind: EnemyKind,
    pub position: Vec2,
    pub count: u32,
}

/// Выход AI за тик — дренируется последующими системами того же кадра.
/// Mark-and-sweep: сущности-детонаторы удаляются после цикла, не внутри.
#[derive(Resource, Debug, Default)]
pub struct AiOutput {
    pub shots: Vec<EnemyShot>,
    pub explosions: Vec<Explosion>,
    pub detonated: Vec<Entity>,
    pub summons: Vec<SummonRequest>,
}

/// Снапшот соседей для разделения (read-only, пересоздаётся каждый тик)
struct Neighbor {
    entity: Entity,
    position: Vec2,
    radius: f32,
}

/// Boid-разделение: отталкивание от соседей ближе 0.7×(сумма радиусов)
fn separation_force(entity: Entity, position: Vec2, radius: f32, neighbors: &[Neighbor]) -> Vec2 {
    let mut force = Vec2::ZERO;
    for other in neighbors {
        if other.entity == entity {
            continue;
        }
        let limit = (radius + other.radius) * SEPARATION_FACTOR;
        let delta = position - other.position;
        let dist = delta.length();
        if dist < limit && dist > 0.001 {
            force += delta / dist * (limit - dist) * 6.0;
        }
    }
    force
}

/// Система: диспетчер AI всех врагов
pub fn update_enemy_ai(
    ctrl: Res<EngineControl>,
    dims: Res<ActiveDims>,
    light: Res<LightState>,
    trap_fx: Res<TrapEffects>,
    mut rng: ResMut<DeterministicRng>,
    mut out: ResMut<AiOutput>,
    mut outbound: ResMut<OutboundEvents>,
    mut pending_action: ResMut<PendingBossAction>,
    player_query: Query<&Position, (With<Player>, Without<Enemy>)>,
    mut enemies: Query<
        (
            Entity,
            &mut Position,
            &mut Enemy,
            &mut EnemyAi,
            &mut Knockback,
            &mut SpawnGrace,
            &Health,
        ),
        Without<Player>,
    >,
) {
    let dt = ctrl.dt;
    let Ok(player_pos) = player_query.single() else {
        return;
    };
    let player_pos = player_pos.0;

    // Read-only снапшот для разделения: ссылки на Query внутри цикла не держим
    let neighbors: Vec<Neighbor> = enemies
        .iter()
        .map(|(entity, pos, enemy, _, _, _, _)| Neighbor {
            entity,
            position: pos.0,
            radius: enemy.radius,
        })
        .collect();

    let speed_mult = trap_fx.enemy_speed_mult();

    for (entity, mut pos, mut enemy, mut ai, mut knockback, mut grace, health) in
        enemies.iter_mut()
    {
        if grace.active() {
            grace.tick(dt);
            continue;
        }

        enemy.wobble += dt;
        enemy.flash = (enemy.flash - dt).max(0.0);
        knockback.decay(dt);

        let to_player = player_pos - pos.0;
        let dist = to_player.length().max(0.001);
        let dir = to_player / dist;

        let velocity = match &mut *ai {
            EnemyAi::Chaser => {
                // Прямая погоня + синусоидальный увод вбок (никогда не чистая прямая)
                let perp = Vec2::new(-dir.y, dir.x);
                let wobble_offset = (enemy.wobble * 2.0).sin() * 0.35;
                (dir + perp * wobble_offset).normalize() * enemy.speed
            }

            EnemyAi::Shooter { cooldown, strafe_dir } => {
                *cooldown -= dt;
                // Три зоны по дистанции: отступ / strafe / сближение
                let velocity = if dist < SHOOTER_RETREAT_RANGE {
                    -dir * enemy.speed
                } else if dist < SHOOTER_PREFERRED_RANGE {
                    if rng.rng.gen_bool((0.4 * dt as f64).min(1.0)) {
                        *strafe_dir = -*strafe_dir;
                    }
                    Vec2::new(-dir.y, dir.x) * *strafe_dir * enemy.speed * 0.8
                } else {
                    dir * enemy.speed
                };
                // Стреляем только в пределах 1.3× предпочитаемой дистанции
                if *cooldown <= 0.0 && dist < SHOOTER_PREFERRED_RANGE * 1.3 {
                    *cooldown = SHOOTER_FIRE_COOLDOWN;
                    out.shots.push(EnemyShot {
                        position: pos.0,
                        velocity: dir * 260.0,
                        damage: enemy.damage,
                        size: 6.0,
                    });
                }
                velocity
            }

            EnemyAi::Tank { phase, timer, charge_dir } => match phase {
                TankPhase::Chase => {
                    if dist < TANK_CHARGE_DIST {
                        *phase = TankPhase::Charge;
                        *timer = TANK_CHARGE_TIME;
                        *charge_dir = dir; // вектор фиксируется на входе в charge
                    }
                    dir * enemy.speed
                }
                TankPhase::Charge => {
                    *timer -= dt;
                    if *timer <= 0.0 {
                        *phase = TankPhase::Cooldown;
                        *timer = TANK_COOLDOWN;
                    }
                    *charge_dir * TANK_CHARGE_SPEED
                }
                TankPhase::Cooldown => {
                    *timer -= dt;
                    if *timer <= 0.0 {
                        *phase = TankPhase::Chase;
                    }
                    dir * enemy.speed * 0.25
                }
            },

            EnemyAi::Wraith { phase, timer, teleport_target } => match phase {
                WraithPhase::Chase => {
                    enemy.alpha = 1.0;
                    *timer -= dt;
                    if *timer <= 0.0 {
                        *phase = WraithPhase::FadeOut;
                        // Точка рядом с игроком, clamp к границам
                        let angle = rng.rng.gen_range(0.0..std::f32::consts::TAU);
                        let offset = Vec2::from_angle(angle) * rng.rng.gen_range(60.0..120.0);
                        *teleport_target =
                            dims.clamp_to_interior(player_pos + offset, enemy.radius);
                    }
                    // Парящая погоня с вертикальным бобом
                    let bob = Vec2::new(0.0, (enemy.wobble * 3.0).sin() * 14.0);
                    (dir * enemy.speed) + bob
                }
                WraithPhase::FadeOut => {
                    enemy.alpha = (enemy.alpha - 4.0 * dt).max(0.0);
                    if enemy.alpha <= 0.0 {
                        pos.0 = *teleport_target;
                        *phase = WraithPhase::Phasing;
                        *timer = WRAITH_PHASE_WINDOW;
                        outbound.cue(CueKind::WarperTeleport);
                    }
                    Vec2::ZERO
                }
                WraithPhase::Phasing => {
                    enemy.alpha = (enemy.alpha + 4.0 * dt).min(1.0);
                    *timer -= dt;
                    if *timer <= 0.0 {
                        *phase = WraithPhase::Chase;
                        *timer = rng.rng.gen_range(2.5..4.0);
                    }
                    dir * enemy.speed * WRAITH_PHASE_SPEED_MULT
                }
            },

            EnemyAi::Bomber { fuse } => match fuse {
                None => {
                    if dist < BOMBER_FUSE_DIST {
                        *fuse = Some(BOMBER_FUSE_TIME);
                    }
                    dir * enemy.speed
                }
                Some(t) => {
                    *t -= dt;
                    if *t <= 0.0 || dist < BOMBER_DETONATE_DIST {
                        out.explosions.push(Explosion {
                            position: pos.0,
                            damage: enemy.damage,
                            radius: BOMBER_BLAST_RADIUS,
                            harms_enemies: true,
                        });
                        out.detonated.push(entity);
                        outbound.cue(CueKind::BomberExplosion);
                        Vec2::ZERO
                    } else {
                        dir * BOMBER_RUSH_SPEED
                    }
                }
            },

            EnemyAi::Swarm { seed } => {
                if *seed == 0.0 {
                    // Сидируем от стартовой позиции: рой не движется синхронно
                    *seed = pos.0.x * 0.017 + pos.0.y * 0.011;
                }
                let jitter = ((enemy.wobble * 3.0 + *seed).sin()) * 0.8;
                let rotated = Vec2::from_angle(jitter).rotate(dir);
                rotated * enemy.speed
            }

            EnemyAi::Necromancer { summon_timer, orbit_dir } => {
                *summon_timer -= dt;
                if *summon_timer <= 0.0 {
                    *summon_timer = NECRO_SUMMON_COOLDOWN;
                    out.summons.push(SummonRequest {
                        kind: EnemyKind::Swarm,
                        position: pos.0,
                        count: rng.rng.gen_range(2..=3),
                    });
                    outbound.cue(CueKind::NecromancerSummon);
                }
                // Орбитальная полоса 100..160 от игрока
                if dist < NECRO_ORBIT_NEAR {
                    -dir * enemy.speed
                } else if dist > NECRO_ORBIT_FAR {
                    dir * enemy.speed
                } else {
                    if rng.rng.gen_bool((0.25 * dt as f64).min(1.0)) {
                        *orbit_dir = -*orbit_dir;
                    }
                    Vec2::new(-dir.y, dir.x) * *orbit_dir * enemy.speed
                }
            }

            EnemyAi::Stalker { lunge_timer, lunge_dir, cooldown } => {
                *cooldown = (*cooldown - dt).max(0.0);
                if *lunge_timer > 0.0 {
                    *lunge_timer -= dt;
                    enemy.alpha = 1.0;
                    *lunge_dir * STALKER_LUNGE_SPEED
                } else if dist < STALKER_LUNGE_DIST && *cooldown <= 0.0 {
                    *lunge_timer = STALKER_LUNGE_TIME;
                    *lunge_dir = dir;
                    *cooldown = STALKER_LUNGE_COOLDOWN;
                    enemy.alpha = 1.0;
                    outbound.cue(CueKind::StalkerLunge);
                    dir * STALKER_LUNGE_SPEED
                } else {
                    // Почти невидимое медленное преследование
                    enemy.alpha = if *cooldown > STALKER_LUNGE_COOLDOWN - 0.8 {
                        1.0 // краткая видимость после выпада
                    } else {
                        STALKER_STEALTH_ALPHA
                    };
                    dir * enemy.speed
                }
            }

            EnemyAi::FlashHunter { phase, timer, charge_dir } => match phase {
                FlashPhase::Hidden => {
                    enemy.alpha = 0.0;
                    *timer -= dt;
                    if *timer <= 0.0 {
                        *phase = FlashPhase::Charge;
                        *timer = FLASH_CHARGE_TIME;
                        *charge_dir = dir;
                        enemy.alpha = 1.0;
                        outbound.cue(CueKind::FlashHunterAppear);
                    }
                    Vec2::ZERO
                }
                FlashPhase::Charge => {
                    enemy.alpha = 1.0;
                    *timer -= dt;
                    if *timer <= 0.0 {
                        *phase = FlashPhase::Hidden;
                        *timer = rng.rng.gen_range(0.8..2.0);
                    }
                    *charge_dir * FLASH_CHARGE_SPEED
                }
            },

            EnemyAi::Distortion { charge_timer, revealed } => {
                if !*revealed {
                    enemy.alpha = 0.0;
                    *charge_timer -= dt;
                    if *charge_timer <= 0.0 {
                        *revealed = true;
                        enemy.alpha = 1.0;
                        outbound.cue(CueKind::DistortionEnter);
                    }
                    Vec2::ZERO
                } else {
                    // Навсегда видим, неумолимый медленный ход
                    enemy.alpha = 1.0;
                    dir * enemy.speed
                }
            }

            EnemyAi::FlickerFiend => {
                let visible = flicker_visible(enemy.wobble);
                enemy.alpha = if visible { 1.0 } else { 0.12 };
                if visible && rng.rng.gen_bool((0.5 * dt as f64).min(1.0)) {
                    outbound.cue(CueKind::FlickerBuzz);
                }
                // Полная скорость только видимым; невидимым — вполовину
                let mult = if visible { 1.0 } else { 0.5 };
                dir * enemy.speed * mult
            }

            EnemyAi::Warper { teleport_timer } => {
                *teleport_timer -= dt;
                // Между телепортами плавно гаснет
                enemy.alpha = (*teleport_timer / WARPER_TELEPORT_INTERVAL).clamp(0.25, 1.0);
                if *teleport_timer <= 0.0 {
                    *teleport_timer =
                        WARPER_TELEPORT_INTERVAL * rng.rng.gen_range(0.7..1.3);
                    // Частичный телепорт: 30–50% оставшейся дистанции, угол ±0.4 рад
                    let fraction = rng.rng.gen_range(0.3..0.5);
                    let jitter = rng.rng.gen_range(-0.4..0.4);
                    let step = Vec2::from_angle(jitter).rotate(dir) * dist * fraction;
                    pos.0 = dims.clamp_to_interior(pos.0 + step, enemy.radius);
                    enemy.alpha = 1.0;
                    outbound.cue(CueKind::WarperTeleport);
                }
                // Непрерывный медленный дрейф
                dir * enemy.speed
            }

            EnemyAi::Accelerator { in_light } => {
                let lit = dist < light.radius;
                if lit && !*in_light {
                    outbound.cue(CueKind::AcceleratorCharge);
                }
                *in_light = lit;
                enemy.alpha = if lit { 1.0 } else { 0.45 };
                let mult = if lit { ACCELERATOR_LIGHT_MULT } else { 1.0 };
                dir * enemy.speed * mult
            }

            EnemyAi::Brute { slam_cooldown } => {
                *slam_cooldown -= dt;
                if *slam_cooldown <= 0.0 && dist < enemy.radius + 45.0 {
                    *slam_cooldown = 2.5;
                    out.explosions.push(Explosion {
                        position: pos.0,
                        damage: enemy.damage,
                        radius: 70.0,
                        harms_enemies: false,
                    });
                }
                dir * enemy.speed
            }

            EnemyAi::Spitter { cooldown } => {
                *cooldown -= dt;
                if *cooldown <= 0.0 && dist < 320.0 {
                    *cooldown = 2.2;
                    // Тройной веер
                    for spread in [-0.25f32, 0.0, 0.25] {
                        out.shots.push(EnemyShot {
                            position: pos.0,
                            velocity: Vec2::from_angle(spread).rotate(dir) * 220.0,
                            damage: enemy.damage,
                            size: 5.0,
                        });
                    }
                }
                let velocity = if dist < 180.0 {
                    -dir * enemy.speed
                } else if dist > 280.0 {
                    dir * enemy.speed
                } else {
                    Vec2::ZERO
                };
                velocity
            }

            EnemyAi::Boss(script) => boss::update_boss_ai(
                script,
                &mut enemy,
                &mut pos.0,
                player_pos,
                dist,
                dt,
                &dims,
                &mut rng.rng,
                health.fraction(),
                &mut pending_action,
                &mut out,
                &mut outbound,
            ),
        };

        let separation = separation_force(entity, pos.0, enemy.radius, &neighbors);
        pos.0 += (velocity * speed_mult + knockback.0 + separation) * dt;
        pos.0 = dims.clamp_to_interior(pos.0, enemy.radius);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_enemy(kind: EnemyKind) -> Enemy {
        let t = kind.template();
        Enemy {
            kind,
            speed: t.speed,
            damage: t.damage,
            radius: t.radius,
            xp: t.xp,
            souls_min: t.souls_min,
            souls_max: t.souls_max,
            flash: 0.0,
            wobble: 0.0,
            alpha: 1.0,
        }
    }

    #[test]
    fn test_tank_charge_cycle() {
        // Chase → Charge (0.6s) → Cooldown (1.2s) → Chase, прогоняем руками
        let mut phase = TankPhase::Chase;
        let mut timer = 0.0f32;
        let mut charge_dir = Vec2::ZERO;
        let dir = Vec2::X;
        let dt = 1.0 / 60.0;

        // Вход в charge при dist < TANK_CHARGE_DIST
        let dist = TANK_CHARGE_DIST - 1.0;
        if dist < TANK_CHARGE_DIST {
            phase = TankPhase::Charge;
            timer = TANK_CHARGE_TIME;
            charge_dir = dir;
        }
        assert_eq!(phase, TankPhase::Charge);
        assert_eq!(charge_dir, Vec2::X);

        // 0.6s charge
        let mut elapsed = 0.0;
        while elapsed < TANK_CHARGE_TIME + dt {
            timer -= dt;
            elapsed += dt;
            if timer <= 0.0 {
                phase = TankPhase::Cooldown;
                timer = TANK_COOLDOWN;
                break;
            }
        }
        assert_eq!(phase, TankPhase::Cooldown);

        // 1.2s cooldown
        let mut elapsed = 0.0;
        while elapsed < TANK_COOLDOWN + dt {
            timer -= dt;
            elapsed += dt;
            if timer <= 0.0 {
                phase = TankPhase::Chase;
                break;
            }
        }
        assert_eq!(phase, TankPhase::Chase);
    }

    #[test]
    fn test_flicker_duty_cycle() {
        // sin(w×4) > -0.2: видим на большей части периода
        assert!(flicker_visible(0.0)); // sin 0 = 0 > -0.2
        assert!(flicker_visible(0.3)); // sin 1.2 ≈ 0.93
        assert!(!flicker_visible(1.1)); // sin 4.4 ≈ -0.95
    }

    #[test]
    fn test_flicker_intangible_only_while_hidden() {
        let mut enemy = test_enemy(EnemyKind::FlickerFiend);
        enemy.wobble = 0.3;
        assert!(!enemy.intangible());
        enemy.wobble = 1.1;
        assert!(enemy.intangible());

        // Другие типы не бывают intangible
        let mut chaser = test_enemy(EnemyKind::Chaser);
        chaser.wobble = 1.1;
        assert!(!chaser.intangible());
    }

    #[test]
    fn test_separation_pushes_apart() {
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        let neighbors = vec![
            Neighbor {
                entity: a,
                position: Vec2::new(100.0, 100.0),
                radius: 13.0,
            },
            Neighbor {
                entity: b,
                position: Vec2::new(104.0, 100.0),
                radius: 13.0,
            },
        ];
        let force = separation_force(a, Vec2::new(100.0, 100.0), 13.0, &neighbors);
        // Сосед справа — толкает влево
        assert!(force.x < 0.0);
        assert_eq!(force.y, 0.0);
    }

    #[test]
    fn test_separation_ignores_far_neighbors() {
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        let neighbors = vec![Neighbor {
            entity: b,
            position: Vec2::new(300.0, 300.0),
            radius: 13.0,
        }];
        let force = separation_force(a, Vec2::new(100.0, 100.0), 13.0, &neighbors);
        assert_eq!(force, Vec2::ZERO);
    }

    #[test]
    fn test_initial_states_match_kinds() {
        assert!(matches!(
            EnemyAi::initial(EnemyKind::Tank),
            EnemyAi::Tank { phase: TankPhase::Chase, .. }
        ));
        assert!(matches!(
            EnemyAi::initial(EnemyKind::Bomber),
            EnemyAi::Bomber { fuse: None }
        ));
        assert!(matches!(
            EnemyAi::initial(EnemyKind::FlashHunter),
            EnemyAi::FlashHunter { phase: FlashPhase::Hidden, .. }
        ));
    }
}
