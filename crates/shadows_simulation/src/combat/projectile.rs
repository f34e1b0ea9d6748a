//! Снаряды: веерные залпы игрока, вражеские выстрелы, chain/explosive
//!
//! Снаряды игрока одного залпа несут общий volley_id: враг получает максимум
//! одно попадание залпа за тик (веер в упор не мультиплицирует урон).
//! Chain-отскок плоский: каждый hop бьёт 0.6×базы залпа, без компаунда.
//! Despawn — mark-and-sweep через DespawnQueue, никаких despawn внутри
//! итерации по query.

use bevy::prelude::*;
use rand::Rng;
use std::collections::HashSet;

use crate::components::{Health, Knockback, Position, Velocity};
use crate::constants::*;
use crate::dungeon::{circle_rect_overlap, Dungeon};
use crate::engine::{DespawnQueue, ScheduledEffect, ScheduledEffects, ScheduledKind};
use crate::enemy::ai::AiOutput;
use crate::enemy::{damage_enemy, Enemy, EnemyKind};
use crate::events::{CueKind, DamageDealt, EnemyDied, KillSource, OutboundEvents, PlayerDown};
use crate::items::amulets::{AmuletId, EquippedAmulets};
use crate::player::{CombatStats, Cooldowns, Player, PlayerInput, WarRhythm};
use crate::DeterministicRng;

use super::{compute_player_damage, damage_player};

const PROJECTILE_RADIUS: f32 = 4.0;

/// Снаряд игрока
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Projectile {
    /// Урон этого снаряда до множителей
    pub base_damage: f32,
    /// База залпа: chain-hop бьёт 0.6 × этого значения независимо от глубины
    pub chain_base: f32,
    pub volley_id: u32,
    pub piercing: bool,
    pub explosive: bool,
    pub chain_remaining: u32,
    pub lifetime: f32,
    /// Уже поражённые сущности (piercing/chain не бьют одного врага дважды)
    #[reflect(ignore)]
    pub hit: Vec<Entity>,
}

/// Вражеский снаряд
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct EnemyProjectile {
    pub damage: f32,
    pub size: f32,
    pub lifetime: f32,
}

/// Счётчик залпов (монотонный id)
#[derive(Resource, Debug, Default)]
pub struct VolleyCounter(pub u32);

/// Спавн веера залпа: снаряды с общим volley_id, центрированные вокруг
/// направления прицеливания (3 снаряда → -0.09, 0, +0.09)
pub fn spawn_volley(
    commands: &mut Commands,
    origin: Vec2,
    aim_dir: Vec2,
    stats: &CombatStats,
    volley_id: u32,
) {
    let count = stats.projectile_count.max(1);
    let half = (count as f32 - 1.0) * 0.5;

    for i in 0..count {
        let angle = (i as f32 - half) * VOLLEY_FAN_STEP;
        let dir = Vec2::from_angle(angle).rotate(aim_dir);
        commands.spawn((
            Projectile {
                base_damage: stats.projectile_damage,
                chain_base: stats.projectile_damage,
                volley_id,
                piercing: stats.piercing,
                explosive: stats.explosive,
                chain_remaining: stats.chain_bounces,
                lifetime: PROJECTILE_LIFETIME,
                hit: Vec::new(),
            },
            Position(origin + dir * (PLAYER_RADIUS + 6.0)),
            Velocity(dir * PROJECTILE_SPEED),
        ));
    }
}

/// Система: ranged-атака игрока — веер снарядов к точке прицеливания
pub fn player_ranged_attack(
    mut commands: Commands,
    mut input: ResMut<PlayerInput>,
    mut volley: ResMut<VolleyCounter>,
    mut rng: ResMut<DeterministicRng>,
    mut scheduled: ResMut<ScheduledEffects>,
    mut outbound: ResMut<OutboundEvents>,
    equipped: Res<EquippedAmulets>,
    mut player: Query<(&Position, &CombatStats, &mut Cooldowns), With<Player>>,
) {
    if !input.ranged_pressed {
        return;
    }
    input.ranged_pressed = false;

    let Ok((pos, stats, mut cooldowns)) = player.single_mut() else {
        return;
    };
    if cooldowns.ranged > 0.0 {
        return;
    }
    cooldowns.ranged = RANGED_COOLDOWN / stats.attack_speed_mult.max(0.1);

    let aim_dir = {
        let to_aim = input.aim - pos.0;
        if to_aim.length_squared() > 0.01 {
            to_aim.normalize()
        } else {
            Vec2::X
        }
    };

    volley.0 = volley.0.wrapping_add(1);
    spawn_volley(&mut commands, pos.0, aim_dir, stats, volley.0);
    outbound.cue(CueKind::RangedShot);

    // Эхо-залп: тот же прицел, выпускается из текущей позиции спустя задержку
    if equipped.has(AmuletId::EchoingShot) && rng.rng.gen_bool(0.3) {
        scheduled.0.push(ScheduledEffect {
            delay: 0.15,
            kind: ScheduledKind::EchoVolley {
                x: input.aim.x,
                y: input.aim.y,
            },
        });
    }
}

/// Система: материализация выстрелов AI + зачистка сдетонировавших бомберов.
/// Бомбер умирает от собственного взрыва без kill-reward.
pub fn apply_ai_output(
    mut commands: Commands,
    mut out: ResMut<AiOutput>,
    mut despawn: ResMut<DespawnQueue>,
) {
    for shot in out.shots.drain(..) {
        commands.spawn((
            EnemyProjectile {
                damage: shot.damage,
                size: shot.size,
                lifetime: 3.0,
            },
            Position(shot.position),
            Velocity(shot.velocity),
        ));
    }
    for entity in out.detonated.drain(..) {
        despawn.push(entity);
    }
}

/// Система: полёт снарядов, lifetime, стены и препятствия
pub fn move_projectiles(
    ctrl: Res<crate::engine::EngineControl>,
    dims: Res<ActiveDims>,
    dungeon: Res<Dungeon>,
    mut despawn: ResMut<DespawnQueue>,
    mut player_shots: Query<(Entity, &mut Position, &Velocity, &mut Projectile)>,
    mut enemy_shots: Query<
        (Entity, &mut Position, &Velocity, &mut EnemyProjectile),
        Without<Projectile>,
    >,
) {
    let dt = ctrl.dt;
    let obstacles = dungeon
        .current_room()
        .map(|r| r.obstacles.as_slice())
        .unwrap_or(&[]);

    let out_of_room = |p: Vec2| {
        p.x < TILE_SIZE
            || p.y < TILE_SIZE
            || p.x > dims.gw - TILE_SIZE
            || p.y > dims.gh - TILE_SIZE
    };

    for (entity, mut pos, vel, mut projectile) in player_shots.iter_mut() {
        pos.0 += vel.0 * dt;
        projectile.lifetime -= dt;
        let blocked = obstacles
            .iter()
            .any(|o| circle_rect_overlap(pos.0, PROJECTILE_RADIUS, o));
        if projectile.lifetime <= 0.0 || out_of_room(pos.0) || blocked {
            despawn.push(entity);
        }
    }

    for (entity, mut pos, vel, mut shot) in enemy_shots.iter_mut() {
        pos.0 += vel.0 * dt;
        shot.lifetime -= dt;
        let blocked = obstacles
            .iter()
            .any(|o| circle_rect_overlap(pos.0, shot.size, o));
        if shot.lifetime <= 0.0 || out_of_room(pos.0) || blocked {
            despawn.push(entity);
        }
    }
}

/// Система: попадания снарядов игрока по врагам
#[allow(clippy::too_many_arguments)]
pub fn player_projectile_hits(
    mut commands: Commands,
    mut rng: ResMut<DeterministicRng>,
    mut despawn: ResMut<DespawnQueue>,
    mut outbound: ResMut<OutboundEvents>,
    mut damage_events: EventWriter<DamageDealt>,
    mut died_events: EventWriter<EnemyDied>,
    player: Query<(&CombatStats, &Health, &WarRhythm), With<Player>>,
    mut shots: Query<(Entity, &Position, &Velocity, &mut Projectile)>,
    mut enemies: Query<
        (Entity, &Position, &mut Enemy, &mut Health, &mut Knockback),
        (Without<Player>, Without<Projectile>),
    >,
) {
    let Ok((stats, player_health, rhythm)) = player.single() else {
        return;
    };
    let hp_fraction = player_health.fraction();
    let rhythm_bonus = rhythm.damage_bonus();

    // Позиции врагов snapshot-ом: chain ищет цель без повторного запроса query
    let enemy_positions: Vec<(Entity, Vec2, f32)> = enemies
        .iter()
        .map(|(e, p, enemy, _, _)| (e, p.0, enemy.radius))
        .collect();

    // Дедуп по залпу: враг получает максимум одно попадание залпа за тик
    let mut volley_hits: HashSet<(u32, Entity)> = HashSet::new();

    for (shot_entity, shot_pos, shot_vel, mut projectile) in shots.iter_mut() {
        let mut struck: Option<(Entity, Vec2)> = None;

        for &(enemy_entity, enemy_pos, radius) in &enemy_positions {
            if projectile.hit.contains(&enemy_entity) {
                continue;
            }
            if volley_hits.contains(&(projectile.volley_id, enemy_entity)) {
                continue;
            }
            if shot_pos.0.distance(enemy_pos) > radius + PROJECTILE_RADIUS {
                continue;
            }
            struck = Some((enemy_entity, enemy_pos));
            break;
        }

        let Some((enemy_entity, enemy_pos)) = struck else {
            continue;
        };
        let Ok((_, _, mut enemy, mut enemy_health, mut knockback)) =
            enemies.get_mut(enemy_entity)
        else {
            continue;
        };
        if enemy.intangible() {
            continue;
        }

        volley_hits.insert((projectile.volley_id, enemy_entity));
        projectile.hit.push(enemy_entity);

        let (damage, crit) = compute_player_damage(
            stats,
            rhythm_bonus,
            hp_fraction,
            projectile.base_damage,
            &mut rng.rng,
        );
        let kdir = shot_vel.0.normalize_or_zero();
        let killed = damage_enemy(
            &mut enemy_health,
            &mut enemy,
            &mut knockback,
            damage,
            kdir.x,
            kdir.y,
        );
        outbound.cue(CueKind::EnemyHit);
        damage_events.write(DamageDealt {
            target: enemy_entity,
            amount: damage,
            crit,
            to_player: false,
        });
        if killed {
            despawn.push(enemy_entity);
            died_events.write(EnemyDied {
                kind: enemy.kind,
                position: enemy_pos,
                source: KillSource::Projectile,
                xp: enemy.xp,
                souls_min: enemy.souls_min,
                souls_max: enemy.souls_max,
                was_boss: enemy.kind == EnemyKind::Boss,
            });
        }

        // Explosive: половина урона по соседям в радиусе
        if projectile.explosive {
            let blast = EXPLOSIVE_RADIUS * stats.area_multiplier;
            let splash = damage * EXPLOSIVE_FACTOR;
            for &(other_entity, other_pos, _) in &enemy_positions {
                if other_entity == enemy_entity || other_pos.distance(enemy_pos) > blast {
                    continue;
                }
                let Ok((_, _, mut other, mut other_health, mut other_kb)) =
                    enemies.get_mut(other_entity)
                else {
                    continue;
                };
                if other.intangible() {
                    continue;
                }
                let dir = (other_pos - enemy_pos).normalize_or_zero();
                if damage_enemy(
                    &mut other_health,
                    &mut other,
                    &mut other_kb,
                    splash,
                    dir.x,
                    dir.y,
                ) {
                    despawn.push(other_entity);
                    died_events.write(EnemyDied {
                        kind: other.kind,
                        position: other_pos,
                        source: KillSource::Explosion,
                        xp: other.xp,
                        souls_min: other.souls_min,
                        souls_max: other.souls_max,
                        was_boss: other.kind == EnemyKind::Boss,
                    });
                }
            }
        }

        // Chain: hop к ближайшему непоражённому соседу, плоские 0.6×базы залпа
        if projectile.chain_remaining > 0 {
            let target = enemy_positions
                .iter()
                .filter(|(e, p, _)| {
                    *e != enemy_entity
                        && !projectile.hit.contains(e)
                        && p.distance(enemy_pos) <= CHAIN_BOUNCE_RANGE
                })
                .min_by(|(_, a, _), (_, b, _)| {
                    a.distance_squared(enemy_pos)
                        .partial_cmp(&b.distance_squared(enemy_pos))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(e, p, _)| (*e, *p));

            if let Some((_, target_pos)) = target {
                let dir = (target_pos - enemy_pos).normalize_or_zero();
                commands.spawn((
                    Projectile {
                        base_damage: projectile.chain_base * CHAIN_BOUNCE_FALLOFF,
                        chain_base: projectile.chain_base,
                        volley_id: projectile.volley_id,
                        piercing: false,
                        explosive: false,
                        chain_remaining: projectile.chain_remaining - 1,
                        lifetime: 0.5,
                        hit: projectile.hit.clone(),
                    },
                    Position(enemy_pos),
                    Velocity(dir * PROJECTILE_SPEED),
                ));
            }
        }

        if !projectile.piercing {
            despawn.push(shot_entity);
        }
    }
}

/// Система: вражеские снаряды против игрока
pub fn enemy_projectile_hits(
    mut despawn: ResMut<DespawnQueue>,
    mut outbound: ResMut<OutboundEvents>,
    mut damage_events: EventWriter<DamageDealt>,
    mut down_events: EventWriter<PlayerDown>,
    shots: Query<(Entity, &Position, &EnemyProjectile)>,
    mut player: Query<
        (Entity, &Position, &CombatStats, &mut Cooldowns, &mut Health),
        (With<Player>, Without<EnemyProjectile>),
    >,
) {
    let Ok((player_entity, player_pos, stats, mut cooldowns, mut health)) = player.single_mut()
    else {
        return;
    };

    for (shot_entity, shot_pos, shot) in shots.iter() {
        if shot_pos.0.distance(player_pos.0) > PLAYER_RADIUS + shot.size {
            continue;
        }
        despawn.push(shot_entity);
        damage_player(
            &mut health,
            stats,
            &mut cooldowns,
            shot.damage,
            player_entity,
            &mut damage_events,
            &mut down_events,
            &mut outbound,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_damage_is_flat_per_hop() {
        // Плоский отскок: урон hop-а = chain_base × 0.6 независимо от глубины
        let parent = Projectile {
            base_damage: 8.0 * CHAIN_BOUNCE_FALLOFF,
            chain_base: 8.0,
            volley_id: 1,
            piercing: false,
            explosive: false,
            chain_remaining: 2,
            lifetime: 0.5,
            hit: Vec::new(),
        };
        let hop_damage = parent.chain_base * CHAIN_BOUNCE_FALLOFF;
        assert!((hop_damage - 4.8).abs() < 1e-4);
        assert_eq!(hop_damage, parent.base_damage);
    }

    #[test]
    fn test_fan_is_centered() {
        // 3 снаряда → смещения -0.09, 0, +0.09
        let count = 3u32;
        let half = (count as f32 - 1.0) * 0.5;
        let angles: Vec<f32> = (0..count)
            .map(|i| (i as f32 - half) * VOLLEY_FAN_STEP)
            .collect();
        assert!((angles[0] + VOLLEY_FAN_STEP).abs() < 1e-6);
        assert!(angles[1].abs() < 1e-6);
        assert!((angles[2] - VOLLEY_FAN_STEP).abs() < 1e-6);
    }
}
