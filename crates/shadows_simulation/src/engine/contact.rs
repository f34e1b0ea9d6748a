//! Контактный урон, взрывы, добивания и теневой клон

use bevy::prelude::*;

use crate::combat::{compute_player_damage, damage_player};
use crate::components::{Health, Knockback, Position, SpawnGrace};
use crate::constants::*;
use crate::dungeon::traps::TrapEffects;
use crate::engine::{DespawnQueue, EngineControl};
use crate::enemy::ai::AiOutput;
use crate::enemy::{damage_enemy, Enemy, EnemyKind};
use crate::events::{
    CueKind, DamageDealt, EnemyDied, KillSource, OutboundEvents, PlayerDown,
};
use crate::player::{Abilities, CombatStats, Cooldowns, Player, WarRhythm};
use crate::DeterministicRng;

/// Система: касание враг→игрок + шипы в обратную сторону
///
/// Бомбер не бьёт касанием (его урон — детонация), flicker fiend в невидимой
/// фазе и враги под spawn grace не коллайдятся.
#[allow(clippy::too_many_arguments)]
pub fn contact_damage(
    fx: Res<TrapEffects>,
    mut despawn: ResMut<DespawnQueue>,
    mut outbound: ResMut<OutboundEvents>,
    mut damage_events: EventWriter<DamageDealt>,
    mut down_events: EventWriter<PlayerDown>,
    mut died_events: EventWriter<EnemyDied>,
    mut player: Query<
        (Entity, &Position, &CombatStats, &mut Cooldowns, &mut Health),
        With<Player>,
    >,
    mut enemies: Query<
        (Entity, &Position, &mut Enemy, &mut Health, &mut Knockback, &SpawnGrace),
        Without<Player>,
    >,
) {
    let Ok((player_entity, player_pos, stats, mut cooldowns, mut health)) = player.single_mut()
    else {
        return;
    };

    for (entity, pos, mut enemy, mut enemy_health, mut knockback, grace) in enemies.iter_mut() {
        if grace.active() || enemy.intangible() || enemy.kind == EnemyKind::Bomber {
            continue;
        }
        if pos.0.distance(player_pos.0) > enemy.radius + PLAYER_RADIUS {
            continue;
        }

        let raw = enemy.damage * fx.enemy_damage_mult();
        let dealt = damage_player(
            &mut health,
            stats,
            &mut cooldowns,
            raw,
            player_entity,
            &mut damage_events,
            &mut down_events,
            &mut outbound,
        );
        if dealt <= 0.0 {
            continue;
        }

        if stats.thorns > 0.0 {
            let reflected = dealt * stats.thorns;
            let dir = (pos.0 - player_pos.0).normalize_or_zero();
            if damage_enemy(
                &mut enemy_health,
                &mut enemy,
                &mut knockback,
                reflected,
                dir.x,
                dir.y,
            ) {
                despawn.push(entity);
                died_events.write(EnemyDied {
                    kind: enemy.kind,
                    position: pos.0,
                    source: KillSource::Thorns,
                    xp: enemy.xp,
                    souls_min: enemy.souls_min,
                    souls_max: enemy.souls_max,
                    was_boss: enemy.kind == EnemyKind::Boss,
                });
            }
        }
    }
}

/// Система: разрешение взрывов тика (бомберы, slam брутов, бочки боссов)
#[allow(clippy::too_many_arguments)]
pub fn resolve_explosions(
    mut out: ResMut<AiOutput>,
    mut despawn: ResMut<DespawnQueue>,
    mut outbound: ResMut<OutboundEvents>,
    mut damage_events: EventWriter<DamageDealt>,
    mut down_events: EventWriter<PlayerDown>,
    mut died_events: EventWriter<EnemyDied>,
    mut player: Query<
        (Entity, &Position, &CombatStats, &mut Cooldowns, &mut Health),
        With<Player>,
    >,
    mut enemies: Query<
        (Entity, &Position, &mut Enemy, &mut Health, &mut Knockback),
        Without<Player>,
    >,
) {
    if out.explosions.is_empty() {
        return;
    }
    let explosions = std::mem::take(&mut out.explosions);

    let Ok((player_entity, player_pos, stats, mut cooldowns, mut health)) = player.single_mut()
    else {
        return;
    };

    for explosion in explosions {
        outbound.cue(CueKind::BomberExplosion);

        if explosion.position.distance(player_pos.0) <= explosion.radius + PLAYER_RADIUS {
            damage_player(
                &mut health,
                stats,
                &mut cooldowns,
                explosion.damage,
                player_entity,
                &mut damage_events,
                &mut down_events,
                &mut outbound,
            );
        }

        if !explosion.harms_enemies {
            continue;
        }
        for (entity, pos, mut enemy, mut enemy_health, mut knockback) in enemies.iter_mut() {
            if enemy.intangible() || pos.0.distance(explosion.position) > explosion.radius {
                continue;
            }
            let dir = (pos.0 - explosion.position).normalize_or_zero();
            if damage_enemy(
                &mut enemy_health,
                &mut enemy,
                &mut knockback,
                explosion.damage * 0.5,
                dir.x,
                dir.y,
            ) {
                despawn.push(entity);
                died_events.write(EnemyDied {
                    kind: enemy.kind,
                    position: pos.0,
                    source: KillSource::Explosion,
                    xp: enemy.xp,
                    souls_min: enemy.souls_min,
                    souls_max: enemy.souls_max,
                    was_boss: enemy.kind == EnemyKind::Boss,
                });
            }
        }
    }
}

/// Система: казнь — враги (не боссы) ниже 15% hp умирают мгновенно
pub fn doom_execute(
    mut despawn: ResMut<DespawnQueue>,
    mut died_events: EventWriter<EnemyDied>,
    player: Query<&Abilities, With<Player>>,
    mut enemies: Query<(Entity, &Position, &Enemy, &mut Health), Without<Player>>,
) {
    let Ok(abilities) = player.single() else {
        return;
    };
    if !abilities.doom_execute {
        return;
    }

    for (entity, pos, enemy, mut health) in enemies.iter_mut() {
        if enemy.kind == EnemyKind::Boss || !health.is_alive() {
            continue;
        }
        if health.fraction() < DOOM_THRESHOLD {
            let remaining = health.current;
            health.take_damage(remaining);
            despawn.push(entity);
            died_events.write(EnemyDied {
                kind: enemy.kind,
                position: pos.0,
                source: KillSource::Doom,
                xp: enemy.xp,
                souls_min: enemy.souls_min,
                souls_max: enemy.souls_max,
                was_boss: false,
            });
        }
    }
}

/// Система: теневой клон — автоудар по ближайшему врагу раз в 1.5s
#[allow(clippy::too_many_arguments)]
pub fn shadow_clone_strikes(
    ctrl: Res<EngineControl>,
    mut rng: ResMut<DeterministicRng>,
    mut despawn: ResMut<DespawnQueue>,
    mut damage_events: EventWriter<DamageDealt>,
    mut died_events: EventWriter<EnemyDied>,
    mut player: Query<
        (&Position, &CombatStats, &Health, &WarRhythm, &mut Abilities),
        With<Player>,
    >,
    mut enemies: Query<
        (Entity, &Position, &mut Enemy, &mut Health, &mut Knockback),
        Without<Player>,
    >,
) {
    let Ok((player_pos, stats, health, rhythm, mut abilities)) = player.single_mut() else {
        return;
    };
    if !abilities.shadow_clone {
        return;
    }

    abilities.clone_angle += ctrl.dt * 1.8;
    abilities.clone_attack_timer -= ctrl.dt;
    if abilities.clone_attack_timer > 0.0 {
        return;
    }
    abilities.clone_attack_timer = 1.5 / stats.attack_speed_mult.max(0.1);

    let target = enemies
        .iter()
        .filter(|(_, pos, enemy, h, _)| {
            !enemy.intangible() && h.is_alive() && pos.0.distance(player_pos.0) < 130.0
        })
        .min_by(|(_, a, _, _, _), (_, b, _, _, _)| {
            a.0.distance_squared(player_pos.0)
                .partial_cmp(&b.0.distance_squared(player_pos.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(e, _, _, _, _)| e);

    let Some(target) = target else {
        return;
    };
    let Ok((entity, pos, mut enemy, mut enemy_health, mut knockback)) = enemies.get_mut(target)
    else {
        return;
    };

    let (damage, crit) = compute_player_damage(
        stats,
        rhythm.damage_bonus(),
        health.fraction(),
        stats.base_damage * 0.5,
        &mut rng.rng,
    );
    let dir = (pos.0 - player_pos.0).normalize_or_zero();
    let killed = damage_enemy(
        &mut enemy_health,
        &mut enemy,
        &mut knockback,
        damage,
        dir.x,
        dir.y,
    );
    damage_events.write(DamageDealt {
        target: entity,
        amount: damage,
        crit,
        to_player: false,
    });
    if killed {
        despawn.push(entity);
        died_events.write(EnemyDied {
            kind: enemy.kind,
            position: pos.0,
            source: KillSource::Clone,
            xp: enemy.xp,
            souls_min: enemy.souls_min,
            souls_max: enemy.souls_max,
            was_boss: enemy.kind == EnemyKind::Boss,
        });
    }
}
