//! Боевая математика и melee/ranged атаки игрока
//!
//! Формула урона игрока — композиция множителей:
//! base × damage_multiplier × amulet_damage_mult × war-rhythm × berserk.
//! Crit роллится на каждый удар отдельно. Броня жертвы: 100/(100+armor).
//!
//! Melee — дуга перед точкой прицеливания с комбо 1→2→3→4 (4-й шаг тяжелее
//! бьёт и толкает). Ranged — веер снарядов (projectile.rs).

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::components::{Health, Knockback, Position};
use crate::constants::*;
use crate::engine::DespawnQueue;
use crate::enemy::{damage_enemy, Enemy};
use crate::events::{CueKind, DamageDealt, EnemyDied, KillSource, OutboundEvents, PlayerDown};
use crate::player::{CombatStats, Cooldowns, Player, PlayerInput, WarRhythm};
use crate::DeterministicRng;

pub mod projectile;

/// Множитель урона по шагу комбо
pub fn combo_damage_mult(step: u8) -> f32 {
    match step {
        2 => 1.1,
        3 => 1.25,
        4 => 1.45,
        _ => 1.0,
    }
}

/// Итоговый урон игрока с ролом крита.
/// berserk ×1.8 активен только с флагом berserker и hp < 30%.
pub fn compute_player_damage(
    stats: &CombatStats,
    rhythm_bonus: f32,
    hp_fraction: f32,
    base: f32,
    rng: &mut ChaCha8Rng,
) -> (f32, bool) {
    let mut damage = base * stats.damage_multiplier * stats.amulet_damage_mult * rhythm_bonus;
    if stats.berserker && hp_fraction < BERSERK_THRESHOLD {
        damage *= BERSERK_MULT;
    }
    let crit = rng.gen_bool(stats.crit_chance.clamp(0.0, 1.0) as f64);
    if crit {
        damage *= stats.crit_multiplier;
    }
    (damage, crit)
}

/// Редукция входящего урона бронёй
pub fn armor_reduction(damage: f32, armor: f32) -> f32 {
    damage * 100.0 / (100.0 + armor.max(0.0))
}

/// Урон по игроку: i-frames гейтят полностью, иначе броня + короткое окно
/// неуязвимости после удара. PlayerDown шлётся на пересечении нуля.
#[allow(clippy::too_many_arguments)]
pub fn damage_player(
    health: &mut Health,
    stats: &CombatStats,
    cooldowns: &mut Cooldowns,
    raw: f32,
    target: Entity,
    damage_events: &mut EventWriter<DamageDealt>,
    down_events: &mut EventWriter<PlayerDown>,
    outbound: &mut OutboundEvents,
) -> f32 {
    if cooldowns.invincibility > 0.0 || !health.is_alive() {
        return 0.0;
    }
    let amount = armor_reduction(raw, stats.armor);
    let was_alive = health.is_alive();
    health.take_damage(amount);
    cooldowns.invincibility = cooldowns.invincibility.max(0.6);
    outbound.cue(CueKind::PlayerHurt);
    damage_events.write(DamageDealt {
        target,
        amount,
        crit: false,
        to_player: true,
    });
    if was_alive && !health.is_alive() {
        down_events.write(PlayerDown);
    }
    amount
}

/// Проверка попадания в melee-дугу
fn in_melee_arc(origin: Vec2, aim_dir: Vec2, target: Vec2, range: f32, target_radius: f32) -> bool {
    let to_target = target - origin;
    let dist = to_target.length();
    if dist > range + target_radius {
        return false;
    }
    if dist < 0.001 {
        return true;
    }
    aim_dir.angle_to(to_target / dist).abs() <= MELEE_ARC * 0.5
}

/// Система: melee-атака игрока
#[allow(clippy::too_many_arguments)]
pub fn player_melee_attack(
    mut input: ResMut<PlayerInput>,
    mut rng: ResMut<DeterministicRng>,
    mut outbound: ResMut<OutboundEvents>,
    mut despawn: ResMut<DespawnQueue>,
    mut damage_events: EventWriter<DamageDealt>,
    mut died_events: EventWriter<EnemyDied>,
    mut player: Query<
        (&Position, &CombatStats, &mut Cooldowns, &mut Health, &WarRhythm),
        With<Player>,
    >,
    mut enemies: Query<
        (Entity, &Position, &mut Enemy, &mut Health, &mut Knockback),
        Without<Player>,
    >,
) {
    if !input.melee_pressed {
        return;
    }
    input.melee_pressed = false;

    let Ok((pos, stats, mut cooldowns, mut health, rhythm)) = player.single_mut() else {
        return;
    };
    if cooldowns.melee > 0.0 {
        return;
    }

    cooldowns.melee = MELEE_COOLDOWN / stats.attack_speed_mult.max(0.1);
    cooldowns.swing_slow = MELEE_SWING_SLOW;
    let step = cooldowns.advance_combo();
    outbound.cue(CueKind::MeleeSwing);

    let origin = pos.0;
    let aim_dir = {
        let to_aim = input.aim - origin;
        if to_aim.length_squared() > 0.01 {
            to_aim.normalize()
        } else {
            Vec2::X
        }
    };
    let range = MELEE_RANGE * stats.area_multiplier;
    let hp_fraction = health.fraction();
    let knock_mult = if step == 4 { 1.8 } else { 1.0 };

    let mut total_dealt = 0.0;
    let mut any_hit = false;

    for (entity, enemy_pos, mut enemy, mut enemy_health, mut knockback) in enemies.iter_mut() {
        if enemy.intangible() {
            continue;
        }
        if !in_melee_arc(origin, aim_dir, enemy_pos.0, range, enemy.radius) {
            continue;
        }

        let base = stats.base_damage * combo_damage_mult(step);
        let (damage, crit) =
            compute_player_damage(stats, rhythm.damage_bonus(), hp_fraction, base, &mut rng.rng);

        let kdir = (enemy_pos.0 - origin).normalize_or_zero() * knock_mult;
        let killed = damage_enemy(
            &mut enemy_health,
            &mut enemy,
            &mut knockback,
            damage,
            kdir.x,
            kdir.y,
        );
        any_hit = true;
        total_dealt += damage;
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
                position: enemy_pos.0,
                source: KillSource::Melee,
                xp: enemy.xp,
                souls_min: enemy.souls_min,
                souls_max: enemy.souls_max,
                was_boss: enemy.kind == crate::enemy::EnemyKind::Boss,
            });
        }
    }

    if any_hit {
        outbound.cue(CueKind::MeleeHit);
        if stats.lifesteal > 0.0 {
            health.heal(total_dealt * stats.lifesteal);
        }
    }
}

/// CombatPlugin: события боя. Системы вставляет движок в нужные SimSet-ы.
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<DamageDealt>()
            .add_event::<EnemyDied>()
            .add_event::<PlayerDown>()
            .init_resource::<projectile::VolleyCounter>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_armor_reduction() {
        assert_eq!(armor_reduction(100.0, 0.0), 100.0);
        assert_eq!(armor_reduction(100.0, 100.0), 50.0);
        assert!((armor_reduction(100.0, 25.0) - 80.0).abs() < 1e-4);
        // Отрицательная броня не усиливает урон
        assert_eq!(armor_reduction(100.0, -50.0), 100.0);
    }

    #[test]
    fn test_combo_mults() {
        assert_eq!(combo_damage_mult(1), 1.0);
        assert_eq!(combo_damage_mult(4), 1.45);
        assert_eq!(combo_damage_mult(0), 1.0);
    }

    #[test]
    fn test_berserk_applies_below_threshold() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut stats = CombatStats::default();
        stats.crit_chance = 0.0;
        stats.berserker = true;

        let (normal, _) = compute_player_damage(&stats, 1.0, 0.5, 10.0, &mut rng);
        assert!((normal - 10.0).abs() < 1e-4);

        let (berserk, _) = compute_player_damage(&stats, 1.0, 0.2, 10.0, &mut rng);
        assert!((berserk - 18.0).abs() < 1e-4);

        // Без флага порог ничего не даёт
        stats.berserker = false;
        let (plain, _) = compute_player_damage(&stats, 1.0, 0.2, 10.0, &mut rng);
        assert!((plain - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_crit_always_with_full_chance() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut stats = CombatStats::default();
        stats.crit_chance = 1.0;
        let (damage, crit) = compute_player_damage(&stats, 1.0, 1.0, 10.0, &mut rng);
        assert!(crit);
        assert!((damage - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_melee_arc_membership() {
        let origin = Vec2::new(100.0, 100.0);
        let aim = Vec2::X;
        // Прямо по курсу в радиусе
        assert!(in_melee_arc(origin, aim, Vec2::new(150.0, 100.0), 68.0, 13.0));
        // Позади
        assert!(!in_melee_arc(origin, aim, Vec2::new(40.0, 100.0), 68.0, 13.0));
        // Сбоку за пределами дуги (90° > 57.3°)
        assert!(!in_melee_arc(origin, aim, Vec2::new(100.0, 150.0), 68.0, 13.0));
        // Дальше range + radius
        assert!(!in_melee_arc(origin, aim, Vec2::new(300.0, 100.0), 68.0, 13.0));
    }
}
