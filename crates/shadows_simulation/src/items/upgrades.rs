//! Апгрейды level-up: реестр, рарити-взвешенный ролл, теговые синергии
//!
//! Эффект — fn pointer, мутирующий статы напрямую. Одноразовые апгрейды
//! (флаги, epic-способности) выпадают максимум раз за забег; стакающиеся
//! могут выпадать повторно, но не дублируются внутри одной тройки выбора.
//! Синергия тега срабатывает ровно один раз при наборе трёх апгрейдов тега.

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::Health;
use crate::events::{HostEvent, OutboundEvents};
use crate::player::{Abilities, CombatStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeId {
    KeenEdge,
    HeavyBlows,
    SwiftStrikes,
    LongReach,
    SplitShot,
    PiercingShots,
    ExplosiveShots,
    ChainLightning,
    PowerShots,
    IronSkin,
    ThornHide,
    Vitality,
    Regeneration,
    FleetFoot,
    CriticalEye,
    DeadlyPrecision,
    BerserkerRage,
    BloodDrinker,
    GreedOfSouls,
    ScholarsMind,
    ShadowClone,
    DoomExecute,
    SecondWind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
}

impl Rarity {
    fn weight(&self) -> u32 {
        match self {
            Rarity::Common => 60,
            Rarity::Rare => 30,
            Rarity::Epic => 10,
        }
    }
}

/// Теги для синергий
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Blade,
    Arrow,
    Bulwark,
    Shadow,
    Fury,
}

pub struct UpgradeDef {
    pub id: UpgradeId,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub tag: Tag,
    /// Одноразовый: не предлагается повторно после взятия
    pub unique: bool,
    pub apply: fn(&mut CombatStats, &mut Abilities, &mut Health),
}

pub const ALL_UPGRADES: [UpgradeDef; 23] = [
    UpgradeDef {
        id: UpgradeId::KeenEdge,
        name: "Keen Edge",
        description: "+4 melee damage",
        rarity: Rarity::Common,
        tag: Tag::Blade,
        unique: false,
        apply: |s, _, _| s.base_damage += 4.0,
    },
    UpgradeDef {
        id: UpgradeId::HeavyBlows,
        name: "Heavy Blows",
        description: "+15% all damage",
        rarity: Rarity::Common,
        tag: Tag::Blade,
        unique: false,
        apply: |s, _, _| s.damage_multiplier += 0.15,
    },
    UpgradeDef {
        id: UpgradeId::SwiftStrikes,
        name: "Swift Strikes",
        description: "+20% attack speed",
        rarity: Rarity::Common,
        tag: Tag::Blade,
        unique: false,
        apply: |s, _, _| s.attack_speed_mult += 0.2,
    },
    UpgradeDef {
        id: UpgradeId::LongReach,
        name: "Long Reach",
        description: "+20% attack area",
        rarity: Rarity::Rare,
        tag: Tag::Blade,
        unique: false,
        apply: |s, _, _| s.area_multiplier += 0.2,
    },
    UpgradeDef {
        id: UpgradeId::SplitShot,
        name: "Split Shot",
        description: "+1 projectile per volley",
        rarity: Rarity::Rare,
        tag: Tag::Arrow,
        unique: false,
        apply: |s, _, _| s.projectile_count += 1,
    },
    UpgradeDef {
        id: UpgradeId::PiercingShots,
        name: "Piercing Shots",
        description: "Projectiles pass through enemies",
        rarity: Rarity::Rare,
        tag: Tag::Arrow,
        unique: true,
        apply: |s, _, _| s.piercing = true,
    },
    UpgradeDef {
        id: UpgradeId::ExplosiveShots,
        name: "Explosive Shots",
        description: "Projectiles explode on hit",
        rarity: Rarity::Rare,
        tag: Tag::Arrow,
        unique: true,
        apply: |s, _, _| s.explosive = true,
    },
    UpgradeDef {
        id: UpgradeId::ChainLightning,
        name: "Chain Lightning",
        description: "Hits arc to 2 nearby enemies",
        rarity: Rarity::Epic,
        tag: Tag::Arrow,
        unique: false,
        apply: |s, _, _| s.chain_bounces += 2,
    },
    UpgradeDef {
        id: UpgradeId::PowerShots,
        name: "Power Shots",
        description: "+3 projectile damage",
        rarity: Rarity::Common,
        tag: Tag::Arrow,
        unique: false,
        apply: |s, _, _| s.projectile_damage += 3.0,
    },
    UpgradeDef {
        id: UpgradeId::IronSkin,
        name: "Iron Skin",
        description: "+20 armor",
        rarity: Rarity::Common,
        tag: Tag::Bulwark,
        unique: false,
        apply: |s, _, _| s.armor += 20.0,
    },
    UpgradeDef {
        id: UpgradeId::ThornHide,
        name: "Thorn Hide",
        description: "Reflect 50% contact damage",
        rarity: Rarity::Rare,
        tag: Tag::Bulwark,
        unique: false,
        apply: |s, _, _| s.thorns += 0.5,
    },
    UpgradeDef {
        id: UpgradeId::Vitality,
        name: "Vitality",
        description: "+25 max HP, heal 25",
        rarity: Rarity::Common,
        tag: Tag::Bulwark,
        unique: false,
        // raise_max сдвигает и current — хил на 25 уже внутри
        apply: |_, _, h| h.raise_max(25.0),
    },
    UpgradeDef {
        id: UpgradeId::Regeneration,
        name: "Regeneration",
        description: "+1.5 HP per second",
        rarity: Rarity::Rare,
        tag: Tag::Bulwark,
        unique: false,
        apply: |s, _, _| s.hp_regen += 1.5,
    },
    UpgradeDef {
        id: UpgradeId::FleetFoot,
        name: "Fleet Foot",
        description: "+15% move speed",
        rarity: Rarity::Common,
        tag: Tag::Shadow,
        unique: false,
        apply: |s, _, _| s.move_speed_mult += 0.15,
    },
    UpgradeDef {
        id: UpgradeId::CriticalEye,
        name: "Critical Eye",
        description: "+10% crit chance",
        rarity: Rarity::Common,
        tag: Tag::Shadow,
        unique: false,
        apply: |s, _, _| s.crit_chance += 0.1,
    },
    UpgradeDef {
        id: UpgradeId::DeadlyPrecision,
        name: "Deadly Precision",
        description: "+50% crit damage",
        rarity: Rarity::Rare,
        tag: Tag::Shadow,
        unique: false,
        apply: |s, _, _| s.crit_multiplier += 0.5,
    },
    UpgradeDef {
        id: UpgradeId::BerserkerRage,
        name: "Berserker Rage",
        description: "×1.8 damage below 30% HP",
        rarity: Rarity::Rare,
        tag: Tag::Fury,
        unique: true,
        apply: |s, _, _| s.berserker = true,
    },
    UpgradeDef {
        id: UpgradeId::BloodDrinker,
        name: "Blood Drinker",
        description: "Heal 5% of melee damage dealt",
        rarity: Rarity::Rare,
        tag: Tag::Fury,
        unique: false,
        apply: |s, _, _| s.lifesteal += 0.05,
    },
    UpgradeDef {
        id: UpgradeId::GreedOfSouls,
        name: "Greed of Souls",
        description: "+25% souls",
        rarity: Rarity::Common,
        tag: Tag::Fury,
        unique: false,
        apply: |s, _, _| s.souls_multiplier += 0.25,
    },
    UpgradeDef {
        id: UpgradeId::ScholarsMind,
        name: "Scholar's Mind",
        description: "+25% XP",
        rarity: Rarity::Common,
        tag: Tag::Shadow,
        unique: false,
        apply: |s, _, _| s.xp_multiplier += 0.25,
    },
    UpgradeDef {
        id: UpgradeId::ShadowClone,
        name: "Shadow Clone",
        description: "A clone strikes nearby enemies",
        rarity: Rarity::Epic,
        tag: Tag::Shadow,
        unique: true,
        apply: |_, a, _| a.shadow_clone = true,
    },
    UpgradeDef {
        id: UpgradeId::DoomExecute,
        name: "Executioner's Doom",
        description: "Instantly kill enemies below 15% HP",
        rarity: Rarity::Epic,
        tag: Tag::Fury,
        unique: true,
        apply: |_, a, _| a.doom_execute = true,
    },
    UpgradeDef {
        id: UpgradeId::SecondWind,
        name: "Second Wind",
        description: "Revive once at 30% HP",
        rarity: Rarity::Epic,
        tag: Tag::Bulwark,
        unique: true,
        apply: |_, a, _| a.has_revive = true,
    },
];

pub fn upgrade_def(id: UpgradeId) -> &'static UpgradeDef {
    ALL_UPGRADES
        .iter()
        .find(|def| def.id == id)
        .unwrap_or(&ALL_UPGRADES[0])
}

/// Взятые апгрейды забега + активированные синергии
#[derive(Resource, Debug, Default, Clone, Serialize, Deserialize)]
pub struct TakenUpgrades {
    pub taken: Vec<UpgradeId>,
    /// Имена сработавших синергий; owned, потому что едут в сейв
    pub synergies: Vec<String>,
}

/// Синергия: 3 апгрейда одного тега
struct Synergy {
    tag: Tag,
    name: &'static str,
    apply: fn(&mut CombatStats),
}

const SYNERGIES: [Synergy; 5] = [
    Synergy {
        tag: Tag::Blade,
        name: "Blademaster",
        apply: |s| s.base_damage += 6.0,
    },
    Synergy {
        tag: Tag::Arrow,
        name: "Storm of Arrows",
        apply: |s| s.projectile_damage += 4.0,
    },
    Synergy {
        tag: Tag::Bulwark,
        name: "Unbreakable",
        apply: |s| s.armor += 15.0,
    },
    Synergy {
        tag: Tag::Shadow,
        name: "One With Darkness",
        apply: |s| s.crit_chance += 0.05,
    },
    Synergy {
        tag: Tag::Fury,
        name: "Bloodlust",
        apply: |s| s.damage_multiplier += 0.1,
    },
];

impl TakenUpgrades {
    fn tag_count(&self, tag: Tag) -> usize {
        self.taken
            .iter()
            .filter(|id| upgrade_def(**id).tag == tag)
            .count()
    }
}

/// Ролл тройки выбора: рарити-взвешенно, без дублей внутри тройки,
/// одноразовые уже взятые исключены. Пустой пул невозможен (стакающихся
/// common-ов больше трёх).
pub fn roll_choices(taken: &TakenUpgrades, rng: &mut ChaCha8Rng) -> Vec<UpgradeId> {
    let mut pool: Vec<&UpgradeDef> = ALL_UPGRADES
        .iter()
        .filter(|def| !(def.unique && taken.taken.contains(&def.id)))
        .collect();

    let mut choices = Vec::with_capacity(3);
    for _ in 0..3 {
        if pool.is_empty() {
            break;
        }
        let total: u32 = pool.iter().map(|d| d.rarity.weight()).sum();
        let mut roll = rng.gen_range(0..total);
        let mut picked = 0;
        for (i, def) in pool.iter().enumerate() {
            let w = def.rarity.weight();
            if roll < w {
                picked = i;
                break;
            }
            roll -= w;
        }
        choices.push(pool.swap_remove(picked).id);
    }
    choices
}

/// Применение выбранного апгрейда + проверка синергий (one-shot на тег)
pub fn apply_upgrade(
    id: UpgradeId,
    taken: &mut TakenUpgrades,
    stats: &mut CombatStats,
    abilities: &mut Abilities,
    health: &mut Health,
    outbound: &mut OutboundEvents,
) {
    let def = upgrade_def(id);
    (def.apply)(stats, abilities, health);
    taken.taken.push(id);
    crate::log_info(&format!("⬆️ Upgrade taken: {}", def.name));

    for synergy in &SYNERGIES {
        if taken.tag_count(synergy.tag) >= 3
            && !taken.synergies.iter().any(|n| n == synergy.name)
        {
            (synergy.apply)(stats);
            taken.synergies.push(synergy.name.to_string());
            outbound.push(HostEvent::SynergyActivated {
                name: synergy.name.to_string(),
            });
            crate::log_info(&format!("✨ Synergy activated: {}", synergy.name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_roll_gives_three_distinct() {
        let taken = TakenUpgrades::default();
        for seed in 0..20u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let choices = roll_choices(&taken, &mut rng);
            assert_eq!(choices.len(), 3);
            assert_ne!(choices[0], choices[1]);
            assert_ne!(choices[1], choices[2]);
            assert_ne!(choices[0], choices[2]);
        }
    }

    #[test]
    fn test_unique_not_offered_twice() {
        let mut taken = TakenUpgrades::default();
        taken.taken.push(UpgradeId::PiercingShots);
        for seed in 0..50u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let choices = roll_choices(&taken, &mut rng);
            assert!(!choices.contains(&UpgradeId::PiercingShots), "seed {}", seed);
        }
    }

    #[test]
    fn test_apply_mutates_stats() {
        let mut taken = TakenUpgrades::default();
        let mut stats = CombatStats::default();
        let mut abilities = Abilities::default();
        let mut health = Health::new(100.0);
        let mut outbound = OutboundEvents::default();

        apply_upgrade(
            UpgradeId::IronSkin,
            &mut taken,
            &mut stats,
            &mut abilities,
            &mut health,
            &mut outbound,
        );
        assert_eq!(stats.armor, 20.0);
        assert_eq!(taken.taken.len(), 1);
    }

    #[test]
    fn test_synergy_fires_once_at_three_tags() {
        let mut taken = TakenUpgrades::default();
        let mut stats = CombatStats::default();
        let mut abilities = Abilities::default();
        let mut health = Health::new(100.0);
        let mut outbound = OutboundEvents::default();

        // Три Blade-апгрейда → Blademaster (+6 base damage поверх эффектов)
        for id in [UpgradeId::KeenEdge, UpgradeId::HeavyBlows, UpgradeId::SwiftStrikes] {
            apply_upgrade(
                id,
                &mut taken,
                &mut stats,
                &mut abilities,
                &mut health,
                &mut outbound,
            );
        }
        assert_eq!(taken.synergies, vec!["Blademaster"]);
        // 12 + 4 (KeenEdge) + 6 (синергия)
        assert_eq!(stats.base_damage, 22.0);

        // Четвёртый Blade не активирует повторно
        apply_upgrade(
            UpgradeId::KeenEdge,
            &mut taken,
            &mut stats,
            &mut abilities,
            &mut health,
            &mut outbound,
        );
        assert_eq!(taken.synergies.len(), 1);
    }

    #[test]
    fn test_taken_upgrades_serde_roundtrip() {
        let mut taken = TakenUpgrades::default();
        taken.taken.push(UpgradeId::KeenEdge);
        taken.synergies.push("Blademaster".to_string());

        let json = serde_json::to_string(&taken).expect("serialize");
        let restored: TakenUpgrades = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored.taken, taken.taken);
        assert_eq!(restored.synergies, vec!["Blademaster"]);
    }

    #[test]
    fn test_vitality_raises_and_heals() {
        let mut taken = TakenUpgrades::default();
        let mut stats = CombatStats::default();
        let mut abilities = Abilities::default();
        let mut health = Health::new(100.0);
        health.take_damage(50.0);
        let mut outbound = OutboundEvents::default();

        apply_upgrade(
            UpgradeId::Vitality,
            &mut taken,
            &mut stats,
            &mut abilities,
            &mut health,
            &mut outbound,
        );
        assert_eq!(health.max, 125.0);
        assert_eq!(health.current, 75.0);
    }
}
