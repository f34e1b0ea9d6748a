//! Амулеты: постоянные вещи между забегами
//!
//! Покупаются за души в магазине или падают из боссов, живут в lifetime-
//! сейве. Надеты максимум 4; эффекты применяются при старте забега и
//! снимаются симметрично (equip/unequip — пара fn pointer-ов).
//! Неизвестный id из старого сейва молча пропускается.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::Health;
use crate::player::{Abilities, CombatStats};

pub const MAX_EQUIPPED: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmuletId {
    BloodPact,
    SwiftWind,
    WarRhythm,
    StoneHeart,
    SoulMagnet,
    ScholarsCharm,
    VampireFang,
    HuntersMark,
    EchoingShot,
    GuardianLight,
    DoomSigil,
    PhantomThorns,
}

pub struct AmuletDef {
    pub id: AmuletId,
    pub name: &'static str,
    pub description: &'static str,
    /// Цена в магазине (души)
    pub cost: u32,
    pub equip: fn(&mut CombatStats, &mut Abilities, &mut Health),
    pub unequip: fn(&mut CombatStats, &mut Abilities, &mut Health),
}

pub const ALL_AMULETS: [AmuletDef; 12] = [
    AmuletDef {
        id: AmuletId::BloodPact,
        name: "Blood Pact",
        description: "+25% damage, -20 max HP",
        cost: 80,
        equip: |s, _, h| {
            s.amulet_damage_mult += 0.25;
            h.raise_max(-20.0);
        },
        unequip: |s, _, h| {
            s.amulet_damage_mult -= 0.25;
            h.raise_max(20.0);
        },
    },
    AmuletDef {
        id: AmuletId::SwiftWind,
        name: "Swift Wind",
        description: "+20% move speed",
        cost: 60,
        equip: |s, _, _| s.amulet_speed_mult += 0.2,
        unequip: |s, _, _| s.amulet_speed_mult -= 0.2,
    },
    AmuletDef {
        id: AmuletId::WarRhythm,
        name: "War Rhythm",
        description: "Kills stack +4% damage, decays out of combat",
        cost: 100,
        // Эффект реализован стаками WarRhythm; амулет лишь открывает набор
        equip: |_, _, _| {},
        unequip: |_, _, _| {},
    },
    AmuletDef {
        id: AmuletId::StoneHeart,
        name: "Stone Heart",
        description: "+30 armor, -10% move speed",
        cost: 70,
        equip: |s, _, _| {
            s.armor += 30.0;
            s.amulet_speed_mult -= 0.1;
        },
        unequip: |s, _, _| {
            s.armor -= 30.0;
            s.amulet_speed_mult += 0.1;
        },
    },
    AmuletDef {
        id: AmuletId::SoulMagnet,
        name: "Soul Magnet",
        description: "+50% souls",
        cost: 90,
        equip: |s, _, _| s.souls_multiplier += 0.5,
        unequip: |s, _, _| s.souls_multiplier -= 0.5,
    },
    AmuletDef {
        id: AmuletId::ScholarsCharm,
        name: "Scholar's Charm",
        description: "+30% XP",
        cost: 75,
        equip: |s, _, _| s.xp_multiplier += 0.3,
        unequip: |s, _, _| s.xp_multiplier -= 0.3,
    },
    AmuletDef {
        id: AmuletId::VampireFang,
        name: "Vampire Fang",
        description: "Heal 8% of melee damage dealt",
        cost: 110,
        equip: |s, _, _| s.lifesteal += 0.08,
        unequip: |s, _, _| s.lifesteal -= 0.08,
    },
    AmuletDef {
        id: AmuletId::HuntersMark,
        name: "Hunter's Mark",
        description: "+8% crit chance",
        cost: 85,
        equip: |s, _, _| s.crit_chance += 0.08,
        unequip: |s, _, _| s.crit_chance -= 0.08,
    },
    AmuletDef {
        id: AmuletId::EchoingShot,
        name: "Echoing Shot",
        description: "30% chance a volley echoes shortly after",
        cost: 120,
        // Эхо роллится в ranged-атаке; амулет лишь открывает механику
        equip: |_, _, _| {},
        unequip: |_, _, _| {},
    },
    AmuletDef {
        id: AmuletId::GuardianLight,
        name: "Guardian Light",
        description: "+2 HP per second",
        cost: 95,
        equip: |s, _, _| s.hp_regen += 2.0,
        unequip: |s, _, _| s.hp_regen -= 2.0,
    },
    AmuletDef {
        id: AmuletId::DoomSigil,
        name: "Doom Sigil",
        description: "Execute enemies below 15% HP",
        cost: 150,
        equip: |_, a, _| a.doom_execute = true,
        unequip: |_, a, _| a.doom_execute = false,
    },
    AmuletDef {
        id: AmuletId::PhantomThorns,
        name: "Phantom Thorns",
        description: "Reflect 75% contact damage",
        cost: 100,
        equip: |s, _, _| s.thorns += 0.75,
        unequip: |s, _, _| s.thorns -= 0.75,
    },
];

pub fn amulet_def(id: AmuletId) -> &'static AmuletDef {
    ALL_AMULETS
        .iter()
        .find(|def| def.id == id)
        .unwrap_or(&ALL_AMULETS[0])
}

/// Надетые амулеты (resource). Порядок — порядок надевания.
#[derive(Resource, Debug, Default, Clone, Serialize, Deserialize)]
pub struct EquippedAmulets(pub Vec<AmuletId>);

impl EquippedAmulets {
    pub fn has(&self, id: AmuletId) -> bool {
        self.0.contains(&id)
    }

    /// Надеть: дубликаты и переполнение молча отклоняются
    pub fn equip(
        &mut self,
        id: AmuletId,
        stats: &mut CombatStats,
        abilities: &mut Abilities,
        health: &mut Health,
    ) -> bool {
        if self.0.len() >= MAX_EQUIPPED || self.has(id) {
            return false;
        }
        let def = amulet_def(id);
        (def.equip)(stats, abilities, health);
        self.0.push(id);
        crate::log_info(&format!("📿 Amulet equipped: {}", def.name));
        true
    }

    pub fn unequip(
        &mut self,
        id: AmuletId,
        stats: &mut CombatStats,
        abilities: &mut Abilities,
        health: &mut Health,
    ) -> bool {
        let Some(idx) = self.0.iter().position(|a| *a == id) else {
            return false;
        };
        let def = amulet_def(id);
        (def.unequip)(stats, abilities, health);
        self.0.remove(idx);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> (CombatStats, Abilities, Health) {
        (CombatStats::default(), Abilities::default(), Health::new(100.0))
    }

    #[test]
    fn test_equip_unequip_symmetric() {
        let (mut stats, mut abilities, mut health) = fixtures();
        let mut equipped = EquippedAmulets::default();

        assert!(equipped.equip(AmuletId::StoneHeart, &mut stats, &mut abilities, &mut health));
        assert_eq!(stats.armor, 30.0);
        assert!((stats.amulet_speed_mult - 0.9).abs() < 1e-6);

        assert!(equipped.unequip(AmuletId::StoneHeart, &mut stats, &mut abilities, &mut health));
        assert_eq!(stats.armor, 0.0);
        assert!((stats.amulet_speed_mult - 1.0).abs() < 1e-6);
        assert!(equipped.0.is_empty());
    }

    #[test]
    fn test_max_four_equipped() {
        let (mut stats, mut abilities, mut health) = fixtures();
        let mut equipped = EquippedAmulets::default();

        for id in [
            AmuletId::SwiftWind,
            AmuletId::SoulMagnet,
            AmuletId::HuntersMark,
            AmuletId::GuardianLight,
        ] {
            assert!(equipped.equip(id, &mut stats, &mut abilities, &mut health));
        }
        assert!(!equipped.equip(AmuletId::VampireFang, &mut stats, &mut abilities, &mut health));
        assert_eq!(equipped.0.len(), MAX_EQUIPPED);
    }

    #[test]
    fn test_duplicate_equip_rejected() {
        let (mut stats, mut abilities, mut health) = fixtures();
        let mut equipped = EquippedAmulets::default();

        assert!(equipped.equip(AmuletId::SwiftWind, &mut stats, &mut abilities, &mut health));
        assert!(!equipped.equip(AmuletId::SwiftWind, &mut stats, &mut abilities, &mut health));
        // Эффект применён ровно один раз
        assert!((stats.amulet_speed_mult - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_blood_pact_tradeoff() {
        let (mut stats, mut abilities, mut health) = fixtures();
        let mut equipped = EquippedAmulets::default();

        equipped.equip(AmuletId::BloodPact, &mut stats, &mut abilities, &mut health);
        assert!((stats.amulet_damage_mult - 1.25).abs() < 1e-6);
        assert_eq!(health.max, 80.0);
        // hp зажат к новому максимуму
        assert!(health.current <= health.max);
    }
}
