//! Сохранения: снапшот забега, lifetime-рекорд, настройки
//!
//! Хранилище — trait `SaveStore`: хост подставляет свой бекенд
//! (localStorage и т.п.), тесты и headless — `MemoryStore`. Всё fail-soft:
//! битый JSON или отказ записи логируются и игнорируются, игра продолжается
//! без сейва. Снапшот забега протухает через 24 часа.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::components::Health;
use crate::items::amulets::AmuletId;
use crate::items::upgrades::TakenUpgrades;
use crate::player::{Abilities, CombatStats, Level};

pub const RUN_KEY: &str = "shadows_run";
pub const LIFETIME_KEY: &str = "shadows_lifetime";
pub const PREFS_KEY: &str = "shadows_prefs";

const RUN_EXPIRY_SECS: i64 = 24 * 60 * 60;

/// Key-value бекенд сохранений
pub trait SaveStore: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;
    /// false — запись не удалась (квота, приватный режим); вызывающий
    /// логирует и продолжает
    fn write(&mut self, key: &str, value: &str) -> bool;
    fn remove(&mut self, key: &str);
}

/// In-memory хранилище (тесты, headless-бинарь)
#[derive(Debug, Default)]
pub struct MemoryStore(HashMap<String, String>);

impl SaveStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: &str) -> bool {
        self.0.insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }
}

/// Хранилище как resource
#[derive(Resource)]
pub struct SaveStoreRes(pub Box<dyn SaveStore>);

impl Default for SaveStoreRes {
    fn default() -> Self {
        Self(Box::new(MemoryStore::default()))
    }
}

/// Снапшот забега (автосейв раз в 30s + на переходах комнат)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub saved_at_unix: i64,
    pub seed: u64,
    pub floor: u32,
    pub health: Health,
    pub stats: CombatStats,
    pub level: Level,
    pub abilities: Abilities,
    pub taken: TakenUpgrades,
    pub kills: u32,
    pub souls_earned: u32,
    pub playtime: f32,
}

/// Lifetime-прогресс между забегами
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifetimeRecord {
    pub souls: u32,
    pub best_floor: u32,
    pub total_kills: u64,
    pub total_runs: u32,
    pub victories: u32,
    pub owned_amulets: Vec<AmuletId>,
    pub equipped_amulets: Vec<AmuletId>,
}

/// Настройки хоста (просто проксируются через сейв)
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub screen_shake: bool,
    pub damage_numbers: bool,
    pub audio_volume: f32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            screen_shake: true,
            damage_numbers: true,
            audio_volume: 0.8,
        }
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn save_run(store: &mut SaveStoreRes, snapshot: &RunSnapshot) {
    match serde_json::to_string(snapshot) {
        Ok(json) => {
            if !store.0.write(RUN_KEY, &json) {
                crate::log_warning("Run save write failed, continuing without save");
            }
        }
        Err(e) => crate::log_warning(&format!("Run snapshot serialize failed: {}", e)),
    }
}

/// Читает снапшот забега; None если нет, битый или старше 24 часов
pub fn load_run(store: &SaveStoreRes) -> Option<RunSnapshot> {
    let json = store.0.read(RUN_KEY)?;
    let snapshot: RunSnapshot = match serde_json::from_str(&json) {
        Ok(s) => s,
        Err(e) => {
            crate::log_warning(&format!("Run save corrupted, ignoring: {}", e));
            return None;
        }
    };
    if now_unix() - snapshot.saved_at_unix > RUN_EXPIRY_SECS {
        crate::log_info("Run save expired (>24h), starting fresh");
        return None;
    }
    Some(snapshot)
}

pub fn clear_run(store: &mut SaveStoreRes) {
    store.0.remove(RUN_KEY);
}

pub fn save_lifetime(store: &mut SaveStoreRes, record: &LifetimeRecord) {
    match serde_json::to_string(record) {
        Ok(json) => {
            if !store.0.write(LIFETIME_KEY, &json) {
                crate::log_warning("Lifetime save write failed");
            }
        }
        Err(e) => crate::log_warning(&format!("Lifetime serialize failed: {}", e)),
    }
}

pub fn load_lifetime(store: &SaveStoreRes) -> LifetimeRecord {
    let Some(json) = store.0.read(LIFETIME_KEY) else {
        return LifetimeRecord::default();
    };
    serde_json::from_str(&json).unwrap_or_else(|e| {
        crate::log_warning(&format!("Lifetime record corrupted, resetting: {}", e));
        LifetimeRecord::default()
    })
}

pub fn save_preferences(store: &mut SaveStoreRes, prefs: &Preferences) {
    if let Ok(json) = serde_json::to_string(prefs) {
        store.0.write(PREFS_KEY, &json);
    }
}

pub fn load_preferences(store: &SaveStoreRes) -> Preferences {
    store
        .0
        .read(PREFS_KEY)
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(saved_at: i64) -> RunSnapshot {
        RunSnapshot {
            saved_at_unix: saved_at,
            seed: 42,
            floor: 2,
            health: Health::new(100.0),
            stats: CombatStats::default(),
            level: Level::default(),
            abilities: Abilities::default(),
            taken: TakenUpgrades::default(),
            kills: 17,
            souls_earned: 55,
            playtime: 321.0,
        }
    }

    #[test]
    fn test_run_roundtrip() {
        let mut store = SaveStoreRes::default();
        save_run(&mut store, &snapshot(now_unix()));
        let loaded = load_run(&store).expect("fresh save must load");
        assert_eq!(loaded.floor, 2);
        assert_eq!(loaded.kills, 17);
        assert_eq!(loaded.seed, 42);
    }

    #[test]
    fn test_expired_run_ignored() {
        let mut store = SaveStoreRes::default();
        save_run(&mut store, &snapshot(now_unix() - RUN_EXPIRY_SECS - 10));
        assert!(load_run(&store).is_none());
    }

    #[test]
    fn test_corrupted_run_failsoft() {
        let mut store = SaveStoreRes::default();
        store.0.write(RUN_KEY, "{not valid json!");
        assert!(load_run(&store).is_none());
    }

    #[test]
    fn test_lifetime_defaults_when_missing_or_corrupt() {
        let store = SaveStoreRes::default();
        let record = load_lifetime(&store);
        assert_eq!(record.souls, 0);

        let mut store = SaveStoreRes::default();
        store.0.write(LIFETIME_KEY, "###");
        let record = load_lifetime(&store);
        assert_eq!(record.best_floor, 0);
    }

    #[test]
    fn test_preferences_roundtrip_and_default() {
        let mut store = SaveStoreRes::default();
        assert!(load_preferences(&store).screen_shake);

        let prefs = Preferences {
            screen_shake: false,
            damage_numbers: true,
            audio_volume: 0.5,
        };
        save_preferences(&mut store, &prefs);
        let loaded = load_preferences(&store);
        assert!(!loaded.screen_shake);
        assert_eq!(loaded.audio_volume, 0.5);
    }

    #[test]
    fn test_clear_run() {
        let mut store = SaveStoreRes::default();
        save_run(&mut store, &snapshot(now_unix()));
        clear_run(&mut store);
        assert!(load_run(&store).is_none());
    }
}
