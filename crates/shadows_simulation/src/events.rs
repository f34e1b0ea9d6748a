//! События симуляции
//!
//! Два слоя:
//! - Внутренние Bevy events (`DamageDealt`, `EnemyDied`, ...) — связь между
//!   системами одного тика, порядок writer → reader гарантирован `.chain()`.
//! - `OutboundEvents` — очередь для хоста (UI/рендер/аудио). Заменяет
//!   callback-набор оригинала: хост дренирует очередь после каждого тика
//!   и сам решает что показывать/проигрывать.

use bevy::prelude::*;

use crate::dungeon::RoomKind;
use crate::enemy::EnemyKind;
use crate::items::upgrades::UpgradeId;

/// Внутреннее событие: урон нанесён (в любую сторону)
#[derive(Event, Debug, Clone)]
pub struct DamageDealt {
    pub target: Entity,
    pub amount: f32,
    pub crit: bool,
    /// true — жертва игрок, false — враг
    pub to_player: bool,
}

/// Источник убийства — влияет на kill-reward (melee даёт бонус)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSource {
    Melee,
    Projectile,
    Explosion,
    Thorns,
    Doom,
    Clone,
}

/// Внутреннее событие: враг умер. Kill-reward обрабатывается ровно один раз
/// на событие (сущность к этому моменту уже despawn-ится mark-and-sweep).
#[derive(Event, Debug, Clone)]
pub struct EnemyDied {
    pub kind: EnemyKind,
    pub position: Vec2,
    pub source: KillSource,
    pub xp: u32,
    pub souls_min: u32,
    pub souls_max: u32,
    pub was_boss: bool,
}

/// Внутреннее событие: hp игрока упало до нуля (revive проверяется читателем)
#[derive(Event, Debug, Clone)]
pub struct PlayerDown;

/// Аудио/VFX-сигналы — one-shot маркеры для хоста
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueKind {
    MeleeSwing,
    MeleeHit,
    RangedShot,
    Dash,
    PlayerHurt,
    EnemyHit,
    BomberExplosion,
    NecromancerSummon,
    StalkerLunge,
    FlashHunterAppear,
    DistortionEnter,
    FlickerBuzz,
    WarperTeleport,
    AcceleratorCharge,
    TrapTriggered,
    TreasureCollected,
    ShrineUsed,
    DoorOpen,
    LevelUp,
    BossRoar,
    HorrorWhisper,
}

/// Сводка забега для game-over экрана и lifetime record
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub floor: u32,
    pub level: u32,
    pub kills: u32,
    pub souls_earned: u32,
    pub damage_dealt: f32,
    pub damage_taken: f32,
    pub playtime: f32,
}

/// Позиция в витрине магазина
#[derive(Debug, Clone)]
pub struct ShopListing {
    pub name: String,
    pub description: String,
    pub cost: u32,
}

/// События наружу (хост дренирует через `Shadows::drain_events`)
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Пауза уже включена движком; хост показывает 3 варианта
    LevelUpReady { level: u32, choices: Vec<UpgradeId> },
    GameOver { summary: RunSummary },
    SynergyActivated { name: String },
    FloorChanged { floor: u32 },
    RoomEntered { kind: RoomKind },
    ShopOpened { listings: Vec<ShopListing>, souls: u32 },
    ShopClosed,
    AmuletDropped { amulet: crate::items::amulets::AmuletId },
    SanctuaryOpened,
    SanctuaryClosed,
    Audio { cue: CueKind },
    ScreenShake { strength: f32, duration: f32 },
    ScreenFlash { duration: f32 },
    Victory { floor: u32 },
}

/// Очередь исходящих событий (resource)
#[derive(Resource, Debug, Default)]
pub struct OutboundEvents(pub Vec<HostEvent>);

impl OutboundEvents {
    pub fn push(&mut self, event: HostEvent) {
        self.0.push(event);
    }

    pub fn cue(&mut self, cue: CueKind) {
        self.0.push(HostEvent::Audio { cue });
    }

    pub fn drain(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.0)
    }
}
