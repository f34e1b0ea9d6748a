//! Dungeon of Shadows — ядро симуляции
//!
//! ECS-симуляция на Bevy 0.16, полностью headless: рендер, ввод и аудио —
//! забота хоста (canvas-оболочка, тесты). Граница — фасад [`Shadows`]:
//! хост пишет `PlayerInput`, гоняет `tick()` на 60Hz и дренирует
//! `HostEvent`-ы после каждого тика.
//!
//! Детерминизм: один ChaCha8 RNG на весь мир, системы строго упорядочены
//! цепочкой в FixedUpdate, одинаковый seed + одинаковый ввод → одинаковый
//! забег бит-в-бит.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub mod combat;
pub mod components;
pub mod constants;
pub mod dungeon;
pub mod engine;
pub mod enemy;
pub mod events;
pub mod items;
pub mod logger;
pub mod persistence;
pub mod player;

pub use logger::*;

use constants::*;
use dungeon::{generate_dungeon, Dungeon, RoomKind};
use engine::{EngineControl, EnginePlugin, RoomSession, RunStats};
use events::{HostEvent, OutboundEvents};
use items::amulets::{AmuletId, EquippedAmulets};
use items::upgrades::{self, TakenUpgrades, UpgradeId};
use persistence::{LifetimeRecord, Preferences, SaveStore, SaveStoreRes};
use player::{Abilities, CombatStats, Player, PlayerEntity, PlayerInput};

// re-export для хоста и тестов
pub use components::Health;
pub use events::CueKind;

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Главный plugin симуляции (объединяет все подсистемы)
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(FIXED_HZ))
            .init_resource::<ActiveDims>()
            .init_resource::<TakenUpgrades>()
            .init_resource::<EquippedAmulets>()
            .init_resource::<LifetimeRecord>()
            .init_resource::<SaveStoreRes>()
            .add_plugins(EnginePlugin);
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .add_plugins(SimulationPlugin);
    app
}

/// Фасад симуляции для хоста
///
/// Протокол тика: `set_input` → `tick` → `drain_events`. Пауза level-up-а
/// включается движком сам; хост показывает выбор и зовёт `apply_upgrade`,
/// что снимает паузу.
pub struct Shadows {
    app: App,
}

impl Shadows {
    /// Новый забег с первого этажа
    pub fn new(seed: u64) -> Self {
        Self::start_at_floor(seed, 1)
    }

    /// Новый забег с произвольного этажа (тесты, дебаг)
    pub fn start_at_floor(seed: u64, floor: u32) -> Self {
        let mut app = create_headless_app(seed);
        let world = app.world_mut();

        let dims = *world.resource::<ActiveDims>();
        let dungeon = {
            let mut rng = world.resource_mut::<DeterministicRng>();
            generate_dungeon(floor.max(1), &mut rng.rng, &dims)
        };
        world.insert_resource(dungeon);

        let entity = world.spawn(player::player_bundle(dims.center())).id();
        world.insert_resource(PlayerEntity(entity));

        // Амулеты из lifetime-рекорда надеваются на свежие статы
        let equipped_ids = world.resource::<LifetimeRecord>().equipped_amulets.clone();
        let mut shadows = Self { app };
        for id in equipped_ids {
            shadows.equip_amulet(id);
        }

        shadows
            .app
            .world_mut()
            .resource_mut::<OutboundEvents>()
            .push(HostEvent::RoomEntered {
                kind: RoomKind::Start,
            });
        shadows
    }

    /// Восстановление забега из хранилища хоста. Отсутствующий, битый или
    /// протухший сейв → свежий забег с данным seed.
    pub fn load_from_save(store: Box<dyn SaveStore>, fallback_seed: u64) -> Self {
        let store_res = SaveStoreRes(store);
        let snapshot = persistence::load_run(&store_res);
        let lifetime = persistence::load_lifetime(&store_res);

        let Some(snap) = snapshot else {
            let mut shadows = Self::new(fallback_seed);
            {
                let world = shadows.app.world_mut();
                world.insert_resource(store_res);
                world.insert_resource(lifetime.clone());
            }
            for id in lifetime.equipped_amulets {
                shadows.equip_amulet(id);
            }
            return shadows;
        };

        let mut shadows = Self::start_at_floor(snap.seed, snap.floor);
        let world = shadows.app.world_mut();
        world.insert_resource(store_res);
        world.insert_resource(TakenUpgrades::clone(&snap.taken));

        // Снапшот несёт статы с уже применёнными амулетами: список
        // восстанавливаем без повторного применения эффектов
        world.insert_resource(EquippedAmulets(lifetime.equipped_amulets.clone()));
        world.insert_resource(lifetime);

        let mut stats_run = world.resource_mut::<RunStats>();
        stats_run.kills = snap.kills;
        stats_run.souls_earned = snap.souls_earned;
        let mut ctrl = world.resource_mut::<EngineControl>();
        ctrl.game_time = snap.playtime;

        let mut query = world.query_filtered::<(
            &mut Health,
            &mut CombatStats,
            &mut player::Level,
            &mut Abilities,
        ), With<Player>>();
        if let Ok((mut health, mut stats, mut level, mut abilities)) = query.single_mut(world) {
            *health = snap.health;
            *stats = snap.stats.clone();
            *level = snap.level.clone();
            *abilities = snap.abilities.clone();
        }

        log_info(&format!(
            "Run restored: floor {}, level {}",
            snap.floor, snap.level.level
        ));
        shadows
    }

    /// Один тик симуляции (1/60 секунды симулированного времени)
    pub fn tick(&mut self) {
        self.app.world_mut().run_schedule(FixedUpdate);
    }

    pub fn pause(&mut self) {
        self.app.world_mut().resource_mut::<EngineControl>().paused = true;
    }

    /// Снять паузу. Игнорируется, пока ждём выбор апгрейда или после конца игры.
    pub fn resume(&mut self) {
        let world = self.app.world_mut();
        if !world.resource::<RoomSession>().pending_level_choices.is_empty() {
            return;
        }
        let mut ctrl = world.resource_mut::<EngineControl>();
        if !ctrl.game_over {
            ctrl.paused = false;
        }
    }

    /// Ввод на следующий тик (заменяет предыдущий целиком)
    pub fn set_input(&mut self, input: PlayerInput) {
        *self.app.world_mut().resource_mut::<PlayerInput>() = input;
    }

    /// Aspect ratio экрана хоста (меняет активные размеры комнат)
    pub fn set_aspect(&mut self, screen_w: f32, screen_h: f32) {
        self.app
            .world_mut()
            .resource_mut::<ActiveDims>()
            .set_aspect(screen_w, screen_h);
    }

    /// Выбор апгрейда level-up-а. Id не из предложенной тройки игнорируется;
    /// валидный выбор применяет эффект и снимает паузу.
    pub fn apply_upgrade(&mut self, id: UpgradeId) {
        let world = self.app.world_mut();
        let choices = world.resource::<RoomSession>().pending_level_choices.clone();
        if choices.is_empty() {
            log_warning("apply_upgrade called with no pending level-up");
            return;
        }
        if !choices.contains(&id) {
            log_warning(&format!("apply_upgrade: {:?} not among offered choices", id));
            return;
        }

        world.resource_scope(|world, mut taken: Mut<TakenUpgrades>| {
            world.resource_scope(|world, mut outbound: Mut<OutboundEvents>| {
                let mut query = world.query_filtered::<(
                    &mut CombatStats,
                    &mut Abilities,
                    &mut Health,
                ), With<Player>>();
                if let Ok((mut stats, mut abilities, mut health)) = query.single_mut(world) {
                    upgrades::apply_upgrade(
                        id,
                        &mut taken,
                        &mut stats,
                        &mut abilities,
                        &mut health,
                        &mut outbound,
                    );
                }
            });
        });

        world
            .resource_mut::<RoomSession>()
            .pending_level_choices
            .clear();
        world.resource_mut::<EngineControl>().paused = false;

        // Накопленного xp может хватить на следующий уровень сразу
        let crossed = {
            let mut query = world.query_filtered::<&mut player::Level, With<Player>>();
            query
                .single_mut(world)
                .map(|mut level| level.add_xp(0.0))
                .unwrap_or(false)
        };
        if crossed {
            let choices = world.resource_scope(|world, mut rng: Mut<DeterministicRng>| {
                let taken = world.resource::<TakenUpgrades>();
                upgrades::roll_choices(taken, &mut rng.rng)
            });
            let level = {
                let mut query = world.query_filtered::<&player::Level, With<Player>>();
                query.single(world).map(|l| l.level).unwrap_or(1)
            };
            world.resource_mut::<EngineControl>().paused = true;
            world.resource_mut::<RoomSession>().pending_level_choices = choices.clone();
            world
                .resource_mut::<OutboundEvents>()
                .push(HostEvent::LevelUpReady { level, choices });
        }
    }

    /// Покупка амулета в открытом магазине
    pub fn buy_amulet(&mut self, id: AmuletId) -> bool {
        let world = self.app.world_mut();
        if !world.resource::<RoomSession>().shop_open {
            return false;
        }
        let cost = items::amulets::amulet_def(id).cost;
        let mut lifetime = world.resource_mut::<LifetimeRecord>();
        if lifetime.owned_amulets.contains(&id) || lifetime.souls < cost {
            return false;
        }
        lifetime.souls -= cost;
        lifetime.owned_amulets.push(id);
        let record = lifetime.clone();
        world.resource_scope(|_, mut store: Mut<SaveStoreRes>| {
            persistence::save_lifetime(&mut store, &record);
        });
        log_info(&format!("🛒 Amulet purchased: {:?}", id));
        true
    }

    pub fn close_shop(&mut self) {
        let world = self.app.world_mut();
        if world.resource::<RoomSession>().shop_open {
            world.resource_mut::<RoomSession>().shop_open = false;
            world
                .resource_mut::<OutboundEvents>()
                .push(HostEvent::ShopClosed);
        }
    }

    /// Надеть амулет (должен быть получен; максимум 4)
    pub fn equip_amulet(&mut self, id: AmuletId) -> bool {
        let world = self.app.world_mut();
        if !world.resource::<LifetimeRecord>().owned_amulets.contains(&id) {
            return false;
        }
        let equipped = world.resource_scope(|world, mut set: Mut<EquippedAmulets>| {
            let mut query = world.query_filtered::<(
                &mut CombatStats,
                &mut Abilities,
                &mut Health,
            ), With<Player>>();
            match query.single_mut(world) {
                Ok((mut stats, mut abilities, mut health)) => {
                    set.equip(id, &mut stats, &mut abilities, &mut health)
                }
                Err(_) => false,
            }
        });
        if equipped {
            let list = world.resource::<EquippedAmulets>().0.clone();
            world.resource_mut::<LifetimeRecord>().equipped_amulets = list;
        }
        equipped
    }

    pub fn unequip_amulet(&mut self, id: AmuletId) -> bool {
        let world = self.app.world_mut();
        let removed = world.resource_scope(|world, mut set: Mut<EquippedAmulets>| {
            let mut query = world.query_filtered::<(
                &mut CombatStats,
                &mut Abilities,
                &mut Health,
            ), With<Player>>();
            match query.single_mut(world) {
                Ok((mut stats, mut abilities, mut health)) => {
                    set.unequip(id, &mut stats, &mut abilities, &mut health)
                }
                Err(_) => false,
            }
        });
        if removed {
            let list = world.resource::<EquippedAmulets>().0.clone();
            world.resource_mut::<LifetimeRecord>().equipped_amulets = list;
        }
        removed
    }

    /// Настройки хоста из хранилища (отсутствуют/биты → дефолты)
    pub fn preferences(&self) -> Preferences {
        persistence::load_preferences(self.app.world().resource::<SaveStoreRes>())
    }

    pub fn set_preferences(&mut self, prefs: &Preferences) {
        let mut store = self.app.world_mut().resource_mut::<SaveStoreRes>();
        persistence::save_preferences(&mut store, prefs);
    }

    /// Забрать накопленные события для хоста
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        self.app
            .world_mut()
            .resource_mut::<OutboundEvents>()
            .drain()
    }

    // --- Accessors для хоста и тестов ---

    pub fn floor(&self) -> u32 {
        self.app.world().resource::<Dungeon>().floor
    }

    pub fn is_game_over(&self) -> bool {
        self.app.world().resource::<EngineControl>().game_over
    }

    pub fn is_victory(&self) -> bool {
        self.app.world().resource::<EngineControl>().victory
    }

    pub fn is_paused(&self) -> bool {
        self.app.world().resource::<EngineControl>().paused
    }

    pub fn souls(&self) -> u32 {
        self.app.world().resource::<LifetimeRecord>().souls
    }

    pub fn player_health(&mut self) -> (f32, f32) {
        let world = self.app.world_mut();
        let mut query = world.query_filtered::<&Health, With<Player>>();
        query
            .single(world)
            .map(|h| (h.current, h.max))
            .unwrap_or((0.0, 0.0))
    }

    pub fn player_position(&mut self) -> Vec2 {
        let world = self.app.world_mut();
        let mut query = world.query_filtered::<&components::Position, With<Player>>();
        query.single(world).map(|p| p.0).unwrap_or(Vec2::ZERO)
    }

    pub fn player_level(&mut self) -> u32 {
        let world = self.app.world_mut();
        let mut query = world.query_filtered::<&player::Level, With<Player>>();
        query.single(world).map(|l| l.level).unwrap_or(1)
    }

    /// Прямой доступ к миру (тесты)
    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }
}
