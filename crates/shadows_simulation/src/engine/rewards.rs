//! Награды за убийства, level-up, revive/game-over, автосейв

use bevy::prelude::*;
use rand::Rng;

use crate::components::Health;
use crate::constants::*;
use crate::engine::{EngineControl, RoomSession, RunStats};
use crate::events::{
    CueKind, DamageDealt, EnemyDied, HostEvent, KillSource, OutboundEvents, PlayerDown,
};
use crate::items::amulets::{AmuletId, EquippedAmulets, ALL_AMULETS};
use crate::items::upgrades::{roll_choices, TakenUpgrades};
use crate::persistence::{self, LifetimeRecord, RunSnapshot, SaveStoreRes};
use crate::player::{Abilities, CombatStats, Cooldowns, Level, Player, WarRhythm};
use crate::DeterministicRng;

/// Пауза + тройка выбора level-up-а хосту. No-op, пока предыдущий выбор ждёт
/// (накопленные уровни разруливает apply_upgrade на фасаде).
pub(crate) fn open_level_choices(
    ctrl: &mut EngineControl,
    session: &mut RoomSession,
    outbound: &mut OutboundEvents,
    taken: &TakenUpgrades,
    rng: &mut rand_chacha::ChaCha8Rng,
    level: u32,
) {
    if !session.pending_level_choices.is_empty() {
        return;
    }
    let choices = roll_choices(taken, rng);
    ctrl.paused = true;
    session.pending_level_choices = choices.clone();
    outbound.cue(CueKind::LevelUp);
    outbound.push(HostEvent::LevelUpReady { level, choices });
}

/// Система: обработка смертей врагов — xp, души, melee-бонусы, боссовые
/// сценарии, level-up с паузой
#[allow(clippy::too_many_arguments)]
pub fn kill_rewards(
    mut died: EventReader<EnemyDied>,
    mut ctrl: ResMut<EngineControl>,
    mut session: ResMut<RoomSession>,
    mut run_stats: ResMut<RunStats>,
    mut lifetime: ResMut<LifetimeRecord>,
    mut rng: ResMut<DeterministicRng>,
    mut outbound: ResMut<OutboundEvents>,
    equipped: Res<EquippedAmulets>,
    taken: Res<TakenUpgrades>,
    mut player: Query<
        (&CombatStats, &mut Level, &mut Health, &mut Abilities, &mut WarRhythm),
        With<Player>,
    >,
) {
    let Ok((stats, mut level, mut health, mut abilities, mut rhythm)) = player.single_mut()
    else {
        return;
    };

    let mut leveled = false;

    for event in died.read() {
        run_stats.kills += 1;
        lifetime.total_kills += 1;

        let souls_roll = rng.rng.gen_range(event.souls_min..=event.souls_max.max(event.souls_min));
        let souls = (souls_roll as f32 * stats.souls_multiplier).floor() as u32;
        run_stats.souls_earned += souls;
        lifetime.souls += souls;

        let xp = event.xp as f32 * stats.xp_multiplier;
        if level.add_xp(xp) {
            leveled = true;
        }

        if event.source == KillSource::Melee {
            health.heal(MELEE_KILL_HEAL);
            abilities.speed_burst = MELEE_KILL_SPEED_BURST;
            abilities.speed_burst_timer = MELEE_KILL_BURST_TIME;
        }

        if equipped.has(AmuletId::WarRhythm) {
            rhythm.on_kill();
        }

        if event.was_boss {
            ctrl.start_slow_mo(BOSS_KILL_SLOWMO, BOSS_KILL_SLOWMO_TIME);
            session.victory_countdown = VICTORY_COUNTDOWN;
            outbound.cue(CueKind::BossRoar);
            crate::log_info("👑 Boss defeated");

            // Дроп амулета: 50%, только ещё не полученный
            if rng.rng.gen_bool(0.5) {
                let unowned: Vec<AmuletId> = ALL_AMULETS
                    .iter()
                    .map(|d| d.id)
                    .filter(|id| !lifetime.owned_amulets.contains(id))
                    .collect();
                if !unowned.is_empty() {
                    let dropped = unowned[rng.rng.gen_range(0..unowned.len())];
                    lifetime.owned_amulets.push(dropped);
                    outbound.push(HostEvent::AmuletDropped { amulet: dropped });
                }
            }
        }
    }

    if leveled {
        // Пауза до выбора хостом; apply_upgrade на фасаде снимает её
        open_level_choices(
            &mut ctrl,
            &mut session,
            &mut outbound,
            &taken,
            &mut rng.rng,
            level.level,
        );
    }
}

/// Система: учёт урона в статистике забега
pub fn track_damage(mut damage: EventReader<DamageDealt>, mut run_stats: ResMut<RunStats>) {
    for event in damage.read() {
        if event.to_player {
            run_stats.damage_taken += event.amount;
        } else {
            run_stats.damage_dealt += event.amount;
        }
    }
}

/// Система: revive (одноразовый) или game-over
#[allow(clippy::too_many_arguments)]
pub fn revive_or_game_over(
    mut down: EventReader<PlayerDown>,
    mut ctrl: ResMut<EngineControl>,
    mut outbound: ResMut<OutboundEvents>,
    mut store: ResMut<SaveStoreRes>,
    mut lifetime: ResMut<LifetimeRecord>,
    run_stats: Res<RunStats>,
    dungeon: Res<crate::dungeon::Dungeon>,
    mut player: Query<(&mut Health, &mut Cooldowns, &mut Abilities, &Level), With<Player>>,
) {
    if down.is_empty() {
        return;
    }
    down.clear();

    let Ok((mut health, mut cooldowns, mut abilities, level)) = player.single_mut() else {
        return;
    };

    if abilities.has_revive && !abilities.revive_used {
        abilities.revive_used = true;
        health.current = health.max * REVIVE_HP_FRACTION;
        cooldowns.invincibility = 2.0;
        outbound.push(HostEvent::ScreenFlash { duration: 0.5 });
        crate::log_info("💫 Second Wind: revived at 30% HP");
        return;
    }

    ctrl.game_over = true;
    ctrl.paused = true;

    lifetime.total_runs += 1;
    lifetime.best_floor = lifetime.best_floor.max(dungeon.floor);
    persistence::save_lifetime(&mut store, &lifetime);
    persistence::clear_run(&mut store);

    let summary = run_stats.summary(dungeon.floor, level.level, ctrl.game_time);
    crate::log_info(&format!(
        "☠️ Game over: floor {}, level {}, {} kills",
        summary.floor, summary.level, summary.kills
    ));
    outbound.push(HostEvent::GameOver { summary });
}

/// Система: автосейв раз в AUTOSAVE_INTERVAL секунд реального тик-времени
pub fn autosave(
    mut ctrl: ResMut<EngineControl>,
    mut store: ResMut<SaveStoreRes>,
    rng: Res<DeterministicRng>,
    dungeon: Res<crate::dungeon::Dungeon>,
    run_stats: Res<RunStats>,
    taken: Res<TakenUpgrades>,
    lifetime: Res<LifetimeRecord>,
    player: Query<(&Health, &CombatStats, &Level, &Abilities), With<Player>>,
) {
    if ctrl.autosave_accum < AUTOSAVE_INTERVAL || ctrl.game_over {
        return;
    }
    ctrl.autosave_accum = 0.0;

    let Ok((health, stats, level, abilities)) = player.single() else {
        return;
    };

    let snapshot = RunSnapshot {
        saved_at_unix: chrono::Utc::now().timestamp(),
        seed: rng.seed,
        floor: dungeon.floor,
        health: *health,
        stats: stats.clone(),
        level: level.clone(),
        abilities: abilities.clone(),
        taken: taken.clone(),
        kills: run_stats.kills,
        souls_earned: run_stats.souls_earned,
        playtime: ctrl.game_time,
    };
    persistence::save_run(&mut store, &snapshot);
    persistence::save_lifetime(&mut store, &lifetime);
    crate::log_info("💾 Autosave complete");
}
