//! Предметы прогрессии: апгрейды уровня и амулеты
//!
//! Апгрейды — выбор 1 из 3 на level-up, мутируют статы забега.
//! Амулеты — постоянные вещи между забегами (магазин/дропы), максимум 4
//! надетых, эффекты снимаются симметрично.

pub mod amulets;
pub mod upgrades;

pub use amulets::{AmuletId, EquippedAmulets};
pub use upgrades::{TakenUpgrades, UpgradeId};
