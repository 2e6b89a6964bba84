use crate::engine::two_decimals;
use crate::error::Result;
use crate::store::{KeySpace, StatsStore};

/// Which global extremes moved on this event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtremesUpdate {
    pub raised_max: bool,
    pub lowered_min: bool,
}

/// Tighten the global max/min price toward `price`. Only strict improvements are
/// written. Each compare-and-set runs atomically on the store, so concurrent engine
/// instances cannot lose an update.
pub async fn update_extremes(store: &dyn StatsStore, keys: &KeySpace, price: f64) -> Result<ExtremesUpdate> {
    let formatted = two_decimals(price);
    let raised_max = store.set_if_greater(&keys.max_price(), price, &formatted).await?;
    let lowered_min = store.set_if_less(&keys.min_price(), price, &formatted).await?;
    Ok(ExtremesUpdate { raised_max, lowered_min })
}
