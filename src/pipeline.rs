// 🔗 Pipeline - configuration-driven entry points for the three extracts
//
// The price reference is read fresh on every call, before any record is
// touched, so a broken price file fails the request without partial output.

use crate::config::ExtractConfig;
use crate::demographics::{DemographicExtractor, DemographicRow};
use crate::error::EngineResult;
use crate::loader::RecordTable;
use crate::outcome::Extraction;
use crate::price::PriceReference;
use crate::purchases::{PurchaseReconciler, PurchaseRow};
use crate::timeline::{TimelineRow, TimelineUnifier};
use tracing::warn;

fn load_prices(config: &ExtractConfig) -> EngineResult<PriceReference> {
    let prices = PriceReference::from_path(&config.price_file)?;
    if prices.is_empty() {
        warn!(
            path = %config.price_file.display(),
            "price reference has no entries; no purchase will be priced"
        );
    }
    Ok(prices)
}

pub fn extract_demographics(
    config: &ExtractConfig,
    tables: &[RecordTable],
) -> EngineResult<Extraction<DemographicRow>> {
    DemographicExtractor::new()
        .with_locations(config.locations.clone())
        .with_policy(config.failure_policy)
        .extract(tables)
}

pub fn reconcile_purchases(
    config: &ExtractConfig,
    tables: &[RecordTable],
) -> EngineResult<Extraction<PurchaseRow>> {
    let prices = load_prices(config)?;

    PurchaseReconciler::new()
        .with_min_year(config.min_year)
        .with_locations(config.locations.clone())
        .with_policy(config.failure_policy)
        .reconcile(tables, &prices)
}

pub fn unify_timeline(
    config: &ExtractConfig,
    tables: &[RecordTable],
) -> EngineResult<Extraction<TimelineRow>> {
    let prices = load_prices(config)?;

    TimelineUnifier::new()
        .with_locations(config.locations.clone())
        .with_policy(config.failure_policy)
        .unify(tables, &prices)
}
