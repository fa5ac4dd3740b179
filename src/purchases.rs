// 🛒 Purchase-Event Reconciler - dated purchases tagged with life events
//
// For each purchase in range:
//   1. tag it with the first category (by priority) that has an event the same year
//   2. left-join it to the price reference on (name, kind_name)
//   3. keep only rows whose region maps to a reporting country (KOR / US)
//
// Sources that structurally lack a category never contribute that tag.

use crate::config::{LocationFilter, DEFAULT_MIN_YEAR};
use crate::error::{EngineError, EngineResult};
use crate::loader::{RecordTable, SourceProfile};
use crate::outcome::{Extraction, FailurePolicy};
use crate::price::PriceReference;
use crate::record::{sort_by_key, Category, PersonRecord, RecordId};
use serde::Serialize;
use tracing::{info, warn};

// ============================================================================
// EVENT TAG
// ============================================================================

/// Life event coinciding with a purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTag {
    Edu,
    Res,
    Int,
    Child,
    Pet,
    Car,
    No,
}

impl EventTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTag::Edu => "edu",
            EventTag::Res => "res",
            EventTag::Int => "int",
            EventTag::Child => "child",
            EventTag::Pet => "pet",
            EventTag::Car => "car",
            EventTag::No => "no",
        }
    }
}

/// Tag priority: earlier categories win when several share the year
pub const TAG_PRIORITY: [(Category, EventTag); 6] = [
    (Category::Education, EventTag::Edu),
    (Category::Residence, EventTag::Res),
    (Category::Interior, EventTag::Int),
    (Category::Children, EventTag::Child),
    (Category::Pet, EventTag::Pet),
    (Category::Vehicle, EventTag::Car),
];

/// Event years of every tagging category, in priority order
struct EventCalendar {
    years: Vec<(EventTag, Vec<i64>)>,
}

impl EventCalendar {
    fn build(record: &PersonRecord, profile: &SourceProfile) -> EngineResult<Self> {
        let mut years = Vec::with_capacity(TAG_PRIORITY.len());
        for (category, tag) in TAG_PRIORITY {
            if !profile.has(category) {
                continue;
            }
            let entries = sort_by_key(record.history_or_empty(category)?, "year")?;
            let category_years = entries
                .iter()
                .map(|e| e.year())
                .collect::<EngineResult<Vec<_>>>()?;
            years.push((tag, category_years));
        }
        Ok(EventCalendar { years })
    }

    fn tag_for(&self, year: i64) -> EventTag {
        self.years
            .iter()
            .find(|(_, years)| years.contains(&year))
            .map(|(tag, _)| *tag)
            .unwrap_or(EventTag::No)
    }
}

// ============================================================================
// ROWS
// ============================================================================

/// Purchase flattened from one record, before the price join
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseEvent {
    pub id: RecordId,
    pub age: i64,
    pub age_bracket: Option<String>,
    pub year: i64,
    pub product_name: String,
    pub kind_name: String,
    pub brand_name: Option<String>,
    pub birth: i64,
    pub region: Option<String>,
    pub tag: EventTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseRow {
    pub country: &'static str,
    pub source: String,
    pub id: RecordId,
    #[serde(rename = "cid")]
    pub composite_id: String,
    #[serde(rename = "product")]
    pub product_name: String,
    #[serde(rename = "ages")]
    pub age_bracket: Option<String>,
    #[serde(rename = "age")]
    pub purchase_age: i64,
    pub year: i64,
    #[serde(rename = "detail")]
    pub kind_name: String,
    pub brand: Option<String>,
    pub price: Option<f64>,
    #[serde(rename = "event")]
    pub event_tag: EventTag,
}

/// Reporting country for a region; other regions are not reported
fn country_for(region: Option<&str>) -> Option<&'static str> {
    match region {
        None | Some("KOR") => Some("KOR"),
        Some("US") => Some("US"),
        Some(_) => None,
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

pub struct PurchaseReconciler {
    /// First purchase year to keep (inclusive)
    pub min_year: i64,
    pub locations: LocationFilter,
    pub policy: FailurePolicy,
}

impl PurchaseReconciler {
    pub fn new() -> Self {
        PurchaseReconciler {
            min_year: DEFAULT_MIN_YEAR,
            locations: LocationFilter::default(),
            policy: FailurePolicy::FailFast,
        }
    }

    pub fn with_min_year(mut self, min_year: i64) -> Self {
        self.min_year = min_year;
        self
    }

    pub fn with_locations(mut self, locations: LocationFilter) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Records without a region are kept; others must be whitelisted
    fn accepts(&self, record: &PersonRecord) -> EngineResult<bool> {
        Ok(match record.region()? {
            None => true,
            region => self.locations.contains(region),
        })
    }

    /// Flatten, tag, price and sort purchases across all tables
    pub fn reconcile(
        &self,
        tables: &[RecordTable],
        prices: &PriceReference,
    ) -> EngineResult<Extraction<PurchaseRow>> {
        let mut out = Extraction::new();

        for table in tables {
            let source = table.source.qualified();
            let mut events = Vec::new();

            for (index, record) in table.records.iter().enumerate() {
                let result = match self.accepts(record) {
                    Ok(true) => self.flatten(record, &table.profile),
                    Ok(false) => continue,
                    Err(err) => Err(err),
                };
                if let Some(flattened) = out.settle(self.policy, &source, index, result)? {
                    events.extend(flattened);
                }
            }

            if events.is_empty() {
                let warning = EngineError::EmptyResult {
                    source_name: source.clone(),
                };
                warn!("{}", warning);
                out.warnings.push(warning);
                continue;
            }

            for event in &events {
                out.rows.extend(join_prices(event, &source, prices));
            }
        }

        out.rows.sort_by(|a, b| {
            (a.country, &a.id, a.purchase_age).cmp(&(b.country, &b.id, b.purchase_age))
        });

        info!(rows = out.rows.len(), min_year = self.min_year, "purchase reconciliation finished");
        Ok(out)
    }

    /// Tagged purchases of one record from `min_year` on
    pub fn flatten(
        &self,
        record: &PersonRecord,
        profile: &SourceProfile,
    ) -> EngineResult<Vec<PurchaseEvent>> {
        let region = record.region()?.map(str::to_string);
        let purchases = sort_by_key(record.history_or_empty(Category::Purchase)?, "year")?;
        let calendar = EventCalendar::build(record, profile)?;

        let mut events = Vec::new();
        for purchase in purchases {
            let year = purchase.year()?;
            if year < self.min_year {
                continue;
            }

            events.push(PurchaseEvent {
                id: record.id()?,
                age: record.int("age")?,
                age_bracket: record.nullable_text("ages")?,
                year,
                product_name: purchase.text("name")?,
                kind_name: purchase.text("kind_name")?,
                brand_name: purchase.nullable_text("brand_name")?,
                birth: record.int("birth")?,
                region: region.clone(),
                tag: calendar.tag_for(year),
            });
        }

        Ok(events)
    }
}

impl Default for PurchaseReconciler {
    fn default() -> Self {
        Self::new()
    }
}

/// Left join: one row per matching price entry, or one unpriced row
fn join_prices(event: &PurchaseEvent, source: &str, prices: &PriceReference) -> Vec<PurchaseRow> {
    let Some(country) = country_for(event.region.as_deref()) else {
        return Vec::new();
    };

    let matched: Vec<Option<f64>> = prices
        .matches(&event.product_name, &event.kind_name)
        .iter()
        .map(|entry| entry.price)
        .collect();
    let priced = if matched.is_empty() { vec![None] } else { matched };

    priced
        .into_iter()
        .map(|price| PurchaseRow {
            country,
            source: source.to_string(),
            id: event.id.clone(),
            composite_id: format!("{}_{}", source, event.id),
            product_name: event.product_name.clone(),
            age_bracket: event.age_bracket.clone(),
            purchase_age: event.year - event.birth,
            year: event.year,
            kind_name: event.kind_name.clone(),
            brand: event.brand_name.clone(),
            price,
            event_tag: event.tag,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
