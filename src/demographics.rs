// 👤 Demographic Extractor - one snapshot row per person
//
// Every record is flattened first, then the region whitelist is applied.
// A record that cannot be flattened fails the batch even if its region
// would have been filtered out afterwards.

use crate::config::LocationFilter;
use crate::error::EngineResult;
use crate::loader::RecordTable;
use crate::outcome::{Extraction, FailurePolicy};
use crate::record::{education_label, PersonRecord, RecordId};
use serde::Serialize;
use tracing::info;

/// Region assumed when a record has no `region` key at all
const IMPLICIT_REGION: &str = "KOR";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemographicRow {
    pub id: RecordId,
    pub source: String,
    pub sex: &'static str,
    #[serde(rename = "marriage")]
    pub marriage_status: &'static str,
    pub age: i64,
    #[serde(rename = "ages")]
    pub age_bracket: Option<String>,
    pub current_job: Option<String>,
    pub self_income: Option<String>,
    pub hh_income: Option<String>,
    #[serde(rename = "last_ed")]
    pub highest_education: Option<&'static str>,
    pub region: Option<String>,
}

pub struct DemographicExtractor {
    pub locations: LocationFilter,
    pub policy: FailurePolicy,
}

impl DemographicExtractor {
    pub fn new() -> Self {
        DemographicExtractor {
            locations: LocationFilter::default(),
            policy: FailurePolicy::FailFast,
        }
    }

    pub fn with_locations(mut self, locations: LocationFilter) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Flatten every table, keep whitelisted regions, sort by (id, region)
    pub fn extract(&self, tables: &[RecordTable]) -> EngineResult<Extraction<DemographicRow>> {
        let mut out = Extraction::new();

        for table in tables {
            let source = table.source.qualified();
            let mut flattened = Vec::with_capacity(table.len());

            for (index, record) in table.records.iter().enumerate() {
                let result = flatten(record, &source);
                if let Some(row) = out.settle(self.policy, &source, index, result)? {
                    flattened.push(row);
                }
            }

            out.rows.extend(
                flattened
                    .into_iter()
                    .filter(|row| self.locations.contains(row.region.as_deref())),
            );
        }

        out.rows
            .sort_by(|a, b| (&a.id, &a.region).cmp(&(&b.id, &b.region)));

        info!(rows = out.rows.len(), "demographic extraction finished");
        Ok(out)
    }
}

impl Default for DemographicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten(record: &PersonRecord, source: &str) -> EngineResult<DemographicRow> {
    let id = record.id()?;
    let sex = if record.is_male()? { "남" } else { "여" };
    let marriage_status = if record.marriage_year().is_some() {
        "기혼"
    } else {
        "미혼"
    };

    // `income` itself is mandatory, its ranges are not
    record.require("income")?;
    let level = record.first_education_level()?;

    let region = if record.has_field("region") {
        record.region()?.map(str::to_string)
    } else {
        Some(IMPLICIT_REGION.to_string())
    };

    Ok(DemographicRow {
        id,
        source: source.to_string(),
        sex,
        marriage_status,
        age: record.int("age")?,
        age_bracket: record.nullable_text("ages")?,
        current_job: record.nullable_text("occupation_name")?,
        self_income: record.text_or_none("income.self_income_range"),
        hh_income: record.text_or_none("income.hh_income_range"),
        highest_education: education_label(&level),
        region,
    })
}

// ============================================================================
// TESTS
// ============================================================================
