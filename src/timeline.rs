// 🗓️ Life-Timeline Unifier - every life event of a person in one stream
//
// Categories are emitted in a fixed order (marriage, education, job,
// residence, interior, children, pet, vehicle, purchase) and the final
// table is sorted by (region, id, age).
//
// Unlike the purchase listing, a purchase only appears here when the
// price reference has an exact entry for it.

use crate::config::LocationFilter;
use crate::error::{EngineError, EngineResult};
use crate::loader::{RecordTable, SourceProfile};
use crate::outcome::{Extraction, FailurePolicy};
use crate::price::PriceReference;
use crate::record::{education_label, sort_by_key, Category, PersonRecord, RecordId};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineRow {
    pub source: String,
    pub region: Option<String>,
    pub id: RecordId,
    pub header: &'static str,
    pub sequence: String,
    #[serde(rename = "condition")]
    pub label: String,
    pub age: i64,
    pub year: i64,
    pub detail: Option<String>,
    pub brand: Option<String>,
    pub price: Option<f64>,
}

// ============================================================================
// CHILD SUB-EVENTS
// ============================================================================

/// (year field, label prefix) of each dated milestone in a child entry
const CHILD_MILESTONES: [(&str, &str); 5] = [
    ("year", "자녀출산"),
    ("year_elementary", "자녀초입"),
    ("year_middle", "자녀중입"),
    ("year_high", "자녀고입"),
    ("married_year", "자녀결혼"),
];

// ============================================================================
// ROW BUILDER
// ============================================================================

/// Accumulates rows that share source, region and id
struct TimelineBuilder<'a> {
    source: &'a str,
    region: Option<String>,
    id: RecordId,
    rows: Vec<TimelineRow>,
}

impl<'a> TimelineBuilder<'a> {
    fn push(
        &mut self,
        header: &'static str,
        sequence: String,
        label: String,
        age: i64,
        year: i64,
    ) -> &mut TimelineRow {
        self.rows.push(TimelineRow {
            source: self.source.to_string(),
            region: self.region.clone(),
            id: self.id.clone(),
            header,
            sequence,
            label,
            age,
            year,
            detail: None,
            brand: None,
            price: None,
        });
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }
}

// ============================================================================
// UNIFIER
// ============================================================================

pub struct TimelineUnifier {
    pub locations: LocationFilter,
    pub policy: FailurePolicy,
}

impl TimelineUnifier {
    pub fn new() -> Self {
        TimelineUnifier {
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

    pub fn unify(
        &self,
        tables: &[RecordTable],
        prices: &PriceReference,
    ) -> EngineResult<Extraction<TimelineRow>> {
        let mut out = Extraction::new();

        for table in tables {
            let source = table.source.short();

            for (index, record) in table.records.iter().enumerate() {
                let result = match record.region() {
                    Ok(region) if !self.locations.contains(region) => continue,
                    Ok(_) => timeline_for(record, &source, &table.profile, prices),
                    Err(err) => Err(err),
                };
                if let Some(rows) = out.settle(self.policy, &source, index, result)? {
                    out.rows.extend(rows);
                }
            }
        }

        out.rows
            .sort_by(|a, b| (&a.region, &a.id, a.age).cmp(&(&b.region, &b.id, b.age)));

        info!(rows = out.rows.len(), "timeline unification finished");
        Ok(out)
    }
}

impl Default for TimelineUnifier {
    fn default() -> Self {
        Self::new()
    }
}

/// All timeline rows of one record, in category order
pub fn timeline_for(
    record: &PersonRecord,
    source: &str,
    profile: &SourceProfile,
    prices: &PriceReference,
) -> EngineResult<Vec<TimelineRow>> {
    let mut timeline = TimelineBuilder {
        source,
        region: record.region()?.map(str::to_string),
        id: record.id()?,
        rows: Vec::new(),
    };

    let level = record.first_education_level()?;
    let education = education_label(&level)
        .ok_or_else(|| EngineError::lookup(record.label(), format!("education level '{}'", level)))?;

    if let Some(married) = record.marriage_year() {
        let birth = record.int("birth")?;
        timeline.push(
            "marriage",
            "marriage".to_string(),
            "결혼".to_string(),
            married - birth,
            married,
        );
    }

    // A source that never collects a category contributes no rows for it
    let history = |category: Category| {
        if profile.has(category) {
            record.history(category)
        } else {
            Ok(Vec::new())
        }
    };

    let current_age = record.int("age")?;
    for (i, entry) in sort_by_key(history(Category::Education)?, "age")?.iter().enumerate() {
        timeline.push(
            "edu",
            format!("edu_{}", i + 1),
            education.to_string(),
            current_age,
            entry.year()?,
        );
    }

    for (i, entry) in sort_by_key(history(Category::Job)?, "job_age_of")?.iter().enumerate() {
        let row = timeline.push(
            "job",
            format!("job_{}", i + 1),
            entry.text("job_name")?,
            entry.int("job_age_of")?,
            entry.year()?,
        );
        row.detail = entry.nullable_text("job_wage")?;
    }

    for (i, entry) in sort_by_key(history(Category::Residence)?, "age_of_move_in")?
        .iter()
        .enumerate()
    {
        let label = format!(
            "{}_{}_{}",
            entry.text("ownership")?,
            entry.text("type")?,
            entry.text("size")?
        );
        timeline.push(
            "move",
            format!("move_{}", i + 1),
            label,
            entry.int("age_of_move_in")?,
            entry.year()?,
        );
    }

    let birth = || record.int("birth");

    for (i, entry) in sort_by_key(history(Category::Interior)?, "year")?.iter().enumerate() {
        let year = entry.year()?;
        let row = timeline.push(
            "int",
            format!("int_{}", i + 1),
            "인테리어".to_string(),
            year - birth()?,
            year,
        );
        row.detail = entry.nullable_text("cost_amt")?;
    }

    // Children keep their listed order
    for (i, entry) in history(Category::Children)?.iter().enumerate() {
        let order = entry.text("order")?;
        for (field, prefix) in CHILD_MILESTONES {
            let Some(year) = entry.opt_int(field)? else {
                continue;
            };
            if year - birth()? <= 0 {
                continue;
            }
            let age = if field == "year" {
                entry.int("age_of_birth")?
            } else {
                year - birth()?
            };
            timeline.push(
                "child",
                format!("child_{}", i + 1),
                format!("{}_{}", prefix, order),
                age,
                year,
            );
        }
    }

    for (i, entry) in sort_by_key(history(Category::Pet)?, "year")?.iter().enumerate() {
        let year = entry.year()?;
        let row = timeline.push(
            "pet",
            format!("pet_{}", i + 1),
            "애완동물입양".to_string(),
            year - birth()?,
            year,
        );
        row.detail = entry.nullable_text("kind")?;
    }

    for (i, entry) in sort_by_key(history(Category::Vehicle)?, "year")?.iter().enumerate() {
        let year = entry.year()?;
        let detail = format!(
            "{}_{}_{}",
            entry.text("purchase")?,
            entry.text("make")?,
            entry.text("kind")?
        );
        let row = timeline.push(
            "car",
            format!("car_{}", i + 1),
            "자동차구매".to_string(),
            year - birth()?,
            year,
        );
        row.detail = Some(detail);
    }

    for (i, entry) in sort_by_key(history(Category::Purchase)?, "year")?.iter().enumerate() {
        let name = entry.text("name")?;
        let kind_name = entry.text("kind_name")?;
        let Some(matched) = prices.exact(&name, &kind_name) else {
            continue;
        };
        let year = entry.year()?;
        let row = timeline.push(
            "purch",
            format!("purch_{}", i + 1),
            format!("구매:{}", name),
            year - birth()?,
            year,
        );
        row.detail = Some(kind_name);
        row.brand = entry.nullable_text("brand_name")?;
        row.price = matched.price;
    }

    Ok(timeline.rows)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{parse_records, SourceRegistry};
    use serde_json::{json, Value};

    const PRICES: &str = "product_id,kind,price\nSofa,3p,800\nSofa,3p,850\n";

    fn prices() -> PriceReference {
        PriceReference::from_reader(PRICES.as_bytes()).unwrap()
    }

    fn person(id: i64) -> Value {
        json!({
            "id": id,
            "gender": 1,
            "marriage": 2005,
            "age": 44,
            "ages": "40대",
            "birth": 1980,
            "region": "KOR",
            "education": {"history": [
                {"level": "master", "age": 26, "year": 2006},
                {"level": "college", "age": 22, "year": 2002}
            ]},
            "job": {"history": [
                {"job_name": "analyst", "job_age_of": 27, "year": 2007, "job_wage": 3500}
            ]},
            "residence": {"history": [
                {"ownership": "rent", "type": "apt", "size": 20, "age_of_move_in": 30, "year": 2010}
            ]},
            "interior": {"history": [{"year": 2012, "cost_amt": 900}]},
            "children": {"history": []},
            "pet": {"history": [{"year": 2015, "kind": "cat"}]},
            "vehicle": {"history": [{"year": 2013, "purchase": "used", "make": "kia", "kind": "sedan"}]},
            "purchase": {"history": [
                {"year": 2019, "name": "TV", "kind_name": "55in", "brand_name": "acme"},
                {"year": 2018, "name": "Sofa", "kind_name": "3p", "brand_name": "home"}
            ]}
        })
    }

    fn table(file_name: &str, records: Value) -> RecordTable {
        parse_records(file_name, records.to_string().as_bytes(), &SourceRegistry::new()).unwrap()
    }

    fn unify(file_name: &str, records: Value) -> Vec<TimelineRow> {
        TimelineUnifier::new()
            .unify(&[table(file_name, records)], &prices())
            .unwrap()
            .rows
    }

    #[test]
    fn test_marriage_row() {
        let rows = unify("gfk_2024_panel.json", json!([person(1)]));
        let marriage: Vec<&TimelineRow> = rows.iter().filter(|r| r.header == "marriage").collect();

        assert_eq!(marriage.len(), 1);
        assert_eq!(marriage[0].age, 25);
        assert_eq!(marriage[0].year, 2005);
        assert_eq!(marriage[0].label, "결혼");
        assert_eq!(marriage[0].source, "gfk");
    }

    #[test]
    fn test_unmarried_has_no_marriage_row() {
        let mut p = person(1);
        p["marriage"] = json!(0);
        let rows = unify("gfk_2024.json", json!([p]));
        assert!(rows.iter().all(|r| r.header != "marriage"));
    }

    #[test]
    fn test_education_uses_top_label_and_current_age() {
        let rows = unify("gfk_2024.json", json!([person(1)]));
        let edu: Vec<&TimelineRow> = rows.iter().filter(|r| r.header == "edu").collect();

        assert_eq!(edu.len(), 2);
        for row in &edu {
            assert_eq!(row.label, "석사졸업");
            assert_eq!(row.age, 44);
        }
        // Sorted by entry age: the college entry comes first
        assert_eq!(edu[0].sequence, "edu_1");
        assert_eq!(edu[0].year, 2002);
        assert_eq!(edu[1].year, 2006);
    }

    #[test]
    fn test_category_details() {
        let rows = unify("gfk_2024.json", json!([person(1)]));
        let find = |header: &str| rows.iter().find(|r| r.header == header).unwrap();

        let job = find("job");
        assert_eq!(job.label, "analyst");
        assert_eq!(job.age, 27);
        assert_eq!(job.detail.as_deref(), Some("3500"));

        let mv = find("move");
        assert_eq!(mv.label, "rent_apt_20");
        assert_eq!(mv.age, 30);

        let int = find("int");
        assert_eq!(int.age, 32);
        assert_eq!(int.detail.as_deref(), Some("900"));

        let pet = find("pet");
        assert_eq!(pet.label, "애완동물입양");
        assert_eq!(pet.detail.as_deref(), Some("cat"));

        let car = find("car");
        assert_eq!(car.age, 33);
        assert_eq!(car.detail.as_deref(), Some("used_kia_sedan"));
    }

    #[test]
    fn test_purchase_requires_exact_price() {
        let rows = unify("gfk_2024.json", json!([person(1)]));
        let purch: Vec<&TimelineRow> = rows.iter().filter(|r| r.header == "purch").collect();

        // TV has no price entry and is dropped; Sofa takes the last definition
        assert_eq!(purch.len(), 1);
        assert_eq!(purch[0].label, "구매:Sofa");
        assert_eq!(purch[0].sequence, "purch_1");
        assert_eq!(purch[0].age, 38);
        assert_eq!(purch[0].detail.as_deref(), Some("3p"));
        assert_eq!(purch[0].brand.as_deref(), Some("home"));
        assert_eq!(purch[0].price, Some(850.0));
    }

    #[test]
    fn test_blank_price_still_emits_purchase() {
        let prices = PriceReference::from_reader("product_id,kind,price\nFridge,900L,\n".as_bytes())
            .unwrap();
        let mut p = person(1);
        p["purchase"]["history"] = json!([
            {"year": 2020, "name": "Fridge", "kind_name": "900L", "brand_name": "cool"},
            {"year": 2021, "name": "Oven", "kind_name": "30L", "brand_name": "cool"}
        ]);
        let out = TimelineUnifier::new()
            .unify(&[table("gfk_2024.json", json!([p]))], &prices)
            .unwrap();

        let purch: Vec<&TimelineRow> = out.rows.iter().filter(|r| r.header == "purch").collect();
        assert_eq!(purch.len(), 1);
        assert_eq!(purch[0].label, "구매:Fridge");
        assert_eq!(purch[0].detail.as_deref(), Some("900L"));
        assert_eq!(purch[0].price, None);
    }

    #[test]
    fn test_children_sub_events() {
        let mut p = person(1);
        p["children"]["history"] = json!([
            {"order": 2, "age_of_birth": 36, "year": 2016,
             "year_elementary": 2023, "year_middle": null},
            {"order": 1, "age_of_birth": 33, "year": 2013,
             "year_elementary": 2020, "year_middle": 2026, "year_high": 2029,
             "married_year": 1975}
        ]);
        let rows = unify("gfk_2024.json", json!([p]));
        let children: Vec<(String, String, i64, i64)> = rows
            .iter()
            .filter(|r| r.header == "child")
            .map(|r| (r.sequence.clone(), r.label.clone(), r.age, r.year))
            .collect();

        // married_year 1975 is before the parent's birth and is dropped
        let mut expected = vec![
            ("child_1".to_string(), "자녀출산_2".to_string(), 36, 2016),
            ("child_1".to_string(), "자녀초입_2".to_string(), 43, 2023),
            ("child_2".to_string(), "자녀출산_1".to_string(), 33, 2013),
            ("child_2".to_string(), "자녀초입_1".to_string(), 40, 2020),
            ("child_2".to_string(), "자녀중입_1".to_string(), 46, 2026),
            ("child_2".to_string(), "자녀고입_1".to_string(), 49, 2029),
        ];
        let mut actual = children.clone();
        actual.sort_by_key(|c| (c.2, c.0.clone()));
        expected.sort_by_key(|c| (c.2, c.0.clone()));
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_sort_by_region_id_age() {
        let mut us = person(1);
        us["region"] = json!("US");
        let rows = TimelineUnifier::new()
            .with_locations(LocationFilter::new(["KOR", "US"]))
            .unify(&[table("gfk_2024.json", json!([us, person(2), person(1)]))], &prices())
            .unwrap()
            .rows;

        let keys: Vec<(Option<String>, RecordId, i64)> =
            rows.iter().map(|r| (r.region.clone(), r.id.clone(), r.age)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.first().unwrap().0.as_deref(), Some("KOR"));
        assert_eq!(keys.last().unwrap().0.as_deref(), Some("US"));
    }

    #[test]
    fn test_region_filter_excludes_others() {
        let mut jp = person(3);
        jp["region"] = json!("JP");
        let mut none = person(4);
        none["region"] = Value::Null;
        let rows = unify("gfk_2024.json", json!([jp, none]));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_history_aborts() {
        let mut p = person(1);
        p.as_object_mut().unwrap().remove("job");
        let err = TimelineUnifier::new()
            .unify(&[table("gfk_2024.json", json!([p]))], &prices())
            .unwrap_err();
        assert!(err.to_string().contains("job.history"));
    }

    #[test]
    fn test_unmapped_level_is_lookup_failure() {
        let mut p = person(1);
        p["education"]["history"][0]["level"] = json!("kindergarten");
        let err = TimelineUnifier::new()
            .unify(&[table("gfk_2024.json", json!([p]))], &prices())
            .unwrap_err();
        assert!(matches!(err, EngineError::Lookup { .. }));
    }

    #[test]
    fn test_source_lacking_pets_skips_category() {
        let mut p = person(1);
        p.as_object_mut().unwrap().remove("pet");
        let rows = unify("nielsen_2024.json", json!([p]));

        assert!(!rows.is_empty());
        assert!(rows.iter().all(|r| r.header != "pet"));
        assert_eq!(rows[0].source, "nielsen");
    }
}
