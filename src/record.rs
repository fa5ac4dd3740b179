// 🧍 Person Record - one panelist's nested survey document
//
// Records stay as JSON maps: sources disagree on which optional fields
// they carry, so every access goes through a lookup that reports the
// exact path on failure instead of rejecting the whole file up front.

use crate::error::{EngineError, EngineResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// RECORD ID
// ============================================================================

/// Identifier of a record, unique within its source file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RecordId::Text(s.clone())),
            other => as_int(other).map(RecordId::Int),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

// ============================================================================
// LIFE CATEGORIES
// ============================================================================

/// History categories a record may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Education,
    Job,
    Residence,
    Interior,
    Children,
    Pet,
    Vehicle,
    Purchase,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Education,
        Category::Job,
        Category::Residence,
        Category::Interior,
        Category::Children,
        Category::Pet,
        Category::Vehicle,
        Category::Purchase,
    ];

    /// Top-level key of the category in a record
    pub fn key(&self) -> &'static str {
        match self {
            Category::Education => "education",
            Category::Job => "job",
            Category::Residence => "residence",
            Category::Interior => "interior",
            Category::Children => "children",
            Category::Pet => "pet",
            Category::Vehicle => "vehicle",
            Category::Purchase => "purchase",
        }
    }

    pub fn from_key(key: &str) -> Option<Category> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.key().eq_ignore_ascii_case(key.trim()))
    }
}

/// Korean label for an education level
pub fn education_label(level: &str) -> Option<&'static str> {
    match level {
        "high" => Some("고등졸업"),
        "college" => Some("학사졸업"),
        "master" => Some("석사졸업"),
        "phd" => Some("박사졸업"),
        _ => None,
    }
}

// ============================================================================
// VALUE HELPERS
// ============================================================================

/// Integer view of a JSON number (integral floats accepted)
pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Text rendering of a scalar; null renders as None
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Empty strings, zero and null all count as "no value"
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn walk<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

// ============================================================================
// PERSON RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PersonRecord {
    fields: Map<String, Value>,
    label: String,
}

impl PersonRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        let label = fields
            .get("id")
            .and_then(RecordId::from_value)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<no id>".to_string());
        PersonRecord { fields, label }
    }

    /// Build a record from any JSON value; only objects qualify
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(PersonRecord::new(fields)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Identifier used in error messages
    pub fn label(&self) -> &str {
        &self.label
    }

    fn missing(&self, path: &str) -> EngineError {
        EngineError::lookup(self.label.clone(), path)
    }

    /// Dotted-path lookup; null counts as absent
    pub fn get(&self, path: &str) -> Option<&Value> {
        walk(&self.fields, path)
    }

    pub fn require(&self, path: &str) -> EngineResult<&Value> {
        self.get(path).ok_or_else(|| self.missing(path))
    }

    pub fn int(&self, path: &str) -> EngineResult<i64> {
        self.get(path).and_then(as_int).ok_or_else(|| self.missing(path))
    }

    pub fn text(&self, path: &str) -> EngineResult<String> {
        self.get(path)
            .and_then(scalar_text)
            .ok_or_else(|| self.missing(path))
    }

    /// Text of a top-level field that must exist but may be null
    pub fn nullable_text(&self, key: &str) -> EngineResult<Option<String>> {
        self.fields
            .get(key)
            .map(scalar_text)
            .ok_or_else(|| self.missing(key))
    }

    /// Text of an optional field; blank values collapse to None
    pub fn text_or_none(&self, path: &str) -> Option<String> {
        self.get(path)
            .filter(|v| !is_blank(v))
            .and_then(scalar_text)
    }

    pub fn id(&self) -> EngineResult<RecordId> {
        self.get("id")
            .and_then(RecordId::from_value)
            .ok_or_else(|| self.missing("id"))
    }

    /// `1` is male, everything else female
    pub fn is_male(&self) -> EngineResult<bool> {
        let gender = self.require("gender")?;
        Ok(as_int(gender) == Some(1))
    }

    /// Marriage year; absent, null or zero means unmarried
    pub fn marriage_year(&self) -> Option<i64> {
        self.get("marriage").and_then(as_int).filter(|year| *year > 0)
    }

    /// Region as stored; `None` when null or absent, a lookup failure when not text
    pub fn region(&self) -> EngineResult<Option<&str>> {
        match self.get("region") {
            None => Ok(None),
            Some(Value::String(region)) => Ok(Some(region.as_str())),
            Some(_) => Err(self.missing("region")),
        }
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// First-listed education level
    pub fn first_education_level(&self) -> EngineResult<String> {
        let path = "education.history[0].level";
        self.get("education.history")
            .and_then(Value::as_array)
            .and_then(|entries| entries.first())
            .and_then(|entry| entry.get("level"))
            .and_then(scalar_text)
            .ok_or_else(|| self.missing(path))
    }

    /// History list of a category; absence is a lookup failure
    pub fn history(&self, category: Category) -> EngineResult<Vec<HistoryEntry<'_>>> {
        let path = format!("{}.history", category.key());
        let entries = self
            .get(&path)
            .and_then(Value::as_array)
            .ok_or_else(|| self.missing(&path))?;
        self.wrap_entries(category, entries)
    }

    /// History list of a category; absence yields an empty list
    pub fn history_or_empty(&self, category: Category) -> EngineResult<Vec<HistoryEntry<'_>>> {
        let path = format!("{}.history", category.key());
        match self.get(&path) {
            None => Ok(Vec::new()),
            Some(value) => {
                let entries = value.as_array().ok_or_else(|| self.missing(&path))?;
                self.wrap_entries(category, entries)
            }
        }
    }

    fn wrap_entries<'a>(
        &'a self,
        category: Category,
        entries: &'a [Value],
    ) -> EngineResult<Vec<HistoryEntry<'a>>> {
        entries
            .iter()
            .enumerate()
            .map(|(index, value)| {
                value
                    .as_object()
                    .map(|fields| HistoryEntry {
                        category,
                        index,
                        fields,
                        owner: &self.label,
                    })
                    .ok_or_else(|| {
                        self.missing(&format!("{}.history[{}]", category.key(), index))
                    })
            })
            .collect()
    }
}

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// One dated sub-event inside a category history
#[derive(Debug, Clone, Copy)]
pub struct HistoryEntry<'a> {
    pub category: Category,
    pub index: usize,
    fields: &'a Map<String, Value>,
    owner: &'a str,
}

impl<'a> HistoryEntry<'a> {
    fn path(&self, key: &str) -> String {
        format!("{}.history[{}].{}", self.category.key(), self.index, key)
    }

    fn missing(&self, key: &str) -> EngineError {
        EngineError::lookup(self.owner, self.path(key))
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn int(&self, key: &str) -> EngineResult<i64> {
        self.get(key).and_then(as_int).ok_or_else(|| self.missing(key))
    }

    /// Optional integer; present-but-non-numeric is still a failure
    pub fn opt_int(&self, key: &str) -> EngineResult<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => as_int(value).map(Some).ok_or_else(|| self.missing(key)),
        }
    }

    pub fn text(&self, key: &str) -> EngineResult<String> {
        self.get(key)
            .and_then(scalar_text)
            .ok_or_else(|| self.missing(key))
    }

    /// Key must exist; a null value reads as None
    pub fn nullable_text(&self, key: &str) -> EngineResult<Option<String>> {
        self.fields
            .get(key)
            .map(scalar_text)
            .ok_or_else(|| self.missing(key))
    }

    pub fn year(&self) -> EngineResult<i64> {
        self.int("year")
    }
}

/// Stable sort of entries by an integer key; every entry must carry it
pub fn sort_by_key<'a>(
    entries: Vec<HistoryEntry<'a>>,
    key: &str,
) -> EngineResult<Vec<HistoryEntry<'a>>> {
    let mut keyed = entries
        .into_iter()
        .map(|entry| entry.int(key).map(|k| (k, entry)))
        .collect::<EngineResult<Vec<_>>>()?;
    keyed.sort_by_key(|(k, _)| *k);
    Ok(keyed.into_iter().map(|(_, entry)| entry).collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> PersonRecord {
        PersonRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_record_id_ordering() {
        let mut ids = vec![
            RecordId::Text("b".to_string()),
            RecordId::Int(10),
            RecordId::Int(2),
            RecordId::Text("a".to_string()),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                RecordId::Int(2),
                RecordId::Int(10),
                RecordId::Text("a".to_string()),
                RecordId::Text("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_dotted_lookup_and_null() {
        let r = record(json!({
            "id": 3,
            "income": {"self_income_range": "3000-4000", "hh_income_range": ""},
            "region": null
        }));

        assert_eq!(r.text("income.self_income_range").unwrap(), "3000-4000");
        assert_eq!(r.text_or_none("income.hh_income_range"), None);
        assert_eq!(r.region().unwrap(), None);
        assert!(r.has_field("region"));
        assert!(r.get("income.missing").is_none());
    }

    #[test]
    fn test_non_text_region_is_lookup_failure() {
        let r = record(json!({"id": 4, "region": 82}));
        match r.region().unwrap_err() {
            EngineError::Lookup { path, .. } => assert_eq!(path, "region"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lookup_failure_reports_path() {
        let r = record(json!({"id": 9, "education": {"history": []}}));
        let err = r.first_education_level().unwrap_err();
        match err {
            EngineError::Lookup { record, path } => {
                assert_eq!(record, "9");
                assert_eq!(path, "education.history[0].level");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_marriage_year() {
        assert_eq!(record(json!({"marriage": 2005})).marriage_year(), Some(2005));
        assert_eq!(record(json!({"marriage": 0})).marriage_year(), None);
        assert_eq!(record(json!({})).marriage_year(), None);
    }

    #[test]
    fn test_history_strict_and_lenient() {
        let r = record(json!({"id": 1, "pet": {"history": [{"year": 2011, "kind": "dog"}]}}));

        assert_eq!(r.history(Category::Pet).unwrap().len(), 1);
        assert!(r.history(Category::Vehicle).is_err());
        assert!(r.history_or_empty(Category::Vehicle).unwrap().is_empty());
    }

    #[test]
    fn test_sort_by_key_is_stable_and_strict() {
        let r = record(json!({"id": 1, "interior": {"history": [
            {"year": 2015, "cost_amt": 1},
            {"year": 2012, "cost_amt": 2},
            {"year": 2015, "cost_amt": 3}
        ]}}));
        let sorted = sort_by_key(r.history(Category::Interior).unwrap(), "year").unwrap();
        let costs: Vec<i64> = sorted.iter().map(|e| e.int("cost_amt").unwrap()).collect();
        assert_eq!(costs, vec![2, 1, 3]);

        let bad = record(json!({"id": 1, "interior": {"history": [{"cost_amt": 1}]}}));
        let err = sort_by_key(bad.history(Category::Interior).unwrap(), "year").unwrap_err();
        assert!(err.to_string().contains("interior.history[0].year"));
    }

    #[test]
    fn test_scalar_text_rendering() {
        assert_eq!(scalar_text(&json!(55)), Some("55".to_string()));
        assert_eq!(scalar_text(&json!(55.5)), Some("55.5".to_string()));
        assert_eq!(scalar_text(&json!("55in")), Some("55in".to_string()));
        assert_eq!(scalar_text(&Value::Null), None);
        assert_eq!(as_int(&json!(2005.0)), Some(2005));
        assert_eq!(as_int(&json!(2005.5)), None);
    }

    #[test]
    fn test_education_labels() {
        assert_eq!(education_label("college"), Some("학사졸업"));
        assert_eq!(education_label("phd"), Some("박사졸업"));
        assert_eq!(education_label("kindergarten"), None);
        assert_eq!(Category::from_key("Pet"), Some(Category::Pet));
    }
}
