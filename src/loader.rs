// 📂 Record Loader - JSON panel files → record tables
//
// A file holds either a list of person records or a single record.
// Each table remembers which source it came from and what that source
// is able to carry, so extractors never match on file names themselves.

use crate::error::{EngineError, EngineResult};
use crate::record::{Category, PersonRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// SOURCE NAME
// ============================================================================

/// Source identity derived from a file name like `nielsen_2023_panel.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceName {
    file_name: String,
}

impl SourceName {
    pub fn from_file_name(file_name: &str) -> Self {
        SourceName {
            file_name: file_name.to_string(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// First two `_` tokens joined by `_` (`nielsen_2023`)
    pub fn qualified(&self) -> String {
        let mut tokens = self.file_name.split('_');
        match (tokens.next(), tokens.next()) {
            (Some(first), Some(second)) => format!("{}_{}", first, second),
            _ => self.file_name.clone(),
        }
    }

    /// First `_` token only (`nielsen`)
    pub fn short(&self) -> String {
        self.file_name
            .split('_')
            .next()
            .unwrap_or(self.file_name.as_str())
            .to_string()
    }
}

// ============================================================================
// SOURCE PROFILE
// ============================================================================

/// Capability descriptor: which categories a source structurally lacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Vendor name matched against the first token of the file name
    pub name: String,

    /// Categories the vendor never collects
    #[serde(default)]
    pub lacks: Vec<String>,
}

impl SourceProfile {
    pub fn new(name: &str) -> Self {
        SourceProfile {
            name: name.to_string(),
            lacks: Vec::new(),
        }
    }

    pub fn lacking(mut self, category: Category) -> Self {
        self.lacks.push(category.key().to_string());
        self
    }

    pub fn has(&self, category: Category) -> bool {
        !self
            .lacks
            .iter()
            .any(|lacked| Category::from_key(lacked) == Some(category))
    }

    pub fn matches(&self, vendor: &str) -> bool {
        self.name.eq_ignore_ascii_case(vendor.trim())
    }
}

/// Known sources and their capabilities
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    profiles: Vec<SourceProfile>,
}

impl SourceRegistry {
    /// Registry with the known panel vendors
    pub fn new() -> Self {
        SourceRegistry {
            profiles: vec![SourceProfile::new("nielsen").lacking(Category::Pet)],
        }
    }

    pub fn from_profiles(profiles: Vec<SourceProfile>) -> Self {
        SourceRegistry { profiles }
    }

    /// Later registrations override earlier ones with the same name
    pub fn register(&mut self, profile: SourceProfile) {
        self.profiles.retain(|p| !p.matches(&profile.name));
        self.profiles.push(profile);
    }

    pub fn count(&self) -> usize {
        self.profiles.len()
    }

    pub fn profiles(&self) -> &[SourceProfile] {
        &self.profiles
    }

    pub fn resolve(&self, source: &SourceName) -> SourceProfile {
        let vendor = source.short();
        self.profiles
            .iter()
            .find(|p| p.matches(&vendor))
            .cloned()
            .unwrap_or_else(|| SourceProfile::new(&vendor))
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// RECORD TABLE
// ============================================================================

/// All records of one input file
#[derive(Debug, Clone)]
pub struct RecordTable {
    pub source: SourceName,
    pub profile: SourceProfile,
    pub records: Vec<PersonRecord>,
}

impl RecordTable {
    pub fn new(source: SourceName, profile: SourceProfile, records: Vec<PersonRecord>) -> Self {
        RecordTable {
            source,
            profile,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Top-level keys across all records, in first-seen order
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for record in &self.records {
            for key in record.fields().keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }
}

/// Outcome of loading several files: tables plus skipped-file warnings
#[derive(Debug, Default)]
pub struct LoadReport {
    pub tables: Vec<RecordTable>,
    pub skipped: Vec<EngineError>,
}

// ============================================================================
// LOADING
// ============================================================================

/// Parse one JSON document into a record table
pub fn parse_records<R: Read>(
    file_name: &str,
    reader: R,
    registry: &SourceRegistry,
) -> EngineResult<RecordTable> {
    let document: Value =
        serde_json::from_reader(reader).map_err(|e| EngineError::parse(file_name, e))?;

    let records = match document {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                PersonRecord::from_value(item).ok_or_else(|| {
                    EngineError::parse(file_name, format!("element {} is not an object", i))
                })
            })
            .collect::<EngineResult<Vec<_>>>()?,
        Value::Object(fields) => vec![PersonRecord::new(fields)],
        _ => {
            return Err(EngineError::parse(
                file_name,
                "unsupported JSON structure (expected a list or a mapping)",
            ))
        }
    };

    let source = SourceName::from_file_name(file_name);
    let profile = registry.resolve(&source);
    debug!(file = file_name, records = records.len(), "parsed record file");

    Ok(RecordTable::new(source, profile, records))
}

/// Load one JSON file from disk
pub fn load_record_file(path: &Path, registry: &SourceRegistry) -> EngineResult<RecordTable> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.json")
        .to_string();

    let file = File::open(path).map_err(|e| EngineError::parse(&file_name, e))?;
    parse_records(&file_name, BufReader::new(file), registry)
}

/// Load many files; unreadable or malformed ones are skipped with a warning
pub fn load_record_files<P: AsRef<Path>>(paths: &[P], registry: &SourceRegistry) -> LoadReport {
    let mut report = LoadReport::default();
    debug!(files = paths.len(), profiles = registry.count(), "loading record files");

    for path in paths {
        match load_record_file(path.as_ref(), registry) {
            Ok(table) => report.tables.push(table),
            Err(err) => {
                warn!(error = %err, "skipping input file");
                report.skipped.push(err);
            }
        }
    }

    report
}

// ============================================================================
// TESTS
// ============================================================================
