// 📤 CSV Export - UTF-8 with BOM so spreadsheet tools detect the encoding
//
// Headers are written even when there are no rows; the downstream
// notebooks expect a fixed column layout per extract.

use crate::demographics::DemographicRow;
use crate::error::EngineResult;
use crate::loader::RecordTable;
use crate::purchases::PurchaseRow;
use crate::timeline::TimelineRow;
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ============================================================================
// ROW LAYOUTS
// ============================================================================

/// A row type with a fixed CSV header
pub trait CsvRow: Serialize {
    const HEADERS: &'static [&'static str];
}

impl CsvRow for DemographicRow {
    const HEADERS: &'static [&'static str] = &[
        "id", "source", "sex", "marriage", "age", "ages", "current_job", "self_income",
        "hh_income", "last_ed", "region",
    ];
}

impl CsvRow for PurchaseRow {
    const HEADERS: &'static [&'static str] = &[
        "country", "source", "id", "cid", "product", "ages", "age", "year", "detail", "brand",
        "price", "event",
    ];
}

impl CsvRow for TimelineRow {
    const HEADERS: &'static [&'static str] = &[
        "source", "region", "id", "header", "sequence", "condition", "age", "year", "detail",
        "brand", "price",
    ];
}

// ============================================================================
// WRITING
// ============================================================================

/// Write rows with a BOM and a header line
pub fn write_csv<W: Write, R: CsvRow>(mut writer: W, rows: &[R]) -> EngineResult<()> {
    writer.write_all(UTF8_BOM)?;

    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(R::HEADERS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv_file<R: CsvRow>(path: &Path, rows: &[R]) -> EngineResult<()> {
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), rows)?;
    info!(path = %path.display(), rows = rows.len(), "wrote extract");
    Ok(())
}

// ============================================================================
// FILE NAMES
// ============================================================================

/// Which extract is being exported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Demographics,
    Purchases { min_year: i64 },
    Timeline,
}

impl ExportKind {
    /// Conventional file name for a source's extract
    pub fn file_name(&self, source_short: &str) -> String {
        match self {
            ExportKind::Demographics => format!("{}_processed_demographics.csv", source_short),
            ExportKind::Purchases { min_year } => format!(
                "processed_data_2_purchase_listup_{}_{}.csv",
                source_short, min_year
            ),
            ExportKind::Timeline => {
                format!("processed_data_3_{}_lifeevent_purch_listup.csv", source_short)
            }
        }
    }

    pub fn path_in(&self, dir: &Path, source_short: &str) -> PathBuf {
        dir.join(self.file_name(source_short))
    }
}

// ============================================================================
// STACKING
// ============================================================================

/// Raw record tables concatenated into one flat table
#[derive(Debug, Clone, PartialEq)]
pub struct StackedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Union of top-level keys (first-seen order); nested values as compact JSON
pub fn stack_tables(tables: &[RecordTable]) -> StackedTable {
    let mut columns: Vec<String> = Vec::new();
    for table in tables {
        for column in table.columns() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }

    let rows = tables
        .iter()
        .flat_map(|t| t.records.iter())
        .map(|record| {
            columns
                .iter()
                .map(|c| cell_text(record.fields().get(c)))
                .collect()
        })
        .collect();

    StackedTable { columns, rows }
}

impl StackedTable {
    pub fn write_csv<W: Write>(&self, mut writer: W) -> EngineResult<()> {
        writer.write_all(UTF8_BOM)?;

        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
