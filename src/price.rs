// 💰 Price Reference - (product, kind) → unit price
//
// Loaded from a UTF-8 CSV (BOM tolerated). `kind` is always kept as text
// so it compares against a purchase's stringified `kind_name`.

use crate::error::{EngineError, EngineResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

pub const REQUIRED_COLUMNS: [&str; 3] = ["product_id", "kind", "price"];

const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Clone, PartialEq)]
pub struct PriceEntry {
    /// `product_id` column, matched against a purchase's `name`
    pub name: String,
    /// `kind` column as text, matched against a purchase's `kind_name`
    pub kind_name: String,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct PriceReference {
    entries: Vec<PriceEntry>,
    // Positions of every entry sharing a key, in file order
    positions: HashMap<(String, String), Vec<usize>>,
}

impl PriceReference {
    pub fn from_entries(entries: Vec<PriceEntry>) -> Self {
        let mut positions: HashMap<(String, String), Vec<usize>> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            positions
                .entry((entry.name.clone(), entry.kind_name.clone()))
                .or_default()
                .push(i);
        }
        PriceReference { entries, positions }
    }

    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let file = File::open(path)?;
        let reference = Self::from_reader(BufReader::new(file))?;
        debug!(
            path = %path.display(),
            entries = reference.len(),
            "loaded price reference"
        );
        Ok(reference)
    }

    /// Parse a price CSV; required columns are checked before any row is read
    pub fn from_reader<R: Read>(reader: R) -> EngineResult<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = if i == 0 { h.trim_start_matches(UTF8_BOM) } else { h };
                h.trim().to_string()
            })
            .collect();

        let column = |name: &str| headers.iter().position(|h| h == name);
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| column(*c).is_none())
            .map(|c| c.to_string())
            .collect();

        let (Some(product_col), Some(kind_col), Some(price_col)) =
            (column("product_id"), column("kind"), column("price"))
        else {
            return Err(EngineError::Schema { missing });
        };

        let mut entries = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let cell = |i: usize| record.get(i).unwrap_or("").trim();
            entries.push(PriceEntry {
                name: cell(product_col).to_string(),
                kind_name: cell(kind_col).to_string(),
                price: cell(price_col).parse::<f64>().ok(),
            });
        }

        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry for a key, in file order (left-join view)
    pub fn matches(&self, name: &str, kind_name: &str) -> Vec<&PriceEntry> {
        self.positions
            .get(&(name.to_string(), kind_name.to_string()))
            .map(|idx| idx.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    /// Last entry for a key (mapping view). A blank price cell still counts
    /// as a match; only an absent key yields `None`.
    pub fn exact(&self, name: &str, kind_name: &str) -> Option<&PriceEntry> {
        self.positions
            .get(&(name.to_string(), kind_name.to_string()))
            .and_then(|idx| idx.last())
            .map(|&i| &self.entries[i])
    }
}

// ============================================================================
// TESTS
// ============================================================================
