// CLUE Extract - Core Library
// Flattens nested panel records into demographic, purchase and life-event extracts

pub mod config;
pub mod demographics;
pub mod error;
pub mod export;
pub mod loader;
pub mod logging;
pub mod outcome;
pub mod pipeline;
pub mod price;
pub mod purchases;
pub mod record;
pub mod timeline;

// Re-export commonly used types
pub use config::{ExtractConfig, LocationFilter};
pub use demographics::{DemographicExtractor, DemographicRow};
pub use error::{EngineError, EngineResult};
pub use export::{stack_tables, write_csv, write_csv_file, CsvRow, ExportKind, StackedTable};
pub use loader::{
    load_record_file, load_record_files, parse_records, LoadReport, RecordTable, SourceName,
    SourceProfile, SourceRegistry,
};
pub use outcome::{Extraction, FailurePolicy, RecordFailure};
pub use pipeline::{extract_demographics, reconcile_purchases, unify_timeline};
pub use price::{PriceEntry, PriceReference};
pub use purchases::{EventTag, PurchaseEvent, PurchaseReconciler, PurchaseRow};
pub use record::{Category, HistoryEntry, PersonRecord, RecordId};
pub use timeline::{TimelineRow, TimelineUnifier};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
