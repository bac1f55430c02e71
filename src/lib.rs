//! Course outcome (CO) attainment engine.
//!
//! Marks sheets go in; per-CO attainment levels, the weighted component
//! aggregate, CO-PO attainment and flat report tables come out. The engine
//! modules are pure and never fail: malformed input degrades to zero or empty
//! results. `config`, `loader` and `output` are the file-facing pieces used by
//! the command-line front end.
pub mod aggregate;
pub mod attainment;
pub mod config;
pub mod copo;
pub mod engine;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod reports;
pub mod schema;
pub mod types;
pub mod util;

pub use aggregate::{aggregate_co, AggregationPolicy, CoAggregate};
pub use attainment::{compute_attainment, AttainmentResult};
pub use copo::{propagate, CoPoMapping, CoPoResult};
pub use engine::{
    compute, AttainmentSnapshot, ComponentInput, ComputationContext, ComputationInput,
    CourseDetails, IndirectScores, SheetInput,
};
pub use normalize::{extract_columns, normalize, normalize_sheet};
pub use reports::build_report_tables;
pub use types::{
    AttainmentLevel, CellValue, CoLabel, NormalizedSheetData, PoLabel, RawSheet, ReportTables,
    SheetBag, Threshold,
};
