//! # Starload - star schema ETL for order extracts
//!
//! Starload reads four CSV extracts (orders, customers, order line items,
//! products) from a bucket-like source and loads a star schema into a
//! warehouse-like sink: a time dimension, customer and product dimensions and
//! a sales fact table at line-item grain.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Source    │────▶│   Extract   │────▶│  Transform  │────▶│    Sink     │
//! │ (4 CSV files)│    │ (parse+type)│     │ (dims+fact) │     │ (4 tables)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use starload::{run, MemorySink, DirectorySource, PipelineOptions, TriggerEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let event = TriggerEvent::new("./uploads", "ordersdf.csv");
//!     let sink = MemorySink::new();
//!     let source = DirectorySource::new("./uploads");
//!     let report = run(&event, &source, &sink, &PipelineOptions::default()).await;
//!     println!("{:?}: {}", report.status, report.message);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`logs`] - Pipeline log broadcaster
//! - [`config`] - Warehouse configuration
//! - [`models`] - Domain models and output tables
//! - [`parser`] - CSV decoding with auto-detection, table encoding
//! - [`validation`] - Raw datasets to typed records
//! - [`storage`] - Source and sink collaborators
//! - [`extract`] - Trigger handling and input extraction
//! - [`transform`] - Aggregates, dimensions, fact and pipeline

// Core modules
pub mod error;
pub mod logs;
pub mod config;
pub mod models;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Collaborators
pub mod storage;

// Extraction
pub mod extract;

// Transformation
pub mod transform;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError,
    SourceError,
    SinkError,
    SchemaError,
    DateParseError,
    PipelineError,
    PipelineResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Order,
    OrderDetail,
    EntityTable,
    SourceData,
    TimeDimRow,
    SalesFactRow,
    Table,
    Cell,
    OUTPUT_TABLES,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::WarehouseConfig;

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    parse_bytes,
    parse_csv_file,
    detect_encoding,
    detect_delimiter,
    decode_content,
    format_delimiter,
    encode_table,
    OutputFormat,
    ParseResult,
};

// =============================================================================
// Re-exports - Collaborators
// =============================================================================

pub use storage::{Source, Sink, DirectorySource, DirectorySink, MemorySource, MemorySink};

// =============================================================================
// Re-exports - Extraction
// =============================================================================

pub use extract::{extract, TriggerEvent, REQUIRED_FILES};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    build_star_schema,
    StarSchema,
    Features,
    load,
    run,
    try_run,
    PipelineOptions,
    RunReport,
    RunStatus,
    LoadedTable,
};
