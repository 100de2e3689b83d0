//! Extraction of the four input datasets.
//!
//! The source catalogue must contain every file in [`REQUIRED_FILES`]; if any
//! is absent the run stops with [`PipelineError::MissingInput`] before anything
//! is read. The four files are then read and decoded concurrently and each one
//! is validated into typed records.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PipelineError, PipelineResult, SchemaError};
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::SourceData;
use crate::parser::{format_delimiter, parse_bytes, ParseResult};
use crate::storage::Source;
use crate::validation::{entities_from, order_details_from, orders_from, CUSTOMER_ID, PRODUCT_ID};

pub const ORDERS_FILE: &str = "ordersdf.csv";
pub const CUSTOMERS_FILE: &str = "customersdf.csv";
pub const ORDER_DETAILS_FILE: &str = "orderdetailsdf.csv";
pub const PRODUCTS_FILE: &str = "productsdf.csv";

/// Every file a run needs, in read order.
pub const REQUIRED_FILES: [&str; 4] =
    [ORDERS_FILE, CUSTOMERS_FILE, ORDER_DETAILS_FILE, PRODUCTS_FILE];

/// Descriptor of the uploaded object that caused a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub bucket: String,
    pub name: String,
}

impl TriggerEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidTrigger(e.to_string()))
    }

    /// Whether the triggering object is one of the pipeline inputs.
    pub fn is_relevant(&self) -> bool {
        is_required_file(&self.name)
    }
}

pub fn is_required_file(name: &str) -> bool {
    REQUIRED_FILES.iter().any(|f| *f == name)
}

/// Canonical dataset name of a file: its name without extension.
pub fn dataset_name(file: &str) -> &str {
    file.split('.').next().unwrap_or(file)
}

/// Required files absent from `catalogue`, in [`REQUIRED_FILES`] order.
pub fn missing_files(catalogue: &[String]) -> Vec<String> {
    REQUIRED_FILES
        .iter()
        .filter(|f| !catalogue.iter().any(|c| c == *f))
        .map(|f| f.to_string())
        .collect()
}

/// Check the catalogue, then read and decode the four required files concurrently.
///
/// Returns the decoded datasets keyed by canonical name.
pub async fn read_datasets(
    source: &dyn Source,
    delimiter: Option<char>,
) -> PipelineResult<BTreeMap<String, ParseResult>> {
    let catalogue = source.catalogue().await?;
    let missing = missing_files(&catalogue);
    if !missing.is_empty() {
        return Err(PipelineError::MissingInput { missing });
    }

    let reads = REQUIRED_FILES.iter().map(|file| async move {
        let bytes = source.read(file).await?;
        let dataset = dataset_name(file);
        let parsed = parse_bytes(&bytes, delimiter).map_err(|e| SchemaError::Malformed {
            dataset: dataset.to_string(),
            source: e,
        })?;
        Ok::<_, PipelineError>((dataset.to_string(), parsed))
    });

    let datasets: BTreeMap<String, ParseResult> = try_join_all(reads).await?.into_iter().collect();

    for (name, parsed) in &datasets {
        log_info_indent(
            format!(
                "{}: {} rows, {} columns ({}, '{}')",
                name,
                parsed.rows.len(),
                parsed.headers.len(),
                parsed.encoding,
                format_delimiter(parsed.delimiter)
            ),
            1,
        );
    }

    Ok(datasets)
}

/// Read every required dataset and validate it into typed records.
pub async fn extract(source: &dyn Source, delimiter: Option<char>) -> PipelineResult<SourceData> {
    log_info("📥 Extracting input files...");
    let datasets = read_datasets(source, delimiter).await?;

    let data = SourceData {
        orders: orders_from(dataset(&datasets, ORDERS_FILE)?, dataset_name(ORDERS_FILE))?,
        customers: entities_from(
            dataset(&datasets, CUSTOMERS_FILE)?,
            dataset_name(CUSTOMERS_FILE),
            CUSTOMER_ID,
        )?,
        order_details: order_details_from(
            dataset(&datasets, ORDER_DETAILS_FILE)?,
            dataset_name(ORDER_DETAILS_FILE),
        )?,
        products: entities_from(
            dataset(&datasets, PRODUCTS_FILE)?,
            dataset_name(PRODUCTS_FILE),
            PRODUCT_ID,
        )?,
    };

    log_success(format!(
        "Extracted {} orders, {} customers, {} order lines, {} products",
        data.orders.len(),
        data.customers.len(),
        data.order_details.len(),
        data.products.len()
    ));
    Ok(data)
}

fn dataset<'a>(
    datasets: &'a BTreeMap<String, ParseResult>,
    file: &str,
) -> PipelineResult<&'a ParseResult> {
    datasets
        .get(dataset_name(file))
        .ok_or_else(|| PipelineError::MissingInput { missing: vec![file.to_string()] })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::storage::MemorySource;

    pub(crate) const ORDERS: &str = "Order ID,Order Date,Ship Date\n1,01/01/2020,03/01/2020\n";
    pub(crate) const CUSTOMERS: &str = "Customer ID,Customer Name\nC1,Ada Lovelace\n";
    pub(crate) const DETAILS: &str =
        "Order ID,Customer ID,Product ID,Quantity,Discount,Sales,Profit\n1,C1,P1,2,0,100,20\n";
    pub(crate) const PRODUCTS: &str = "Product ID,Product Name\nP1,\"Chair, Oak\"\n";

    pub(crate) fn full_source() -> MemorySource {
        MemorySource::new()
            .with_file(ORDERS_FILE, ORDERS)
            .with_file(CUSTOMERS_FILE, CUSTOMERS)
            .with_file(ORDER_DETAILS_FILE, DETAILS)
            .with_file(PRODUCTS_FILE, PRODUCTS)
    }

    #[test]
    fn test_trigger_relevance() {
        assert!(TriggerEvent::new("bucket", "ordersdf.csv").is_relevant());
        assert!(!TriggerEvent::new("bucket", "notes.txt").is_relevant());
        assert!(!TriggerEvent::new("bucket", "archive/ordersdf.csv").is_relevant());
    }

    #[test]
    fn test_trigger_from_json() {
        let json = r#"{"bucket":"uploads","name":"productsdf.csv","size":"12"}"#;
        let event = TriggerEvent::from_json(json).unwrap();
        assert_eq!(event, TriggerEvent::new("uploads", "productsdf.csv"));

        let err = TriggerEvent::from_json(r#"{"bucket":"uploads"}"#).unwrap_err();
        assert_eq!(err.kind(), "TriggerError");
    }

    #[test]
    fn test_dataset_name() {
        assert_eq!(dataset_name("orderdetailsdf.csv"), "orderdetailsdf");
        assert_eq!(dataset_name("plain"), "plain");
    }

    #[test]
    fn test_missing_files() {
        let catalogue = vec!["customersdf.csv".to_string(), "notes.txt".to_string()];
        assert_eq!(
            missing_files(&catalogue),
            vec!["ordersdf.csv", "orderdetailsdf.csv", "productsdf.csv"]
        );
    }

    #[tokio::test]
    async fn test_read_datasets_keyed_by_name() {
        let source = full_source().with_file("notes.txt", "ignored");
        let datasets = read_datasets(&source, None).await.unwrap();

        let names: Vec<&str> = datasets.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["customersdf", "orderdetailsdf", "ordersdf", "productsdf"]);
        assert_eq!(datasets["productsdf"].rows[0][1], "Chair, Oak");
    }

    #[tokio::test]
    async fn test_missing_input() {
        let source = MemorySource::new()
            .with_file(ORDERS_FILE, ORDERS)
            .with_file(ORDER_DETAILS_FILE, DETAILS);

        let err = extract(&source, None).await.unwrap_err();
        match err {
            PipelineError::MissingInput { missing } => {
                assert_eq!(missing, vec!["customersdf.csv", "productsdf.csv"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_extract_typed() {
        let data = extract(&full_source(), None).await.unwrap();

        assert_eq!(data.orders.len(), 1);
        assert_eq!(data.order_details[0].sales, 100.0);
        assert_eq!(data.customers.ids().collect::<Vec<_>>(), vec!["C1"]);
        assert_eq!(data.products.columns, vec!["Product ID", "Product Name"]);
    }

    #[tokio::test]
    async fn test_extract_schema_error() {
        let source = full_source().with_file(ORDERS_FILE, "Order ID,Order Date\n1,01/01/2020\n");
        let err = extract(&source, None).await.unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
        assert!(err.to_string().contains("Ship Date"));
    }

    #[tokio::test]
    async fn test_extract_empty_file_is_schema_error() {
        let source = full_source().with_file(PRODUCTS_FILE, "");
        let err = extract(&source, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Schema(SchemaError::Malformed { .. })));
    }

    struct BrokenSource;

    #[async_trait::async_trait]
    impl Source for BrokenSource {
        async fn catalogue(&self) -> crate::error::SourceResult<Vec<String>> {
            Ok(REQUIRED_FILES.iter().map(|f| f.to_string()).collect())
        }

        async fn read(&self, name: &str) -> crate::error::SourceResult<Vec<u8>> {
            Err(SourceError::Unavailable(format!("{name}: connection reset")))
        }
    }

    #[tokio::test]
    async fn test_read_failure_propagates() {
        let err = extract(&BrokenSource, None).await.unwrap_err();
        assert_eq!(err.kind(), "SourceError");
        assert!(err.to_string().contains("connection reset"));
    }
}
