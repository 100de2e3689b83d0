//! Transformation module.
//!
//! Turns the four validated inputs into a star schema:
//! - Aggregate: per-customer, per-order and per-product measures
//! - Dimensions: time, customer and product dimensions
//! - Fact: the sales fact table assembled by ordered left joins
//! - Pipeline: extract -> transform -> load orchestration

pub mod aggregate;
pub mod dimensions;
pub mod fact;
pub mod pipeline;

pub use aggregate::{aggregate_features, Features, KeyedMeasure};
pub use dimensions::{
    build_customer_dim, build_product_dim, build_time_dim, parse_date, DATE_FORMAT,
};
pub use fact::assemble_sales_fact;
pub use pipeline::*;

use crate::error::PipelineResult;
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::{
    EntityTable, SalesFactRow, SourceData, Table, TimeDimRow, CUSTOMER_DIM, PRODUCT_DIM,
    SALES_FACT, TIME_DIM,
};

/// The four output tables of one run, plus the intermediate features.
#[derive(Debug, Clone)]
pub struct StarSchema {
    pub time_dim: Vec<TimeDimRow>,
    pub customer_dim: EntityTable,
    pub product_dim: EntityTable,
    pub sales_fact: Vec<SalesFactRow>,
    pub features: Features,
}

impl StarSchema {
    /// Output tables in load order.
    pub fn tables(&self) -> Vec<(&'static str, Table)> {
        vec![
            (TIME_DIM, Table::from_rows(&self.time_dim)),
            (CUSTOMER_DIM, self.customer_dim.to_table()),
            (PRODUCT_DIM, self.product_dim.to_table()),
            (SALES_FACT, Table::from_rows(&self.sales_fact)),
        ]
    }

    /// One output or feature table by name.
    pub fn table(&self, name: &str) -> Option<Table> {
        self.tables()
            .into_iter()
            .chain(self.features.tables())
            .find(|(n, _)| *n == name)
            .map(|(_, t)| t)
    }
}

/// Build the star schema from validated inputs.
///
/// Pure apart from logging: nothing is read or written. Fails only when an
/// order or ship date is not in `DD/MM/YYYY` form.
pub fn build_star_schema(data: &SourceData) -> PipelineResult<StarSchema> {
    log_info("🔄 Building star schema...");

    let features = aggregate_features(&data.order_details);
    log_info_indent(
        format!(
            "features: {} customers, {} orders, {} products",
            features.customer_sales.len(),
            features.order_sales.len(),
            features.product_sales.len()
        ),
        1,
    );

    let time_dim = build_time_dim(&data.orders)?;
    log_info_indent(format!("{}: {} dates", TIME_DIM, time_dim.len()), 1);

    let customer_dim = build_customer_dim(&data.customers);
    log_info_indent(format!("{}: {} rows", CUSTOMER_DIM, customer_dim.len()), 1);

    let product_dim = build_product_dim(&data.products);
    log_info_indent(format!("{}: {} rows", PRODUCT_DIM, product_dim.len()), 1);

    let sales_fact = assemble_sales_fact(&data.order_details, &features, &data.orders, &time_dim);
    log_success(format!("{}: {} rows", SALES_FACT, sales_fact.len()));

    Ok(StarSchema {
        time_dim,
        customer_dim,
        product_dim,
        sales_fact,
        features,
    })
}
