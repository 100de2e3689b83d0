//! Schema validation of the raw input datasets.
//!
//! Each required dataset is checked once, at the extraction boundary, and
//! converted into typed records. Columns are matched by exact name; columns
//! the transformation does not use are ignored for orders and line items and
//! carried through untouched for customers and products.
//!
//! | Dataset       | Required columns                                                 |
//! |---------------|------------------------------------------------------------------|
//! | orders        | `Order ID`, `Order Date`, `Ship Date`                            |
//! | customers     | `Customer ID`                                                    |
//! | order details | `Order ID`, `Customer ID`, `Product ID`, `Quantity`, `Discount`, |
//! |               | `Sales`, `Profit`                                                |
//! | products      | `Product ID`                                                     |

use std::str::FromStr;

use crate::error::{SchemaError, SchemaResult};
use crate::models::{EntityTable, Order, OrderDetail};
use crate::parser::ParseResult;

pub const ORDER_ID: &str = "Order ID";
pub const ORDER_DATE: &str = "Order Date";
pub const SHIP_DATE: &str = "Ship Date";
pub const CUSTOMER_ID: &str = "Customer ID";
pub const PRODUCT_ID: &str = "Product ID";
pub const QUANTITY: &str = "Quantity";
pub const DISCOUNT: &str = "Discount";
pub const SALES: &str = "Sales";
pub const PROFIT: &str = "Profit";

/// Resolve the index of every required column, failing on the first absent one.
pub fn require_columns<const N: usize>(
    table: &ParseResult,
    dataset: &str,
    columns: [&str; N],
) -> SchemaResult<[usize; N]> {
    let mut indices = [0; N];
    for (slot, column) in indices.iter_mut().zip(columns) {
        *slot = table
            .column_index(column)
            .ok_or_else(|| SchemaError::MissingColumn {
                dataset: dataset.to_string(),
                column: column.to_string(),
            })?;
    }
    Ok(indices)
}

/// 1-based source line of a data row (header is line 1).
fn line_of(row_idx: usize) -> usize {
    row_idx + 2
}

fn invalid(
    dataset: &str,
    row_idx: usize,
    column: &str,
    value: &str,
    message: impl Into<String>,
) -> SchemaError {
    SchemaError::InvalidValue {
        dataset: dataset.to_string(),
        line: line_of(row_idx),
        column: column.to_string(),
        value: value.to_string(),
        message: message.into(),
    }
}

fn key(
    dataset: &str,
    row: &[String],
    row_idx: usize,
    idx: usize,
    column: &str,
) -> SchemaResult<String> {
    let value = &row[idx];
    if value.is_empty() {
        return Err(invalid(dataset, row_idx, column, value, "key column must not be empty"));
    }
    Ok(value.clone())
}

fn number<T: FromStr>(
    dataset: &str,
    row: &[String],
    row_idx: usize,
    idx: usize,
    column: &str,
    expected: &str,
) -> SchemaResult<T> {
    let value = &row[idx];
    value
        .parse::<T>()
        .map_err(|_| invalid(dataset, row_idx, column, value, format!("expected {}", expected)))
}

/// Validate the order dataset.
pub fn orders_from(table: &ParseResult, dataset: &str) -> SchemaResult<Vec<Order>> {
    let [id, order_date, ship_date] =
        require_columns(table, dataset, [ORDER_ID, ORDER_DATE, SHIP_DATE])?;

    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            Ok(Order {
                order_id: key(dataset, row, i, id, ORDER_ID)?,
                order_date: row[order_date].clone(),
                ship_date: row[ship_date].clone(),
            })
        })
        .collect()
}

/// Validate the order line item dataset.
pub fn order_details_from(table: &ParseResult, dataset: &str) -> SchemaResult<Vec<OrderDetail>> {
    let [order_id, customer_id, product_id, quantity, discount, sales, profit] = require_columns(
        table,
        dataset,
        [ORDER_ID, CUSTOMER_ID, PRODUCT_ID, QUANTITY, DISCOUNT, SALES, PROFIT],
    )?;

    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            Ok(OrderDetail {
                order_id: key(dataset, row, i, order_id, ORDER_ID)?,
                customer_id: key(dataset, row, i, customer_id, CUSTOMER_ID)?,
                product_id: key(dataset, row, i, product_id, PRODUCT_ID)?,
                quantity: number(dataset, row, i, quantity, QUANTITY, "an integer")?,
                discount: number(dataset, row, i, discount, DISCOUNT, "a number")?,
                sales: number(dataset, row, i, sales, SALES, "a number")?,
                profit: number(dataset, row, i, profit, PROFIT, "a number")?,
            })
        })
        .collect()
}

/// Validate a descriptive dataset keyed by `id_column`; every column is kept.
pub fn entities_from(
    table: &ParseResult,
    dataset: &str,
    id_column: &str,
) -> SchemaResult<EntityTable> {
    EntityTable::new(id_column, table.headers.clone(), table.rows.clone()).ok_or_else(|| {
        SchemaError::MissingColumn {
            dataset: dataset.to_string(),
            column: id_column.to_string(),
        }
    })
}
