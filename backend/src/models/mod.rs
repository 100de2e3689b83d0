//! Domain models for the Starload pipeline.
//!
//! - [`Order`], [`OrderDetail`] - typed raw entities validated at extraction
//! - [`EntityTable`] - customer/product datasets (natural ID + free-form attributes)
//! - [`SourceData`] - the four validated inputs of one run
//! - [`TimeDimRow`], [`SalesFactRow`] - derived star schema rows
//! - [`Table`], [`Cell`] - the untyped shape handed to a warehouse sink

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// Table names
// =============================================================================

pub const TIME_DIM: &str = "time_dim";
pub const CUSTOMER_DIM: &str = "customer_dim";
pub const PRODUCT_DIM: &str = "product_dim";
pub const SALES_FACT: &str = "sales_fact";

/// Load order of the output tables.
pub const OUTPUT_TABLES: [&str; 4] = [TIME_DIM, CUSTOMER_DIM, PRODUCT_DIM, SALES_FACT];

// =============================================================================
// Raw entities
// =============================================================================

/// One row of the order dataset. Dates are kept as their raw `DD/MM/YYYY` text,
/// which is also the join key against the time dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: String,
    pub order_date: String,
    pub ship_date: String,
}

/// One order line item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetail {
    pub order_id: String,
    pub customer_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub discount: f64,
    pub sales: f64,
    pub profit: f64,
}

/// A descriptive dataset keyed by a natural ID column.
///
/// Every column is kept as text, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTable {
    pub id_column: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    id_index: usize,
}

impl EntityTable {
    /// Build a table, or `None` if `id_column` is not one of `columns`.
    pub fn new(id_column: &str, columns: Vec<String>, rows: Vec<Vec<String>>) -> Option<Self> {
        let id_index = columns.iter().position(|c| c == id_column)?;
        Some(Self {
            id_column: id_column.to_string(),
            columns,
            rows,
            id_index,
        })
    }

    /// Natural ID of a row.
    pub fn id_of<'a>(&self, row: &'a [String]) -> &'a str {
        row.get(self.id_index).map(String::as_str).unwrap_or("")
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |r| self.id_of(r))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same columns, different rows.
    pub fn with_rows(&self, rows: Vec<Vec<String>>) -> Self {
        Self {
            id_column: self.id_column.clone(),
            columns: self.columns.clone(),
            rows,
            id_index: self.id_index,
        }
    }

    pub fn to_table(&self) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .map(|r| r.iter().cloned().map(Cell::Text).collect())
                .collect(),
        }
    }
}

/// The four validated inputs of a run.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub orders: Vec<Order>,
    pub customers: EntityTable,
    pub order_details: Vec<OrderDetail>,
    pub products: EntityTable,
}

// =============================================================================
// Derived entities
// =============================================================================

/// One row of the time dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeDimRow {
    /// Raw date text, unique within the dimension
    pub date: String,
    pub time_id: u32,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub quarter: u32,
}

/// One row of the sales fact table, at line-item grain.
///
/// Keys and measures resolved by left joins are `None` when the join found no match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesFactRow {
    pub product_id: String,
    pub customer_id: String,
    pub order_date_id: Option<u32>,
    pub ship_date_id: Option<u32>,
    pub order_id: String,
    pub quantity: i64,
    pub discount: f64,
    pub sales: f64,
    pub profit: f64,
    pub total_sales_per_customer: Option<f64>,
    pub total_sales_per_order: Option<f64>,
    pub total_sales_per_product: Option<f64>,
    pub average_profit_per_product: Option<f64>,
}

// =============================================================================
// Output tables
// =============================================================================

/// A single output value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<Option<u32>> for Cell {
    fn from(v: Option<u32>) -> Self {
        v.map_or(Cell::Null, |v| Cell::Int(i64::from(v)))
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Cell::Null, Cell::Float)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(v) => f.write_str(v),
        }
    }
}

/// A typed row with a fixed column projection.
pub trait TableRow {
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<Cell>;
}

impl TableRow for TimeDimRow {
    const COLUMNS: &'static [&'static str] = &["Date", "TimeID", "Day", "Month", "Year", "Quarter"];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.date.clone()),
            Cell::Int(i64::from(self.time_id)),
            Cell::Int(i64::from(self.day)),
            Cell::Int(i64::from(self.month)),
            Cell::Int(i64::from(self.year)),
            Cell::Int(i64::from(self.quarter)),
        ]
    }
}

impl TableRow for SalesFactRow {
    const COLUMNS: &'static [&'static str] = &[
        "Product ID",
        "Customer ID",
        "OrderDateID",
        "ShipDateID",
        "Order ID",
        "Quantity",
        "Discount",
        "Sales",
        "Profit",
        "TotalSalesPerCustomer",
        "TotalSalesPerOrder",
        "TotalSalesPerProduct",
        "AverageProfitPerProduct",
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.product_id.clone()),
            Cell::Text(self.customer_id.clone()),
            self.order_date_id.into(),
            self.ship_date_id.into(),
            Cell::Text(self.order_id.clone()),
            Cell::Int(self.quantity),
            Cell::Float(self.discount),
            Cell::Float(self.sales),
            Cell::Float(self.profit),
            self.total_sales_per_customer.into(),
            self.total_sales_per_order.into(),
            self.total_sales_per_product.into(),
            self.average_profit_per_product.into(),
        ]
    }
}

/// Tabular data as handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn from_rows<R: TableRow>(rows: &[R]) -> Self {
        Self {
            columns: R::COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.iter().map(TableRow::cells).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, or `None` if the column does not exist.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|r| r.get(idx)).collect())
    }

    /// Rows as JSON objects keyed by column name.
    pub fn records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (col, cell) in self.columns.iter().zip(row) {
                    obj.insert(col.clone(), serde_json::to_value(cell).unwrap_or(Value::Null));
                }
                Value::Object(obj)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_table_requires_id_column() {
        let cols = vec!["Customer Name".to_string()];
        assert!(EntityTable::new("Customer ID", cols, vec![]).is_none());
    }

    #[test]
    fn test_entity_table_ids() {
        let table = EntityTable::new(
            "Product ID",
            vec!["Category".into(), "Product ID".into()],
            vec![
                vec!["Furniture".into(), "P1".into()],
                vec!["Technology".into(), "P2".into()],
            ],
        )
        .unwrap();

        assert_eq!(table.ids().collect::<Vec<_>>(), vec!["P1", "P2"]);
        assert_eq!(table.to_table().columns, vec!["Category", "Product ID"]);
    }

    #[test]
    fn test_fact_projection_columns() {
        let row = SalesFactRow {
            product_id: "P1".into(),
            customer_id: "C1".into(),
            order_date_id: Some(1),
            ship_date_id: None,
            order_id: "1".into(),
            quantity: 2,
            discount: 0.0,
            sales: 100.0,
            profit: 20.0,
            total_sales_per_customer: Some(100.0),
            total_sales_per_order: Some(100.0),
            total_sales_per_product: Some(100.0),
            average_profit_per_product: Some(20.0),
        };

        let table = Table::from_rows(&[row]);
        assert_eq!(table.columns.len(), 13);
        assert_eq!(table.columns[2], "OrderDateID");
        assert!(table.column_index("Order Date").is_none());
        assert!(table.rows[0][3].is_null());

        let records = table.records();
        assert_eq!(records[0]["OrderDateID"], json!(1));
        assert_eq!(records[0]["ShipDateID"], Value::Null);
        assert_eq!(records[0]["Sales"], json!(100.0));
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Null.to_string(), "");
        assert_eq!(Cell::Int(3).to_string(), "3");
        assert_eq!(Cell::Float(0.25).to_string(), "0.25");
        assert_eq!(Cell::Text("CA-2016".into()).to_string(), "CA-2016");
    }
}
