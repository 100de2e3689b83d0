//! Per-customer, per-order and per-product measures over the order line items.
//!
//! ```text
//! order lines                       features
//! ┌───────────────────────────┐     ┌──────────────────────────────┐
//! │ O1  C1  P1  sales  profit │ ──▶ │ Customer ID -> Σ Sales        │
//! │ O1  C2  P2  sales  profit │     │ Order ID    -> Σ Sales        │
//! │ O2  C1  P1  sales  profit │     │ Product ID  -> Σ Sales        │
//! └───────────────────────────┘     │ Product ID  -> mean(Profit)   │
//!                                   └──────────────────────────────┘
//! ```
//!
//! Keys are kept sorted, one entry per distinct key value.

use std::collections::BTreeMap;

use crate::models::{Cell, OrderDetail, Table};

/// Measure keyed by a natural ID.
pub type KeyedMeasure = BTreeMap<String, f64>;

/// The four derived measures attached to each fact row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features {
    pub customer_sales: KeyedMeasure,
    pub order_sales: KeyedMeasure,
    pub product_sales: KeyedMeasure,
    pub product_avg_profit: KeyedMeasure,
}

impl Features {
    /// Each measure as a two-column table, named like the fact column it feeds.
    pub fn tables(&self) -> Vec<(&'static str, Table)> {
        vec![
            (
                "customer_sales",
                measure_table("Customer ID", "TotalSalesPerCustomer", &self.customer_sales),
            ),
            ("order_sales", measure_table("Order ID", "TotalSalesPerOrder", &self.order_sales)),
            (
                "product_sales",
                measure_table("Product ID", "TotalSalesPerProduct", &self.product_sales),
            ),
            (
                "product_avg_profit",
                measure_table("Product ID", "AverageProfitPerProduct", &self.product_avg_profit),
            ),
        ]
    }
}

fn measure_table(key_column: &str, value_column: &str, measure: &KeyedMeasure) -> Table {
    Table {
        columns: vec![key_column.to_string(), value_column.to_string()],
        rows: measure
            .iter()
            .map(|(k, v)| vec![Cell::Text(k.clone()), Cell::Float(*v)])
            .collect(),
    }
}

/// Sum `value` over all rows sharing `key`.
pub fn sum_by<K, V>(details: &[OrderDetail], key: K, value: V) -> KeyedMeasure
where
    K: Fn(&OrderDetail) -> &str,
    V: Fn(&OrderDetail) -> f64,
{
    let mut sums = KeyedMeasure::new();
    for detail in details {
        *sums.entry(key(detail).to_string()).or_insert(0.0) += value(detail);
    }
    sums
}

/// Arithmetic mean of `value` over all rows sharing `key`.
pub fn mean_by<K, V>(details: &[OrderDetail], key: K, value: V) -> KeyedMeasure
where
    K: Fn(&OrderDetail) -> &str,
    V: Fn(&OrderDetail) -> f64,
{
    let mut acc: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for detail in details {
        let entry = acc.entry(key(detail).to_string()).or_insert((0.0, 0));
        entry.0 += value(detail);
        entry.1 += 1;
    }
    acc.into_iter()
        .map(|(k, (sum, count))| (k, sum / count as f64))
        .collect()
}

/// Compute every feature from the line items.
pub fn aggregate_features(details: &[OrderDetail]) -> Features {
    Features {
        customer_sales: sum_by(details, |d| d.customer_id.as_str(), |d| d.sales),
        order_sales: sum_by(details, |d| d.order_id.as_str(), |d| d.sales),
        product_sales: sum_by(details, |d| d.product_id.as_str(), |d| d.sales),
        product_avg_profit: mean_by(details, |d| d.product_id.as_str(), |d| d.profit),
    }
}
