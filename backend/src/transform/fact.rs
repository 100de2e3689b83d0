//! Sales fact assembly.
//!
//! One fact row per order line item. Starting from the line items, each step
//! is a left join that fills one column and never adds or drops a row:
//!
//! 1. `TotalSalesPerCustomer` by Customer ID
//! 2. `TotalSalesPerOrder` by Order ID
//! 3. `TotalSalesPerProduct` by Product ID
//! 4. `AverageProfitPerProduct` by Product ID
//! 5. Order Date / Ship Date from the order dataset by Order ID
//! 6. `OrderDateID` by Order Date against the time dimension
//! 7. `ShipDateID` by Ship Date against the time dimension
//!
//! Steps 6 and 7 are separate lookups, so a line whose order and ship dates are
//! the same day gets the same `TimeID` in both columns. The raw date text from
//! step 5 is dropped once the keys are resolved.

use std::collections::HashMap;

use super::aggregate::{Features, KeyedMeasure};
use super::dimensions::time_index;
use crate::logs::{log_info_indent, log_warning};
use crate::models::{Order, OrderDetail, SalesFactRow, TimeDimRow};

/// Raw date text attached to a fact row between steps 5 and 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderDates<'a> {
    pub order_date: &'a str,
    pub ship_date: &'a str,
}

/// A fact row with only the line item columns filled in.
pub fn base_row(detail: &OrderDetail) -> SalesFactRow {
    SalesFactRow {
        product_id: detail.product_id.clone(),
        customer_id: detail.customer_id.clone(),
        order_date_id: None,
        ship_date_id: None,
        order_id: detail.order_id.clone(),
        quantity: detail.quantity,
        discount: detail.discount,
        sales: detail.sales,
        profit: detail.profit,
        total_sales_per_customer: None,
        total_sales_per_order: None,
        total_sales_per_product: None,
        average_profit_per_product: None,
    }
}

/// Left join of a keyed measure into one column; returns the number of rows without a match.
pub fn attach_measure(
    rows: &mut [SalesFactRow],
    measure: &KeyedMeasure,
    key: fn(&SalesFactRow) -> &str,
    slot: fn(&mut SalesFactRow) -> &mut Option<f64>,
) -> usize {
    let mut unmatched = 0;
    for row in rows.iter_mut() {
        let value = measure.get(key(row)).copied();
        if value.is_none() {
            unmatched += 1;
        }
        *slot(row) = value;
    }
    unmatched
}

/// First occurrence of each Order ID; later duplicates are reported and ignored.
pub fn order_lookup(orders: &[Order]) -> HashMap<&str, &Order> {
    let mut lookup: HashMap<&str, &Order> = HashMap::with_capacity(orders.len());
    let mut duplicates = 0;
    for order in orders {
        if lookup.contains_key(order.order_id.as_str()) {
            duplicates += 1;
        } else {
            lookup.insert(order.order_id.as_str(), order);
        }
    }
    if duplicates > 0 {
        log_warning(format!(
            "{} duplicate Order ID row(s) in the order dataset; using the first occurrence",
            duplicates
        ));
    }
    lookup
}

/// Left join of order and ship dates by Order ID.
pub fn attach_order_dates<'a>(
    rows: &[SalesFactRow],
    orders: &HashMap<&str, &'a Order>,
) -> Vec<Option<OrderDates<'a>>> {
    rows.iter()
        .map(|row| {
            orders.get(row.order_id.as_str()).copied().map(|o| OrderDates {
                order_date: o.order_date.as_str(),
                ship_date: o.ship_date.as_str(),
            })
        })
        .collect()
}

/// Left join of one date column against the time dimension.
///
/// Returns the number of rows left without a key.
pub fn resolve_date_key<'a>(
    rows: &mut [SalesFactRow],
    dates: impl Iterator<Item = Option<&'a str>>,
    index: &HashMap<&str, u32>,
    slot: fn(&mut SalesFactRow) -> &mut Option<u32>,
) -> usize {
    let mut unmatched = 0;
    for (row, date) in rows.iter_mut().zip(dates) {
        let id = date.and_then(|d| index.get(d).copied());
        if id.is_none() {
            unmatched += 1;
        }
        *slot(row) = id;
    }
    unmatched
}

/// Assemble the sales fact table from the line items, features, orders and time dimension.
pub fn assemble_sales_fact(
    details: &[OrderDetail],
    features: &Features,
    orders: &[Order],
    time_dim: &[TimeDimRow],
) -> Vec<SalesFactRow> {
    let mut rows: Vec<SalesFactRow> = details.iter().map(base_row).collect();

    let joins: [(&str, usize); 4] = [
        (
            "TotalSalesPerCustomer",
            attach_measure(&mut rows, &features.customer_sales, |r| r.customer_id.as_str(), |r| {
                &mut r.total_sales_per_customer
            }),
        ),
        (
            "TotalSalesPerOrder",
            attach_measure(&mut rows, &features.order_sales, |r| r.order_id.as_str(), |r| {
                &mut r.total_sales_per_order
            }),
        ),
        (
            "TotalSalesPerProduct",
            attach_measure(&mut rows, &features.product_sales, |r| r.product_id.as_str(), |r| {
                &mut r.total_sales_per_product
            }),
        ),
        (
            "AverageProfitPerProduct",
            attach_measure(&mut rows, &features.product_avg_profit, |r| r.product_id.as_str(), |r| {
                &mut r.average_profit_per_product
            }),
        ),
    ];

    let lookup = order_lookup(orders);
    let dates = attach_order_dates(&rows, &lookup);
    let without_order = dates.iter().filter(|d| d.is_none()).count();

    let index = time_index(time_dim);
    let order_misses = resolve_date_key(
        &mut rows,
        dates.iter().map(|d| d.map(|d| d.order_date)),
        &index,
        |r| &mut r.order_date_id,
    );
    let ship_misses = resolve_date_key(
        &mut rows,
        dates.iter().map(|d| d.map(|d| d.ship_date)),
        &index,
        |r| &mut r.ship_date_id,
    );

    for (column, misses) in joins
        .into_iter()
        .chain([("OrderDateID", order_misses), ("ShipDateID", ship_misses)])
    {
        if misses > 0 {
            log_info_indent(
                format!("{}: {} row(s) without a match, left empty", column, misses),
                1,
            );
        }
    }
    if without_order > 0 {
        log_warning(format!(
            "{} order line(s) reference an Order ID missing from the order dataset",
            without_order
        ));
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::aggregate::aggregate_features;
    use crate::transform::dimensions::build_time_dim;

    fn order(id: &str, order_date: &str, ship_date: &str) -> Order {
        Order {
            order_id: id.into(),
            order_date: order_date.into(),
            ship_date: ship_date.into(),
        }
    }

    fn line(
        order: &str,
        customer: &str,
        product: &str,
        quantity: i64,
        sales: f64,
        profit: f64,
    ) -> OrderDetail {
        OrderDetail {
            order_id: order.into(),
            customer_id: customer.into(),
            product_id: product.into(),
            quantity,
            discount: 0.0,
            sales,
            profit,
        }
    }

    fn assemble(details: &[OrderDetail], orders: &[Order]) -> (Vec<SalesFactRow>, Vec<TimeDimRow>) {
        let features = aggregate_features(details);
        let time_dim = build_time_dim(orders).unwrap();
        (assemble_sales_fact(details, &features, orders, &time_dim), time_dim)
    }

    #[test]
    fn test_worked_example() {
        let orders = vec![order("1", "01/01/2020", "03/01/2020")];
        let details = vec![line("1", "C1", "P1", 2, 100.0, 20.0)];
        let (fact, time_dim) = assemble(&details, &orders);

        assert_eq!(time_dim.len(), 2);
        assert_eq!(fact.len(), 1);
        let row = &fact[0];
        assert_eq!(row.total_sales_per_customer, Some(100.0));
        assert_eq!(row.total_sales_per_order, Some(100.0));
        assert_eq!(row.total_sales_per_product, Some(100.0));
        assert_eq!(row.average_profit_per_product, Some(20.0));
        assert_eq!(row.order_date_id, Some(1));
        assert_eq!(row.ship_date_id, Some(2));
        assert_eq!(row.quantity, 2);
    }

    #[test]
    fn test_same_day_order_and_ship() {
        let orders = vec![
            order("1", "05/03/2021", "05/03/2021"),
            order("2", "04/03/2021", "05/03/2021"),
        ];
        let details = vec![line("1", "C1", "P1", 1, 10.0, 1.0), line("2", "C1", "P2", 1, 5.0, 1.0)];
        let (fact, time_dim) = assemble(&details, &orders);

        assert_eq!(time_dim.len(), 2);
        assert_eq!(fact[0].order_date_id, Some(1));
        assert_eq!(fact[0].ship_date_id, Some(1));
        assert_eq!(fact[1].order_date_id, Some(2));
        assert_eq!(fact[1].ship_date_id, Some(1));
    }

    #[test]
    fn test_row_count_preserved() {
        let orders = vec![
            order("1", "01/01/2020", "02/01/2020"),
            order("2", "01/01/2020", "04/01/2020"),
        ];
        let details = vec![
            line("1", "C1", "P1", 1, 10.0, 1.0),
            line("1", "C2", "P1", 2, 20.0, 2.0),
            line("2", "C1", "P2", 3, 30.0, 3.0),
            line("2", "C1", "P1", 4, 40.0, 6.0),
        ];
        let (fact, _) = assemble(&details, &orders);

        assert_eq!(fact.len(), details.len());
        for (row, detail) in fact.iter().zip(&details) {
            assert_eq!(row.order_id, detail.order_id);
            assert_eq!(row.quantity, detail.quantity);
        }
        assert_eq!(fact[0].total_sales_per_customer, Some(80.0));
        assert_eq!(fact[0].total_sales_per_order, Some(30.0));
        assert_eq!(fact[0].total_sales_per_product, Some(70.0));
        assert_eq!(fact[0].average_profit_per_product, Some(3.0));
    }

    #[test]
    fn test_unknown_order_left_empty() {
        let orders = vec![order("1", "01/01/2020", "02/01/2020")];
        let details = vec![
            line("1", "C1", "P1", 1, 10.0, 1.0),
            line("99", "C1", "P1", 1, 10.0, 1.0),
        ];
        let (fact, _) = assemble(&details, &orders);

        assert_eq!(fact.len(), 2);
        assert_eq!(fact[1].order_date_id, None);
        assert_eq!(fact[1].ship_date_id, None);
        assert_eq!(fact[1].total_sales_per_order, Some(10.0));
    }

    #[test]
    fn test_duplicate_order_ids_do_not_duplicate_rows() {
        let orders = vec![
            order("1", "01/01/2020", "02/01/2020"),
            order("1", "01/01/2020", "02/01/2020"),
        ];
        let details = vec![line("1", "C1", "P1", 1, 10.0, 1.0)];
        let (fact, _) = assemble(&details, &orders);

        assert_eq!(fact.len(), 1);
        assert_eq!(fact[0].ship_date_id, Some(2));
    }

    #[test]
    fn test_attach_measure_counts_misses() {
        let mut rows = vec![
            base_row(&line("1", "C1", "P1", 1, 1.0, 1.0)),
            base_row(&line("2", "C9", "P1", 1, 1.0, 1.0)),
        ];
        let measure: KeyedMeasure = [("C1".to_string(), 5.0)].into_iter().collect();

        let misses = attach_measure(
            &mut rows,
            &measure,
            |r| r.customer_id.as_str(),
            |r| &mut r.total_sales_per_customer,
        );

        assert_eq!(misses, 1);
        assert_eq!(rows[0].total_sales_per_customer, Some(5.0));
        assert_eq!(rows[1].total_sales_per_customer, None);
    }

    #[test]
    fn test_date_keys_resolved_independently() {
        let time_dim = build_time_dim(&[order("1", "01/01/2020", "03/01/2020")]).unwrap();
        let index = time_index(&time_dim);
        let mut rows = vec![base_row(&line("1", "C1", "P1", 1, 1.0, 1.0))];

        let ship = [Some("03/01/2020")];
        resolve_date_key(&mut rows, ship.into_iter(), &index, |r| &mut r.order_date_id);
        resolve_date_key(&mut rows, ship.into_iter(), &index, |r| &mut r.ship_date_id);

        assert_eq!(rows[0].order_date_id, Some(2));
        assert_eq!(rows[0].ship_date_id, Some(2));
    }
}
