//! Dimension construction: time, customer and product.
//!
//! The time dimension is built from the raw date text of every order: all
//! `Order Date` values followed by all `Ship Date` values, exact duplicates
//! removed keeping the first occurrence, then numbered 1..=n in that order.
//! `TimeID`s therefore follow first appearance, not calendar order, and are only
//! stable within one run.
//!
//! Customer and product dimensions are the source rows with exact duplicate
//! rows removed, first occurrence kept, natural ID retained.

use chrono::{Datelike, NaiveDate};
use std::collections::{HashMap, HashSet};

use crate::error::DateParseError;
use crate::logs::log_warning;
use crate::models::{EntityTable, Order, TimeDimRow};

/// Format of every date in the order dataset.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Parse a `DD/MM/YYYY` date.
///
/// Day and month may have one or two digits; the year must have exactly four.
pub fn parse_date(value: &str) -> Result<NaiveDate, DateParseError> {
    let error = || DateParseError {
        value: value.to_string(),
        format: DATE_FORMAT,
    };

    // chrono's %Y also takes signed and short years
    let year = value.rsplit('/').next().unwrap_or_default();
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(error());
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| error())
}

/// Calendar quarter (1-4) of a month (1-12).
pub fn quarter(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

/// Distinct date strings in first-occurrence order over order dates then ship dates.
pub fn distinct_dates(orders: &[Order]) -> Vec<&str> {
    let mut seen = HashSet::new();
    orders
        .iter()
        .map(|o| o.order_date.as_str())
        .chain(orders.iter().map(|o| o.ship_date.as_str()))
        .filter(|d| seen.insert(*d))
        .collect()
}

/// Build the time dimension; fails on the first date not in `DD/MM/YYYY` form.
pub fn build_time_dim(orders: &[Order]) -> Result<Vec<TimeDimRow>, DateParseError> {
    distinct_dates(orders)
        .into_iter()
        .zip(1u32..)
        .map(|(date, time_id)| {
            let parsed = parse_date(date)?;
            Ok(TimeDimRow {
                date: date.to_string(),
                time_id,
                day: parsed.day(),
                month: parsed.month(),
                year: parsed.year(),
                quarter: quarter(parsed.month()),
            })
        })
        .collect()
}

/// Date text -> `TimeID` lookup over a built time dimension.
pub fn time_index(time_dim: &[TimeDimRow]) -> HashMap<&str, u32> {
    time_dim.iter().map(|r| (r.date.as_str(), r.time_id)).collect()
}

/// Remove exact duplicate rows, keeping the first occurrence of each.
pub fn dedup_rows(table: &EntityTable) -> EntityTable {
    let mut seen = HashSet::new();
    let rows = table
        .rows
        .iter()
        .filter(|row| seen.insert(row.as_slice()))
        .cloned()
        .collect();
    table.with_rows(rows)
}

/// Natural IDs that occur on more than one row, in first-occurrence order.
pub fn repeated_ids(table: &EntityTable) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for id in table.ids() {
        let count = counts.entry(id).or_insert(0);
        if *count == 0 {
            order.push(id);
        }
        *count += 1;
    }
    order
        .into_iter()
        .filter(|id| counts[id] > 1)
        .map(str::to_string)
        .collect()
}

/// Build a descriptive dimension (customer or product) from its source dataset.
///
/// Rows that share an ID but differ elsewhere both survive; that is reported,
/// not resolved.
pub fn build_entity_dim(table: &EntityTable, label: &str) -> EntityTable {
    let dim = dedup_rows(table);

    let repeated = repeated_ids(&dim);
    if !repeated.is_empty() {
        log_warning(format!(
            "{} dimension: {} {}(s) appear on several distinct rows (e.g. '{}')",
            label,
            repeated.len(),
            dim.id_column,
            repeated[0]
        ));
    }
    dim
}

pub fn build_customer_dim(customers: &EntityTable) -> EntityTable {
    build_entity_dim(customers, "customer")
}

pub fn build_product_dim(products: &EntityTable) -> EntityTable {
    build_entity_dim(products, "product")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, order_date: &str, ship_date: &str) -> Order {
        Order {
            order_id: id.into(),
            order_date: order_date.into(),
            ship_date: ship_date.into(),
        }
    }

    fn customers(rows: &[[&str; 2]]) -> EntityTable {
        EntityTable::new(
            "Customer ID",
            vec!["Customer ID".into(), "Segment".into()],
            rows.iter().map(|r| r.iter().map(|v| v.to_string()).collect()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_date() {
        let d = parse_date("08/11/2016").unwrap();
        assert_eq!((d.day(), d.month(), d.year()), (8, 11, 2016));
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        let bad_dates = [
            "2016-11-08",
            "11/31/2016",
            "08-11-2016",
            "",
            "08/11/2016 10:00",
            "32/01/2020",
            "01/01/20",
            "01/01/+2020",
            "01/01/-200",
            "01/01/02020",
        ];
        for bad in bad_dates {
            let err = parse_date(bad).unwrap_err();
            assert_eq!(err.value, bad);
            assert_eq!(err.format, "%d/%m/%Y");
        }
    }

    #[test]
    fn test_parse_date_short_day_and_month() {
        let d = parse_date("1/2/2020").unwrap();
        assert_eq!((d.day(), d.month(), d.year()), (1, 2, 2020));
    }

    #[test]
    fn test_quarter() {
        let quarters: Vec<u32> = (1..=12).map(quarter).collect();
        assert_eq!(quarters, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    fn test_time_dim_two_dates() {
        let dim = build_time_dim(&[order("1", "01/01/2020", "03/01/2020")]).unwrap();

        assert_eq!(dim.len(), 2);
        assert_eq!(dim[0].date, "01/01/2020");
        assert_eq!(dim[0].time_id, 1);
        assert_eq!(dim[1].date, "03/01/2020");
        assert_eq!(dim[1].time_id, 2);
        assert_eq!((dim[1].day, dim[1].month, dim[1].year, dim[1].quarter), (3, 1, 2020, 1));
    }

    #[test]
    fn test_time_dim_first_occurrence_order() {
        let orders = vec![
            order("1", "15/06/2021", "20/06/2021"),
            order("2", "01/01/2021", "15/06/2021"),
            order("3", "15/06/2021", "15/06/2021"),
        ];
        let dim = build_time_dim(&orders).unwrap();

        let dates: Vec<&str> = dim.iter().map(|r| r.date.as_str()).collect();
        // order dates first, then the ship dates not seen yet
        assert_eq!(dates, vec!["15/06/2021", "01/01/2021", "20/06/2021"]);
        let ids: Vec<u32> = dim.iter().map(|r| r.time_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(dim[0].quarter, 2);
    }

    #[test]
    fn test_time_dim_bad_date() {
        let orders = vec![order("1", "01/01/2020", "2020-01-03")];
        let err = build_time_dim(&orders).unwrap_err();
        assert_eq!(err.value, "2020-01-03");
    }

    #[test]
    fn test_time_index() {
        let dim = build_time_dim(&[order("1", "01/01/2020", "03/01/2020")]).unwrap();
        let index = time_index(&dim);
        assert_eq!(index.get("03/01/2020"), Some(&2));
        assert_eq!(index.get("02/01/2020"), None);
    }

    #[test]
    fn test_dedup_exact_rows() {
        let table = customers(&[
            ["C1", "Consumer"],
            ["C2", "Corporate"],
            ["C1", "Consumer"],
            ["C3", "Home Office"],
            ["C2", "Corporate"],
        ]);
        let dim = build_customer_dim(&table);

        assert_eq!(dim.ids().collect::<Vec<_>>(), vec!["C1", "C2", "C3"]);
        assert_eq!(dim.columns, table.columns);
    }

    #[test]
    fn test_dedup_keeps_conflicting_rows() {
        let table = customers(&[["C1", "Consumer"], ["C1", "Corporate"]]);
        let dim = build_customer_dim(&table);

        assert_eq!(dim.len(), 2);
        assert_eq!(repeated_ids(&dim), vec!["C1"]);
    }
}
