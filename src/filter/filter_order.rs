use std::cmp::Ordering;

use serde_json::Value;

use super::filter_where::compare_values;
use super::types::{FilterOrderInfo, SortDirection};
use crate::types::Record;

pub struct FilterOrder;

impl FilterOrder {
    /// `created_at.desc,last_name.asc`; empty when there is nothing to sort by
    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        infos
            .iter()
            .map(|i| format!("{}.{}", i.column, i.sort.keyword()))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Row comparison with the store's NULL placement: last ascending, first descending
    pub fn compare(a: &Record, b: &Record, infos: &[FilterOrderInfo]) -> Ordering {
        for info in infos {
            let left = a.get(&info.column).unwrap_or(&Value::Null);
            let right = b.get(&info.column).unwrap_or(&Value::Null);

            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => compare_values(left, right).unwrap_or(Ordering::Equal),
            };

            let ordering = match info.sort {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
