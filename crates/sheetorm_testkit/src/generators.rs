//! Property-based test generators using proptest.
//!
//! Provides strategies for column tokens, column layouts, UIDs and sparse
//! row maps.

use proptest::prelude::*;
use sheetorm_column::{col_from_index, Columns};
use sheetorm_core::RowData;
use std::collections::BTreeSet;

/// Strategy for a valid column token between `A` and `ZZ`.
pub fn column_strategy() -> impl Strategy<Value = String> {
    (0usize..702).prop_map(col_from_index)
}

/// Strategy for a column layout of 1 to `max_len` distinct, ordered columns.
pub fn columns_strategy(max_len: usize) -> impl Strategy<Value = Columns> {
    prop::collection::btree_set(0usize..60, 1..=max_len.max(1)).prop_map(|indices: BTreeSet<usize>| {
        Columns::new(indices.into_iter().map(col_from_index))
            .expect("sorted distinct indices form a valid layout")
    })
}

/// Strategy for a non-empty record UID.
pub fn uid_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{1,12}").expect("Invalid regex")
}

/// Strategy for a cell value, possibly empty.
pub fn cell_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9 @.]{0,8}").expect("Invalid regex")
}

/// Strategy for a layout together with a row map over a random subset of it.
pub fn sparse_row_strategy(max_len: usize) -> impl Strategy<Value = (Columns, RowData)> {
    columns_strategy(max_len).prop_flat_map(|columns| {
        let len = columns.len();
        (
            Just(columns),
            prop::collection::vec(prop::option::of(cell_strategy()), len),
        )
            .prop_map(|(columns, cells)| {
                let row = columns
                    .iter()
                    .zip(cells)
                    .filter_map(|(col, cell)| cell.map(|value| (col.to_string(), value)))
                    .collect();
                (columns, row)
            })
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetorm_column::{col_index, is_valid_col};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn columns_are_valid(col in column_strategy()) {
            prop_assert!(is_valid_col(&col));
            prop_assert!(col_index(&col).is_some());
        }

        #[test]
        fn layouts_are_ordered(columns in columns_strategy(8)) {
            let indices: Vec<usize> = columns.iter().filter_map(col_index).collect();
            prop_assert_eq!(indices.len(), columns.len());
            prop_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn sparse_rows_stay_in_layout((columns, row) in sparse_row_strategy(6)) {
            prop_assert!(row.len() <= columns.len());
            prop_assert!(row.keys().all(|col| columns.contains(col)));
        }
    }
}
