//! # sheetorm column addressing
//!
//! Column addressing for spreadsheet-backed record stores.
//!
//! This crate provides:
//! - Bijective base-26 conversion between column names (`A`, `Z`, `AA`, ...) and
//!   zero-based indexes
//! - [`Columns`], a validated, strictly increasing list of columns
//! - [`RangeRef`], the A1 range notation used to address cells, row spans and
//!   open-ended column scans
//!
//! Everything here is pure and free of shared state, so it is safe to call from
//! any number of threads.
//!
//! ## Example
//!
//! ```rust
//! use sheetorm_column::{col_from_index, col_index, Columns, RangeRef};
//!
//! assert_eq!(col_index("AA"), Some(26));
//! assert_eq!(col_from_index(26), "AA");
//!
//! let cols = Columns::new(["A", "C", "D"]).unwrap();
//! assert_eq!(cols.shift(), 0);
//! assert_eq!(cols.last(), "D");
//!
//! let range = RangeRef::row_span("A", "D", 7);
//! assert_eq!(range.to_string(), "A7:D7");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod column;
mod columns;
mod error;
mod range;

pub use column::{col_from_index, col_index, is_valid_col};
pub use columns::{validate_columns, Columns};
pub use error::{ColumnError, ColumnResult};
pub use range::RangeRef;
