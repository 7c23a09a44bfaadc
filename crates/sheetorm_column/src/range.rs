//! A1 range notation.
//!
//! Ranges are always *unbound*: they never carry a sheet name prefix. Binding a
//! range to a sheet (`Sheet1!A1:C1`) is the transport's job.

use crate::column::{col_index, is_valid_col};
use crate::error::{ColumnError, ColumnResult};
use std::fmt;
use std::str::FromStr;

/// A reference to a rectangular region of a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RangeRef {
    /// A single cell, `A1`.
    Cell {
        /// Column of the cell.
        column: String,
        /// 1-based row of the cell.
        row: usize,
    },
    /// A horizontal span on one row, `A1:C1`.
    RowSpan {
        /// Left-most column.
        first: String,
        /// Right-most column.
        last: String,
        /// 1-based row.
        row: usize,
    },
    /// A bounded block over several rows, `A1:C5`.
    Block {
        /// Left-most column.
        first: String,
        /// First 1-based row.
        start_row: usize,
        /// Right-most column.
        last: String,
        /// Last 1-based row (inclusive).
        end_row: usize,
    },
    /// A single column from `start_row` down to the end of the sheet, `A4:A`.
    ColumnFrom {
        /// The scanned column.
        column: String,
        /// First 1-based row.
        start_row: usize,
    },
    /// Several columns from `start_row` down to the end of the sheet, `A4:C`.
    BlockFrom {
        /// Left-most column.
        first: String,
        /// Right-most column.
        last: String,
        /// First 1-based row.
        start_row: usize,
    },
}

impl RangeRef {
    /// Creates a single-cell reference.
    pub fn cell(column: impl Into<String>, row: usize) -> Self {
        Self::Cell {
            column: column.into(),
            row,
        }
    }

    /// Creates a span on a single row, collapsing to a cell when `first == last`.
    pub fn row_span(first: impl Into<String>, last: impl Into<String>, row: usize) -> Self {
        let first = first.into();
        let last = last.into();
        if first == last {
            Self::Cell { column: first, row }
        } else {
            Self::RowSpan { first, last, row }
        }
    }

    /// Creates an open-ended scan of one column.
    pub fn column_from(column: impl Into<String>, start_row: usize) -> Self {
        Self::ColumnFrom {
            column: column.into(),
            start_row,
        }
    }

    /// Creates an open-ended scan over `first..=last`, collapsing to a single
    /// column scan when `first == last`.
    pub fn block_from(first: impl Into<String>, last: impl Into<String>, start_row: usize) -> Self {
        let first = first.into();
        let last = last.into();
        if first == last {
            Self::ColumnFrom {
                column: first,
                start_row,
            }
        } else {
            Self::BlockFrom {
                first,
                last,
                start_row,
            }
        }
    }

    /// Returns the left-most column of the range.
    pub fn first_column(&self) -> &str {
        match self {
            Self::Cell { column, .. } | Self::ColumnFrom { column, .. } => column,
            Self::RowSpan { first, .. } | Self::Block { first, .. } | Self::BlockFrom { first, .. } => {
                first
            }
        }
    }

    /// Returns the right-most column of the range.
    pub fn last_column(&self) -> &str {
        match self {
            Self::Cell { column, .. } | Self::ColumnFrom { column, .. } => column,
            Self::RowSpan { last, .. } | Self::Block { last, .. } | Self::BlockFrom { last, .. } => {
                last
            }
        }
    }

    /// Returns the first row covered by the range.
    pub fn start_row(&self) -> usize {
        match self {
            Self::Cell { row, .. } | Self::RowSpan { row, .. } => *row,
            Self::Block { start_row, .. }
            | Self::ColumnFrom { start_row, .. }
            | Self::BlockFrom { start_row, .. } => *start_row,
        }
    }

    /// Returns the last row covered by the range, or `None` if it is open-ended.
    pub fn end_row(&self) -> Option<usize> {
        match self {
            Self::Cell { row, .. } | Self::RowSpan { row, .. } => Some(*row),
            Self::Block { end_row, .. } => Some(*end_row),
            Self::ColumnFrom { .. } | Self::BlockFrom { .. } => None,
        }
    }

    /// Returns the number of columns covered.
    pub fn width(&self) -> usize {
        match (col_index(self.first_column()), col_index(self.last_column())) {
            (Some(first), Some(last)) if last >= first => last - first + 1,
            _ => 0,
        }
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cell { column, row } => write!(f, "{column}{row}"),
            Self::RowSpan { first, last, row } => write!(f, "{first}{row}:{last}{row}"),
            Self::Block {
                first,
                start_row,
                last,
                end_row,
            } => write!(f, "{first}{start_row}:{last}{end_row}"),
            Self::ColumnFrom { column, start_row } => write!(f, "{column}{start_row}:{column}"),
            Self::BlockFrom {
                first,
                last,
                start_row,
            } => write!(f, "{first}{start_row}:{last}"),
        }
    }
}

/// Splits `A12` into (`"A"`, `Some(12)`) and `A` into (`"A"`, `None`).
fn split_ref(part: &str) -> Option<(&str, Option<usize>)> {
    let digits_at = part
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(part.len());
    let (col, row) = part.split_at(digits_at);

    if !is_valid_col(col) {
        return None;
    }
    if row.is_empty() {
        return Some((col, None));
    }

    let row: usize = row.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((col, Some(row)))
}

impl FromStr for RangeRef {
    type Err = ColumnError;

    fn from_str(s: &str) -> ColumnResult<Self> {
        let invalid = || ColumnError::InvalidRange(s.to_string());

        let (left, right) = match s.split_once(':') {
            Some((l, r)) => (l, Some(r)),
            None => (s, None),
        };

        let (first, start_row) = split_ref(left).ok_or_else(invalid)?;
        let start_row = start_row.ok_or_else(invalid)?;

        let Some(right) = right else {
            return Ok(Self::cell(first, start_row));
        };

        let (last, end_row) = split_ref(right).ok_or_else(invalid)?;
        let (first_idx, last_idx) = (
            col_index(first).ok_or_else(invalid)?,
            col_index(last).ok_or_else(invalid)?,
        );
        if last_idx < first_idx {
            return Err(invalid());
        }

        match end_row {
            None => Ok(Self::block_from(first, last, start_row)),
            Some(end_row) if end_row < start_row => Err(invalid()),
            Some(end_row) if end_row == start_row => Ok(Self::row_span(first, last, start_row)),
            Some(end_row) => Ok(Self::Block {
                first: first.to_string(),
                start_row,
                last: last.to_string(),
                end_row,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(RangeRef::cell("A", 1).to_string(), "A1");
        assert_eq!(RangeRef::row_span("C", "E", 1).to_string(), "C1:E1");
        assert_eq!(RangeRef::column_from("A", 4).to_string(), "A4:A");
        assert_eq!(RangeRef::block_from("A", "C", 2).to_string(), "A2:C");
    }

    #[test]
    fn degenerate_spans_collapse() {
        assert_eq!(RangeRef::row_span("B", "B", 3), RangeRef::cell("B", 3));
        assert_eq!(RangeRef::block_from("D", "D", 1), RangeRef::column_from("D", 1));
    }

    #[test]
    fn parse_all_shapes() {
        assert_eq!("A1".parse::<RangeRef>().unwrap(), RangeRef::cell("A", 1));
        assert_eq!(
            "C1:E1".parse::<RangeRef>().unwrap(),
            RangeRef::row_span("C", "E", 1)
        );
        assert_eq!(
            "D1:D".parse::<RangeRef>().unwrap(),
            RangeRef::column_from("D", 1)
        );
        assert_eq!(
            "A2:C".parse::<RangeRef>().unwrap(),
            RangeRef::block_from("A", "C", 2)
        );
        assert_eq!(
            "A2:AB10".parse::<RangeRef>().unwrap(),
            RangeRef::Block {
                first: "A".into(),
                start_row: 2,
                last: "AB".into(),
                end_row: 10,
            }
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        for s in ["", "1", "A", "a1", "A0", "A1:", "C1:A1", "A5:A2", "A1:B2:C3", "Sheet!A1"] {
            assert!(s.parse::<RangeRef>().is_err(), "{s:?} should not parse");
        }
    }

    #[test]
    fn accessors() {
        let range = RangeRef::block_from("B", "D", 3);
        assert_eq!(range.first_column(), "B");
        assert_eq!(range.last_column(), "D");
        assert_eq!(range.start_row(), 3);
        assert_eq!(range.end_row(), None);
        assert_eq!(range.width(), 3);

        let cell = RangeRef::cell("AA", 9);
        assert_eq!(cell.end_row(), Some(9));
        assert_eq!(cell.width(), 1);
    }

    #[test]
    fn display_parse_agree() {
        let ranges = [
            RangeRef::cell("Z", 100),
            RangeRef::row_span("A", "AZ", 2),
            RangeRef::column_from("Q", 7),
            RangeRef::block_from("B", "C", 1),
        ];
        for range in ranges {
            assert_eq!(range.to_string().parse::<RangeRef>().unwrap(), range);
        }
    }
}
