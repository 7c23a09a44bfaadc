//! Validated column lists.

use crate::column::{col_index, is_valid_col};
use crate::error::{ColumnError, ColumnResult};

/// Validates an ordered column list.
///
/// # Errors
///
/// - [`ColumnError::ColumnsInvalid`] if the list is empty or any entry is not a
///   well-formed column token
/// - [`ColumnError::ColumnsNotInOrder`] if the entries are not strictly
///   increasing by index (a duplicate violates strict increase too)
pub fn validate_columns<S: AsRef<str>>(cols: &[S]) -> ColumnResult<()> {
    if cols.is_empty() {
        return Err(ColumnError::ColumnsInvalid);
    }

    let mut last_idx: Option<usize> = None;
    for col in cols {
        let col = col.as_ref();
        let idx = col_index(col).ok_or(ColumnError::ColumnsInvalid)?;

        if last_idx.is_some_and(|last| idx <= last) {
            return Err(ColumnError::ColumnsNotInOrder);
        }
        last_idx = Some(idx);
    }

    Ok(())
}

/// An ordered, non-empty list of distinct columns, strictly increasing by index.
///
/// A record type occupies the columns in its `Columns`. The list is validated
/// once on construction and never mutated afterwards.
///
/// # Invariants
///
/// - At least one column
/// - Every entry matches `^[A-Z]+$`
/// - Entries are strictly increasing by [`col_index`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    names: Vec<String>,
    shift: usize,
}

impl Columns {
    /// Creates a validated column list.
    ///
    /// # Errors
    ///
    /// See [`validate_columns`].
    pub fn new<I, S>(cols: I) -> ColumnResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = cols.into_iter().map(Into::into).collect();
        validate_columns(&names)?;

        let shift = names
            .first()
            .and_then(|first| col_index(first))
            .ok_or(ColumnError::ColumnsInvalid)?;

        Ok(Self { names, shift })
    }

    /// Returns the left-most column.
    pub fn first(&self) -> &str {
        &self.names[0]
    }

    /// Returns the right-most column.
    pub fn last(&self) -> &str {
        &self.names[self.names.len() - 1]
    }

    /// Index of the first column.
    ///
    /// A range read of `first..=last` returns arrays starting at `first`, so
    /// `col_index(col) - shift()` is the position of `col` in such an array.
    pub fn shift(&self) -> usize {
        self.shift
    }

    /// Returns the position of `col` inside a row array read from `first..=last`.
    ///
    /// Returns `None` for malformed tokens or columns left of `first`.
    pub fn offset_of(&self, col: &str) -> Option<usize> {
        col_index(col)?.checked_sub(self.shift)
    }

    /// Returns true if `col` is a well-formed member of the list.
    pub fn contains(&self, col: &str) -> bool {
        is_valid_col(col) && self.names.iter().any(|c| c == col)
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false; a `Columns` is never empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over the column names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns the columns as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}

impl<'a> IntoIterator for &'a Columns {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}
