//! Record codec.
//!
//! A record type declares which column each of its fields lives in through a
//! static list of [`FieldSpec`]s, and converts itself to and from [`RowData`].
//! The toolkit never sees record types, only row maps.
//!
//! ```
//! use sheetorm_core::codec::{load_cell, FieldSpec, SheetRecord};
//! use sheetorm_core::{RowData, SheetResult};
//!
//! #[derive(Default)]
//! struct Guest {
//!     id: String,
//!     name: String,
//!     seats: u32,
//! }
//!
//! impl SheetRecord for Guest {
//!     fn fields() -> Vec<FieldSpec> {
//!         vec![FieldSpec::new("A").uid(), FieldSpec::new("B"), FieldSpec::new("D")]
//!     }
//!
//!     fn dump(&self) -> RowData {
//!         RowData::from([
//!             ("A".to_string(), self.id.clone()),
//!             ("B".to_string(), self.name.clone()),
//!             ("D".to_string(), self.seats.to_string()),
//!         ])
//!     }
//!
//!     fn load(&mut self, row: &RowData) -> SheetResult<()> {
//!         load_cell(row, "A", &mut self.id)?;
//!         load_cell(row, "B", &mut self.name)?;
//!         load_cell(row, "D", &mut self.seats)
//!     }
//! }
//!
//! let schema = Guest::schema().unwrap();
//! assert_eq!(schema.uid_column(), "A");
//! assert_eq!(schema.columns().last(), "D");
//! ```

mod cell;

pub use cell::{load_bool, load_cell, BoolRepr, CellValue};

use crate::cache::RowData;
use crate::error::{SheetError, SheetResult};
use sheetorm_column::{col_index, ColumnError, Columns};

/// Declares where one field of a record lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column of the field.
    pub column: String,
    /// Whether the field holds the record UID.
    pub uid: bool,
    /// Read-only fields are loaded from the sheet but never written.
    pub read_only: bool,
}

impl FieldSpec {
    /// Creates a writable, non-UID field.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            uid: false,
            read_only: false,
        }
    }

    /// Marks the field as the UID.
    pub fn uid(mut self) -> Self {
        self.uid = true;
        self
    }

    /// Marks the field as read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// The validated column layout of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    fields: Vec<FieldSpec>,
    columns: Columns,
    uid_column: String,
}

impl RecordSchema {
    /// Builds a schema from field declarations in any order.
    ///
    /// Fields are sorted by column. The UID column is the one flagged as UID,
    /// or the left-most column if none is.
    ///
    /// # Errors
    ///
    /// - [`ColumnError::ColumnsInvalid`] for no fields or a malformed column
    /// - [`ColumnError::ColumnsNotInOrder`] if two fields share a column
    /// - [`SheetError::InvalidUidColumn`] if more than one field is flagged as UID
    pub fn new(fields: impl IntoIterator<Item = FieldSpec>) -> SheetResult<Self> {
        let mut keyed = fields
            .into_iter()
            .map(|f| col_index(&f.column).map(|idx| (idx, f)))
            .collect::<Option<Vec<_>>>()
            .ok_or(ColumnError::ColumnsInvalid)?;
        keyed.sort_by_key(|(idx, _)| *idx);
        let fields: Vec<FieldSpec> = keyed.into_iter().map(|(_, f)| f).collect();

        let columns = Columns::new(fields.iter().map(|f| f.column.clone()))?;

        let mut flagged = fields.iter().filter(|f| f.uid);
        let uid_column = match (flagged.next(), flagged.next()) {
            (Some(uid), None) => uid.column.clone(),
            (Some(_), Some(second)) => {
                return Err(SheetError::InvalidUidColumn {
                    column: second.column.clone(),
                })
            }
            (None, _) => columns.first().to_string(),
        };

        Ok(Self {
            fields,
            columns,
            uid_column,
        })
    }

    /// The columns the record occupies.
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// The UID column.
    pub fn uid_column(&self) -> &str {
        &self.uid_column
    }

    /// Field declarations, sorted by column.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Returns the declaration of `column`.
    pub fn field(&self, column: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Drops read-only columns from `row`, keeping what may be written.
    pub fn writable_row(&self, mut row: RowData) -> RowData {
        row.retain(|column, _| self.field(column).is_some_and(|f| !f.read_only));
        row
    }
}

/// A record stored in one row of a sheet.
pub trait SheetRecord: Send + 'static {
    /// Field declarations of the record type.
    fn fields() -> Vec<FieldSpec>;

    /// Validated schema of the record type.
    fn schema() -> SheetResult<RecordSchema> {
        RecordSchema::new(Self::fields())
    }

    /// Encodes every field, read-only ones included.
    fn dump(&self) -> RowData;

    /// Decodes the fields present in `row`, leaving the others untouched.
    fn load(&mut self, row: &RowData) -> SheetResult<()>;

    /// The record UID; empty if unset.
    fn uid(&self) -> String {
        match Self::schema() {
            Ok(schema) => self.dump().remove(schema.uid_column()).unwrap_or_default(),
            Err(_) => String::new(),
        }
    }
}
