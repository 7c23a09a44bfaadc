//! Conversions between cell strings and Rust values.

use crate::cache::RowData;
use crate::error::{SheetError, SheetResult};

/// A value that can be stored in a single cell.
///
/// Cells are plain strings. Empty cells decode into `None` for `Option<T>`
/// fields and are a codec error for everything else except `String` and
/// `bool`.
pub trait CellValue: Sized {
    /// Encodes the value.
    fn to_cell(&self) -> String;

    /// Decodes the raw cell of `column`.
    fn from_cell(column: &str, raw: &str) -> SheetResult<Self>;
}

impl CellValue for String {
    fn to_cell(&self) -> String {
        self.clone()
    }

    fn from_cell(_column: &str, raw: &str) -> SheetResult<Self> {
        Ok(raw.to_string())
    }
}

impl CellValue for bool {
    fn to_cell(&self) -> String {
        BoolRepr::default().encode(*self)
    }

    fn from_cell(_column: &str, raw: &str) -> SheetResult<Self> {
        Ok(BoolRepr::default().decode(raw))
    }
}

macro_rules! int_cell_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl CellValue for $t {
                fn to_cell(&self) -> String {
                    self.to_string()
                }

                fn from_cell(column: &str, raw: &str) -> SheetResult<Self> {
                    let wide: i128 = raw
                        .trim()
                        .parse()
                        .map_err(|e| SheetError::codec(column, format!("{raw:?} is not an integer: {e}")))?;
                    <$t>::try_from(wide).map_err(|_| SheetError::Overflow {
                        column: column.to_string(),
                        value: raw.to_string(),
                    })
                }
            }
        )*
    };
}

int_cell_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl CellValue for f64 {
    fn to_cell(&self) -> String {
        self.to_string()
    }

    fn from_cell(column: &str, raw: &str) -> SheetResult<Self> {
        raw.trim()
            .parse()
            .map_err(|e| SheetError::codec(column, format!("{raw:?} is not a number: {e}")))
    }
}

impl CellValue for f32 {
    fn to_cell(&self) -> String {
        self.to_string()
    }

    fn from_cell(column: &str, raw: &str) -> SheetResult<Self> {
        let wide = f64::from_cell(column, raw)?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(SheetError::Overflow {
                column: column.to_string(),
                value: raw.to_string(),
            });
        }
        Ok(wide as f32)
    }
}

impl<T: CellValue> CellValue for Option<T> {
    fn to_cell(&self) -> String {
        self.as_ref().map(CellValue::to_cell).unwrap_or_default()
    }

    fn from_cell(column: &str, raw: &str) -> SheetResult<Self> {
        if raw.is_empty() {
            return Ok(None);
        }
        T::from_cell(column, raw).map(Some)
    }
}

/// Spelling of booleans in a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolRepr {
    /// Cell text for `true`.
    pub true_repr: String,
    /// Cell text for `false`.
    pub false_repr: String,
    /// Value of a cell matching neither spelling.
    pub unknown: bool,
}

impl BoolRepr {
    /// Creates a representation with custom spellings; unknown cells read as false.
    pub fn new(true_repr: impl Into<String>, false_repr: impl Into<String>) -> Self {
        Self {
            true_repr: true_repr.into(),
            false_repr: false_repr.into(),
            unknown: false,
        }
    }

    /// Sets the value of unrecognised cells.
    pub fn with_unknown(mut self, unknown: bool) -> Self {
        self.unknown = unknown;
        self
    }

    /// Encodes a boolean.
    pub fn encode(&self, value: bool) -> String {
        if value {
            self.true_repr.clone()
        } else {
            self.false_repr.clone()
        }
    }

    /// Decodes a cell.
    pub fn decode(&self, raw: &str) -> bool {
        if raw == self.true_repr {
            true
        } else if raw == self.false_repr {
            false
        } else {
            self.unknown
        }
    }
}

impl Default for BoolRepr {
    fn default() -> Self {
        Self::new("1", "0")
    }
}

/// Decodes `column` from `row` into `target` if the row has that column.
///
/// Missing columns leave `target` untouched.
pub fn load_cell<T: CellValue>(row: &RowData, column: &str, target: &mut T) -> SheetResult<()> {
    if let Some(raw) = row.get(column) {
        *target = T::from_cell(column, raw)?;
    }
    Ok(())
}

/// Like [`load_cell`] with a custom boolean spelling.
pub fn load_bool(row: &RowData, column: &str, repr: &BoolRepr, target: &mut bool) {
    if let Some(raw) = row.get(column) {
        *target = repr.decode(raw);
    }
}
