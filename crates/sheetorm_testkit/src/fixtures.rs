//! Test fixtures and sheet helpers.
//!
//! Provides a sample record type and pre-filled sheets for common test
//! scenarios.

use crate::memory_sheet::InMemorySheet;
use sheetorm_core::codec::{load_bool, load_cell, BoolRepr, CellValue, FieldSpec, SheetRecord};
use sheetorm_core::{
    ApiTransport, RetryPolicy, RowData, Sheet, SheetConfig, SheetResult, StructureConfig,
};
use std::time::Duration;

/// Document ID used by every fixture.
pub const TEST_DOC_ID: &str = "test-doc";

/// Page name used by API-backed fixtures.
pub const GUEST_PAGE: &str = "Guests";

/// A guest list entry.
///
/// | A  | B    | C     | D     | E   | F (read-only) |
/// |----|------|-------|-------|-----|---------------|
/// | id | name | email | seats | vip | total         |
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Guest {
    /// Guest UID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Reserved seats.
    pub seats: u32,
    /// VIP flag, stored as `yes`/`no`.
    pub vip: bool,
    /// Computed by a formula in the sheet.
    pub total: Option<f64>,
}

impl Guest {
    /// Creates a guest with only its UID set.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    fn vip_repr() -> BoolRepr {
        BoolRepr::new("yes", "no")
    }
}

impl SheetRecord for Guest {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("A").uid(),
            FieldSpec::new("B"),
            FieldSpec::new("C"),
            FieldSpec::new("D"),
            FieldSpec::new("E"),
            FieldSpec::new("F").read_only(),
        ]
    }

    fn dump(&self) -> RowData {
        RowData::from([
            ("A".to_string(), self.id.clone()),
            ("B".to_string(), self.name.clone()),
            ("C".to_string(), self.email.clone()),
            ("D".to_string(), self.seats.to_cell()),
            ("E".to_string(), Self::vip_repr().encode(self.vip)),
            ("F".to_string(), self.total.to_cell()),
        ])
    }

    fn load(&mut self, row: &RowData) -> SheetResult<()> {
        load_cell(row, "A", &mut self.id)?;
        load_cell(row, "B", &mut self.name)?;
        load_cell(row, "C", &mut self.email)?;
        load_cell(row, "D", &mut self.seats)?;
        load_bool(row, "E", &Self::vip_repr(), &mut self.vip);
        load_cell(row, "F", &mut self.total)
    }
}

/// A guest list: a header row followed by three guests.
pub fn guest_rows() -> Vec<Vec<String>> {
    sheetorm_core::rows([
        vec!["id", "name", "email", "seats", "vip", "total"],
        vec!["g1", "Alice", "alice@example.com", "2", "yes", "40"],
        vec!["g2", "Bob", "bob@example.com", "1", "no", "20"],
        vec!["g3", "Carol", "carol@example.com", "4", "yes", "80"],
    ])
}

/// A retry policy with millisecond backoff, for tests on a real clock.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts)
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(10))
        .with_max_jitter(Duration::ZERO)
}

/// Configuration for the guest list on the default page.
pub fn guest_config() -> SheetConfig {
    SheetConfig::new(StructureConfig::new(TEST_DOC_ID).with_skip_rows(1)).with_retry(fast_retry(3))
}

/// A sheet over an in-memory guest list.
///
/// The returned [`InMemorySheet`] shares its grid with the sheet's transport.
pub fn guest_sheet_with_grid() -> (Sheet<InMemorySheet>, InMemorySheet) {
    let grid = InMemorySheet::from_rows(guest_rows());
    let sheet = Sheet::new(grid.clone(), guest_config()).expect("valid guest config");
    (sheet, grid)
}

/// A sheet over an in-memory guest list.
pub fn guest_sheet() -> Sheet<InMemorySheet> {
    guest_sheet_with_grid().0
}

/// A sheet reaching an in-memory guest list through [`ApiTransport`], on the
/// [`GUEST_PAGE`] page.
pub fn guest_api_sheet(max_attempts: u32) -> (Sheet<ApiTransport<InMemorySheet>>, InMemorySheet) {
    let grid = InMemorySheet::from_rows(guest_rows()).with_name(GUEST_PAGE);
    let config = SheetConfig::new(
        StructureConfig::new(TEST_DOC_ID)
            .with_sheet(GUEST_PAGE)
            .with_skip_rows(1),
    )
    .with_retry(fast_retry(max_attempts));
    let sheet = Sheet::connect(grid.clone(), config).expect("valid guest config");
    (sheet, grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_schema() {
        let schema = Guest::schema().unwrap();
        assert_eq!(schema.uid_column(), "A");
        assert_eq!(schema.columns().len(), 6);
        assert!(schema.field("F").unwrap().read_only);
    }

    #[test]
    fn guest_round_trips_through_row() {
        let guest = Guest {
            id: "g9".into(),
            name: "Zed".into(),
            email: "zed@example.com".into(),
            seats: 3,
            vip: true,
            total: Some(12.5),
        };

        let row = guest.dump();
        assert_eq!(row["E"], "yes");

        let mut loaded = Guest::default();
        loaded.load(&row).unwrap();
        assert_eq!(loaded, guest);
        assert_eq!(loaded.uid(), "g9");
    }

    #[test]
    fn fixture_grid_is_shared() {
        let (sheet, grid) = guest_sheet_with_grid();
        grid.set_cell("B", 3, "Robert");
        assert_eq!(sheet.transport().cell("B", 3), "Robert");
    }
}
