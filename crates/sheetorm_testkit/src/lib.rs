//! # sheetorm testkit
//!
//! Test utilities for sheetorm.
//!
//! This crate provides:
//! - [`InMemorySheet`], a grid of cells acting as both a sheet transport and a
//!   raw values client, with failure injection and request counters
//! - Fixture record types and pre-filled sheets
//! - [`MemoryStore`], a key/value store for the shared cache
//! - Property-based test generators using proptest
//! - A tracing subscriber for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sheetorm_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn reads_a_guest() {
//!     let sheet = guest_sheet();
//!     let mut guest = Guest::with_id("g2");
//!     sheet.get_record(&CancellationToken::new(), &mut guest).await.unwrap();
//!     assert_eq!(guest.name, "Bob");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod memory_sheet;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::memory_sheet::*;
    pub use crate::store::*;
    pub use sheetorm_core::CancellationToken;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use memory_sheet::*;
pub use store::*;
