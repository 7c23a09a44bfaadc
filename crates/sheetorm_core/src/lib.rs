//! # sheetorm core
//!
//! Typed records on top of a single page of a remote spreadsheet.
//!
//! This crate provides:
//! - Resolution of record UIDs to row numbers
//! - Single and batched row reads, and streaming of every record
//! - Coalescing of sparse record updates into contiguous range writes
//! - A two-tier, best-effort cache (UID to row, row to data) with
//!   staleness detection
//! - Retry with bounded exponential backoff and cooperative cancellation
//! - A record codec with static column declarations
//!
//! ## Architecture
//!
//! ```text
//! Sheet ──> SheetsToolkit ──> SheetTransport ──> ApiTransport ──> ValuesClient
//!   │             │                                   │
//!   │             └──> UidCache / RowCache            └──> with_retry
//!   └──> SheetRecord (codec)
//! ```
//!
//! [`Sheet`] serializes callers and converts records through the codec;
//! [`SheetsToolkit`] only sees row maps. The network client itself is
//! supplied by the caller through [`ValuesClient`].
//!
//! ## Key Invariants
//!
//! - A cache hit is never trusted without checking the UID in the row
//! - Updates never resolve rows through the caches
//! - Input errors (empty or duplicate UIDs) are reported before any request
//! - Only rate limiting (429) and unavailability (503) are retried

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
pub mod cache;
pub mod codec;
mod config;
mod error;
mod retry;
mod sheet;
mod toolkit;
mod transport;

pub use api::{
    ApiTransport, BatchUpdateRequest, ClientError, SpreadsheetInfo, ValueInputOption, ValuesClient,
};
pub use cache::{NullCache, RowCache, RowData, UidCache};
pub use codec::{CellValue, FieldSpec, RecordSchema, SheetRecord};
pub use config::{RetryPolicy, SheetConfig, StructureConfig};
pub use error::{SheetError, SheetResult, STATUS_SERVICE_UNAVAILABLE, STATUS_TOO_MANY_REQUESTS};
pub use retry::{should_retry_api_call, with_retry};
pub use sheet::Sheet;
pub use toolkit::{SheetsToolkit, DEFAULT_STREAM_CAPACITY};
pub use transport::{
    rows, MockTransport, Rows, SheetTransport, TransportCall, UpdateSummary, ValueRange,
};

pub use sheetorm_column::{Columns, RangeRef};
pub use tokio_util::sync::CancellationToken;
