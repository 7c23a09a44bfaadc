//! Transport layer abstraction for a single sheet page.

use crate::error::{SheetError, SheetResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Rows of cell values as returned by a range read.
///
/// Trailing empty cells and trailing empty rows may be omitted by the service,
/// so rows can be shorter than the requested range and can even be empty.
pub type Rows = Vec<Vec<String>>;

/// One row of values to write at an unbound range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Unbound A1 range (`C4:E4` or `A4`).
    pub range: String,
    /// Values, left to right.
    pub values: Vec<String>,
}

impl ValueRange {
    /// Creates a value range.
    pub fn new(range: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            range: range.into(),
            values,
        }
    }
}

/// Totals reported by a batch update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Number of cells written.
    pub updated_cells: u64,
    /// Number of rows touched.
    pub updated_rows: u64,
    /// Number of columns touched.
    pub updated_columns: u64,
}

/// A sheet transport talks to one page of a remote spreadsheet.
///
/// Ranges are always unbound; binding them to the page is up to the
/// implementation. Every call observes `cancel` and returns
/// [`SheetError::Cancelled`] once it fires.
pub trait SheetTransport: Send + Sync + 'static {
    /// Reads a single range.
    fn get_range(
        &self,
        cancel: &CancellationToken,
        range: &str,
    ) -> impl Future<Output = SheetResult<Rows>> + Send;

    /// Reads several ranges in one call. The response order matches `ranges`.
    fn batch_get_ranges(
        &self,
        cancel: &CancellationToken,
        ranges: &[String],
    ) -> impl Future<Output = SheetResult<Vec<Rows>>> + Send;

    /// Writes several value ranges in one call.
    fn batch_update(
        &self,
        cancel: &CancellationToken,
        values: &[ValueRange],
    ) -> impl Future<Output = SheetResult<UpdateSummary>> + Send;
}

/// A call recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `get_range` with its range.
    GetRange(String),
    /// `batch_get_ranges` with its ranges.
    BatchGetRanges(Vec<String>),
    /// `batch_update` with its values.
    BatchUpdate(Vec<ValueRange>),
}

/// A mock transport for testing.
///
/// Responses are queued per operation and consumed in order. A call with
/// nothing queued fails with [`SheetError::MalformedResponse`].
#[derive(Debug, Default)]
pub struct MockTransport {
    get_range_responses: Mutex<VecDeque<SheetResult<Rows>>>,
    batch_get_responses: Mutex<VecDeque<SheetResult<Vec<Rows>>>>,
    batch_update_responses: Mutex<VecDeque<SheetResult<UpdateSummary>>>,
    calls: Mutex<Vec<TransportCall>>,
}

impl MockTransport {
    /// Creates a new mock transport with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a `get_range` response.
    pub fn push_get_range(&self, response: SheetResult<Rows>) {
        self.get_range_responses.lock().push_back(response);
    }

    /// Queues a `batch_get_ranges` response.
    pub fn push_batch_get(&self, response: SheetResult<Vec<Rows>>) {
        self.batch_get_responses.lock().push_back(response);
    }

    /// Queues a `batch_update` response.
    pub fn push_batch_update(&self, response: SheetResult<UpdateSummary>) {
        self.batch_update_responses.lock().push_back(response);
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().push(call);
    }

    fn next<R>(queue: &Mutex<VecDeque<SheetResult<R>>>, op: &str) -> SheetResult<R> {
        queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SheetError::MalformedResponse(format!("no mock {op} response queued"))))
    }
}

impl SheetTransport for MockTransport {
    async fn get_range(&self, cancel: &CancellationToken, range: &str) -> SheetResult<Rows> {
        if cancel.is_cancelled() {
            return Err(SheetError::Cancelled);
        }
        self.record(TransportCall::GetRange(range.to_string()));
        Self::next(&self.get_range_responses, "get_range")
    }

    async fn batch_get_ranges(
        &self,
        cancel: &CancellationToken,
        ranges: &[String],
    ) -> SheetResult<Vec<Rows>> {
        if cancel.is_cancelled() {
            return Err(SheetError::Cancelled);
        }
        self.record(TransportCall::BatchGetRanges(ranges.to_vec()));
        Self::next(&self.batch_get_responses, "batch_get_ranges")
    }

    async fn batch_update(
        &self,
        cancel: &CancellationToken,
        values: &[ValueRange],
    ) -> SheetResult<UpdateSummary> {
        if cancel.is_cancelled() {
            return Err(SheetError::Cancelled);
        }
        self.record(TransportCall::BatchUpdate(values.to_vec()));
        Self::next(&self.batch_update_responses, "batch_update")
    }
}

/// Builds [`Rows`] from string literals.
pub fn rows<R, C>(data: R) -> Rows
where
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: Into<String>,
{
    data.into_iter()
        .map(|row| row.into_iter().map(Into::into).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_transport_replays_in_order() {
        let transport = MockTransport::new();
        transport.push_get_range(Ok(rows([["1"], ["2"]])));
        transport.push_get_range(Err(SheetError::transport_status(503, "busy")));

        let token = CancellationToken::new();
        let first = transport.get_range(&token, "A1:A").await.unwrap();
        assert_eq!(first, rows([["1"], ["2"]]));

        let second = transport.get_range(&token, "A1:A").await;
        assert!(second.unwrap_err().is_service_unavailable());

        assert_eq!(
            transport.calls(),
            vec![
                TransportCall::GetRange("A1:A".into()),
                TransportCall::GetRange("A1:A".into()),
            ]
        );
    }

    #[tokio::test]
    async fn mock_transport_nothing_queued() {
        let transport = MockTransport::new();
        let token = CancellationToken::new();

        let result = transport.batch_update(&token, &[]).await;
        assert!(matches!(result, Err(SheetError::MalformedResponse(_))));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn mock_transport_cancelled() {
        let transport = MockTransport::new();
        transport.push_batch_get(Ok(vec![]));

        let token = CancellationToken::new();
        token.cancel();

        let result = transport.batch_get_ranges(&token, &["A1".to_string()]).await;
        assert!(matches!(result, Err(SheetError::Cancelled)));
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn rows_helper() {
        let data = rows([vec!["a", "b"], vec![], vec!["c"]]);
        assert_eq!(data.len(), 3);
        assert!(data[1].is_empty());
        assert_eq!(data[2], vec!["c".to_string()]);
    }
}
