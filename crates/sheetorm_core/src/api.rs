//! Spreadsheet values API transport.
//!
//! [`ApiTransport`] turns a raw [`ValuesClient`] (the thing that actually
//! speaks to the spreadsheet service) into a [`SheetTransport`] bound to one
//! page. It binds ranges to the page, retries rate limited and unavailable
//! responses, and asks the service to interpret written values as user input
//! so formulas keep working.

use crate::config::{RetryPolicy, StructureConfig};
use crate::error::{SheetError, SheetResult};
use crate::retry::{should_retry_api_call, with_retry};
use crate::transport::{Rows, SheetTransport, UpdateSummary, ValueRange};
use serde::{Deserialize, Serialize};
use sheetorm_column::ColumnError;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// An error reported by a [`ValuesClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    /// HTTP status, if the service answered.
    pub status: Option<u16>,
    /// Error message.
    pub message: String,
}

impl ClientError {
    /// Creates an error for a response with `status`.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates an error for a failure that never reached the service.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl From<ClientError> for SheetError {
    fn from(err: ClientError) -> Self {
        SheetError::Transport {
            status: err.status,
            message: err.message,
        }
    }
}

/// How the service interprets written values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputOption {
    /// Values are stored as-is.
    Raw,
    /// Values are parsed as if typed into the UI, so `=SUM(A1:A3)` stays a formula.
    #[default]
    UserEntered,
}

/// A batch update request against bound ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateRequest {
    /// Values to write, with ranges already bound to the page.
    pub data: Vec<ValueRange>,
    /// How the written values are interpreted.
    pub value_input_option: ValueInputOption,
    /// Whether the response should echo the written values back.
    pub include_values_in_response: bool,
}

/// Spreadsheet metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetInfo {
    /// Document title.
    pub title: String,
    /// Titles of the pages, in display order.
    pub sheets: Vec<String>,
}

/// Raw spreadsheet values client.
///
/// Implement this trait over an HTTP library to provide the actual network
/// access. Ranges passed in are already bound to a page.
pub trait ValuesClient: Send + Sync + 'static {
    /// Fetches the document metadata.
    fn get_spreadsheet(
        &self,
        doc_id: &str,
    ) -> impl Future<Output = Result<SpreadsheetInfo, ClientError>> + Send;

    /// Reads one range.
    fn get_values(
        &self,
        doc_id: &str,
        range: &str,
    ) -> impl Future<Output = Result<Rows, ClientError>> + Send;

    /// Reads several ranges; the response order matches the request order.
    fn batch_get_values(
        &self,
        doc_id: &str,
        ranges: &[String],
    ) -> impl Future<Output = Result<Vec<Rows>, ClientError>> + Send;

    /// Writes several ranges.
    fn batch_update_values(
        &self,
        doc_id: &str,
        request: &BatchUpdateRequest,
    ) -> impl Future<Output = Result<UpdateSummary, ClientError>> + Send;
}

/// A [`SheetTransport`] over a [`ValuesClient`], bound to one page.
#[derive(Debug)]
pub struct ApiTransport<C: ValuesClient> {
    client: C,
    doc_id: String,
    sheet: String,
    retry: RetryPolicy,
}

impl<C: ValuesClient> ApiTransport<C> {
    /// Creates a transport for the page described by `structure`.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::ConfigInvalid`] if `structure` does not validate.
    pub fn new(client: C, structure: &StructureConfig, retry: RetryPolicy) -> SheetResult<Self> {
        structure.validate()?;
        Ok(Self {
            client,
            doc_id: structure.doc_id.clone(),
            sheet: structure.sheet.clone(),
            retry,
        })
    }

    /// Returns the document ID.
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Returns the page name; empty for the default page.
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Binds an unbound range to the page: `A1:B2` becomes `Sheet1!A1:B2`.
    ///
    /// # Errors
    ///
    /// Returns [`ColumnError::InvalidRange`] if the range is already bound.
    pub fn bind_range(&self, range: &str) -> SheetResult<String> {
        if range.contains('!') {
            return Err(ColumnError::InvalidRange(range.to_string()).into());
        }
        if self.sheet.is_empty() {
            return Ok(range.to_string());
        }
        Ok(format!("{}!{}", self.sheet, range))
    }

    /// Fetches the document metadata.
    pub async fn get_spreadsheet(&self, cancel: &CancellationToken) -> SheetResult<SpreadsheetInfo> {
        let client = &self.client;
        let doc_id = self.doc_id.as_str();

        with_retry(&self.retry, cancel, should_retry_api_call, || async move {
            client.get_spreadsheet(doc_id).await.map_err(SheetError::from)
        })
        .await
    }
}

impl<C: ValuesClient> SheetTransport for ApiTransport<C> {
    async fn get_range(&self, cancel: &CancellationToken, range: &str) -> SheetResult<Rows> {
        let bound = self.bind_range(range)?;
        tracing::debug!(range = %bound, "attempting to get data from sheet");

        let client = &self.client;
        let doc_id = self.doc_id.as_str();
        let bound = bound.as_str();

        with_retry(&self.retry, cancel, should_retry_api_call, || async move {
            client.get_values(doc_id, bound).await.map_err(SheetError::from)
        })
        .await
    }

    async fn batch_get_ranges(
        &self,
        cancel: &CancellationToken,
        ranges: &[String],
    ) -> SheetResult<Vec<Rows>> {
        let bound = ranges
            .iter()
            .map(|r| self.bind_range(r))
            .collect::<SheetResult<Vec<_>>>()?;
        tracing::debug!(ranges = ?bound, "attempting to batch get data from sheet");

        let client = &self.client;
        let doc_id = self.doc_id.as_str();
        let bound = bound.as_slice();

        let result = with_retry(&self.retry, cancel, should_retry_api_call, || async move {
            client.batch_get_values(doc_id, bound).await.map_err(SheetError::from)
        })
        .await?;

        if result.len() != ranges.len() {
            return Err(SheetError::MalformedResponse(format!(
                "requested {} ranges, got {}",
                ranges.len(),
                result.len()
            )));
        }
        Ok(result)
    }

    async fn batch_update(
        &self,
        cancel: &CancellationToken,
        values: &[ValueRange],
    ) -> SheetResult<UpdateSummary> {
        let data = values
            .iter()
            .map(|v| Ok(ValueRange::new(self.bind_range(&v.range)?, v.values.clone())))
            .collect::<SheetResult<Vec<_>>>()?;
        tracing::debug!(
            ranges = ?data.iter().map(|v| v.range.as_str()).collect::<Vec<_>>(),
            "attempting to batch update sheet"
        );

        let request = BatchUpdateRequest {
            data,
            value_input_option: ValueInputOption::UserEntered,
            include_values_in_response: false,
        };
        let client = &self.client;
        let doc_id = self.doc_id.as_str();
        let request = &request;

        with_retry(&self.retry, cancel, should_retry_api_call, || async move {
            client
                .batch_update_values(doc_id, request)
                .await
                .map_err(SheetError::from)
        })
        .await
    }
}
