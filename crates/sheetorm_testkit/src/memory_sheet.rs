//! An in-memory sheet page.
//!
//! [`InMemorySheet`] answers range reads and writes from a grid of strings,
//! the way the spreadsheet service does: trailing empty cells and trailing
//! empty rows are trimmed from read responses. It can be used directly as a
//! [`SheetTransport`], or as a [`ValuesClient`] behind an `ApiTransport` to
//! exercise range binding and retries.
//!
//! Handles are cheap to clone and share the same grid, so a test can keep one
//! to inspect or mutate the sheet while another is owned by a `Sheet`.

use parking_lot::{Mutex, RwLock};
use sheetorm_column::{col_index, RangeRef};
use sheetorm_core::{
    BatchUpdateRequest, CancellationToken, ClientError, Rows, SheetError, SheetResult,
    SheetTransport, SpreadsheetInfo, UpdateSummary, ValueRange, ValuesClient,
};
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Inner {
    title: String,
    name: String,
    grid: RwLock<Vec<Vec<String>>>,
    failures: Mutex<VecDeque<u16>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

/// A shared, in-memory sheet page.
#[derive(Debug, Clone)]
pub struct InMemorySheet {
    inner: Arc<Inner>,
}

impl InMemorySheet {
    /// Creates an empty page named `Sheet1`.
    pub fn new() -> Self {
        Self::from_rows(Vec::<Vec<String>>::new())
    }

    /// Creates a page holding `rows`, starting at row 1.
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            inner: Arc::new(Inner {
                title: "test document".to_string(),
                name: "Sheet1".to_string(),
                grid: RwLock::new(sheetorm_core::rows(rows)),
                failures: Mutex::new(VecDeque::new()),
                reads: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
            }),
        }
    }

    /// Renames the page. Must be called before the handle is cloned.
    pub fn with_name(self, name: impl Into<String>) -> Self {
        let inner = Inner {
            title: self.inner.title.clone(),
            name: name.into(),
            grid: RwLock::new(self.inner.grid.read().clone()),
            failures: Mutex::new(self.inner.failures.lock().clone()),
            reads: AtomicUsize::new(self.read_count()),
            writes: AtomicUsize::new(self.write_count()),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The page name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Makes the next request fail with `status`. Failures queue up.
    pub fn fail_next(&self, status: u16) {
        self.inner.failures.lock().push_back(status);
    }

    /// Number of read requests served or failed so far.
    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Number of write requests served or failed so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Number of requests of any kind so far.
    pub fn request_count(&self) -> usize {
        self.read_count() + self.write_count()
    }

    /// Returns the value of a cell; empty if never written.
    pub fn cell(&self, column: &str, row: usize) -> String {
        let Some(col) = col_index(column) else {
            return String::new();
        };
        let grid = self.inner.grid.read();
        row.checked_sub(1)
            .and_then(|r| grid.get(r))
            .and_then(|cells| cells.get(col))
            .cloned()
            .unwrap_or_default()
    }

    /// Sets the value of a cell, growing the grid as needed.
    pub fn set_cell(&self, column: &str, row: usize, value: impl Into<String>) {
        if let Some(col) = col_index(column) {
            set(&mut self.inner.grid.write(), col, row, value.into());
        }
    }

    /// Inserts a row before `row`, shifting it and everything below down.
    pub fn insert_row(&self, row: usize, values: Vec<String>) {
        let mut grid = self.inner.grid.write();
        let at = row.saturating_sub(1).min(grid.len());
        grid.insert(at, values);
    }

    /// Deletes `row`, shifting everything below up.
    pub fn delete_row(&self, row: usize) {
        let mut grid = self.inner.grid.write();
        if let Some(at) = row.checked_sub(1).filter(|at| *at < grid.len()) {
            grid.remove(at);
        }
    }

    /// Number of rows in the grid, trailing empty ones included.
    pub fn row_count(&self) -> usize {
        self.inner.grid.read().len()
    }

    fn take_failure(&self) -> Option<u16> {
        self.inner.failures.lock().pop_front()
    }

    fn begin(&self, counter: &AtomicUsize) -> SheetResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        match self.take_failure() {
            Some(status) => Err(SheetError::transport_status(status, "injected failure")),
            None => Ok(()),
        }
    }

    fn read(&self, range: &str) -> SheetResult<Rows> {
        self.begin(&self.inner.reads)?;
        self.lookup(range)
    }

    fn lookup(&self, range: &str) -> SheetResult<Rows> {
        let range: RangeRef = range.parse()?;
        let (first, last) = column_bounds(&range)?;
        let grid = self.inner.grid.read();

        let start = range.start_row();
        let end = range.end_row().unwrap_or(grid.len()).min(grid.len());

        let mut out: Rows = (start..=end)
            .map(|row| {
                let cells = grid.get(row - 1).map(Vec::as_slice).unwrap_or_default();
                let mut values: Vec<String> = (first..=last)
                    .map(|col| cells.get(col).cloned().unwrap_or_default())
                    .collect();
                while values.last().is_some_and(String::is_empty) {
                    values.pop();
                }
                values
            })
            .collect();
        while out.last().is_some_and(Vec::is_empty) {
            out.pop();
        }
        Ok(out)
    }

    fn write(&self, values: &[ValueRange]) -> SheetResult<UpdateSummary> {
        self.begin(&self.inner.writes)?;

        let mut planned = Vec::new();
        for value in values {
            let range: RangeRef = value.range.parse()?;
            if range.end_row() != Some(range.start_row()) || range.width() != value.values.len() {
                return Err(SheetError::transport_status(
                    400,
                    format!("{} values do not fit range {}", value.values.len(), value.range),
                ));
            }
            let (first, _) = column_bounds(&range)?;
            planned.push((first, range.start_row(), &value.values));
        }

        let mut grid = self.inner.grid.write();
        let mut summary = UpdateSummary::default();
        let mut rows = BTreeSet::new();
        let mut cols = BTreeSet::new();
        for (first, row, cells) in planned {
            for (offset, cell) in cells.iter().enumerate() {
                set(&mut grid, first + offset, row, cell.clone());
                cols.insert(first + offset);
            }
            rows.insert(row);
            summary.updated_cells += cells.len() as u64;
        }
        summary.updated_rows = rows.len() as u64;
        summary.updated_columns = cols.len() as u64;
        Ok(summary)
    }

    fn unbind<'a>(&self, range: &'a str) -> Result<&'a str, ClientError> {
        match range.split_once('!') {
            None => Ok(range),
            Some((name, rest)) if name == self.inner.name => Ok(rest),
            Some((name, _)) => Err(ClientError::status(400, format!("unable to parse range: {name}"))),
        }
    }
}

impl Default for InMemorySheet {
    fn default() -> Self {
        Self::new()
    }
}

fn column_bounds(range: &RangeRef) -> SheetResult<(usize, usize)> {
    let bad = || SheetError::transport_status(400, format!("unable to parse range: {range}"));
    let first = col_index(range.first_column()).ok_or_else(bad)?;
    let last = col_index(range.last_column()).ok_or_else(bad)?;
    Ok((first, last))
}

fn set(grid: &mut Vec<Vec<String>>, col: usize, row: usize, value: String) {
    let Some(r) = row.checked_sub(1) else {
        return;
    };
    if grid.len() <= r {
        grid.resize_with(r + 1, Vec::new);
    }
    let cells = &mut grid[r];
    if cells.len() <= col {
        cells.resize_with(col + 1, String::new);
    }
    cells[col] = value;
}

fn to_client_error(err: SheetError) -> ClientError {
    match err {
        SheetError::Transport { status, message } => ClientError { status, message },
        other => ClientError::status(400, other.to_string()),
    }
}

impl SheetTransport for InMemorySheet {
    async fn get_range(&self, cancel: &CancellationToken, range: &str) -> SheetResult<Rows> {
        if cancel.is_cancelled() {
            return Err(SheetError::Cancelled);
        }
        self.read(range)
    }

    async fn batch_get_ranges(
        &self,
        cancel: &CancellationToken,
        ranges: &[String],
    ) -> SheetResult<Vec<Rows>> {
        if cancel.is_cancelled() {
            return Err(SheetError::Cancelled);
        }
        self.begin(&self.inner.reads)?;
        ranges.iter().map(|range| self.lookup(range)).collect()
    }

    async fn batch_update(
        &self,
        cancel: &CancellationToken,
        values: &[ValueRange],
    ) -> SheetResult<UpdateSummary> {
        if cancel.is_cancelled() {
            return Err(SheetError::Cancelled);
        }
        self.write(values)
    }
}

impl ValuesClient for InMemorySheet {
    async fn get_spreadsheet(&self, _doc_id: &str) -> Result<SpreadsheetInfo, ClientError> {
        self.begin(&self.inner.reads).map_err(to_client_error)?;
        Ok(SpreadsheetInfo {
            title: self.inner.title.clone(),
            sheets: vec![self.inner.name.clone()],
        })
    }

    async fn get_values(&self, _doc_id: &str, range: &str) -> Result<Rows, ClientError> {
        let range = self.unbind(range)?;
        self.read(range).map_err(to_client_error)
    }

    async fn batch_get_values(&self, _doc_id: &str, ranges: &[String]) -> Result<Vec<Rows>, ClientError> {
        let token = CancellationToken::new();
        let unbound = ranges
            .iter()
            .map(|r| self.unbind(r).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        self.batch_get_ranges(&token, &unbound)
            .await
            .map_err(to_client_error)
    }

    async fn batch_update_values(
        &self,
        _doc_id: &str,
        request: &BatchUpdateRequest,
    ) -> Result<UpdateSummary, ClientError> {
        let unbound = request
            .data
            .iter()
            .map(|v| Ok(ValueRange::new(self.unbind(&v.range)?, v.values.clone())))
            .collect::<Result<Vec<_>, ClientError>>()?;
        self.write(&unbound).map_err(to_client_error)
    }
}
