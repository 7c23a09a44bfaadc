//! Row resolution and update toolkit.
//!
//! A toolkit is bound to one record layout (its [`Columns`] and UID column) on
//! one sheet page. It only deals in [`RowData`] maps; turning those into
//! records is the codec's job.
//!
//! # Caching
//!
//! Lookups that must not act on stale data (resolving UIDs for an update,
//! re-reading rows after a write) never consult the caches, but every read
//! stores what it learned in them. Only [`SheetsToolkit::get_record_data`]
//! reads from the caches, and it verifies every hit against the UID found in
//! the row it ends up with.
//!
//! # Consistency
//!
//! Reads and writes take at least two calls each and the sheet can change in
//! between. A mismatch found through cached data is healed once by going to
//! the sheet directly; a mismatch that persists is reported as
//! [`SheetError::InconsistentData`]. Sustained concurrent writers can still
//! defeat this.

use crate::cache::{NullCache, RowCache, RowData, UidCache};
use crate::error::{SheetError, SheetResult};
use crate::transport::{SheetTransport, ValueRange};
use sheetorm_column::{col_index, Columns, RangeRef};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default capacity of the channel returned by
/// [`SheetsToolkit::get_all_records_data`].
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

/// Resolves, reads and updates the rows of one record layout.
pub struct SheetsToolkit<T: SheetTransport> {
    transport: Arc<T>,
    columns: Columns,
    uid_col: String,
    skip_rows: usize,
    stream_capacity: usize,
    uid_cache: Arc<dyn UidCache>,
    row_cache: Arc<dyn RowCache>,
}

impl<T: SheetTransport> Clone for SheetsToolkit<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            columns: self.columns.clone(),
            uid_col: self.uid_col.clone(),
            skip_rows: self.skip_rows,
            stream_capacity: self.stream_capacity,
            uid_cache: Arc::clone(&self.uid_cache),
            row_cache: Arc::clone(&self.row_cache),
        }
    }
}

impl<T: SheetTransport> std::fmt::Debug for SheetsToolkit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsToolkit")
            .field("columns", &self.columns)
            .field("uid_col", &self.uid_col)
            .field("skip_rows", &self.skip_rows)
            .finish_non_exhaustive()
    }
}

impl<T: SheetTransport> SheetsToolkit<T> {
    /// Creates a toolkit with no caching.
    ///
    /// `skip_rows` header rows are never read as records.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::InvalidUidColumn`] if `uid_col` is not one of `columns`.
    pub fn new(
        transport: Arc<T>,
        columns: Columns,
        uid_col: impl Into<String>,
        skip_rows: usize,
    ) -> SheetResult<Self> {
        let uid_col = uid_col.into();
        if !columns.contains(&uid_col) {
            return Err(SheetError::InvalidUidColumn { column: uid_col });
        }

        Ok(Self {
            transport,
            columns,
            uid_col,
            skip_rows,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            uid_cache: Arc::new(NullCache),
            row_cache: Arc::new(NullCache),
        })
    }

    /// Sets the UID cache.
    pub fn with_uid_cache(mut self, cache: Arc<dyn UidCache>) -> Self {
        self.uid_cache = cache;
        self
    }

    /// Sets the row cache.
    pub fn with_row_cache(mut self, cache: Arc<dyn RowCache>) -> Self {
        self.row_cache = cache;
        self
    }

    /// Sets the capacity of the streaming channel (at least 1).
    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity.max(1);
        self
    }

    /// The columns of the record layout.
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// The UID column.
    pub fn uid_column(&self) -> &str {
        &self.uid_col
    }

    /// Number of header rows skipped.
    pub fn skip_rows(&self) -> usize {
        self.skip_rows
    }

    fn row_range(&self, row: usize) -> String {
        RangeRef::row_span(self.columns.first(), self.columns.last(), row).to_string()
    }

    /// Maps a row array read from `first..=last` onto the columns.
    ///
    /// The service trims trailing empty cells, so missing cells read as empty.
    fn translate_row(&self, cells: &[String]) -> RowData {
        self.columns
            .iter()
            .map(|col| {
                let value = self
                    .columns
                    .offset_of(col)
                    .and_then(|offset| cells.get(offset))
                    .cloned()
                    .unwrap_or_default();
                (col.to_string(), value)
            })
            .collect()
    }

    /// Resolves UIDs to row numbers with a single read of the UID column.
    ///
    /// The result is in request order; a UID requested twice resolves twice.
    /// Every UID seen in the column is stored in the UID cache, but the cache
    /// is never consulted.
    ///
    /// # Errors
    ///
    /// - [`SheetError::EmptyUid`] if any UID is empty, before any request
    /// - [`SheetError::RecordNotFound`] for the first UID not in the sheet
    pub async fn uids_to_row_nums<S: AsRef<str>>(
        &self,
        cancel: &CancellationToken,
        uids: &[S],
    ) -> SheetResult<Vec<usize>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        if uids.iter().any(|uid| uid.as_ref().is_empty()) {
            return Err(SheetError::EmptyUid);
        }

        let range = RangeRef::column_from(self.uid_col.as_str(), self.skip_rows + 1).to_string();
        let cells = self
            .transport
            .get_range(cancel, &range)
            .await
            .inspect_err(|err| tracing::error!(range = %range, error = %err, "failed to get uid column"))?;

        let mut row_nums: Vec<Option<usize>> = vec![None; uids.len()];
        for (i, row) in cells.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(SheetError::Cancelled);
            }

            let row_num = i + 1 + self.skip_rows;
            let Some(row_uid) = row.first().filter(|uid| !uid.is_empty()) else {
                continue;
            };

            self.uid_cache.put_uid(row_uid, row_num);

            for (slot, uid) in row_nums.iter_mut().zip(uids) {
                if uid.as_ref() == row_uid {
                    tracing::debug!(uid = %row_uid, row = row_num, "translated uid to row number");
                    *slot = Some(row_num);
                }
            }
        }

        row_nums
            .into_iter()
            .zip(uids)
            .map(|(row_num, uid)| {
                row_num.ok_or_else(|| SheetError::RecordNotFound {
                    uid: uid.as_ref().to_string(),
                })
            })
            .collect()
    }

    /// Resolves a single UID; see [`Self::uids_to_row_nums`].
    pub async fn uid_to_row_num(&self, cancel: &CancellationToken, uid: &str) -> SheetResult<usize> {
        let row_nums = self.uids_to_row_nums(cancel, &[uid]).await?;
        row_nums
            .first()
            .copied()
            .ok_or_else(|| SheetError::MalformedResponse(format!("uid {uid:?} resolved to nothing")))
    }

    /// Reads one row and stores it in the row cache.
    pub async fn get_data_map_from_row_num(
        &self,
        cancel: &CancellationToken,
        row_num: usize,
    ) -> SheetResult<RowData> {
        let range = self.row_range(row_num);
        let cells = self
            .transport
            .get_range(cancel, &range)
            .await
            .inspect_err(|err| tracing::error!(range = %range, error = %err, "failed to get row from sheet"))?;

        let data = self.translate_row(cells.first().map(Vec::as_slice).unwrap_or_default());
        self.row_cache.put_row(row_num, &data);
        Ok(data)
    }

    /// Reads several rows in one request, in request order, and stores them
    /// in the row cache.
    pub async fn get_data_maps_from_row_nums(
        &self,
        cancel: &CancellationToken,
        row_nums: &[usize],
    ) -> SheetResult<Vec<RowData>> {
        if row_nums.is_empty() {
            return Ok(Vec::new());
        }

        let ranges: Vec<String> = row_nums.iter().map(|&row| self.row_range(row)).collect();
        let responses = self
            .transport
            .batch_get_ranges(cancel, &ranges)
            .await
            .inspect_err(|err| tracing::error!(ranges = ?ranges, error = %err, "failed to get rows from sheet"))?;

        if responses.len() != row_nums.len() {
            return Err(SheetError::MalformedResponse(format!(
                "requested {} rows, got {}",
                row_nums.len(),
                responses.len()
            )));
        }

        Ok(responses
            .iter()
            .zip(row_nums)
            .map(|(cells, &row_num)| {
                let data = self.translate_row(cells.first().map(Vec::as_slice).unwrap_or_default());
                self.row_cache.put_row(row_num, &data);
                data
            })
            .collect())
    }

    /// Reads the row of `uid`, using the caches where possible.
    ///
    /// # Errors
    ///
    /// - [`SheetError::EmptyUid`] for an empty UID
    /// - [`SheetError::RecordNotFound`] if the UID is not in the sheet
    /// - [`SheetError::InconsistentData`] if the row does not hold `uid`
    ///   even after one fresh read
    pub async fn get_record_data(&self, cancel: &CancellationToken, uid: &str) -> SheetResult<RowData> {
        if uid.is_empty() {
            return Err(SheetError::EmptyUid);
        }

        let cached_row_num = self.uid_cache.get_row_num(uid);
        let uid_cache_hit = cached_row_num.is_some();
        tracing::debug!(uid = %uid, row = ?cached_row_num, hit = uid_cache_hit, "uid cache lookup complete");

        let mut row_num = match cached_row_num {
            Some(row_num) => row_num,
            None => self.uid_to_row_num(cancel, uid).await?,
        };

        let cached_row = self.row_cache.get_row(row_num);
        let row_cache_hit = cached_row.is_some();
        tracing::debug!(row = row_num, hit = row_cache_hit, "row cache lookup complete");

        let mut data = match cached_row {
            Some(data) => data,
            None => self.get_data_map_from_row_num(cancel, row_num).await?,
        };

        let found = data.get(&self.uid_col).cloned().unwrap_or_default();
        if found == uid {
            return Ok(data);
        }

        if !(uid_cache_hit || row_cache_hit) {
            tracing::error!(requested = %uid, returned = %found, "requested uid does not match the sheet");
            return Err(SheetError::inconsistent(uid, found));
        }

        tracing::debug!(
            requested = %uid,
            returned = %found,
            uid_cache_hit,
            row_cache_hit,
            "cache inconsistency, reading from the sheet directly"
        );

        if uid_cache_hit {
            self.uid_cache.invalidate_uid(uid);
            self.uid_cache.invalidate_uid(&found);
        }
        if row_cache_hit {
            self.row_cache.invalidate_row(row_num);
        }

        if uid_cache_hit {
            row_num = self.uid_to_row_num(cancel, uid).await?;
        }
        data = self.get_data_map_from_row_num(cancel, row_num).await?;

        let found = data.get(&self.uid_col).cloned().unwrap_or_default();
        if found != uid {
            tracing::error!(requested = %uid, returned = %found, "requested uid does not match the sheet");
            return Err(SheetError::inconsistent(uid, found));
        }
        Ok(data)
    }

    /// Reads every record row with a single request and streams the rows.
    ///
    /// Rows with an empty UID are skipped. Every streamed row is stored in both
    /// caches. The producer stops when `cancel` fires or the receiver is
    /// dropped.
    pub async fn get_all_records_data(
        &self,
        cancel: &CancellationToken,
    ) -> SheetResult<mpsc::Receiver<RowData>> {
        let range =
            RangeRef::block_from(self.columns.first(), self.columns.last(), self.skip_rows + 1).to_string();
        let cells = self
            .transport
            .get_range(cancel, &range)
            .await
            .inspect_err(|err| tracing::error!(range = %range, error = %err, "failed to get rows from sheet"))?;

        let (tx, rx) = mpsc::channel(self.stream_capacity);
        let toolkit = self.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let mut sent = 0usize;
            for (i, row) in cells.iter().enumerate() {
                if cancel.is_cancelled() {
                    break;
                }

                let row_num = i + 1 + toolkit.skip_rows;
                let data = toolkit.translate_row(row);
                let Some(uid) = data.get(&toolkit.uid_col).filter(|uid| !uid.is_empty()) else {
                    continue;
                };

                toolkit.row_cache.put_row(row_num, &data);
                toolkit.uid_cache.put_uid(uid, row_num);
                tracing::debug!(uid = %uid, row = row_num, "passing a new row");

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    res = tx.send(data) => {
                        if res.is_err() {
                            tracing::debug!("receiver dropped, stopping");
                            break;
                        }
                    }
                }
                sent += 1;
            }
            tracing::debug!(count = sent, "done, passed all valid-looking rows");
        });

        Ok(rx)
    }

    /// Groups the cells of a sparse row into contiguous single-row ranges.
    ///
    /// Columns are walked in order; a run ends at a column missing from `row`
    /// or at a gap in the layout. Runs of one cell become single-cell ranges.
    /// Keys of `row` that are not layout columns are ignored.
    pub fn translate_row_data_to_update_ranges(&self, row_num: usize, row: &RowData) -> Vec<ValueRange> {
        let mut ranges = Vec::new();
        let mut run: Option<Run<'_>> = None;
        let mut prev_idx: Option<usize> = None;

        for col in self.columns.iter() {
            let idx = col_index(col);
            let adjacent = matches!((prev_idx, idx), (Some(p), Some(i)) if i == p + 1);
            prev_idx = idx;

            let Some(value) = row.get(col) else {
                flush_run(&mut ranges, row_num, run.take());
                continue;
            };

            match run.as_mut() {
                Some(current) if adjacent => {
                    current.last = col;
                    current.values.push(value.clone());
                }
                _ => {
                    flush_run(&mut ranges, row_num, run.take());
                    run = Some(Run {
                        first: col,
                        last: col,
                        values: vec![value.clone()],
                    });
                }
            }
        }
        flush_run(&mut ranges, row_num, run);

        tracing::debug!(ranges = ranges.len(), cells = row.len(), "grouped updates to range spans");
        ranges
    }

    /// Writes sparse rows to the records of the given UIDs and returns the
    /// full rows read back afterwards, in input order.
    ///
    /// Resolution bypasses the caches. Row cache entries of every affected row
    /// are dropped before the write, and UID entries are dropped when a row
    /// changes its UID. Empty maps are not written. If nothing is written at
    /// all, no request beyond the resolution is made and the result is empty.
    ///
    /// # Errors
    ///
    /// - [`SheetError::MultiUpdate`] if a UID appears twice, before any request
    /// - [`SheetError::EmptyUid`] / [`SheetError::RecordNotFound`] from resolution
    pub async fn update_records(
        &self,
        cancel: &CancellationToken,
        updates: &[(String, RowData)],
    ) -> SheetResult<Vec<RowData>> {
        let mut seen = HashSet::with_capacity(updates.len());
        for (uid, _) in updates {
            if !seen.insert(uid.as_str()) {
                return Err(SheetError::MultiUpdate { uid: uid.clone() });
            }
        }

        let uids: Vec<&str> = updates.iter().map(|(uid, _)| uid.as_str()).collect();
        let row_nums = self
            .uids_to_row_nums(cancel, uids.as_slice())
            .await
            .inspect_err(|err| tracing::error!(error = %err, "failed to resolve uids to row numbers"))?;

        let mut value_ranges = Vec::new();
        for ((old_uid, row), &row_num) in updates.iter().zip(&row_nums) {
            if row.is_empty() {
                continue;
            }
            value_ranges.extend(self.translate_row_data_to_update_ranges(row_num, row));

            if let Some(new_uid) = row.get(&self.uid_col).filter(|uid| !uid.is_empty()) {
                if new_uid != old_uid {
                    self.uid_cache.invalidate_uid(new_uid);
                    self.uid_cache.invalidate_uid(old_uid);
                    tracing::debug!(old = %old_uid, new = %new_uid, "invalidated uids in cache");
                }
            }
        }
        tracing::debug!(ranges = value_ranges.len(), "translated batch update to range updates");

        if value_ranges.is_empty() {
            tracing::debug!("nothing to update");
            return Ok(Vec::new());
        }

        for &row_num in &row_nums {
            self.row_cache.invalidate_row(row_num);
        }
        tracing::debug!(rows = ?row_nums, "invalidated row data in cache");

        let summary = self
            .transport
            .batch_update(cancel, &value_ranges)
            .await
            .inspect_err(|err| tracing::error!(error = %err, "batch update failed"))?;
        tracing::debug!(
            cells = summary.updated_cells,
            rows = summary.updated_rows,
            columns = summary.updated_columns,
            "batch update completed, reading back data"
        );

        self.get_data_maps_from_row_nums(cancel, &row_nums).await
    }
}

/// A run of adjacent cells being collected into one update range.
struct Run<'a> {
    first: &'a str,
    last: &'a str,
    values: Vec<String>,
}

fn flush_run(ranges: &mut Vec<ValueRange>, row_num: usize, run: Option<Run<'_>>) {
    if let Some(run) = run {
        let range = RangeRef::row_span(run.first, run.last, row_num);
        ranges.push(ValueRange::new(range.to_string(), run.values));
    }
}
