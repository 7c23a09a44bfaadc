//! Typed record access to one sheet page.

use crate::api::{ApiTransport, ValuesClient};
use crate::cache::{NullCache, RowCache, UidCache};
use crate::codec::SheetRecord;
use crate::config::SheetConfig;
use crate::error::{SheetError, SheetResult};
use crate::toolkit::SheetsToolkit;
use crate::transport::SheetTransport;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// A sheet page holding records of any [`SheetRecord`] type.
///
/// Reads run concurrently with each other; an update excludes every other
/// call on the same `Sheet` for its duration. Other clients of the same
/// document are not excluded.
pub struct Sheet<T: SheetTransport> {
    transport: Arc<T>,
    config: SheetConfig,
    uid_cache: Arc<dyn UidCache>,
    row_cache: Arc<dyn RowCache>,
    lock: Arc<RwLock<()>>,
}

impl<C: ValuesClient> Sheet<ApiTransport<C>> {
    /// Creates a sheet talking to the service through `client`.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::ConfigInvalid`] if `config` does not validate.
    pub fn connect(client: C, config: SheetConfig) -> SheetResult<Self> {
        config.validate()?;
        let transport = ApiTransport::new(client, &config.structure, config.retry.clone())?;
        Self::new(transport, config)
    }
}

impl<T: SheetTransport> Sheet<T> {
    /// Creates a sheet over `transport`, without caching.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::ConfigInvalid`] if `config` does not validate.
    pub fn new(transport: T, config: SheetConfig) -> SheetResult<Self> {
        config.validate().inspect_err(|err| {
            tracing::error!(error = %err, "the structure configuration seems invalid");
        })?;

        Ok(Self {
            transport: Arc::new(transport),
            config,
            uid_cache: Arc::new(NullCache),
            row_cache: Arc::new(NullCache),
            lock: Arc::new(RwLock::new(())),
        })
    }

    /// Sets the UID cache shared by every record type of this sheet.
    pub fn with_uid_cache(mut self, cache: Arc<dyn UidCache>) -> Self {
        self.uid_cache = cache;
        self
    }

    /// Sets the row cache shared by every record type of this sheet.
    pub fn with_row_cache(mut self, cache: Arc<dyn RowCache>) -> Self {
        self.row_cache = cache;
        self
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    /// Builds a toolkit for the layout of `R`.
    pub fn toolkit<R: SheetRecord>(&self) -> SheetResult<SheetsToolkit<T>> {
        let schema = R::schema()?;
        let toolkit = SheetsToolkit::new(
            Arc::clone(&self.transport),
            schema.columns().clone(),
            schema.uid_column(),
            self.config.structure.skip_rows,
        )
        .inspect_err(|err| tracing::error!(error = %err, "failed to initialize toolkit"))?;

        Ok(toolkit
            .with_uid_cache(Arc::clone(&self.uid_cache))
            .with_row_cache(Arc::clone(&self.row_cache))
            .with_stream_capacity(self.config.stream_capacity))
    }

    /// Fills `record` from the sheet. Its UID must be set.
    ///
    /// # Errors
    ///
    /// [`SheetError::EmptyUid`] if the record has no UID, otherwise anything
    /// [`SheetsToolkit::get_record_data`] or [`SheetRecord::load`] returns.
    pub async fn get_record<R: SheetRecord>(
        &self,
        cancel: &CancellationToken,
        record: &mut R,
    ) -> SheetResult<()> {
        let _guard = self.lock.read().await;
        let toolkit = self.toolkit::<R>()?;

        let uid = record.uid();
        if uid.is_empty() {
            return Err(SheetError::EmptyUid);
        }

        let data = toolkit
            .get_record_data(cancel, &uid)
            .await
            .inspect_err(|err| tracing::error!(uid = %uid, error = %err, "error while getting record data"))?;
        record.load(&data)
    }

    /// Reads every record of type `R`. Rows with an empty UID are skipped.
    pub async fn get_all_records<R: SheetRecord + Default>(
        &self,
        cancel: &CancellationToken,
    ) -> SheetResult<Vec<R>> {
        let _guard = self.lock.read().await;
        let toolkit = self.toolkit::<R>()?;

        let mut rx = toolkit
            .get_all_records_data(cancel)
            .await
            .inspect_err(|err| tracing::error!(error = %err, "failure while getting records"))?;

        let mut records = Vec::new();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SheetError::Cancelled),
                data = rx.recv() => {
                    let Some(data) = data else { break };
                    let mut record = R::default();
                    record.load(&data)?;
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    /// Streams every record of type `R`.
    ///
    /// The sheet is read once up front; decoding happens as the receiver
    /// consumes. A row that fails to decode is sent as an error and the stream
    /// goes on. Updates on this `Sheet` wait until the stream has ended or the
    /// receiver is dropped.
    pub async fn stream_records<R: SheetRecord + Default>(
        &self,
        cancel: &CancellationToken,
    ) -> SheetResult<mpsc::Receiver<SheetResult<R>>> {
        // held until the stream ends so cache fills never race an update
        let guard = Arc::clone(&self.lock).read_owned().await;
        let mut rows = self.toolkit::<R>()?.get_all_records_data(cancel).await?;

        let (tx, rx) = mpsc::channel(self.config.stream_capacity);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _guard = guard;
            loop {
                let data = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    data = rows.recv() => data,
                };
                let Some(data) = data else { break };

                let mut record = R::default();
                let decoded = record.load(&data).map(|()| record);
                if tx.send(decoded).await.is_err() {
                    break;
                }
            }
            // the producer fills the caches; it must finish under the guard
            while rows.recv().await.is_some() {}
        });
        Ok(rx)
    }

    /// Writes `records` and reloads them with the values the sheet holds
    /// afterwards, so formula results show up. Read-only fields are never
    /// written. Every record must have a UID and appear only once.
    pub async fn update_records<R: SheetRecord>(
        &self,
        cancel: &CancellationToken,
        records: &mut [R],
    ) -> SheetResult<()> {
        let _guard = self.lock.write().await;

        if records.is_empty() {
            return Ok(());
        }

        let schema = R::schema()?;
        let toolkit = self.toolkit::<R>()?;

        let mut updates = Vec::with_capacity(records.len());
        for record in records.iter() {
            let uid = record.uid();
            if uid.is_empty() {
                return Err(SheetError::EmptyUid);
            }
            updates.push((uid, schema.writable_row(record.dump())));
        }

        let updated = toolkit
            .update_records(cancel, &updates)
            .await
            .inspect_err(|err| tracing::error!(error = %err, "error while updating records"))?;

        for (record, data) in records.iter_mut().zip(&updated) {
            record.load(data)?;
        }
        Ok(())
    }
}

impl<T: SheetTransport> std::fmt::Debug for Sheet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sheet")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryRowCache, MemoryUidCache, RowData};
    use crate::codec::{load_cell, FieldSpec};
    use crate::config::{RetryPolicy, StructureConfig};
    use crate::transport::{rows, MockTransport, TransportCall, UpdateSummary, ValueRange};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Guest {
        id: String,
        name: String,
        seats: u32,
        total: String,
    }

    impl SheetRecord for Guest {
        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::new("A").uid(),
                FieldSpec::new("B"),
                FieldSpec::new("C"),
                FieldSpec::new("D").read_only(),
            ]
        }

        fn dump(&self) -> RowData {
            RowData::from([
                ("A".to_string(), self.id.clone()),
                ("B".to_string(), self.name.clone()),
                ("C".to_string(), self.seats.to_string()),
                ("D".to_string(), self.total.clone()),
            ])
        }

        fn load(&mut self, row: &RowData) -> SheetResult<()> {
            load_cell(row, "A", &mut self.id)?;
            load_cell(row, "B", &mut self.name)?;
            load_cell(row, "C", &mut self.seats)?;
            load_cell(row, "D", &mut self.total)
        }
    }

    fn guest(id: &str) -> Guest {
        Guest {
            id: id.to_string(),
            ..Guest::default()
        }
    }

    fn sheet(transport: MockTransport) -> Sheet<MockTransport> {
        let config = SheetConfig::new(StructureConfig::new("doc").with_skip_rows(1))
            .with_retry(RetryPolicy::no_retry());
        Sheet::new(transport, config).unwrap()
    }

    #[test]
    fn new_validates_config() {
        let result = Sheet::new(MockTransport::new(), SheetConfig::new(StructureConfig::new("")));
        assert!(matches!(result, Err(SheetError::ConfigInvalid { .. })));
    }

    #[tokio::test]
    async fn get_record_loads_fields() {
        let transport = MockTransport::new();
        transport.push_get_range(Ok(rows([["g1"], ["g2"]])));
        transport.push_get_range(Ok(rows([["g2", "Bob", "3", "9"]])));
        let sheet = sheet(transport);
        let token = CancellationToken::new();

        let mut record = guest("g2");
        sheet.get_record(&token, &mut record).await.unwrap();

        assert_eq!(record.name, "Bob");
        assert_eq!(record.seats, 3);
        assert_eq!(record.total, "9");
        assert_eq!(
            sheet.transport().calls(),
            vec![
                TransportCall::GetRange("A2:A".into()),
                TransportCall::GetRange("A3:D3".into()),
            ]
        );
    }

    #[tokio::test]
    async fn get_record_requires_uid() {
        let sheet = sheet(MockTransport::new());
        let token = CancellationToken::new();

        let result = sheet.get_record(&token, &mut Guest::default()).await;
        assert!(matches!(result, Err(SheetError::EmptyUid)));
        assert_eq!(sheet.transport().call_count(), 0);
    }

    #[tokio::test]
    async fn get_record_decode_failure() {
        let transport = MockTransport::new();
        transport.push_get_range(Ok(rows([["g1"]])));
        transport.push_get_range(Ok(rows([["g1", "Al", "many"]])));
        let sheet = sheet(transport);
        let token = CancellationToken::new();

        let result = sheet.get_record(&token, &mut guest("g1")).await;
        assert!(matches!(result, Err(SheetError::Codec { column, .. }) if column == "C"));
    }

    #[tokio::test]
    async fn get_all_records_collects() {
        let transport = MockTransport::new();
        transport.push_get_range(Ok(rows([
            vec!["g1", "Al", "1"],
            vec!["", "nobody", "0"],
            vec!["g2", "Bo", "2", "4"],
        ])));
        let sheet = sheet(transport);
        let token = CancellationToken::new();

        let records: Vec<Guest> = sheet.get_all_records(&token).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Al");
        assert_eq!(records[1].total, "4");
    }

    #[tokio::test]
    async fn stream_records_reports_bad_rows() {
        let transport = MockTransport::new();
        transport.push_get_range(Ok(rows([vec!["g1", "Al", "x"], vec!["g2", "Bo", "2"]])));
        let sheet = sheet(transport);
        let token = CancellationToken::new();

        let mut rx = sheet.stream_records::<Guest>(&token).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Err(SheetError::Codec { .. }))));
        assert_eq!(rx.recv().await.unwrap().unwrap().name, "Bo");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn update_records_skips_read_only_and_reloads() {
        let transport = MockTransport::new();
        transport.push_get_range(Ok(rows([["g1"], ["g2"]])));
        transport.push_batch_update(Ok(UpdateSummary::default()));
        transport.push_batch_get(Ok(vec![rows([["g2", "Bo", "5", "=C3*2"]])]));
        let sheet = sheet(transport);
        let token = CancellationToken::new();

        let mut records = vec![Guest {
            id: "g2".into(),
            name: "Bo".into(),
            seats: 5,
            total: "stale".into(),
        }];
        sheet.update_records(&token, &mut records).await.unwrap();

        assert_eq!(records[0].total, "=C3*2");
        assert_eq!(
            sheet.transport().calls()[1],
            TransportCall::BatchUpdate(vec![ValueRange::new(
                "A3:C3",
                vec!["g2".into(), "Bo".into(), "5".into()]
            )])
        );
    }

    #[tokio::test]
    async fn update_records_rejects_missing_uid() {
        let sheet = sheet(MockTransport::new());
        let token = CancellationToken::new();

        let mut records = vec![guest("g1"), Guest::default()];
        let result = sheet.update_records(&token, &mut records).await;
        assert!(matches!(result, Err(SheetError::EmptyUid)));
        assert_eq!(sheet.transport().call_count(), 0);
    }

    #[tokio::test]
    async fn update_records_empty_is_noop() {
        let sheet = sheet(MockTransport::new());
        let token = CancellationToken::new();

        let mut records: Vec<Guest> = Vec::new();
        sheet.update_records(&token, &mut records).await.unwrap();
        assert_eq!(sheet.transport().call_count(), 0);
    }

    #[tokio::test]
    async fn caches_are_shared_across_calls() {
        let transport = MockTransport::new();
        transport.push_get_range(Ok(rows([vec!["g1", "Al", "1"]])));
        let sheet = sheet(transport)
            .with_uid_cache(Arc::new(MemoryUidCache::new()))
            .with_row_cache(Arc::new(MemoryRowCache::default()));
        let token = CancellationToken::new();

        let all: Vec<Guest> = sheet.get_all_records(&token).await.unwrap();
        assert_eq!(all.len(), 1);

        let mut record = guest("g1");
        sheet.get_record(&token, &mut record).await.unwrap();
        assert_eq!(record.name, "Al");
        assert_eq!(sheet.transport().call_count(), 1);
    }
}
