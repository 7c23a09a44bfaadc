//! Configuration for sheets and the retry policy.

use crate::error::{SheetError, SheetResult};
use std::time::Duration;

/// Locates a single sheet page inside a spreadsheet document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureConfig {
    /// Spreadsheet document ID.
    pub doc_id: String,
    /// Sheet (tab) name. Empty selects the document's default sheet.
    pub sheet: String,
    /// Number of header rows to skip before the first record.
    pub skip_rows: usize,
}

impl StructureConfig {
    /// Creates a configuration for the default sheet of `doc_id`.
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            sheet: String::new(),
            skip_rows: 0,
        }
    }

    /// Sets the sheet name.
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = sheet.into();
        self
    }

    /// Sets the number of header rows to skip.
    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = skip_rows;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::ConfigInvalid`] if the document ID is empty or the
    /// sheet name contains `!`.
    pub fn validate(&self) -> SheetResult<()> {
        if self.doc_id.is_empty() {
            return Err(SheetError::config_invalid("document id is empty"));
        }
        if self.sheet.contains('!') {
            return Err(SheetError::config_invalid("sheet name must not contain '!'"));
        }
        Ok(())
    }
}

/// Bounded exponential backoff for remote calls.
///
/// The wait after the `n`-th failed attempt (1-based) is
/// `min(base_delay * 2^n + jitter, max_delay)` with jitter drawn uniformly
/// from `[0, max_jitter)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Base of the exponential backoff.
    pub base_delay: Duration,
    /// Upper bound of a single wait.
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each wait.
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// Default attempt ceiling.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 7;

    /// Default backoff cap.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

    /// Creates a policy with the given attempt ceiling and default timings.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Creates a policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Sets the backoff base.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the backoff cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the jitter bound.
    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Calculates the wait after `attempt` (1-based) failed, for a given jitter.
    pub fn delay_for_attempt(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let exp = self.base_delay.saturating_mul(factor);
        exp.saturating_add(jitter).min(self.max_delay)
    }

    /// Draws a random jitter in `[0, max_jitter)`.
    pub fn random_jitter(&self) -> Duration {
        use rand::Rng;

        let bound = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
            max_delay: Self::DEFAULT_MAX_DELAY,
            max_jitter: Duration::from_secs(1),
        }
    }
}

/// Configuration for a [`crate::Sheet`].
#[derive(Debug, Clone)]
pub struct SheetConfig {
    /// Where the records live.
    pub structure: StructureConfig,
    /// Retry policy for every remote call.
    pub retry: RetryPolicy,
    /// Capacity of the channel used when streaming all records.
    pub stream_capacity: usize,
}

impl SheetConfig {
    /// Creates a sheet configuration with default retry and streaming settings.
    pub fn new(structure: StructureConfig) -> Self {
        Self {
            structure,
            retry: RetryPolicy::default(),
            stream_capacity: 64,
        }
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the streaming channel capacity.
    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity.max(1);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::ConfigInvalid`] if the structure is invalid or the
    /// retry policy allows no attempts.
    pub fn validate(&self) -> SheetResult<()> {
        self.structure.validate()?;
        if self.retry.max_attempts == 0 {
            return Err(SheetError::config_invalid("retry policy allows no attempts"));
        }
        Ok(())
    }
}
