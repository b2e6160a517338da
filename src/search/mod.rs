// Search-as-you-type rate limiting
//
// Keystrokes are recorded with the time they happened; `poll` releases a query
// once typing has been idle for the debounce window. Time is passed in so the
// throttle stays deterministic and free of timers.

use std::time::{Duration, Instant};
use tracing::debug;

/// Shortest idle window between the last keystroke and a dispatched query
pub const MIN_DEBOUNCE: Duration = Duration::from_millis(300);

/// Shortest query sent to a collaborator
pub const MIN_QUERY_CHARS: usize = 3;

/// A query released by the throttle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDispatch {
    /// Sequence number to hand back to [`SearchThrottle::accept`]
    pub seq: u64,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct SearchThrottle {
    debounce: Duration,
    min_chars: usize,
    pending: Option<(String, Instant)>,
    /// Last value that survived the debounce, dispatched or not
    last_settled: Option<String>,
    last_seq: u64,
}

impl Default for SearchThrottle {
    fn default() -> Self {
        Self::new(MIN_DEBOUNCE, MIN_QUERY_CHARS)
    }
}

impl SearchThrottle {
    /// Values below the floors are raised to them
    pub fn new(debounce: Duration, min_chars: usize) -> Self {
        Self {
            debounce: debounce.max(MIN_DEBOUNCE),
            min_chars: min_chars.max(MIN_QUERY_CHARS),
            pending: None,
            last_settled: None,
            last_seq: 0,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// Record the field's full text after a keystroke
    pub fn keystroke(&mut self, text: &str, now: Instant) {
        self.pending = Some((text.to_string(), now));
    }

    /// When the pending text becomes eligible for dispatch
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, typed_at)| *typed_at + self.debounce)
    }

    /// Release the pending query if the burst has settled
    ///
    /// A settled value identical to the previous settled value, or shorter
    /// than the minimum length, is swallowed.
    pub fn poll(&mut self, now: Instant) -> Option<SearchDispatch> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }

        let (query, _) = self.pending.take()?;
        if self.last_settled.as_deref() == Some(query.as_str()) {
            debug!(query = %query, "Search suppressed, same as previous query");
            return None;
        }
        self.last_settled = Some(query.clone());

        if query.chars().count() < self.min_chars {
            debug!(query = %query, min_chars = self.min_chars, "Search suppressed, query too short");
            return None;
        }

        self.last_seq += 1;
        debug!(query = %query, seq = self.last_seq, "Search dispatched");
        Some(SearchDispatch {
            seq: self.last_seq,
            query,
        })
    }

    /// Whether a response for dispatch `seq` should be shown
    ///
    /// Only the most recently dispatched query's response is; earlier ones
    /// have been superseded.
    pub fn accept(&self, seq: u64) -> bool {
        seq != 0 && seq == self.last_seq
    }

    /// Forget pending input and history, e.g. when the field is cleared
    pub fn reset(&mut self) {
        self.pending = None;
        self.last_settled = None;
        // Responses still in flight stay superseded
        self.last_seq += 1;
    }
}
