use std::collections::{BTreeSet, HashMap};
use teloxide::types::UserId;
use tracing::debug;

/// Tracks when each sender last submitted a report.
///
/// `by_time` holds exactly one `(timestamp, sender)` entry per sender in
/// `last_submitted`, ordered by timestamp, so expiry is a single split of the
/// set instead of a scan.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window_sec: i64,
    last_submitted: HashMap<UserId, i64>,
    by_time: BTreeSet<(i64, UserId)>,
}

impl RateLimiter {
    pub fn new(window_sec: i64) -> Self {
        Self {
            window_sec,
            last_submitted: HashMap::new(),
            by_time: BTreeSet::new(),
        }
    }

    /// Whether `sender` submitted less than `window_sec` seconds before `now`.
    ///
    /// Expired entries of every sender are dropped first.
    pub fn is_recent_reporter(&mut self, sender: UserId, now: i64) -> bool {
        self.evict(now);
        self.last_submitted.contains_key(&sender)
    }

    /// Remember a successful submission, replacing any earlier one for `sender`
    pub fn record_submission(&mut self, sender: UserId, now: i64) {
        if let Some(previous) = self.last_submitted.insert(sender, now) {
            self.by_time.remove(&(previous, sender));
        }
        self.by_time.insert((now, sender));
    }

    /// Drop every entry with `timestamp <= now - window_sec`; returns how many went
    fn evict(&mut self, now: i64) -> usize {
        let cutoff = now.saturating_sub(self.window_sec);
        let kept = self.by_time.split_off(&(cutoff.saturating_add(1), UserId(0)));
        let expired = std::mem::replace(&mut self.by_time, kept);

        for (timestamp, sender) in &expired {
            // Only forget the sender if this was their latest submission
            if self.last_submitted.get(sender) == Some(timestamp) {
                self.last_submitted.remove(sender);
            }
        }

        if !expired.is_empty() {
            debug!(
                "Cooldown eviction at {}: {} expired, {} remaining",
                now,
                expired.len(),
                self.by_time.len()
            );
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.last_submitted.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.last_submitted.is_empty()
    }
}
