use chrono::{DateTime, Duration, Utc};

use crate::config::RequestWindow;

/// A scheduled polling instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// k in `start + k * interval`
    pub index: u64,

    /// Absolute UTC instant of the tick
    pub at: DateTime<Utc>,

    /// Ticks passed over since the previous pass because it overran
    pub skipped: u64,
}

/// Absolute tick schedule over `[start, end)`.
///
/// Ticks sit at `start + k * interval`. Each tick is handed out at
/// most once, and the next tick is always the first one not earlier
/// than the current time, so a slow pass can never cause two passes
/// for the same tick.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval_ms: u64,
}

impl TickSchedule {
    pub fn new(window: &RequestWindow) -> Self {
        Self {
            start: window.start,
            end: window.end,
            interval_ms: window
                .interval()
                .map_or(i64::MAX, |i| i.num_milliseconds()) as u64,
        }
    }

    /// `None` if the tick lies beyond what `DateTime<Utc>` can hold.
    pub fn tick_at(&self, index: u64) -> Option<DateTime<Utc>> {
        let offset_ms = self.interval_ms.checked_mul(index)?;
        let offset = Duration::try_milliseconds(i64::try_from(offset_ms).ok()?)?;
        self.start.checked_add_signed(offset)
    }

    /// Next tick to run, given the current time and the index of the
    /// last tick that ran. `None` once the window is closed.
    pub fn next(&self, now: DateTime<Utc>, last: Option<u64>) -> Option<Tick> {
        let due = self.first_index_not_before(now);
        let expected = last.map_or(0, |k| k + 1);
        let index = due.max(expected);

        // Unrepresentable ticks are past any window end.
        let at = self.tick_at(index)?;
        if at >= self.end {
            return None;
        }

        Some(Tick {
            index,
            at,
            skipped: index - expected,
        })
    }

    fn first_index_not_before(&self, now: DateTime<Utc>) -> u64 {
        if now <= self.start {
            return 0;
        }
        let elapsed_ms = (now - self.start).num_milliseconds() as u64;
        elapsed_ms.div_ceil(self.interval_ms)
    }
}
