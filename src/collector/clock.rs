use chrono::{DateTime, Utc};
use tokio::time::sleep;

/// Wall-clock source used by the run loop.
///
/// The loop only ever needs "what time is it" and "wake me at T";
/// keeping both behind one trait lets tests drive a whole request
/// window without waiting for it.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Returns once `now() >= at`. Returns immediately if `at` has
    /// already passed.
    async fn sleep_until(&self, at: DateTime<Utc>);
}

/// Real UTC clock backed by tokio timers.
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, at: DateTime<Utc>) {
        // Timers are monotonic while the target is wall-clock time;
        // loop so a clock step never wakes us early.
        loop {
            match (at - Utc::now()).to_std() {
                Ok(remaining) if !remaining.is_zero() => sleep(remaining).await,
                _ => return,
            }
        }
    }
}
