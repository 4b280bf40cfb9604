use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::{DateTime, Utc};

use crate::{
    collector::{clock::Clock, schedule::TickSchedule},
    config::RequestWindow,
    metrics::METRICS,
    output::OutputTable,
    provider::{RequestFailure, TravelTimeProvider},
    schema::{CoordinatePair, TravelTimeRecord},
    util,
};

/// Outcome of one pass over all coordinate pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Wall-clock time the pass started (also Req_Date / Req_Time)
    pub requested_at: DateTime<Utc>,
    pub attempts: usize,
    pub failures: usize,
}

impl PassReport {
    pub fn successes(&self) -> usize {
        self.attempts - self.failures
    }
}

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// No tick left inside [start, end)
    WindowClosed,

    /// Accumulated record count reached `max_records`
    MaxRecords,
}

/// Totals over the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: usize,
    pub attempts: usize,
    pub failures: usize,
    pub records: usize,
    pub skipped_ticks: u64,
    pub termination: Termination,
}

/// Polls the provider for every coordinate pair on each scheduled
/// tick of the request window and accumulates the results.
///
/// STATES:
/// - Waiting:    before window start, sleeps until start
/// - Active:     sleeps until the next tick, runs one pass
/// - Terminated: window closed or record cap reached
///
/// Requests are awaited one at a time; passes never overlap.
///
/// This type does NOT:
/// - Retry failed requests
/// - Persist anything (the caller writes the returned table)
///
pub struct Collector {
    provider: Arc<dyn TravelTimeProvider>,
    clock: Arc<dyn Clock>,
    pairs: Vec<CoordinatePair>,
    window: RequestWindow,
}

impl Collector {
    pub fn new(
        provider: Arc<dyn TravelTimeProvider>,
        clock: Arc<dyn Clock>,
        pairs: Vec<CoordinatePair>,
        window: RequestWindow,
    ) -> Self {
        Self {
            provider,
            clock,
            pairs,
            window,
        }
    }

    /// Runs the loop to termination and returns everything collected.
    pub async fn run(&self) -> (OutputTable, RunSummary) {
        let schedule = TickSchedule::new(&self.window);
        let mut table = OutputTable::new();
        let mut summary = RunSummary {
            passes: 0,
            attempts: 0,
            failures: 0,
            records: 0,
            skipped_ticks: 0,
            termination: Termination::WindowClosed,
        };

        // --------------------------------------------------
        // WAITING
        // --------------------------------------------------
        let now = self.clock.now();
        if now < self.window.start && self.window.start < self.window.end {
            log::info!(
                "waiting for window start {} UTC ({}s from now)",
                util::format_window_timestamp(&self.window.start),
                (self.window.start - now).num_seconds()
            );
            self.clock.sleep_until(self.window.start).await;
        }

        // --------------------------------------------------
        // ACTIVE
        // --------------------------------------------------
        let mut last: Option<u64> = None;
        loop {
            if table.len() as u64 >= self.window.max_records {
                summary.termination = Termination::MaxRecords;
                break;
            }

            let Some(tick) = schedule.next(self.clock.now(), last) else {
                summary.termination = Termination::WindowClosed;
                break;
            };

            if tick.skipped > 0 {
                if last.is_some() {
                    log::warn!(
                        "previous pass overran the interval, skipping {} tick(s)",
                        tick.skipped
                    );
                    summary.skipped_ticks += tick.skipped;
                    METRICS.ticks_skipped.fetch_add(tick.skipped as usize, Ordering::Relaxed);
                } else {
                    log::info!("window already open, joining at tick {}", tick.index);
                }
            }

            self.clock.sleep_until(tick.at).await;

            let (records, report) = self.run_pass(self.clock.now()).await;
            summary.passes += 1;
            summary.attempts += report.attempts;
            summary.failures += report.failures;
            summary.records += records.len();
            table.extend(records);
            last = Some(tick.index);

            METRICS.passes_run.fetch_add(1, Ordering::Relaxed);
            log::info!(
                "pass {} ({}) done: {}/{} ok, {} record(s) total",
                tick.index,
                util::format_window_timestamp(&report.requested_at),
                report.successes(),
                report.attempts,
                table.len()
            );
            log::debug!("{}", METRICS.summary_line());
        }

        // --------------------------------------------------
        // TERMINATED
        // --------------------------------------------------
        log::info!(
            "collector stopped ({:?}): {} pass(es), {} record(s), {}/{} request(s) failed, {} tick(s) skipped",
            summary.termination,
            summary.passes,
            summary.records,
            summary.failures,
            summary.attempts,
            summary.skipped_ticks
        );

        (table, summary)
    }

    /// One full pass over all coordinate pairs.
    ///
    /// Failures are logged and skipped; the pass always visits every
    /// pair.
    pub async fn run_pass(&self, requested_at: DateTime<Utc>) -> (Vec<TravelTimeRecord>, PassReport) {
        let (req_date, req_time) = util::request_date_time(&requested_at);
        log::info!(
            "{} pass running for UTC time: {} {}",
            self.provider.name(),
            req_date,
            req_time
        );

        let mut records = Vec::with_capacity(self.pairs.len());
        let mut report = PassReport {
            requested_at,
            attempts: 0,
            failures: 0,
        };

        for pair in &self.pairs {
            if pair.has_departure_override() {
                log::debug!(
                    "[{}] departure override {:?} {:?} ignored, departing now",
                    pair.id,
                    pair.dep_date,
                    pair.dep_time
                );
            }

            report.attempts += 1;
            METRICS.requests_sent.fetch_add(1, Ordering::Relaxed);

            match self.provider.travel_time(pair).await {
                Ok(est) => {
                    METRICS.requests_ok.fetch_add(1, Ordering::Relaxed);
                    METRICS.records_collected.fetch_add(1, Ordering::Relaxed);
                    records.push(TravelTimeRecord {
                        id: pair.id.clone(),
                        origin: pair.origin.clone(),
                        destination: pair.destination.clone(),
                        req_date: req_date.clone(),
                        req_time: req_time.clone(),
                        distance_m: est.distance_m,
                        duration_s: est.duration_s,
                        tt_best_guess_s: est.duration_in_traffic_s,
                    });
                }
                Err(e) => {
                    report.failures += 1;
                    METRICS.requests_failed.fetch_add(1, Ordering::Relaxed);
                    log::warn!("{}", self.failure_line(pair, &e));
                }
            }
        }

        (records, report)
    }

    /// Warn line for a skipped pair: ID, the request as sent (key
    /// redacted by the provider) and the cause.
    fn failure_line(&self, pair: &CoordinatePair, err: &RequestFailure) -> String {
        format!(
            "[{}] {} failed: {}",
            pair.id,
            self.provider.describe_request(pair),
            err
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::clock::testing::ManualClock;
    use crate::provider::TravelTimeEstimate;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Provider that fails for a fixed set of IDs and optionally
    /// consumes clock time per call.
    struct ScriptedProvider {
        failing: HashSet<String>,
        clock: Arc<ManualClock>,
        call_cost: Duration,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(clock: Arc<ManualClock>) -> Self {
            Self {
                failing: HashSet::new(),
                clock,
                call_cost: Duration::zero(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, ids: &[&str]) -> Self {
            self.failing = ids.iter().map(|s| s.to_string()).collect();
            self
        }

        fn call_cost(mut self, cost: Duration) -> Self {
            self.call_cost = cost;
            self
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl TravelTimeProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn travel_time(&self, pair: &CoordinatePair) -> Result<TravelTimeEstimate, RequestFailure> {
            self.calls.lock().unwrap().push(pair.id.clone());
            self.clock.advance(self.call_cost);
            if self.failing.contains(&pair.id) {
                return Err(RequestFailure::HttpStatus(503));
            }
            Ok(TravelTimeEstimate {
                distance_m: 1000,
                duration_s: 600,
                duration_in_traffic_s: 720,
            })
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 5, 3, 6, 0, 0).unwrap()
    }

    fn pairs(ids: &[&str]) -> Vec<CoordinatePair> {
        ids.iter()
            .map(|id| CoordinatePair {
                id: id.to_string(),
                origin: "42.35,-71.06".into(),
                destination: "42.36,-71.10".into(),
                dep_date: None,
                dep_time: None,
            })
            .collect()
    }

    fn window(start: DateTime<Utc>, span_secs: i64, interval_secs: u64) -> RequestWindow {
        RequestWindow {
            start,
            end: start + Duration::seconds(span_secs),
            interval_secs,
            max_records: 9_999_999_999,
        }
    }

    fn collector(
        provider: Arc<ScriptedProvider>,
        clock: Arc<ManualClock>,
        ids: &[&str],
        window: RequestWindow,
    ) -> Collector {
        Collector::new(provider, clock, pairs(ids), window)
    }

    #[tokio::test]
    async fn empty_window_collects_nothing() {
        let clock = Arc::new(ManualClock::new(t0()));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()));
        let c = collector(provider.clone(), clock, &["1"], window(t0(), 0, 100));

        let (table, summary) = c.run().await;
        assert!(table.is_empty());
        assert_eq!(summary.passes, 0);
        assert_eq!(summary.termination, Termination::WindowClosed);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn past_window_issues_no_requests() {
        let clock = Arc::new(ManualClock::new(t0() + Duration::days(1)));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()));
        let c = collector(provider.clone(), clock, &["1", "2"], window(t0(), 3600, 100));

        let (table, summary) = c.run().await;
        assert!(table.is_empty());
        assert_eq!(summary.passes, 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn two_interval_window_runs_two_passes_from_waiting() {
        let clock = Arc::new(ManualClock::new(t0() - Duration::seconds(3600)));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()));
        let c = collector(provider.clone(), clock.clone(), &["1", "2"], window(t0(), 200, 100));

        let (table, summary) = c.run().await;
        assert_eq!(summary.passes, 2);
        assert!(summary.passes <= 3);
        assert_eq!(table.len(), 4);
        assert_eq!(provider.call_count(), 4);

        let times: Vec<_> = table.records().iter().map(|r| r.req_time.as_str()).collect();
        assert_eq!(times, ["06:00:00", "06:00:00", "06:01:40", "06:01:40"]);
        assert!(table.records().iter().all(|r| r.req_date == "2019-05-03"));
    }

    #[tokio::test]
    async fn reported_travel_time_is_duration_in_traffic() {
        let clock = Arc::new(ManualClock::new(t0()));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()));
        let c = collector(provider, clock, &["1"], window(t0(), 100, 100));

        let (table, _) = c.run().await;
        let rec = &table.records()[0];
        assert_eq!(rec.tt_best_guess_s, 720);
        assert_eq!(rec.duration_s, 600);
        assert_eq!(rec.distance_m, 1000);
        assert_eq!(rec.id, "1");
        assert_eq!(rec.origin, "42.35,-71.06");
    }

    #[tokio::test]
    async fn failing_pair_is_skipped_and_pass_continues() {
        let clock = Arc::new(ManualClock::new(t0()));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()).failing(&["2"]));
        let c = collector(provider.clone(), clock, &["1", "2", "3"], window(t0(), 100, 100));

        let (records, report) = c.run_pass(t0()).await;
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.failures, 1);
        assert_eq!(report.successes(), 2);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn failures_are_counted_over_the_run() {
        let clock = Arc::new(ManualClock::new(t0()));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()).failing(&["1", "2"]));
        let c = collector(provider, clock, &["1", "2"], window(t0(), 300, 100));

        let (table, summary) = c.run().await;
        assert!(table.is_empty());
        assert_eq!(summary.passes, 3);
        assert_eq!(summary.attempts, 6);
        assert_eq!(summary.failures, 6);
    }

    #[tokio::test]
    async fn stops_after_pass_reaching_max_records() {
        let clock = Arc::new(ManualClock::new(t0()));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()));
        let mut w = window(t0(), 3600, 100);
        w.max_records = 3;
        let c = collector(provider, clock, &["1", "2"], w);

        let (table, summary) = c.run().await;
        assert_eq!(summary.passes, 2);
        assert_eq!(table.len(), 4);
        assert_eq!(summary.termination, Termination::MaxRecords);
    }

    #[tokio::test]
    async fn zero_max_records_issues_no_requests() {
        let clock = Arc::new(ManualClock::new(t0()));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()));
        let mut w = window(t0(), 3600, 100);
        w.max_records = 0;
        let c = collector(provider.clone(), clock, &["1"], w);

        let (_, summary) = c.run().await;
        assert_eq!(summary.passes, 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn overrunning_pass_skips_ticks_instead_of_doubling() {
        let clock = Arc::new(ManualClock::new(t0()));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()).call_cost(Duration::seconds(150)));
        let c = collector(provider.clone(), clock, &["1"], window(t0(), 1000, 100));

        let (table, summary) = c.run().await;
        // Ticks at 0, 200, 400, 600, 800; 100, 300, 500, 700 skipped.
        assert_eq!(summary.passes, 5);
        assert_eq!(summary.skipped_ticks, 4);
        let times: Vec<_> = table.records().iter().map(|r| r.req_time.as_str()).collect();
        assert_eq!(times, ["06:00:00", "06:03:20", "06:06:40", "06:10:00", "06:13:20"]);
    }

    #[tokio::test]
    async fn late_start_joins_on_next_boundary() {
        let clock = Arc::new(ManualClock::new(t0() + Duration::seconds(250)));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()));
        let c = collector(provider, clock, &["1"], window(t0(), 500, 100));

        let (table, summary) = c.run().await;
        assert_eq!(summary.passes, 2);
        assert_eq!(summary.skipped_ticks, 0);
        let times: Vec<_> = table.records().iter().map(|r| r.req_time.as_str()).collect();
        assert_eq!(times, ["06:05:00", "06:06:40"]);
    }

    #[tokio::test]
    async fn start_equals_end_now_writes_header_only_file() {
        use crate::collector::clock::SystemClock;
        use crate::{output, schema};

        let input = "ID,origins,destinations\n1,\"42.35,-71.06\",\"42.36,-71.10\"\n";
        let pairs = schema::read_pairs(input.as_bytes()).unwrap();
        assert_eq!(pairs.len(), 1);

        let now = Utc::now();
        let w = RequestWindow {
            start: now,
            end: now,
            interval_secs: 100,
            max_records: 9_999_999_999,
        };
        let unused_clock = Arc::new(ManualClock::new(now));
        let provider = Arc::new(ScriptedProvider::new(unused_clock));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(output::file_name("TEST", &w.start, &w.end));

        // Run twice: an unchanged input and a closed window give the
        // same header-only file.
        for _ in 0..2 {
            let c = Collector::new(provider.clone(), Arc::new(SystemClock), pairs.clone(), w.clone());
            let (table, summary) = c.run().await;
            assert_eq!(summary.passes, 0);
            table.write_csv(&path).unwrap();
            assert_eq!(
                std::fs::read_to_string(&path).unwrap(),
                "ID,Origins,Destinations,Req_Date,Req_Time,Distance,Duration,TT_Best_Guess\n"
            );
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn huge_interval_runs_one_pass_and_closes() {
        let clock = Arc::new(ManualClock::new(t0()));
        let provider = Arc::new(ScriptedProvider::new(clock.clone()));
        for interval_secs in [10_000_000_000_000, u64::MAX] {
            let c = collector(
                provider.clone(),
                clock.clone(),
                &["1"],
                window(t0(), 365 * 24 * 3600, interval_secs),
            );
            let (table, summary) = c.run().await;
            assert_eq!(summary.passes, 1);
            assert_eq!(summary.termination, Termination::WindowClosed);
            assert_eq!(table.len(), 1);
        }
    }

    #[test]
    fn failure_line_names_pair_and_redacted_url() {
        use crate::config::{ApiConfig, DEFAULT_BASE_URL};
        use crate::provider::google::GoogleDistanceMatrix;

        let _ = rustls::crypto::CryptoProvider::install_default(
            rustls::crypto::ring::default_provider(),
        );
        let api = ApiConfig {
            key: "SECRET".into(),
            base_url: DEFAULT_BASE_URL.into(),
            mode: "driving".into(),
            traffic_model: "best_guess".into(),
            timeout_secs: None,
        };
        let provider = GoogleDistanceMatrix::new(&api, false).unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let c = Collector::new(Arc::new(provider), clock, pairs(&["A7"]), window(t0(), 100, 100));

        let line = c.failure_line(&c.pairs[0], &RequestFailure::HttpStatus(503));
        assert!(line.starts_with("[A7] GET https://maps.googleapis.com/"));
        assert!(line.contains("origins=42.35%2C-71.06"));
        assert!(line.contains("key=REDACTED"));
        assert!(!line.contains("SECRET"));
        assert!(line.ends_with("failed: HTTP status 503"));
    }
}
