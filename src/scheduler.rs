// src/scheduler.rs
//! Periodic searches: a fixed interval plus one daily run at the configured time

use crate::runner::SearchRunner;
use chrono::{Local, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Scheduled searches only look at the last day
pub const SCHEDULED_RECENCY_DAYS: u32 = 1;

/// Shortest interval the loop accepts
const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on one daily-loop sleep, so time changes are picked up
const RECHECK_PERIOD: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

pub struct Scheduler {
    runner: Arc<SearchRunner>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(runner: Arc<SearchRunner>, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(
                "Search interval {:?} is below {:?}, using the minimum",
                interval, MIN_INTERVAL
            );
        }
        Self {
            runner,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Run both loops forever
    pub async fn run(self) {
        info!(
            "Scheduler started: every {:?} and daily at the configured execution time",
            self.interval
        );

        tokio::join!(
            interval_loop(Arc::clone(&self.runner), self.interval),
            daily_loop(Arc::clone(&self.runner)),
        );
    }
}

async fn interval_loop(runner: Arc<SearchRunner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        run_timed(&runner, period, "interval").await;
    }
}

async fn daily_loop(runner: Arc<SearchRunner>) {
    let mut last_run: Option<NaiveDateTime> = None;

    loop {
        let config = runner.config_store().load().await;
        let at = match config.execution_time() {
            Ok(at) => at,
            Err(e) => {
                warn!("Invalid execution time '{}': {:#}", config.execution_time, e);
                tokio::time::sleep(RECHECK_PERIOD).await;
                continue;
            }
        };

        let now = Local::now().naive_local();
        let wait = duration_until(now, at);
        if wait > RECHECK_PERIOD {
            tokio::time::sleep(RECHECK_PERIOD).await;
            continue;
        }

        tokio::time::sleep(wait).await;
        let due = Local::now().naive_local();
        if last_run.is_some_and(|last| due - last < chrono::Duration::minutes(1)) {
            continue;
        }

        last_run = Some(due);
        run_timed(&runner, DAY, "daily").await;
    }
}

async fn run_timed(runner: &SearchRunner, period: Duration, trigger: &str) {
    let started = Instant::now();
    info!("Starting {} search", trigger);

    if let Err(e) = runner.run_search(SCHEDULED_RECENCY_DAYS).await {
        error!("{} search failed: {:#}", trigger, e);
    }

    let elapsed = started.elapsed();
    if exceeds_period(elapsed, period) {
        warn!(
            "{} search took {:?}, longer than its {:?} period",
            trigger, elapsed, period
        );
    }
}

/// Time from `now` until the next occurrence of `at`; a time equal to `now` is tomorrow's
pub fn duration_until(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today = now.date().and_time(at);
    let target = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };

    (target - now).to_std().unwrap_or(Duration::ZERO)
}

pub fn exceeds_period(elapsed: Duration, period: Duration) -> bool {
    elapsed > period
}
