//! Multi-service request admission.
//!
//! Each named service carries its own per-second, per-minute, and per-day
//! ceilings. Admission is serialized per service behind an async mutex;
//! different services never contend. The governor never errors — it always
//! eventually admits, waiting out the window that is currently exhausted.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Timelike};
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const PLATFORM_SERVICE: &str = "platform";
pub const LLM_SERVICE: &str = "llm";
pub const SOCIAL_SERVICE: &str = "social";

/// Smallest sleep when a window boundary is exactly on the edge, so the
/// admission loop cannot spin.
const MIN_WAIT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
pub struct ServiceQuota {
    pub requests_per_second: Option<u32>,
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct GovernorStatus {
    pub requests_this_minute: usize,
    pub requests_today: u32,
    pub minute_limit: u32,
    pub daily_limit: u32,
}

#[derive(Debug)]
struct ServiceWindow {
    quota: ServiceQuota,
    times: VecDeque<Instant>,
    daily_count: u32,
    day: NaiveDate,
}

impl ServiceWindow {
    fn new(quota: ServiceQuota) -> Self {
        Self {
            quota,
            times: VecDeque::new(),
            daily_count: 0,
            day: Local::now().date_naive(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.times.front() {
            if now.duration_since(*front) > Duration::from_secs(60) {
                self.times.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time to wait before one more request fits under every window, or
    /// `None` when it can be admitted immediately.
    fn wait_needed(&mut self, now: Instant, local_now: DateTime<Local>) -> Option<Duration> {
        let today = local_now.date_naive();
        if today != self.day {
            self.day = today;
            self.daily_count = 0;
        }
        self.prune(now);

        if self.daily_count >= self.quota.requests_per_day {
            // Day cap exhausted: wait for the next local midnight
            let elapsed_today = u64::from(local_now.time().num_seconds_from_midnight());
            return Some(Duration::from_secs(86_400 - elapsed_today.min(86_399)));
        }

        if self.times.len() >= self.quota.requests_per_minute as usize
            && let Some(oldest) = self.times.front()
        {
            let age = now.duration_since(*oldest);
            return Some(Duration::from_secs(60).saturating_sub(age).max(MIN_WAIT));
        }

        if let Some(per_second) = self.quota.requests_per_second {
            let last_second = self
                .times
                .iter()
                .rev()
                .take_while(|t| now.duration_since(**t) < Duration::from_secs(1))
                .count();
            if last_second >= per_second as usize
                && let Some(last) = self.times.back()
            {
                let since_last = now.duration_since(*last);
                return Some(Duration::from_secs(1).saturating_sub(since_last).max(MIN_WAIT));
            }
        }

        None
    }

    fn record(&mut self, now: Instant) {
        self.times.push_back(now);
        self.daily_count += 1;
    }
}

pub struct RateGovernor {
    services: HashMap<String, Mutex<ServiceWindow>>,
}

impl RateGovernor {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Governor preloaded with the quotas of the three known services.
    pub fn with_defaults() -> Self {
        let mut governor = Self::new();
        governor.register(
            PLATFORM_SERVICE,
            ServiceQuota {
                requests_per_second: Some(2),
                requests_per_minute: 60,
                requests_per_day: 5000,
            },
        );
        governor.register(
            LLM_SERVICE,
            ServiceQuota {
                requests_per_second: None,
                requests_per_minute: 30,
                requests_per_day: 14_400,
            },
        );
        governor.register(
            SOCIAL_SERVICE,
            ServiceQuota {
                requests_per_second: None,
                requests_per_minute: 300,
                requests_per_day: 2000,
            },
        );
        governor
    }

    pub fn register(&mut self, name: &str, quota: ServiceQuota) {
        self.services
            .insert(name.to_string(), Mutex::new(ServiceWindow::new(quota)));
    }

    /// Block until one request can be admitted for `service`. Unregistered
    /// services admit immediately.
    pub async fn admit(&self, service: &str) {
        let Some(window) = self.services.get(service) else {
            return;
        };

        loop {
            let wait = {
                let mut w = window.lock().await;
                w.wait_needed(Instant::now(), Local::now())
            };
            match wait {
                None => return,
                Some(duration) => {
                    tracing::debug!(
                        service,
                        wait_secs = duration.as_secs_f64(),
                        "rate window full; waiting"
                    );
                    tokio::time::sleep(duration).await;
                }
            }
        }
    }

    /// Record one performed request against `service`'s windows.
    pub async fn record(&self, service: &str) {
        if let Some(window) = self.services.get(service) {
            window.lock().await.record(Instant::now());
        }
    }

    pub async fn status(&self, service: &str) -> Option<GovernorStatus> {
        let window = self.services.get(service)?;
        let mut w = window.lock().await;
        w.prune(Instant::now());
        Some(GovernorStatus {
            requests_this_minute: w.times.len(),
            requests_today: w.daily_count,
            minute_limit: w.quota.requests_per_minute,
            daily_limit: w.quota.requests_per_day,
        })
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::with_defaults()
    }
}
