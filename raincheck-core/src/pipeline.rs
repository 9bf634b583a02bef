//! Fetch → classify, with exponential-backoff retries and a synthetic fallback.
//!
//! A run always ends in a [`ForecastResult`]; provider outages only show up as
//! extra latency and a [`ForecastSource::Fallback`] source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::{
    config::{Config, RetryPolicy},
    error::Result,
    fallback,
    forecast::{ForecastClient, OpenMeteoForecast},
    model::{Coordinates, DurationMinutes, ForecastResult, ForecastSource, ForecastWindow},
    risk,
};

/// Time source and timer, injectable so tests can run on virtual time.
#[async_trait]
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// States of a single run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    Fetching { retry: u32 },
    Retrying { retry: u32, delay: Duration },
    Exhausted { attempts: u32 },
    Succeeded(ForecastResult),
}

#[derive(Debug)]
pub struct ForecastPipeline {
    client: Arc<dyn ForecastClient>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    latest_run: AtomicU64,
}

impl ForecastPipeline {
    pub fn new(client: Arc<dyn ForecastClient>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self { client, clock, retry, latest_run: AtomicU64::new(0) }
    }

    /// Pipeline on the Open-Meteo provider and the wall clock.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(Arc::new(OpenMeteoForecast::new(config)?), Arc::new(SystemClock), config.retry))
    }

    /// Drive one run to completion. Never fails.
    ///
    /// Every attempt judges the window starting at its own "now", so a retried
    /// run looks at a window shifted by the time spent waiting.
    pub async fn run(&self, coordinates: Coordinates, duration: DurationMinutes) -> ForecastResult {
        let mut state = PipelineState::Idle;

        loop {
            tracing::trace!(?state, "forecast pipeline step");

            state = match state {
                PipelineState::Idle => PipelineState::Fetching { retry: 0 },
                PipelineState::Fetching { retry } => self.attempt(coordinates, duration, retry).await,
                PipelineState::Retrying { retry, delay } => {
                    self.clock.sleep(delay).await;
                    PipelineState::Fetching { retry: retry + 1 }
                }
                PipelineState::Exhausted { attempts } => {
                    tracing::warn!(%coordinates, attempts, "forecast unavailable, using synthetic estimate");
                    PipelineState::Succeeded(ForecastResult {
                        attempts,
                        ..fallback::estimate(coordinates, duration)
                    })
                }
                PipelineState::Succeeded(result) => {
                    tracing::info!(
                        risk = %result.risk_tier,
                        temperature_c = result.current_temperature_c,
                        source = ?result.source,
                        "forecast ready"
                    );
                    return result;
                }
            };
        }
    }

    async fn attempt(
        &self,
        coordinates: Coordinates,
        duration: DurationMinutes,
        retry: u32,
    ) -> PipelineState {
        let window = ForecastWindow::starting_at(self.clock.now(), duration);
        let attempts = retry + 1;

        match self.client.fetch_forecast(coordinates, window).await {
            Ok(raw) => PipelineState::Succeeded(ForecastResult {
                risk_tier: risk::classify(&raw.hourly, &window),
                current_temperature_c: raw.current_temperature_c,
                source: ForecastSource::Provider,
                attempts,
            }),
            Err(e) if e.is_retryable() && retry < self.retry.max_retries => {
                let delay = self.retry.delay(retry);
                tracing::warn!(attempt = attempts, ?delay, error = %e, "forecast fetch failed, retrying");
                PipelineState::Retrying { retry, delay }
            }
            Err(e) => {
                tracing::warn!(attempt = attempts, error = %e, "forecast fetch failed");
                PipelineState::Exhausted { attempts }
            }
        }
    }

    /// Like [`run`](Self::run), but returns `None` when another run was
    /// submitted on this pipeline before this one finished.
    pub async fn submit(
        &self,
        coordinates: Coordinates,
        duration: DurationMinutes,
    ) -> Option<ForecastResult> {
        let run_id = self.latest_run.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.run(coordinates, duration).await;

        if self.latest_run.load(Ordering::SeqCst) == run_id {
            Some(result)
        } else {
            tracing::debug!(run_id, "discarding result of superseded run");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        model::{HourlySample, RawForecast, RiskTier},
    };
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    #[derive(Debug)]
    struct FakeClock {
        now: Mutex<DateTime<Utc>>,
        slept: Mutex<Vec<Duration>>,
    }

    impl FakeClock {
        fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self { now: Mutex::new(now), slept: Mutex::new(Vec::new()) })
        }

        fn slept(&self) -> Vec<Duration> {
            self.slept.lock().clone()
        }
    }

    #[async_trait]
    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock()
        }

        async fn sleep(&self, duration: Duration) {
            self.slept.lock().push(duration);
            let mut now = self.now.lock();
            *now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        }
    }

    /// Plays back scripted outcomes; `None` is a transport failure. Once the
    /// script runs out every call fails.
    #[derive(Debug, Default)]
    struct ScriptedClient {
        script: Mutex<VecDeque<Option<RawForecast>>>,
        windows: Mutex<Vec<ForecastWindow>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Option<RawForecast>>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(script.into()), ..Default::default() })
        }

        fn calls(&self) -> usize {
            self.windows.lock().len()
        }
    }

    #[async_trait]
    impl ForecastClient for ScriptedClient {
        async fn fetch_forecast(
            &self,
            _coordinates: Coordinates,
            window: ForecastWindow,
        ) -> Result<RawForecast> {
            self.windows.lock().push(window);
            let next = self.script.lock().pop_front().flatten();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            next.ok_or_else(|| Error::transport("forecast", "connection reset"))
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn paris() -> Coordinates {
        Coordinates::new(48.8566, 2.3522)
    }

    fn minutes(m: u32) -> DurationMinutes {
        DurationMinutes::new(m).unwrap()
    }

    fn rainy(probability: u8) -> RawForecast {
        let hourly = (0..24)
            .map(|h| HourlySample {
                timestamp: noon() + chrono::Duration::hours(h - 12),
                precipitation_probability: probability,
            })
            .collect();
        RawForecast { hourly, current_temperature_c: 16 }
    }

    fn pipeline(client: Arc<ScriptedClient>, clock: Arc<FakeClock>) -> ForecastPipeline {
        ForecastPipeline::new(client, clock, RetryPolicy::default())
    }

    #[tokio::test]
    async fn total_outage_degrades_to_fallback_after_three_retries() {
        let client = ScriptedClient::new(vec![]);
        let clock = FakeClock::starting_at(noon());
        let result = pipeline(client.clone(), clock.clone()).run(paris(), minutes(30)).await;

        let expected = fallback::estimate(paris(), minutes(30));
        assert_eq!(result.source, ForecastSource::Fallback);
        assert_eq!(result.risk_tier, expected.risk_tier);
        assert_eq!(result.current_temperature_c, expected.current_temperature_c);
        assert_eq!(result.attempts, 4);

        assert_eq!(client.calls(), 4);
        assert_eq!(
            clock.slept(),
            [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert_eq!(clock.slept().iter().sum::<Duration>(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn success_on_second_attempt_uses_provider_data() {
        let client = ScriptedClient::new(vec![None, Some(rainy(45))]);
        let clock = FakeClock::starting_at(noon());
        let result = pipeline(client.clone(), clock.clone()).run(paris(), minutes(60)).await;

        assert_eq!(result.source, ForecastSource::Provider);
        assert_eq!(result.risk_tier, RiskTier::Medium);
        assert_eq!(result.current_temperature_c, 16);
        assert_eq!(result.attempts, 2);
        assert_eq!(clock.slept(), [Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn window_slides_with_each_retry() {
        let client = ScriptedClient::new(vec![None, None, Some(rainy(0))]);
        let clock = FakeClock::starting_at(noon());
        pipeline(client.clone(), clock).run(paris(), minutes(20)).await;

        let starts: Vec<_> = client.windows.lock().iter().map(|w| w.start).collect();
        assert_eq!(
            starts,
            [noon(), noon() + chrono::Duration::seconds(1), noon() + chrono::Duration::seconds(3)]
        );
    }

    #[tokio::test]
    async fn immediate_success_never_sleeps() {
        let client = ScriptedClient::new(vec![Some(rainy(10))]);
        let clock = FakeClock::starting_at(noon());
        let result = pipeline(client, clock.clone()).run(paris(), minutes(10)).await;

        assert_eq!(result.risk_tier, RiskTier::Low);
        assert_eq!(result.attempts, 1);
        assert!(clock.slept().is_empty());
    }

    #[tokio::test]
    async fn paris_hour_of_heavy_rain_is_high_risk() {
        let client = ScriptedClient::new(vec![Some(rainy(75))]);
        let clock = FakeClock::starting_at(noon());
        let result = pipeline(client, clock).run(paris(), minutes(60)).await;

        assert_eq!(result.risk_tier, RiskTier::High);
        assert_eq!(result.source, ForecastSource::Provider);
    }

    #[tokio::test]
    async fn retry_count_follows_policy() {
        let client = ScriptedClient::new(vec![]);
        let clock = FakeClock::starting_at(noon());
        let policy = RetryPolicy { max_retries: 1, base_delay_ms: 250 };
        let result = ForecastPipeline::new(client.clone(), clock.clone(), policy)
            .run(paris(), minutes(45))
            .await;

        assert_eq!(result.source, ForecastSource::Fallback);
        assert_eq!(client.calls(), 2);
        assert_eq!(clock.slept(), [Duration::from_millis(250)]);
    }

    #[tokio::test(start_paused = true)]
    async fn system_clock_waits_on_tokio_time() {
        let client = ScriptedClient::new(vec![]);
        let pipeline = ForecastPipeline::new(client, Arc::new(SystemClock), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let result = pipeline.run(paris(), minutes(30)).await;

        assert_eq!(result.source, ForecastSource::Fallback);
        assert!(started.elapsed() >= Duration::from_secs(7));
    }

    /// Poll `run` until it parks on the client's gate.
    async fn park<F: std::future::Future + Unpin>(run: &mut F) {
        tokio::select! {
            biased;
            _ = run => unreachable!("run finished before the gate opened"),
            _ = tokio::task::yield_now() => {}
        }
    }

    #[tokio::test]
    async fn superseded_run_is_discarded() {
        let gate = Arc::new(Notify::new());
        let client = Arc::new(ScriptedClient {
            script: Mutex::new(vec![Some(rainy(90)), Some(rainy(5))].into()),
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let pipeline = pipeline(client, FakeClock::starting_at(noon()));

        let first = pipeline.submit(paris(), minutes(30));
        tokio::pin!(first);
        park(&mut first).await;

        let second = pipeline.submit(paris(), minutes(30));
        tokio::pin!(second);
        park(&mut second).await;

        gate.notify_waiters();

        let fresh = second.await;
        let stale = first.await;

        assert_eq!(fresh.map(|r| r.risk_tier), Some(RiskTier::Low));
        assert_eq!(stale, None);
    }

    #[tokio::test]
    async fn lone_submit_is_kept() {
        let client = ScriptedClient::new(vec![Some(rainy(35))]);
        let pipeline = pipeline(client, FakeClock::starting_at(noon()));

        let result = pipeline.submit(paris(), minutes(30)).await;
        assert_eq!(result.map(|r| r.risk_tier), Some(RiskTier::Medium));
    }

    #[tokio::test]
    async fn end_to_end_against_mock_provider() {
        use chrono::{DurationRound, Timelike};
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        let first_hour = Utc::now().duration_trunc(chrono::Duration::hours(1)).expect("truncate")
            - chrono::Duration::hours(24);
        let times: Vec<String> = (0..72)
            .map(|h| (first_hour + chrono::Duration::hours(h)).format("%Y-%m-%dT%H:%M").to_string())
            .collect();
        assert_eq!(first_hour.minute(), 0);

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "utc_offset_seconds": 0,
                "current_weather": {"temperature": 14.2},
                "hourly": {
                    "time": times,
                    "precipitation_probability": vec![75; 72]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config::default().with_base_url(&server.uri());
        let pipeline = ForecastPipeline::from_config(&config).expect("pipeline");
        let result = pipeline.run(Coordinates::new(48.8566, 2.3522), minutes(60)).await;

        assert_eq!(result.risk_tier, RiskTier::High);
        assert_eq!(result.current_temperature_c, 14);
        assert_eq!(result.source, ForecastSource::Provider);
    }
}
