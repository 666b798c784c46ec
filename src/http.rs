//! HTTP activity source for the intervals.icu API.
//!
//! - Basic auth with the athlete's API key (`API_KEY:<key>`)
//! - Sliding-window request pacing
//! - Retry with exponential backoff on 429 and transport errors
//! - Blocking [`ActivitySource`] facade over an owned tokio runtime

use base64::Engine;
use chrono::{Duration as DateDuration, Local, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::Mutex;

use crate::error::{IntervalError, Result};
use crate::source::{ActivityMetadata, ActivitySource};

const DEFAULT_BASE_URL: &str = "https://intervals.icu";
/// `0` means "the athlete owning the API key"
const DEFAULT_ATHLETE_ID: &str = "0";

// intervals.icu allows bursts but throttles sustained traffic
const WINDOW_LIMIT: usize = 100;
const WINDOW: Duration = Duration::from_secs(10);

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How far back to look for the most recent activity.
const LATEST_LOOKBACK_DAYS: i64 = 30;

/// Activity entry as returned by `/athlete/{id}/activities`.
#[derive(Debug, Deserialize)]
struct ApiActivity {
    id: String,
    name: Option<String>,
    #[serde(rename = "type")]
    sport_type: Option<String>,
    start_date_local: Option<String>,
    distance: Option<f64>,
    moving_time: Option<u64>,
}

impl From<ApiActivity> for ActivityMetadata {
    fn from(a: ApiActivity) -> Self {
        let start_date = a
            .start_date_local
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok());
        ActivityMetadata {
            id: a.id,
            name: a.name,
            sport_type: a.sport_type,
            start_date,
            distance_meters: a.distance,
            moving_time_seconds: a.moving_time,
        }
    }
}

/// Parse an activity listing body.
fn parse_activities(body: &str) -> Result<Vec<ActivityMetadata>> {
    let activities: Vec<ApiActivity> =
        serde_json::from_str(body).map_err(|e| IntervalError::Http {
            message: format!("Invalid activity listing: {}", e),
            status_code: None,
        })?;
    Ok(activities.into_iter().map(ActivityMetadata::from).collect())
}

/// Most recently started activity; entries without a start date sort first.
fn most_recent(activities: &[ActivityMetadata]) -> Option<&ActivityMetadata> {
    activities.iter().max_by_key(|a| a.start_date)
}

fn http_error(message: impl Into<String>, status: Option<StatusCode>) -> IntervalError {
    IntervalError::Http {
        message: message.into(),
        status_code: status.map(|s| s.as_u16()),
    }
}

/// Sliding-window pacer with escalating 429 backoff.
struct RequestPacer {
    sent: Mutex<VecDeque<Instant>>,
    throttled: AtomicU32,
}

impl RequestPacer {
    fn new() -> Self {
        Self {
            sent: Mutex::new(VecDeque::with_capacity(WINDOW_LIMIT)),
            throttled: AtomicU32::new(0),
        }
    }

    /// Wait until another request fits in the window, then record it.
    async fn acquire(&self) {
        loop {
            let wait = {
                let mut sent = self.sent.lock().await;
                let now = Instant::now();
                while sent.front().is_some_and(|&t| now.duration_since(t) >= WINDOW) {
                    sent.pop_front();
                }
                if sent.len() < WINDOW_LIMIT {
                    sent.push_back(now);
                    None
                } else {
                    sent.front().map(|&oldest| WINDOW.saturating_sub(now.duration_since(oldest)))
                }
            };

            match wait {
                Some(duration) => {
                    debug!("[IntervalsIcu] Pacing: waiting {:?}", duration);
                    tokio::time::sleep(duration).await;
                }
                None => break,
            }
        }
    }

    fn record_success(&self) {
        self.throttled.store(0, Ordering::Relaxed);
    }

    /// Backoff after a 429: 2s, 4s, 8s, 16s, capped.
    fn record_throttled(&self) -> Duration {
        let count = self.throttled.fetch_add(1, Ordering::Relaxed) + 1;
        Duration::from_millis(1000 * (1 << count.min(4)))
    }
}

/// Backoff after a transport error on the given attempt: 1s, 2s, 4s.
fn transport_backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * (1 << attempt.min(4)))
}

/// Async intervals.icu client.
pub struct IntervalsIcuClient {
    client: Client,
    auth_header: String,
    base_url: String,
    athlete_id: String,
    pacer: RequestPacer,
}

impl IntervalsIcuClient {
    /// Create a client for the athlete owning `api_key`.
    pub fn new(api_key: &str) -> Result<Self> {
        let auth = base64::engine::general_purpose::STANDARD.encode(format!("API_KEY:{}", api_key));

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| http_error(format!("Failed to create HTTP client: {}", e), None))?;

        Ok(Self {
            client,
            auth_header: format!("Basic {}", auth),
            base_url: DEFAULT_BASE_URL.to_string(),
            athlete_id: DEFAULT_ATHLETE_ID.to_string(),
            pacer: RequestPacer::new(),
        })
    }

    pub fn with_athlete_id(mut self, athlete_id: impl Into<String>) -> Self {
        self.athlete_id = athlete_id.into();
        self
    }

    /// Point the client at another host (e.g. a local mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn activities_url(&self, oldest: NaiveDate, newest: NaiveDate) -> String {
        format!(
            "{}/api/v1/athlete/{}/activities?oldest={}&newest={}",
            self.base_url,
            self.athlete_id,
            oldest.format("%Y-%m-%d"),
            newest.format("%Y-%m-%d")
        )
    }

    fn file_url(&self, activity_id: &str) -> String {
        format!("{}/api/v1/activity/{}/file", self.base_url, activity_id)
    }

    /// GET with pacing and retries; returns the successful response.
    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut retries = 0;

        loop {
            self.pacer.acquire().await;

            let response = self
                .client
                .get(url)
                .header("Authorization", &self.auth_header)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(http_error("Max retries exceeded (429)", Some(resp.status())));
                    }
                    let backoff = self.pacer.record_throttled();
                    warn!(
                        "[IntervalsIcu] 429 for {}, retry {} after {:?}",
                        url, retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Ok(resp) if !resp.status().is_success() => {
                    let status = resp.status();
                    return Err(http_error(format!("GET {} failed", url), Some(status)));
                }
                Ok(resp) => {
                    self.pacer.record_success();
                    return Ok(resp);
                }
                Err(e) => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(http_error(format!("Request error: {}", e), e.status()));
                    }
                    let backoff = transport_backoff(retries);
                    warn!(
                        "[IntervalsIcu] Error for {}: {}, retry {} after {:?}",
                        url, e, retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// List activities that started between `oldest` and `newest`.
    pub async fn list_activities(
        &self,
        oldest: NaiveDate,
        newest: NaiveDate,
    ) -> Result<Vec<ActivityMetadata>> {
        let url = self.activities_url(oldest, newest);
        let body = self
            .get(&url)
            .await?
            .text()
            .await
            .map_err(|e| http_error(format!("Failed to read body: {}", e), e.status()))?;

        let activities = parse_activities(&body)?;
        info!(
            "[IntervalsIcu] {} activities between {} and {}",
            activities.len(),
            oldest,
            newest
        );
        Ok(activities)
    }

    /// Download the uploaded activity file.
    pub async fn download_file(&self, activity_id: &str) -> Result<Vec<u8>> {
        let start = Instant::now();
        let bytes = self
            .get(&self.file_url(activity_id))
            .await?
            .bytes()
            .await
            .map_err(|e| http_error(format!("Failed to read file: {}", e), e.status()))?;

        info!(
            "[IntervalsIcu] Downloaded {} bytes for activity {} in {:.2}s",
            bytes.len(),
            activity_id,
            start.elapsed().as_secs_f64()
        );
        Ok(bytes.to_vec())
    }

    /// Download the file of the most recent activity in the lookback window.
    pub async fn download_latest(&self) -> Result<Vec<u8>> {
        let newest = Local::now().date_naive();
        let oldest = newest - DateDuration::days(LATEST_LOOKBACK_DAYS);
        let activities = self.list_activities(oldest, newest).await?;

        let latest = most_recent(&activities).ok_or_else(|| {
            http_error(
                format!("No activities in the last {} days", LATEST_LOOKBACK_DAYS),
                None,
            )
        })?;
        self.download_file(&latest.id).await
    }
}

/// Blocking [`ActivitySource`] over [`IntervalsIcuClient`].
///
/// Owns its tokio runtime; do not call from inside another runtime.
pub struct IntervalsIcuSource {
    runtime: Runtime,
    client: IntervalsIcuClient,
}

impl IntervalsIcuSource {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::from_client(IntervalsIcuClient::new(api_key)?)
    }

    pub fn from_client(client: IntervalsIcuClient) -> Result<Self> {
        let runtime = Runtime::new()
            .map_err(|e| http_error(format!("Failed to create tokio runtime: {}", e), None))?;
        Ok(Self { runtime, client })
    }

    pub fn client(&self) -> &IntervalsIcuClient {
        &self.client
    }
}

impl ActivitySource for IntervalsIcuSource {
    fn fetch_latest_activity_binary(&self) -> Result<Vec<u8>> {
        self.runtime.block_on(self.client.download_latest())
    }

    fn fetch_activities_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ActivityMetadata>> {
        self.runtime.block_on(self.client.list_activities(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"[
        {"id": "i1001", "name": "Easy run", "type": "Run",
         "start_date_local": "2024-05-01T07:30:00", "distance": 8000.0, "moving_time": 2700},
        {"id": "i1002", "name": "Track 6x800", "type": "Run",
         "start_date_local": "2024-05-03T18:00:00", "distance": 9500.0, "moving_time": 3100,
         "icu_training_load": 85},
        {"id": "i1003", "name": null, "type": "Ride"}
    ]"#;

    #[test]
    fn test_parse_activities() {
        let activities = parse_activities(LISTING).unwrap();
        assert_eq!(activities.len(), 3);
        assert_eq!(activities[1].name.as_deref(), Some("Track 6x800"));
        assert_eq!(activities[1].sport_type.as_deref(), Some("Run"));
        assert_eq!(activities[1].moving_time_seconds, Some(3100));
        assert!(activities[2].start_date.is_none());
    }

    #[test]
    fn test_most_recent() {
        let activities = parse_activities(LISTING).unwrap();
        assert_eq!(most_recent(&activities).unwrap().id, "i1002");
        assert!(most_recent(&[]).is_none());
    }

    #[test]
    fn test_invalid_listing() {
        assert!(matches!(
            parse_activities("{\"error\": true}"),
            Err(IntervalError::Http { .. })
        ));
    }

    #[test]
    fn test_urls() {
        let client = IntervalsIcuClient::new("secret")
            .unwrap()
            .with_athlete_id("i42")
            .with_base_url("http://localhost:8080/");

        let oldest = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let newest = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        assert_eq!(
            client.activities_url(oldest, newest),
            "http://localhost:8080/api/v1/athlete/i42/activities\
             ?oldest=2024-05-01&newest=2024-05-31"
        );
        assert_eq!(
            client.file_url("i1002"),
            "http://localhost:8080/api/v1/activity/i1002/file"
        );
    }

    #[test]
    fn test_auth_header() {
        let client = IntervalsIcuClient::new("abc").unwrap();
        // base64("API_KEY:abc")
        assert_eq!(client.auth_header, "Basic QVBJX0tFWTphYmM=");
    }

    #[test]
    fn test_backoff_escalates() {
        let pacer = RequestPacer::new();
        assert_eq!(pacer.record_throttled(), Duration::from_secs(2));
        assert_eq!(pacer.record_throttled(), Duration::from_secs(4));
        pacer.record_success();
        assert_eq!(pacer.record_throttled(), Duration::from_secs(2));
        assert_eq!(transport_backoff(1), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_pacer_does_not_wait_under_limit() {
        let pacer = RequestPacer::new();
        let start = Instant::now();
        for _ in 0..10 {
            pacer.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(pacer.sent.lock().await.len(), 10);
    }
}
