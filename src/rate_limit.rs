use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::WeatherError;

/// Bucket shared by every client whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Sliding-window request counter keyed by client identity.
///
/// Each client keeps the timestamps of its admitted requests. A request is
/// admitted only while fewer than `max_requests` timestamps fall inside the
/// trailing window; rejected requests are not recorded.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    max_requests: usize,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_duration: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window_duration,
        }
    }

    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub fn check(&self, key: &str) -> bool {
        let mut requests = self.requests.lock();
        // Read the clock under the lock so each window stays in push order
        let now = Instant::now();
        self.admit(&mut requests, key, now)
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut requests = self.requests.lock();
        self.admit(&mut requests, key, now)
    }

    fn admit(
        &self,
        requests: &mut HashMap<String, VecDeque<Instant>>,
        key: &str,
        now: Instant,
    ) -> bool {
        let window = requests.entry(key.to_string()).or_default();

        trim(window, now, self.window_duration);

        if window.len() >= self.max_requests {
            return false;
        }

        window.push_back(now);
        true
    }

    pub fn remaining(&self, key: &str) -> usize {
        let mut requests = self.requests.lock();
        let now = Instant::now();

        let used = match requests.get_mut(key) {
            Some(window) => {
                trim(window, now, self.window_duration);
                window.len()
            }
            None => 0,
        };

        self.max_requests.saturating_sub(used)
    }

    /// Drops clients with no requests left in the window. Returns how many
    /// were evicted.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut requests = self.requests.lock();
        let before = requests.len();

        requests.retain(|_, window| {
            trim(window, now, self.window_duration);
            !window.is_empty()
        });

        before - requests.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.lock().len()
    }
}

// Timestamps older than `now - window` fall out
fn trim(window: &mut VecDeque<Instant>, now: Instant, window_duration: Duration) {
    while let Some(oldest) = window.front() {
        if now.duration_since(*oldest) > window_duration {
            window.pop_front();
        } else {
            break;
        }
    }
}

pub fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Gate placed in front of the API routes.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);

    if !limiter.check(&client) {
        tracing::warn!("Rate limit exceeded for client: {}", client);
        return WeatherError::RateLimitExceeded.into_response();
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        "x-ratelimit-remaining",
        HeaderValue::from(limiter.remaining(&client)),
    );
    response
}
