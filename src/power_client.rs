use crate::config::ApiSettings;
use crate::error::{PowerError, Result};
use crate::request::FetchRequest;
use serde_json::Value;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Delay between consecutive POWER requests.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);

const ERROR_BODY_LIMIT: usize = 300;

/// Anything that can answer a [`FetchRequest`] with a raw JSON payload.
pub trait WeatherSource {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Value>;
}

pub struct PowerClient {
    client: reqwest::blocking::Client,
    base_url: String,
    delay: Duration,
}

impl PowerClient {
    pub fn new(settings: &ApiSettings, delay: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            delay,
        })
    }

    fn request(&self, request: &FetchRequest<'_>) -> Result<Value> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&request.query())
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(PowerError::api(status.as_u16(), excerpt(&body)));
        }

        let body = resp.text()?;
        debug!(bytes = body.len(), "Received response body");
        Ok(serde_json::from_str(&body)?)
    }
}

impl WeatherSource for PowerClient {
    /// Issues exactly one request, then waits out the rate-limit delay
    /// whether or not the request succeeded.
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Value> {
        info!(
            site = %request.site.code,
            year = request.year,
            lat = request.site.latitude,
            long = request.site.longitude,
            "Fetching daily data from POWER"
        );

        let result = self.request(request);

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        result
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
