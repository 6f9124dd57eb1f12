use super::{parse_series, ApiSeries, MonitoringSource, SourceError};
use crate::detect::MonitoringWindow;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Url};
use std::time::{Duration, Instant};
use tracing::debug;

/// Monitoring source backed by the gateway's REST API.
pub struct HttpSource {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpSource {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;
        // Validate once so every request URL builds.
        Url::parse(base_url).map_err(|e| SourceError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// Request URL for `window` covering `[end - span, end]`.
    pub fn request_url(&self, window: MonitoringWindow, end: DateTime<Utc>) -> Result<Url, SourceError> {
        let start = end - window.span();
        let path = match window {
            MonitoringWindow::Interval8h => "/traffic/monitoring",
            MonitoringWindow::Hourly48h => "/traffic/monitoring/hourly",
        };

        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| SourceError::InvalidUrl(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("start", &start.to_rfc3339_opts(SecondsFormat::Secs, false));
            query.append_pair("end", &end.to_rfc3339_opts(SecondsFormat::Secs, false));
            if window == MonitoringWindow::Hourly48h {
                query.append_pair("avg", "7day");
            }
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl MonitoringSource for HttpSource {
    async fn fetch(&self, window: MonitoringWindow, end: DateTime<Utc>) -> Result<Vec<ApiSeries>, SourceError> {
        let url = self.request_url(window, end)?;

        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let started = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(
            %window,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "monitoring fetch finished"
        );

        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        parse_series(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source() -> HttpSource {
        HttpSource::new("https://gateway.example.com/api/", None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_interval_url() {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let url = source().request_url(MonitoringWindow::Interval8h, end).unwrap();
        assert_eq!(url.path(), "/api/traffic/monitoring");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("start".to_string(), "2024-05-01T04:00:00+00:00".to_string()),
                ("end".to_string(), "2024-05-01T12:00:00+00:00".to_string()),
            ]
        );
    }

    #[test]
    fn test_hourly_url_requests_weekly_average() {
        let end = Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap();
        let url = source().request_url(MonitoringWindow::Hourly48h, end).unwrap();
        assert_eq!(url.path(), "/api/traffic/monitoring/hourly");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0].1, "2024-05-01T00:00:00+00:00");
        assert_eq!(pairs[2], ("avg".to_string(), "7day".to_string()));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpSource::new("not a url", None, Duration::from_secs(1));
        assert!(matches!(result, Err(SourceError::InvalidUrl(_))));
    }
}
