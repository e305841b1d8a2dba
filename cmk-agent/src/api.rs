//! Sensor REST API client
//!
//! Lists are fetched page by page through a [`PageSource`]. The next page
//! starts after the serial of the last item of the previous one.

use std::collections::HashSet;
use std::time::Duration;

use cmk_error::{CheckmkError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Fetches one page of a list endpoint
#[cfg_attr(test, mockall::automock)]
pub trait PageSource {
    /// Items of the page at `path` that follows the item `starting_after`
    fn fetch_page(
        &self,
        path: &str,
        per_page: usize,
        starting_after: Option<String>,
    ) -> Result<Vec<Value>>;
}

/// Page size and the cap on the number of pages per list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub page_size: usize,
    pub max_pages: usize,
}

impl PageLimits {
    pub fn new(page_size: usize, max_pages: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(CheckmkError::invalid_params("page_size", "must be at least 1"));
        }
        if max_pages == 0 {
            return Err(CheckmkError::invalid_params("max_pages", "must be at least 1"));
        }
        Ok(Self {
            page_size,
            max_pages,
        })
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 50,
        }
    }
}

fn serial_cursor(item: &Value) -> Option<String> {
    item.get("serial")?.as_str().map(str::to_string)
}

/// Collect all items of `path`
///
/// Stops on a short or empty page, on a page whose cursor was already seen,
/// and after `max_pages` pages. Hitting the cap is logged; the items read so
/// far are returned.
pub fn paginate<S: PageSource + ?Sized>(
    source: &S,
    path: &str,
    limits: PageLimits,
) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen = HashSet::new();

    for page in 1..=limits.max_pages {
        let batch = source.fetch_page(path, limits.page_size, cursor.clone())?;
        let count = batch.len();
        debug!("{} page {}: {} items", path, page, count);

        let next = batch.last().and_then(serial_cursor);
        items.extend(batch);

        if count < limits.page_size {
            return Ok(items);
        }
        match next {
            None => {
                warn!("{}: last item of page {} has no serial, stopping", path, page);
                return Ok(items);
            }
            Some(next) if !seen.insert(next.clone()) => {
                warn!("{}: cursor '{}' repeated on page {}, stopping", path, next, page);
                return Ok(items);
            }
            Some(next) => cursor = Some(next),
        }
    }

    warn!(
        "{}: stopped after {} pages of {} items, results may be incomplete",
        path, limits.max_pages, limits.page_size
    );
    Ok(items)
}

/// A sensor device of the organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub serial: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
}

impl Device {
    /// Host name for piggyback output: the device name, or its serial
    pub fn host_name(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.serial,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One metric as reported by the API
///
/// The value sits in an object named after the metric, e.g.
/// `{"metric": "temperature", "temperature": {"celsius": 21.5}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub metric: String,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

/// Latest readings of one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReadings {
    pub serial: String,
    #[serde(default)]
    pub network: Option<NetworkRef>,
    #[serde(default)]
    pub readings: Vec<RawReading>,
}

fn decode_items<T: serde::de::DeserializeOwned>(path: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("{}: skipping malformed item: {}", path, e);
                None
            }
        })
        .collect()
}

/// Endpoints of one organization
pub struct SensorApi<S> {
    source: S,
    org_id: String,
    limits: PageLimits,
}

impl<S: PageSource> SensorApi<S> {
    pub fn new(source: S, org_id: impl Into<String>, limits: PageLimits) -> Self {
        Self {
            source,
            org_id: org_id.into(),
            limits,
        }
    }

    pub fn devices(&self) -> Result<Vec<Device>> {
        let path = format!("organizations/{}/devices", self.org_id);
        let items = paginate(&self.source, &path, self.limits)?;
        Ok(decode_items(&path, items))
    }

    pub fn latest_readings(&self) -> Result<Vec<DeviceReadings>> {
        let path = format!("organizations/{}/sensor/readings/latest", self.org_id);
        let items = paginate(&self.source, &path, self.limits)?;
        Ok(decode_items(&path, items))
    }
}

/// [`PageSource`] over HTTPS with bearer token authentication
pub struct HttpPageSource {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl HttpPageSource {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        verify_certs: bool,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_certs)
            .build()
            .map_err(|e| CheckmkError::ApiRequest(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl PageSource for HttpPageSource {
    fn fetch_page(
        &self,
        path: &str,
        per_page: usize,
        starting_after: Option<String>,
    ) -> Result<Vec<Value>> {
        let url = self.url(path);
        let mut query = vec![("perPage", per_page.to_string())];
        if let Some(after) = starting_after {
            query.push(("startingAfter", after));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .map_err(|e| CheckmkError::ApiRequest(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CheckmkError::ApiStatus {
                status: status.as_u16(),
                url,
            });
        }

        match response
            .json::<Value>()
            .map_err(|e| CheckmkError::ApiResponse(format!("{url}: {e}")))?
        {
            Value::Array(items) => Ok(items),
            _ => Err(CheckmkError::ApiResponse(format!(
                "{url}: expected a JSON array"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;
    use serde_json::json;

    fn page(serials: &[&str]) -> Vec<Value> {
        serials.iter().map(|s| json!({"serial": s})).collect()
    }

    #[test]
    fn test_limits_reject_zero() {
        assert!(PageLimits::new(0, 5).is_err());
        assert!(PageLimits::new(5, 0).is_err());
        assert_eq!(PageLimits::new(10, 3).unwrap().page_size, 10);
    }

    #[test]
    fn test_paginate_follows_cursor_until_short_page() {
        let mut source = MockPageSource::new();
        source
            .expect_fetch_page()
            .with(eq("devs"), eq(2), eq(None::<String>))
            .times(1)
            .returning(|_, _, _| Ok(page(&["A", "B"])));
        source
            .expect_fetch_page()
            .with(eq("devs"), eq(2), eq(Some("B".to_string())))
            .times(1)
            .returning(|_, _, _| Ok(page(&["C"])));

        let items = paginate(&source, "devs", PageLimits::new(2, 10).unwrap()).unwrap();
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_paginate_caps_pages() {
        let mut source = MockPageSource::new();
        let mut n = 0;
        source.expect_fetch_page().times(3).returning(move |_, _, _| {
            n += 1;
            Ok(vec![json!({"serial": format!("S{n}")})])
        });

        let items = paginate(&source, "devs", PageLimits::new(1, 3).unwrap()).unwrap();
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_paginate_stops_on_repeated_cursor() {
        let mut source = MockPageSource::new();
        source
            .expect_fetch_page()
            .times(2)
            .returning(|_, _, _| Ok(page(&["X"])));

        let items = paginate(&source, "devs", PageLimits::new(1, 50).unwrap()).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_paginate_stops_on_empty_page() {
        let mut source = MockPageSource::new();
        source
            .expect_fetch_page()
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        assert!(paginate(&source, "devs", PageLimits::default()).unwrap().is_empty());
    }

    #[test]
    fn test_paginate_propagates_errors() {
        let mut source = MockPageSource::new();
        source.expect_fetch_page().returning(|_, _, _| {
            Err(CheckmkError::ApiStatus {
                status: 401,
                url: "https://api/devs".into(),
            })
        });
        let err = paginate(&source, "devs", PageLimits::default()).unwrap_err();
        assert!(matches!(err, CheckmkError::ApiStatus { status: 401, .. }));
    }

    #[test]
    fn test_api_decodes_and_skips_malformed() {
        let mut source = MockPageSource::new();
        source
            .expect_fetch_page()
            .with(eq("organizations/42/devices"), always(), always())
            .returning(|_, _, _| {
                Ok(vec![
                    json!({"serial": "Q2-1", "name": "Rack", "networkId": "N_1", "model": "MT10"}),
                    json!({"name": "no serial"}),
                ])
            });
        let api = SensorApi::new(source, "42", PageLimits::default());
        let devices = api.devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].network_id.as_deref(), Some("N_1"));
        assert_eq!(devices[0].host_name(), "Rack");
    }

    #[test]
    fn test_raw_reading_keeps_metric_fields() {
        let raw: DeviceReadings = serde_json::from_value(json!({
            "serial": "Q2-1",
            "network": {"id": "N_1", "name": "Office"},
            "readings": [
                {"ts": "2024-05-01T10:00:00Z", "metric": "temperature",
                 "temperature": {"fahrenheit": 70.7, "celsius": 21.5}}
            ]
        }))
        .unwrap();
        let reading = &raw.readings[0];
        assert_eq!(reading.metric, "temperature");
        assert_eq!(reading.fields["temperature"]["celsius"], json!(21.5));
    }

    #[test]
    fn test_http_url_join() {
        let source = HttpPageSource::new(
            "https://api.example.com/v1/",
            "key",
            Duration::from_secs(5),
            true,
        )
        .unwrap();
        assert_eq!(
            source.url("/organizations/1/devices"),
            "https://api.example.com/v1/organizations/1/devices"
        );
    }
}
