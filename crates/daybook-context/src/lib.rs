//! Environmental context for diary entries.
//!
//! Provides the lookups that enrich an entry at write time:
//! - IP geolocation plus reverse geocoding to a place name
//! - Current-hour temperature and cloud cover for those coordinates
//! - [`EntryBuilder`], which combines both with the day's usage breakdown
//!
//! Every lookup is a single request with an explicit timeout. Failures are
//! returned to the caller as-is; nothing is retried and no placeholder values
//! are substituted.

mod builder;

use std::time::Duration;

use daybook_core::{Coordinates, LOCATION_NOT_FOUND, Location, Weather};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use builder::{BuildError, EntryBuilder};

const GEOIP_SERVICE: &str = "geolocation";
const REVERSE_SERVICE: &str = "reverse geocoding";
const FORECAST_SERVICE: &str = "weather";

/// Enrichment errors.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The service configuration cannot be used.
    #[error("invalid service configuration: {0}")]
    InvalidConfig(&'static str),
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// The request did not complete within the configured timeout.
    #[error("{service} request timed out")]
    Timeout { service: &'static str },
    /// HTTP request failed.
    #[error("{service} request failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The service answered with a non-success status.
    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    /// Failed to parse response.
    #[error("invalid {service} response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

/// Endpoints and limits for the enrichment services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// ipinfo-compatible endpoint answering `{"loc": "lat,lng"}`.
    pub geoip_url: String,
    /// Nominatim-compatible `/reverse` endpoint.
    pub reverse_geocode_url: String,
    /// Open-Meteo-compatible `/v1/forecast` endpoint.
    pub forecast_url: String,
    /// Sent with every request; Nominatim rejects anonymous clients.
    pub user_agent: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            geoip_url: "https://ipinfo.io/json".to_string(),
            reverse_geocode_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            user_agent: concat!("daybook/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
        }
    }
}

/// HTTP client for the location and weather services.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ContextClient {
    http: reqwest::Client,
    config: ServiceConfig,
}

impl ContextClient {
    /// Creates a client for the given services.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is zero or the HTTP client fails to build.
    pub fn new(config: ServiceConfig) -> Result<Self, ContextError> {
        if config.timeout_secs == 0 {
            return Err(ContextError::InvalidConfig("timeout_secs must be positive"));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(ContextError::ClientBuild)?;
        Ok(Self { http, config })
    }

    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Locates this machine by IP and names the place.
    ///
    /// Makes two requests: geolocation, then reverse geocoding at full
    /// coordinate precision.
    pub async fn resolve_location(&self) -> Result<Location, ContextError> {
        let geoip: GeoIpResponse = self
            .get_json(GEOIP_SERVICE, self.http.get(&self.config.geoip_url))
            .await?;
        let coordinates = parse_loc(&geoip.loc)?;
        tracing::debug!(%coordinates, "resolved coordinates");

        let request = self.http.get(&self.config.reverse_geocode_url).query(&[
            ("format", "jsonv2".to_string()),
            ("lat", coordinates.lat.to_string()),
            ("lon", coordinates.lng.to_string()),
        ]);
        let reverse: ReverseResponse = self.get_json(REVERSE_SERVICE, request).await?;
        let name = place_name(reverse);
        tracing::debug!(%name, "resolved place name");

        Ok(Location { coordinates, name })
    }

    /// Fetches the current-hour weather sample for `coordinates`.
    ///
    /// Coordinates are rounded to two decimals; the service picks the timezone.
    pub async fn resolve_weather(&self, coordinates: Coordinates) -> Result<Weather, ContextError> {
        let rounded = coordinates.rounded();
        let request = self.http.get(&self.config.forecast_url).query(&[
            ("latitude", rounded.lat.to_string()),
            ("longitude", rounded.lng.to_string()),
            ("hourly", "temperature_2m,cloud_cover".to_string()),
            ("timezone", "auto".to_string()),
        ]);
        let forecast: ForecastResponse = self.get_json(FORECAST_SERVICE, request).await?;
        let weather = Weather {
            temperature: first_sample(&forecast.hourly.temperature_2m, "temperature_2m")?,
            cloud_cover: first_sample(&forecast.hourly.cloud_cover, "cloud_cover")?,
        };
        tracing::debug!(?weather, "resolved weather");
        Ok(weather)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ContextError> {
        let response = request
            .send()
            .await
            .map_err(|err| transport_error(service, err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| transport_error(service, err))?;
        if !status.is_success() {
            return Err(ContextError::Status {
                service,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|err| ContextError::InvalidResponse {
            service,
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeoIpResponse {
    loc: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: HourlySeries,
}

#[derive(Debug, Deserialize)]
struct HourlySeries {
    temperature_2m: Vec<Option<f64>>,
    cloud_cover: Vec<Option<f64>>,
}

fn transport_error(service: &'static str, source: reqwest::Error) -> ContextError {
    if source.is_timeout() {
        ContextError::Timeout { service }
    } else {
        ContextError::Request { service, source }
    }
}

/// Parses ipinfo's `"lat,lng"` string.
fn parse_loc(loc: &str) -> Result<Coordinates, ContextError> {
    let invalid = || ContextError::InvalidResponse {
        service: GEOIP_SERVICE,
        message: format!("unparseable loc {loc:?}"),
    };
    let (lat, lng) = loc.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid());
    }
    Ok(Coordinates { lat, lng })
}

/// No address at all means the point could not be geocoded; an address
/// without a city yields an empty name.
fn place_name(response: ReverseResponse) -> String {
    match response.address {
        Some(address) => address.city.unwrap_or_default(),
        None => LOCATION_NOT_FOUND.to_string(),
    }
}

fn first_sample(series: &[Option<f64>], name: &str) -> Result<f64, ContextError> {
    series
        .first()
        .copied()
        .flatten()
        .ok_or_else(|| ContextError::InvalidResponse {
            service: FORECAST_SERVICE,
            message: format!("hourly.{name} has no current sample"),
        })
}
