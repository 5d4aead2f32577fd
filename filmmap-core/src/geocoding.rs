use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

const ARCGIS_URL: &str =
    "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer/findAddressCandidates";
const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Nominatim usage policy: at most one request per second
const NOMINATIM_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// A resolved point on the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request timed out")]
    Timeout,
    #[error("failed to send geocoding request: {0}")]
    Request(#[source] reqwest::Error),
    #[error("geocoding API returned status: {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to parse geocoding response: {0}")]
    Response(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GeocodeError::Timeout
        } else if e.is_decode() {
            GeocodeError::Response(e.to_string())
        } else {
            GeocodeError::Request(e)
        }
    }
}

/// Forward geocoding of a free-text address
pub trait Geocoder {
    /// Returns `Ok(None)` when the provider has no match for the address
    fn geocode(&mut self, address: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

/// Geocoding service to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    ArcGis,
    Nominatim,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arcgis" => Ok(Provider::ArcGis),
            "nominatim" | "osm" => Ok(Provider::Nominatim),
            other => Err(format!(
                "unknown geocoder '{}', expected 'arcgis' or 'nominatim'",
                other
            )),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::ArcGis => write!(f, "arcgis"),
            Provider::Nominatim => write!(f, "nominatim"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub provider: Provider,
    /// Per-request timeout enforced by the HTTP client
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            timeout: Duration::from_secs(10),
            user_agent: format!(
                "filmmap/{} (https://github.com/h4x0r/filmmap)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

/// Geocoder backed by a public HTTP geocoding API
pub struct HttpGeocoder {
    provider: Provider,
    client: reqwest::blocking::Client,
    last_request: Option<Instant>,
}

impl HttpGeocoder {
    pub fn new(config: GeocoderConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            provider: config.provider,
            client,
            last_request: None,
        })
    }

    fn throttle(&mut self) {
        if self.provider == Provider::Nominatim {
            if let Some(last) = self.last_request {
                let elapsed = last.elapsed();
                if elapsed < NOMINATIM_MIN_INTERVAL {
                    log::debug!("Rate limiting geocoding request");
                    std::thread::sleep(NOMINATIM_MIN_INTERVAL - elapsed);
                }
            }
        }
        self.last_request = Some(Instant::now());
    }

    fn query_arcgis(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let response = self
            .client
            .get(ARCGIS_URL)
            .query(&[("SingleLine", address), ("f", "json"), ("maxLocations", "1")])
            .send()?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status()));
        }

        let data: ArcGisResponse = response.json()?;
        data.into_coordinates()
    }

    fn query_nominatim(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let response = self
            .client
            .get(NOMINATIM_URL)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status()));
        }

        let places: Vec<NominatimPlace> = response.json()?;
        places
            .into_iter()
            .next()
            .map(NominatimPlace::into_coordinates)
            .transpose()
    }
}

impl Geocoder for HttpGeocoder {
    fn geocode(&mut self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        self.throttle();
        log::debug!("Geocoding {:?} via {}", address, self.provider);

        match self.provider {
            Provider::ArcGis => self.query_arcgis(address),
            Provider::Nominatim => self.query_nominatim(address),
        }
    }
}

/// ArcGIS findAddressCandidates response
#[derive(Debug, Deserialize)]
struct ArcGisResponse {
    #[serde(default)]
    candidates: Vec<ArcGisCandidate>,
    error: Option<ArcGisFault>,
}

#[derive(Debug, Deserialize)]
struct ArcGisCandidate {
    location: ArcGisPoint,
}

#[derive(Debug, Deserialize)]
struct ArcGisPoint {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ArcGisFault {
    code: i64,
    message: String,
}

impl ArcGisResponse {
    fn into_coordinates(self) -> Result<Option<Coordinates>, GeocodeError> {
        // ArcGIS reports service faults in the body of a 200 response
        if let Some(fault) = self.error {
            return Err(GeocodeError::Response(format!(
                "ArcGIS error {}: {}",
                fault.code, fault.message
            )));
        }

        Ok(self
            .candidates
            .into_iter()
            .next()
            .map(|c| Coordinates::new(c.location.y, c.location.x)))
    }
}

/// Nominatim search result; coordinates arrive as decimal strings
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimPlace {
    fn into_coordinates(self) -> Result<Coordinates, GeocodeError> {
        let parse = |value: &str| {
            value
                .parse::<f64>()
                .map_err(|_| GeocodeError::Response(format!("invalid coordinate {:?}", value)))
        };
        Ok(Coordinates::new(parse(&self.lat)?, parse(&self.lon)?))
    }
}
