//! Place names for notifications
//!
//! A snapshot inside a TeslaMate geofence is named after the geofence.
//! Otherwise its coordinates are reverse-geocoded through a [`PlaceLookup`]
//! and the result is shortened for display.

use crate::config::GeocoderConfig;
use crate::error::{Result, TeslagramError};
use crate::logging::get_logger;
use crate::vehicle::VehicleSnapshot;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Longest place name shown in a notification, in characters
pub const MAX_PLACE_LEN: usize = 20;

/// Shown when no name can be determined
pub const UNKNOWN_PLACE: &str = "?";

/// Reverse-geocoding result
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Place {
    /// Short name of the feature (e.g. a street or a POI)
    #[serde(default)]
    pub name: String,
    /// Full comma-separated address
    #[serde(default)]
    pub display_name: String,
}

/// Reverse-geocoding capability
#[async_trait::async_trait]
pub trait PlaceLookup: Send + Sync {
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<Place>;
}

/// Shorten `s` to fewer than `limit` characters, preferring to cut at a comma.
///
/// Strings shorter than `limit` are returned unchanged. Otherwise the first
/// `limit` characters are kept and, if they contain a comma, everything from
/// the last comma on is dropped.
pub fn truncate(s: &str, limit: usize) -> &str {
    if s.chars().count() < limit {
        return s;
    }
    let end = s.char_indices().nth(limit).map_or(s.len(), |(i, _)| i);
    let head = &s[..end];
    match head.rfind(',') {
        Some(comma) => &head[..comma],
        None => head,
    }
}

/// Resolves a display name for a snapshot's location
#[derive(Clone)]
pub struct PlaceResolver {
    lookup: Arc<dyn PlaceLookup>,
    logger: crate::logging::StructuredLogger,
}

impl PlaceResolver {
    pub fn new(lookup: Arc<dyn PlaceLookup>) -> Self {
        Self {
            lookup,
            logger: get_logger("places"),
        }
    }

    /// Geofence label, else the shortened lookup result, else `"?"`
    pub async fn resolve(&self, snapshot: &VehicleSnapshot) -> String {
        if !snapshot.geofence.is_empty() {
            return snapshot.geofence.clone();
        }

        match self.lookup.lookup(snapshot.latitude, snapshot.longitude).await {
            Ok(place) => {
                let name = if place.name.is_empty() {
                    place.display_name.as_str()
                } else {
                    place.name.as_str()
                };
                if name.is_empty() {
                    UNKNOWN_PLACE.to_string()
                } else {
                    truncate(name, MAX_PLACE_LEN).to_string()
                }
            }
            Err(e) => {
                self.logger.debug(&format!(
                    "Lookup for {:.5},{:.5} failed: {}",
                    snapshot.latitude, snapshot.longitude, e
                ));
                UNKNOWN_PLACE.to_string()
            }
        }
    }
}

/// Nominatim reverse-geocoding client
pub struct NominatimClient {
    http: reqwest::Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Decode a `format=jsonv2` reverse response
    pub fn parse_response(body: &str) -> Result<Place> {
        serde_json::from_str(body).map_err(|e| TeslagramError::geocoding(e.to_string()))
    }
}

#[async_trait::async_trait]
impl PlaceLookup for NominatimClient {
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<Place> {
        let resp = self
            .http
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("format", "jsonv2".to_string()),
                ("addressdetails", "0".to_string()),
            ])
            .send()
            .await
            .map_err(|e| TeslagramError::geocoding(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TeslagramError::geocoding(format!(
                "Nominatim returned {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| TeslagramError::geocoding(e.to_string()))?;
        Self::parse_response(&body)
    }
}
