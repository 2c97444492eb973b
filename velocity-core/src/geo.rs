//! Great-circle distance and nearest-server selection

use serde::{Deserialize, Serialize};

use crate::types::{CandidateServer, Geolocation};

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two points given in degrees
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// The catalog entry chosen for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedServer {
    pub server: CandidateServer,
    pub distance_km: f64,
}

/// Pick the candidate closest to `location`
///
/// Ties keep the first minimum in catalog order. Returns `None` for an empty
/// catalog.
pub fn select_nearest(catalog: &[CandidateServer], location: &Geolocation) -> Option<SelectedServer> {
    let mut best: Option<SelectedServer> = None;

    for server in catalog {
        let distance_km = haversine_km(location.lat, location.lon, server.lat, server.lon);
        let closer = best
            .as_ref()
            .map_or(true, |current| distance_km < current.distance_km);
        if closer {
            best = Some(SelectedServer {
                server: server.clone(),
                distance_km,
            });
        }
    }

    best
}
