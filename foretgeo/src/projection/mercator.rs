//! Projection Web Mercator (EPSG:3857)
//!
//! Aussi connu sous le nom de Pseudo-Mercator ou Spherical Mercator.
//! Utilisé par les serveurs WMS pour les requêtes GetFeatureInfo.

use std::f64::consts::PI;

use crate::ForetError;

/// Demi-circonférence de la sphère Web Mercator (π × 6378137 m)
pub const HALF_EXTENT: f64 = 20_037_508.34;

/// Latitude maximale représentable (les pôles sont exclus)
pub const MAX_LATITUDE: f64 = 85.05113;

/// Convertit lon/lat (degrés WGS84) vers Web Mercator (mètres)
pub fn lnglat_to_web_mercator(lng: f64, lat: f64) -> Result<(f64, f64), ForetError> {
    if !lng.is_finite() || !lat.is_finite() || lat.abs() >= MAX_LATITUDE {
        return Err(ForetError::OutOfDomain { lng, lat });
    }

    // X = lng × R·π/180
    let x = lng * HALF_EXTENT / 180.0;

    // Y = ln(tan(π/4 + lat·π/360)), ramené en degrés puis en mètres
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    let y = y * HALF_EXTENT / 180.0;

    Ok((x, y))
}

/// Convertit Web Mercator (mètres) vers lon/lat (degrés WGS84)
pub fn web_mercator_to_lnglat(x: f64, y: f64) -> (f64, f64) {
    let lng = x * 180.0 / HALF_EXTENT;

    // Latitude = 2·atan(exp(y/R)) - π/2
    let lat = y * 180.0 / HALF_EXTENT;
    let lat = 180.0 / PI * (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0);

    (lng, lat)
}
