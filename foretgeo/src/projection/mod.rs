//! Transformation de coordonnées WGS84 ↔ Web Mercator
//!
//! Les requêtes de couches (WMS GetFeatureInfo) se font en EPSG:3857 :
//! le point cliqué et l'emprise de la vue sont reprojetés ici.

mod mercator;

pub use mercator::{HALF_EXTENT, MAX_LATITUDE};

use serde::{Deserialize, Serialize};

use crate::types::Bounds;
use crate::ForetError;

/// Point en coordonnées Web Mercator (mètres)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MercatorPoint {
    pub x: f64,
    pub y: f64,
}

/// Emprise en coordonnées Web Mercator (mètres)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MercatorBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl MercatorBounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Format `minx,miny,maxx,maxy` attendu par le paramètre WMS `bbox`
    pub fn to_bbox_param(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Projette un point lon/lat (degrés) en Web Mercator
///
/// # Errors
///
/// `OutOfDomain` si `|lat| ≥ 85.05113°` ou si une coordonnée n'est pas finie.
pub fn to_web_mercator(lng: f64, lat: f64) -> Result<MercatorPoint, ForetError> {
    let (x, y) = mercator::lnglat_to_web_mercator(lng, lat)?;
    Ok(MercatorPoint { x, y })
}

/// Inverse de [`to_web_mercator`] : retourne `(lng, lat)` en degrés
pub fn from_web_mercator(point: MercatorPoint) -> (f64, f64) {
    mercator::web_mercator_to_lnglat(point.x, point.y)
}

/// Projette les deux coins d'une emprise
pub fn bounds_to_mercator(bounds: &Bounds) -> Result<MercatorBounds, ForetError> {
    let min = to_web_mercator(bounds.min_lng, bounds.min_lat)?;
    let max = to_web_mercator(bounds.max_lng, bounds.max_lat)?;
    Ok(MercatorBounds {
        min_x: min.x,
        min_y: min.y,
        max_x: max.x,
        max_y: max.y,
    })
}
