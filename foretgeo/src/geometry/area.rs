//! Surfaces géodésiques
//!
//! Les surfaces sont calculées sur l'ellipsoïde WGS84 (méthode de Karney,
//! via `geo::GeodesicArea`) et jamais en Web Mercator, dont le facteur
//! d'échelle varie avec la latitude.

use geo::orient::{Direction, Orient};
use geo::{GeodesicArea, MultiPolygon};

/// Mètres carrés par hectare
pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Surface d'une géométrie WGS84 en hectares (toujours ≥ 0)
///
/// Les anneaux sont réorientés (enveloppes trigonométriques, trous horaires)
/// avant le calcul : le résultat ne dépend pas du sens de dessin.
pub fn area_hectares(geometry: &MultiPolygon) -> f64 {
    let oriented = geometry.orient(Direction::Default);
    let area = oriented.geodesic_area_unsigned() / SQUARE_METERS_PER_HECTARE;
    if area.is_finite() {
        area.max(0.0)
    } else {
        0.0
    }
}
