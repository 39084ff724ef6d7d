//! Polygones dessinés : lecture, validation, surface, empreinte

pub mod area;
pub mod fingerprint;
pub mod validate;

pub use area::{area_hectares, SQUARE_METERS_PER_HECTARE};
pub use fingerprint::{fingerprint_hex, geometry_hash};

use geo::{BoundingRect, Coord, MultiPolygon, Rect};
use geojson::{GeoJson, Value};

use crate::types::Bounds;
use crate::ForetError;

/// Anneau brut tel que fourni par l'appelant (pas de fermeture implicite)
pub type Ring = Vec<Coord>;

/// Polygone dessiné par l'utilisateur, en WGS84, non encore validé
///
/// Les anneaux sont conservés bruts : `geo::Polygon::new` fermerait
/// automatiquement un anneau ouvert, ce qui masquerait l'erreur.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnPolygon {
    /// Une entrée par polygone : l'enveloppe puis les trous
    parts: Vec<Vec<Ring>>,
}

impl DrawnPolygon {
    /// Polygone simple : enveloppe puis trous éventuels
    pub fn from_rings(rings: Vec<Vec<[f64; 2]>>) -> Self {
        Self::from_parts(vec![rings])
    }

    /// Multipolygone
    pub fn from_parts(parts: Vec<Vec<Vec<[f64; 2]>>>) -> Self {
        let parts = parts
            .into_iter()
            .map(|rings| {
                rings
                    .into_iter()
                    .map(|ring| ring.into_iter().map(|[x, y]| Coord { x, y }).collect())
                    .collect()
            })
            .collect();
        Self { parts }
    }

    /// Lit une géométrie GeoJSON (`Polygon` ou `MultiPolygon`)
    pub fn from_geojson(value: &Value) -> Result<Self, ForetError> {
        match value {
            Value::Polygon(rings) => Ok(Self {
                parts: vec![positions_to_rings(rings)?],
            }),
            Value::MultiPolygon(polygons) => {
                let parts = polygons
                    .iter()
                    .map(|rings| positions_to_rings(rings))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self { parts })
            }
            other => Err(ForetError::invalid_geometry(format!(
                "unsupported geometry type {}, expected Polygon or MultiPolygon",
                value_type(other)
            ))),
        }
    }

    /// Lit un document GeoJSON : géométrie, Feature, ou FeatureCollection d'une seule feature
    pub fn from_geojson_str(input: &str) -> Result<Self, ForetError> {
        let geojson: GeoJson = input
            .parse()
            .map_err(|e| ForetError::invalid_geometry(format!("malformed GeoJSON: {}", e)))?;

        let geometry = match geojson {
            GeoJson::Geometry(g) => Some(g),
            GeoJson::Feature(f) => f.geometry,
            GeoJson::FeatureCollection(fc) if fc.features.len() == 1 => {
                fc.features.into_iter().next().and_then(|f| f.geometry)
            }
            GeoJson::FeatureCollection(fc) => {
                return Err(ForetError::invalid_geometry(format!(
                    "expected a single feature, got {}",
                    fc.features.len()
                )))
            }
        };

        let geometry = geometry.ok_or_else(|| ForetError::invalid_geometry("feature has no geometry"))?;
        Self::from_geojson(&geometry.value)
    }

    pub fn parts(&self) -> &[Vec<Ring>] {
        &self.parts
    }

    /// Valide le polygone (anneaux fermés, ≥ 4 points, sans auto-intersection)
    pub fn validate(&self) -> Result<ValidPolygon, ForetError> {
        validate::validate(self)
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn positions_to_rings(rings: &[Vec<Vec<f64>>]) -> Result<Vec<Ring>, ForetError> {
    rings
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|pos| match pos.as_slice() {
                    [x, y, ..] => Ok(Coord { x: *x, y: *y }),
                    _ => Err(ForetError::invalid_geometry(
                        "position must have at least two coordinates",
                    )),
                })
                .collect()
        })
        .collect()
}

/// Polygone validé, seule géométrie acceptée par le moteur d'intersection
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPolygon {
    geometry: MultiPolygon,
    rect: Rect,
}

impl ValidPolygon {
    /// Construit depuis une géométrie déjà validée ; `None` si vide
    pub(crate) fn new(geometry: MultiPolygon) -> Option<Self> {
        let rect = geometry.bounding_rect()?;
        Some(Self { geometry, rect })
    }

    pub fn geometry(&self) -> &MultiPolygon {
        &self.geometry
    }

    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_rect(self.rect)
    }

    /// Surface géodésique en hectares
    pub fn area_hectares(&self) -> f64 {
        area_hectares(&self.geometry)
    }
}
