//! Types de données pour le crate foretgeo

use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;

use geo::{BoundingRect, Coord, Intersects, MultiPolygon, Polygon, Rect};
use serde::{Deserialize, Serialize};

use crate::projection::MAX_LATITUDE;
use crate::ForetError;

/// Plafond par défaut du nombre de placettes retournées par le catalogue
pub const DEFAULT_PLOT_LIMIT: usize = 10_000;

/// Emprise géographique en degrés WGS84
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl Bounds {
    /// Crée une emprise en vérifiant `min ≤ max` sur les deux axes
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Result<Self, ForetError> {
        let all_finite = [min_lng, min_lat, max_lng, max_lat]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite || min_lng > max_lng || min_lat > max_lat {
            return Err(ForetError::InvalidInput(format!(
                "invalid bounds [{}, {}, {}, {}]",
                min_lng, min_lat, max_lng, max_lat
            )));
        }
        Ok(Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        })
    }

    /// Construit l'emprise depuis un rectangle `geo` (toujours ordonné)
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            min_lng: rect.min().x,
            min_lat: rect.min().y,
            max_lng: rect.max().x,
            max_lat: rect.max().y,
        }
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(
            Coord {
                x: self.min_lng,
                y: self.min_lat,
            },
            Coord {
                x: self.max_lng,
                y: self.max_lat,
            },
        )
    }

    pub fn to_polygon(&self) -> Polygon {
        self.to_rect().to_polygon()
    }

    /// Ramène les latitudes dans le domaine Web Mercator
    ///
    /// Une vue très dézoomée déborde souvent au-delà de ±85°.
    pub fn clamp_to_mercator_domain(&self) -> Self {
        // Strictement à l'intérieur du domaine ouvert |lat| < MAX_LATITUDE
        let limit = MAX_LATITUDE - 1e-9;
        Self {
            min_lng: self.min_lng,
            min_lat: self.min_lat.clamp(-limit, limit),
            max_lng: self.max_lng,
            max_lat: self.max_lat.clamp(-limit, limit),
        }
    }
}

/// Placette forestière du catalogue (donnée de référence, lecture seule)
#[derive(Debug, Clone)]
pub struct ForestPlot {
    pub id: String,
    pub region_code: String,
    pub department_code: String,
    pub commune_code: String,
    /// Lieu-dit
    pub place_name: Option<String>,
    /// Contour en WGS84
    pub boundary: MultiPolygon,
    /// Essences présentes (ordre sans importance)
    pub species: BTreeSet<String>,
    pub surface_hectares: Option<f64>,
    /// Type de formation végétale (ex: "Forêt fermée de feuillus")
    pub forest_type: Option<String>,
}

impl ForestPlot {
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.boundary.bounding_rect()
    }

    /// Code de la placette pour un niveau de la hiérarchie
    pub fn code(&self, level: HierarchyLevel) -> Option<&str> {
        let code = match level {
            HierarchyLevel::Region => Some(self.region_code.as_str()),
            HierarchyLevel::Department => Some(self.department_code.as_str()),
            HierarchyLevel::Commune => Some(self.commune_code.as_str()),
            HierarchyLevel::PlaceName => self.place_name.as_deref(),
        };
        code.filter(|c| !c.trim().is_empty())
    }
}

/// Niveaux de la hiérarchie administrative : région → département → commune → lieu-dit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HierarchyLevel {
    Region,
    Department,
    Commune,
    PlaceName,
}

impl HierarchyLevel {
    /// Niveau parent (aucun pour la région)
    pub fn parent(self) -> Option<HierarchyLevel> {
        match self {
            Self::Region => None,
            Self::Department => Some(Self::Region),
            Self::Commune => Some(Self::Department),
            Self::PlaceName => Some(Self::Commune),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Department => "departement",
            Self::Commune => "commune",
            Self::PlaceName => "lieu_dit",
        }
    }
}

/// Filtre sur le catalogue ; chaque critère absent est ignoré
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotFilter {
    pub region_code: Option<String>,
    pub department_code: Option<String>,
    pub commune_code: Option<String>,
    pub place_name: Option<String>,
    pub bounds: Option<Bounds>,
    /// Nombre maximum de placettes (plafond imposé par le collaborateur si absent)
    pub limit: Option<usize>,
}

impl PlotFilter {
    /// Filtre sur un seul niveau de la hiérarchie
    pub fn for_level(level: HierarchyLevel, code: &str) -> Self {
        let code = Some(code.to_string());
        match level {
            HierarchyLevel::Region => Self {
                region_code: code,
                ..Default::default()
            },
            HierarchyLevel::Department => Self {
                department_code: code,
                ..Default::default()
            },
            HierarchyLevel::Commune => Self {
                commune_code: code,
                ..Default::default()
            },
            HierarchyLevel::PlaceName => Self {
                place_name: code,
                ..Default::default()
            },
        }
    }

    pub fn within(bounds: Bounds) -> Self {
        Self {
            bounds: Some(bounds),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Limite effective, bornée par [`DEFAULT_PLOT_LIMIT`]
    pub fn effective_limit(&self) -> usize {
        self.limit
            .map_or(DEFAULT_PLOT_LIMIT, |l| l.min(DEFAULT_PLOT_LIMIT))
    }

    /// Sémantique de référence du filtre (utilisée par les stores en mémoire)
    pub fn matches(&self, plot: &ForestPlot) -> bool {
        fn eq(expected: &Option<String>, actual: Option<&str>) -> bool {
            expected.as_deref().map_or(true, |e| actual == Some(e))
        }

        eq(&self.region_code, Some(&plot.region_code))
            && eq(&self.department_code, Some(&plot.department_code))
            && eq(&self.commune_code, Some(&plot.commune_code))
            && eq(&self.place_name, plot.place_name.as_deref())
            && self
                .bounds
                .map_or(true, |b| plot.boundary.intersects(&b.to_polygon()))
    }
}

/// Part d'une essence dans l'analyse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesShare {
    pub species: String,
    /// Surface intersectée des placettes portant cette essence (ha)
    pub area_hectares: f64,
    /// Part de `area_hectares` dans la somme des surfaces de toutes les
    /// essences, et non dans `total_forest_area` : une placette à plusieurs
    /// essences compte une fois par essence
    pub percentage: f64,
}

/// Résultat de l'analyse d'un polygone contre le catalogue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Nombre de placettes intersectées
    pub plot_count: usize,
    /// Surface forestière intersectée (ha)
    pub total_forest_area: f64,
    /// Part du polygone couverte par la forêt (0–100)
    pub coverage_percentage: f64,
    /// Types de forêt distincts, triés
    pub forest_types: Vec<String>,
    /// Répartition par essence, surface décroissante
    pub species_distribution: Vec<SpeciesShare>,
}

/// Statut de l'analyse d'un polygone utilisateur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolygonStatus {
    Pending,
    Completed,
    Failed,
}

impl PolygonStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PolygonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PolygonStatus {
    type Err = ForetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(ForetError::Storage(format!("unknown polygon status: {}", s))),
        }
    }
}

/// Polygone dessiné et enregistré par un utilisateur
#[derive(Debug, Clone)]
pub struct UserPolygon {
    /// Identifiant attribué par le stockage (vide avant enregistrement)
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub boundary: MultiPolygon,
    pub area_hectares: f64,
    pub status: PolygonStatus,
    pub analysis: Option<AnalysisResult>,
    /// Cause de l'échec quand `status == Failed`
    pub failure: Option<String>,
    /// Hash hexadécimal de la géométrie normalisée
    pub fingerprint: String,
    pub created_at: SystemTime,
}

impl UserPolygon {
    /// Nouveau polygone en attente d'analyse
    pub fn pending(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        boundary: MultiPolygon,
        area_hectares: f64,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            owner_id: owner_id.into(),
            name: name.into(),
            boundary,
            area_hectares: area_hectares.max(0.0),
            status: PolygonStatus::Pending,
            analysis: None,
            failure: None,
            fingerprint: fingerprint.into(),
            created_at: SystemTime::now(),
        }
    }

    /// Pending → Completed
    pub fn complete(&mut self, analysis: AnalysisResult) -> Result<(), ForetError> {
        self.transition(PolygonStatus::Completed)?;
        self.analysis = Some(analysis);
        Ok(())
    }

    /// Pending → Failed, le résultat reste vide
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ForetError> {
        self.transition(PolygonStatus::Failed)?;
        self.analysis = None;
        self.failure = Some(reason.into());
        Ok(())
    }

    fn transition(&mut self, to: PolygonStatus) -> Result<(), ForetError> {
        if self.status.is_terminal() || !to.is_terminal() {
            return Err(ForetError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Couches interrogées au clic, dans l'ordre de la hiérarchie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerId {
    Region,
    Department,
    Commune,
    Forest,
}

impl LayerId {
    pub const ALL: [LayerId; 4] = [Self::Region, Self::Department, Self::Commune, Self::Forest];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Department => "department",
            Self::Commune => "commune",
            Self::Forest => "forest",
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature brute renvoyée par le service de couches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeature {
    pub id: Option<String>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Feature normalisée d'une couche
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerFeature {
    pub feature_id: Option<String>,
    pub display_name: Option<String>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Résultat d'une couche pour un point (`None` si rien trouvé ou échec)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerResult {
    pub layer: LayerId,
    pub feature: Option<LayerFeature>,
}

/// Résultat complet d'une requête au point, une entrée par couche
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureQueryResult {
    pub lng: f64,
    pub lat: f64,
    pub layers: Vec<LayerResult>,
}

impl FeatureQueryResult {
    pub fn get(&self, layer: LayerId) -> Option<&LayerFeature> {
        self.layers
            .iter()
            .find(|r| r.layer == layer)
            .and_then(|r| r.feature.as_ref())
    }

    pub fn has_any(&self) -> bool {
        self.layers.iter().any(|r| r.feature.is_some())
    }
}
