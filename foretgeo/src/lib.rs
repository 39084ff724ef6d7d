//! # foretgeo
//!
//! Moteur géospatial d'analyse de couverture forestière.
//!
//! ## Features
//!
//! - Reprojection WGS84 ↔ Web Mercator (EPSG:3857) pour les requêtes de couches
//! - Validation stricte des polygones dessinés (fermeture, auto-intersection)
//! - Surfaces géodésiques sur l'ellipsoïde WGS84, en hectares
//! - Intersection polygone × placettes en parallèle (`rayon`)
//! - Agrégation par essence et par type de forêt
//!
//! ## Usage
//!
//! ```rust,ignore
//! use foretgeo::{DrawnPolygon, IntersectionEngine};
//!
//! let drawn = DrawnPolygon::from_geojson_str(&input)?;
//! let engine = IntersectionEngine::new();
//! let polygon = engine.validate(&drawn)?;
//!
//! let result = engine.analyze(&polygon, &plots)?;
//! println!("{} placettes, {:.2} ha", result.plot_count, result.total_forest_area);
//! ```

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod projection;
pub mod types;

pub use engine::{GeoOverlay, IntersectionEngine, OverlayBackend};
pub use error::ForetError;
pub use geometry::{DrawnPolygon, ValidPolygon};
pub use projection::{bounds_to_mercator, to_web_mercator, MercatorBounds, MercatorPoint};
pub use types::{
    AnalysisResult, Bounds, FeatureQueryResult, ForestPlot, HierarchyLevel, LayerFeature,
    LayerId, LayerResult, PlotFilter, PolygonStatus, RawFeature, SpeciesShare, UserPolygon,
    DEFAULT_PLOT_LIMIT,
};
