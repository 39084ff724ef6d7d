//! # foret-pg
//!
//! Services d'exploration et d'analyse de la couverture forestière.
//!
//! ## Features
//!
//! - Filtres en cascade région → département → commune → lieu-dit
//! - Identification multi-couches au clic (WMS GetFeatureInfo, en parallèle)
//! - Analyse de polygones dessinés, enregistrée dans PostGIS
//! - Catalogue PostGIS ou fichier GeoJSON
//! - CLI simple
//!
//! ## Usage CLI
//!
//! ```bash
//! # Valeurs disponibles pour les filtres
//! foret regions
//! foret communes --departement 38
//!
//! # Features sous un point
//! foret identify --lng 5.72 --lat 45.18 --bbox 5.6,45.1,5.9,45.3
//!
//! # Analyse d'un polygone (catalogue GeoJSON, sans base de données)
//! foret --catalogue placettes.geojson analyze --owner alice --name "Chartreuse" --geometry zone.geojson
//! ```

pub mod config;
pub mod feature_info;
pub mod geojson_io;
pub mod hierarchy;
pub mod pipeline;
pub mod ports;
pub mod report;
pub mod store;
pub mod wms;

pub use config::{Config, LayerConfig, WmsConfig};
pub use feature_info::FeatureInfoResolver;
pub use hierarchy::HierarchyResolver;
pub use pipeline::AnalysisPipeline;
pub use ports::{CatalogueStore, FeatureQueryService, PersistenceStore};
pub use report::AnalysisReport;
pub use store::{create_pool, DatabaseConfig};
