//! Définition et implémentation des commandes CLI
//!
//! - filtres en cascade : `regions`, `departements`, `communes`, `lieux-dits`
//! - `plots` : placettes filtrées
//! - `identify` : features sous un point (WMS)
//! - `analyze`, `polygons`, `delete-polygon` : polygones utilisateur

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use foret_pg::config::Config;
use foret_pg::feature_info::{FeatureInfoResolver, ForestDetails};
use foret_pg::geojson_io::load_catalogue;
use foret_pg::report::{summary_line, AnalysisReport};
use foret_pg::store::{
    check_connection, create_pool, create_schema, DatabaseConfig, DatabaseOverrides,
    MemoryCatalogue, MemoryPolygonStore, PgCatalogue, PgPolygonStore,
};
use foret_pg::wms::WmsFeatureService;
use foret_pg::{AnalysisPipeline, CatalogueStore, HierarchyResolver, PersistenceStore};
use foretgeo::{Bounds, DrawnPolygon, LayerId, PlotFilter};

#[derive(Subcommand)]
pub enum Commands {
    /// List regions present in the catalogue
    Regions,

    /// List departements of a region
    Departements {
        /// Region code (ex: 84)
        #[arg(long)]
        region: String,
    },

    /// List communes of a departement
    Communes {
        /// Departement code (ex: 38, 2A)
        #[arg(long)]
        departement: String,
    },

    /// List lieux-dits of a commune
    LieuxDits {
        /// Commune INSEE code (ex: 38185)
        #[arg(long)]
        commune: String,
    },

    /// List forest plots matching the filters
    Plots {
        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        departement: Option<String>,

        #[arg(long)]
        commune: Option<String>,

        #[arg(long)]
        lieu_dit: Option<String>,

        /// Bounding box: minLng,minLat,maxLng,maxLat
        #[arg(long, allow_hyphen_values = true)]
        bbox: Option<String>,

        /// Maximum number of plots (capped at 10000)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Identify region, departement, commune and forest under a point
    Identify {
        /// Longitude (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Latitude (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Current map view: minLng,minLat,maxLng,maxLat
        #[arg(long, allow_hyphen_values = true)]
        bbox: String,
    },

    /// Analyze a drawn polygon against the forest catalogue and store it
    Analyze {
        /// Owner of the polygon
        #[arg(long)]
        owner: String,

        /// Polygon name
        #[arg(long)]
        name: String,

        /// GeoJSON file (Polygon, MultiPolygon or a single Feature)
        #[arg(long)]
        geometry: PathBuf,

        /// Save the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List stored polygons of a user
    Polygons {
        #[arg(long)]
        owner: String,
    },

    /// Delete a stored polygon
    DeletePolygon {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        id: String,
    },
}

/// Connexion PostgreSQL (défauts : variables PG*)
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// PostgreSQL database name (défaut : env PGDATABASE / foret)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long, global = true)]
    pub ssl: Option<String>,

    /// Target PostgreSQL schema
    #[arg(long, global = true, default_value = "foret")]
    pub schema: String,
}

impl DbArgs {
    fn overrides(&self) -> DatabaseOverrides {
        DatabaseOverrides {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            ssl: self.ssl.clone(),
        }
    }
}

/// Collaborateurs de stockage sélectionnés au démarrage
pub struct Services {
    pub catalogue: Arc<dyn CatalogueStore>,
    pub store: Arc<dyn PersistenceStore>,
}

/// Catalogue GeoJSON en mémoire si fourni, PostGIS sinon
pub async fn connect(catalogue: Option<&Path>, db: &DbArgs) -> Result<Services> {
    if let Some(path) = catalogue {
        let plots = load_catalogue(path)?;
        println!("Catalogue: {} ({} plots, in-memory)", path.display(), plots.len());
        return Ok(Services {
            catalogue: Arc::new(MemoryCatalogue::new(plots)),
            store: Arc::new(MemoryPolygonStore::new()),
        });
    }

    let mut config = DatabaseConfig::from_env();
    config.apply(db.overrides());

    let pool = create_pool(&config).await?;
    let postgis = check_connection(&pool).await?;
    info!(database = %config.label(), postgis = %postgis, "Connected to PostgreSQL");

    create_schema(&pool, &db.schema).await?;

    Ok(Services {
        catalogue: Arc::new(PgCatalogue::new(pool.clone(), &db.schema)),
        store: Arc::new(PgPolygonStore::new(pool, &db.schema)),
    })
}

/// Exécute une commande de filtre en cascade
pub async fn cmd_hierarchy(services: &Services, command: &Commands) -> Result<()> {
    let resolver = HierarchyResolver::new(services.catalogue.clone());

    let (label, values) = match command {
        Commands::Regions => ("regions", resolver.list_regions().await?),
        Commands::Departements { region } => {
            ("departements", resolver.list_departments(region).await?)
        }
        Commands::Communes { departement } => {
            ("communes", resolver.list_communes(departement).await?)
        }
        Commands::LieuxDits { commune } => {
            ("lieux-dits", resolver.list_place_names(commune).await?)
        }
        _ => anyhow::bail!("Not a hierarchy command"),
    };

    for value in &values {
        println!("{}", value);
    }
    info!(count = values.len(), "{} listed", label);
    Ok(())
}

/// Exécute la commande plots
pub async fn cmd_plots(services: &Services, filter: PlotFilter) -> Result<()> {
    let resolver = HierarchyResolver::new(services.catalogue.clone());
    let plots = resolver.list_plots(&filter).await?;

    for plot in &plots {
        let species: Vec<&str> = plot.species.iter().map(String::as_str).collect();
        println!(
            "{}\t{}\t{}\t{}\t{}",
            plot.id,
            plot.commune_code,
            plot.place_name.as_deref().unwrap_or("-"),
            plot.forest_type.as_deref().unwrap_or("-"),
            species.join(", ")
        );
    }
    println!("{} plots", plots.len());
    Ok(())
}

/// Exécute la commande identify ; Ctrl-C interrompt l'attente des couches
pub async fn cmd_identify(config: &Config, lng: f64, lat: f64, bbox: &str) -> Result<()> {
    let viewport = parse_bbox(bbox)?;
    let service = WmsFeatureService::new(config.wms.clone())?;
    println!("WMS: {}", service.endpoint());

    let resolver = FeatureInfoResolver::new(Arc::new(service), config.layers.clone());
    let cancel = async {
        // Sans gestionnaire de signal, on attend simplement toutes les couches
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let result = resolver.query_until(lng, lat, &viewport, cancel).await?;

    println!("Point: {:.6}, {:.6}", result.lng, result.lat);
    for layer in &result.layers {
        match &layer.feature {
            Some(feature) => {
                println!(
                    "  {:<12} {} [{}]",
                    layer.layer.as_str(),
                    feature.display_name.as_deref().unwrap_or("(unnamed)"),
                    feature.feature_id.as_deref().unwrap_or("-")
                );
                if layer.layer == LayerId::Forest {
                    let details = ForestDetails::from_feature(feature);
                    if let Some(forest_type) = details.forest_type {
                        println!("  {:<12} {}", "", forest_type);
                    }
                    if let Some(species) = details.species {
                        println!("  {:<12} {}", "", species);
                    }
                }
            }
            None => println!("  {:<12} -", layer.layer.as_str()),
        }
    }

    if !result.has_any() {
        println!("No feature found");
    }
    Ok(())
}

/// Exécute la commande analyze
pub async fn cmd_analyze(
    services: &Services,
    owner: &str,
    name: &str,
    geometry: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let content = std::fs::read_to_string(geometry)
        .context(format!("Failed to read geometry file: {}", geometry.display()))?;
    let drawn = DrawnPolygon::from_geojson_str(&content)?;

    let pipeline = AnalysisPipeline::new(services.catalogue.clone(), services.store.clone());

    let start = Instant::now();
    let polygon = pipeline.submit(owner, name, &drawn).await?;
    let report = AnalysisReport::from_polygon(&polygon, start.elapsed())?;

    report.display();

    if let Some(path) = output {
        report.save_to_file(path)?;
        println!("Report saved to {}", path.display());
    }
    Ok(())
}

/// Exécute la commande polygons
pub async fn cmd_polygons(services: &Services, owner: &str) -> Result<()> {
    let pipeline = AnalysisPipeline::new(services.catalogue.clone(), services.store.clone());
    let polygons = pipeline.list(owner).await?;

    for polygon in &polygons {
        println!(
            "{}",
            summary_line(
                &polygon.id,
                &polygon.name,
                polygon.status,
                polygon.area_hectares,
                polygon.analysis.as_ref()
            )
        );
    }
    println!("{} polygons", polygons.len());
    Ok(())
}

/// Exécute la commande delete-polygon
pub async fn cmd_delete(services: &Services, owner: &str, id: &str) -> Result<()> {
    let pipeline = AnalysisPipeline::new(services.catalogue.clone(), services.store.clone());
    pipeline.delete(owner, id).await?;
    println!("Polygon {} deleted", id);
    Ok(())
}

/// Parse une emprise `minLng,minLat,maxLng,maxLat`
pub fn parse_bbox(input: &str) -> Result<Bounds> {
    let values = input
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .context(format!("Invalid bbox: {}", input))?;

    match values.as_slice() {
        [min_lng, min_lat, max_lng, max_lat] => {
            Ok(Bounds::new(*min_lng, *min_lat, *max_lng, *max_lat)?)
        }
        _ => anyhow::bail!(
            "Invalid bbox: {} (expected minLng,minLat,maxLng,maxLat)",
            input
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox_valid() {
        let bounds = parse_bbox("-1.5, 43.2,2,48").unwrap();
        assert_eq!(bounds.min_lng, -1.5);
        assert_eq!(bounds.max_lat, 48.0);
    }

    #[test]
    fn test_parse_bbox_invalid() {
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
        // min > max
        assert!(parse_bbox("2,0,1,1").is_err());
    }
}
