//! Adaptateurs PostgreSQL/PostGIS
//!
//! - `forest_plots` : catalogue des placettes (lecture seule)
//! - `user_polygons` : polygones dessinés et résultats d'analyse (jsonb)
//!
//! Les géométries transitent en WKB : `ST_AsBinary` + geozero en lecture,
//! crate `wkb` + `ST_GeomFromWKB` en écriture.

use std::collections::BTreeSet;
use std::time::SystemTime;

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use geo::{Geometry, MultiPolygon};
use geozero::wkb::Wkb;
use geozero::ToGeo;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::{debug, info, warn};
use wkb::geom_to_wkb;

use foretgeo::{
    AnalysisResult, ForestPlot, ForetError, HierarchyLevel, PlotFilter, PolygonStatus, UserPolygon,
};

use crate::ports::{CatalogueStore, PersistenceStore};

/// Table du catalogue par défaut
pub const PLOTS_TABLE: &str = "forest_plots";

/// Table des polygones utilisateur par défaut
pub const POLYGONS_TABLE: &str = "user_polygons";

type SqlParam = Box<dyn ToSql + Sync + Send>;

/// Crée l'extension PostGIS et les tables si nécessaire
pub async fn create_schema(pool: &Pool, schema: &str) -> Result<()> {
    let client = pool.get().await.context("Failed to get connection")?;

    // L'extension peut exister sans que l'utilisateur ait le droit de la créer
    if let Err(e) = client
        .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
        .await
    {
        warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
        let exists = client
            .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
            .await
            .context("Failed to check pg_extension")?
            .is_some();
        if !exists {
            anyhow::bail!("PostGIS extension is not installed and could not be created: {e}");
        }
    }

    let sql = format!(
        r#"
        CREATE SCHEMA IF NOT EXISTS {schema};

        CREATE TABLE IF NOT EXISTS {schema}.{plots} (
            id TEXT PRIMARY KEY,
            code_region TEXT NOT NULL,
            code_departement TEXT NOT NULL,
            code_commune TEXT NOT NULL,
            lieu_dit TEXT,
            essences TEXT[] NOT NULL DEFAULT '{{}}',
            surface_ha DOUBLE PRECISION,
            type_foret TEXT,
            geom geometry(MultiPolygon, 4326) NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {plots}_geom_idx ON {schema}.{plots} USING GIST (geom);
        CREATE INDEX IF NOT EXISTS {plots}_codes_idx
            ON {schema}.{plots} (code_region, code_departement, code_commune);

        CREATE TABLE IF NOT EXISTS {schema}.{polygons} (
            id BIGSERIAL PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            geom geometry(MultiPolygon, 4326) NOT NULL,
            area_hectares DOUBLE PRECISION NOT NULL,
            status TEXT NOT NULL,
            analysis JSONB,
            failure TEXT,
            fingerprint TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        CREATE INDEX IF NOT EXISTS {polygons}_owner_idx ON {schema}.{polygons} (owner_id);
        "#,
        schema = schema,
        plots = PLOTS_TABLE,
        polygons = POLYGONS_TABLE,
    );

    client
        .batch_execute(&sql)
        .await
        .context("Failed to create tables")?;

    info!(schema = schema, "Schema ready");
    Ok(())
}

/// Catalogue des placettes dans PostGIS
#[derive(Clone)]
pub struct PgCatalogue {
    pool: Pool,
    table: String,
}

impl PgCatalogue {
    pub fn new(pool: Pool, schema: &str) -> Self {
        Self {
            pool,
            table: format!("{}.{}", schema, PLOTS_TABLE),
        }
    }
}

/// Colonne SQL d'un niveau de la hiérarchie
fn level_column(level: HierarchyLevel) -> &'static str {
    match level {
        HierarchyLevel::Region => "code_region",
        HierarchyLevel::Department => "code_departement",
        HierarchyLevel::Commune => "code_commune",
        HierarchyLevel::PlaceName => "lieu_dit",
    }
}

/// Construit la clause WHERE et ses paramètres depuis un filtre
fn filter_clause(filter: &PlotFilter) -> (String, Vec<SqlParam>) {
    let mut clauses = Vec::new();
    let mut params: Vec<SqlParam> = Vec::new();

    let codes = [
        (HierarchyLevel::Region, &filter.region_code),
        (HierarchyLevel::Department, &filter.department_code),
        (HierarchyLevel::Commune, &filter.commune_code),
        (HierarchyLevel::PlaceName, &filter.place_name),
    ];
    for (level, code) in codes {
        if let Some(code) = code {
            params.push(Box::new(code.clone()));
            clauses.push(format!("{} = ${}", level_column(level), params.len()));
        }
    }

    if let Some(bounds) = filter.bounds {
        let first = params.len() + 1;
        params.push(Box::new(bounds.min_lng));
        params.push(Box::new(bounds.min_lat));
        params.push(Box::new(bounds.max_lng));
        params.push(Box::new(bounds.max_lat));
        clauses.push(format!(
            "ST_Intersects(geom, ST_MakeEnvelope(${}, ${}, ${}, ${}, 4326))",
            first,
            first + 1,
            first + 2,
            first + 3
        ));
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, params)
}

fn param_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

/// Décode une géométrie WKB (Polygon ou MultiPolygon)
fn decode_multipolygon(bytes: Vec<u8>) -> Result<MultiPolygon, String> {
    match Wkb(bytes).to_geo().map_err(|e| e.to_string())? {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Ok(mp),
        _ => Err("geometry is not polygonal".to_string()),
    }
}

fn plot_from_row(row: &Row) -> Result<ForestPlot, String> {
    let id: String = row.try_get("id").map_err(|e| e.to_string())?;
    let geom: Vec<u8> = row.try_get("geom_wkb").map_err(|e| e.to_string())?;
    let species: Option<Vec<String>> = row.try_get("essences").map_err(|e| e.to_string())?;

    Ok(ForestPlot {
        boundary: decode_multipolygon(geom).map_err(|e| format!("plot {}: {}", id, e))?,
        region_code: row.try_get("code_region").map_err(|e| e.to_string())?,
        department_code: row.try_get("code_departement").map_err(|e| e.to_string())?,
        commune_code: row.try_get("code_commune").map_err(|e| e.to_string())?,
        place_name: row.try_get("lieu_dit").map_err(|e| e.to_string())?,
        species: species.unwrap_or_default().into_iter().collect::<BTreeSet<_>>(),
        surface_hectares: row.try_get("surface_ha").map_err(|e| e.to_string())?,
        forest_type: row.try_get("type_foret").map_err(|e| e.to_string())?,
        id,
    })
}

#[async_trait]
impl CatalogueStore for PgCatalogue {
    async fn list_plots(&self, filter: &PlotFilter) -> Result<Vec<ForestPlot>, ForetError> {
        let client = self.pool.get().await.map_err(ForetError::catalogue)?;

        let (clause, mut params) = filter_clause(filter);
        params.push(Box::new(filter.effective_limit() as i64));
        let sql = format!(
            "SELECT id, code_region, code_departement, code_commune, lieu_dit, essences, \
             surface_ha, type_foret, ST_AsBinary(geom) AS geom_wkb \
             FROM {} {} ORDER BY id LIMIT ${}",
            self.table,
            clause,
            params.len()
        );

        let rows = client
            .query(&sql, &param_refs(&params))
            .await
            .map_err(ForetError::catalogue)?;

        // Toute placette illisible fait échouer la requête
        let plots = rows
            .iter()
            .map(|row| plot_from_row(row).map_err(ForetError::CatalogueUnavailable))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(plots = plots.len(), "Plots fetched");
        Ok(plots)
    }

    async fn distinct_codes(
        &self,
        level: HierarchyLevel,
        parent: Option<&str>,
    ) -> Result<Vec<String>, ForetError> {
        let client = self.pool.get().await.map_err(ForetError::catalogue)?;
        let column = level_column(level);

        let rows = match (level.parent(), parent) {
            (Some(parent_level), Some(code)) => {
                let sql = format!(
                    "SELECT DISTINCT {col} FROM {table} \
                     WHERE {col} IS NOT NULL AND {col} <> '' AND {parent} = $1 ORDER BY {col}",
                    col = column,
                    table = self.table,
                    parent = level_column(parent_level),
                );
                client.query(&sql, &[&code]).await
            }
            _ => {
                let sql = format!(
                    "SELECT DISTINCT {col} FROM {table} \
                     WHERE {col} IS NOT NULL AND {col} <> '' ORDER BY {col}",
                    col = column,
                    table = self.table,
                );
                client.query(&sql, &[]).await
            }
        }
        .map_err(ForetError::catalogue)?;

        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(ForetError::catalogue))
            .collect()
    }
}

/// Polygones utilisateur dans PostGIS
#[derive(Clone)]
pub struct PgPolygonStore {
    pool: Pool,
    table: String,
}

impl PgPolygonStore {
    pub fn new(pool: Pool, schema: &str) -> Self {
        Self {
            pool,
            table: format!("{}.{}", schema, POLYGONS_TABLE),
        }
    }
}

fn analysis_to_json(analysis: &Option<AnalysisResult>) -> Result<Option<serde_json::Value>, ForetError> {
    analysis
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(ForetError::storage)
}

fn polygon_from_row(row: &Row) -> Result<UserPolygon, ForetError> {
    let geom: Vec<u8> = row.try_get("geom_wkb").map_err(ForetError::storage)?;
    let status: String = row.try_get("status").map_err(ForetError::storage)?;
    let analysis: Option<serde_json::Value> = row.try_get("analysis").map_err(ForetError::storage)?;
    let created_at: SystemTime = row.try_get("created_at").map_err(ForetError::storage)?;

    Ok(UserPolygon {
        id: row.try_get("id").map_err(ForetError::storage)?,
        owner_id: row.try_get("owner_id").map_err(ForetError::storage)?,
        name: row.try_get("name").map_err(ForetError::storage)?,
        boundary: decode_multipolygon(geom).map_err(ForetError::storage)?,
        area_hectares: row.try_get("area_hectares").map_err(ForetError::storage)?,
        status: status.parse::<PolygonStatus>()?,
        analysis: analysis
            .map(serde_json::from_value)
            .transpose()
            .map_err(ForetError::storage)?,
        failure: row.try_get("failure").map_err(ForetError::storage)?,
        fingerprint: row.try_get("fingerprint").map_err(ForetError::storage)?,
        created_at,
    })
}

#[async_trait]
impl PersistenceStore for PgPolygonStore {
    async fn save(&self, mut polygon: UserPolygon) -> Result<UserPolygon, ForetError> {
        let client = self.pool.get().await.map_err(ForetError::storage)?;

        let wkb = geom_to_wkb(&Geometry::MultiPolygon(polygon.boundary.clone()))
            .map_err(|e| ForetError::storage(format!("Failed to convert geometry to WKB: {:?}", e)))?;
        let analysis = analysis_to_json(&polygon.analysis)?;
        let status = polygon.status.as_str();

        if polygon.id.is_empty() {
            let sql = format!(
                "INSERT INTO {} (owner_id, name, geom, area_hectares, status, analysis, failure, fingerprint, created_at) \
                 VALUES ($1, $2, ST_Multi(ST_SetSRID(ST_GeomFromWKB($3), 4326)), $4, $5, $6, $7, $8, $9) \
                 RETURNING id::text",
                self.table
            );
            let row = client
                .query_one(
                    &sql,
                    &[
                        &polygon.owner_id,
                        &polygon.name,
                        &wkb,
                        &polygon.area_hectares,
                        &status,
                        &analysis,
                        &polygon.failure,
                        &polygon.fingerprint,
                        &polygon.created_at,
                    ],
                )
                .await
                .map_err(ForetError::storage)?;
            polygon.id = row.try_get(0).map_err(ForetError::storage)?;
        } else {
            let sql = format!(
                "UPDATE {} SET status = $3, analysis = $4, failure = $5 \
                 WHERE id::text = $1 AND owner_id = $2",
                self.table
            );
            let updated = client
                .execute(
                    &sql,
                    &[&polygon.id, &polygon.owner_id, &status, &analysis, &polygon.failure],
                )
                .await
                .map_err(ForetError::storage)?;
            if updated == 0 {
                return Err(ForetError::NotFound(format!("polygon {}", polygon.id)));
            }
        }

        debug!(id = %polygon.id, status = status, "Polygon saved");
        Ok(polygon)
    }

    async fn get(&self, owner_id: &str) -> Result<Vec<UserPolygon>, ForetError> {
        let client = self.pool.get().await.map_err(ForetError::storage)?;
        let sql = format!(
            "SELECT id::text AS id, owner_id, name, ST_AsBinary(geom) AS geom_wkb, area_hectares, \
             status, analysis, failure, fingerprint, created_at \
             FROM {} WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
            self.table
        );

        let rows = client
            .query(&sql, &[&owner_id])
            .await
            .map_err(ForetError::storage)?;

        rows.iter().map(polygon_from_row).collect()
    }

    async fn delete(&self, owner_id: &str, polygon_id: &str) -> Result<(), ForetError> {
        let client = self.pool.get().await.map_err(ForetError::storage)?;
        let sql = format!(
            "DELETE FROM {} WHERE id::text = $1 AND owner_id = $2",
            self.table
        );

        let deleted = client
            .execute(&sql, &[&polygon_id, &owner_id])
            .await
            .map_err(ForetError::storage)?;

        if deleted == 0 {
            return Err(ForetError::NotFound(format!("polygon {}", polygon_id)));
        }
        Ok(())
    }
}
