//! Lecture du catalogue depuis un fichier GeoJSON, écriture avec geozero

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use geo::{Geometry, MultiPolygon};
use geojson::{Feature, GeoJson};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use serde_json::{Map, Value};
use tracing::{info, warn};

use foretgeo::ForestPlot;

/// Propriétés acceptées pour chaque attribut de placette, par priorité
const ID_KEYS: &[&str] = &["id", "ID"];
const REGION_KEYS: &[&str] = &["code_region", "codeRegion"];
const DEPARTMENT_KEYS: &[&str] = &["code_departement", "codeDepartement"];
const COMMUNE_KEYS: &[&str] = &["code_commune", "codeCommune"];
const PLACE_KEYS: &[&str] = &["lieu_dit", "lieuDit"];
const SPECIES_KEYS: &[&str] = &["essences", "ESSENCE", "essence"];
const SURFACE_KEYS: &[&str] = &["surface_ha", "surfaceHectares"];
const FOREST_TYPE_KEYS: &[&str] = &["type_foret", "TFV", "forestType"];

/// Charge les placettes d'un fichier GeoJSON (FeatureCollection)
pub fn load_catalogue(path: &Path) -> Result<Vec<ForestPlot>> {
    let content = std::fs::read_to_string(path)
        .context(format!("Failed to read catalogue file: {}", path.display()))?;
    let plots = plots_from_geojson_str(&content)?;
    info!(path = %path.display(), plots = plots.len(), "Catalogue loaded");
    Ok(plots)
}

/// Lit les placettes d'un document GeoJSON
///
/// Les features sans géométrie polygonale ou sans codes administratifs
/// sont ignorées avec un avertissement.
pub fn plots_from_geojson_str(input: &str) -> Result<Vec<ForestPlot>> {
    let geojson: GeoJson = input.parse().context("Failed to parse GeoJSON")?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => anyhow::bail!("Expected a FeatureCollection, got a bare geometry"),
    };

    let mut plots = Vec::with_capacity(features.len());
    for (idx, feature) in features.into_iter().enumerate() {
        match plot_from_feature(feature) {
            Ok(plot) => plots.push(plot),
            Err(reason) => warn!(feature = idx, reason = %reason, "Skipping catalogue feature"),
        }
    }
    Ok(plots)
}

fn plot_from_feature(feature: Feature) -> Result<ForestPlot, String> {
    let properties = feature.properties.clone().unwrap_or_default();

    let id = text(&properties, ID_KEYS)
        .or_else(|| {
            feature.id.as_ref().map(|id| match id {
                geojson::feature::Id::String(s) => s.clone(),
                geojson::feature::Id::Number(n) => n.to_string(),
            })
        })
        .ok_or("missing id")?;

    let geometry = feature.geometry.ok_or("missing geometry")?;
    let boundary = match Geometry::<f64>::try_from(geometry).map_err(|e| e.to_string())? {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
        Geometry::MultiPolygon(mp) => mp,
        _ => return Err(format!("plot {}: geometry is not polygonal", id)),
    };

    let required = |keys: &[&str], what: &str| {
        text(&properties, keys).ok_or_else(|| format!("plot {}: missing {}", id, what))
    };

    Ok(ForestPlot {
        region_code: required(REGION_KEYS, "region code")?,
        department_code: required(DEPARTMENT_KEYS, "department code")?,
        commune_code: required(COMMUNE_KEYS, "commune code")?,
        place_name: text(&properties, PLACE_KEYS),
        boundary,
        species: species(&properties),
        surface_hectares: SURFACE_KEYS
            .iter()
            .find_map(|k| properties.get(*k).and_then(Value::as_f64)),
        forest_type: text(&properties, FOREST_TYPE_KEYS),
        id,
    })
}

fn text(properties: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match properties.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Essences : tableau JSON ou liste séparée par des virgules
fn species(properties: &Map<String, Value>) -> BTreeSet<String> {
    let value = SPECIES_KEYS.iter().find_map(|k| properties.get(*k));
    let labels: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    labels
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Écrit une géométrie en GeoJSON (texte)
pub fn geometry_to_geojson(geometry: &MultiPolygon) -> Result<String> {
    let mut buf = Vec::new();
    let mut writer = GeoJsonWriter::new(&mut buf);
    Geometry::MultiPolygon(geometry.clone())
        .process_geom(&mut writer)
        .context("Failed to write GeoJSON geometry")?;
    String::from_utf8(buf).context("GeoJSON output is not UTF-8")
}
