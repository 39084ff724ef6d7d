//! Rapport d'analyse d'un polygone
//!
//! Affichage console et export JSON (géométrie incluse en GeoJSON).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use foretgeo::{AnalysisResult, PolygonStatus, UserPolygon};

use crate::geojson_io::geometry_to_geojson;

/// Nombre d'essences affichées sur la console
const DISPLAYED_SPECIES: usize = 10;

/// Rapport complet d'analyse
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub polygon_id: String,
    pub owner_id: String,
    pub name: String,
    pub status: PolygonStatus,
    pub area_hectares: f64,
    pub fingerprint: String,
    /// Cause de l'échec éventuel
    pub failure: Option<String>,
    pub analysis: Option<AnalysisResult>,
    /// Géométrie du polygone (GeoJSON)
    pub geometry: serde_json::Value,
    /// Durée de l'analyse
    pub duration_secs: f64,
}

impl AnalysisReport {
    /// Construit le rapport d'un polygone enregistré
    pub fn from_polygon(polygon: &UserPolygon, duration: Duration) -> Result<Self> {
        let geometry = geometry_to_geojson(&polygon.boundary)?;
        Ok(Self {
            polygon_id: polygon.id.clone(),
            owner_id: polygon.owner_id.clone(),
            name: polygon.name.clone(),
            status: polygon.status,
            area_hectares: polygon.area_hectares,
            fingerprint: polygon.fingerprint.clone(),
            failure: polygon.failure.clone(),
            analysis: polygon.analysis.clone(),
            geometry: serde_json::from_str(&geometry).context("Invalid GeoJSON geometry")?,
            duration_secs: duration.as_secs_f64(),
        })
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("ANALYSIS REPORT - {} (#{})", self.name, self.polygon_id);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {}", self.status);
        println!("Area: {:.2} ha", self.area_hectares);
        println!("Duration: {:.2}s", self.duration_secs);

        if let Some(failure) = &self.failure {
            println!("\nFailure: {}", failure);
        }

        if let Some(analysis) = &self.analysis {
            println!("\n--- FOREST ---");
            println!("Plots: {}", analysis.plot_count);
            println!(
                "Forest area: {:.2} ha ({:.1}% of polygon)",
                analysis.total_forest_area, analysis.coverage_percentage
            );

            if !analysis.forest_types.is_empty() {
                println!("\n--- FOREST TYPES ---");
                for forest_type in &analysis.forest_types {
                    println!("  {}", forest_type);
                }
            }

            if !analysis.species_distribution.is_empty() {
                println!("\n--- SPECIES ---");
                for share in analysis.species_distribution.iter().take(DISPLAYED_SPECIES) {
                    println!(
                        "  {:<30} {:>10.2} ha {:>6.1}%",
                        share.species, share.area_hectares, share.percentage
                    );
                }
                if analysis.species_distribution.len() > DISPLAYED_SPECIES {
                    println!(
                        "  ... and {} more",
                        analysis.species_distribution.len() - DISPLAYED_SPECIES
                    );
                }
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .context(format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        summary_line(
            &self.polygon_id,
            &self.name,
            self.status,
            self.area_hectares,
            self.analysis.as_ref(),
        )
    }
}

/// Ligne de résumé d'un polygone
pub fn summary_line(
    id: &str,
    name: &str,
    status: PolygonStatus,
    area_hectares: f64,
    analysis: Option<&AnalysisResult>,
) -> String {
    match analysis {
        Some(a) => format!(
            "#{} {}: {}, {:.2} ha, {} plots, {:.2} ha of forest",
            id, name, status, area_hectares, a.plot_count, a.total_forest_area
        ),
        None => format!("#{} {}: {}, {:.2} ha", id, name, status, area_hectares),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foretgeo::SpeciesShare;
    use geo::{polygon, MultiPolygon};

    fn completed() -> UserPolygon {
        let mut polygon = UserPolygon::pending(
            "alice",
            "Forêt de Chartreuse",
            MultiPolygon::new(vec![polygon![
                (x: 5.7, y: 45.3),
                (x: 5.8, y: 45.3),
                (x: 5.8, y: 45.4),
                (x: 5.7, y: 45.3),
            ]]),
            42.0,
            "ab12",
        );
        polygon.id = "7".into();
        polygon
            .complete(AnalysisResult {
                plot_count: 2,
                total_forest_area: 21.0,
                coverage_percentage: 50.0,
                forest_types: vec!["Forêt fermée de conifères".into()],
                species_distribution: vec![SpeciesShare {
                    species: "épicéa".into(),
                    area_hectares: 21.0,
                    percentage: 100.0,
                }],
            })
            .unwrap();
        polygon
    }

    #[test]
    fn test_report_from_polygon() {
        let report = AnalysisReport::from_polygon(&completed(), Duration::from_millis(250)).unwrap();
        assert_eq!(report.status, PolygonStatus::Completed);
        assert_eq!(report.geometry["type"], "MultiPolygon");
        assert_eq!(report.duration_secs, 0.25);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["polygonId"], "7");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["analysis"]["plotCount"], 2);
        assert_eq!(json["analysis"]["speciesDistribution"][0]["areaHectares"], 21.0);
    }

    #[test]
    fn test_summary() {
        let report = AnalysisReport::from_polygon(&completed(), Duration::ZERO).unwrap();
        let summary = report.summary();
        assert!(summary.starts_with("#7 Forêt de Chartreuse: completed"));
        assert!(summary.contains("2 plots"));
    }

    #[test]
    fn test_save_to_file() {
        let report = AnalysisReport::from_polygon(&completed(), Duration::ZERO).unwrap();
        let path = std::env::temp_dir().join("foret_report_test.json");
        report.save_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"fingerprint\": \"ab12\""));

        std::fs::remove_file(path).ok();
    }
}
