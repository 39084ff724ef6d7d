//! Agrégation des surfaces intersectées par essence et par type de forêt

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{AnalysisResult, ForestPlot, SpeciesShare};

/// Placette intersectée et surface de l'intersection
#[derive(Debug, Clone, Copy)]
pub struct PlotOverlap<'a> {
    pub plot: &'a ForestPlot,
    /// Surface de l'intersection avec le polygone (ha)
    pub area_hectares: f64,
}

/// Construit le résultat d'analyse à partir des placettes intersectées
///
/// Une placette à plusieurs essences attribue sa surface intersectée
/// *entière* à chacune : la donnée source ne ventile pas la surface par
/// essence. Les pourcentages sont rapportés à la somme des surfaces par
/// essence, ce qui garantit un total de 100 ; cette somme vaut
/// `total_forest_area` dès que chaque placette porte une seule essence.
pub fn aggregate(overlaps: &[PlotOverlap<'_>], polygon_area_hectares: f64) -> AnalysisResult {
    let total_forest_area: f64 = overlaps.iter().map(|o| o.area_hectares).sum();

    if total_forest_area <= 0.0 {
        return AnalysisResult {
            plot_count: overlaps.len(),
            ..Default::default()
        };
    }

    let mut forest_types = BTreeSet::new();
    let mut species_area: BTreeMap<&str, f64> = BTreeMap::new();

    for overlap in overlaps {
        if let Some(forest_type) = overlap
            .plot
            .forest_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            forest_types.insert(forest_type.to_string());
        }

        // Un même libellé (aux espaces près) ne compte qu'une fois par placette
        let labels: BTreeSet<&str> = overlap
            .plot
            .species
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        for label in labels {
            *species_area.entry(label).or_insert(0.0) += overlap.area_hectares;
        }
    }

    let species_total: f64 = species_area.values().sum();
    let mut species_distribution: Vec<SpeciesShare> = species_area
        .into_iter()
        .map(|(species, area)| SpeciesShare {
            species: species.to_string(),
            area_hectares: area,
            percentage: (area / species_total * 100.0).clamp(0.0, 100.0),
        })
        .collect();

    // Surface décroissante, puis ordre alphabétique pour le déterminisme
    species_distribution.sort_by(|a, b| {
        b.area_hectares
            .total_cmp(&a.area_hectares)
            .then_with(|| a.species.cmp(&b.species))
    });

    let coverage_percentage = if polygon_area_hectares > 0.0 {
        (total_forest_area / polygon_area_hectares * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    AnalysisResult {
        plot_count: overlaps.len(),
        total_forest_area,
        coverage_percentage,
        forest_types: forest_types.into_iter().collect(),
        species_distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::MultiPolygon;

    fn plot(id: &str, species: &[&str], forest_type: Option<&str>) -> ForestPlot {
        ForestPlot {
            id: id.to_string(),
            region_code: "84".to_string(),
            department_code: "38".to_string(),
            commune_code: "38185".to_string(),
            place_name: None,
            boundary: MultiPolygon::new(vec![]),
            species: species.iter().map(|s| s.to_string()).collect(),
            surface_hectares: None,
            forest_type: forest_type.map(str::to_string),
        }
    }

    fn percentage_sum(result: &AnalysisResult) -> f64 {
        result.species_distribution.iter().map(|s| s.percentage).sum()
    }

    #[test]
    fn test_single_species() {
        let oak = plot("1", &["oak"], Some("broadleaf"));
        let result = aggregate(
            &[PlotOverlap {
                plot: &oak,
                area_hectares: 12.5,
            }],
            25.0,
        );

        assert_eq!(result.plot_count, 1);
        assert_eq!(result.total_forest_area, 12.5);
        assert_eq!(result.coverage_percentage, 50.0);
        assert_eq!(result.forest_types, vec!["broadleaf"]);
        assert_eq!(result.species_distribution.len(), 1);
        assert_eq!(result.species_distribution[0].species, "oak");
        assert_eq!(result.species_distribution[0].percentage, 100.0);
    }

    #[test]
    fn test_mixed_plot_counts_full_area_per_species() {
        let mixed = plot("1", &["oak", "beech"], Some("mixed"));
        let pine = plot("2", &["pine"], Some("conifer"));
        let result = aggregate(
            &[
                PlotOverlap {
                    plot: &mixed,
                    area_hectares: 10.0,
                },
                PlotOverlap {
                    plot: &pine,
                    area_hectares: 5.0,
                },
            ],
            100.0,
        );

        assert_eq!(result.total_forest_area, 15.0);
        let oak = result
            .species_distribution
            .iter()
            .find(|s| s.species == "oak")
            .unwrap();
        assert_eq!(oak.area_hectares, 10.0);
        // Dénominateur : 10 + 10 + 5 ha (somme par essence), pas les 15 ha de forêt
        assert!((oak.percentage - 40.0).abs() < 1e-9);
        assert!((percentage_sum(&result) - 100.0).abs() < 0.01);
        assert!(result
            .species_distribution
            .iter()
            .all(|s| (0.0..=100.0).contains(&s.percentage)));

        // beech et oak à égalité (10 ha) : ordre alphabétique, puis pine
        let names: Vec<&str> = result
            .species_distribution
            .iter()
            .map(|s| s.species.as_str())
            .collect();
        assert_eq!(names, vec!["beech", "oak", "pine"]);
        assert_eq!(result.forest_types, vec!["conifer", "mixed"]);
    }

    #[test]
    fn test_species_accumulate_across_plots() {
        let a = plot("1", &["oak"], None);
        let b = plot("2", &[" oak ", ""], None);
        let result = aggregate(
            &[
                PlotOverlap {
                    plot: &a,
                    area_hectares: 2.0,
                },
                PlotOverlap {
                    plot: &b,
                    area_hectares: 3.0,
                },
            ],
            10.0,
        );
        assert_eq!(result.species_distribution.len(), 1);
        assert_eq!(result.species_distribution[0].area_hectares, 5.0);
        assert!(result.forest_types.is_empty());
    }

    #[test]
    fn test_empty() {
        let result = aggregate(&[], 10.0);
        assert_eq!(result.plot_count, 0);
        assert_eq!(result.total_forest_area, 0.0);
        assert_eq!(result.coverage_percentage, 0.0);
        assert!(result.species_distribution.is_empty());
        assert!(result.forest_types.is_empty());
    }

    #[test]
    fn test_zero_area_yields_empty_distributions() {
        let oak = plot("1", &["oak"], Some("broadleaf"));
        let result = aggregate(
            &[PlotOverlap {
                plot: &oak,
                area_hectares: 0.0,
            }],
            10.0,
        );
        assert!(result.species_distribution.is_empty());
        assert!(result.forest_types.is_empty());
    }

    #[test]
    fn test_coverage_clamped() {
        let oak = plot("1", &["oak"], None);
        let result = aggregate(
            &[PlotOverlap {
                plot: &oak,
                area_hectares: 10.000001,
            }],
            10.0,
        );
        assert_eq!(result.coverage_percentage, 100.0);
        assert_eq!(aggregate(&[PlotOverlap { plot: &oak, area_hectares: 1.0 }], 0.0).coverage_percentage, 0.0);
    }
}
