//! Moteur d'intersection polygone × placettes forestières
//!
//! 1. validation du polygone dessiné
//! 2. surface géodésique du polygone (toujours calculée)
//! 3. pré-filtre par rectangle englobant, puis intersection exacte par placette
//! 4. agrégation par essence et par type de forêt
//!
//! Le calcul géométrique passe par [`OverlayBackend`] : la bibliothèque de
//! géométrie peut être remplacée sans toucher au reste du moteur.

use std::panic::{catch_unwind, AssertUnwindSafe};

use geo::{BooleanOps, Intersects, MultiPolygon};
use rayon::prelude::*;
use tracing::debug;

use crate::aggregate::{aggregate, PlotOverlap};
use crate::geometry::{area_hectares, DrawnPolygon, ValidPolygon};
use crate::types::{AnalysisResult, ForestPlot};
use crate::ForetError;

/// En dessous de cette surface (ha), une intersection est considérée vide
///
/// Deux placettes qui se touchent par un bord produisent des lambeaux
/// de surface quasi nulle.
pub const MIN_OVERLAP_HECTARES: f64 = 1e-6;

/// Opérations géométriques nécessaires au moteur
pub trait OverlayBackend: Send + Sync {
    /// Intersection de deux multipolygones WGS84
    fn intersection(&self, a: &MultiPolygon, b: &MultiPolygon) -> Result<MultiPolygon, String>;

    /// Surface en hectares, indépendante de la projection de travail
    fn area_hectares(&self, geometry: &MultiPolygon) -> f64;
}

/// Implémentation par défaut, basée sur le crate `geo`
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoOverlay;

impl OverlayBackend for GeoOverlay {
    fn intersection(&self, a: &MultiPolygon, b: &MultiPolygon) -> Result<MultiPolygon, String> {
        // L'overlay booléen de geo peut paniquer sur des géométries dégénérées
        catch_unwind(AssertUnwindSafe(|| a.intersection(b)))
            .map_err(|_| "boolean overlay panicked".to_string())
    }

    fn area_hectares(&self, geometry: &MultiPolygon) -> f64 {
        area_hectares(geometry)
    }
}

/// Moteur d'intersection spatiale
#[derive(Debug, Clone, Default)]
pub struct IntersectionEngine<B = GeoOverlay> {
    backend: B,
}

impl IntersectionEngine<GeoOverlay> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: OverlayBackend> IntersectionEngine<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Valide un polygone dessiné
    pub fn validate(&self, drawn: &DrawnPolygon) -> Result<ValidPolygon, ForetError> {
        drawn.validate()
    }

    /// Surface du polygone en hectares
    pub fn area_hectares(&self, polygon: &ValidPolygon) -> f64 {
        self.backend.area_hectares(polygon.geometry()).max(0.0)
    }

    /// Calcule les intersections non vides avec les placettes candidates
    ///
    /// L'ordre des placettes est conservé.
    pub fn intersect<'a>(
        &self,
        polygon: &ValidPolygon,
        plots: &'a [ForestPlot],
    ) -> Result<Vec<PlotOverlap<'a>>, ForetError> {
        let rect = polygon.bounding_rect();

        let overlaps = plots
            .par_iter()
            .map(|plot| -> Result<Option<PlotOverlap<'a>>, ForetError> {
                let Some(plot_rect) = plot.bounding_rect() else {
                    return Ok(None);
                };
                if !rect.intersects(&plot_rect) {
                    return Ok(None);
                }

                let shared = self
                    .backend
                    .intersection(polygon.geometry(), &plot.boundary)
                    .map_err(|reason| ForetError::Overlay {
                        plot_id: plot.id.clone(),
                        reason,
                    })?;
                if shared.0.is_empty() {
                    return Ok(None);
                }

                let area = self.backend.area_hectares(&shared);
                if area < MIN_OVERLAP_HECTARES {
                    return Ok(None);
                }

                Ok(Some(PlotOverlap {
                    plot,
                    area_hectares: area,
                }))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(overlaps.into_iter().flatten().collect())
    }

    /// Analyse complète d'un polygone validé contre un ensemble de placettes
    pub fn analyze(
        &self,
        polygon: &ValidPolygon,
        plots: &[ForestPlot],
    ) -> Result<AnalysisResult, ForetError> {
        let area = self.area_hectares(polygon);
        let overlaps = self.intersect(polygon, plots)?;

        debug!(
            candidates = plots.len(),
            intersecting = overlaps.len(),
            area_ha = area,
            "Intersection computed"
        );

        Ok(aggregate(&overlaps, area))
    }
}
