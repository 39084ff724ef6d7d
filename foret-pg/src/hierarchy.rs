//! Filtres en cascade : région → département → commune → lieu-dit

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use foretgeo::{ForestPlot, ForetError, HierarchyLevel, PlotFilter};

use crate::ports::CatalogueStore;

/// Résolution des valeurs disponibles à chaque niveau de la hiérarchie
///
/// Chaque liste est dédoublonnée et triée, quel que soit l'adaptateur.
/// Un parent inconnu donne une liste vide.
#[derive(Clone)]
pub struct HierarchyResolver {
    catalogue: Arc<dyn CatalogueStore>,
}

impl HierarchyResolver {
    pub fn new(catalogue: Arc<dyn CatalogueStore>) -> Self {
        Self { catalogue }
    }

    pub async fn list_regions(&self) -> Result<Vec<String>, ForetError> {
        self.distinct(HierarchyLevel::Region, None).await
    }

    pub async fn list_departments(&self, region_code: &str) -> Result<Vec<String>, ForetError> {
        self.distinct(HierarchyLevel::Department, Some(region_code))
            .await
    }

    pub async fn list_communes(&self, department_code: &str) -> Result<Vec<String>, ForetError> {
        self.distinct(HierarchyLevel::Commune, Some(department_code))
            .await
    }

    /// Lieux-dits d'une commune (valeurs nulles ou vides exclues)
    pub async fn list_place_names(&self, commune_code: &str) -> Result<Vec<String>, ForetError> {
        self.distinct(HierarchyLevel::PlaceName, Some(commune_code))
            .await
    }

    /// Placettes correspondant au filtre, plafonnées à `filter.effective_limit()`
    pub async fn list_plots(&self, filter: &PlotFilter) -> Result<Vec<ForestPlot>, ForetError> {
        let limit = filter.effective_limit();
        let mut plots = self
            .catalogue
            .list_plots(filter)
            .await
            .map_err(as_catalogue_error)?;

        if plots.len() > limit {
            warn!(
                returned = plots.len(),
                limit = limit,
                "Catalogue returned more plots than requested, truncating"
            );
            plots.truncate(limit);
        }

        debug!(plots = plots.len(), "Plots listed");
        Ok(plots)
    }

    async fn distinct(
        &self,
        level: HierarchyLevel,
        parent: Option<&str>,
    ) -> Result<Vec<String>, ForetError> {
        let codes = self
            .catalogue
            .distinct_codes(level, parent)
            .await
            .map_err(as_catalogue_error)?;

        let values: BTreeSet<String> = codes
            .into_iter()
            .filter(|code| !code.trim().is_empty())
            .collect();

        debug!(
            level = level.as_str(),
            parent = parent.unwrap_or("-"),
            count = values.len(),
            "Hierarchy level resolved"
        );

        Ok(values.into_iter().collect())
    }
}

/// Toute erreur du catalogue est remontée comme indisponibilité
fn as_catalogue_error(err: ForetError) -> ForetError {
    match err {
        ForetError::CatalogueUnavailable(_) => err,
        other => ForetError::catalogue(other),
    }
}
