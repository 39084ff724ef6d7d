//! Contrats des collaborateurs externes
//!
//! Le cœur ne connaît ni PostGIS ni le serveur WMS : il consomme ces
//! traits, implémentés par les adaptateurs de [`crate::store`] et
//! [`crate::wms`].

use async_trait::async_trait;

use foretgeo::projection::{MercatorBounds, MercatorPoint};
use foretgeo::{ForestPlot, ForetError, HierarchyLevel, PlotFilter, RawFeature, UserPolygon};

use crate::config::LayerConfig;

/// Catalogue des placettes forestières (lecture seule)
#[async_trait]
pub trait CatalogueStore: Send + Sync {
    /// Placettes correspondant au filtre, au plus `filter.effective_limit()`
    async fn list_plots(&self, filter: &PlotFilter) -> Result<Vec<ForestPlot>, ForetError>;

    /// Codes d'un niveau de la hiérarchie, sous un parent éventuel
    ///
    /// L'implémentation par défaut passe par [`CatalogueStore::list_plots`] ;
    /// les adaptateurs SQL la remplacent par un `SELECT DISTINCT`. Le
    /// résultat n'a pas besoin d'être trié ni dédoublonné.
    async fn distinct_codes(
        &self,
        level: HierarchyLevel,
        parent: Option<&str>,
    ) -> Result<Vec<String>, ForetError> {
        let filter = parent_filter(level, parent);
        let plots = self.list_plots(&filter).await?;
        Ok(plots
            .iter()
            .filter_map(|plot| plot.code(level))
            .map(str::to_string)
            .collect())
    }
}

/// Service d'interrogation ponctuelle d'une couche cartographique
#[async_trait]
pub trait FeatureQueryService: Send + Sync {
    /// Première feature de la couche sous le point, `None` si aucune
    async fn query(
        &self,
        layer: &LayerConfig,
        point: MercatorPoint,
        viewport: MercatorBounds,
    ) -> Result<Option<RawFeature>, ForetError>;
}

/// Stockage des polygones utilisateur
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Enregistre le polygone et retourne la version stockée (identifiant attribué)
    async fn save(&self, polygon: UserPolygon) -> Result<UserPolygon, ForetError>;

    /// Polygones d'un utilisateur, du plus récent au plus ancien
    async fn get(&self, owner_id: &str) -> Result<Vec<UserPolygon>, ForetError>;

    /// Supprime un polygone ; `NotFound` s'il n'existe pas pour cet utilisateur
    async fn delete(&self, owner_id: &str, polygon_id: &str) -> Result<(), ForetError>;
}

/// Filtre restreignant la recherche au parent d'un niveau
pub fn parent_filter(level: HierarchyLevel, parent: Option<&str>) -> PlotFilter {
    match (level.parent(), parent) {
        (Some(parent_level), Some(code)) => PlotFilter::for_level(parent_level, code),
        _ => PlotFilter::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_filter() {
        let filter = parent_filter(HierarchyLevel::Commune, Some("38"));
        assert_eq!(filter.department_code.as_deref(), Some("38"));
        assert!(filter.region_code.is_none());

        // La région n'a pas de parent : le code fourni est ignoré
        assert_eq!(
            parent_filter(HierarchyLevel::Region, Some("84")),
            PlotFilter::default()
        );
        assert_eq!(
            parent_filter(HierarchyLevel::PlaceName, None),
            PlotFilter::default()
        );
    }
}
