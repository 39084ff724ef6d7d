//! Stockage en mémoire (tests, CLI sur fichier GeoJSON)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use foretgeo::{ForestPlot, ForetError, HierarchyLevel, PlotFilter, UserPolygon};

use crate::ports::{parent_filter, CatalogueStore, PersistenceStore};

/// Catalogue de placettes chargé en mémoire
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogue {
    plots: Vec<ForestPlot>,
}

impl MemoryCatalogue {
    pub fn new(plots: Vec<ForestPlot>) -> Self {
        Self { plots }
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }
}

#[async_trait]
impl CatalogueStore for MemoryCatalogue {
    async fn list_plots(&self, filter: &PlotFilter) -> Result<Vec<ForestPlot>, ForetError> {
        Ok(self
            .plots
            .iter()
            .filter(|plot| filter.matches(plot))
            .take(filter.effective_limit())
            .cloned()
            .collect())
    }

    /// Parcours complet, sans le plafond de `list_plots`
    async fn distinct_codes(
        &self,
        level: HierarchyLevel,
        parent: Option<&str>,
    ) -> Result<Vec<String>, ForetError> {
        let filter = parent_filter(level, parent);
        Ok(self
            .plots
            .iter()
            .filter(|plot| filter.matches(plot))
            .filter_map(|plot| plot.code(level))
            .map(str::to_string)
            .collect())
    }
}

/// Polygones utilisateur en mémoire
#[derive(Debug, Default)]
pub struct MemoryPolygonStore {
    polygons: RwLock<Vec<UserPolygon>>,
    next_id: AtomicU64,
}

impl MemoryPolygonStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> ForetError {
    ForetError::storage("polygon store lock poisoned")
}

#[async_trait]
impl PersistenceStore for MemoryPolygonStore {
    async fn save(&self, mut polygon: UserPolygon) -> Result<UserPolygon, ForetError> {
        let mut polygons = self.polygons.write().map_err(|_| poisoned())?;

        if polygon.id.is_empty() {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            polygon.id = id.to_string();
        }

        match polygons.iter_mut().find(|p| p.id == polygon.id) {
            Some(existing) => *existing = polygon.clone(),
            None => polygons.push(polygon.clone()),
        }

        Ok(polygon)
    }

    async fn get(&self, owner_id: &str) -> Result<Vec<UserPolygon>, ForetError> {
        let polygons = self.polygons.read().map_err(|_| poisoned())?;

        // Ordre d'insertion inversé : le plus récent d'abord
        Ok(polygons
            .iter()
            .rev()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, owner_id: &str, polygon_id: &str) -> Result<(), ForetError> {
        let mut polygons = self.polygons.write().map_err(|_| poisoned())?;

        let idx = polygons
            .iter()
            .position(|p| p.id == polygon_id && p.owner_id == owner_id)
            .ok_or_else(|| ForetError::NotFound(format!("polygon {}", polygon_id)))?;
        polygons.remove(idx);
        Ok(())
    }
}
