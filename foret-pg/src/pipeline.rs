//! Analyse d'un polygone dessiné, de la validation à l'enregistrement
//!
//! 1. validation (nom et géométrie) : rien n'est enregistré en cas d'erreur
//! 2. création du polygone `pending`, surface calculée immédiatement
//! 3. placettes candidates dans l'emprise du polygone
//! 4. intersection et agrégation
//! 5. transition vers `completed` ou `failed`, puis un seul enregistrement

use std::sync::Arc;

use tracing::{debug, info, warn};

use foretgeo::geometry::fingerprint_hex;
use foretgeo::{
    AnalysisResult, DrawnPolygon, ForetError, GeoOverlay, IntersectionEngine, OverlayBackend,
    PlotFilter, UserPolygon, ValidPolygon,
};

use crate::ports::{CatalogueStore, PersistenceStore};

/// Pipeline d'analyse des polygones utilisateur
///
/// Aucun rejeu automatique : un polygone `failed` doit être soumis à nouveau.
pub struct AnalysisPipeline<B = GeoOverlay> {
    engine: Arc<IntersectionEngine<B>>,
    catalogue: Arc<dyn CatalogueStore>,
    store: Arc<dyn PersistenceStore>,
}

impl AnalysisPipeline<GeoOverlay> {
    pub fn new(catalogue: Arc<dyn CatalogueStore>, store: Arc<dyn PersistenceStore>) -> Self {
        Self::with_engine(IntersectionEngine::new(), catalogue, store)
    }
}

impl<B: OverlayBackend + 'static> AnalysisPipeline<B> {
    pub fn with_engine(
        engine: IntersectionEngine<B>,
        catalogue: Arc<dyn CatalogueStore>,
        store: Arc<dyn PersistenceStore>,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            catalogue,
            store,
        }
    }

    /// Soumet un polygone et retourne sa version enregistrée
    ///
    /// # Errors
    ///
    /// - `InvalidInput` si l'utilisateur ou le nom est vide
    /// - `InvalidGeometry` si le polygone est mal formé
    /// - `Storage` si l'enregistrement échoue
    ///
    /// Un échec du catalogue ou du calcul d'intersection n'est pas une
    /// erreur : le polygone est enregistré avec le statut `failed`.
    pub async fn submit(
        &self,
        owner_id: &str,
        name: &str,
        drawn: &DrawnPolygon,
    ) -> Result<UserPolygon, ForetError> {
        let name = name.trim();
        if owner_id.trim().is_empty() {
            return Err(ForetError::InvalidInput("owner id must not be empty".into()));
        }
        if name.is_empty() {
            return Err(ForetError::InvalidInput("polygon name must not be empty".into()));
        }

        let polygon = self.engine.validate(drawn)?;
        let area = self.engine.area_hectares(&polygon);
        let fingerprint = fingerprint_hex(polygon.geometry());

        let mut record = UserPolygon::pending(
            owner_id,
            name,
            polygon.geometry().clone(),
            area,
            fingerprint,
        );
        info!(owner = owner_id, name = name, area_ha = area, "Polygon submitted");

        match self.analyze(&polygon).await {
            Ok(result) => {
                info!(
                    plots = result.plot_count,
                    forest_ha = result.total_forest_area,
                    coverage = result.coverage_percentage,
                    "Polygon analysis completed"
                );
                record.complete(result)?;
            }
            Err(e) => {
                warn!(owner = owner_id, name = name, error = %e, "Polygon analysis failed");
                record.fail(e.to_string())?;
            }
        }

        let saved = self.store.save(record).await?;
        debug!(id = %saved.id, status = %saved.status, "Polygon stored");
        Ok(saved)
    }

    /// Polygones d'un utilisateur, du plus récent au plus ancien
    pub async fn list(&self, owner_id: &str) -> Result<Vec<UserPolygon>, ForetError> {
        self.store.get(owner_id).await
    }

    /// Supprime un polygone de l'utilisateur
    pub async fn delete(&self, owner_id: &str, polygon_id: &str) -> Result<(), ForetError> {
        self.store.delete(owner_id, polygon_id).await?;
        info!(owner = owner_id, id = polygon_id, "Polygon deleted");
        Ok(())
    }

    async fn analyze(&self, polygon: &ValidPolygon) -> Result<AnalysisResult, ForetError> {
        let filter = PlotFilter::within(polygon.bounds());
        let candidates = self.catalogue.list_plots(&filter).await.map_err(|e| match e {
            ForetError::CatalogueUnavailable(_) => e,
            other => ForetError::catalogue(other),
        })?;

        if candidates.len() >= filter.effective_limit() {
            warn!(
                candidates = candidates.len(),
                "Candidate plots reached the catalogue limit, analysis may be partial"
            );
        }
        debug!(candidates = candidates.len(), "Candidate plots fetched");

        // Calcul CPU (rayon) hors des threads du runtime
        let engine = Arc::clone(&self.engine);
        let polygon = polygon.clone();
        tokio::task::spawn_blocking(move || engine.analyze(&polygon, &candidates))
            .await
            .map_err(|e| ForetError::AnalysisAborted(e.to_string()))?
    }
}
