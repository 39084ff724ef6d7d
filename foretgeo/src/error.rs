//! Types d'erreurs pour le crate foretgeo

use thiserror::Error;

/// Erreurs du moteur d'analyse et de ses collaborateurs
#[derive(Debug, Error)]
pub enum ForetError {
    /// Polygone mal formé ou auto-intersectant (validation locale, jamais rejouée)
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Coordonnée hors du domaine de la projection Web Mercator
    #[error("Coordinate out of domain: lng={lng}, lat={lat}")]
    OutOfDomain { lng: f64, lat: f64 },

    /// Échec de l'interrogation d'une couche (récupéré localement par le resolver)
    #[error("Layer query failed for {layer}: {reason}")]
    LayerQueryFailed { layer: String, reason: String },

    /// Catalogue des placettes indisponible
    #[error("Forest catalogue unavailable: {0}")]
    CatalogueUnavailable(String),

    /// Référence inconnue (polygone, utilisateur)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Paramètre d'entrée invalide (emprise, nom)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transition d'état interdite sur un polygone terminal
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Échec du calcul d'intersection
    #[error("Overlay computation failed for plot {plot_id}: {reason}")]
    Overlay { plot_id: String, reason: String },

    /// Tâche de calcul interrompue avant d'avoir produit un résultat
    #[error("Analysis task aborted: {0}")]
    AnalysisAborted(String),

    /// Erreur du stockage des polygones utilisateur
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ForetError {
    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        Self::InvalidGeometry(reason.into())
    }

    /// Crée une erreur d'échec de couche
    pub fn layer_failed(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LayerQueryFailed {
            layer: layer.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de catalogue indisponible
    pub fn catalogue(reason: impl ToString) -> Self {
        Self::CatalogueUnavailable(reason.to_string())
    }

    /// Crée une erreur de stockage
    pub fn storage(reason: impl ToString) -> Self {
        Self::Storage(reason.to_string())
    }

    /// Erreur de validation (à rejeter avant toute persistance)
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidGeometry(_) | Self::InvalidInput(_))
    }
}
