//! Configuration des couches et du serveur WMS

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use foretgeo::LayerId;

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub wms: WmsConfig,

    /// Couches interrogées au clic, dans l'ordre d'affichage
    pub layers: Vec<LayerConfig>,
}

/// Paramètres du serveur WMS (GetFeatureInfo)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WmsConfig {
    /// URL de base, sans le workspace (ex: `http://host/geoserver`)
    pub base_url: String,

    /// Workspace GeoServer, préfixe des noms de couches
    pub workspace: String,

    /// Taille de l'image virtuelle utilisée pour la position pixel du clic
    #[serde(default = "default_raster_size")]
    pub width: u32,
    #[serde(default = "default_raster_size")]
    pub height: u32,

    /// Délai maximum d'une requête (secondes)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Configuration d'une couche
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LayerConfig {
    pub id: LayerId,

    /// Nom de la couche côté WMS (sans workspace)
    pub name: String,

    /// Propriétés candidates pour le nom affiché, par priorité
    #[serde(default)]
    pub name_keys: Vec<String>,
}

fn default_raster_size() -> u32 {
    256
}

fn default_timeout() -> u64 {
    10
}

impl LayerConfig {
    pub fn new(id: LayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            name_keys: Vec::new(),
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "default" => Self::load_embedded(include_str!("presets/default.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: default", preset),
        }
    }

    /// Preset embarqué ou chemin vers un fichier JSON
    pub fn resolve(name: &str) -> Result<Self> {
        let path = Path::new(name);
        if name.ends_with(".json") || path.exists() {
            Self::load(path)
        } else {
            Self::from_preset(name)
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Surcharges `GEOSERVER_URL` et `GEOSERVER_WORKSPACE`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GEOSERVER_URL") {
            self.wms.base_url = url;
        }
        if let Ok(workspace) = std::env::var("GEOSERVER_WORKSPACE") {
            self.wms.workspace = workspace;
        }
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerConfig> {
        self.layers.iter().find(|l| l.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preset() {
        let config = Config::from_preset("default").unwrap();
        let ids: Vec<LayerId> = config.layers.iter().map(|l| l.id).collect();
        assert_eq!(ids, LayerId::ALL.to_vec());
        assert_eq!(config.wms.workspace, "prod");

        // Le nom WMS de la couche commune diffère de son identifiant
        assert_eq!(config.layer(LayerId::Commune).unwrap().name, "cummune");
        assert_eq!(
            config.layer(LayerId::Forest).unwrap().name_keys,
            vec!["name", "nom", "libelle"]
        );
    }

    #[test]
    fn test_unknown_preset() {
        assert!(Config::from_preset("full").is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let config: Config = serde_json::from_str(
            r#"{"wms":{"base_url":"http://x","workspace":"w"},
                "layers":[{"id":"forest","name":"bdforet"}]}"#,
        )
        .unwrap();
        assert_eq!(config.wms.width, 256);
        assert_eq!(config.wms.timeout_secs, 10);
        assert!(config.layers[0].name_keys.is_empty());
    }
}
