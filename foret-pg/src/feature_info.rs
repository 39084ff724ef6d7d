//! Identification des features sous un point cliqué
//!
//! Une requête par couche, toutes lancées en parallèle. L'échec d'une
//! couche n'affecte pas les autres : il est journalisé et la couche
//! apparaît sans feature dans le résultat.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use foretgeo::projection::{bounds_to_mercator, to_web_mercator};
use foretgeo::{
    Bounds, FeatureQueryResult, ForetError, LayerFeature, LayerId, LayerResult, RawFeature,
};

use crate::config::LayerConfig;
use crate::ports::FeatureQueryService;

/// Propriétés candidates pour le nom affiché, par priorité
pub const DEFAULT_NAME_KEYS: &[&str] = &["nom_officiel", "nom", "name", "libelle"];

/// La couche forêt ne porte pas de nom officiel
pub const FOREST_NAME_KEYS: &[&str] = &["name", "nom", "libelle"];

/// Propriétés portant l'identifiant quand la feature n'en a pas
const ID_KEYS: &[&str] = &["id", "ID"];

/// Propriétés de la couche forêt (BD Forêt)
const FOREST_TYPE_KEYS: &[&str] = &["TFV", "tfv", "type_foret"];
const FOREST_TYPE_CODE_KEYS: &[&str] = &["CODE_TFV", "code_tfv"];
const FOREST_GROUP_KEYS: &[&str] = &["TFV_G11", "tfv_g11"];
const SPECIES_KEYS: &[&str] = &["ESSENCE", "essence", "essences"];

/// Clés par défaut d'une couche
pub fn default_name_keys(layer: LayerId) -> &'static [&'static str] {
    match layer {
        LayerId::Forest => FOREST_NAME_KEYS,
        _ => DEFAULT_NAME_KEYS,
    }
}

/// Résolution multi-couches au point
#[derive(Clone)]
pub struct FeatureInfoResolver {
    service: Arc<dyn FeatureQueryService>,
    layers: Vec<LayerConfig>,
}

impl FeatureInfoResolver {
    pub fn new(service: Arc<dyn FeatureQueryService>, layers: Vec<LayerConfig>) -> Self {
        Self { service, layers }
    }

    pub fn layers(&self) -> &[LayerConfig] {
        &self.layers
    }

    /// Interroge toutes les couches et attend qu'elles aient toutes répondu
    ///
    /// # Errors
    ///
    /// `OutOfDomain` si le point est hors du domaine Web Mercator. Les
    /// échecs de couches ne sont jamais remontés.
    pub async fn query(
        &self,
        lng: f64,
        lat: f64,
        viewport: &Bounds,
    ) -> Result<FeatureQueryResult, ForetError> {
        self.query_until(lng, lat, viewport, std::future::pending::<()>())
            .await
    }

    /// Comme [`query`](Self::query), mais cesse d'attendre dès que `cancel` se termine
    ///
    /// Les couches déjà résolues conservent leur résultat, les autres
    /// restent sans feature.
    pub async fn query_until<C>(
        &self,
        lng: f64,
        lat: f64,
        viewport: &Bounds,
        cancel: C,
    ) -> Result<FeatureQueryResult, ForetError>
    where
        C: Future<Output = ()>,
    {
        let point = to_web_mercator(lng, lat)?;
        let viewport = bounds_to_mercator(&viewport.clamp_to_mercator_domain())?;

        let mut features: Vec<Option<LayerFeature>> = vec![None; self.layers.len()];

        let mut pending: FuturesUnordered<_> = self
            .layers
            .iter()
            .enumerate()
            .map(|(idx, layer)| async move {
                (idx, self.service.query(layer, point, viewport).await)
            })
            .collect();

        tokio::pin!(cancel);

        loop {
            tokio::select! {
                biased;

                next = pending.next() => match next {
                    Some((idx, Ok(raw))) => {
                        let layer = &self.layers[idx];
                        debug!(layer = %layer.id, found = raw.is_some(), "Layer queried");
                        features[idx] = raw.map(|raw| normalize_feature(layer, raw));
                    }
                    Some((idx, Err(e))) => {
                        warn!(layer = %self.layers[idx].id, error = %e, "Layer query failed");
                    }
                    None => break,
                },
                _ = &mut cancel => {
                    warn!(pending = pending.len(), "Feature query cancelled");
                    break;
                }
            }
        }

        let layers = self
            .layers
            .iter()
            .zip(features)
            .map(|(layer, feature)| LayerResult {
                layer: layer.id,
                feature,
            })
            .collect();

        Ok(FeatureQueryResult { lng, lat, layers })
    }
}

/// Normalise une feature brute : identifiant et nom affiché
///
/// Les propriétés sont transmises telles quelles.
pub fn normalize_feature(layer: &LayerConfig, raw: RawFeature) -> LayerFeature {
    let display_name = if layer.name_keys.is_empty() {
        first_value(&raw.properties, default_name_keys(layer.id).iter().copied())
    } else {
        first_value(&raw.properties, layer.name_keys.iter().map(String::as_str))
    };

    let feature_id = raw
        .id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| first_value(&raw.properties, ID_KEYS.iter().copied()));

    LayerFeature {
        feature_id,
        display_name,
        properties: raw.properties,
    }
}

/// Première propriété présente, chaîne non vide ou nombre
fn first_value<'a>(
    properties: &Map<String, Value>,
    keys: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    keys.into_iter()
        .find_map(|key| properties.get(key).and_then(scalar_to_string))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Attributs forestiers lus sur une feature de la couche forêt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForestDetails {
    pub forest_type: Option<String>,
    pub forest_type_code: Option<String>,
    pub forest_group: Option<String>,
    pub species: Option<String>,
}

impl ForestDetails {
    pub fn from_feature(feature: &LayerFeature) -> Self {
        let props = &feature.properties;
        Self {
            forest_type: first_value(props, FOREST_TYPE_KEYS.iter().copied()),
            forest_type_code: first_value(props, FOREST_TYPE_CODE_KEYS.iter().copied()),
            forest_group: first_value(props, FOREST_GROUP_KEYS.iter().copied()),
            species: first_value(props, SPECIES_KEYS.iter().copied()),
        }
    }
}
