//! Adaptateur WMS GetFeatureInfo (GeoServer)
//!
//! Requête WMS 1.1.1 en EPSG:3857, réponse demandée en GeoJSON, une
//! seule feature par couche.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use geojson::{feature::Id, FeatureCollection};
use tracing::debug;

use foretgeo::projection::{MercatorBounds, MercatorPoint};
use foretgeo::{ForetError, RawFeature};

use crate::config::{LayerConfig, WmsConfig};
use crate::ports::FeatureQueryService;

/// Service de couches via GetFeatureInfo
#[derive(Debug, Clone)]
pub struct WmsFeatureService {
    client: reqwest::Client,
    config: WmsConfig,
}

impl WmsFeatureService {
    pub fn new(config: WmsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// `{base_url}/{workspace}/wms`
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/wms",
            self.config.base_url.trim_end_matches('/'),
            self.config.workspace
        )
    }

    /// Paramètres de la requête GetFeatureInfo
    pub fn query_params(
        &self,
        layer: &LayerConfig,
        point: MercatorPoint,
        viewport: MercatorBounds,
    ) -> Vec<(&'static str, String)> {
        let qualified = format!("{}:{}", self.config.workspace, layer.name);
        let (x, y) = pixel_position(point, viewport, self.config.width, self.config.height);

        vec![
            ("service", "WMS".to_string()),
            ("version", "1.1.1".to_string()),
            ("request", "GetFeatureInfo".to_string()),
            ("layers", qualified.clone()),
            ("query_layers", qualified),
            ("styles", String::new()),
            ("srs", "EPSG:3857".to_string()),
            ("bbox", viewport.to_bbox_param()),
            ("width", self.config.width.to_string()),
            ("height", self.config.height.to_string()),
            ("x", x.to_string()),
            ("y", y.to_string()),
            ("format", "image/png".to_string()),
            ("info_format", "application/json".to_string()),
            ("feature_count", "1".to_string()),
        ]
    }
}

/// Position pixel du point dans l'image virtuelle de la vue
///
/// L'origine est en haut à gauche ; un point hors de la vue est ramené au bord.
pub fn pixel_position(
    point: MercatorPoint,
    viewport: MercatorBounds,
    width: u32,
    height: u32,
) -> (u32, u32) {
    fn axis(offset: f64, extent: f64, size: u32) -> u32 {
        let max = size.saturating_sub(1);
        if extent <= 0.0 || !offset.is_finite() {
            return size / 2;
        }
        let pixel = (offset / extent * f64::from(size)).floor();
        pixel.clamp(0.0, f64::from(max)) as u32
    }

    (
        axis(point.x - viewport.min_x, viewport.width(), width),
        axis(viewport.max_y - point.y, viewport.height(), height),
    )
}

/// Lit la première feature d'une réponse GeoJSON
pub fn parse_feature_info(body: &str) -> Result<Option<RawFeature>, String> {
    let collection: FeatureCollection = body
        .parse()
        .map_err(|e: geojson::Error| format!("invalid GeoJSON response: {}", e))?;

    Ok(collection.features.into_iter().next().map(|feature| RawFeature {
        id: feature.id.map(|id| match id {
            Id::String(s) => s,
            Id::Number(n) => n.to_string(),
        }),
        properties: feature.properties.unwrap_or_default(),
    }))
}

#[async_trait]
impl FeatureQueryService for WmsFeatureService {
    async fn query(
        &self,
        layer: &LayerConfig,
        point: MercatorPoint,
        viewport: MercatorBounds,
    ) -> Result<Option<RawFeature>, ForetError> {
        let layer_id = layer.id.as_str();
        let params = self.query_params(layer, point, viewport);

        let response = self
            .client
            .get(self.endpoint())
            .query(&params)
            .send()
            .await
            .map_err(|e| ForetError::layer_failed(layer_id, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForetError::layer_failed(
                layer_id,
                format!("HTTP {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ForetError::layer_failed(layer_id, e.to_string()))?;

        debug!(layer = layer_id, bytes = body.len(), "GetFeatureInfo response");
        parse_feature_info(&body).map_err(|reason| ForetError::layer_failed(layer_id, reason))
    }
}
