//! Tests d'intégration des services, avec des collaborateurs en mémoire

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use async_trait::async_trait;
use geo::{MultiPolygon, Polygon};
use serde_json::json;

use foret_pg::config::{Config, LayerConfig};
use foret_pg::store::{MemoryCatalogue, MemoryPolygonStore};
use foret_pg::{
    AnalysisPipeline, CatalogueStore, FeatureInfoResolver, FeatureQueryService,
    HierarchyResolver, PersistenceStore,
};
use foretgeo::projection::{MercatorBounds, MercatorPoint};
use foretgeo::{
    Bounds, DrawnPolygon, ForestPlot, ForetError, LayerId, PlotFilter, PolygonStatus, RawFeature,
};

fn plot(
    id: &str,
    codes: (&str, &str, &str, Option<&str>),
    corner: (f64, f64),
    side: f64,
    species: &[&str],
    forest_type: &str,
) -> ForestPlot {
    let (lng, lat) = corner;
    let ring = vec![
        (lng, lat),
        (lng + side, lat),
        (lng + side, lat + side),
        (lng, lat + side),
        (lng, lat),
    ];
    ForestPlot {
        id: id.to_string(),
        region_code: codes.0.to_string(),
        department_code: codes.1.to_string(),
        commune_code: codes.2.to_string(),
        place_name: codes.3.map(str::to_string),
        boundary: MultiPolygon::new(vec![Polygon::new(ring.into(), vec![])]),
        species: species.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        surface_hectares: None,
        forest_type: Some(forest_type.to_string()),
    }
}

fn catalogue() -> MemoryCatalogue {
    MemoryCatalogue::new(vec![
        plot("oak", ("84", "38", "38185", Some("Le Grand Bois")), (5.70, 45.17), 0.05, &["oak"], "broadleaf"),
        plot("pine", ("84", "38", "38421", None), (5.90, 45.30), 0.02, &["pine"], "conifer"),
        plot("larch", ("84", "73", "73065", Some("Les Plans")), (6.50, 45.40), 0.02, &["larch"], "conifer"),
        plot("beech", ("93", "05", "05061", Some("Le Sapet")), (6.10, 44.60), 0.02, &["beech"], "broadleaf"),
    ])
}

fn square(lng: f64, lat: f64, side: f64) -> DrawnPolygon {
    DrawnPolygon::from_rings(vec![vec![
        [lng, lat],
        [lng, lat + side],
        [lng + side, lat + side],
        [lng + side, lat],
        [lng, lat],
    ]])
}

/// Catalogue toujours en panne
struct DownCatalogue;

#[async_trait]
impl CatalogueStore for DownCatalogue {
    async fn list_plots(&self, _filter: &PlotFilter) -> Result<Vec<ForestPlot>, ForetError> {
        Err(ForetError::CatalogueUnavailable("connection refused".into()))
    }
}

// --- Pipeline -------------------------------------------------------------

#[tokio::test]
async fn test_oak_scenario_completes() {
    let store = Arc::new(MemoryPolygonStore::new());
    let pipeline = AnalysisPipeline::new(Arc::new(catalogue()), store.clone());

    let saved = pipeline
        .submit("alice", "Bois de chênes", &square(5.71, 45.18, 0.01))
        .await
        .unwrap();

    assert_eq!(saved.status, PolygonStatus::Completed);
    assert!(!saved.id.is_empty());
    assert!(saved.area_hectares > 0.0);

    let analysis = saved.analysis.as_ref().unwrap();
    assert_eq!(analysis.plot_count, 1);
    assert_eq!(analysis.forest_types, vec!["broadleaf"]);
    assert_eq!(analysis.species_distribution[0].species, "oak");
    assert_relative_eq!(analysis.species_distribution[0].percentage, 100.0);
    assert_relative_eq!(analysis.total_forest_area, saved.area_hectares, max_relative = 1e-6);

    let listed = store.get("alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, saved.id);
}

#[tokio::test]
async fn test_disjoint_polygon_completes_with_zeros() {
    let pipeline = AnalysisPipeline::new(
        Arc::new(catalogue()),
        Arc::new(MemoryPolygonStore::new()),
    );

    let saved = pipeline
        .submit("alice", "Paris", &square(2.34, 48.85, 0.01))
        .await
        .unwrap();

    assert_eq!(saved.status, PolygonStatus::Completed);
    let analysis = saved.analysis.unwrap();
    assert_eq!(analysis.plot_count, 0);
    assert_eq!(analysis.total_forest_area, 0.0);
    assert!(analysis.species_distribution.is_empty());
    assert!(analysis.forest_types.is_empty());
}

#[tokio::test]
async fn test_invalid_polygon_is_not_persisted() {
    let store = Arc::new(MemoryPolygonStore::new());
    let pipeline = AnalysisPipeline::new(Arc::new(catalogue()), store.clone());

    let three_points = DrawnPolygon::from_rings(vec![vec![[5.7, 45.2], [5.8, 45.2], [5.8, 45.3]]]);
    let err = pipeline
        .submit("alice", "Triangle", &three_points)
        .await
        .unwrap_err();

    assert!(matches!(err, ForetError::InvalidGeometry(_)));
    assert!(store.get("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catalogue_failure_marks_polygon_failed() {
    let store = Arc::new(MemoryPolygonStore::new());
    let pipeline = AnalysisPipeline::new(Arc::new(DownCatalogue), store.clone());

    let saved = pipeline
        .submit("alice", "Zone", &square(5.71, 45.18, 0.01))
        .await
        .unwrap();

    assert_eq!(saved.status, PolygonStatus::Failed);
    assert!(saved.analysis.is_none());
    assert!(saved.failure.as_deref().unwrap().contains("connection refused"));
    // La surface est calculée même en cas d'échec
    assert!(saved.area_hectares > 0.0);

    let listed = store.get("alice").await.unwrap();
    assert_eq!(listed[0].status, PolygonStatus::Failed);
}

#[tokio::test]
async fn test_list_and_delete() {
    let pipeline = AnalysisPipeline::new(
        Arc::new(catalogue()),
        Arc::new(MemoryPolygonStore::new()),
    );

    let first = pipeline
        .submit("alice", "Premier", &square(5.71, 45.18, 0.01))
        .await
        .unwrap();
    pipeline
        .submit("alice", "Second", &square(5.72, 45.19, 0.01))
        .await
        .unwrap();
    pipeline
        .submit("bob", "Autre", &square(5.72, 45.19, 0.01))
        .await
        .unwrap();

    let polygons = pipeline.list("alice").await.unwrap();
    let names: Vec<&str> = polygons.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Second", "Premier"]);

    assert!(matches!(
        pipeline.delete("bob", &first.id).await,
        Err(ForetError::NotFound(_))
    ));
    pipeline.delete("alice", &first.id).await.unwrap();
    assert_eq!(pipeline.list("alice").await.unwrap().len(), 1);
    assert!(matches!(
        pipeline.delete("alice", "does-not-exist").await,
        Err(ForetError::NotFound(_))
    ));
}

// --- Hiérarchie -----------------------------------------------------------

#[tokio::test]
async fn test_hierarchy_chain_consistency() {
    let catalogue = Arc::new(catalogue());
    let resolver = HierarchyResolver::new(catalogue.clone());

    for region in resolver.list_regions().await.unwrap() {
        for department in resolver.list_departments(&region).await.unwrap() {
            for commune in resolver.list_communes(&department).await.unwrap() {
                let filter = PlotFilter {
                    region_code: Some(region.clone()),
                    department_code: Some(department.clone()),
                    commune_code: Some(commune.clone()),
                    ..Default::default()
                };
                assert!(
                    !catalogue.list_plots(&filter).await.unwrap().is_empty(),
                    "{}/{}/{} has no supporting plot",
                    region,
                    department,
                    commune
                );

                let places = resolver.list_place_names(&commune).await.unwrap();
                let mut sorted = places.clone();
                sorted.sort();
                sorted.dedup();
                assert_eq!(places, sorted);
            }
        }
    }
}

#[tokio::test]
async fn test_hierarchy_catalogue_down() {
    let resolver = HierarchyResolver::new(Arc::new(DownCatalogue));
    assert!(matches!(
        resolver.list_regions().await,
        Err(ForetError::CatalogueUnavailable(_))
    ));
}

#[tokio::test]
async fn test_plots_in_bounds() {
    let resolver = HierarchyResolver::new(Arc::new(catalogue()));
    let filter = PlotFilter::within(Bounds::new(5.6, 45.1, 6.0, 45.4).unwrap());
    let plots = resolver.list_plots(&filter).await.unwrap();
    let ids: Vec<&str> = plots.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["oak", "pine"]);
}

// --- Identification au point ----------------------------------------------

/// Service de couches simulé : une feature par couche, certaines en échec
struct FakeLayers {
    failing: Vec<LayerId>,
    slow: Vec<LayerId>,
    calls: AtomicUsize,
}

impl FakeLayers {
    fn new(failing: Vec<LayerId>, slow: Vec<LayerId>) -> Self {
        Self {
            failing,
            slow,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FeatureQueryService for FakeLayers {
    async fn query(
        &self,
        layer: &LayerConfig,
        _point: MercatorPoint,
        _viewport: MercatorBounds,
    ) -> Result<Option<RawFeature>, ForetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.slow.contains(&layer.id) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.failing.contains(&layer.id) {
            return Err(ForetError::layer_failed(layer.id.as_str(), "timeout"));
        }

        let properties = match layer.id {
            LayerId::Region => json!({"nom_officiel": "Auvergne-Rhône-Alpes"}),
            LayerId::Department => json!({"nom": "Isère", "id": "38"}),
            LayerId::Commune => json!({"nom_officiel": "Grenoble"}),
            LayerId::Forest => json!({"ID": "F1", "TFV": "Forêt fermée de feuillus"}),
        };
        Ok(Some(RawFeature {
            id: None,
            properties: properties.as_object().cloned().unwrap_or_default(),
        }))
    }
}

fn viewport() -> Bounds {
    Bounds::new(5.6, 45.1, 5.9, 45.3).unwrap()
}

fn layers() -> Vec<LayerConfig> {
    Config::from_preset("default").unwrap().layers
}

#[tokio::test]
async fn test_all_layers_resolved_in_order() {
    let service = Arc::new(FakeLayers::new(vec![], vec![]));
    let resolver = FeatureInfoResolver::new(service.clone(), layers());

    let result = resolver.query(5.72, 45.18, &viewport()).await.unwrap();

    let order: Vec<LayerId> = result.layers.iter().map(|l| l.layer).collect();
    assert_eq!(order, LayerId::ALL.to_vec());
    assert_eq!(service.calls.load(Ordering::SeqCst), 4);

    assert_eq!(
        result.get(LayerId::Region).unwrap().display_name.as_deref(),
        Some("Auvergne-Rhône-Alpes")
    );
    let department = result.get(LayerId::Department).unwrap();
    assert_eq!(department.display_name.as_deref(), Some("Isère"));
    assert_eq!(department.feature_id.as_deref(), Some("38"));

    let forest = result.get(LayerId::Forest).unwrap();
    assert_eq!(forest.display_name, None);
    assert_eq!(forest.feature_id.as_deref(), Some("F1"));
}

#[tokio::test]
async fn test_failing_layer_does_not_affect_others() {
    let service = Arc::new(FakeLayers::new(vec![LayerId::Department], vec![]));
    let resolver = FeatureInfoResolver::new(service, layers());

    let result = resolver.query(5.72, 45.18, &viewport()).await.unwrap();

    assert_eq!(result.layers.len(), 4);
    assert!(result.get(LayerId::Department).is_none());
    assert!(result.get(LayerId::Region).is_some());
    assert!(result.get(LayerId::Commune).is_some());
    assert!(result.get(LayerId::Forest).is_some());
}

#[tokio::test]
async fn test_point_out_of_domain() {
    let service = Arc::new(FakeLayers::new(vec![], vec![]));
    let resolver = FeatureInfoResolver::new(service.clone(), layers());

    let err = resolver.query(0.0, 89.0, &viewport()).await.unwrap_err();
    assert!(matches!(err, ForetError::OutOfDomain { .. }));
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_zoomed_out_viewport_is_clamped() {
    let service = Arc::new(FakeLayers::new(vec![], vec![]));
    let resolver = FeatureInfoResolver::new(service, layers());

    let world = Bounds::new(-180.0, -90.0, 180.0, 90.0).unwrap();
    let result = resolver.query(5.72, 45.18, &world).await.unwrap();
    assert!(result.has_any());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_keeps_settled_layers() {
    let service = Arc::new(FakeLayers::new(vec![], vec![LayerId::Forest]));
    let resolver = FeatureInfoResolver::new(service, layers());

    let cancel = tokio::time::sleep(Duration::from_secs(1));
    let result = resolver
        .query_until(5.72, 45.18, &viewport(), cancel)
        .await
        .unwrap();

    assert!(result.get(LayerId::Region).is_some());
    assert!(result.get(LayerId::Commune).is_some());
    assert!(result.get(LayerId::Forest).is_none());
}
