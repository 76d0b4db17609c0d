use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use facecache::{
    Coefficients, ConfigLoadError, EmbeddingId, EmbeddingStore, EmbeddingVector, Engine,
    FaceCacheConfig, HealthStatus, InMemoryEmbeddingStore,
};
use tempfile::NamedTempFile;

const FULL_YAML: &str = r#"
version: "1.0"
name: "production"

vector:
  dimension: 3

similarity:
  offset: 1.1817961
  scale: 5.291995557
  max_distance: 2.0
  calculators:
    steep:
      offset: 0.5
      scale: 20.0

cache:
  load_timeout_ms: 2500
  health:
    required_tenants: ["acme"]
    strict: true
    warmup_check: true

logging:
  level: "facecache=debug,info"
  json: true
"#;

#[test]
fn full_yaml_is_parsed() {
    let config = FaceCacheConfig::from_yaml(FULL_YAML).unwrap();

    assert_eq!(config.name.as_deref(), Some("production"));
    assert_eq!(config.vector.dimension, 3);
    assert_eq!(config.cache_config().load_timeout, Duration::from_millis(2500));
    assert!(config.logging.json);

    let similarity = config.similarity_config();
    assert_eq!(
        similarity.coefficients_for(Some("steep")),
        Coefficients::new(0.5, 20.0)
    );
    assert_eq!(
        similarity.coefficients_for(Some("unknown")),
        Coefficients::default()
    );

    let health = config.health_config();
    assert_eq!(health.required_tenants, vec!["acme".to_string()]);
    assert!(health.strict);
}

#[test]
fn yaml_file_round_trip() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(FULL_YAML.as_bytes()).unwrap();

    let from_file = FaceCacheConfig::from_file(temp_file.path()).unwrap();
    assert_eq!(from_file, FaceCacheConfig::from_yaml(FULL_YAML).unwrap());
}

#[test]
fn missing_file_is_a_read_error() {
    let err = FaceCacheConfig::from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, ConfigLoadError::FileRead(_)));
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let err = FaceCacheConfig::from_yaml("vector: [not, a, map").unwrap_err();
    assert!(matches!(err, ConfigLoadError::YamlParse(_)));
}

#[test]
fn invalid_values_are_rejected() {
    let cases = [
        ("version: \"1\"\nvector:\n  dimension: 0\n", "dimension"),
        ("version: \"1\"\ncache:\n  load_timeout_ms: 0\n", "load_timeout_ms"),
        ("version: \"1\"\nsimilarity:\n  max_distance: -1.0\n", "max_distance"),
        ("version: \"1\"\nlogging:\n  level: \"\"\n", "logging.level"),
    ];
    for (yaml, needle) in cases {
        let err = FaceCacheConfig::from_yaml(yaml).unwrap_err();
        assert!(
            matches!(err, ConfigLoadError::Validation(_)),
            "{yaml}: unexpected {err:?}"
        );
        assert!(err.to_string().contains(needle), "{err} should mention {needle}");
    }
}

#[test]
fn minimal_yaml_uses_defaults() {
    let config = FaceCacheConfig::from_yaml("version: \"1\"\n").unwrap();
    assert_eq!(config, FaceCacheConfig {
        version: "1".to_string(),
        ..FaceCacheConfig::default()
    });
}

#[tokio::test]
async fn engine_built_from_yaml_honours_health_settings() {
    let config = FaceCacheConfig::from_yaml(FULL_YAML).unwrap();
    let store = Arc::new(InMemoryEmbeddingStore::new());
    store.put(
        "acme",
        EmbeddingVector::new(EmbeddingId::new_v4(), "alice", vec![0.0, 1.0, 0.0], "steep"),
    );
    let dyn_store: Arc<dyn EmbeddingStore> = store.clone();
    let engine = Engine::new(&config, dyn_store);

    assert_eq!(engine.health().status, HealthStatus::Down);
    assert_eq!(engine.warm_up().await.unwrap(), 1);
    assert_eq!(engine.health().status, HealthStatus::Up);
}
