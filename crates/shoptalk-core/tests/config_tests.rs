use std::path::Path;

use shoptalk_core::config::{expand_path, resolve_with_base, Config};

#[test]
fn expand_path_substitutes_environment_variables() {
    std::env::set_var("SHOPTALK_TEST_DATA", "/srv/shoptalk");
    assert_eq!(
        expand_path("${SHOPTALK_TEST_DATA}/lancedb"),
        Path::new("/srv/shoptalk/lancedb")
    );
    assert_eq!(expand_path("/already/absolute"), Path::new("/already/absolute"));
}

#[test]
fn resolve_with_base_joins_relative_and_keeps_absolute() {
    let base = Path::new("/opt/shoptalk");
    assert_eq!(resolve_with_base(base, "data/lancedb"), Path::new("/opt/shoptalk/data/lancedb"));
    assert_eq!(resolve_with_base(base, "/var/lib/lancedb"), Path::new("/var/lib/lancedb"));
}

#[test]
fn missing_keys_fall_back_to_defaults() {
    let config = Config::load().expect("config loads without any config.toml present");
    assert_eq!(config.get_or("retrieval.no_such_key", 0.6f32), 0.6);
    assert!(config.get::<String>("vision.no_such_endpoint").is_err());
}
