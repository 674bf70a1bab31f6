//! Purpose: Shared configuration JSON serializers for the CLI.
//! Exports: `config_json` and `config_summary_json`.
//! Role: Keep the `show` and `watch` envelope shapes consistent.
//! Invariants: Stable key names for v0 payloads; fields are additive-only.

use coordlink::Configuration;
use serde_json::{Map, Value, json};

pub(crate) fn config_json(config: &Configuration) -> Value {
    let mut map = Map::new();
    map.insert("version".to_string(), json!(config.version));
    map.insert("cluster".to_string(), json!(config.cluster));
    map.insert("flags".to_string(), json!(config.flags));
    map.insert("fingerprint".to_string(), json!(config.fingerprint().ok()));
    map.insert(
        "servers".to_string(),
        serde_json::to_value(&config.servers).unwrap_or(Value::Null),
    );
    map.insert(
        "spaces".to_string(),
        serde_json::to_value(&config.spaces).unwrap_or(Value::Null),
    );
    Value::Object(map)
}

pub(crate) fn config_summary_json(config: &Configuration, observed_at: &str) -> Value {
    let mut map = Map::new();
    map.insert("version".to_string(), json!(config.version));
    map.insert("cluster".to_string(), json!(config.cluster));
    map.insert("fingerprint".to_string(), json!(config.fingerprint().ok()));
    map.insert("servers".to_string(), json!(config.servers.len()));
    map.insert("spaces".to_string(), json!(config.spaces.len()));
    map.insert("observed_at".to_string(), json!(observed_at));
    Value::Object(map)
}
