
use super::NewRecord;
use serde_json::json;

/// Build a record row the way the persister would
fn new_record(collection: &str, key: Option<&str>, source_url: &str) -> NewRecord {
    let mut payload = serde_json::Map::new();
    if let Some(key) = key {
        payload.insert(format!("{collection}_id"), json!(key));
    }
    payload.insert("source_url".into(), json!(source_url));
    NewRecord {
        collection: collection.to_string(),
        record_key: key.map(str::to_string),
        source_url: source_url.to_string(),
        payload: serde_json::Value::Object(payload).to_string(),
    }
}

fn keys(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
