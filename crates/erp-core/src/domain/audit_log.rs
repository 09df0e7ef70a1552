//! Audit trail entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// `created`, `updated`, `deleted` or a custom verb such as `converted`.
    pub action: String,
    pub auditable_type: String,
    pub auditable_id: Option<Uuid>,
    pub event: String,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Keeps only the top-level keys whose values differ. Returns `(old, new)`.
pub fn diff_values(old: &Value, new: &Value) -> (Value, Value) {
    let (Some(old_map), Some(new_map)) = (old.as_object(), new.as_object()) else {
        return (old.clone(), new.clone());
    };

    let mut old_out = Map::new();
    let mut new_out = Map::new();
    for (key, new_value) in new_map {
        let old_value = old_map.get(key).unwrap_or(&Value::Null);
        if old_value != new_value {
            old_out.insert(key.clone(), old_value.clone());
            new_out.insert(key.clone(), new_value.clone());
        }
    }
    for (key, old_value) in old_map {
        if !new_map.contains_key(key) {
            old_out.insert(key.clone(), old_value.clone());
            new_out.insert(key.clone(), Value::Null);
        }
    }
    (Value::Object(old_out), Value::Object(new_out))
}

/// Fields that change on every write and carry no audit value.
const NOISE_KEYS: [&str; 2] = ["modified_at", "modified_by"];

pub fn strip_noise(value: &mut Value) {
    if let Some(map) = value.as_object_mut() {
        for key in NOISE_KEYS {
            map.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_only_changed_keys() {
        let old = json!({"name": "A", "status": "new", "value": 10, "gone": true});
        let new = json!({"name": "A", "status": "contacted", "value": 10});
        let (o, n) = diff_values(&old, &new);
        assert_eq!(o, json!({"status": "new", "gone": true}));
        assert_eq!(n, json!({"status": "contacted", "gone": null}));
    }

    #[test]
    fn test_strip_noise() {
        let mut v = json!({"name": "A", "modified_at": "x", "modified_by": null});
        strip_noise(&mut v);
        assert_eq!(v, json!({"name": "A"}));
    }
}
