//! 通用三方字段合并

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::models::RecJson;

/// 三方字段合并
///
/// `dest` 为当前记录，`a` 为用户编辑前的版本，`b` 为编辑后的版本。
pub trait FieldMerger {
    fn merge(&self, dest: &RecJson, a: &RecJson, b: &RecJson) -> RecJson;
}

/// 默认合并策略
///
/// 用户没改过的字段（`a == b`）保留 `dest` 的值；改过的字段取 `b`，
/// 三方都是对象时逐键递归。列表整体替换。
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeWayMerger;

impl FieldMerger for ThreeWayMerger {
    fn merge(&self, dest: &RecJson, a: &RecJson, b: &RecJson) -> RecJson {
        RecJson::from(merge_maps(dest.as_map(), a.as_map(), b.as_map()))
    }
}

fn merge_maps(dest: &Map<String, Value>, a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
    let keys: BTreeSet<&String> = dest.keys().chain(a.keys()).chain(b.keys()).collect();

    let mut out = Map::new();
    for key in keys {
        if let Some(value) = merge_values(dest.get(key), a.get(key), b.get(key)) {
            out.insert(key.clone(), value);
        }
    }
    out
}

fn merge_values(dest: Option<&Value>, a: Option<&Value>, b: Option<&Value>) -> Option<Value> {
    if a == b {
        return dest.cloned();
    }
    match (dest, a, b) {
        (Some(Value::Object(d)), Some(Value::Object(a)), Some(Value::Object(b))) => {
            Some(Value::Object(merge_maps(d, a, b)))
        }
        _ => b.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> RecJson {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unchanged_fields_keep_destination() {
        let dest = rec(json!({"title": "Old", "recid": 3, "hidden": "x"}));
        let a = rec(json!({"title": "Old"}));
        let b = rec(json!({"title": "New"}));

        let merged = ThreeWayMerger.merge(&dest, &a, &b);
        assert_eq!(
            Value::from(merged),
            json!({"title": "New", "recid": 3, "hidden": "x"})
        );
    }

    #[test]
    fn test_removed_field_is_dropped() {
        let dest = rec(json!({"notes": "n", "title": "t"}));
        let a = rec(json!({"notes": "n", "title": "t"}));
        let b = rec(json!({"title": "t"}));

        let merged = ThreeWayMerger.merge(&dest, &a, &b);
        assert!(!merged.contains_key("notes"));
        assert_eq!(merged.get_str("title"), Some("t"));
    }

    #[test]
    fn test_nested_objects_merge_per_key() {
        let dest = rec(json!({"journal": {"title": "J", "year": "2010", "extra": 1}}));
        let a = rec(json!({"journal": {"title": "J", "year": "2010"}}));
        let b = rec(json!({"journal": {"title": "J2", "year": "2010"}}));

        let merged = ThreeWayMerger.merge(&dest, &a, &b);
        assert_eq!(
            merged.get("journal"),
            Some(&json!({"title": "J2", "year": "2010", "extra": 1}))
        );
    }
}
