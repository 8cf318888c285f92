//! 记录 JSON（recjson）
//!
//! 扁平的键值文档，处理过程中使用 `journal.title` 这类带点的键，
//! 处理结束时由 [`RecJson::fold_dotted_keys`] 折叠成嵌套对象。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecordError;
use crate::models::draft::FieldValue;

/// 记录 JSON 文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecJson(Map<String, Value>);

impl RecJson {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// 从草稿字段导出记录
    ///
    /// 这是类型化草稿值进入处理流程的唯一入口，日期在这里统一渲染成 ISO-8601 字符串。
    pub fn from_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a FieldValue)>,
    {
        let map = fields
            .into_iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// 字段存在且不为空
    pub fn is_truthy(&self, key: &str) -> bool {
        self.0.get(key).map(|v| !is_blank(v)).unwrap_or(false)
    }

    /// 以字符串列表读取字段，非字符串元素被忽略
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 以列表读取字段，缺失或不是列表时返回空列表
    pub fn list(&self, key: &str) -> Vec<Value> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// 记录ID，兼容数字和字符串两种写法
    pub fn recid(&self) -> Option<u64> {
        match self.0.get("recid")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// 把带点的键折叠成嵌套对象
    ///
    /// `{"a.b": 1}` 变成 `{"a": {"b": 1}}`。键中出现多个 `.`，
    /// 或主键已存在且不是对象时返回错误，此时文档保持不变。
    pub fn fold_dotted_keys(&mut self) -> Result<(), RecordError> {
        let dotted: Vec<String> = self.0.keys().filter(|k| k.contains('.')).cloned().collect();

        let mut groups: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        for key in dotted {
            let (main_key, sub_key) = match key.split_once('.') {
                Some((main, sub)) if !sub.contains('.') => (main.to_string(), sub.to_string()),
                _ => return Err(RecordError::NestedDottedKey { key }),
            };
            if let Some(existing) = self.0.get(&main_key) {
                if !existing.is_object() {
                    return Err(RecordError::DottedKeyConflict { key, main_key });
                }
            }
            groups.entry(main_key).or_default().push((key, sub_key));
        }

        for (main_key, entries) in groups {
            let mut nested = match self.0.remove(&main_key) {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            for (key, sub_key) in entries {
                if let Some(value) = self.0.remove(&key) {
                    nested.insert(sub_key, value);
                }
            }
            self.0.insert(main_key, Value::Object(nested));
        }

        Ok(())
    }
}

impl From<Map<String, Value>> for RecJson {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<RecJson> for Value {
    fn from(rec: RecJson) -> Self {
        Value::Object(rec.0)
    }
}

/// 判断值是否为空
///
/// null、false、0、空白字符串、空列表、空对象都视为空。
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map(|f| f == 0.0).unwrap_or(false),
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// 把 JSON 值渲染成展示用文本，字符串不带引号
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> RecJson {
        match value {
            Value::Object(map) => RecJson::from(map),
            _ => panic!("测试数据必须是对象"),
        }
    }

    #[test]
    fn test_fold_single_dot_key() {
        let mut r = rec(json!({"a.b": 1}));
        r.fold_dotted_keys().unwrap();
        assert_eq!(Value::from(r), json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_fold_merges_into_existing_object() {
        let mut r = rec(json!({"journal": {"issue": "2"}, "journal.title": "Nature", "title": "x"}));
        r.fold_dotted_keys().unwrap();
        assert_eq!(
            Value::from(r),
            json!({"journal": {"issue": "2", "title": "Nature"}, "title": "x"})
        );
    }

    #[test]
    fn test_fold_rejects_nested_dots_without_mutating() {
        let mut r = rec(json!({"a.b.c": 1, "x.y": 2}));
        let err = r.fold_dotted_keys().unwrap_err();
        assert!(matches!(err, RecordError::NestedDottedKey { ref key } if key == "a.b.c"));
        assert_eq!(r.get("x.y"), Some(&json!(2)));
    }

    #[test]
    fn test_fold_rejects_conflict_with_scalar() {
        let mut r = rec(json!({"imprint": "CERN", "imprint.place": "Geneva"}));
        assert!(matches!(
            r.fold_dotted_keys(),
            Err(RecordError::DottedKeyConflict { .. })
        ));
    }

    #[test]
    fn test_recid_accepts_string_and_number() {
        assert_eq!(rec(json!({"recid": 12})).recid(), Some(12));
        assert_eq!(rec(json!({"recid": "34"})).recid(), Some(34));
        assert_eq!(rec(json!({})).recid(), None);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&json!("  ")));
        assert!(is_blank(&json!({})));
        assert!(is_blank(&json!([])));
        assert!(!is_blank(&json!("a")));
        assert!(!is_blank(&json!({"name": "x"})));
    }
}
