//! 草稿
//!
//! 一个表单当前的取值，外加逐字段的标记（例如 `disabled`）。

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 按日期解析的表单字段
pub const DATE_FIELDS: &[&str] = &["publication_date", "embargo_date"];

/// 草稿字段值
///
/// 表单框架解析出的日期保持 `NaiveDate` 类型，其余值原样保存为 JSON。
/// 单独反序列化时一律是 JSON，日期只按字段名识别（见 [`FieldValue::for_field`]）。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Date(NaiveDate),
    Json(Value),
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FieldValue::Json)
    }
}

impl FieldValue {
    /// 日期字段中形如 `YYYY-MM-DD` 的字符串解析为日期，其余保持 JSON
    pub fn for_field(key: &str, value: Value) -> Self {
        if DATE_FIELDS.contains(&key) {
            if let Some(date) = value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            {
                return FieldValue::Date(date);
            }
        }
        FieldValue::Json(value)
    }

    /// 转换为 JSON，日期渲染为 ISO-8601
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Json(v) => v.clone(),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Json(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(date: NaiveDate) -> Self {
        FieldValue::Date(date)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Json(Value::String(s.to_string()))
    }
}

/// 草稿
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    #[serde(default, deserialize_with = "deserialize_values")]
    pub values: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub flags: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub completed: bool,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: BTreeMap<String, FieldValue>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    /// 标记草稿已填写完成
    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// 给字段加上 `disabled` 标记
    pub fn disable(&mut self, field: impl Into<String>) {
        let flags = self.flags.entry(field.into()).or_default();
        if !flags.iter().any(|f| f == "disabled") {
            flags.push("disabled".to_string());
        }
    }

    pub fn is_disabled(&self, field: &str) -> bool {
        self.flags
            .get(field)
            .map(|flags| flags.iter().any(|f| f == "disabled"))
            .unwrap_or(false)
    }

    /// 取值的 JSON 视图（日期已渲染）
    pub fn values_json(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

/// 反序列化字段表，按字段名恢复日期类型
pub fn deserialize_values<'de, D>(deserializer: D) -> Result<BTreeMap<String, FieldValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let field = FieldValue::for_field(&key, value);
            (key, field)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dates_parsed_only_for_date_fields() {
        let draft: Draft = serde_json::from_value(json!({
            "values": {
                "publication_date": "2024-03-01",
                "title": "2024-03-01",
                "embargo_date": "soon",
            }
        }))
        .unwrap();

        assert_eq!(
            draft.get("publication_date"),
            Some(&FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
        assert_eq!(draft.get("title"), Some(&FieldValue::Json(json!("2024-03-01"))));
        assert_eq!(draft.get("embargo_date"), Some(&FieldValue::Json(json!("soon"))));

        let v: FieldValue = serde_json::from_value(json!("2024-03-01")).unwrap();
        assert_eq!(v, FieldValue::Json(json!("2024-03-01")));
    }

    #[test]
    fn test_values_json_renders_iso_dates() {
        let mut draft = Draft::new();
        draft.set(
            "publication_date",
            NaiveDate::from_ymd_opt(2013, 7, 4).unwrap(),
        );
        draft.set("title", "Test");
        let values = draft.values_json();
        assert_eq!(values["publication_date"], json!("2013-07-04"));
        assert_eq!(values["title"], json!("Test"));
    }

    #[test]
    fn test_disable_flag_is_not_duplicated() {
        let mut draft = Draft::new();
        draft.disable("doi");
        draft.disable("doi");
        assert!(draft.is_disabled("doi"));
        assert_eq!(draft.flags["doi"].len(), 1);
        assert!(!draft.is_disabled("title"));
    }
}
