//! 表单字段与记录字段之间的映射
//!
//! 表单（草稿）使用 `creators`、`journal_title` 这样的字段名，记录使用
//! `authors`、`journal.title`。导出时按 [`EXPORT_KEYS`] 改名，
//! [`record_to_draft`] 做反向映射，把已存储的记录还原成可编辑的草稿。

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::models::draft::DATE_FIELDS;
use crate::models::{Draft, FieldValue, RecJson};

/// 表单字段 → 记录字段
pub const EXPORT_KEYS: &[(&str, &str)] = &[
    ("creators", "authors"),
    ("journal_title", "journal.title"),
    ("journal_volume", "journal.volume"),
    ("journal_issue", "journal.issue"),
    ("journal_pages", "journal.pages"),
    ("imprint_publisher", "imprint.publisher"),
    ("imprint_place", "imprint.place"),
    ("imprint_isbn", "isbn"),
    ("partof_title", "part_of.title"),
    ("partof_pages", "part_of.pages"),
];

/// 只在还原时出现的映射：收录信息被挪进 `part_of` 之后的位置
const IMPORT_ONLY_KEYS: &[(&str, &str)] = &[
    ("imprint_publisher", "part_of.publisher"),
    ("imprint_place", "part_of.place"),
    ("imprint_isbn", "part_of.isbn"),
];

/// 处理流程生成的字段，不回到表单
const DERIVED_KEYS: &[&str] = &[
    "_first_author",
    "_additional_authors",
    "owner",
    "fft",
    "modification_date",
];

/// 会被展开成带点键的嵌套对象
const NESTED_KEYS: &[&str] = &["journal", "imprint", "part_of"];

/// 导出草稿字段为 recjson
pub fn export_fields<'a, I>(fields: I) -> RecJson
where
    I: IntoIterator<Item = (&'a String, &'a FieldValue)>,
{
    let mut recjson = RecJson::from_fields(fields);
    for (form_key, record_key) in EXPORT_KEYS {
        if let Some(value) = recjson.remove(form_key) {
            recjson.insert(*record_key, value);
        }
    }
    recjson
}

/// 把记录还原成草稿
pub fn record_to_draft(record: &RecJson) -> Draft {
    let mut values: BTreeMap<String, FieldValue> = BTreeMap::new();

    for (key, value) in record.as_map() {
        let key = key.as_str();
        if DERIVED_KEYS.contains(&key) {
            continue;
        }
        match (key, value) {
            (_, Value::Object(nested)) if NESTED_KEYS.contains(&key) => {
                for (sub_key, sub_value) in nested {
                    // 没有对应表单字段的子键（例如 `journal.year`）直接丢弃
                    if let Some(form_key) = import_key(&format!("{}.{}", key, sub_key)) {
                        values.insert(form_key.to_string(), FieldValue::Json(sub_value.clone()));
                    }
                }
            }
            ("license", Value::Object(license)) => {
                if let Some(code) = license.get("identifier") {
                    values.insert("license".to_string(), FieldValue::Json(code.clone()));
                }
            }
            // 下面单独处理
            (
                "communities" | "provisional_communities" | "alternate_identifiers"
                | "related_identifiers",
                _,
            ) => {}
            ("references", Value::Array(references)) => {
                let raw: Vec<Value> = references
                    .iter()
                    .map(|r| r.get("raw_reference").cloned().unwrap_or_else(|| r.clone()))
                    .collect();
                values.insert("references".to_string(), FieldValue::Json(Value::Array(raw)));
            }
            ("grants", Value::Array(grants)) => {
                let parsed: Vec<Value> = grants.iter().map(parse_grant).collect();
                values.insert("grants".to_string(), FieldValue::Json(Value::Array(parsed)));
            }
            (_, Value::String(_)) if DATE_FIELDS.contains(&key) => {
                values.insert(key.to_string(), FieldValue::for_field(key, value.clone()));
            }
            _ => {
                let form_key = import_key(key).unwrap_or(key);
                values.insert(form_key.to_string(), FieldValue::Json(value.clone()));
            }
        }
    }

    values.insert(
        "communities".to_string(),
        FieldValue::Json(Value::Array(combined_communities(record))),
    );

    let mut related = record.list("related_identifiers");
    for alt in record.list("alternate_identifiers") {
        related.push(json!({
            "identifier": alt.get("identifier").cloned().unwrap_or(Value::Null),
            "scheme": alt.get("scheme").cloned().unwrap_or(Value::Null),
            "relation": "isAlternativeIdentifier",
        }));
    }
    if record.contains_key("related_identifiers") || !related.is_empty() {
        values.insert(
            "related_identifiers".to_string(),
            FieldValue::Json(Value::Array(related)),
        );
    }

    Draft::from_values(values)
}

/// 从载入的草稿中去掉系统社区，避免用户在表单里看到或移除它们
pub fn process_draft(draft: &mut Draft, config: &Config) {
    let system = config.system_communities();
    let communities: Vec<Value> = draft
        .get("communities")
        .map(FieldValue::to_json)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
        .into_iter()
        .filter(|c| {
            c.get("identifier")
                .and_then(Value::as_str)
                .map_or(true, |id| !system.contains(&id))
        })
        .collect();
    draft.set("communities", Value::Array(communities));
}

fn import_key(record_key: &str) -> Option<&'static str> {
    EXPORT_KEYS
        .iter()
        .chain(IMPORT_ONLY_KEYS)
        .find(|(_, key)| *key == record_key)
        .map(|(form_key, _)| *form_key)
}

fn combined_communities(record: &RecJson) -> Vec<Value> {
    let accepted = record
        .string_list("communities")
        .into_iter()
        .map(|id| json!({"identifier": id, "provisional": false}));
    let provisional = record
        .string_list("provisional_communities")
        .into_iter()
        .map(|id| json!({"identifier": id, "provisional": true}));
    accepted.chain(provisional).collect()
}

/// 把 `"ACRONYM - TITLE (ID)"` 还原成 `{id, acronym, title}`
fn parse_grant(grant: &Value) -> Value {
    let Some(display) = grant.get("title").and_then(Value::as_str) else {
        return grant.clone();
    };
    let identifier = grant.get("identifier").cloned();

    let mut out = Map::new();
    if let Ok(re) = Regex::new(r"^(?P<acronym>.*?) - (?P<title>.*) \((?P<id>[^()]*)\)$") {
        if let Some(caps) = re.captures(display) {
            let id = identifier.unwrap_or_else(|| Value::from(&caps["id"]));
            out.insert("id".to_string(), id);
            out.insert("acronym".to_string(), Value::from(&caps["acronym"]));
            out.insert("title".to_string(), Value::from(&caps["title"]));
            return Value::Object(out);
        }
    }

    out.insert("id".to_string(), identifier.unwrap_or(Value::Null));
    out.insert("acronym".to_string(), Value::from(""));
    out.insert("title".to_string(), Value::from(display));
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::records::{process_recjson, RecordCtx};
    use crate::services::Services;

    fn rec(value: Value) -> RecJson {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_export_renames_form_fields() {
        let mut draft = Draft::new();
        draft.set("creators", json!([{"name": "Doe"}]));
        draft.set("journal_title", "Nature");
        draft.set("imprint_isbn", "978-3");
        draft.set("title", "T");

        let recjson = export_fields(&draft.values);
        assert_eq!(recjson.get("authors"), Some(&json!([{"name": "Doe"}])));
        assert_eq!(recjson.get_str("journal.title"), Some("Nature"));
        assert_eq!(recjson.get_str("isbn"), Some("978-3"));
        assert_eq!(recjson.get_str("title"), Some("T"));
        assert!(!recjson.contains_key("creators"));
    }

    #[test]
    fn test_record_to_draft_inverts_processing() {
        let record = rec(json!({
            "recid": 12,
            "title": "T",
            "access_right": "open",
            "publication_date": "2013-07-04",
            "authors": [{"name": "Doe"}],
            "_first_author": {"name": "Doe"},
            "owner": {"id": 1},
            "journal": {"title": "Nature", "year": "2013"},
            "part_of": {"title": "Proc", "publisher": "CERN", "isbn": "978-3"},
            "license": {"identifier": "cc-by", "source": "opendefinition.org"},
            "communities": ["c1", "zenodo"],
            "provisional_communities": ["c2"],
            "alternate_identifiers": [{"scheme": "arxiv", "identifier": "arXiv:1"}],
            "references": [{"raw_reference": "Doe (2012)"}],
            "grants": [{"title": "OpenAIREplus - 2nd-Generation (283595)", "identifier": "283595"}],
        }));

        let draft = record_to_draft(&record);
        let values = draft.values_json();

        assert_eq!(values["recid"], json!(12));
        assert_eq!(values["creators"], json!([{"name": "Doe"}]));
        assert_eq!(values["journal_title"], json!("Nature"));
        assert_eq!(values["partof_title"], json!("Proc"));
        assert_eq!(values["imprint_publisher"], json!("CERN"));
        assert_eq!(values["imprint_isbn"], json!("978-3"));
        assert_eq!(values["license"], json!("cc-by"));
        assert_eq!(values["references"], json!(["Doe (2012)"]));
        assert_eq!(
            values["grants"],
            json!([{"id": "283595", "acronym": "OpenAIREplus", "title": "2nd-Generation"}])
        );
        assert_eq!(
            values["communities"],
            json!([
                {"identifier": "c1", "provisional": false},
                {"identifier": "zenodo", "provisional": false},
                {"identifier": "c2", "provisional": true}
            ])
        );
        assert_eq!(
            values["related_identifiers"],
            json!([{"identifier": "arXiv:1", "scheme": "arxiv", "relation": "isAlternativeIdentifier"}])
        );
        assert!(matches!(draft.get("publication_date"), Some(FieldValue::Date(_))));
        assert!(!values.contains_key("owner"));
        assert!(!values.contains_key("_first_author"));
        assert!(!values.contains_key("journal.year"));
    }

    #[test]
    fn test_roundtrip_through_processing_is_stable() {
        let config = Config::default();
        let services = Services::in_memory();
        let ctx = RecordCtx::new(&config, &services);

        let mut draft = Draft::new();
        draft.set("access_right", "closed");
        draft.set("publication_date", NaiveDate::from_ymd_opt(2013, 7, 4).unwrap());
        draft.set("creators", json!([{"name": "Doe"}]));
        draft.set("partof_title", "Proc");
        draft.set("imprint_publisher", "CERN");
        draft.set("imprint_place", "Geneva");
        draft.set("grants", json!([{"id": "1", "acronym": "FP7", "title": "Open Data"}]));
        draft.set("communities", json!([{"identifier": "c1", "provisional": true}]));

        let mut first = export_fields(&draft.values);
        process_recjson(&ctx, &mut first).unwrap();

        let mut second = export_fields(&record_to_draft(&first).values);
        process_recjson(&ctx, &mut second).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_process_draft_removes_system_communities() {
        let config = Config::default();
        let mut draft = Draft::new();
        draft.set(
            "communities",
            json!([
                {"identifier": "zenodo", "provisional": true},
                {"identifier": "c1", "provisional": false},
                {"identifier": "ecfunded", "provisional": false}
            ]),
        );
        process_draft(&mut draft, &config);
        assert_eq!(
            draft.values_json()["communities"],
            json!([{"identifier": "c1", "provisional": false}])
        );

        let mut empty = Draft::new();
        process_draft(&mut empty, &config);
        assert_eq!(empty.values_json()["communities"], json!([]));
    }
}
