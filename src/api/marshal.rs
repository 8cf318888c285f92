//! REST 输出的字段表与序列化
//!
//! 每张表列出输出对象的全部字段；源数据缺失时按字段类型给出默认值。

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::models::recjson::display_value;
use crate::models::{Deposition, Draft, RecJson};
use crate::records::{filter_empty_elements, process_draft, record_to_draft};

/// 字段类型
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// 字符串，缺失时为 null
    String,
    /// 字符串，缺失时取默认值
    StringOr(&'static str),
    /// 原样输出
    Raw,
    /// 原样输出，缺失时为空列表
    RawOrEmpty,
    /// 列表
    List,
    /// 列表，缺失时为空列表
    ListOrEmpty,
    /// `YYYY-MM-DD` 日期
    IsoDate,
    Integer,
    Boolean,
    /// 时间戳（RFC 3339）
    DateTime,
    /// 对象列表，每个元素按子表输出
    NestedList(&'static [FieldSpec]),
}

/// 字段定义：输出名、源字段名、类型
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub attribute: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        attribute: name,
        kind,
    }
}

const fn renamed(name: &'static str, attribute: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        attribute,
        kind,
    }
}

// ========== 字段表 ==========

pub const METADATA_FIELDS: &[FieldSpec] = &[
    field("access_right", FieldKind::String),
    field("communities", FieldKind::List),
    field("conference_acronym", FieldKind::String),
    field("conference_dates", FieldKind::String),
    field("conference_place", FieldKind::String),
    field("conference_title", FieldKind::String),
    field("conference_url", FieldKind::String),
    field("conference_session", FieldKind::String),
    field("conference_session_part", FieldKind::String),
    field("creators", FieldKind::RawOrEmpty),
    field("description", FieldKind::String),
    field("doi", FieldKind::StringOr("")),
    field("embargo_date", FieldKind::IsoDate),
    field("grants", FieldKind::List),
    field("image_type", FieldKind::StringOr("")),
    field("imprint_isbn", FieldKind::String),
    field("imprint_place", FieldKind::String),
    field("imprint_publisher", FieldKind::String),
    field("journal_issue", FieldKind::String),
    field("journal_pages", FieldKind::String),
    field("journal_title", FieldKind::String),
    field("journal_volume", FieldKind::String),
    field("keywords", FieldKind::RawOrEmpty),
    field("license", FieldKind::String),
    field("notes", FieldKind::StringOr("")),
    field("partof_pages", FieldKind::String),
    field("partof_title", FieldKind::String),
    field("prereserve_doi", FieldKind::Raw),
    field("publication_date", FieldKind::IsoDate),
    field("publication_type", FieldKind::StringOr("")),
    field("references", FieldKind::ListOrEmpty),
    field("related_identifiers", FieldKind::RawOrEmpty),
    field("thesis_supervisors", FieldKind::RawOrEmpty),
    field("title", FieldKind::String),
    field("upload_type", FieldKind::String),
];

pub const FILE_FIELDS: &[FieldSpec] = &[
    field("id", FieldKind::String),
    renamed("filename", "name", FieldKind::String),
    renamed("filesize", "size", FieldKind::Integer),
    field("checksum", FieldKind::String),
];

/// 存缴输出字段（不含草稿）
pub const DEPOSITION_FIELDS: &[FieldSpec] = &[
    field("id", FieldKind::Integer),
    field("title", FieldKind::String),
    field("created", FieldKind::DateTime),
    field("modified", FieldKind::DateTime),
    renamed("owner", "user_id", FieldKind::Integer),
    field("state", FieldKind::String),
    field("submitted", FieldKind::Boolean),
    field("files", FieldKind::NestedList(FILE_FIELDS)),
];

/// 编辑已发布记录时的元数据字段：没有 `prereserve_doi`
pub fn metadata_edit_fields() -> Vec<FieldSpec> {
    METADATA_FIELDS
        .iter()
        .filter(|f| f.name != "prereserve_doi")
        .copied()
        .collect()
}

// ========== 序列化 ==========

/// 按字段表输出对象
pub fn marshal(source: &Map<String, Value>, fields: &[FieldSpec]) -> Value {
    let out: Map<String, Value> = fields
        .iter()
        .map(|f| {
            let value = source.get(f.attribute).filter(|v| !v.is_null());
            (f.name.to_string(), format_field(value, f.kind))
        })
        .collect();
    Value::Object(out)
}

fn format_field(value: Option<&Value>, kind: FieldKind) -> Value {
    match (kind, value) {
        (FieldKind::StringOr(default), None) => Value::from(default),
        (FieldKind::RawOrEmpty | FieldKind::ListOrEmpty, None) => json!([]),
        (_, None) => Value::Null,

        (FieldKind::String | FieldKind::StringOr(_), Some(v)) => Value::from(display_value(v)),
        (FieldKind::Raw | FieldKind::RawOrEmpty | FieldKind::DateTime, Some(v)) => v.clone(),
        (FieldKind::List | FieldKind::ListOrEmpty, Some(Value::Array(items))) => {
            Value::Array(items.clone())
        }
        (FieldKind::List | FieldKind::ListOrEmpty, Some(v)) => json!([v]),
        (FieldKind::IsoDate, Some(Value::String(s))) => {
            match NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d") {
                Ok(date) => Value::from(date.format("%Y-%m-%d").to_string()),
                Err(_) => Value::from(s.as_str()),
            }
        }
        (FieldKind::IsoDate, Some(v)) => v.clone(),
        (FieldKind::Integer, Some(Value::String(s))) => {
            s.trim().parse::<i64>().map(Value::from).unwrap_or(Value::Null)
        }
        (FieldKind::Integer, Some(v)) => v.as_i64().map(Value::from).unwrap_or(Value::Null),
        (FieldKind::Boolean, Some(v)) => Value::Bool(!crate::models::recjson::is_blank(v)),
        (FieldKind::NestedList(fields), Some(Value::Array(items))) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => marshal(map, fields),
                    _ => Value::Null,
                })
                .collect(),
        ),
        (FieldKind::NestedList(_), Some(_)) => json!([]),
    }
}

/// 存缴的 REST 表示
///
/// 元数据来源依次为：`_edit` 草稿、由最新封存 SIP 还原的草稿、`_default` 草稿。
pub fn marshal_deposition(deposition: &Deposition, config: &Config) -> Value {
    let (draft, fields) = if deposition.has_sip() {
        let draft = match deposition.get_draft("_edit") {
            Some(draft) => draft.clone(),
            None => draft_from_latest_sip(deposition, config),
        };
        (draft, metadata_edit_fields())
    } else {
        let draft = deposition.get_draft("_default").cloned().unwrap_or_default();
        (draft, METADATA_FIELDS.to_vec())
    };

    let mut values = RecJson::from(draft.values_json());
    filter_empty_elements(&mut values);
    if !values.contains_key("grants") {
        values.insert("grants", json!([]));
    }
    for (field, _) in draft.flags.iter().filter(|(field, _)| draft.is_disabled(field)) {
        values.remove(field);
    }

    let mut obj = marshal(&deposition_source(deposition), DEPOSITION_FIELDS);
    if let Value::Object(map) = &mut obj {
        map.insert("metadata".to_string(), marshal(values.as_map(), &fields));

        if let Some(sip) = deposition.latest_sip(Some(true)) {
            let recjson = sip.metadata();
            if let Some(recid) = recjson.recid() {
                map.insert("record_id".to_string(), Value::from(recid));
                map.insert(
                    "record_url".to_string(),
                    Value::from(format!("{}/record/{}", config.site_url, recid)),
                );
            }
            if let Some(doi) = recjson.get_str("doi") {
                if doi.starts_with(&config.local_doi_prefix()) {
                    map.insert("doi".to_string(), Value::from(doi));
                    map.insert(
                        "doi_url".to_string(),
                        Value::from(format!("http://dx.doi.org/{}", doi)),
                    );
                }
            }
        }
    }
    obj
}

/// 草稿的 REST 表示
pub fn marshal_draft(draft: &Draft) -> Value {
    json!({ "metadata": marshal(&draft.values_json(), METADATA_FIELDS) })
}

fn draft_from_latest_sip(deposition: &Deposition, config: &Config) -> Draft {
    let Some(sip) = deposition.latest_sip(Some(true)) else {
        return Draft::new();
    };
    // 优先使用封存时序列化的完整记录
    let record = sip
        .package
        .as_deref()
        .and_then(|package| serde_json::from_str::<RecJson>(package).ok())
        .unwrap_or_else(|| sip.metadata().clone());

    let mut draft = record_to_draft(&record);
    process_draft(&mut draft, config);
    draft
}

fn deposition_source(deposition: &Deposition) -> Map<String, Value> {
    let files: Vec<Value> = deposition
        .files
        .iter()
        .map(|f| {
            json!({
                "id": f.id,
                "name": f.name,
                "size": f.size,
                "checksum": f.checksum,
            })
        })
        .collect();

    let mut map = Map::new();
    map.insert("id".to_string(), Value::from(deposition.id));
    map.insert("title".to_string(), Value::from(deposition.title.as_str()));
    map.insert("created".to_string(), Value::from(deposition.created.to_rfc3339()));
    map.insert("modified".to_string(), Value::from(deposition.modified.to_rfc3339()));
    map.insert("user_id".to_string(), Value::from(deposition.user_id));
    map.insert("state".to_string(), Value::from(deposition.state.as_str()));
    map.insert("submitted".to_string(), Value::Bool(deposition.has_sip()));
    map.insert("files".to_string(), Value::Array(files));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DepositionFile, Sip};

    fn rec(value: Value) -> RecJson {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_marshal_applies_defaults() {
        let out = marshal(&Map::new(), METADATA_FIELDS);
        assert_eq!(out["doi"], json!(""));
        assert_eq!(out["creators"], json!([]));
        assert_eq!(out["references"], json!([]));
        assert_eq!(out["title"], Value::Null);
        assert_eq!(out["communities"], Value::Null);
        assert_eq!(out.as_object().map(Map::len), Some(METADATA_FIELDS.len()));
    }

    #[test]
    fn test_edit_fields_drop_prereserve_doi() {
        let fields = metadata_edit_fields();
        assert_eq!(fields.len(), METADATA_FIELDS.len() - 1);
        assert!(fields.iter().all(|f| f.name != "prereserve_doi"));
    }

    #[test]
    fn test_marshal_new_deposition() {
        let config = Config::default();
        let mut deposition = Deposition::new(5, 42);
        deposition.title = "My upload".to_string();
        deposition.files.push(DepositionFile {
            id: "f1".to_string(),
            name: "data.csv".to_string(),
            size: 120,
            checksum: Some("abc".to_string()),
        });
        let draft = deposition.get_or_create_draft("_default");
        draft.set("title", "T");
        draft.set("doi", "10.1/x");
        draft.disable("doi");

        let out = marshal_deposition(&deposition, &config);
        assert_eq!(out["id"], json!(5));
        assert_eq!(out["owner"], json!(42));
        assert_eq!(out["state"], json!("draft"));
        assert_eq!(out["submitted"], json!(false));
        assert_eq!(
            out["files"],
            json!([{"id": "f1", "filename": "data.csv", "filesize": 120, "checksum": "abc"}])
        );
        assert_eq!(out["metadata"]["title"], json!("T"));
        // 被禁用的字段按缺失处理
        assert_eq!(out["metadata"]["doi"], json!(""));
        assert_eq!(out["metadata"]["grants"], json!([]));
        assert!(out["metadata"].get("prereserve_doi").is_some());
        assert!(out.get("record_id").is_none());
    }

    #[test]
    fn test_marshal_published_deposition_reads_latest_sip() {
        let config = Config::default();
        let mut deposition = Deposition::new(5, 42);

        let record = rec(json!({
            "recid": 17,
            "doi": "10.5072/zenodo.17",
            "title": "Published",
            "access_right": "open",
            "communities": ["zenodo"],
            "provisional_communities": ["c1"],
        }));
        let mut sip = Sip::new(0, record.clone());
        sip.package = Some(serde_json::to_string(&record).unwrap());
        sip.seal();
        deposition.sips.push(sip);

        let out = marshal_deposition(&deposition, &config);
        assert_eq!(out["record_id"], json!(17));
        assert_eq!(out["record_url"], json!("https://zenodo.org/record/17"));
        assert_eq!(out["doi"], json!("10.5072/zenodo.17"));
        assert_eq!(out["doi_url"], json!("http://dx.doi.org/10.5072/zenodo.17"));
        assert_eq!(out["metadata"]["title"], json!("Published"));
        assert_eq!(
            out["metadata"]["communities"],
            json!([{"identifier": "c1", "provisional": true}])
        );
        assert!(out["metadata"].get("prereserve_doi").is_none());
    }

    #[test]
    fn test_external_doi_is_not_exposed() {
        let config = Config::default();
        let mut deposition = Deposition::new(1, 1);
        let mut sip = Sip::new(0, rec(json!({"recid": 3, "doi": "10.1234/external"})));
        sip.seal();
        deposition.sips.push(sip);

        let out = marshal_deposition(&deposition, &config);
        assert_eq!(out["record_id"], json!(3));
        assert!(out.get("doi").is_none());
    }

    #[test]
    fn test_marshal_draft_only_has_metadata() {
        let mut draft = Draft::new();
        draft.set("title", "T");
        let out = marshal_draft(&draft);
        assert_eq!(out.as_object().map(Map::len), Some(1));
        assert_eq!(out["metadata"]["title"], json!("T"));
    }
}
