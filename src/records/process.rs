//! recjson 处理流水线
//!
//! 草稿导出的扁平 recjson 在这里被整理成记录结构。日期已在导出时
//! （[`RecJson::from_fields`]）渲染成 ISO-8601，这里不再处理。

use serde_json::{json, Value};
use tracing::debug;

use crate::error::{AppResult, RecordError};
use crate::models::recjson::{display_value, is_blank};
use crate::models::{AccessRight, Deposition, RecJson};
use crate::records::firerole::file_firerole;
use crate::records::RecordCtx;
use crate::services::StoredFile;

/// 收录于其他出版物时，从出版信息挪到 `part_of` 的字段（目标, 来源）
const PART_OF_REMAP: [(&str, &str); 4] = [
    ("part_of.publisher", "imprint.publisher"),
    ("part_of.place", "imprint.place"),
    ("part_of.year", "imprint.year"),
    ("part_of.isbn", "isbn"),
];

/// 需要过滤空元素的列表字段
const LIST_FIELDS: [&str; 3] = ["authors", "keywords", "thesis_supervisors"];

const ALTERNATE_RELATION: &str = "isAlternativeIdentifier";

/// 新记录和编辑共用的处理步骤
pub fn process_recjson(ctx: &RecordCtx<'_>, recjson: &mut RecJson) -> Result<(), RecordError> {
    split_authors(recjson);
    split_communities(recjson);
    extract_alternate_identifiers(recjson);
    resolve_license(ctx, recjson)?;

    // 期刊
    if recjson.is_truthy("journal.title") {
        if let Some(year) = publication_year(recjson) {
            recjson.insert("journal.year", year);
        }
    }

    wrap_references(recjson);

    // 图书 / 章节 / 报告
    if recjson.contains_key("imprint.publisher") && recjson.contains_key("imprint.place") {
        if let Some(year) = publication_year(recjson) {
            recjson.insert("imprint.year", year);
        }
    }
    if recjson.contains_key("part_of.title") {
        for (target, source) in PART_OF_REMAP {
            if let Some(value) = recjson.remove(source) {
                recjson.insert(target, value);
            }
        }
    }

    rewrite_grants(recjson);
    filter_empty_elements(recjson);
    recjson.fold_dotted_keys()
}

/// 新记录：通用处理 + 所有者、系统社区、文件访问规则
pub fn process_recjson_new(
    ctx: &RecordCtx<'_>,
    deposition: &Deposition,
    recjson: &mut RecJson,
) -> Result<(), RecordError> {
    process_recjson(ctx, recjson)?;

    recjson.insert("owner", owner_stamp(ctx, deposition));

    let mut provisional = recjson.string_list("provisional_communities");
    push_unique(&mut provisional, &ctx.config.zenodo_community);
    if recjson.is_truthy("grants") {
        push_unique(&mut provisional, &ctx.config.ecfunded_community);
    }
    recjson.insert("provisional_communities", provisional);

    let access_right = AccessRight::from_recjson(recjson)?;
    let restriction = file_firerole(
        deposition.user_id,
        access_right,
        recjson.get_str("embargo_date"),
    );

    if let Some(Value::Array(files)) = recjson.get_mut("fft") {
        // 存储层不保留文件顺序，用补零的序号作为注释来排序
        let width = files.len().to_string().len();
        for (idx, file) in files.iter_mut().enumerate() {
            if let Value::Object(file) = file {
                file.insert("restriction".to_string(), Value::from(restriction.clone()));
                file.insert(
                    "comment".to_string(),
                    Value::from(format!("{:0width$}", idx, width = width)),
                );
            }
        }
    }

    Ok(())
}

/// 编辑：通用处理，去掉文件列表
pub fn process_recjson_edit(ctx: &RecordCtx<'_>, recjson: &mut RecJson) -> Result<(), RecordError> {
    process_recjson(ctx, recjson)?;
    recjson.remove("fft");
    Ok(())
}

/// 过滤列表字段中的空元素
///
/// 总是写回 `authors`、`keywords`、`thesis_supervisors` 和 `related_identifiers`，
/// 缺失时写入空列表。重复调用结果不变。
pub fn filter_empty_elements(recjson: &mut RecJson) {
    for key in LIST_FIELDS {
        let kept = keep_non_empty(recjson.list(key), None);
        recjson.insert(key, kept);
    }
    let kept = keep_non_empty(recjson.list("related_identifiers"), Some("identifier"));
    recjson.insert("related_identifiers", kept);
}

/// 编辑时按存储中的最新文件重建 `fft`，只更新访问规则
pub fn process_files(deposition: &mut Deposition, files: &[StoredFile]) -> AppResult<()> {
    let fallback_uid = deposition.user_id;
    let metadata = deposition.require_sip_mut(false)?.metadata_mut()?;

    let owner_id = metadata
        .get("owner")
        .and_then(|owner| owner.get("id"))
        .and_then(Value::as_u64)
        .unwrap_or(fallback_uid);
    let access_right = AccessRight::from_recjson(metadata)?;
    let restriction = file_firerole(owner_id, access_right, metadata.get_str("embargo_date"));

    let fft: Vec<Value> = files
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "format": f.format,
                "restriction": restriction,
                "description": "KEEP-OLD-VALUE",
                "comment": "KEEP-OLD-VALUE",
            })
        })
        .collect();

    debug!("重建 fft: {} 个文件", fft.len());
    metadata.insert("fft", fft);
    Ok(())
}

/// 记录所有者信息
pub fn owner_stamp(ctx: &RecordCtx<'_>, deposition: &Deposition) -> Value {
    let user = ctx.users.user_info(deposition.user_id).unwrap_or_default();
    json!({
        "email": user.email,
        "username": user.nickname,
        "id": deposition.user_id,
        "deposition_id": deposition.id,
    })
}

// ========== 各个处理步骤 ==========

pub(crate) fn split_authors(recjson: &mut RecJson) {
    let authors = recjson.list("authors");
    if let Some((first, rest)) = authors.split_first() {
        recjson.insert("_first_author", first.clone());
        recjson.insert("_additional_authors", rest.to_vec());
    }
}

/// 把 `{identifier, provisional}` 对象列表拆成正式社区和待审社区两个 ID 列表
fn split_communities(recjson: &mut RecJson) {
    let items = match recjson.get("communities") {
        Some(Value::Array(items)) => items.clone(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => return,
    };

    // 已经是字符串列表，说明处理过了
    if items.iter().any(|c| !c.is_object()) {
        return;
    }

    if items.is_empty() {
        recjson.insert("communities", Vec::<Value>::new());
        if !matches!(recjson.get("provisional_communities"), Some(Value::Array(_))) {
            recjson.insert("provisional_communities", Vec::<Value>::new());
        }
        return;
    }

    let (provisional, accepted): (Vec<&Value>, Vec<&Value>) = items.iter().partition(|c| {
        c.get("provisional")
            .map(|flag| !is_blank(flag))
            .unwrap_or(false)
    });
    let identifiers = |list: Vec<&Value>| -> Vec<Value> {
        list.into_iter()
            .filter_map(|c| c.get("identifier").cloned())
            .collect()
    };

    recjson.insert("provisional_communities", identifiers(provisional));
    recjson.insert("communities", identifiers(accepted));
}

fn extract_alternate_identifiers(recjson: &mut RecJson) {
    let related = recjson.list("related_identifiers");
    if related.is_empty() {
        return;
    }

    let (alternate, related): (Vec<Value>, Vec<Value>) = related
        .into_iter()
        .partition(|x| x.get("relation").and_then(Value::as_str) == Some(ALTERNATE_RELATION));

    let alternate: Vec<Value> = alternate
        .iter()
        .map(|x| {
            json!({
                "scheme": x.get("scheme").cloned().unwrap_or(Value::Null),
                "identifier": x.get("identifier").cloned().unwrap_or(Value::Null),
            })
        })
        .collect();

    recjson.insert("related_identifiers", related);
    recjson.insert("alternate_identifiers", alternate);
}

fn resolve_license(ctx: &RecordCtx<'_>, recjson: &mut RecJson) -> Result<(), RecordError> {
    let access_right = AccessRight::from_recjson(recjson)?;
    if !access_right.carries_license() {
        recjson.remove("license");
        return Ok(());
    }

    let Some(code) = recjson.get_str("license").map(str::to_string) else {
        return Ok(());
    };
    if let Some(info) = ctx.licenses.lookup(&code) {
        recjson.insert(
            "license",
            json!({
                "identifier": code,
                "source": ctx.config.license_source,
                "license": info.title,
                "url": info.url,
            }),
        );
    }
    Ok(())
}

fn wrap_references(recjson: &mut RecJson) {
    let references = recjson.list("references");
    if references.is_empty() {
        return;
    }
    let wrapped: Vec<Value> = references
        .into_iter()
        .map(|r| match r {
            Value::String(s) => json!({ "raw_reference": s }),
            other => other,
        })
        .collect();
    recjson.insert("references", wrapped);
}

/// `{id, acronym, title}` → `{title: "ACRONYM - TITLE (ID)", identifier: ID}`
fn rewrite_grants(recjson: &mut RecJson) {
    let grants: Vec<Value> = recjson
        .list("grants")
        .into_iter()
        .map(|grant| {
            let rewritten = match (grant.get("id"), grant.get("acronym"), grant.get("title")) {
                (Some(id), Some(acronym), Some(title)) => Some(json!({
                    "title": format!(
                        "{} - {} ({})",
                        display_value(acronym),
                        display_value(title),
                        display_value(id)
                    ),
                    "identifier": id,
                })),
                // 已经改写过
                _ => None,
            };
            rewritten.unwrap_or(grant)
        })
        .collect();
    recjson.insert("grants", grants);
}

fn publication_year(recjson: &RecJson) -> Option<String> {
    recjson
        .get_str("publication_date")
        .map(|date| date.chars().take(4).collect())
}

fn keep_non_empty(items: Vec<Value>, key: Option<&str>) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| has_content(item, key))
        .collect()
}

/// 对象只要有一个非空值（限定键时只看该键）就算有内容
fn has_content(item: &Value, key: Option<&str>) -> bool {
    match item {
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| key.map_or(true, |key| k == key) && !is_blank(v)),
        other => !is_blank(other),
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}
