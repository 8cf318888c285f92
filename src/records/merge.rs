//! 编辑已发布记录时的三方合并
//!
//! - `dest`: 记录存储中的当前记录，包含所有字段
//! - `a`: 由当前记录还原出的草稿再导出的版本（用户编辑前）
//! - `b`: 用户编辑后的 SIP 元数据

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::models::{Deposition, RecJson};
use crate::records::process::{owner_stamp, split_authors};
use crate::records::RecordCtx;

/// 合并社区后做通用字段合并，最后重新盖上作者拆分和所有者
pub fn merge(
    ctx: &RecordCtx<'_>,
    deposition: &Deposition,
    dest: &RecJson,
    mut a: RecJson,
    mut b: RecJson,
) -> RecJson {
    reconcile_communities(ctx.config, dest, &mut a, &mut b);

    match a.get("doi").cloned() {
        Some(doi) => b.insert("doi", doi),
        None => b.remove("doi"),
    };

    let mut data = ctx.merger.merge(dest, &a, &b);
    split_authors(&mut data);

    // 所有者总是以存缴当前的用户为准
    let stamp = owner_stamp(ctx, deposition);
    match data.get_mut("owner").and_then(Value::as_object_mut) {
        Some(owner) => {
            if let Value::Object(stamp) = stamp {
                owner.extend(stamp);
            }
        }
        None => {
            data.insert("owner", stamp);
        }
    }

    data
}

/// 社区的手动合并
///
/// 记录载入后，待审社区可能已经被批准，所以 `a` 中已是正式社区、
/// 而 `b` 中仍是待审的条目需要提升为正式社区。系统社区按 `dest`
/// 中的状态补回 `a` 和 `b`。
pub fn reconcile_communities(config: &Config, dest: &RecJson, a: &mut RecJson, b: &mut RecJson) {
    let a_communities = a.string_list("communities");
    let approved: BTreeSet<String> = b
        .string_list("provisional_communities")
        .into_iter()
        .filter(|c| a_communities.contains(c))
        .collect();

    let mut communities = b.string_list("communities");
    let mut provisional = Vec::new();
    for c in b.string_list("provisional_communities") {
        if approved.contains(&c) {
            push_unique(&mut communities, &c);
        } else {
            provisional.push(c);
        }
    }

    // 同一个社区不能同时处于两种状态
    provisional.retain(|c| !communities.contains(c));

    b.insert("communities", communities);
    b.insert("provisional_communities", provisional);

    let dest_communities = dest.string_list("communities");
    let dest_provisional = dest.string_list("provisional_communities");

    for system in config.system_communities() {
        let key = if dest_communities.iter().any(|c| c == system) {
            "communities"
        } else if dest_provisional.iter().any(|c| c == system) {
            "provisional_communities"
        } else {
            continue;
        };
        for side in [&mut *a, &mut *b] {
            let mut list = side.string_list(key);
            push_unique(&mut list, system);
            side.insert(key, list);
        }
    }

    debug!(
        "社区合并结果: communities={:?}, provisional={:?}",
        b.get("communities"),
        b.get("provisional_communities")
    );
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}
