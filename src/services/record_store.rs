//! 记录存储 - 业务能力层
//!
//! 代替旧的书目上传子系统：分配记录ID、保存记录、保存文件访问规则

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::AppResult;
use crate::models::RecJson;

/// 上传方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// 新记录
    Insert,
    /// 替换已有记录
    Replace,
}

/// 记录附带的文件
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub name: String,
    pub format: String,
    /// 文件访问规则
    pub restriction: String,
}

/// 记录存储
pub trait RecordStore {
    /// 预留一个新的记录ID
    fn reserve_recid(&mut self) -> u64;

    fn get(&self, recid: u64) -> Option<RecJson>;

    /// 记录最后一次写入的时间
    fn modification_date(&self, recid: u64) -> Option<DateTime<Utc>>;

    /// 写入记录；记录中的 `fft` 列表会被拆出来作为文件保存
    fn upload(&mut self, recid: u64, record: &RecJson, mode: UploadMode) -> AppResult<()>;

    fn latest_files(&self, recid: u64) -> Vec<StoredFile>;
}

#[derive(Debug, Clone)]
struct StoredRecord {
    record: RecJson,
    files: Vec<StoredFile>,
    modified: DateTime<Utc>,
}

/// 内存中的记录存储
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    next_recid: u64,
    records: HashMap<u64, StoredRecord>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            next_recid: 1,
            records: HashMap::new(),
        }
    }
}

impl RecordStore for InMemoryRecordStore {
    fn reserve_recid(&mut self) -> u64 {
        let recid = self.next_recid.max(1);
        self.next_recid = recid + 1;
        recid
    }

    fn get(&self, recid: u64) -> Option<RecJson> {
        self.records.get(&recid).map(|r| r.record.clone())
    }

    fn modification_date(&self, recid: u64) -> Option<DateTime<Utc>> {
        self.records.get(&recid).map(|r| r.modified)
    }

    fn upload(&mut self, recid: u64, record: &RecJson, mode: UploadMode) -> AppResult<()> {
        let mut record = record.clone();
        let fft = record.remove("fft").unwrap_or(Value::Null);

        let mut files = match (mode, self.records.get(&recid)) {
            (UploadMode::Replace, Some(existing)) => existing.files.clone(),
            _ => Vec::new(),
        };

        for entry in fft.as_array().into_iter().flatten() {
            let Some(name) = entry.get("name").and_then(Value::as_str) else {
                continue;
            };
            let restriction = entry
                .get("restriction")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let format = entry
                .get("format")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| file_format(name));

            match files.iter_mut().find(|f| f.name == name) {
                Some(existing) => existing.restriction = restriction,
                None => files.push(StoredFile {
                    name: name.to_string(),
                    format,
                    restriction,
                }),
            }
        }

        if recid >= self.next_recid {
            self.next_recid = recid + 1;
        }

        debug!("写入记录 {} ({:?}), 文件 {} 个", recid, mode, files.len());
        self.records.insert(
            recid,
            StoredRecord {
                record,
                files,
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn latest_files(&self, recid: u64) -> Vec<StoredFile> {
        self.records
            .get(&recid)
            .map(|r| r.files.clone())
            .unwrap_or_default()
    }
}

/// 由文件名推断格式（带点的扩展名）
fn file_format(name: &str) -> String {
    name.rfind('.')
        .map(|idx| name[idx..].to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> RecJson {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_upload_splits_files_from_record() {
        let mut store = InMemoryRecordStore::new();
        let recid = store.reserve_recid();
        assert_eq!(recid, 1);

        store
            .upload(
                recid,
                &rec(json!({
                    "title": "t",
                    "fft": [{"name": "data.csv", "restriction": "", "comment": "0"}]
                })),
                UploadMode::Insert,
            )
            .unwrap();

        let stored = store.get(recid).unwrap();
        assert!(!stored.contains_key("fft"));
        let files = store.latest_files(recid);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].format, ".csv");
    }

    #[test]
    fn test_replace_keeps_files_and_updates_restriction() {
        let mut store = InMemoryRecordStore::new();
        store
            .upload(
                5,
                &rec(json!({"fft": [{"name": "a.pdf", "restriction": ""}]})),
                UploadMode::Insert,
            )
            .unwrap();
        store
            .upload(
                5,
                &rec(json!({"fft": [{"name": "a.pdf", "format": ".pdf", "restriction": "firerole: allow uid \"1\"\ndeny all"}]})),
                UploadMode::Replace,
            )
            .unwrap();

        let files = store.latest_files(5);
        assert_eq!(files.len(), 1);
        assert!(files[0].restriction.starts_with("firerole"));
        // 手动写入的 recid 之后不会被重复分配
        assert_eq!(store.reserve_recid(), 6);
    }
}
