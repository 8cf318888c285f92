//! 提交信息包（SIP）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::models::recjson::RecJson;

/// 提交信息包
///
/// 所有草稿合并后的元数据快照。封存后元数据只读，
/// 只允许继续追加后台任务 ID。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sip {
    pub id: usize,
    metadata: RecJson,
    /// 交给记录存储的序列化记录
    pub package: Option<String>,
    sealed: bool,
    pub task_ids: Vec<u64>,
    pub timestamp: DateTime<Utc>,
}

impl Sip {
    pub fn new(id: usize, metadata: RecJson) -> Self {
        Self {
            id,
            metadata,
            package: None,
            sealed: false,
            task_ids: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn metadata(&self) -> &RecJson {
        &self.metadata
    }

    /// 可变元数据，已封存时返回错误
    pub fn metadata_mut(&mut self) -> Result<&mut RecJson, RecordError> {
        if self.sealed {
            return Err(RecordError::SealedSip { sip_id: self.id });
        }
        Ok(&mut self.metadata)
    }

    pub fn set_metadata(&mut self, metadata: RecJson) -> Result<(), RecordError> {
        *self.metadata_mut()? = metadata;
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn seal(&mut self) {
        self.sealed = true;
        self.timestamp = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sealed_sip_rejects_metadata_changes() {
        let mut sip = Sip::new(0, RecJson::new());
        sip.metadata_mut().unwrap().insert("doi", "10.5072/zenodo.1");
        sip.seal();

        assert!(matches!(
            sip.metadata_mut(),
            Err(RecordError::SealedSip { sip_id: 0 })
        ));
        assert_eq!(sip.metadata().get_str("doi"), Some("10.5072/zenodo.1"));

        // 封存后仍可追加任务
        sip.task_ids.push(7);
        assert_eq!(sip.task_ids, vec![7]);
    }
}
