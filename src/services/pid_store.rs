//! 持久标识符存储 - 业务能力层

use std::collections::HashMap;

use crate::config::Config;
use crate::error::{AppResult, WorkflowError};

/// 标识符状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidStatus {
    /// 已创建，尚未指向任何对象
    New,
    /// 已指向记录，等待外部注册
    Reserved,
}

/// 持久标识符
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentIdentifier {
    pub pid_type: String,
    pub value: String,
    pub status: PidStatus,
    /// 指向的对象（类型, ID）
    pub object: Option<(String, u64)>,
}

/// 持久标识符存储
pub trait PidStore {
    fn get(&self, pid_type: &str, value: &str) -> Option<PersistentIdentifier>;

    /// 创建标识符，已存在时返回 `false`
    fn create(&mut self, pid_type: &str, value: &str) -> bool;

    /// 把标识符指向一个对象
    fn assign(
        &mut self,
        pid_type: &str,
        value: &str,
        object_type: &str,
        object_value: u64,
    ) -> AppResult<()>;
}

/// 内存中的标识符存储
#[derive(Debug, Default)]
pub struct InMemoryPidStore {
    pids: HashMap<(String, String), PersistentIdentifier>,
}

impl InMemoryPidStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PidStore for InMemoryPidStore {
    fn get(&self, pid_type: &str, value: &str) -> Option<PersistentIdentifier> {
        self.pids
            .get(&(pid_type.to_string(), value.to_string()))
            .cloned()
    }

    fn create(&mut self, pid_type: &str, value: &str) -> bool {
        let key = (pid_type.to_string(), value.to_string());
        if self.pids.contains_key(&key) {
            return false;
        }
        self.pids.insert(
            key,
            PersistentIdentifier {
                pid_type: pid_type.to_string(),
                value: value.to_string(),
                status: PidStatus::New,
                object: None,
            },
        );
        true
    }

    fn assign(
        &mut self,
        pid_type: &str,
        value: &str,
        object_type: &str,
        object_value: u64,
    ) -> AppResult<()> {
        let failed = |reason: &str| WorkflowError::PidFailed {
            pid_type: pid_type.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let pid = self
            .pids
            .get_mut(&(pid_type.to_string(), value.to_string()))
            .ok_or_else(|| failed("标识符不存在"))?;

        match &pid.object {
            Some((t, v)) if t == object_type && *v == object_value => Ok(()),
            Some(_) => Err(failed("标识符已指向其他对象").into()),
            None => {
                pid.object = Some((object_type.to_string(), object_value));
                pid.status = PidStatus::Reserved;
                Ok(())
            }
        }
    }
}

/// 为记录生成本站 DOI
pub fn create_doi(config: &Config, recid: u64) -> String {
    format!("{}/zenodo.{}", config.doi_prefix, recid)
}
