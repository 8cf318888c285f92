//! 存缴（Deposition）
//!
//! 用户的一次提交会话：持有草稿、SIP 列表、已上传文件以及工作流位置。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkflowError;
use crate::models::draft::Draft;
use crate::models::recjson::RecJson;
use crate::models::sip::Sip;

/// 存缴状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositionState {
    /// 填写中
    Draft,
    /// 已完成上传
    Done,
    /// 已被用户放弃
    Stopped,
}

impl DepositionState {
    pub fn as_str(self) -> &'static str {
        match self {
            DepositionState::Draft => "draft",
            DepositionState::Done => "done",
            DepositionState::Stopped => "stopped",
        }
    }
}

/// 工作流运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    New,
    Running,
    /// 等待表单提交
    Waiting,
    /// 被任务主动中止
    Halted,
    Completed,
    Failed,
}

/// 持久化的工作流位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// 下一条要执行的指令
    pub pc: usize,
    pub status: WorkflowStatus,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            pc: 0,
            status: WorkflowStatus::New,
        }
    }
}

/// 存缴中上传的文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositionFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// 存缴
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposition {
    pub id: u64,
    /// 所有者用户ID
    pub user_id: u64,
    #[serde(default)]
    pub title: String,
    pub state: DepositionState,
    #[serde(default)]
    pub drafts: BTreeMap<String, Draft>,
    #[serde(default)]
    pub sips: Vec<Sip>,
    #[serde(default)]
    pub files: Vec<DepositionFile>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub workflow: WorkflowState,
    /// 中止任务留给 API / 页面层的响应
    #[serde(default)]
    pub render_context: Option<Value>,
    #[serde(default)]
    pub task_sequence_id: Option<u64>,
}

impl Deposition {
    pub fn new(id: u64, user_id: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            title: String::new(),
            state: DepositionState::Draft,
            drafts: BTreeMap::new(),
            sips: Vec::new(),
            files: Vec::new(),
            created: now,
            modified: now,
            workflow: WorkflowState::default(),
            render_context: None,
            task_sequence_id: None,
        }
    }

    /// 是否存在已封存的 SIP
    pub fn has_sip(&self) -> bool {
        self.sips.iter().any(Sip::is_sealed)
    }

    /// 最新的 SIP，`sealed` 为 `None` 时不区分封存状态
    pub fn latest_sip(&self, sealed: Option<bool>) -> Option<&Sip> {
        self.sips
            .iter()
            .rev()
            .find(|sip| sealed.map_or(true, |s| sip.is_sealed() == s))
    }

    pub fn latest_sip_mut(&mut self, sealed: Option<bool>) -> Option<&mut Sip> {
        self.sips
            .iter_mut()
            .rev()
            .find(|sip| sealed.map_or(true, |s| sip.is_sealed() == s))
    }

    pub fn require_sip(&self, sealed: bool) -> Result<&Sip, WorkflowError> {
        self.latest_sip(Some(sealed))
            .ok_or(WorkflowError::SipNotFound { sealed })
    }

    pub fn require_sip_mut(&mut self, sealed: bool) -> Result<&mut Sip, WorkflowError> {
        self.latest_sip_mut(Some(sealed))
            .ok_or(WorkflowError::SipNotFound { sealed })
    }

    /// 取得唯一的未封存 SIP，不存在时新建
    ///
    /// 保证同一时刻最多只有一个未封存的 SIP。
    pub fn unsealed_sip_or_create(&mut self) -> &mut Sip {
        let position = self.sips.iter().rposition(|sip| !sip.is_sealed());
        let index = match position {
            Some(index) => index,
            None => {
                let id = self.sips.len();
                self.sips.push(Sip::new(id, RecJson::new()));
                id
            }
        };
        &mut self.sips[index]
    }

    pub fn get_draft(&self, draft_id: &str) -> Option<&Draft> {
        self.drafts.get(draft_id)
    }

    pub fn require_draft_mut(&mut self, draft_id: &str) -> Result<&mut Draft, WorkflowError> {
        self.drafts
            .get_mut(draft_id)
            .ok_or_else(|| WorkflowError::DraftNotFound {
                draft_id: draft_id.to_string(),
            })
    }

    pub fn get_or_create_draft(&mut self, draft_id: &str) -> &mut Draft {
        self.drafts.entry(draft_id.to_string()).or_default()
    }

    /// 更新修改时间
    pub fn update(&mut self) {
        self.modified = Utc::now();
    }

    pub fn set_render_context(&mut self, context: Value) {
        self.render_context = Some(context);
    }

    pub fn take_render_context(&mut self) -> Option<Value> {
        self.render_context.take()
    }

    pub fn is_done(&self) -> bool {
        self.state == DepositionState::Done
    }

    /// 重置已完成的工作流，以便重新编辑
    ///
    /// 只有工作流已完成时才会生效；同时清空所有草稿。
    pub fn reinitialize_workflow(&mut self) -> bool {
        if self.workflow.status != WorkflowStatus::Completed {
            return false;
        }
        self.workflow = WorkflowState::default();
        self.drafts.clear();
        self.state = DepositionState::Draft;
        self.update();
        true
    }

    /// 放弃存缴
    pub fn stop_workflow(&mut self) {
        self.state = DepositionState::Stopped;
        self.workflow.status = WorkflowStatus::Halted;
        self.update();
    }
}
