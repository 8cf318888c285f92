//! 流程层（Workflow Layer）
//!
//! - `engine` - 可中止、可续跑的任务执行引擎
//! - `deposit_ctx` - 调用来源与协作方
//! - `tasks` - 通用存缴任务
//! - `upload_tasks` / `upload_flow` - 上传类型的任务和流程定义

pub mod deposit_ctx;
pub mod engine;
pub mod tasks;
pub mod upload_flow;
pub mod upload_tasks;

pub use deposit_ctx::{DepositCtx, RequestOrigin};
pub use engine::{Condition, RunOutcome, Step, Task, TaskOutcome, Workflow};
pub use tasks::{is_sip_uploaded, VALIDATION_ERROR_CODE};
pub use upload_flow::{has_submission, transfer_ownership, upload, DEFAULT_DRAFT_ID, EDIT_DRAFT_ID};
pub use upload_tasks::{check_existing_pid, ApiValidateFiles, ReservedRecid, RunTasks};
