//! # Zenodo Deposit
//!
//! 研究数据存缴的上传工作流：把用户填写的表单转换成记录，分配记录ID
//! 和 DOI，封存提交信息包并写入记录存储；已发布的记录可以重新载入、
//! 编辑并与当前版本三方合并。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 数据层（Models / Records）
//! - `models/` - 存缴、草稿、SIP、recjson 等数据结构
//! - `records/` - recjson 处理管线、文件访问规则、三方合并、表单映射
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 协作方接口及其内存实现
//! - `LicenseKb` / `UserDirectory` / `PidStore` / `RecordStore` / `TaskQueue`
//! - `FieldMerger` / `DraftValidator`
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 可续跑的任务引擎与上传流程定义
//! - `DepositCtx` - 上下文封装（配置 + 协作方 + 请求来源）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/deposition_type` - REST 动作与对外表示
//! - `orchestrator/batch_processor` - 批量处理存缴请求
//!
//! ## 模块结构

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod records;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Deposition, Draft, RecJson, Sip};
pub use orchestrator::{App, UploadType};
pub use services::Services;
pub use workflow::{DepositCtx, RunOutcome, Workflow};
