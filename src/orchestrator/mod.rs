//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和对外操作，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量存缴处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载存缴请求（Vec<DepositionRequest>）
//! - 输出全局统计信息
//!
//! ### `deposition_type` - 上传类型
//! - REST 动作（publish / edit / discard）
//! - 存缴与草稿的 REST 表示
//! - 所有权转移、完成页面
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<DepositionRequest>)
//!     ↓
//! deposition_type::UploadType (处理单个存缴)
//!     ↓
//! workflow (upload 流程与任务)
//!     ↓
//! records / services (记录转换与协作方)
//! ```

pub mod batch_processor;
pub mod deposition_type;

// 重新导出主要类型
pub use batch_processor::{App, ProcessingStats};
pub use deposition_type::UploadType;
