//! API 模块
//!
//! 负责存缴对外的 REST 表示

pub mod marshal;

// 重新导出常用函数
pub use marshal::{
    marshal, marshal_deposition, marshal_draft, metadata_edit_fields, FieldKind, FieldSpec,
    DEPOSITION_FIELDS, FILE_FIELDS, METADATA_FIELDS,
};
