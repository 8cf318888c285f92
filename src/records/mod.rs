//! 记录转换层
//!
//! 草稿 → recjson → 记录 的纯函数转换，外加编辑时的三方合并。
//! 所有依赖都通过 [`RecordCtx`] 显式传入。

pub mod firerole;
pub mod form;
pub mod merge;
pub mod process;

pub use firerole::file_firerole;
pub use form::{export_fields, process_draft, record_to_draft, EXPORT_KEYS};
pub use merge::{merge, reconcile_communities};
pub use process::{
    filter_empty_elements, owner_stamp, process_files, process_recjson, process_recjson_edit,
    process_recjson_new,
};

use crate::config::Config;
use crate::services::{FieldMerger, LicenseKb, Services, UserDirectory};

/// 记录转换所需的上下文
#[derive(Clone, Copy)]
pub struct RecordCtx<'a> {
    pub config: &'a Config,
    pub licenses: &'a dyn LicenseKb,
    pub users: &'a dyn UserDirectory,
    pub merger: &'a dyn FieldMerger,
}

impl<'a> RecordCtx<'a> {
    pub fn new(config: &'a Config, services: &'a Services) -> Self {
        Self {
            config,
            licenses: services.licenses.as_ref(),
            users: services.users.as_ref(),
            merger: services.merger.as_ref(),
        }
    }
}
