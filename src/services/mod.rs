//! 业务能力层（Services）
//!
//! 每个外部协作方一个 trait，外加一个内存实现。
//! 流程层只通过 [`Services`] 访问它们。

pub mod draft_validator;
pub mod field_merger;
pub mod license_kb;
pub mod pid_store;
pub mod record_store;
pub mod task_queue;
pub mod user_directory;

pub use draft_validator::{DraftValidator, FieldError, RequiredFieldsValidator};
pub use field_merger::{FieldMerger, ThreeWayMerger};
pub use license_kb::{LicenseInfo, LicenseKb, TomlLicenseKb};
pub use pid_store::{create_doi, InMemoryPidStore, PersistentIdentifier, PidStatus, PidStore};
pub use record_store::{InMemoryRecordStore, RecordStore, StoredFile, UploadMode};
pub use task_queue::{InMemoryTaskQueue, SubmittedTask, TaskQueue};
pub use user_directory::{InMemoryUserDirectory, UserDirectory, UserInfo};

/// 工作流用到的全部协作方
pub struct Services {
    pub licenses: Box<dyn LicenseKb>,
    pub users: Box<dyn UserDirectory>,
    pub pids: Box<dyn PidStore>,
    pub records: Box<dyn RecordStore>,
    pub tasks: Box<dyn TaskQueue>,
    pub merger: Box<dyn FieldMerger>,
    pub validator: Box<dyn DraftValidator>,
}

impl Services {
    /// 全部使用内存实现
    pub fn in_memory() -> Self {
        Self {
            licenses: Box::new(TomlLicenseKb::new()),
            users: Box::new(InMemoryUserDirectory::new()),
            pids: Box::new(InMemoryPidStore::new()),
            records: Box::new(InMemoryRecordStore::new()),
            tasks: Box::new(InMemoryTaskQueue::new()),
            merger: Box::new(ThreeWayMerger),
            validator: Box::new(RequiredFieldsValidator::default()),
        }
    }

    pub fn with_licenses(mut self, licenses: impl LicenseKb + 'static) -> Self {
        self.licenses = Box::new(licenses);
        self
    }

    pub fn with_users(mut self, users: impl UserDirectory + 'static) -> Self {
        self.users = Box::new(users);
        self
    }

    pub fn with_validator(mut self, validator: impl DraftValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }
}
