//! 通用存缴任务 - 流程层
//!
//! 载入记录、渲染表单、生成与封存 SIP、登记标识符等与具体存缴类型
//! 无关的步骤。上传类型专有的任务见 `upload_tasks`。

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::api::marshal_deposition;
use crate::config::Config;
use crate::error::{AppResult, WorkflowError};
use crate::models::{Deposition, Draft, FieldValue, RecJson, Sip};
use crate::records::{export_fields, record_to_draft};
use crate::services::{RecordStore, StoredFile, UploadMode};
use crate::workflow::deposit_ctx::DepositCtx;
use crate::workflow::engine::{Task, TaskOutcome};

/// 表单校验失败时返回给 API 调用方的错误码
pub const VALIDATION_ERROR_CODE: u16 = 10;

const VERSION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// 载入后的草稿处理函数
pub type DraftProcessor = fn(&mut Draft, &Config);

/// SIP 元数据处理函数
pub type SipProcessor = fn(&DepositCtx<'_>, &Deposition, &mut RecJson) -> AppResult<()>;

/// 记录合并函数：(上下文, 存缴, 当前记录, 编辑前, 编辑后)
pub type MergeFn = fn(&DepositCtx<'_>, &Deposition, &RecJson, RecJson, RecJson) -> RecJson;

/// 文件处理函数
pub type FileProcessor = fn(&mut Deposition, &[StoredFile]) -> AppResult<()>;

/// 标识符生成函数
pub type PidCreator = fn(&Config, u64) -> String;

/// 已有标识符检查：返回 `true` 表示需要登记
pub type PidChecker = fn(&str, &RecJson) -> bool;

/// 最新封存的 SIP 是否已写入记录存储
pub fn is_sip_uploaded(sip: &Sip, records: &dyn RecordStore) -> bool {
    let Some(recid) = sip.metadata().recid() else {
        return false;
    };
    let Some(stored) = records.modification_date(recid) else {
        return false;
    };
    match sip
        .metadata()
        .get_str("modification_date")
        .and_then(|v| NaiveDateTime::parse_from_str(v, VERSION_FORMAT).ok())
    {
        Some(version) => version <= stored.naive_utc(),
        None => true,
    }
}

// ========== 载入与表单 ==========

/// 把已发布的记录载入为可编辑草稿
pub struct LoadRecord {
    pub draft_id: String,
    pub post_process: Option<DraftProcessor>,
}

impl Task for LoadRecord {
    fn name(&self) -> &'static str {
        "load_record"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let sip = d.require_sip(true)?;
        let recid = sip.metadata().recid().ok_or(WorkflowError::MissingRecid)?;

        if !is_sip_uploaded(sip, ctx.services.records.as_ref()) {
            if ctx.is_api() {
                d.set_render_context(json!({
                    "response": {
                        "message": "Conflict",
                        "status": 409,
                        "errors": "Upload not yet fully integrated. Please wait a few moments.",
                    },
                    "status": 409,
                }));
            } else {
                warn!("[存缴 {}] 记录 {} 尚未完成上传", d.id, recid);
            }
            d.update();
            return Ok(TaskOutcome::halt("Upload not yet fully integrated."));
        }

        // 已经载入过
        if !d.drafts.is_empty() {
            return Ok(TaskOutcome::Continue);
        }

        let record = ctx
            .services
            .records
            .get(recid)
            .ok_or(WorkflowError::RecordNotFound { recid })?;
        let mut draft = record_to_draft(&record);
        if let Some(post_process) = self.post_process {
            post_process(&mut draft, ctx.config);
        }
        d.drafts.insert(self.draft_id.clone(), draft);
        d.update();
        info!("[存缴 {}] 📄 记录 {} 已载入草稿 {}", d.id, recid, self.draft_id);

        // API 调用方需要先拿到草稿再编辑
        if ctx.is_api() {
            let body = marshal_deposition(d, ctx.config);
            d.set_render_context(json!({ "response": body, "status": 201 }));
            return Ok(TaskOutcome::halt("API: Draft loaded"));
        }
        Ok(TaskOutcome::Continue)
    }
}

/// 渲染表单并等待提交；API 调用时改为校验草稿
pub struct RenderForm {
    pub draft_id: String,
}

impl Task for RenderForm {
    fn name(&self) -> &'static str {
        "render_form"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let deposition_id = d.id;
        let draft = d.get_or_create_draft(&self.draft_id);

        if ctx.is_api() {
            let errors = ctx.services.validator.validate(&self.draft_id, draft);
            if errors.is_empty() {
                return Ok(TaskOutcome::Continue);
            }

            debug!("[存缴 {}] 草稿校验失败: {:?}", deposition_id, errors);
            let errors: Vec<Value> = errors
                .into_iter()
                .map(|e| {
                    json!({
                        "field": e.field,
                        "message": e.message,
                        "code": VALIDATION_ERROR_CODE,
                    })
                })
                .collect();
            d.set_render_context(json!({
                "response": {"message": "Bad Request", "status": 400, "errors": errors},
                "status": 400,
            }));
            d.update();
            return Ok(TaskOutcome::halt("API: Draft did not validate"));
        }

        if draft.is_completed() {
            return Ok(TaskOutcome::Continue);
        }

        let values = Value::Object(draft.values_json());
        d.set_render_context(json!({
            "template": "deposit/run.html",
            "deposition_id": deposition_id,
            "draft_id": self.draft_id,
            "draft": values,
        }));
        d.update();
        Ok(TaskOutcome::wait(self.draft_id.clone()))
    }
}

/// 为新草稿填入默认的许可证和访问权限
pub struct PrefillDraft {
    pub draft_id: String,
}

impl Task for PrefillDraft {
    fn name(&self) -> &'static str {
        "prefill_draft"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let draft = d.get_or_create_draft(&self.draft_id);
        if draft.get("license").is_none() {
            draft.set("license", ctx.config.default_license.as_str());
        }
        if draft.get("access_right").is_none() {
            draft.set("access_right", ctx.config.default_access_right.as_str());
        }
        d.update();
        Ok(TaskOutcome::Continue)
    }
}

// ========== SIP ==========

/// 合并所有草稿，生成（或刷新）唯一的未封存 SIP
pub struct PrepareSip;

impl Task for PrepareSip {
    fn name(&self) -> &'static str {
        "prepare_sip"
    }

    fn execute(&self, d: &mut Deposition, _ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let mut values: BTreeMap<String, FieldValue> = BTreeMap::new();
        for draft in d.drafts.values() {
            values.extend(draft.values.clone());
        }

        let mut metadata = export_fields(&values);
        let files: Vec<Value> = d
            .files
            .iter()
            .map(|f| {
                json!({
                    "id": f.id,
                    "name": f.name,
                    "size": f.size,
                    "checksum": f.checksum,
                })
            })
            .collect();
        metadata.insert("fft", files);

        d.unsealed_sip_or_create().set_metadata(metadata)?;
        d.update();
        Ok(TaskOutcome::Continue)
    }
}

/// 对未封存 SIP 的元数据执行处理函数
pub struct ProcessSipMetadata {
    pub processor: SipProcessor,
}

impl Task for ProcessSipMetadata {
    fn name(&self) -> &'static str {
        "process_sip_metadata"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let mut metadata = d.require_sip(false)?.metadata().clone();
        (self.processor)(ctx, d, &mut metadata)?;
        d.require_sip_mut(false)?.set_metadata(metadata)?;
        d.update();
        Ok(TaskOutcome::Continue)
    }
}

/// 把编辑后的 SIP 元数据合并进当前记录
pub struct MergeRecord {
    pub draft_id: String,
    pub post_process_load: Option<DraftProcessor>,
    pub process_export: SipProcessor,
    pub merge: MergeFn,
}

impl Task for MergeRecord {
    fn name(&self) -> &'static str {
        "merge_record"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        if d.get_draft(&self.draft_id).is_none() {
            return Err(WorkflowError::DraftNotFound {
                draft_id: self.draft_id.clone(),
            }
            .into());
        }

        let b = d.require_sip(false)?.metadata().clone();
        let recid = b.recid().ok_or(WorkflowError::MissingRecid)?;
        let mut dest = ctx
            .services
            .records
            .get(recid)
            .ok_or(WorkflowError::RecordNotFound { recid })?;

        // 当前记录按同样的表单还原再导出，得到编辑前的版本
        let mut draft = record_to_draft(&dest);
        if let Some(post_process) = self.post_process_load {
            post_process(&mut draft, ctx.config);
        }
        let mut a = export_fields(&draft.values);
        (self.process_export)(ctx, d, &mut a)?;

        for key in a.keys().cloned().collect::<Vec<_>>() {
            if !dest.contains_key(&key) {
                if let Some(value) = a.get(&key).cloned() {
                    dest.insert(key, value);
                }
            }
        }

        let mut merged = (self.merge)(ctx, d, &dest, a, b);
        if let Some(modified) = ctx.services.records.modification_date(recid) {
            merged.insert(
                "modification_date",
                modified.format(VERSION_FORMAT).to_string(),
            );
        }

        d.require_sip_mut(false)?.set_metadata(merged)?;
        d.update();
        info!("[存缴 {}] 🔀 编辑已合并到记录 {}", d.id, recid);
        Ok(TaskOutcome::Continue)
    }
}

/// 按存储中的文件更新 SIP 的文件列表
pub struct ProcessBibdocfile {
    pub process: FileProcessor,
}

impl Task for ProcessBibdocfile {
    fn name(&self) -> &'static str {
        "process_bibdocfile"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let Some(recid) = d.require_sip(false)?.metadata().recid() else {
            return Ok(TaskOutcome::Continue);
        };
        let files = ctx.services.records.latest_files(recid);
        (self.process)(d, &files)?;
        d.update();
        Ok(TaskOutcome::Continue)
    }
}

/// 元数据中没有记录ID时分配一个
pub struct CreateRecid;

impl Task for CreateRecid {
    fn name(&self) -> &'static str {
        "create_recid"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let metadata = d.require_sip_mut(false)?.metadata_mut()?;
        if !metadata.contains_key("recid") {
            let recid = ctx.services.records.reserve_recid();
            metadata.insert("recid", recid);
            info!("[存缴 {}] 🆔 分配记录ID {}", d.id, recid);
        }
        d.update();
        Ok(TaskOutcome::Continue)
    }
}

/// 在内部标识符存储中登记标识符，真正的对外注册稍后异步完成
pub struct MintPid {
    pub pid_field: &'static str,
    pub pid_store_type: &'static str,
    pub pid_creator: PidCreator,
    pub existing_pid_checker: Option<PidChecker>,
}

impl Task for MintPid {
    fn name(&self) -> &'static str {
        "mint_pid"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let metadata = d.require_sip(false)?.metadata().clone();
        let recid = metadata.recid().ok_or(WorkflowError::MissingRecid)?;

        let existing = metadata
            .get_str(self.pid_field)
            .filter(|pid| !pid.trim().is_empty());

        let pid_text = match existing {
            None => {
                let pid = (self.pid_creator)(ctx.config, recid);
                d.require_sip_mut(false)?
                    .metadata_mut()?
                    .insert(self.pid_field, pid.clone());
                Some(pid)
            }
            Some(pid) => self
                .existing_pid_checker
                .filter(|check| check(pid, &metadata))
                .map(|_| pid.to_string()),
        };

        if let Some(pid) = pid_text {
            info!("[存缴 {}] 🔖 登记 {} {}", d.id, self.pid_store_type, pid);
            if !ctx.services.pids.create(self.pid_store_type, &pid) {
                debug!("{} {} 已存在", self.pid_store_type, pid);
            }
            // 已指向其他记录的标识符不能再发布
            if let Err(e) = ctx
                .services
                .pids
                .assign(self.pid_store_type, &pid, "rec", recid)
            {
                warn!("[存缴 {}] ⚠️ {}", d.id, e);
                return Err(e);
            }
        }

        d.update();
        Ok(TaskOutcome::Continue)
    }
}

/// 把最终元数据序列化为 SIP 包
pub struct FinalizeRecordSip;

impl Task for FinalizeRecordSip {
    fn name(&self) -> &'static str {
        "finalize_record_sip"
    }

    fn execute(&self, d: &mut Deposition, _ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let sip = d.require_sip_mut(false)?;
        sip.package = Some(serde_json::to_string(sip.metadata())?);
        d.update();
        Ok(TaskOutcome::Continue)
    }
}

/// 封存 SIP，写入记录存储并登记上传任务
pub struct UploadRecordSip;

impl Task for UploadRecordSip {
    fn name(&self) -> &'static str {
        "upload_record_sip"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let sequence_id = ctx.services.tasks.reserve_sequence_id();

        let sip = d.require_sip_mut(false)?;
        let record: RecJson = match sip.package.as_deref() {
            Some(package) => serde_json::from_str(package)?,
            None => sip.metadata().clone(),
        };
        let recid = record.recid().ok_or(WorkflowError::MissingRecid)?;

        let (mode, flag) = match ctx.services.records.get(recid) {
            Some(_) => (UploadMode::Replace, "-r"),
            None => (UploadMode::Insert, "-i"),
        };
        // 写入成功后才封存，失败时 SIP 保持可修改以便重试
        ctx.services.records.upload(recid, &record, mode)?;
        sip.seal();

        let task_id = ctx.services.tasks.submit(
            "bibupload",
            "webdeposit",
            vec![
                flag.to_string(),
                format!("record_{}.json", recid),
                "-P5".to_string(),
                "-I".to_string(),
                sequence_id.to_string(),
            ],
        );
        sip.task_ids.push(task_id);

        d.task_sequence_id = Some(sequence_id);
        d.update();
        info!("[存缴 {}] 📦 SIP 已封存并写入记录 {}", d.id, recid);
        Ok(TaskOutcome::Continue)
    }
}
