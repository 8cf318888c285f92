//! 上传工作流 - 流程层
//!
//! 新建与编辑共用一条流程，按存缴是否已有提交（封存的 SIP）分支：
//!
//! ```text
//! 载入记录 / 预填草稿 → 表单 → 生成 SIP
//!     → 合并编辑 / 分配 recid + DOI → 封存上传 → 后台任务
//! ```

use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::{Deposition, RecJson};
use crate::records::{self, process_draft, process_files};
use crate::services::create_doi;
use crate::workflow::deposit_ctx::{DepositCtx, RequestOrigin};
use crate::workflow::engine::{Step, Workflow};
use crate::workflow::tasks::{
    is_sip_uploaded, CreateRecid, FinalizeRecordSip, LoadRecord, MergeRecord, MintPid,
    PrefillDraft, PrepareSip, ProcessBibdocfile, ProcessSipMetadata, RenderForm,
    UploadRecordSip,
};
use crate::workflow::upload_tasks::{check_existing_pid, ApiValidateFiles, ReservedRecid, RunTasks};

/// 编辑已发布记录时使用的草稿
pub const EDIT_DRAFT_ID: &str = "_edit";

/// 新建存缴时使用的草稿
pub const DEFAULT_DRAFT_ID: &str = "_default";

/// 是否已经提交过（存在封存的 SIP）
pub fn has_submission(deposition: &Deposition) -> bool {
    deposition.has_sip()
}

fn process_sip_new(ctx: &DepositCtx<'_>, d: &Deposition, metadata: &mut RecJson) -> AppResult<()> {
    records::process_recjson_new(&ctx.record_ctx(), d, metadata)?;
    Ok(())
}

fn process_sip_edit(ctx: &DepositCtx<'_>, _d: &Deposition, metadata: &mut RecJson) -> AppResult<()> {
    records::process_recjson_edit(&ctx.record_ctx(), metadata)?;
    Ok(())
}

fn merge_record(
    ctx: &DepositCtx<'_>,
    d: &Deposition,
    dest: &RecJson,
    a: RecJson,
    b: RecJson,
) -> RecJson {
    records::merge(&ctx.record_ctx(), d, dest, a, b)
}

/// 构建上传工作流
pub fn upload() -> Workflow {
    Workflow::compile(
        "upload",
        vec![
            Step::if_else(
                has_submission,
                vec![
                    Step::run(LoadRecord {
                        draft_id: EDIT_DRAFT_ID.to_string(),
                        post_process: Some(process_draft),
                    }),
                    Step::run(RenderForm {
                        draft_id: EDIT_DRAFT_ID.to_string(),
                    }),
                ],
                vec![
                    Step::run(PrefillDraft {
                        draft_id: DEFAULT_DRAFT_ID.to_string(),
                    }),
                    Step::run(RenderForm {
                        draft_id: DEFAULT_DRAFT_ID.to_string(),
                    }),
                    Step::run(ApiValidateFiles),
                ],
            ),
            Step::run(PrepareSip),
            Step::if_else(
                has_submission,
                vec![
                    Step::run(ProcessSipMetadata {
                        processor: process_sip_edit,
                    }),
                    Step::run(MergeRecord {
                        draft_id: EDIT_DRAFT_ID.to_string(),
                        post_process_load: Some(process_draft),
                        process_export: process_sip_edit,
                        merge: merge_record,
                    }),
                    Step::run(ProcessBibdocfile {
                        process: process_files,
                    }),
                ],
                vec![
                    Step::run(ReservedRecid),
                    Step::run(CreateRecid),
                    Step::run(MintPid {
                        pid_field: "doi",
                        pid_store_type: "doi",
                        pid_creator: create_doi,
                        existing_pid_checker: Some(check_existing_pid),
                    }),
                    Step::run(ProcessSipMetadata {
                        processor: process_sip_new,
                    }),
                ],
            ),
            Step::run(FinalizeRecordSip),
            Step::if_else(
                has_submission,
                vec![Step::run(UploadRecordSip), Step::run(RunTasks { update: true })],
                vec![Step::run(UploadRecordSip), Step::run(RunTasks { update: false })],
            ),
        ],
    )
}

/// 转移存缴的所有权
///
/// 只有已完成且最新提交已写入记录存储的存缴才能转移。转移后以无界面
/// 方式重新跑一遍编辑流程，让文件访问规则和上传者随之更新。
pub fn transfer_ownership(
    deposition: &mut Deposition,
    user_id: u64,
    workflow: &Workflow,
    ctx: &mut DepositCtx<'_>,
) -> AppResult<bool> {
    if !deposition.is_done() {
        return Ok(false);
    }
    let uploaded = deposition
        .latest_sip(Some(true))
        .map_or(false, |sip| is_sip_uploaded(sip, ctx.services.records.as_ref()));
    if !uploaded {
        return Ok(false);
    }

    info!(
        "[存缴 {}] 👤 所有权 {} → {}",
        deposition.id, deposition.user_id, user_id
    );
    let previous = deposition.clone();
    deposition.user_id = user_id;
    if !deposition.reinitialize_workflow() {
        *deposition = previous;
        return Ok(false);
    }

    let origin = ctx.origin;
    ctx.origin = RequestOrigin::Web;
    let result = rerun_edit(deposition, workflow, ctx);
    ctx.origin = origin;

    // 重跑失败时恢复原所有者和已完成的状态
    if let Err(e) = result {
        warn!("[存缴 {}] ⚠️ 所有权转移失败，已恢复: {}", deposition.id, e);
        *deposition = previous;
        return Err(e);
    }
    Ok(true)
}

fn rerun_edit(deposition: &mut Deposition, workflow: &Workflow, ctx: &mut DepositCtx<'_>) -> AppResult<()> {
    workflow.run(deposition, ctx)?;
    deposition.require_draft_mut(EDIT_DRAFT_ID)?.complete();
    workflow.run(deposition, ctx)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::DepositionFile;
    use crate::services::{InMemoryRecordStore, RecordStore, Services, StoredFile, UploadMode};
    use crate::workflow::engine::RunOutcome;
    use chrono::{DateTime, Utc};

    /// 可读但拒绝写入的记录存储
    struct ReadOnlyStore(Box<dyn RecordStore>);

    impl RecordStore for ReadOnlyStore {
        fn reserve_recid(&mut self) -> u64 {
            self.0.reserve_recid()
        }

        fn get(&self, recid: u64) -> Option<RecJson> {
            self.0.get(recid)
        }

        fn modification_date(&self, recid: u64) -> Option<DateTime<Utc>> {
            self.0.modification_date(recid)
        }

        fn upload(&mut self, _recid: u64, _record: &RecJson, _mode: UploadMode) -> AppResult<()> {
            Err(crate::error::FileError::ReadFailed {
                path: "records".to_string(),
                source: std::io::Error::other("只读存储"),
            }
            .into())
        }

        fn latest_files(&self, recid: u64) -> Vec<StoredFile> {
            self.0.latest_files(recid)
        }
    }

    fn ready_deposition() -> Deposition {
        let mut d = Deposition::new(1, 7);
        let draft = d.get_or_create_draft(DEFAULT_DRAFT_ID);
        draft.set("upload_type", "dataset");
        draft.set("publication_date", "2014-03-01");
        draft.set("title", "Ocean temperature");
        draft.set("creators", serde_json::json!([{"name": "Doe, John"}]));
        draft.set("description", "Daily readings");
        draft.set("access_right", "open");
        d.files.push(DepositionFile {
            id: "f1".to_string(),
            name: "data.csv".to_string(),
            size: 2048,
            checksum: None,
        });
        d
    }

    #[test]
    fn test_upload_new_deposition() {
        let config = Config::default();
        let mut services = Services::in_memory();
        let workflow = upload();

        let mut d = ready_deposition();
        {
            let mut ctx = DepositCtx::api(&config, &mut services);
            assert_eq!(workflow.run(&mut d, &mut ctx).unwrap(), RunOutcome::Completed);
        }

        assert!(d.is_done());
        assert!(has_submission(&d));
        let metadata = d.latest_sip(Some(true)).unwrap().metadata();
        assert_eq!(metadata.recid(), Some(1));
        assert_eq!(metadata.get_str("doi"), Some("10.5072/zenodo.1"));
        assert!(services.records.get(1).is_some());
        assert!(services.pids.get("doi", "10.5072/zenodo.1").is_some());
    }

    #[test]
    fn test_transfer_requires_done() {
        let config = Config::default();
        let mut services = Services::in_memory();
        let mut ctx = DepositCtx::web(&config, &mut services);
        let workflow = upload();

        let mut d = Deposition::new(1, 7);
        assert!(!transfer_ownership(&mut d, 8, &workflow, &mut ctx).unwrap());
        assert_eq!(d.user_id, 7);
    }

    #[test]
    fn test_transfer_ownership_reuploads() {
        let config = Config::default();
        let mut services = Services::in_memory();
        let workflow = upload();

        let mut d = ready_deposition();
        let mut ctx = DepositCtx::api(&config, &mut services);
        workflow.run(&mut d, &mut ctx).unwrap();

        assert!(transfer_ownership(&mut d, 8, &workflow, &mut ctx).unwrap());
        assert_eq!(ctx.origin, RequestOrigin::Api);
        assert!(d.is_done());
        assert_eq!(d.user_id, 8);

        let record = ctx.services.records.get(1).unwrap();
        assert_eq!(record.get("owner").unwrap()["id"], serde_json::json!(8));
    }

    #[test]
    fn test_failed_transfer_restores_deposition() {
        let config = Config::default();
        let mut services = Services::in_memory();
        let workflow = upload();

        let mut d = ready_deposition();
        let mut ctx = DepositCtx::api(&config, &mut services);
        workflow.run(&mut d, &mut ctx).unwrap();

        let store = std::mem::replace(
            &mut ctx.services.records,
            Box::new(InMemoryRecordStore::new()),
        );
        ctx.services.records = Box::new(ReadOnlyStore(store));

        assert!(transfer_ownership(&mut d, 8, &workflow, &mut ctx).is_err());
        assert_eq!(ctx.origin, RequestOrigin::Api);
        assert_eq!(d.user_id, 7);
        assert!(d.is_done());
        assert_eq!(d.sips.len(), 1);
        assert!(d.drafts.contains_key(DEFAULT_DRAFT_ID));

        let record = ctx.services.records.get(1).unwrap();
        assert_eq!(record.get("owner").unwrap()["id"], serde_json::json!(7));
    }
}
