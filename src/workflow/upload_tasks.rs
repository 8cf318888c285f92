//! 上传类型专有的任务

use serde_json::{json, Value};
use tracing::info;

use crate::error::{AppResult, WorkflowError};
use crate::models::recjson::is_blank;
use crate::models::{Deposition, RecJson};
use crate::workflow::deposit_ctx::DepositCtx;
use crate::workflow::engine::{Task, TaskOutcome};
use crate::workflow::tasks::VALIDATION_ERROR_CODE;

/// 已有 DOI 是否需要登记
///
/// 已有的 DOI 要么是预留的（需要登记），要么是外部的（不登记）。
/// 用户无法自己填写本站的 DOI。
pub fn check_existing_pid(pid: &str, recjson: &RecJson) -> bool {
    recjson
        .get("prereserve_doi")
        .and_then(|reserved| reserved.get("doi"))
        .and_then(Value::as_str)
        == Some(pid)
}

/// 上传完成后提交后台小任务
pub struct RunTasks {
    pub update: bool,
}

impl Task for RunTasks {
    fn name(&self) -> &'static str {
        "run_tasks"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let sequence_id = d.task_sequence_id;
        let sip = d.require_sip_mut(true)?;
        let recid = sip.metadata().recid().ok_or(WorkflowError::MissingRecid)?;

        let tasklet = if self.update {
            "bst_openaire_update_upload"
        } else {
            "bst_openaire_new_upload"
        };

        let mut args = vec![
            "-T".to_string(),
            tasklet.to_string(),
            "--argument".to_string(),
            format!("recid={}", recid),
        ];
        if let Some(sequence_id) = sequence_id {
            args.push("-I".to_string());
            args.push(sequence_id.to_string());
        }

        let task_id = ctx.services.tasks.submit("bibtasklet", "webdeposit", args);
        sip.task_ids.push(task_id);
        d.update();
        info!("[存缴 {}] 🚀 已提交 {} (任务 #{})", d.id, tasklet, task_id);
        Ok(TaskOutcome::Continue)
    }
}

/// 使用预留 DOI 时一并预留的记录ID
pub struct ReservedRecid;

impl Task for ReservedRecid {
    fn name(&self) -> &'static str {
        "reserved_recid"
    }

    fn execute(&self, d: &mut Deposition, _ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        let metadata = d.require_sip_mut(false)?.metadata_mut()?;
        let reserved = metadata
            .get("prereserve_doi")
            .and_then(|r| r.get("recid"))
            .filter(|recid| !is_blank(recid))
            .cloned();
        if let Some(recid) = reserved {
            metadata.insert("recid", recid);
        }
        d.update();
        Ok(TaskOutcome::Continue)
    }
}

/// API 提交至少需要一个文件
pub struct ApiValidateFiles;

impl Task for ApiValidateFiles {
    fn name(&self) -> &'static str {
        "api_validate_files"
    }

    fn execute(&self, d: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<TaskOutcome> {
        if !ctx.is_api() {
            return Ok(TaskOutcome::Continue);
        }

        if d.files.is_empty() {
            d.set_render_context(json!({
                "response": {
                    "message": "Bad request",
                    "status": 400,
                    "errors": [{
                        "message": "Minimum one file must be provided.",
                        "code": VALIDATION_ERROR_CODE,
                    }],
                },
                "status": 400,
            }));
            d.update();
            return Ok(TaskOutcome::halt("API: No files provided"));
        }

        for draft in d.drafts.values_mut() {
            draft.complete();
        }
        d.update();
        Ok(TaskOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{DepositionFile, Sip};
    use crate::services::Services;

    fn rec(value: Value) -> RecJson {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_check_existing_pid() {
        let metadata = rec(json!({"prereserve_doi": {"doi": "10.5072/zenodo.3", "recid": 3}}));
        assert!(check_existing_pid("10.5072/zenodo.3", &metadata));
        assert!(!check_existing_pid("10.1234/external", &metadata));
        assert!(!check_existing_pid("10.5072/zenodo.3", &RecJson::new()));
    }

    #[test]
    fn test_reserved_recid_copied() {
        let config = Config::default();
        let mut services = Services::in_memory();
        let mut ctx = DepositCtx::web(&config, &mut services);

        let mut d = Deposition::new(1, 1);
        d.sips.push(Sip::new(
            0,
            rec(json!({"prereserve_doi": {"doi": "10.5072/zenodo.9", "recid": 9}})),
        ));
        ReservedRecid.execute(&mut d, &mut ctx).unwrap();
        assert_eq!(d.sips[0].metadata().recid(), Some(9));

        let mut blank = Deposition::new(2, 1);
        blank
            .sips
            .push(Sip::new(0, rec(json!({"prereserve_doi": {"doi": "x", "recid": ""}}))));
        ReservedRecid.execute(&mut blank, &mut ctx).unwrap();
        assert!(!blank.sips[0].metadata().contains_key("recid"));
    }

    #[test]
    fn test_api_requires_one_file() {
        let config = Config::default();
        let mut services = Services::in_memory();
        let mut ctx = DepositCtx::api(&config, &mut services);

        let mut d = Deposition::new(1, 1);
        d.get_or_create_draft("_default");
        let outcome = ApiValidateFiles.execute(&mut d, &mut ctx).unwrap();
        assert_eq!(outcome, TaskOutcome::halt("API: No files provided"));

        let context = d.take_render_context().unwrap();
        assert_eq!(context["status"], json!(400));
        assert_eq!(
            context["response"]["errors"][0]["message"],
            json!("Minimum one file must be provided.")
        );

        d.files.push(DepositionFile {
            id: "f1".to_string(),
            name: "data.csv".to_string(),
            size: 10,
            checksum: None,
        });
        let outcome = ApiValidateFiles.execute(&mut d, &mut ctx).unwrap();
        assert_eq!(outcome, TaskOutcome::Continue);
        assert!(d.get_draft("_default").unwrap().is_completed());
    }

    #[test]
    fn test_web_skips_file_check() {
        let config = Config::default();
        let mut services = Services::in_memory();
        let mut ctx = DepositCtx::web(&config, &mut services);

        let mut d = Deposition::new(1, 1);
        assert_eq!(
            ApiValidateFiles.execute(&mut d, &mut ctx).unwrap(),
            TaskOutcome::Continue
        );
    }

    #[test]
    fn test_run_tasks_uses_sequence_id() {
        let config = Config::default();
        let mut services = Services::in_memory();

        let mut d = Deposition::new(1, 1);
        let mut sip = Sip::new(0, rec(json!({"recid": 5})));
        sip.seal();
        d.sips.push(sip);
        d.task_sequence_id = Some(2);

        {
            let mut ctx = DepositCtx::web(&config, &mut services);
            RunTasks { update: true }.execute(&mut d, &mut ctx).unwrap();
        }

        let task_id = d.sips[0].task_ids[0];
        let task = services.tasks.get(task_id).unwrap();
        assert_eq!(task.program, "bibtasklet");
        assert_eq!(
            task.args,
            vec!["-T", "bst_openaire_update_upload", "--argument", "recid=5", "-I", "2"]
        );
    }
}
