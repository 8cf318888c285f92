//! 存缴类型 - 编排层
//!
//! 把上传工作流包装成对外的操作：REST 动作、序列化、所有权转移
//! 以及完成页面。

use serde_json::Value;
use tracing::{debug, info};

use crate::api;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Deposition, Draft};
use crate::workflow::{
    has_submission, transfer_ownership, upload, DepositCtx, RunOutcome, Workflow,
    DEFAULT_DRAFT_ID, EDIT_DRAFT_ID,
};

/// REST 动作的默认状态码
const ACCEPTED: u16 = 202;
const CREATED: u16 = 201;

/// 上传类型
#[derive(Debug)]
pub struct UploadType {
    workflow: Workflow,
}

impl Default for UploadType {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadType {
    pub fn new() -> Self {
        Self { workflow: upload() }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// 运行（或续跑）工作流
    pub fn run(&self, deposition: &mut Deposition, ctx: &mut DepositCtx<'_>) -> AppResult<RunOutcome> {
        self.workflow.run(deposition, ctx)
    }

    /// 执行 REST 动作，返回 (响应体, 状态码)
    ///
    /// - `publish`: 运行工作流
    /// - `edit`: 已完成或已有草稿时先重置工作流，再运行
    /// - `discard`: 放弃存缴
    pub fn api_action(
        &self,
        deposition: &mut Deposition,
        action: &str,
        ctx: &mut DepositCtx<'_>,
    ) -> AppResult<(Value, u16)> {
        info!("[存缴 {}] 📨 API 动作: {}", deposition.id, action);
        match action {
            "publish" => {
                self.run(deposition, ctx)?;
            }
            "edit" => {
                if deposition.is_done() || !deposition.drafts.is_empty() {
                    deposition.reinitialize_workflow();
                }
                self.run(deposition, ctx)?;
            }
            "discard" => {
                deposition.stop_workflow();
                return Ok((self.marshal_deposition(deposition, ctx.config), CREATED));
            }
            other => return Err(AppError::invalid_action(other)),
        }

        // 任务准备好的响应优先
        if let Some(context) = deposition.take_render_context() {
            if let Some(response) = render_response(&context) {
                debug!("[存缴 {}] 使用任务准备的响应: {}", deposition.id, context);
                return Ok(response);
            }
        }
        Ok((self.marshal_deposition(deposition, ctx.config), ACCEPTED))
    }

    /// 表单当前使用的草稿
    pub fn default_draft_id(&self, deposition: &Deposition) -> &'static str {
        if has_submission(deposition) && deposition.get_draft(EDIT_DRAFT_ID).is_some() {
            EDIT_DRAFT_ID
        } else {
            DEFAULT_DRAFT_ID
        }
    }

    pub fn marshal_deposition(&self, deposition: &Deposition, config: &Config) -> Value {
        api::marshal_deposition(deposition, config)
    }

    pub fn marshal_draft(&self, draft: &Draft) -> Value {
        api::marshal_draft(draft)
    }

    pub fn transfer_ownership(
        &self,
        deposition: &mut Deposition,
        user_id: u64,
        ctx: &mut DepositCtx<'_>,
    ) -> AppResult<bool> {
        transfer_ownership(deposition, user_id, &self.workflow, ctx)
    }

    /// 完成页面
    pub fn render_completed(
        &self,
        deposition: &Deposition,
        my_depositions: &[Deposition],
        config: &Config,
    ) -> String {
        let mut html = String::new();
        html.push_str("<div class=\"deposit-completed\">\n");
        html.push_str(&format!(
            "  <h1>{}</h1>\n",
            escape_html(display_title(deposition))
        ));

        if let Some(sip) = deposition.latest_sip(None) {
            let metadata = sip.metadata();
            if let Some(recid) = metadata.recid() {
                let url = format!("{}/record/{}", config.site_url, recid);
                html.push_str(&format!(
                    "  <p>Record: <a href=\"{}\">{}</a></p>\n",
                    escape_html(&url),
                    escape_html(&url)
                ));
            }
            if let Some(doi) = metadata.get_str("doi") {
                html.push_str(&format!("  <p>DOI: {}</p>\n", escape_html(doi)));
            }
        }

        html.push_str("  <ul class=\"my-depositions\">\n");
        for other in my_depositions {
            html.push_str(&format!(
                "    <li data-id=\"{}\" data-state=\"{}\">{}</li>\n",
                other.id,
                other.state.as_str(),
                escape_html(display_title(other))
            ));
        }
        html.push_str("  </ul>\n</div>\n");
        html
    }
}

/// 从渲染上下文中取出 `(response, status)`
fn render_response(context: &Value) -> Option<(Value, u16)> {
    let response = context.get("response")?.clone();
    let status = context
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok())?;
    Some((response, status))
}

fn display_title(deposition: &Deposition) -> &str {
    if deposition.title.is_empty() {
        "Untitled"
    } else {
        &deposition.title
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::DepositionState;
    use crate::services::Services;
    use serde_json::json;

    #[test]
    fn test_invalid_action() {
        let config = Config::default();
        let mut services = Services::in_memory();
        let mut ctx = DepositCtx::api(&config, &mut services);
        let upload_type = UploadType::new();

        let mut d = Deposition::new(1, 1);
        let err = upload_type.api_action(&mut d, "frobnicate", &mut ctx).unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::InvalidAction { .. })));
    }

    #[test]
    fn test_discard_returns_created() {
        let config = Config::default();
        let mut services = Services::in_memory();
        let mut ctx = DepositCtx::api(&config, &mut services);
        let upload_type = UploadType::new();

        let mut d = Deposition::new(1, 1);
        let (body, status) = upload_type.api_action(&mut d, "discard", &mut ctx).unwrap();
        assert_eq!(status, 201);
        assert_eq!(body["id"], json!(1));
        assert_eq!(d.state, DepositionState::Stopped);
    }

    #[test]
    fn test_default_draft_id() {
        let upload_type = UploadType::new();
        let mut d = Deposition::new(1, 1);
        assert_eq!(upload_type.default_draft_id(&d), "_default");

        d.get_or_create_draft("_edit");
        // 没有提交过时 `_edit` 不生效
        assert_eq!(upload_type.default_draft_id(&d), "_default");
    }

    #[test]
    fn test_render_completed_escapes_titles() {
        let config = Config::default();
        let upload_type = UploadType::new();
        let mut d = Deposition::new(1, 1);
        d.title = "<b>Data</b> & more".to_string();

        let html = upload_type.render_completed(&d, std::slice::from_ref(&d), &config);
        assert!(html.contains("&lt;b&gt;Data&lt;/b&gt; &amp; more"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("data-state=\"draft\""));
    }
}
