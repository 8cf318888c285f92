//! 批量存缴处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量存缴请求的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、加载许可证知识库
//! 2. **批量加载**：扫描并加载所有待处理的存缴请求（`Vec<DepositionRequest>`）
//! 3. **逐个发布**：以 API 调用的方式对每个请求执行 `publish`
//! 4. **全局统计**：汇总已上传、已暂停、失败的数量
//!
//! 协作方（记录存储、标识符存储、任务队列）在一次运行中共享，
//! 因此请求按顺序处理。

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::{load_all_requests, Deposition, DepositionRequest};
use crate::orchestrator::deposition_type::UploadType;
use crate::services::{InMemoryUserDirectory, Services, TomlLicenseKb};
use crate::utils::logging::{
    init_log_file, log_requests_loaded, log_startup, print_final_stats, truncate_text,
};
use crate::workflow::{DepositCtx, DEFAULT_DRAFT_ID};

/// 应用主结构
pub struct App {
    config: Config,
    licenses: TomlLicenseKb,
    upload_type: UploadType,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config.deposition_folder);

        let licenses = load_licenses(&config.license_kb_path).await;

        Ok(Self {
            config,
            licenses,
            upload_type: UploadType::new(),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<ProcessingStats> {
        // 加载所有待处理的存缴请求
        info!("\n📁 正在扫描待处理的存缴请求...");
        let requests = load_all_requests(&self.config.deposition_folder).await?;

        if requests.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok(ProcessingStats::default());
        }
        log_requests_loaded(requests.len());

        let mut users = InMemoryUserDirectory::new();
        for request in &requests {
            users.insert(request.user.id, &request.user.email, &request.user.nickname);
        }
        let mut services = Services::in_memory()
            .with_licenses(self.licenses)
            .with_users(users);

        let stats = process_all_requests(&self.config, &mut services, &self.upload_type, requests)?;

        // 输出最终统计
        print_final_stats(
            stats.success,
            stats.halted,
            stats.failed,
            &self.config.output_log_file,
        );

        Ok(stats)
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub success: usize,
    pub halted: usize,
    pub failed: usize,
}

/// 单个请求的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
enum RequestResult {
    Uploaded,
    Halted(u16),
}

async fn load_licenses(path: &str) -> TomlLicenseKb {
    match TomlLicenseKb::load(Path::new(path)).await {
        Ok(kb) => {
            info!("✓ 已加载 {} 个许可证", kb.len());
            kb
        }
        Err(e) => {
            warn!("⚠️ 许可证知识库加载失败，许可证将保持原样: {}", e);
            TomlLicenseKb::new()
        }
    }
}

fn process_all_requests(
    config: &Config,
    services: &mut Services,
    upload_type: &UploadType,
    requests: Vec<DepositionRequest>,
) -> Result<ProcessingStats> {
    let mut stats = ProcessingStats::default();
    let deposition_ids = assign_deposition_ids(&requests);

    for (index, (request, deposition_id)) in requests.into_iter().zip(deposition_ids).enumerate() {
        let request_index = index + 1;
        let source = request.file_path.clone().unwrap_or_default();

        let mut ctx = DepositCtx::api(config, &mut *services);
        match publish_request(upload_type, request, deposition_id, request_index, &mut ctx) {
            Ok(RequestResult::Uploaded) => {
                stats.success += 1;
                append_log(&config.output_log_file, &format!("[{}] 已上传 {}", request_index, source))?;
            }
            Ok(RequestResult::Halted(status)) => {
                stats.halted += 1;
                append_log(
                    &config.output_log_file,
                    &format!("[{}] 已暂停 (HTTP {}) {}", request_index, status, source),
                )?;
            }
            Err(e) => {
                error!("[请求 {}] ❌ 处理过程中发生错误: {}", request_index, e);
                stats.failed += 1;
                append_log(
                    &config.output_log_file,
                    &format!("[{}] 失败 {}: {}", request_index, source, e),
                )?;
            }
        }
    }

    Ok(stats)
}

fn publish_request(
    upload_type: &UploadType,
    request: DepositionRequest,
    deposition_id: u64,
    request_index: usize,
    ctx: &mut DepositCtx<'_>,
) -> Result<RequestResult> {
    let mut deposition = Deposition::new(deposition_id, request.user.id);
    deposition.title = request.title.clone().unwrap_or_default();
    deposition.files = request.files;
    deposition
        .get_or_create_draft(DEFAULT_DRAFT_ID)
        .values
        .extend(request.metadata);

    let (body, status) = upload_type
        .api_action(&mut deposition, "publish", ctx)
        .with_context(|| format!("存缴 {} 发布失败", deposition_id))?;

    if deposition.is_done() {
        info!(
            "[请求 {}] ✅ 已上传: 记录 {}",
            request_index,
            body.get("record_id").cloned().unwrap_or_default()
        );
        Ok(RequestResult::Uploaded)
    } else {
        let body = if ctx.config.verbose_logging {
            body.to_string()
        } else {
            truncate_text(&body.to_string(), 200)
        };
        warn!("[请求 {}] ⏸️ 未完成 (HTTP {}): {}", request_index, status, body);
        Ok(RequestResult::Halted(status))
    }
}

/// 为每个请求确定存缴ID
///
/// 显式给出的ID优先保留；没有ID的请求依次取未被占用的最小正整数。
fn assign_deposition_ids(requests: &[DepositionRequest]) -> Vec<u64> {
    let mut used: BTreeSet<u64> = BTreeSet::new();
    for id in requests.iter().filter_map(|r| r.id) {
        if !used.insert(id) {
            warn!("⚠️ 存缴ID {} 在多个请求中重复出现", id);
        }
    }

    let mut next = 1;
    requests
        .iter()
        .map(|request| match request.id {
            Some(id) => id,
            None => {
                while used.contains(&next) {
                    next += 1;
                }
                used.insert(next);
                next
            }
        })
        .collect()
}

fn append_log(log_file_path: &str, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    writeln!(file, "{}", line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestUser;
    use std::collections::BTreeMap;

    fn request(id: Option<u64>) -> DepositionRequest {
        DepositionRequest {
            id,
            user: RequestUser {
                id: 7,
                email: String::new(),
                nickname: String::new(),
            },
            title: None,
            files: Vec::new(),
            metadata: BTreeMap::new(),
            file_path: None,
        }
    }

    #[test]
    fn test_generated_ids_skip_explicit_ones() {
        let requests = vec![request(None), request(Some(1)), request(None), request(Some(3))];
        assert_eq!(assign_deposition_ids(&requests), vec![2, 1, 4, 3]);
    }
}
