use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;

use crate::models::deposition::DepositionFile;
use crate::models::draft::{deserialize_values, FieldValue};

/// 提交者信息
#[derive(Debug, Clone, Deserialize)]
pub struct RequestUser {
    pub id: u64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub nickname: String,
}

/// 一份待处理的存缴请求
///
/// `publication_date`、`embargo_date` 请写成带引号的 `"YYYY-MM-DD"`，加载后会成为类型化日期。
#[derive(Debug, Clone, Deserialize)]
pub struct DepositionRequest {
    #[serde(default)]
    pub id: Option<u64>,
    pub user: RequestUser,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub files: Vec<DepositionFile>,
    #[serde(default, deserialize_with = "deserialize_values")]
    pub metadata: BTreeMap<String, FieldValue>,
    #[serde(skip)]
    pub file_path: Option<String>,
}

/// 从 TOML 文件加载数据并转换为 DepositionRequest 对象
pub async fn load_deposition_request(toml_file_path: &Path) -> Result<DepositionRequest> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut request: DepositionRequest = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    // 设置文件路径
    request.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(request)
}

/// 从文件夹中加载所有 TOML 文件并转换为 DepositionRequest 对象列表
///
/// 解析失败的文件只记录警告并跳过。结果按文件名排序。
pub async fn load_all_requests(folder_path: &str) -> Result<Vec<DepositionRequest>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut requests = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_deposition_request(&path).await {
            Ok(request) => {
                tracing::info!(
                    "成功加载 {} 个字段, {} 个文件",
                    request.metadata.len(),
                    request.files.len()
                );
                requests.push(request);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(requests)
}
