//! 许可证知识库 - 业务能力层
//!
//! 只负责"许可证代码 → 许可证信息"的查询能力

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{AppResult, FileError};

/// 许可证信息
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LicenseInfo {
    pub title: String,
    pub url: String,
}

/// 许可证知识库
pub trait LicenseKb {
    /// 按许可证代码查询，找不到时返回 `None`
    fn lookup(&self, code: &str) -> Option<LicenseInfo>;
}

#[derive(Debug, Default, Deserialize)]
struct LicenseFile {
    #[serde(default)]
    licenses: HashMap<String, LicenseInfo>,
}

/// 基于 TOML 文件的许可证知识库
///
/// 文件格式：
///
/// ```toml
/// [licenses.cc-by]
/// title = "Creative Commons Attribution 4.0"
/// url = "https://creativecommons.org/licenses/by/4.0/"
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlLicenseKb {
    entries: HashMap<String, LicenseInfo>,
}

impl TomlLicenseKb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let file: LicenseFile = toml::from_str(content)?;
        Ok(Self::from_file(file))
    }

    /// 从文件加载知识库
    pub async fn load(path: &Path) -> AppResult<Self> {
        let path_text = path.display().to_string();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FileError::ReadFailed {
                path: path_text.clone(),
                source,
            })?;
        let file: LicenseFile = toml::from_str(&content).map_err(|source| {
            FileError::TomlParseFailed {
                path: path_text,
                source,
            }
        })?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: LicenseFile) -> Self {
        debug!("许可证知识库加载 {} 条记录", file.licenses.len());
        Self {
            entries: file.licenses,
        }
    }

    pub fn insert(&mut self, code: impl Into<String>, title: impl Into<String>, url: impl Into<String>) {
        self.entries.insert(
            code.into(),
            LicenseInfo {
                title: title.into(),
                url: url.into(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LicenseKb for TomlLicenseKb {
    fn lookup(&self, code: &str) -> Option<LicenseInfo> {
        self.entries.get(code).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_parse_license_kb() {
        let kb = TomlLicenseKb::from_toml_str(
            r#"
[licenses.cc-by]
title = "Creative Commons Attribution 4.0"
url = "https://creativecommons.org/licenses/by/4.0/"

[licenses.cc-zero]
title = "Creative Commons CCZero"
url = "http://www.opendefinition.org/licenses/cc-zero"
"#,
        )
        .unwrap();

        assert_eq!(kb.len(), 2);
        assert_eq!(
            kb.lookup("cc-zero").map(|l| l.title),
            Some("Creative Commons CCZero".to_string())
        );
        assert!(kb.lookup("gpl").is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = tokio_test::block_on(TomlLicenseKb::load(Path::new("no/such/licenses.toml")));
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            AppError::File(FileError::ReadFailed { ref path, .. }) if path == "no/such/licenses.toml"
        ));
    }

    #[test]
    fn test_parse_invalid_license_kb() {
        let err = TomlLicenseKb::from_toml_str("[licenses.cc-by]\ntitle = 42").unwrap_err();
        assert!(matches!(err, AppError::File(FileError::TomlParseFailed { .. })));
    }
}
