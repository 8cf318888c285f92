use tracing::warn;

use crate::error::ConfigError;

/// 程序配置
///
/// 由调用方显式传入各个处理函数，没有全局状态。
#[derive(Clone, Debug)]
pub struct Config {
    /// DataCite DOI 前缀（不含结尾的 `/`）
    pub doi_prefix: String,
    /// 站点地址，用于拼接记录 URL
    pub site_url: String,
    /// 许可证知识库 TOML 文件路径
    pub license_kb_path: String,
    /// 许可证来源标识
    pub license_source: String,
    /// 站点策展社区 ID
    pub zenodo_community: String,
    /// 欧盟资助成果社区 ID
    pub ecfunded_community: String,
    /// 新建草稿的默认许可证
    pub default_license: String,
    /// 新建草稿的默认访问权限
    pub default_access_right: String,
    /// 待处理存缴请求（TOML）所在目录
    pub deposition_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            doi_prefix: "10.5072".to_string(),
            site_url: "https://zenodo.org".to_string(),
            license_kb_path: "licenses.toml".to_string(),
            license_source: "opendefinition.org".to_string(),
            zenodo_community: "zenodo".to_string(),
            ecfunded_community: "ecfunded".to_string(),
            default_license: "cc-by".to_string(),
            default_access_right: "open".to_string(),
            deposition_folder: "depositions".to_string(),
            verbose_logging: false,
            output_log_file: "deposit_output.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            doi_prefix: std::env::var("DOI_PREFIX").unwrap_or(default.doi_prefix),
            site_url: std::env::var("SITE_URL").unwrap_or(default.site_url),
            license_kb_path: std::env::var("LICENSE_KB_PATH").unwrap_or(default.license_kb_path),
            license_source: std::env::var("LICENSE_SOURCE").unwrap_or(default.license_source),
            zenodo_community: std::env::var("ZENODO_COMMUNITY").unwrap_or(default.zenodo_community),
            ecfunded_community: std::env::var("ECFUNDED_COMMUNITY").unwrap_or(default.ecfunded_community),
            default_license: std::env::var("DEFAULT_LICENSE").unwrap_or(default.default_license),
            default_access_right: std::env::var("DEFAULT_ACCESS_RIGHT").unwrap_or(default.default_access_right),
            deposition_folder: std::env::var("DEPOSITION_FOLDER").unwrap_or(default.deposition_folder),
            verbose_logging: match std::env::var("VERBOSE_LOGGING") {
                Ok(value) => parse_bool_var("VERBOSE_LOGGING", &value).unwrap_or_else(|e| {
                    warn!("⚠️ {}，使用默认值", e);
                    default.verbose_logging
                }),
                Err(_) => default.verbose_logging,
            },
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    /// 两个系统社区 ID，按合并时的处理顺序排列
    pub fn system_communities(&self) -> [&str; 2] {
        [&self.zenodo_community, &self.ecfunded_community]
    }

    /// 本站 DOI 的完整前缀（含 `/`）
    pub fn local_doi_prefix(&self) -> String {
        format!("{}/", self.doi_prefix)
    }
}

/// 解析布尔型环境变量，接受 `true/false/1/0`
fn parse_bool_var(var_name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: "bool".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_var() {
        assert!(parse_bool_var("VERBOSE_LOGGING", "TRUE").unwrap());
        assert!(!parse_bool_var("VERBOSE_LOGGING", "0").unwrap());
        assert!(matches!(
            parse_bool_var("VERBOSE_LOGGING", "yes"),
            Err(ConfigError::EnvVarParseFailed { .. })
        ));
    }

    #[test]
    fn test_local_doi_prefix() {
        let config = Config::default();
        assert_eq!(config.local_doi_prefix(), "10.5072/");
        assert_eq!(config.system_communities(), ["zenodo", "ecfunded"]);
    }
}
