use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 记录 JSON 处理错误
    #[error("记录处理错误: {0}")]
    Record(#[from] RecordError),
    /// 工作流执行错误
    #[error("工作流错误: {0}")]
    Workflow(#[from] WorkflowError),
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 记录 JSON 处理错误
#[derive(Debug, Error)]
pub enum RecordError {
    /// 缺少必需字段
    #[error("缺少字段: {field}")]
    MissingField { field: String },
    /// 字段类型不符合预期
    #[error("字段 {field} 格式错误，期望 {expected}")]
    MalformedField { field: String, expected: String },
    /// 无法识别的访问权限
    #[error("无法识别的访问权限: {value}")]
    UnknownAccessRight { value: String },
    /// 含有多个 `.` 的字段名无法折叠
    #[error("字段名 {key} 含有多个 '.'，无法折叠为嵌套对象")]
    NestedDottedKey { key: String },
    /// 折叠目标已存在且不是对象
    #[error("字段 {key} 与已有的非对象字段 {main_key} 冲突")]
    DottedKeyConflict { key: String, main_key: String },
    /// 已封存的 SIP 不允许修改元数据
    #[error("SIP #{sip_id} 已封存，元数据不可修改")]
    SealedSip { sip_id: usize },
    /// JSON 序列化失败
    #[error("JSON序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 工作流执行错误
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// 找不到符合条件的 SIP
    #[error("找不到符合条件的 SIP (sealed={sealed})")]
    SipNotFound { sealed: bool },
    /// 找不到草稿
    #[error("草稿 {draft_id} 不存在")]
    DraftNotFound { draft_id: String },
    /// SIP 元数据中缺少记录ID
    #[error("SIP 元数据中缺少 recid")]
    MissingRecid,
    /// 记录存储中找不到记录
    #[error("记录 {recid} 不存在")]
    RecordNotFound { recid: u64 },
    /// 持久标识符登记失败
    #[error("持久标识符 {pid_type}:{value} 登记失败: {reason}")]
    PidFailed {
        pid_type: String,
        value: String,
        reason: String,
    },
    /// 工作流已停止
    #[error("存缴 {deposition_id} 已停止，不能继续运行")]
    Stopped { deposition_id: u64 },
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 不支持的 API 动作
    #[error("无效的 API 动作: {action}")]
    InvalidAction { action: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Record(RecordError::Json(err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: err,
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建无效 API 动作错误
    pub fn invalid_action(action: impl Into<String>) -> Self {
        AppError::Api(ApiError::InvalidAction {
            action: action.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
