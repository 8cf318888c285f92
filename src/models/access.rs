use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecordError;
use crate::models::recjson::RecJson;

/// 访问权限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRight {
    /// 公开
    Open,
    /// 禁止期内仅提交者可见，到期后公开
    Embargoed,
    /// 受限访问
    Restricted,
    /// 不公开
    Closed,
}

impl AccessRight {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessRight::Open => "open",
            AccessRight::Embargoed => "embargoed",
            AccessRight::Restricted => "restricted",
            AccessRight::Closed => "closed",
        }
    }

    /// 是否最终会公开（需要附带许可证）
    pub fn carries_license(self) -> bool {
        matches!(self, AccessRight::Open | AccessRight::Embargoed)
    }

    /// 从记录中读取访问权限
    pub fn from_recjson(recjson: &RecJson) -> Result<Self, RecordError> {
        match recjson.get("access_right") {
            Some(Value::String(value)) => value.parse(),
            None | Some(Value::Null) => Err(RecordError::MissingField {
                field: "access_right".to_string(),
            }),
            Some(_) => Err(RecordError::MalformedField {
                field: "access_right".to_string(),
                expected: "字符串".to_string(),
            }),
        }
    }
}

impl FromStr for AccessRight {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(AccessRight::Open),
            "embargoed" => Ok(AccessRight::Embargoed),
            "restricted" => Ok(AccessRight::Restricted),
            "closed" => Ok(AccessRight::Closed),
            other => Err(RecordError::UnknownAccessRight {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AccessRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
