//! 文件访问规则（firerole）

use crate::models::AccessRight;

/// 根据访问权限生成文件的 firerole 规则
///
/// - 公开：空字符串
/// - 禁止期：提交者可见，到期前拒绝其他人，之后全部放开
/// - 受限 / 不公开：仅提交者可见
///
/// 禁止期缺少日期时写入 `None`，与已有记录保持一致。
pub fn file_firerole(uid: u64, access_right: AccessRight, embargo_date: Option<&str>) -> String {
    let rules = match access_right {
        AccessRight::Open => return String::new(),
        AccessRight::Embargoed => vec![
            format!("allow uid \"{}\"", uid),
            format!("deny until \"{}\"", embargo_date.unwrap_or("None")),
            "allow any".to_string(),
        ],
        AccessRight::Closed | AccessRight::Restricted => {
            vec![format!("allow uid \"{}\"", uid), "deny all".to_string()]
        }
    };
    format!("firerole: {}", rules.join("\n"))
}
