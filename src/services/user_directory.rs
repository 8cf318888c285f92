use std::collections::HashMap;

/// 用户信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInfo {
    pub email: String,
    pub nickname: String,
}

/// 用户目录
pub trait UserDirectory {
    fn user_info(&self, user_id: u64) -> Option<UserInfo>;
}

/// 内存中的用户目录
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: HashMap<u64, UserInfo>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user_id: u64, email: impl Into<String>, nickname: impl Into<String>) {
        self.users.insert(
            user_id,
            UserInfo {
                email: email.into(),
                nickname: nickname.into(),
            },
        );
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn user_info(&self, user_id: u64) -> Option<UserInfo> {
        self.users.get(&user_id).cloned()
    }
}
