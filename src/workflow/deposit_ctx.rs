//! 存缴处理上下文
//!
//! 封装"谁在调用、用哪些协作方"这一信息，代替全局的请求对象。

use std::fmt::Display;

use crate::config::Config;
use crate::records::RecordCtx;
use crate::services::Services;

/// 请求来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// REST API 调用，中止时需要准备响应
    Api,
    /// 页面或后台（无界面）运行
    Web,
}

/// 存缴处理上下文
pub struct DepositCtx<'a> {
    pub config: &'a Config,
    pub services: &'a mut Services,
    pub origin: RequestOrigin,
}

impl<'a> DepositCtx<'a> {
    pub fn new(config: &'a Config, services: &'a mut Services, origin: RequestOrigin) -> Self {
        Self {
            config,
            services,
            origin,
        }
    }

    pub fn api(config: &'a Config, services: &'a mut Services) -> Self {
        Self::new(config, services, RequestOrigin::Api)
    }

    pub fn web(config: &'a Config, services: &'a mut Services) -> Self {
        Self::new(config, services, RequestOrigin::Web)
    }

    pub fn is_api(&self) -> bool {
        self.origin == RequestOrigin::Api
    }

    /// 记录转换用的只读上下文
    pub fn record_ctx(&self) -> RecordCtx<'_> {
        RecordCtx::new(self.config, &*self.services)
    }
}

impl Display for RequestOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestOrigin::Api => write!(f, "API"),
            RequestOrigin::Web => write!(f, "WEB"),
        }
    }
}
