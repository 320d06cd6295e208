//! 路由引擎错误类型定义
//!
//! 错误分两类：
//! - 误用错误：构建路由表时调用顺序或参数不正确，在调用点同步返回
//! - 分发期错误：`route()` 扇出评估过程中产生，交给 `on_error` 回调

use thiserror::Error;

/// 路由引擎错误类型
#[derive(Error, Debug)]
pub enum RouterError {
    // ==================== 误用错误 ====================

    /// 尚未声明任何路由
    #[error("尚未声明任何路由，无法绑定动作")]
    NoRouteDeclared,

    /// 路由句柄不属于当前路由表
    #[error("未知的路由句柄: #{0}")]
    UnknownRoute(usize),

    /// 路由已绑定抓取动作
    #[error("路由 #{0} 已绑定抓取动作，不能重复绑定")]
    ActionAlreadyBound(usize),

    /// 回调已设置
    #[error("回调 '{0}' 已设置，不能覆盖")]
    CallbackAlreadySet(&'static str),

    /// 路径模板无效
    #[error("路径模板无效: '{template}' - {reason}")]
    InvalidPattern {
        /// 原始模板
        template: String,
        /// 失败原因
        reason: String,
    },

    /// 路由声明无效
    #[error("路由声明无效: {0}")]
    InvalidDeclaration(String),

    // ==================== 分发期错误 ====================

    /// 匹配的路由没有绑定抓取动作
    #[error("路由 #{route} 匹配了 '{url}'，但没有绑定抓取动作")]
    NoActionBound {
        /// 路由序号
        route: usize,
        /// 被路由的 URL
        url: String,
    },

    /// 路由评估过程中发生 panic
    #[error("路由 #{route} 评估失败: {message}")]
    EvaluationPanicked {
        /// 路由序号
        route: usize,
        /// panic 信息
        message: String,
    },

    /// 抓取动作执行失败
    #[error("抓取失败: '{url}' - {reason}")]
    ScrapeFailed {
        /// 抓取的 URL
        url: String,
        /// 失败原因
        reason: String,
    },

    /// 分发超时
    #[error("分发超时: {0}")]
    Timeout(String),

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        /// 配置键
        key: String,
        /// 失败原因
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ==================== 通用错误 ====================

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 路由引擎操作结果类型别名
pub type Result<T> = std::result::Result<T, RouterError>;

/// 错误码常量
pub mod error_code {
    // 构建期误用 (BUILDER-xxx)
    /// 尚未声明路由
    pub const BUILDER_NO_ROUTE: &str = "BUILDER-001";
    /// 句柄不属于本路由表
    pub const BUILDER_UNKNOWN_ROUTE: &str = "BUILDER-002";
    /// 路由已绑定抓取动作
    pub const BUILDER_ACTION_BOUND: &str = "BUILDER-003";
    /// 回调已设置
    pub const BUILDER_CALLBACK_SET: &str = "BUILDER-004";

    // 模式错误 (PATTERN-xxx)
    /// 路径模板无效
    pub const PATTERN_INVALID: &str = "PATTERN-001";
    /// 路由声明无效
    pub const PATTERN_DECLARATION_INVALID: &str = "PATTERN-002";

    // 分发错误 (ROUTER-xxx)
    /// 匹配的路由没有抓取动作
    pub const ROUTER_NO_ACTION: &str = "ROUTER-001";
    /// 路由评估 panic
    pub const ROUTER_EVALUATION_PANICKED: &str = "ROUTER-002";
    /// 抓取失败
    pub const ROUTER_SCRAPE_FAILED: &str = "ROUTER-003";
    /// 分发超时
    pub const ROUTER_TIMEOUT: &str = "ROUTER-004";

    // 配置错误 (CONFIG-xxx)
    /// 配置加载失败
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    /// 配置值无效
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";
}

impl RouterError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            RouterError::NoRouteDeclared => error_code::BUILDER_NO_ROUTE,
            RouterError::UnknownRoute(_) => error_code::BUILDER_UNKNOWN_ROUTE,
            RouterError::ActionAlreadyBound(_) => error_code::BUILDER_ACTION_BOUND,
            RouterError::CallbackAlreadySet(_) => error_code::BUILDER_CALLBACK_SET,
            RouterError::InvalidPattern { .. } => error_code::PATTERN_INVALID,
            RouterError::InvalidDeclaration(_) => error_code::PATTERN_DECLARATION_INVALID,
            RouterError::NoActionBound { .. } => error_code::ROUTER_NO_ACTION,
            RouterError::EvaluationPanicked { .. } => error_code::ROUTER_EVALUATION_PANICKED,
            RouterError::ScrapeFailed { .. } => error_code::ROUTER_SCRAPE_FAILED,
            RouterError::Timeout(_) => error_code::ROUTER_TIMEOUT,
            RouterError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            RouterError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            _ => "UNKNOWN",
        }
    }

    /// 是否为构建期误用错误
    ///
    /// 误用错误属于编程错误，应在构建路由表时立即暴露，不会进入 `on_error`。
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            RouterError::NoRouteDeclared
                | RouterError::UnknownRoute(_)
                | RouterError::ActionAlreadyBound(_)
                | RouterError::CallbackAlreadySet(_)
                | RouterError::InvalidPattern { .. }
                | RouterError::InvalidDeclaration(_)
        )
    }
}
