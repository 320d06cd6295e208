//! 核心模块
//!
//! 包含应用配置和路由声明。

pub mod config;

pub use config::{AppConfig, AppConfigBuilder, LogConfig, RouteDecl, RouterConfig};
