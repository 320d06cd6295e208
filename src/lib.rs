//! # Scrape Router - 抓取路由引擎
//!
//! 抓取工具包内置的 URL 路由与分发引擎，提供以下功能：
//!
//! - **路径模板编译**: `/user/:id`、`/file.:ext`、`/opt/:name?`、`*` 等模板编译为正则
//! - **统一匹配器**: 模板、预编译正则和谓词函数统一为同一种匹配接口
//! - **路由表构建**: 通过显式的路由句柄绑定抓取动作和分发方式
//! - **并发分发**: 扇出评估全部路由，单点汇总，恰好一条终结路径
//! - **配置与日志**: YAML/JSON 配置文件声明路由，结构化日志记录
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use scrape_router::{DryRunFactory, RouterBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut builder = RouterBuilder::new(DryRunFactory);
//!     let user = builder.on("/user/:id")?;
//!     builder.get(user)?;
//!     builder.create_static(user)?;
//!     builder.otherwise(|url| eprintln!("no route: {}", url))?;
//!
//!     let router = builder.build();
//!     router
//!         .route("/user/7", |matched| assert!(matched))
//!         .await
//!         .route("/unknown", |matched| assert!(!matched))
//!         .await;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `router` - 模板编译、匹配器、路由表、构建器和路由器
//! - `core` - 应用配置和路由声明
//! - `utils` - 错误类型、日志和 ID 生成

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod core;
pub mod router;
pub mod utils;

// 重导出常用类型，方便使用
pub use router::{
    compile_template, DryRunFactory, DryRunScraper, Params, ParamKey, RequestOptions,
    RouteId, RouteMatch, RouteOutcome, RouteSpec, Router, RouterBuilder, ScrapeAction,
    ScraperFactory, ScraperKind,
};

pub use utils::{error_code, generate_dispatch_id, Result, RouterError};
pub use utils::logger::{fields, LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};

pub use core::config::{AppConfig, AppConfigBuilder, LogConfig, RouteDecl, RouterConfig};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
