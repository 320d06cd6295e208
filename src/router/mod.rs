//! 路由模块
//!
//! 包含路由引擎的核心组件：
//! - 路径模板编译
//! - 匹配器适配层与路由参数
//! - 抓取动作契约
//! - 路由表与构建器
//! - 并发控制和超时处理
//! - 路由器主结构体

pub mod action;
pub mod builder;
pub mod concurrency;
pub mod matcher;
pub mod pattern;
pub mod request;
pub mod route_table;
pub mod router;

// 重导出常用类型
pub use action::{DryRunFactory, DryRunScraper, ScrapeAction, ScraperFactory, ScraperKind, SharedAction};
pub use builder::RouterBuilder;
pub use concurrency::{with_timeout, ConcurrencyLimiter};
pub use matcher::{IntoMatch, Matcher, Params, Predicate, RouteSpec};
pub use pattern::{compile_template, CompiledPattern, ParamKey};
pub use request::RequestOptions;
pub use route_table::{Dispatch, RouteEntry, RouteId, RouteSummary, RouteTable};
pub use router::{
    ErrorCallback, OtherwiseCallback, RouteMatch, RouteOutcome, Router, RouterStats,
    RouterStatsSnapshot,
};
