//! 抓取动作契约
//!
//! 路由引擎不关心抓取如何完成，只通过 [`ScrapeAction`] 调用外部的抓取器：
//! 先注入链参数，再发起 `get` 或 `request`。

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::info;

use super::matcher::Params;
use super::request::RequestOptions;
use crate::utils::Result;

/// 抓取动作
///
/// 同一个动作可能被多条路由或并发的 `route()` 调用共享，
/// 实现方需要自行保证内部状态的同步。
#[async_trait::async_trait]
pub trait ScrapeAction: Send + Sync {
    /// 注入匹配得到的链参数（发起抓取前调用）
    fn set_chain_parameter(&self, params: Params);

    /// 以默认方式抓取 URL
    async fn get(&self, url: &str) -> Result<()>;

    /// 按请求选项抓取，`options.uri` 已被设置为路由 URL
    async fn request(&self, options: RequestOptions) -> Result<()>;
}

/// 抓取器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScraperKind {
    /// 静态页面抓取
    #[default]
    Static,
    /// 动态（需渲染）页面抓取
    Dynamic,
}

impl std::fmt::Display for ScraperKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScraperKind::Static => write!(f, "static"),
            ScraperKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// 抓取器工厂
///
/// `create_static` / `create_dynamic` 通过它构造新的抓取动作。
pub trait ScraperFactory {
    /// 静态抓取器类型
    type Static: ScrapeAction + 'static;
    /// 动态抓取器类型
    type Dynamic: ScrapeAction + 'static;

    /// 创建静态抓取器
    fn create_static(&self) -> Self::Static;

    /// 创建动态抓取器
    fn create_dynamic(&self) -> Self::Dynamic;
}

// ============================================================================
// 演练抓取器
// ============================================================================

/// 演练抓取器
///
/// 不做任何网络请求，只把收到的调用写入日志。命令行工具用它检查路由表。
#[derive(Debug, Default)]
pub struct DryRunScraper {
    kind: ScraperKind,
    chain: Mutex<Option<Params>>,
}

impl DryRunScraper {
    /// 创建指定类型的演练抓取器
    pub fn new(kind: ScraperKind) -> Self {
        Self {
            kind,
            chain: Mutex::new(None),
        }
    }

    /// 抓取器类型
    pub fn kind(&self) -> ScraperKind {
        self.kind
    }

    /// 最近一次注入的链参数
    pub fn chain_parameter(&self) -> Option<Params> {
        self.chain.lock().ok().and_then(|chain| chain.clone())
    }
}

#[async_trait::async_trait]
impl ScrapeAction for DryRunScraper {
    fn set_chain_parameter(&self, params: Params) {
        if let Ok(mut chain) = self.chain.lock() {
            *chain = Some(params);
        }
    }

    async fn get(&self, url: &str) -> Result<()> {
        let params = self.chain_parameter().unwrap_or_default();
        info!(
            kind = %self.kind,
            url,
            params = ?params,
            "dry-run get"
        );
        Ok(())
    }

    async fn request(&self, options: RequestOptions) -> Result<()> {
        let params = self.chain_parameter().unwrap_or_default();
        info!(
            kind = %self.kind,
            url = options.uri.as_deref().unwrap_or_default(),
            method = %options.method,
            params = ?params,
            "dry-run request"
        );
        Ok(())
    }
}

/// 生成 [`DryRunScraper`] 的工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunFactory;

impl ScraperFactory for DryRunFactory {
    type Static = DryRunScraper;
    type Dynamic = DryRunScraper;

    fn create_static(&self) -> DryRunScraper {
        DryRunScraper::new(ScraperKind::Static)
    }

    fn create_dynamic(&self) -> DryRunScraper {
        DryRunScraper::new(ScraperKind::Dynamic)
    }
}

/// 共享的抓取动作
pub type SharedAction = Arc<dyn ScrapeAction>;
