//! 路由器主结构体
//!
//! 一次 `route(url)` 调用的流程：
//!
//! 1. 扇出：每条路由在独立任务中评估匹配器，并发数受 [`ConcurrencyLimiter`] 限制
//! 2. 汇总：按路由表顺序在单一位置收集评估结果，命中的路由注入链参数并
//!    派生抓取任务（不等待其完成）
//! 3. 终结：有评估错误时调用 `on_error`（按表序的第一个错误），
//!    否则无匹配时调用 `otherwise`，否则都不调用
//! 4. 完成回调恰好调用一次，参数为是否有路由命中

use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, instrument, warn, Span};

use super::action::SharedAction;
use super::concurrency::{with_timeout, ConcurrencyLimiter};
use super::matcher::Params;
use super::route_table::{Dispatch, RouteId, RouteSummary, RouteTable};
use crate::core::config::RouterConfig;
use crate::utils::{fields, generate_dispatch_id, Result, RouterError};

/// 错误回调，参数为错误和当前 URL
pub type ErrorCallback = Arc<dyn Fn(&RouterError, &str) + Send + Sync>;

/// 未匹配回调，参数为当前 URL
pub type OtherwiseCallback = Arc<dyn Fn(&str) + Send + Sync>;

// ==================== 统计 ====================

/// 路由统计信息
#[derive(Debug, Default)]
pub struct RouterStats {
    /// 总调用数
    total_calls: AtomicU64,
    /// 有路由命中的调用数
    matched_calls: AtomicU64,
    /// 无路由命中的调用数
    unmatched_calls: AtomicU64,
    /// 出现评估错误的调用数
    error_calls: AtomicU64,
    /// 派生的抓取任务数
    dispatched: AtomicU64,
    /// 失败的抓取任务数（含超时）
    dispatch_failures: AtomicU64,
    /// 匹配阶段总耗时（微秒）
    total_latency_us: AtomicU64,
    /// 最小耗时（微秒）
    min_latency_us: AtomicU64,
    /// 最大耗时（微秒）
    max_latency_us: AtomicU64,
}

impl RouterStats {
    /// 创建新的统计实例
    pub fn new() -> Self {
        Self {
            min_latency_us: AtomicU64::new(u64::MAX),
            ..Default::default()
        }
    }

    /// 记录一次路由调用
    pub fn record_call(&self, matched: bool, errored: bool, latency_us: u64) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);

        if matched {
            self.matched_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.unmatched_calls.fetch_add(1, Ordering::Relaxed);
        }

        if errored {
            self.error_calls.fetch_add(1, Ordering::Relaxed);
        }

        let mut current_min = self.min_latency_us.load(Ordering::Relaxed);
        while latency_us < current_min {
            match self.min_latency_us.compare_exchange_weak(
                current_min,
                latency_us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_min = actual,
            }
        }

        let mut current_max = self.max_latency_us.load(Ordering::Relaxed);
        while latency_us > current_max {
            match self.max_latency_us.compare_exchange_weak(
                current_max,
                latency_us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_max = actual,
            }
        }
    }

    /// 记录派生的抓取任务
    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录失败的抓取任务
    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        let total = self.total_calls.load(Ordering::Relaxed);
        let total_latency = self.total_latency_us.load(Ordering::Relaxed);
        let min_latency = self.min_latency_us.load(Ordering::Relaxed);

        RouterStatsSnapshot {
            total_calls: total,
            matched_calls: self.matched_calls.load(Ordering::Relaxed),
            unmatched_calls: self.unmatched_calls.load(Ordering::Relaxed),
            error_calls: self.error_calls.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            avg_latency_us: if total > 0 { total_latency / total } else { 0 },
            min_latency_us: if min_latency == u64::MAX { 0 } else { min_latency },
            max_latency_us: self.max_latency_us.load(Ordering::Relaxed),
        }
    }

    /// 重置统计
    pub fn reset(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
        self.matched_calls.store(0, Ordering::Relaxed);
        self.unmatched_calls.store(0, Ordering::Relaxed);
        self.error_calls.store(0, Ordering::Relaxed);
        self.dispatched.store(0, Ordering::Relaxed);
        self.dispatch_failures.store(0, Ordering::Relaxed);
        self.total_latency_us.store(0, Ordering::Relaxed);
        self.min_latency_us.store(u64::MAX, Ordering::Relaxed);
        self.max_latency_us.store(0, Ordering::Relaxed);
    }
}

/// 路由统计快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterStatsSnapshot {
    /// 总调用数
    pub total_calls: u64,
    /// 有路由命中的调用数
    pub matched_calls: u64,
    /// 无路由命中的调用数
    pub unmatched_calls: u64,
    /// 出现评估错误的调用数
    pub error_calls: u64,
    /// 派生的抓取任务数
    pub dispatched: u64,
    /// 失败的抓取任务数
    pub dispatch_failures: u64,
    /// 平均耗时（微秒）
    pub avg_latency_us: u64,
    /// 最小耗时（微秒）
    pub min_latency_us: u64,
    /// 最大耗时（微秒）
    pub max_latency_us: u64,
}

// ==================== 路由结果 ====================

/// 命中的路由
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    /// 路由句柄
    pub route: RouteId,
    /// 匹配得到的参数
    pub params: Params,
}

/// 一次路由调用的结果
///
/// `dispatches` 中的抓取任务在结果被丢弃后仍会继续执行。
pub struct RouteOutcome {
    /// 本次调用的分发 ID
    pub dispatch_id: String,
    /// 被路由的 URL
    pub url: String,
    /// 是否有路由命中
    pub matched: bool,
    /// 命中的路由（按表序）
    pub matches: Vec<RouteMatch>,
    /// 按表序的第一个评估错误
    pub error: Option<RouterError>,
    /// 派生的抓取任务
    pub dispatches: Vec<JoinHandle<Result<()>>>,
}

impl RouteOutcome {
    /// 等待所有抓取任务结束，按派生顺序返回结果
    pub async fn join_dispatches(&mut self) -> Vec<Result<()>> {
        let mut results = Vec::with_capacity(self.dispatches.len());
        for handle in self.dispatches.drain(..) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(RouterError::Internal(format!("抓取任务异常结束: {}", e))),
            };
            results.push(result);
        }
        results
    }
}

impl fmt::Debug for RouteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOutcome")
            .field("dispatch_id", &self.dispatch_id)
            .field("url", &self.url)
            .field("matched", &self.matched)
            .field("matches", &self.matches)
            .field("error", &self.error)
            .field("dispatches", &self.dispatches.len())
            .finish()
    }
}

// ==================== 路由器 ====================

/// 单条路由的评估结果
type Evaluation = (RouteId, std::result::Result<Result<Option<Params>>, JoinError>);

/// 路由器
///
/// 由 [`RouterBuilder`](super::RouterBuilder) 构建，构建后路由表和回调不再变化，
/// 可以包在 `Arc` 中被多个任务并发使用。
pub struct Router {
    /// 路由表
    table: Arc<RouteTable>,
    /// 错误回调
    on_error: Option<ErrorCallback>,
    /// 未匹配回调
    otherwise: Option<OtherwiseCallback>,
    /// 并发限制器
    limiter: ConcurrencyLimiter,
    /// 统计信息
    stats: Arc<RouterStats>,
    /// 配置
    config: RouterConfig,
}

impl Router {
    pub(crate) fn new(
        table: RouteTable,
        on_error: Option<ErrorCallback>,
        otherwise: Option<OtherwiseCallback>,
        config: RouterConfig,
    ) -> Self {
        info!(
            routes = table.len(),
            max_concurrent = config.max_concurrent,
            first_match = config.first_match,
            "router built"
        );
        Self {
            table: Arc::new(table),
            on_error,
            otherwise,
            limiter: ConcurrencyLimiter::new(config.max_concurrent),
            stats: Arc::new(RouterStats::new()),
            config,
        }
    }

    /// 路由 URL，完成后以是否命中调用 `callback`
    ///
    /// 返回路由器自身，便于继续路由其他 URL。
    pub async fn route<C>(&self, url: &str, callback: C) -> &Self
    where
        C: FnOnce(bool),
    {
        let outcome = self.dispatch(url).await;
        callback(outcome.matched);
        self
    }

    /// 路由 URL 并返回完整结果
    ///
    /// 终结回调（`on_error` / `otherwise`）在返回前已经调用。
    #[instrument(skip(self), fields(dispatch_id = tracing::field::Empty))]
    pub async fn dispatch(&self, url: &str) -> RouteOutcome {
        let dispatch_id = generate_dispatch_id();
        Span::current().record(fields::DISPATCH_ID, dispatch_id.as_str());
        let start = Instant::now();

        let evaluations = if self.config.first_match {
            self.evaluate_sequential(url).await
        } else {
            self.evaluate_all(url).await
        };

        // 汇总点：按表序处理评估结果
        let mut outcome = RouteOutcome {
            dispatch_id,
            url: url.to_string(),
            matched: false,
            matches: Vec::new(),
            error: None,
            dispatches: Vec::new(),
        };

        for (route, evaluation) in evaluations {
            match flatten_evaluation(route, evaluation) {
                Ok(Some(params)) => {
                    outcome.matched = true;
                    self.on_match(route, params, &mut outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        route = %route,
                        error = %e,
                        error_code = e.error_code(),
                        "route evaluation failed"
                    );
                    outcome.error.get_or_insert(e);
                }
            }
        }

        let latency_us = start.elapsed().as_micros() as u64;
        self.stats
            .record_call(outcome.matched, outcome.error.is_some(), latency_us);

        match &outcome.error {
            Some(error) => {
                if let Some(on_error) = &self.on_error {
                    on_error(error, url);
                }
            }
            None if !outcome.matched => {
                debug!(url, "no route matched");
                if let Some(otherwise) = &self.otherwise {
                    otherwise(url);
                }
            }
            None => {}
        }

        info!(
            matched = outcome.matched,
            matches = outcome.matches.len(),
            dispatched = outcome.dispatches.len(),
            duration_us = latency_us,
            "route completed"
        );

        outcome
    }

    /// 扇出评估全部路由，按表序返回结果
    async fn evaluate_all(&self, url: &str) -> Vec<Evaluation> {
        let handles: Vec<_> = self
            .table
            .iter()
            .map(|entry| (entry.id(), self.spawn_evaluation(entry.id(), url)))
            .collect();

        let mut evaluations = Vec::with_capacity(handles.len());
        for (route, handle) in handles {
            evaluations.push((route, handle.await));
        }
        evaluations
    }

    /// 按表序逐条评估，遇到第一条匹配或错误即停止
    async fn evaluate_sequential(&self, url: &str) -> Vec<Evaluation> {
        let mut evaluations = Vec::new();
        for entry in self.table.iter() {
            let route = entry.id();
            let evaluation = self.spawn_evaluation(route, url).await;
            let stop = !matches!(evaluation, Ok(Ok(None)));
            evaluations.push((route, evaluation));
            if stop {
                break;
            }
        }
        evaluations
    }

    fn spawn_evaluation(&self, route: RouteId, url: &str) -> JoinHandle<Result<Option<Params>>> {
        let table = Arc::clone(&self.table);
        let limiter = self.limiter.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            let _permit = limiter.acquire_owned().await?;
            Ok(table.get(route)?.test(&url))
        })
    }

    /// 命中后注入链参数并派生抓取任务
    fn on_match(&self, route: RouteId, params: Params, outcome: &mut RouteOutcome) {
        let url = outcome.url.clone();
        debug!(route = %route, params = ?params, "route matched");

        let entry = match self.table.get(route) {
            Ok(entry) => entry,
            Err(e) => {
                outcome.error.get_or_insert(e);
                return;
            }
        };

        match entry.action() {
            Some(action) => {
                action.set_chain_parameter(params.clone());
                let handle = self.spawn_dispatch(
                    Arc::clone(action),
                    entry.dispatch().clone(),
                    url,
                    outcome.dispatch_id.clone(),
                );
                outcome.dispatches.push(handle);
            }
            None => {
                let error = RouterError::NoActionBound {
                    route: route.index(),
                    url,
                };
                warn!(route = %route, error = %error, error_code = error.error_code(), "matched route has no action");
                outcome.error.get_or_insert(error);
            }
        }

        outcome.matches.push(RouteMatch { route, params });
    }

    fn spawn_dispatch(
        &self,
        action: SharedAction,
        dispatch: Dispatch,
        url: String,
        dispatch_id: String,
    ) -> JoinHandle<Result<()>> {
        let stats = Arc::clone(&self.stats);
        let timeout = self.config.dispatch_timeout_ms.map(Duration::from_millis);
        stats.record_dispatch();

        tokio::spawn(async move {
            let scrape = async {
                match &dispatch {
                    Dispatch::Get => action.get(&url).await,
                    Dispatch::Request(options) => action.request(options.for_url(&url)).await,
                }
            };
            let result = match timeout {
                Some(timeout) => with_timeout(timeout, scrape).await.and_then(|r| r),
                None => scrape.await,
            };

            if let Err(e) = &result {
                stats.record_dispatch_failure();
                warn!(
                    dispatch_id = %dispatch_id,
                    url = %url,
                    method = dispatch.name(),
                    error = %e,
                    error_code = e.error_code(),
                    "scrape dispatch failed"
                );
            }
            result
        })
    }

    /// 路由表摘要
    pub fn routes(&self) -> Vec<RouteSummary> {
        self.table.export()
    }

    /// 路由数
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// 是否没有路由
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// 统计信息
    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// 重置统计
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// 路由器配置
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("table", &self.table)
            .field("has_on_error", &self.on_error.is_some())
            .field("has_otherwise", &self.otherwise.is_some())
            .field("config", &self.config)
            .finish()
    }
}

fn flatten_evaluation(
    route: RouteId,
    evaluation: std::result::Result<Result<Option<Params>>, JoinError>,
) -> Result<Option<Params>> {
    match evaluation {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(RouterError::EvaluationPanicked {
            route: route.index(),
            message: panic_message(e.into_panic()),
        }),
        Err(e) => Err(RouterError::Internal(format!("路由 {} 评估任务被取消: {}", route, e))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
