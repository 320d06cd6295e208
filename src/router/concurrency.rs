//! 并发控制和超时处理模块
//!
//! - `ConcurrencyLimiter`: 基于信号量限制路由评估的扇出宽度
//! - `with_timeout`: 为分发出去的抓取任务加上截止时间

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::utils::{Result, RouterError};

// ==================== 并发控制器 ====================

/// 并发限制器
///
/// 克隆后的限制器共享同一个信号量。默认并发数为 CPU 核心数 × 2。
///
/// # Example
///
/// ```rust
/// use scrape_router::router::ConcurrencyLimiter;
///
/// #[tokio::main]
/// async fn main() {
///     let limiter = ConcurrencyLimiter::new(2);
///     let permit = limiter.acquire_owned().await.unwrap();
///     assert_eq!(limiter.current_concurrency(), 1);
///     drop(permit);
///     assert_eq!(limiter.current_concurrency(), 0);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
}

impl ConcurrencyLimiter {
    /// 创建新的并发限制器，并发数至少为 1
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        debug!(max_concurrency, "Creating concurrency limiter");
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    /// 使用默认并发数（CPU 核心数 × 2）创建
    pub fn default_concurrency() -> Self {
        Self::new(num_cpus() * 2)
    }

    /// 获取一个拥有所有权的许可，可跨 await 点移动到任务中
    ///
    /// # Errors
    ///
    /// 信号量被关闭时返回 `RouterError::Internal`。
    pub async fn acquire_owned(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| RouterError::Internal(format!("并发信号量已关闭: {}", e)))
    }

    /// 尝试获取许可（非阻塞）
    pub fn try_acquire_owned(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }

    /// 当前占用的许可数
    pub fn current_concurrency(&self) -> usize {
        self.max_concurrency - self.semaphore.available_permits()
    }

    /// 可用许可数
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 最大并发数
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::default_concurrency()
    }
}

// ==================== 辅助函数 ====================

/// 获取可用并行度，无法获取时返回 4
pub(crate) fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// 使用超时执行 Future
///
/// # Errors
///
/// 超时返回 `RouterError::Timeout`。
pub async fn with_timeout<F, T>(timeout_duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    match timeout(timeout_duration, future).await {
        Ok(result) => Ok(result),
        Err(_elapsed) => {
            warn!(
                timeout_ms = timeout_duration.as_millis() as u64,
                "Operation timed out"
            );
            Err(RouterError::Timeout(format!(
                "Operation timed out after {}ms",
                timeout_duration.as_millis()
            )))
        }
    }
}

// ==================== 单元测试 ====================
