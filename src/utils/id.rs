//! 分发 ID 生成
//!
//! 每次 `route()` 调用分配一个 UUID v4，用于串联同一次分发产生的日志。

/// 生成分发 ID
///
/// # Example
///
/// ```
/// use scrape_router::utils::id::generate_dispatch_id;
///
/// let id = generate_dispatch_id();
/// assert_eq!(id.len(), 36);
/// ```
pub fn generate_dispatch_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 校验分发 ID 格式
pub fn is_valid_dispatch_id(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}
