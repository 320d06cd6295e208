//! 抓取请求选项
//!
//! 通过 `request(options)` 绑定到路由的请求参数。分发时 `uri` 总是被
//! 覆盖为当前路由的 URL。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 抓取请求选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// 请求地址（分发时覆盖）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// 请求方法
    #[serde(default = "default_method")]
    pub method: String,

    /// 请求头
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// 请求体
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// 超时时间（毫秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            uri: None,
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
            timeout_ms: None,
        }
    }
}

impl RequestOptions {
    /// 创建默认选项（GET）
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置请求方法
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_uppercase();
        self
    }

    /// 添加请求头
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// 设置请求体
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// 设置超时时间
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// 返回 `uri` 被替换为给定 URL 的副本
    pub fn for_url(&self, url: &str) -> Self {
        Self {
            uri: Some(url.to_string()),
            ..self.clone()
        }
    }
}
