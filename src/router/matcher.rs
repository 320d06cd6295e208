//! 匹配器适配层
//!
//! 将三种路由声明形式统一为 `Matcher::test(url) -> Option<Params>`：
//! - 路径模板：经 [`compile_template`] 编译
//! - 预编译正则：直接使用
//! - 谓词函数：直接调用
//!
//! 声明形式在注册时解析一次，分发时不再做类型判断。

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use super::pattern::{compile_template, ParamKey};
use crate::utils::Result;

// ============================================================================
// 路由参数
// ============================================================================

/// 路由参数
///
/// 保持插入顺序的参数表。模板和正则路由的第一项总是 `url`（整体匹配），
/// 随后是模板中从左到右声明的参数。未参与匹配的可选参数不出现。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(ParamKey, String)>,
}

impl Params {
    /// 创建空参数表
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入参数，同名键覆盖原值并保留原位置
    pub fn insert(&mut self, key: impl Into<ParamKey>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// 按参数名获取
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.name() == Some(name))
            .map(|(_, v)| v.as_str())
    }

    /// 按捕获组序号获取无名参数
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == ParamKey::Index(index))
            .map(|(_, v)| v.as_str())
    }

    /// 整体匹配串
    pub fn url(&self) -> Option<&str> {
        self.get("url")
    }

    /// 键列表（按插入顺序）
    pub fn keys(&self) -> impl Iterator<Item = &ParamKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// 遍历参数
    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// 参数个数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<ParamKey>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ============================================================================
// 谓词返回值
// ============================================================================

/// 谓词返回值到匹配结果的转换
///
/// - `bool`：`true` 表示匹配但无参数
/// - `Params`：总是匹配，参数原样使用
/// - `Option<Params>`：`None` 表示不匹配
pub trait IntoMatch {
    /// 转换为匹配结果
    fn into_match(self) -> Option<Params>;
}

impl IntoMatch for bool {
    fn into_match(self) -> Option<Params> {
        self.then(Params::new)
    }
}

impl IntoMatch for Params {
    fn into_match(self) -> Option<Params> {
        Some(self)
    }
}

impl IntoMatch for Option<Params> {
    fn into_match(self) -> Option<Params> {
        self
    }
}

/// 统一后的谓词类型
pub type Predicate = Arc<dyn Fn(&str) -> Option<Params> + Send + Sync>;

// ============================================================================
// 路由声明
// ============================================================================

/// 路由声明
pub enum RouteSpec {
    /// 路径模板，例如 `/users/:id`
    Template(String),
    /// 预编译正则，按原样使用
    Pattern(Regex),
    /// 谓词函数
    Predicate(Predicate),
}

impl RouteSpec {
    /// 由谓词函数创建声明
    ///
    /// ```
    /// use scrape_router::router::RouteSpec;
    ///
    /// let spec = RouteSpec::predicate(|url: &str| url.ends_with(".pdf"));
    /// ```
    pub fn predicate<F, M>(f: F) -> Self
    where
        F: Fn(&str) -> M + Send + Sync + 'static,
        M: IntoMatch,
    {
        RouteSpec::Predicate(Arc::new(move |url: &str| f(url).into_match()))
    }
}

impl From<&str> for RouteSpec {
    fn from(template: &str) -> Self {
        RouteSpec::Template(template.to_string())
    }
}

impl From<String> for RouteSpec {
    fn from(template: String) -> Self {
        RouteSpec::Template(template)
    }
}

impl From<Regex> for RouteSpec {
    fn from(regex: Regex) -> Self {
        RouteSpec::Pattern(regex)
    }
}

impl fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteSpec::Template(t) => f.debug_tuple("Template").field(t).finish(),
            RouteSpec::Pattern(r) => f.debug_tuple("Pattern").field(&r.as_str()).finish(),
            RouteSpec::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

// ============================================================================
// 匹配器
// ============================================================================

enum MatcherKind {
    Regex {
        regex: Regex,
        /// 以 `url` 开头、与捕获组一一对应的键
        keys: Vec<ParamKey>,
    },
    Predicate(Predicate),
}

/// 统一的 URL 匹配器
pub struct Matcher {
    kind: MatcherKind,
    source: String,
}

impl Matcher {
    /// 由路由声明构造匹配器
    ///
    /// # Errors
    ///
    /// 模板编译失败时返回 `RouterError::InvalidPattern`。
    pub fn new(spec: RouteSpec) -> Result<Self> {
        let matcher = match spec {
            RouteSpec::Template(template) => {
                let compiled = compile_template(&template)?;
                let mut keys = Vec::with_capacity(compiled.keys().len() + 1);
                keys.push(ParamKey::url());
                keys.extend_from_slice(compiled.keys());
                Matcher {
                    kind: MatcherKind::Regex {
                        regex: compiled.regex().clone(),
                        keys,
                    },
                    source: template,
                }
            }
            RouteSpec::Pattern(regex) => {
                let keys = regex
                    .capture_names()
                    .enumerate()
                    .map(|(index, name)| match (index, name) {
                        (0, _) => ParamKey::url(),
                        (_, Some(name)) => ParamKey::Named(name.to_string()),
                        (index, None) => ParamKey::Index(index),
                    })
                    .collect();
                let source = regex.as_str().to_string();
                Matcher {
                    kind: MatcherKind::Regex { regex, keys },
                    source,
                }
            }
            RouteSpec::Predicate(predicate) => Matcher {
                kind: MatcherKind::Predicate(predicate),
                source: "<predicate>".to_string(),
            },
        };
        Ok(matcher)
    }

    /// 测试 URL，匹配时返回参数
    pub fn test(&self, url: &str) -> Option<Params> {
        match &self.kind {
            MatcherKind::Regex { regex, keys } => {
                let caps = regex.captures(url)?;
                let mut params = Params::new();
                for (key, group) in keys.iter().zip(caps.iter()) {
                    if let Some(m) = group {
                        params.insert(key.clone(), m.as_str());
                    }
                }
                Some(params)
            }
            MatcherKind::Predicate(predicate) => predicate(url),
        }
    }

    /// 参数键列表（谓词匹配器返回 None）
    pub fn keys(&self) -> Option<&[ParamKey]> {
        match &self.kind {
            MatcherKind::Regex { keys, .. } => Some(keys),
            MatcherKind::Predicate(_) => None,
        }
    }

    /// 声明来源（模板、正则源码或 `<predicate>`）
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher").field("source", &self.source).finish()
    }
}
