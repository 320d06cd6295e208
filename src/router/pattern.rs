//! 路径模板编译器
//!
//! 将 `/users/:id` 这类路径模板编译为锚定、大小写不敏感的正则表达式，
//! 同时按出现顺序记录参数键。
//!
//! 支持的记号：
//!
//! | 记号 | 含义 |
//! |------|------|
//! | `:name` | 命名捕获，匹配一个或多个非 `/` 字符 |
//! | `:name(pattern)` | 命名捕获，使用自定义子模式 |
//! | `:name?` | 可选捕获，前导 `/` 一并可选 |
//! | `.:name` | 以 `.` 开头的格式段，例如 `/file.:ext` |
//! | `*` | 无名通配，匹配剩余部分（包括 `/`） |
//! | `/(` | 以 `/` 开头的非捕获分组 |
//!
//! 模板末尾总是接受一个可选的 `/`。除 `.` 外的其他字符按正则语法原样保留。

use regex::{Regex, RegexBuilder};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::utils::{Result, RouterError};

/// 命名参数默认子模式
const DEFAULT_SEGMENT: &str = "([^/]+?)";

/// 通配子模式
const WILDCARD: &str = "(.*)";

/// 参数键
///
/// 命名记号产生 `Named`，通配符和无名分组产生 `Index`（捕获组序号）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// 命名参数
    Named(String),
    /// 按位置索引的无名参数
    Index(usize),
}

impl ParamKey {
    /// 整个匹配串使用的键
    pub fn url() -> Self {
        ParamKey::Named("url".to_string())
    }

    /// 参数名（无名参数返回 None）
    pub fn name(&self) -> Option<&str> {
        match self {
            ParamKey::Named(name) => Some(name),
            ParamKey::Index(_) => None,
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Named(name) => write!(f, "{}", name),
            ParamKey::Index(index) => write!(f, "{}", index),
        }
    }
}

impl Serialize for ParamKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        ParamKey::Named(name.to_string())
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        ParamKey::Named(name)
    }
}

impl From<usize> for ParamKey {
    fn from(index: usize) -> Self {
        ParamKey::Index(index)
    }
}

/// 编译后的路径模板
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    template: String,
    regex: Regex,
    /// 捕获组 1..n 对应的键，不含整体匹配
    keys: Vec<ParamKey>,
}

impl CompiledPattern {
    /// 原始模板
    pub fn template(&self) -> &str {
        &self.template
    }

    /// 编译得到的正则
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// 模板声明的参数键（从左到右）
    pub fn keys(&self) -> &[ParamKey] {
        &self.keys
    }
}

/// 编译路径模板
///
/// 纯函数：同一模板多次编译得到相同的正则源码和键列表。
///
/// # Errors
///
/// 生成的正则无法编译，或模板中含有非记号的捕获分组（会导致键错位）时，
/// 返回 `RouterError::InvalidPattern`。
///
/// # Example
///
/// ```
/// use scrape_router::router::pattern::{compile_template, ParamKey};
///
/// let compiled = compile_template("/users/:id").unwrap();
/// assert_eq!(compiled.keys(), &[ParamKey::Named("id".into())]);
/// assert!(compiled.regex().is_match("/USERS/42/"));
/// ```
pub fn compile_template(template: &str) -> Result<CompiledPattern> {
    let (body, keys) = translate(template)?;
    let source = format!("^(?:{})$", body);

    let regex = RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| invalid(template, e.to_string()))?;

    let groups = regex.captures_len() - 1;
    if groups != keys.len() {
        return Err(invalid(
            template,
            format!(
                "捕获分组数 ({}) 与参数数 ({}) 不一致，请使用 (?:...) 作为非捕获分组",
                groups,
                keys.len()
            ),
        ));
    }

    Ok(CompiledPattern {
        template: template.to_string(),
        regex,
        keys,
    })
}

fn invalid(template: &str, reason: impl Into<String>) -> RouterError {
    RouterError::InvalidPattern {
        template: template.to_string(),
        reason: reason.into(),
    }
}

/// 将模板翻译为正则主体，返回 (正则主体, 键列表)
fn translate(template: &str) -> Result<(String, Vec<ParamKey>)> {
    let source = format!("{}/?", template);
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len() * 2);
    let mut keys = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(token) = scan_token(&source, i)? {
            let slash = if token.slash { "/" } else { "" };
            let format = if token.format { "\\." } else { "" };
            let capture = token.capture.unwrap_or(DEFAULT_SEGMENT);

            if token.optional {
                out.push_str(&format!("(?:{}{}{})?", slash, format, capture));
            } else {
                out.push_str(&format!("{}(?:{}{})", slash, format, capture));
            }
            keys.push(ParamKey::Named(token.name.to_string()));
            i = token.end;
            continue;
        }

        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'(') => {
                out.push_str("(?:/");
                i += 2;
            }
            b'*' => {
                out.push_str(WILDCARD);
                // 索引从 1 开始，0 是整体匹配
                keys.push(ParamKey::Index(keys.len() + 1));
                i += 1;
            }
            b'.' => {
                out.push_str("\\.");
                i += 1;
            }
            _ => {
                // 逐字符复制，保证多字节字符完整
                let ch = source[i..].chars().next().unwrap_or_default();
                out.push(ch);
                i += ch.len_utf8();
            }
        }
    }

    Ok((out, keys))
}

/// 命名参数记号
struct Token<'a> {
    slash: bool,
    format: bool,
    name: &'a str,
    capture: Option<&'a str>,
    optional: bool,
    end: usize,
}

/// 尝试在 `start` 处识别 `[/][.]:name[(pattern)][?]`
fn scan_token(source: &str, start: usize) -> Result<Option<Token<'_>>> {
    let bytes = source.as_bytes();
    let mut i = start;

    let slash = bytes.get(i) == Some(&b'/');
    if slash {
        i += 1;
    }
    let format = bytes.get(i) == Some(&b'.');
    if format {
        i += 1;
    }
    if bytes.get(i) != Some(&b':') {
        return Ok(None);
    }
    i += 1;

    let name_start = i;
    while i < bytes.len() && is_word(bytes[i]) {
        i += 1;
    }
    if i == name_start {
        // `https://` 之类的冒号不是记号
        return Ok(None);
    }
    let name = &source[name_start..i];

    let capture = if bytes.get(i) == Some(&b'(') {
        let close = matching_paren(bytes, i).ok_or_else(|| {
            invalid(source.trim_end_matches("/?"), format!("参数 '{}' 的自定义模式括号未闭合", name))
        })?;
        let capture = &source[i..=close];
        i = close + 1;
        Some(capture)
    } else {
        None
    };

    let optional = bytes.get(i) == Some(&b'?');
    if optional {
        i += 1;
    }

    Ok(Some(Token {
        slash,
        format,
        name,
        capture,
        optional,
        end: i,
    }))
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// 找到与 `open` 处 `(` 配对的 `)`，跳过转义字符
fn matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
