//! 应用配置
//!
//! 定义路由引擎的配置结构、配置文件中的路由声明以及加载逻辑。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::router::action::ScraperKind;
use crate::router::matcher::RouteSpec;
use crate::router::request::RequestOptions;
use crate::utils::{Result, RouterError};

/// 路由器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// 评估路由时的最大并发任务数（默认 CPU 核心数 × 2）
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// 按表序逐条评估，遇到第一条匹配即停止
    #[serde(default)]
    pub first_match: bool,

    /// 单次抓取的截止时间（毫秒），不设置则不限时
    #[serde(default)]
    pub dispatch_timeout_ms: Option<u64>,
}

fn default_max_concurrent() -> usize {
    crate::router::concurrency::num_cpus() * 2
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            first_match: false,
            dispatch_timeout_ms: None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略（never / hourly / daily）
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
        }
    }
}

// ==================== 路由声明 ====================

/// 配置文件中的路由声明
///
/// `path` 与 `pattern` 必须且只能给出一个：
///
/// ```yaml
/// routes:
///   - path: /user/:id
///     scraper: static
///   - pattern: '^/item/(?P<id>\d+)$'
///     scraper: dynamic
///     request:
///       method: POST
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecl {
    /// 路径模板
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// 正则表达式
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// 抓取器类型
    #[serde(default)]
    pub scraper: ScraperKind,

    /// 请求选项，给出时以 `request` 方式分发，否则以 `get` 方式分发
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestOptions>,

    /// 描述
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RouteDecl {
    /// 以路径模板声明
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// 以正则表达式声明
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Default::default()
        }
    }

    /// 设置抓取器类型
    pub fn scraper(mut self, kind: ScraperKind) -> Self {
        self.scraper = kind;
        self
    }

    /// 设置请求选项
    pub fn request(mut self, options: RequestOptions) -> Self {
        self.request = Some(options);
        self
    }

    /// 设置描述
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 转换为路由声明
    ///
    /// # Errors
    ///
    /// - `path` 和 `pattern` 都缺失或同时给出：`RouterError::InvalidDeclaration`
    /// - 正则无法编译：`RouterError::InvalidPattern`
    pub fn spec(&self) -> Result<RouteSpec> {
        match (&self.path, &self.pattern) {
            (Some(path), None) => Ok(RouteSpec::Template(path.clone())),
            (None, Some(pattern)) => Regex::new(pattern)
                .map(RouteSpec::Pattern)
                .map_err(|e| RouterError::InvalidPattern {
                    template: pattern.clone(),
                    reason: e.to_string(),
                }),
            (None, None) => Err(RouterError::InvalidDeclaration(
                "必须给出 path 或 pattern".to_string(),
            )),
            (Some(path), Some(pattern)) => Err(RouterError::InvalidDeclaration(format!(
                "path '{}' 与 pattern '{}' 不能同时给出",
                path, pattern
            ))),
        }
    }
}

// ==================== 应用配置 ====================

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 路由器配置
    #[serde(default)]
    pub router: RouterConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 路由声明（按顺序注册）
    #[serde(default)]
    pub routes: Vec<RouteDecl>,
}

impl AppConfig {
    /// 创建配置构建器
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    /// 从文件加载配置，`.json` 按 JSON 解析，其余按 YAML 解析
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            RouterError::ConfigLoadFailed(format!("{}: {}", path.display(), e))
        })?;

        let mut config: AppConfig = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.config_path = Some(path);
        Ok(config)
    }

    /// 校验配置值和全部路由声明
    pub fn validate(&self) -> Result<()> {
        if self.router.max_concurrent == 0 {
            return Err(RouterError::InvalidConfigValue {
                key: "router.max_concurrent".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        if self.router.dispatch_timeout_ms == Some(0) {
            return Err(RouterError::InvalidConfigValue {
                key: "router.dispatch_timeout_ms".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        for route in &self.routes {
            let spec = route.spec()?;
            crate::router::matcher::Matcher::new(spec)?;
        }
        Ok(())
    }

    /// 合并另一个配置（用于覆盖）
    ///
    /// 标量只在覆盖方不是默认值时生效，路由声明追加在后面。
    pub fn merge(&mut self, other: AppConfig) {
        if other.router.max_concurrent != default_max_concurrent() {
            self.router.max_concurrent = other.router.max_concurrent;
        }
        if other.router.first_match {
            self.router.first_match = true;
        }
        if other.router.dispatch_timeout_ms.is_some() {
            self.router.dispatch_timeout_ms = other.router.dispatch_timeout_ms;
        }
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        self.routes.extend(other.routes);
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最大并发数
    pub fn max_concurrent(mut self, count: usize) -> Self {
        self.config.router.max_concurrent = count;
        self
    }

    /// 启用首个匹配即停止
    pub fn first_match(mut self) -> Self {
        self.config.router.first_match = true;
        self
    }

    /// 设置抓取超时
    pub fn dispatch_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.router.dispatch_timeout_ms = Some(timeout_ms);
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 追加路由声明
    pub fn route(mut self, decl: RouteDecl) -> Self {
        self.config.routes.push(decl);
        self
    }

    /// 构建配置
    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(!config.router.first_match);
        assert!(config.router.dispatch_timeout_ms.is_none());
        assert!(config.router.max_concurrent >= 2);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = AppConfig::builder()
            .max_concurrent(8)
            .first_match()
            .log_level("debug")
            .route(RouteDecl::path("/user/:id"))
            .build();

        assert_eq!(config.router.max_concurrent, 8);
        assert!(config.router.first_match);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.routes.len(), 1);
    }

    #[test]
    fn test_config_merge() {
        let mut base = AppConfig::builder()
            .route(RouteDecl::path("/a"))
            .build();
        let override_config = AppConfig::builder()
            .log_level("debug")
            .dispatch_timeout_ms(500)
            .route(RouteDecl::path("/b"))
            .build();

        base.merge(override_config);

        assert_eq!(base.logging.level, "debug");
        assert_eq!(base.router.dispatch_timeout_ms, Some(500));
        let paths: Vec<_> = base.routes.iter().filter_map(|r| r.path.as_deref()).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
    }

    #[test]
    fn test_route_decl_spec() {
        assert!(matches!(
            RouteDecl::path("/a/:id").spec(),
            Ok(RouteSpec::Template(t)) if t == "/a/:id"
        ));
        assert!(matches!(
            RouteDecl::pattern(r"^/a/\d+$").spec(),
            Ok(RouteSpec::Pattern(_))
        ));
    }

    #[test]
    fn test_route_decl_requires_exactly_one_source() {
        let empty = RouteDecl::default();
        assert!(matches!(empty.spec(), Err(RouterError::InvalidDeclaration(_))));

        let both = RouteDecl {
            path: Some("/a".into()),
            pattern: Some("^/a$".into()),
            ..Default::default()
        };
        assert!(matches!(both.spec(), Err(RouterError::InvalidDeclaration(_))));
    }

    #[test]
    fn test_route_decl_bad_regex() {
        let err = RouteDecl::pattern("^/a/(").spec().unwrap_err();
        assert!(matches!(err, RouterError::InvalidPattern { .. }));
    }

    #[test]
    fn test_validate() {
        let config = AppConfig::builder()
            .route(RouteDecl::path("/ok/:id"))
            .build();
        assert!(config.validate().is_ok());

        let config = AppConfig::builder().max_concurrent(0).build();
        assert!(matches!(
            config.validate(),
            Err(RouterError::InvalidConfigValue { .. })
        ));

        let config = AppConfig::builder().route(RouteDecl::path("/bad/[")).build();
        assert!(matches!(
            config.validate(),
            Err(RouterError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::builder()
            .max_concurrent(4)
            .log_level("warn")
            .route(
                RouteDecl::path("/search")
                    .scraper(ScraperKind::Dynamic)
                    .request(RequestOptions::new().method("POST")),
            )
            .build();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.router.max_concurrent, 4);
        assert_eq!(parsed.logging.level, "warn");
        assert_eq!(parsed.routes, config.routes);
    }
}
