//! Scrape Router 命令行入口
//!
//! 用于调试路由表：按配置文件声明路由，用演练抓取器路由 URL，
//! 查看模板编译结果和校验配置文件。
//!
//! # 命令概览
//!
//! - `route` - 路由一个或多个 URL，打印命中的路由和参数
//! - `routes` - 查看配置文件声明的路由表
//! - `compile` - 编译路径模板，打印正则和参数键
//! - `check-config` - 验证配置文件
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! # 路由 URL
//! scrape-router -c routes.yaml route /user/7 /files/a/b
//!
//! # 查看模板编译结果
//! scrape-router compile '/user/:id/:tab?'
//!
//! # 检查配置文件
//! scrape-router check-config -c routes.yaml
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use scrape_router::{
    compile_template, AppConfig, DryRunFactory, LogGuard, Logger, LoggerConfig, RouterBuilder,
};

/// Scrape Router - 抓取路由引擎
#[derive(Parser)]
#[command(name = "scrape-router")]
#[command(version, about = "抓取工具包的 URL 路由与分发引擎", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "routes.yaml", global = true)]
    config: PathBuf,

    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件中的设置
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 路由 URL
    ///
    /// 按配置文件声明路由表，使用演练抓取器（只记录日志，不发请求）
    /// 依次路由给定的 URL。
    Route {
        /// 要路由的 URL
        #[arg(required = true)]
        urls: Vec<String>,

        /// 遇到第一条匹配即停止
        #[arg(long)]
        first_match: bool,

        /// 以 JSON 输出结果
        #[arg(long)]
        json: bool,
    },

    /// 查看路由表
    Routes,

    /// 编译路径模板
    Compile {
        /// 路径模板，例如 /user/:id
        template: String,
    },

    /// 验证配置文件
    CheckConfig {
        /// 配置文件路径（不指定则使用全局 -c 选项）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 查看版本信息
    Version,
}

/// 初始化日志系统
fn init_logging(config: &AppConfig, level: Option<&str>) -> LogGuard {
    let mut logger_config = LoggerConfig::from_log_config(&config.logging);
    if let Some(level) = level {
        logger_config.level = level.to_string();
    }
    Logger::try_init(logger_config)
}

/// 加载配置文件，文件不存在时使用默认配置
async fn load_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(AppConfig::from_file(path).await?)
    } else {
        Ok(AppConfig::default())
    }
}

/// 路由 URL
async fn run_route(
    mut config: AppConfig,
    urls: &[String],
    first_match: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if first_match {
        config.router.first_match = true;
    }

    let mut builder = RouterBuilder::from_config(DryRunFactory, &config)?;
    builder.otherwise(|url| info!(url, "no route matched"))?;
    builder.on_error(|error, url| {
        tracing::error!(url, error = %error, error_code = error.error_code(), "route failed")
    })?;
    let router = builder.build();
    info!(routes = router.len(), "router ready");

    for url in urls {
        let mut outcome = router.dispatch(url).await;
        let results = outcome.join_dispatches().await;

        if json {
            let value = serde_json::json!({
                "url": outcome.url,
                "matched": outcome.matched,
                "matches": outcome.matches,
                "error": outcome.error.as_ref().map(ToString::to_string),
            });
            println!("{}", serde_json::to_string(&value)?);
            continue;
        }

        println!();
        println!("URL: {}", url);
        println!("────────────────────────────────────────");
        if outcome.matches.is_empty() {
            println!("  (无匹配)");
        }
        for m in &outcome.matches {
            println!("  路由 {}: {}", m.route, serde_json::to_string(&m.params)?);
        }
        if let Some(ref error) = outcome.error {
            println!("  ❌ [{}] {}", error.error_code(), error);
        }
        for result in results.iter().filter_map(|r| r.as_ref().err()) {
            println!("  ⚠️  抓取失败: {}", result);
        }
    }

    if !json {
        let stats = router.stats();
        println!();
        println!("统计: 调用 {} 次，命中 {}，未命中 {}，错误 {}，分发 {}",
            stats.total_calls,
            stats.matched_calls,
            stats.unmatched_calls,
            stats.error_calls,
            stats.dispatched,
        );
    }

    Ok(())
}

/// 显示路由表
fn show_routes(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let router = RouterBuilder::from_config(DryRunFactory, config)?.build();

    println!();
    println!("路由表 ({} 条)", router.len());
    println!("═══════════════════════════════════════");
    for route in router.routes() {
        println!(
            "  {:<4} {:<8} {}",
            route.id.to_string(),
            route.dispatch,
            route.source
        );
        if let Some(ref description) = route.description {
            println!("         {}", description);
        }
    }
    println!("═══════════════════════════════════════");
    Ok(())
}

/// 编译路径模板
fn compile(template: &str) -> Result<(), Box<dyn std::error::Error>> {
    let compiled = compile_template(template)?;
    let keys: Vec<String> = compiled.keys().iter().map(ToString::to_string).collect();

    println!("模板:   {}", compiled.template());
    println!("正则:   {}", compiled.regex().as_str());
    println!("参数键: url, {}", keys.join(", "));
    Ok(())
}

/// 检查配置文件
async fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("检查配置文件: {}", path.display());
    println!();

    let config = match AppConfig::from_file(path).await {
        Ok(config) => config,
        Err(e) => {
            println!("❌ 配置文件无效: {}", e);
            return Err(Box::new(e));
        }
    };

    if let Err(e) = config.validate() {
        println!("❌ 配置校验失败 [{}]: {}", e.error_code(), e);
        return Err(Box::new(e));
    }

    println!("✅ 配置文件有效！");
    println!();
    println!("────────────────────────────────────────");
    println!("  [路由器配置]");
    println!("    最大并发数:     {}", config.router.max_concurrent);
    println!("    首个匹配停止:   {}", if config.router.first_match { "是" } else { "否" });
    match config.router.dispatch_timeout_ms {
        Some(ms) => println!("    抓取超时:       {} ms", ms),
        None => println!("    抓取超时:       无"),
    }
    println!();
    println!("  [日志配置]");
    println!("    日志级别:       {}", config.logging.level);
    println!("    文件输出:       {}", if config.logging.file_output { "是" } else { "否" });
    println!("    JSON 格式:      {}", if config.logging.json_format { "是" } else { "否" });
    println!();
    println!("  [路由声明] {} 条", config.routes.len());
    for decl in &config.routes {
        let source = decl.path.as_deref().or(decl.pattern.as_deref()).unwrap_or_default();
        let dispatch = if decl.request.is_some() { "request" } else { "get" };
        println!("    {:<8} {:<8} {}", decl.scraper.to_string(), dispatch, source);
    }
    println!("────────────────────────────────────────");
    Ok(())
}

/// 打印版本信息
fn print_version() {
    println!();
    println!("Scrape Router - 抓取路由引擎");
    println!("═══════════════════════════════════════");
    println!("  版本:             {}", scrape_router::VERSION);
    println!("  目标平台:         {}", std::env::consts::ARCH);
    println!("  操作系统:         {}", std::env::consts::OS);
    println!("═══════════════════════════════════════");
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Route { urls, first_match, json } => {
            let config = load_config(&cli.config).await?;
            let _guard = init_logging(&config, cli.log_level.as_deref());
            run_route(config, &urls, first_match, json).await?;
        }

        Commands::Routes => {
            let config = load_config(&cli.config).await?;
            show_routes(&config)?;
        }

        Commands::Compile { template } => {
            compile(&template)?;
        }

        Commands::CheckConfig { config } => {
            let config_path = config.unwrap_or(cli.config);
            check_config(&config_path).await?;
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}
