//! 路由表构建器
//!
//! 每次 `on()` 返回一个 [`RouteId`] 句柄，后续的绑定操作都显式地作用于
//! 这个句柄。构建完成后调用 `build()` 得到不可变的 [`Router`]。
//!
//! # Example
//!
//! ```rust
//! use scrape_router::router::{DryRunFactory, RouterBuilder};
//!
//! # fn main() -> scrape_router::Result<()> {
//! let mut builder = RouterBuilder::new(DryRunFactory);
//! let user = builder.on("/user/:id")?;
//! builder.get(user)?;
//! builder.create_static(user)?;
//! builder.otherwise(|url| println!("no route for {}", url))?;
//! let router = builder.build();
//! assert_eq!(router.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tracing::debug;

use super::action::{ScraperFactory, ScraperKind, SharedAction};
use super::matcher::{Matcher, RouteSpec};
use super::request::RequestOptions;
use super::route_table::{Dispatch, RouteId, RouteTable};
use super::router::{ErrorCallback, OtherwiseCallback, Router};
use crate::core::config::{AppConfig, RouteDecl, RouterConfig};
use crate::utils::{Result, RouterError};

/// 路由表构建器
pub struct RouterBuilder<F: ScraperFactory> {
    factory: F,
    table: RouteTable,
    on_error: Option<ErrorCallback>,
    otherwise: Option<OtherwiseCallback>,
    config: RouterConfig,
}

impl<F: ScraperFactory> RouterBuilder<F> {
    /// 使用默认配置创建构建器
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, RouterConfig::default())
    }

    /// 使用指定配置创建构建器
    pub fn with_config(factory: F, config: RouterConfig) -> Self {
        Self {
            factory,
            table: RouteTable::new(),
            on_error: None,
            otherwise: None,
            config,
        }
    }

    /// 按应用配置创建构建器，并依次声明其中的路由
    pub fn from_config(factory: F, config: &AppConfig) -> Result<Self> {
        let mut builder = Self::with_config(factory, config.router.clone());
        for decl in &config.routes {
            builder.declare(decl)?;
        }
        Ok(builder)
    }

    /// 声明路由，默认以 `get` 方式分发
    ///
    /// # Errors
    ///
    /// 模板无法编译时返回 `RouterError::InvalidPattern`。
    pub fn on(&mut self, spec: impl Into<RouteSpec>) -> Result<RouteId> {
        let matcher = Matcher::new(spec.into())?;
        let id = self.table.push(matcher);
        debug!(route = %id, source = self.table.get(id)?.matcher().source(), "route declared");
        Ok(id)
    }

    /// 最近声明的路由
    pub fn current(&self) -> Result<RouteId> {
        self.table.last().ok_or(RouterError::NoRouteDeclared)
    }

    /// 以 `get(url)` 方式分发
    pub fn get(&mut self, route: RouteId) -> Result<&mut Self> {
        self.table.get_mut(route)?.set_dispatch(Dispatch::Get);
        Ok(self)
    }

    /// 以 `request(options)` 方式分发，`options.uri` 在分发时被覆盖
    pub fn request(&mut self, route: RouteId, options: RequestOptions) -> Result<&mut Self> {
        self.table
            .get_mut(route)?
            .set_dispatch(Dispatch::Request(options));
        Ok(self)
    }

    /// 设置路由描述
    pub fn describe(&mut self, route: RouteId, description: impl Into<String>) -> Result<&mut Self> {
        self.table.get_mut(route)?.set_description(description);
        Ok(self)
    }

    /// 创建静态抓取器并绑定到路由
    ///
    /// # Errors
    ///
    /// 句柄未知返回 `UnknownRoute`，已绑定动作返回 `ActionAlreadyBound`。
    pub fn create_static(&mut self, route: RouteId) -> Result<Arc<F::Static>> {
        self.ensure_unbound(route)?;
        let action = Arc::new(self.factory.create_static());
        self.use_action(route, action.clone())?;
        Ok(action)
    }

    /// 创建动态抓取器并绑定到路由
    pub fn create_dynamic(&mut self, route: RouteId) -> Result<Arc<F::Dynamic>> {
        self.ensure_unbound(route)?;
        let action = Arc::new(self.factory.create_dynamic());
        self.use_action(route, action.clone())?;
        Ok(action)
    }

    /// 绑定已有的抓取动作
    pub fn use_action(&mut self, route: RouteId, action: SharedAction) -> Result<&mut Self> {
        self.table.get_mut(route)?.attach(action)?;
        Ok(self)
    }

    /// 设置错误回调，只能设置一次
    pub fn on_error<C>(&mut self, callback: C) -> Result<&mut Self>
    where
        C: Fn(&RouterError, &str) + Send + Sync + 'static,
    {
        if self.on_error.is_some() {
            return Err(RouterError::CallbackAlreadySet("on_error"));
        }
        self.on_error = Some(Arc::new(callback));
        Ok(self)
    }

    /// 设置未匹配回调，只能设置一次
    pub fn otherwise<C>(&mut self, callback: C) -> Result<&mut Self>
    where
        C: Fn(&str) + Send + Sync + 'static,
    {
        if self.otherwise.is_some() {
            return Err(RouterError::CallbackAlreadySet("otherwise"));
        }
        self.otherwise = Some(Arc::new(callback));
        Ok(self)
    }

    /// 按配置声明路由：解析声明、设置分发方式、创建抓取器
    pub fn declare(&mut self, decl: &RouteDecl) -> Result<RouteId> {
        let route = self.on(decl.spec()?)?;
        if let Some(options) = &decl.request {
            self.request(route, options.clone())?;
        }
        match decl.scraper {
            ScraperKind::Static => {
                self.create_static(route)?;
            }
            ScraperKind::Dynamic => {
                self.create_dynamic(route)?;
            }
        }
        if let Some(description) = &decl.description {
            self.describe(route, description.clone())?;
        }
        Ok(route)
    }

    /// 已声明的路由数
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// 是否尚未声明路由
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// 冻结路由表，构建路由器
    pub fn build(self) -> Router {
        Router::new(self.table, self.on_error, self.otherwise, self.config)
    }

    fn ensure_unbound(&self, route: RouteId) -> Result<()> {
        match self.table.get(route)?.action() {
            Some(_) => Err(RouterError::ActionAlreadyBound(route.index())),
            None => Ok(()),
        }
    }
}
