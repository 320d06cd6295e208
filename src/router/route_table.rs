//! 路由表数据结构
//!
//! 按插入顺序保存路由条目。条目只追加、不重排、不删除。

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::action::SharedAction;
use super::matcher::{Matcher, Params};
use super::request::RequestOptions;
use crate::utils::{Result, RouterError};

/// 路由句柄
///
/// 由 `RouterBuilder::on` 返回，用于把动作绑定到对应的路由。
/// 句柄记录所属路由表的标识，只在创建它的路由表中有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId {
    table: u64,
    index: usize,
}

impl RouteId {
    /// 在路由表中的序号
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

// 导出摘要只关心序号
impl Serialize for RouteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.index as u64)
    }
}

/// 路由表标识计数器（进程内唯一）
static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// 匹配后的分发方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// 直接抓取 URL
    Get,
    /// 按请求选项抓取（`uri` 在分发时覆盖）
    Request(RequestOptions),
}

impl Dispatch {
    /// 分发方式名称
    pub fn name(&self) -> &'static str {
        match self {
            Dispatch::Get => "get",
            Dispatch::Request(_) => "request",
        }
    }
}

/// 路由条目
pub struct RouteEntry {
    id: RouteId,
    matcher: Matcher,
    action: Option<SharedAction>,
    dispatch: Dispatch,
    description: Option<String>,
}

impl RouteEntry {
    fn new(id: RouteId, matcher: Matcher) -> Self {
        Self {
            id,
            matcher,
            action: None,
            dispatch: Dispatch::Get,
            description: None,
        }
    }

    /// 路由句柄
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// 匹配器
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// 已绑定的抓取动作
    pub fn action(&self) -> Option<&SharedAction> {
        self.action.as_ref()
    }

    /// 分发方式
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// 描述信息
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// 测试 URL
    pub fn test(&self, url: &str) -> Option<Params> {
        self.matcher.test(url)
    }

    /// 绑定抓取动作，每条路由只能绑定一次
    pub(crate) fn attach(&mut self, action: SharedAction) -> Result<()> {
        if self.action.is_some() {
            return Err(RouterError::ActionAlreadyBound(self.id.index));
        }
        self.action = Some(action);
        Ok(())
    }

    pub(crate) fn set_dispatch(&mut self, dispatch: Dispatch) {
        self.dispatch = dispatch;
    }

    pub(crate) fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// 条目摘要
    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            id: self.id,
            source: self.matcher.source().to_string(),
            keys: self
                .matcher
                .keys()
                .map(|keys| keys.iter().map(ToString::to_string).collect()),
            dispatch: self.dispatch.name(),
            has_action: self.action.is_some(),
            description: self.description.clone(),
        }
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("id", &self.id)
            .field("matcher", &self.matcher)
            .field("has_action", &self.action.is_some())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

/// 路由表
#[derive(Debug)]
pub struct RouteTable {
    id: u64,
    entries: Vec<RouteEntry>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            entries: Vec::new(),
        }
    }
}

impl RouteTable {
    /// 创建空路由表
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加路由，返回其句柄
    pub fn push(&mut self, matcher: Matcher) -> RouteId {
        let id = RouteId {
            table: self.id,
            index: self.entries.len(),
        };
        self.entries.push(RouteEntry::new(id, matcher));
        id
    }

    /// 句柄是否属于本表
    pub fn contains(&self, id: RouteId) -> bool {
        id.table == self.id && id.index < self.entries.len()
    }

    /// 按句柄获取条目
    ///
    /// 其他路由表签发的句柄即使序号在范围内也返回 `UnknownRoute`。
    pub fn get(&self, id: RouteId) -> Result<&RouteEntry> {
        if id.table != self.id {
            return Err(RouterError::UnknownRoute(id.index));
        }
        self.entries
            .get(id.index)
            .ok_or(RouterError::UnknownRoute(id.index))
    }

    pub(crate) fn get_mut(&mut self, id: RouteId) -> Result<&mut RouteEntry> {
        if id.table != self.id {
            return Err(RouterError::UnknownRoute(id.index));
        }
        self.entries
            .get_mut(id.index)
            .ok_or(RouterError::UnknownRoute(id.index))
    }

    /// 最近声明的路由
    pub fn last(&self) -> Option<RouteId> {
        self.entries.last().map(RouteEntry::id)
    }

    /// 按插入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    /// 条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 导出路由表摘要（用于调试）
    pub fn export(&self) -> Vec<RouteSummary> {
        self.entries.iter().map(RouteEntry::summary).collect()
    }
}

/// 路由条目摘要
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    /// 路由句柄
    pub id: RouteId,
    /// 声明来源
    pub source: String,
    /// 参数键（谓词路由没有）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    /// 分发方式名称
    pub dispatch: &'static str,
    /// 是否已绑定抓取动作
    pub has_action: bool,
    /// 描述
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
