//! 作用域层级
//!
//! `report ⊃ page ⊃ group(1) ⊃ … ⊃ group(N) ⊃ detail`，从粗到细。
//! 某一作用域发生变化时，会重置该作用域及所有更细作用域的变量。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 变量的重置作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    Detail,
    Group(u32),
    Page,
    Report,
}

impl Default for ResetScope {
    fn default() -> Self {
        ResetScope::Report
    }
}

impl ResetScope {
    /// 作用域粒度，数值越大越细
    pub fn rank(&self) -> u32 {
        match self {
            ResetScope::Report => 0,
            ResetScope::Page => 1,
            ResetScope::Group(level) => 1u32.saturating_add(*level),
            ResetScope::Detail => u32::MAX,
        }
    }

    /// 是否与 `other` 相同或更细
    pub fn is_within(&self, other: &ResetScope) -> bool {
        self.rank() >= other.rank()
    }
}

impl fmt::Display for ResetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetScope::Detail => write!(f, "detail"),
            ResetScope::Group(level) => write!(f, "group({})", level),
            ResetScope::Page => write!(f, "page"),
            ResetScope::Report => write!(f, "report"),
        }
    }
}

/// 作用域变化事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeChange {
    DetailChange,
    GroupChange(u32),
    PageChange,
    ReportChange,
    NoChange,
}

impl ScopeChange {
    /// 事件对应的作用域，`NoChange` 没有对应作用域
    pub fn scope(&self) -> Option<ResetScope> {
        match self {
            ScopeChange::DetailChange => Some(ResetScope::Detail),
            ScopeChange::GroupChange(level) => Some(ResetScope::Group(*level)),
            ScopeChange::PageChange => Some(ResetScope::Page),
            ScopeChange::ReportChange => Some(ResetScope::Report),
            ScopeChange::NoChange => None,
        }
    }

    /// 该事件是否会重置作用域为 `scope` 的变量
    pub fn resets(&self, scope: &ResetScope) -> bool {
        match self.scope() {
            Some(event_scope) => scope.is_within(&event_scope),
            None => false,
        }
    }

    pub fn is_group_break(&self) -> bool {
        matches!(self, ScopeChange::GroupChange(_) | ScopeChange::ReportChange)
    }
}
