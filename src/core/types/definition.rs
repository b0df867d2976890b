//! 报表定义
//!
//! 由外部的报表编译器提供：分组列表、变量列表，以及输出是否只需要聚合数据。
//! 可以从 TOML 或 JSON 反序列化。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::group::Group;
use super::scope::ResetScope;
use super::variable::Variable;
use crate::core::error::{ReportError, ReportResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    /// 输出只包含预聚合数据（图表、汇总），不逐条渲染记录
    #[serde(default)]
    pub aggregation_only: bool,
    /// 显式或推断出的行数上限
    #[serde(default)]
    pub row_cap: Option<usize>,
}

impl ReportDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            variables: Vec::new(),
            aggregation_only: false,
            row_cap: None,
        }
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_aggregation_only(mut self, aggregation_only: bool) -> Self {
        self.aggregation_only = aggregation_only;
        self
    }

    pub fn with_row_cap(mut self, row_cap: usize) -> Self {
        self.row_cap = Some(row_cap);
        self
    }

    /// 从文件加载，扩展名为 `.json` 时按 JSON 解析，其余按 TOML 解析
    pub fn load<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let definition: ReportDefinition = if is_json {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        definition.validate()?;
        Ok(definition)
    }

    /// 按级别排序后的分组列表
    pub fn sorted_groups(&self) -> Vec<Group> {
        let mut groups = self.groups.clone();
        groups.sort_by_key(|g| g.level);
        groups
    }

    /// 校验定义的结构
    ///
    /// - 分组级别必须恰好是 1..=N，且名称唯一
    /// - 变量名必须是合法标识符且唯一
    /// - 分组作用域的变量不能引用不存在的分组级别
    pub fn validate(&self) -> ReportResult<()> {
        let mut levels: Vec<u32> = self.groups.iter().map(|g| g.level).collect();
        levels.sort_unstable();
        for (i, level) in levels.iter().enumerate() {
            if *level != (i as u32) + 1 {
                return Err(ReportError::Definition(format!(
                    "分组级别必须从 1 开始连续且唯一, 实际为 {:?}",
                    levels
                )));
            }
        }

        let mut group_names = HashSet::new();
        for group in &self.groups {
            if !group_names.insert(group.name.as_str()) {
                return Err(ReportError::Definition(format!(
                    "分组名称重复: {}",
                    group.name
                )));
            }
            if group.key_expression.trim().is_empty() {
                return Err(ReportError::Definition(format!(
                    "分组 {} 缺少键表达式",
                    group.name
                )));
            }
        }

        let mut variable_names = HashSet::new();
        for variable in &self.variables {
            if !is_identifier(&variable.name) {
                return Err(ReportError::Definition(format!(
                    "变量名不是合法标识符: {:?}",
                    variable.name
                )));
            }
            if !variable_names.insert(variable.name.as_str()) {
                return Err(ReportError::Definition(format!(
                    "变量名重复: {}",
                    variable.name
                )));
            }
            if let ResetScope::Group(level) = variable.reset_scope {
                if level == 0 || level as usize > self.groups.len() {
                    return Err(ReportError::Definition(format!(
                        "变量 {} 的重置作用域 group({}) 不存在",
                        variable.name, level
                    )));
                }
            }
        }

        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
