//! 作用域变量引擎
//!
//! 持有所有变量的当前值。每条记录按依赖顺序更新，作用域变化时按
//! `report ⊃ page ⊃ group(1) ⊃ … ⊃ group(N) ⊃ detail` 级联重置。
//! 引擎由一次会话独占，不需要同步。

use std::collections::{BTreeMap, HashMap};

use super::accumulator::Accumulator;
use super::dependency_graph::DependencyGraph;
use crate::core::error::{ReportError, ReportResult};
use crate::core::{Record, ResetScope, ScopeChange, Value, Variable, VariableKind};
use crate::expression::{CompiledExpression, ExpressionContext};

/// 变量名到当前值的有序快照
pub type VariableSnapshot = BTreeMap<String, Value>;

#[derive(Debug, Clone)]
struct VariableState {
    definition: Variable,
    /// 为 None 时表示统计所有记录（count 的空表达式或 `*`）
    expression: Option<CompiledExpression>,
    initial: Value,
    accumulator: Accumulator,
}

impl VariableState {
    fn current_value(&self) -> Value {
        self.accumulator.value(&self.initial)
    }

    fn reset(&mut self) {
        self.accumulator = Accumulator::new(self.definition.kind, &self.initial);
    }
}

#[derive(Debug, Clone)]
pub struct VariableEngine {
    states: Vec<VariableState>,
    index: HashMap<String, usize>,
    order: Vec<usize>,
    /// 出现过的重置作用域，从粗到细
    scopes: Vec<ResetScope>,
    error_count: u64,
}

/// 求值时的上下文：当前记录 + 其他变量的当前值
struct EngineContext<'a> {
    record: &'a Record,
    engine: &'a VariableEngine,
}

impl ExpressionContext for EngineContext<'_> {
    fn get_field(&self, path: &str) -> Option<Value> {
        self.record.get_path(path).cloned()
    }

    fn get_variable(&self, name: &str) -> Option<Value> {
        self.engine.get_value(name)
    }
}

impl VariableEngine {
    /// 编译所有表达式并计算求值顺序
    ///
    /// 名称重复、引用未知变量、循环依赖都在这里失败，不会推迟到逐条记录处理时
    pub fn new(variables: Vec<Variable>) -> ReportResult<Self> {
        let mut states = Vec::with_capacity(variables.len());
        let mut index = HashMap::with_capacity(variables.len());
        let mut entries = Vec::with_capacity(variables.len());

        for variable in variables {
            if index.contains_key(&variable.name) {
                return Err(ReportError::Definition(format!(
                    "变量名重复: {}",
                    variable.name
                )));
            }

            let source = variable.source_expression.trim();
            let expression = if variable.kind == VariableKind::Count
                && (source.is_empty() || source == "*")
            {
                None
            } else if source.is_empty() {
                return Err(ReportError::Definition(format!(
                    "变量 {} ({}) 缺少源表达式",
                    variable.name, variable.kind
                )));
            } else {
                Some(CompiledExpression::compile(source)?)
            };

            entries.push((
                variable.name.clone(),
                expression
                    .as_ref()
                    .map(CompiledExpression::referenced_variables)
                    .unwrap_or_default(),
            ));

            let initial = variable.effective_initial_value();
            let accumulator = Accumulator::new(variable.kind, &initial);
            index.insert(variable.name.clone(), states.len());
            states.push(VariableState {
                definition: variable,
                expression,
                initial,
                accumulator,
            });
        }

        let order = DependencyGraph::build(&entries)?.evaluation_order()?;

        let mut scopes: Vec<ResetScope> = Vec::new();
        for state in &states {
            if !scopes.contains(&state.definition.reset_scope) {
                scopes.push(state.definition.reset_scope);
            }
        }
        scopes.sort_by_key(ResetScope::rank);

        log::debug!(
            "变量引擎初始化完成: {} 个变量, 求值顺序 {:?}",
            states.len(),
            order
                .iter()
                .map(|&i| states[i].definition.name.as_str())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            states,
            index,
            order,
            scopes,
            error_count: 0,
        })
    }

    /// 更新单个变量
    pub fn update(&mut self, name: &str, record: &Record) -> ReportResult<()> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| ReportError::VariableNotFound(name.to_string()))?;
        self.update_at(idx, record);
        Ok(())
    }

    /// 按依赖顺序更新所有变量
    pub fn update_all_ordered(&mut self, record: &Record) {
        for position in 0..self.order.len() {
            let idx = self.order[position];
            self.update_at(idx, record);
        }
    }

    fn update_at(&mut self, idx: usize, record: &Record) {
        if self.states[idx].expression.is_none() {
            self.states[idx].accumulator.count_one();
            return;
        }

        let contribution = {
            let context = EngineContext {
                record,
                engine: self,
            };
            match &self.states[idx].expression {
                Some(expression) => expression.evaluate(&context),
                None => Ok(Value::Null),
            }
        };

        let state = &mut self.states[idx];
        let outcome = match contribution {
            Ok(value) => state.accumulator.accumulate(value),
            Err(e) => Err(e.to_string()),
        };

        if let Err(reason) = outcome {
            self.error_count += 1;
            let state = &self.states[idx];
            if state.definition.kind == VariableKind::Custom {
                log::debug!(
                    "自定义变量 {} 求值失败, 保留上一次的值: {}",
                    state.definition.name,
                    reason
                );
            } else {
                log::warn!(
                    "变量 {} 的贡献无效, 按中性值处理: {} (表达式: {})",
                    state.definition.name,
                    reason,
                    state
                        .expression
                        .as_ref()
                        .map(CompiledExpression::source)
                        .unwrap_or("*")
                );
            }
        }
    }

    /// 把单个变量恢复到初始值
    pub fn reset(&mut self, name: &str) -> ReportResult<()> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| ReportError::VariableNotFound(name.to_string()))?;
        self.states[idx].reset();
        Ok(())
    }

    /// 重置作用域恰好为 `scope` 的变量
    pub fn reset_scope(&mut self, scope: ResetScope) {
        for state in self
            .states
            .iter_mut()
            .filter(|s| s.definition.reset_scope == scope)
        {
            state.reset();
        }
    }

    pub fn reset_all(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }

    /// 处理作用域变化：事件作用域及所有更细作用域的变量都被重置
    pub fn handle_scope_change(&mut self, event: ScopeChange) {
        if event == ScopeChange::NoChange {
            return;
        }
        let affected: Vec<ResetScope> = self
            .scopes
            .iter()
            .copied()
            .filter(|scope| event.resets(scope))
            .collect();
        for scope in affected {
            self.reset_scope(scope);
        }
    }

    pub fn get_value(&self, name: &str) -> Option<Value> {
        self.index
            .get(name)
            .map(|&idx| self.states[idx].current_value())
    }

    pub fn get_all_values(&self) -> VariableSnapshot {
        self.states
            .iter()
            .map(|s| (s.definition.name.clone(), s.current_value()))
            .collect()
    }

    /// 分组页眉页脚使用的快照
    pub fn snapshot(&self) -> VariableSnapshot {
        self.get_all_values()
    }

    /// 被按中性值处理的计算错误次数
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// 变量求值顺序
    pub fn evaluation_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.states[i].definition.name.as_str())
            .collect()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.states.iter().map(|s| &s.definition)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales(region: &str, amt: i64) -> Record {
        Record::new().with("region", region).with("amt", amt)
    }

    fn engine() -> VariableEngine {
        VariableEngine::new(vec![
            Variable::new("grand_total", VariableKind::Sum, "amt", ResetScope::Report),
            Variable::new("region_total", VariableKind::Sum, "amt", ResetScope::Group(1)),
            Variable::new("line_amt", VariableKind::Sum, "amt", ResetScope::Detail),
            Variable::new("rows", VariableKind::Count, "", ResetScope::Report),
        ])
        .expect("engine")
    }

    #[test]
    fn test_update_all_and_group_reset() {
        let mut engine = engine();
        engine.update_all_ordered(&sales("West", 100));
        engine.update_all_ordered(&sales("West", 200));
        assert_eq!(engine.get_value("region_total"), Some(Value::Int(300)));

        engine.handle_scope_change(ScopeChange::GroupChange(1));
        assert_eq!(engine.get_value("region_total"), Some(Value::Int(0)));
        assert_eq!(engine.get_value("line_amt"), Some(Value::Int(0)));
        assert_eq!(engine.get_value("grand_total"), Some(Value::Int(300)));
        assert_eq!(engine.get_value("rows"), Some(Value::Int(2)));
    }

    #[test]
    fn test_reset_scope_is_exact() {
        let mut engine = engine();
        engine.update_all_ordered(&sales("West", 100));
        engine.reset_scope(ResetScope::Group(1));
        assert_eq!(engine.get_value("region_total"), Some(Value::Int(0)));
        assert_eq!(engine.get_value("line_amt"), Some(Value::Int(100)));
    }

    #[test]
    fn test_report_change_resets_everything() {
        let mut engine = engine();
        engine.update_all_ordered(&sales("West", 100));
        engine.handle_scope_change(ScopeChange::ReportChange);
        assert!(engine.get_all_values().values().all(|v| *v == Value::Int(0)));
    }

    #[test]
    fn test_no_change_is_noop() {
        let mut engine = engine();
        engine.update_all_ordered(&sales("West", 100));
        let before = engine.snapshot();
        engine.handle_scope_change(ScopeChange::NoChange);
        assert_eq!(before, engine.snapshot());
    }

    #[test]
    fn test_dependent_variable_sees_updated_values() {
        let mut engine = VariableEngine::new(vec![
            Variable::new("share", VariableKind::Custom, "$total / $rows", ResetScope::Report),
            Variable::new("total", VariableKind::Sum, "amt", ResetScope::Report),
            Variable::new("rows", VariableKind::Count, "*", ResetScope::Report),
        ])
        .expect("engine");
        assert_eq!(engine.evaluation_order(), vec!["total", "rows", "share"]);

        engine.update_all_ordered(&sales("West", 10));
        engine.update_all_ordered(&sales("West", 20));
        assert_eq!(engine.get_value("share"), Some(Value::Float(15.0)));
    }

    #[test]
    fn test_setup_errors() {
        let cyclic = VariableEngine::new(vec![
            Variable::new("a", VariableKind::Custom, "$b + 1", ResetScope::Report),
            Variable::new("b", VariableKind::Custom, "$a + 1", ResetScope::Report),
        ]);
        assert!(matches!(cyclic, Err(ReportError::CircularDependency(_))));

        let unknown = VariableEngine::new(vec![Variable::new(
            "a",
            VariableKind::Custom,
            "$ghost",
            ResetScope::Report,
        )]);
        assert!(matches!(unknown, Err(ReportError::VariableNotFound(_))));
    }

    #[test]
    fn test_update_unknown_variable() {
        let mut engine = engine();
        let err = engine
            .update("nope", &sales("West", 1))
            .expect_err("unknown variable");
        assert!(matches!(err, ReportError::VariableNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_malformed_input_is_neutral_and_counted() {
        let mut engine = engine();
        engine.update_all_ordered(&Record::new().with("amt", "oops"));
        engine.update_all_ordered(&Record::new().with("region", "West"));
        assert_eq!(engine.get_value("grand_total"), Some(Value::Int(0)));
        assert_eq!(engine.get_value("rows"), Some(Value::Int(2)));
        assert_eq!(engine.error_count(), 3);
    }

    #[test]
    fn test_missing_field_contributions() {
        let mut engine = VariableEngine::new(vec![
            Variable::new("with_amt", VariableKind::Count, "amt", ResetScope::Report),
            Variable::new("avg", VariableKind::Average, "amt", ResetScope::Report),
            Variable::new("low", VariableKind::Min, "amt", ResetScope::Report),
            Variable::new("big", VariableKind::CountWhere, "amt > 15", ResetScope::Report),
        ])
        .expect("engine");
        for record in [
            Record::new().with("amt", 10),
            Record::new(),
            Record::new().with("amt", 20),
        ] {
            engine.update_all_ordered(&record);
        }
        assert_eq!(engine.get_value("with_amt"), Some(Value::Int(2)));
        assert_eq!(engine.get_value("avg"), Some(Value::Float(15.0)));
        assert_eq!(engine.get_value("low"), Some(Value::Int(10)));
        assert_eq!(engine.get_value("big"), Some(Value::Int(1)));
        assert_eq!(engine.error_count(), 0);
    }
}
