//! 变量依赖图
//!
//! 使用 Kahn 算法计算求值顺序。入度为 0 的节点按声明顺序出队，
//! 因此同样的定义总是得到同样的顺序。变量引用自身读取的是上一次的值，
//! 不构成依赖边。

use std::collections::{BTreeSet, HashMap};

use crate::core::error::{ReportError, ReportResult};

pub struct DependencyGraph {
    names: Vec<String>,
    /// dependencies[i] 为变量 i 依赖的变量下标
    dependencies: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// 由 (变量名, 引用的变量名集合) 按声明顺序构建
    pub fn build(entries: &[(String, BTreeSet<String>)]) -> ReportResult<Self> {
        let index: HashMap<&str, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.as_str(), i))
            .collect();

        let mut dependencies = Vec::with_capacity(entries.len());
        for (i, (_, references)) in entries.iter().enumerate() {
            let mut deps = BTreeSet::new();
            for reference in references {
                match index.get(reference.as_str()) {
                    Some(&j) if j == i => {}
                    Some(&j) => {
                        deps.insert(j);
                    }
                    None => return Err(ReportError::VariableNotFound(reference.clone())),
                }
            }
            dependencies.push(deps);
        }

        Ok(Self {
            names: entries.iter().map(|(name, _)| name.clone()).collect(),
            dependencies,
        })
    }

    /// 拓扑序（依赖在前），存在环时返回环路径
    pub fn evaluation_order(&self) -> ReportResult<Vec<usize>> {
        let n = self.names.len();
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != n {
            return Err(ReportError::CircularDependency(self.find_cycle(&in_degree)));
        }
        Ok(order)
    }

    /// 在剩余节点中找出一条环，返回形如 `[a, b, a]` 的路径
    fn find_cycle(&self, in_degree: &[usize]) -> Vec<String> {
        let Some(start) = (0..self.names.len()).find(|&i| in_degree[i] > 0) else {
            return Vec::new();
        };

        // 剩余节点都至少有一个剩余依赖，沿依赖边走一定会回到走过的节点
        let mut path = vec![start];
        let mut current = start;
        loop {
            let next = self.dependencies[current]
                .iter()
                .copied()
                .find(|&dep| in_degree[dep] > 0);
            let Some(next) = next else {
                break;
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|&i| self.names[i].clone()).collect();
                cycle.push(self.names[next].clone());
                return cycle;
            }
            path.push(next);
            current = next;
        }
        path.iter().map(|&i| self.names[i].clone()).collect()
    }
}
