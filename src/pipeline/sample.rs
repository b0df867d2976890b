//! 聚合策略的记录采样
//!
//! 支持取前 N 条和蓄水池采样两种方式，内存占用与样本大小成正比

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::Record;

/// 采样方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMethod {
    /// 保留最先到达的记录
    #[default]
    First,
    /// 蓄水池采样（适用于流式数据）
    Reservoir,
}

pub struct Sampler {
    method: SampleMethod,
    capacity: usize,
    seen: u64,
    items: Vec<Record>,
    rng: StdRng,
}

impl Sampler {
    pub fn new(method: SampleMethod, capacity: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            method,
            capacity,
            seen: 0,
            items: Vec::with_capacity(capacity.min(1024)),
            rng,
        }
    }

    /// 提交一条记录，返回它是否进入样本
    pub fn offer(&mut self, record: &Record) -> bool {
        self.seen += 1;
        if self.capacity == 0 {
            return false;
        }
        if self.items.len() < self.capacity {
            self.items.push(record.clone());
            return true;
        }

        match self.method {
            SampleMethod::First => false,
            SampleMethod::Reservoir => {
                let j = self.rng.gen_range(0..self.seen);
                if (j as usize) < self.capacity {
                    self.items[j as usize] = record.clone();
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_sample(self) -> Vec<Record> {
        self.items
    }
}
