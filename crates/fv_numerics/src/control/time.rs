// crates/fv_numerics/src/control/time.rs

//! 时间推进状态

use fv_foundation::{FvError, FvResult};
use serde::Serialize;

/// 当前时间、时间步长与上一步长
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeState {
    /// 当前时间
    pub value: f64,
    /// 当前步长
    pub delta_t: f64,
    /// 上一步长
    pub delta_t0: f64,
    /// 已开始的步数
    pub index: usize,
    #[serde(skip)]
    last_delta_t: f64,
}

impl TimeState {
    /// 从 t = 0 开始
    pub fn new(delta_t: f64) -> FvResult<Self> {
        if !(delta_t > 0.0 && delta_t.is_finite()) {
            return Err(FvError::invalid_input(format!("时间步长必须为正: {}", delta_t)));
        }
        Ok(Self {
            value: 0.0,
            delta_t,
            delta_t0: delta_t,
            index: 0,
            last_delta_t: delta_t,
        })
    }

    /// 稳态计算的伪时间（步长 1）
    pub fn steady() -> Self {
        Self {
            value: 0.0,
            delta_t: 1.0,
            delta_t0: 1.0,
            index: 0,
            last_delta_t: 1.0,
        }
    }

    /// 开始新的一步：时间增加 Δt，上一步长记为 Δt₀
    pub fn advance(&mut self) {
        self.delta_t0 = self.last_delta_t;
        self.last_delta_t = self.delta_t;
        self.value += self.delta_t;
        self.index += 1;
    }

    /// 修改下一步的步长
    pub fn set_delta_t(&mut self, delta_t: f64) -> FvResult<()> {
        if !(delta_t > 0.0 && delta_t.is_finite()) {
            return Err(FvError::invalid_input(format!("时间步长必须为正: {}", delta_t)));
        }
        self.delta_t = delta_t;
        Ok(())
    }

    /// 1/Δt
    #[inline]
    pub fn rdelta_t(&self) -> f64 {
        1.0 / self.delta_t
    }
}
