// crates/fv_numerics/src/control/mod.rs

//! 求解流程控制
//!
//! - [`TimeState`]: 时间推进
//! - [`SimpleControl`] / [`PisoControl`]: 外层与压力修正循环
//! - [`ResidualControl`]: 残差收敛判据
//! - [`PressureReference`]: 纯 Neumann 压力问题的参考点

pub mod loops;
pub mod pressure;
pub mod residuals;
pub mod time;

pub use loops::{non_orth_correctors, NonOrthCorrector, PisoControl, PisoCorrector, SimpleControl};
pub use pressure::{adjust_closed_volume, PressureReference};
pub use residuals::{ResidualControl, SolverPerformanceDict};
pub use time::TimeState;
