// crates/fv_runtime/src/numerics/mod.rs

//! 本地数值工具
//!
//! - [`kahan_sum`]: 补偿求和
//! - [`reduce`]: 求解器使用的本地向量归约

pub mod kahan_sum;
pub mod reduce;

pub use kahan_sum::KahanSum;
pub use reduce::{sum, sum_mag, sum_prod, sum_sqr};
