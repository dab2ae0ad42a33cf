// crates/fv_numerics/src/ldu/mod.rs

//! LDU 稀疏矩阵与耦合接口
//!
//! - [`LduMatrix`]: 对角 + 按面上/下三角系数
//! - [`InterfaceSet`]: cyclic/processor 耦合接口与数据交换

pub mod interfaces;
pub mod matrix;

pub use interfaces::{InterfaceKind, InterfaceSet, LduInterface};
pub use matrix::{LduMatrix, LduMatrixF64};
