// crates/fv_runtime/src/lib.rs

//! FvKit Runtime Layer (Layer 2)
//!
//! 运行时抽象层，提供标量类型与本地数值归约。
//!
//! # 模块概览
//!
//! - [`scalar`]: RuntimeScalar trait（密封，仅 f32/f64 可实现）
//! - [`numerics`]: Kahan 求和与向量归约（点积、绝对值和、平方和）
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: fv_numerics   ─> LduMatrix<S>, 线性求解器, FvMatrix
//! Layer 3: fv_mesh       ─> FvMesh, LduAddressing, Communicator
//! Layer 3: fv_config     ─> SolverControls, FvSchemes, FvSolution
//! Layer 2: fv_runtime    ─> RuntimeScalar, KahanSum (本层)
//! Layer 1: fv_foundation ─> FvError, DimensionSet
//! ```
//!
//! 归约只在本进程内进行，跨进程归约由 `fv_mesh::parallel` 的通信器完成。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod numerics;
pub mod scalar;

/// 层级标识
pub const LAYER: u8 = 2;

// 重导出核心类型
pub use numerics::KahanSum;
pub use scalar::RuntimeScalar;

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::numerics::{sum, sum_mag, sum_prod, sum_sqr, KahanSum};
    pub use crate::RuntimeScalar;
}
