// crates/fv_config/src/lib.rs

//! FvKit Config Layer (Layer 3)
//!
//! 配置层，提供线性求解控制、离散格式选择与算例配置。
//! 所有数值使用 f64，所有名称在解析时经静态注册表转换为枚举。
//!
//! # 模块概览
//!
//! - [`solver_controls`]: SolverControls 逐场线性求解控制
//! - [`schemes`]: FvSchemes 离散格式
//! - [`solution`]: FvSolution 求解字典（求解器、松弛、外层算法）
//! - [`case`]: CaseConfig 算例配置
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: fv_cli        ─> uses CaseConfig
//! Layer 4: fv_numerics   ─> consumes SolverControls, FvSchemes
//! Layer 3: fv_config     ─> (本层)
//! Layer 1: fv_foundation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod registry;

pub mod case;
pub mod error;
pub mod schemes;
pub mod solution;
pub mod solver_controls;

/// 层级标识
pub const LAYER: u8 = 3;

// 重导出核心类型
pub use case::{CaseConfig, CaseKind, MeshSpec, PhysicsParams, TimeControls};
pub use error::ConfigError;
pub use schemes::{
    ConvectionScheme, DdtKind, FvSchemes, InterpolationKind, LaplacianScheme, SnGradScheme,
};
pub use solution::{AlgorithmControls, CorrectorTolerance, FvSolution, RelaxationFactors};
pub use solver_controls::{
    CommsType, DivergencePolicy, GamgControls, PreconditionerKind, ResidualNorm, SmootherKind,
    SolverControls, SolverKind,
};
