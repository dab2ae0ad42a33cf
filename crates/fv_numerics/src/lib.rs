// crates/fv_numerics/src/lib.rs

//! FvKit Numerics Layer
//!
//! 有限体积离散与稀疏求解层。
//!
//! # 模块概览
//!
//! - [`ldu`]: LDU 稀疏矩阵与 cyclic/processor 耦合接口
//! - [`solvers`]: PCG、PBiCGStab、smoothSolver、GAMG 及预条件器/光顺器
//! - [`fields`]: 体心场、面场与边界条件
//! - [`fvc`]: 显式运算（插值、梯度、法向梯度、面积分）
//! - [`fvm`]: 隐式运算（时间项、对流、扩散、源项）
//! - [`fv_matrix`]: 带边界系数与量纲的有限体积方程
//! - [`control`]: 时间推进、SIMPLE/PISO 循环、残差判据、压力参考
//!
//! # 示例
//!
//! ```
//! use fv_config::{LaplacianScheme, SolverControls, SolverKind};
//! use fv_foundation::DimensionSet;
//! use fv_mesh::generation::line_mesh;
//! use fv_numerics::prelude::*;
//!
//! let mesh = line_mesh(10, 1.0).unwrap();
//! let mut t = VolField::uniform(&mesh, "T", DimensionSet::TEMPERATURE, 0.0, |patch| {
//!     if patch.name == "left" {
//!         BoundarySpec::FixedValue(0.0)
//!     } else {
//!         BoundarySpec::FixedValue(100.0)
//!     }
//! })
//! .unwrap();
//!
//! let gamma = Diffusivity::uniform(1.0, DimensionSet::AREA / DimensionSet::TIME);
//! let eqn = fvm::laplacian(&mesh, &gamma, &t, &LaplacianScheme::default())
//!     .unwrap()
//!     .negate();
//! let perf = eqn
//!     .solve(&mut t, &SolverControls::new(SolverKind::Pcg, 1e-10))
//!     .unwrap();
//! assert!(perf.converged);
//! assert!((t.internal()[0] - 5.0).abs() < 1e-6);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod control;
pub mod fields;
pub mod fv_matrix;
pub mod fvc;
pub mod fvm;
pub mod ldu;
pub mod solvers;

/// 层级标识
pub const LAYER: u8 = 4;

pub use control::{PisoControl, SimpleControl, SolverPerformanceDict, TimeState};
pub use fields::{SurfaceField, SurfaceScalarField, VolField, VolScalarField, VolVectorField};
pub use fv_matrix::FvMatrix;
pub use ldu::{InterfaceSet, LduMatrix};
pub use solvers::SolverPerformance;

/// Prelude 模块
pub mod prelude {
    pub use crate::control::{
        adjust_closed_volume, PisoControl, PressureReference, SimpleControl,
        SolverPerformanceDict, TimeState,
    };
    pub use crate::fields::{
        BoundarySpec, FieldValue, SurfaceField, SurfaceScalarField, VolField, VolScalarField,
        VolVectorField,
    };
    pub use crate::fv_matrix::FvMatrix;
    pub use crate::fvm::Diffusivity;
    pub use crate::solvers::SolverPerformance;
    pub use crate::{fvc, fvm};
}
