// crates/fv_numerics/src/fvm/mod.rs

//! 隐式有限体积运算（fvm）
//!
//! 每个运算返回一个新的 [`FvMatrix`](crate::fv_matrix::FvMatrix)，由调用方按值组合成方程：
//!
//! ```ignore
//! let eqn = fvm::ddt(&mesh, &t, schemes.ddt, &time)?
//!     .add_matrix(fvm::div(&mesh, &phi, &t, &schemes.div_scheme("div(phi,T)")?)?)?
//!     .sub_matrix(fvm::laplacian(&mesh, &gamma, &t, &schemes.laplacian)?)?;
//! ```
//!
//! 通量或扩散系数为零时各运算自然给出零贡献。

pub mod convection;
pub mod ddt;
pub mod laplacian;
pub mod sources;

pub use convection::{div, gradient_ratio, limiter, weights};
pub use ddt::{ddt, ddt_rho};
pub use laplacian::{laplacian, Diffusivity};
pub use sources::{sp, su, susp};
