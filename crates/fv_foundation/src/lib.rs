// crates/fv_foundation/src/lib.rs

//! FvKit Foundation Layer
//!
//! 基础层，提供整个项目共享的最小抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `FvError` 与 `FvResult`
//! - [`dimension`]: 物理量纲集合 `DimensionSet`，方程组合时做量纲检查
//!
//! # 设计原则
//!
//! 1. **最少依赖**: 仅依赖 serde 和 thiserror
//! 2. **错误即返回**: 配置错误、拓扑错误均以 `Err` 上抛，由应用层决定终止
//!
//! # 示例
//!
//! ```
//! use fv_foundation::{dimension::DimensionSet, error::FvResult};
//!
//! fn flux_dims() -> FvResult<DimensionSet> {
//!     let vel = DimensionSet::VELOCITY;
//!     Ok(vel * DimensionSet::AREA)
//! }
//!
//! assert_eq!(flux_dims().unwrap(), DimensionSet::VOLUME / DimensionSet::TIME);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dimension;
pub mod error;

// 重导出常用类型
pub use dimension::DimensionSet;
pub use error::{FvError, FvResult};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::dimension::DimensionSet;
    pub use crate::error::{FvError, FvResult};
    pub use crate::{ensure, require};
}
