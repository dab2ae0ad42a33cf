// crates/fv_numerics/src/fields/mod.rs

//! 场与边界条件
//!
//! - [`FieldValue`]: 标量/矢量值的公共操作
//! - [`VolField`]: 体心场，带边界场与时间层
//! - [`SurfaceField`]: 面场
//! - [`PatchCondition`]: 边界条件（和类型，按 `match` 分派）

pub mod patch_field;
pub mod surface_field;
pub mod value;
pub mod vol_field;

pub use patch_field::{BoundarySpec, PatchCondition, PatchField};
pub use surface_field::{SurfaceField, SurfaceScalarField};
pub use value::{reflection, FieldValue};
pub use vol_field::{coupled_neighbour_values, VolField, VolScalarField, VolVectorField};
