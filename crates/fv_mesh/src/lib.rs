// crates/fv_mesh/src/lib.rs

//! FvKit Mesh Layer
//!
//! 网格层，为离散和求解提供拓扑、几何与通信。
//!
//! # 模块概览
//!
//! - [`mesh`]: 面寻址网格 `FvMesh` 及构造校验
//! - [`patch`]: 边界 patch 类型（一般、壁面、对称、cyclic、processor）
//! - [`ldu`]: LDU 寻址（lower/upper/losort/ownerStart）
//! - [`geometry`]: 插值权重、距离系数、非正交修正矢量
//! - [`cache`]: 按网格代数缓存派生量
//! - [`parallel`]: 通信器抽象与进程内多 rank 实现
//! - [`generation`]: 结构化测试网格
//! - [`decompose`]: 按单元归属分区
//!
//! # 示例
//!
//! ```
//! use fv_mesh::generation::line_mesh;
//!
//! let mesh = line_mesh(10, 1.0).unwrap();
//! let addr = mesh.ldu_addressing().unwrap();
//! assert_eq!(addr.n_faces(), 9);
//! assert_eq!(mesh.find_patch("right"), Some(1));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod decompose;
pub mod error;
pub mod generation;
pub mod geometry;
pub mod ldu;
pub mod mesh;
pub mod parallel;
pub mod patch;

/// 层级标识
pub const LAYER: u8 = 3;

pub use error::{MeshError, MeshResult};
pub use geometry::{PatchGeometry, SurfaceGeometry};
pub use ldu::LduAddressing;
pub use mesh::{FvMesh, MeshData};
pub use parallel::{Communicator, LocalComm, LocalWorld, SerialComm};
pub use patch::{CyclicTransform, Patch, PatchKind};

/// Prelude 模块
pub mod prelude {
    pub use crate::generation::{line_mesh, periodic_line_mesh, rect_mesh, skewed_rect_mesh};
    pub use crate::mesh::{FvMesh, MeshData};
    pub use crate::parallel::{Communicator, LocalWorld, SerialComm};
    pub use crate::patch::{CyclicTransform, Patch, PatchKind};
}
