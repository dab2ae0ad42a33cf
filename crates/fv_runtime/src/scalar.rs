// crates/fv_runtime/src/scalar.rs

//! 线性代数层的标量类型
//!
//! LDU 矩阵、预条件子和求解器对标量泛型，f32 用于节省多重网格粗层内存，
//! 离散层固定使用 f64。trait 是密封的，只有 f32 与 f64 实现。
//!
//! ```rust
//! use fv_runtime::RuntimeScalar;
//!
//! fn relaxed_diag<S: RuntimeScalar>(diag: S, alpha: S) -> S {
//!     diag / alpha
//! }
//!
//! assert_eq!(relaxed_diag(2.0f64, 0.5), 4.0);
//! assert_eq!(relaxed_diag(f32::from_config(3.0), 0.5), 6.0);
//! ```

use std::fmt::{Debug, Display};
use std::iter::Sum;

use bytemuck::Pod;
use num_traits::{Float, FromPrimitive, NumAssign};

mod private {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// 求解器标量（f32 / f64）
pub trait RuntimeScalar:
    private::Sealed
    + Pod
    + Float
    + FromPrimitive
    + NumAssign
    + Debug
    + Display
    + Default
    + Sum
    + Send
    + Sync
    + 'static
{
    /// 0
    const ZERO: Self;
    /// 1
    const ONE: Self;
    /// 残差归一化等场合的防零除小量
    const SMALL: Self;
    /// 奇异性判断阈值
    const VSMALL: Self;
    /// `VSMALL` 的平方根，相对残差的分母保护
    const ROOT_VSMALL: Self;
    /// 初始"无穷大"
    const GREAT: Self;

    /// 配置层的 f64 转为本类型，溢出时取 0
    #[inline]
    fn from_config(value: f64) -> Self {
        Self::from_f64(value).unwrap_or(Self::ZERO)
    }

    /// 转为 f64，用于日志、性能记录和跨分区归约
    #[inline]
    fn as_f64(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

impl RuntimeScalar for f32 {
    const ZERO: f32 = 0.0;
    const ONE: f32 = 1.0;
    const SMALL: f32 = 1.0e-6;
    const VSMALL: f32 = 1.0e-37;
    const ROOT_VSMALL: f32 = 1.0e-18;
    const GREAT: f32 = 1.0e6;
}

impl RuntimeScalar for f64 {
    const ZERO: f64 = 0.0;
    const ONE: f64 = 1.0;
    const SMALL: f64 = 1.0e-15;
    const VSMALL: f64 = 1.0e-300;
    const ROOT_VSMALL: f64 = 1.0e-150;
    const GREAT: f64 = 1.0e15;
}
