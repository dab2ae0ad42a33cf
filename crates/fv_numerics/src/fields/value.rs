// crates/fv_numerics/src/fields/value.rs

//! 场值类型
//!
//! 标量场与矢量场共用离散代码：矩阵系数始终为标量，矢量方程按分量分离求解。
//! 矢量与张量变换（cyclic 旋转、对称面反射）通过 [`FieldValue::transform`] 完成，
//! 对标量为恒等。

use glam::{DMat3, DVec3};
use serde::Serialize;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// 场值类型
pub trait FieldValue:
    Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + Serialize
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<f64, Output = Self>
    + AddAssign
    + SubAssign
{
    /// 分量数
    const N_COMPONENTS: usize;

    /// 张量阶数
    const RANK: u8;

    /// 零
    fn zero() -> Self;

    /// 所有分量取同一值
    fn splat(value: f64) -> Self;

    /// 第 i 个分量
    fn component(&self, i: usize) -> f64;

    /// 设置第 i 个分量
    fn set_component(&mut self, i: usize, value: f64);

    /// 分量名后缀（日志中的 `Ux`、`Uy`）
    fn component_name(i: usize) -> &'static str;

    /// 逐分量乘
    fn cmpt_mul(self, other: Self) -> Self;

    /// 逐分量绝对值
    fn cmpt_mag(self) -> Self;

    /// 线性变换（标量不变）
    fn transform(self, t: &DMat3) -> Self;

    /// 模
    fn mag(self) -> f64;

    /// 模的平方
    fn mag_sqr(self) -> f64;

    /// 对称面法向梯度变换的对角部分：标量为 0，矢量为 |n| 逐分量
    fn transform_diag(n: DVec3) -> Self;
}

impl FieldValue for f64 {
    const N_COMPONENTS: usize = 1;
    const RANK: u8 = 0;

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn splat(value: f64) -> Self {
        value
    }

    #[inline]
    fn component(&self, _i: usize) -> f64 {
        *self
    }

    #[inline]
    fn set_component(&mut self, _i: usize, value: f64) {
        *self = value;
    }

    fn component_name(_i: usize) -> &'static str {
        ""
    }

    #[inline]
    fn cmpt_mul(self, other: Self) -> Self {
        self * other
    }

    #[inline]
    fn cmpt_mag(self) -> Self {
        self.abs()
    }

    #[inline]
    fn transform(self, _t: &DMat3) -> Self {
        self
    }

    #[inline]
    fn mag(self) -> f64 {
        self.abs()
    }

    #[inline]
    fn mag_sqr(self) -> f64 {
        self * self
    }

    #[inline]
    fn transform_diag(_n: DVec3) -> Self {
        0.0
    }
}

impl FieldValue for DVec3 {
    const N_COMPONENTS: usize = 3;
    const RANK: u8 = 1;

    #[inline]
    fn zero() -> Self {
        DVec3::ZERO
    }

    #[inline]
    fn splat(value: f64) -> Self {
        DVec3::splat(value)
    }

    #[inline]
    fn component(&self, i: usize) -> f64 {
        self[i]
    }

    #[inline]
    fn set_component(&mut self, i: usize, value: f64) {
        self[i] = value;
    }

    fn component_name(i: usize) -> &'static str {
        ["x", "y", "z"][i]
    }

    #[inline]
    fn cmpt_mul(self, other: Self) -> Self {
        self * other
    }

    #[inline]
    fn cmpt_mag(self) -> Self {
        self.abs()
    }

    #[inline]
    fn transform(self, t: &DMat3) -> Self {
        *t * self
    }

    #[inline]
    fn mag(self) -> f64 {
        self.length()
    }

    #[inline]
    fn mag_sqr(self) -> f64 {
        self.length_squared()
    }

    #[inline]
    fn transform_diag(n: DVec3) -> Self {
        n.abs()
    }
}

/// 对称面反射 I − 2n⊗n
pub fn reflection(n: DVec3) -> DMat3 {
    DMat3::IDENTITY - DMat3::from_cols(n * n.x, n * n.y, n * n.z) * 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components() {
        let mut v = DVec3::new(1.0, 2.0, 3.0);
        v.set_component(1, -4.0);
        assert_eq!(v.component(1), -4.0);
        assert_eq!(<DVec3 as FieldValue>::component_name(2), "z");

        let mut s = 2.0f64;
        s.set_component(0, 5.0);
        assert_eq!(s.component(0), 5.0);
    }

    #[test]
    fn test_reflection() {
        let n = DVec3::X;
        let r = reflection(n);
        let v = DVec3::new(2.0, 1.0, -1.0);
        assert_eq!(v.transform(&r), DVec3::new(-2.0, 1.0, -1.0));
        // 标量不受反射影响
        assert_eq!(3.0f64.transform(&r), 3.0);
    }

    #[test]
    fn test_transform_diag() {
        let n = DVec3::new(-0.6, 0.8, 0.0);
        assert_eq!(f64::transform_diag(n), 0.0);
        assert_eq!(DVec3::transform_diag(n), DVec3::new(0.6, 0.8, 0.0));
    }
}
