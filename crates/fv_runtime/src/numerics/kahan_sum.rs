// crates/fv_runtime/src/numerics/kahan_sum.rs

//! 补偿求和
//!
//! 残差归一化因子和场平均值在大网格上累加上万项，
//! 普通累加的舍入误差会直接反映到收敛判断里。

use crate::scalar::RuntimeScalar;

/// Kahan 补偿累加器
///
/// ```rust
/// use fv_runtime::numerics::KahanSum;
///
/// let total = KahanSum::sum_iter(std::iter::repeat(0.1f64).take(10));
/// assert!((total - 1.0).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum<S: RuntimeScalar> {
    sum: S,
    carry: S,
}

impl<S: RuntimeScalar> KahanSum<S> {
    /// 空累加器
    pub fn new() -> Self {
        Self {
            sum: S::ZERO,
            carry: S::ZERO,
        }
    }

    /// 累加一项
    #[inline]
    pub fn add(&mut self, value: S) {
        let y = value - self.carry;
        let t = self.sum + y;
        self.carry = (t - self.sum) - y;
        self.sum = t;
    }

    /// 当前和
    #[inline]
    pub fn value(&self) -> S {
        self.sum
    }

    /// 对迭代器求和
    pub fn sum_iter<I: IntoIterator<Item = S>>(iter: I) -> S {
        let mut acc = Self::new();
        iter.into_iter().for_each(|v| acc.add(v));
        acc.value()
    }
}
