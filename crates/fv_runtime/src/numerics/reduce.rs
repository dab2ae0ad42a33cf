// crates/fv_runtime/src/numerics/reduce.rs

//! 本地向量归约
//!
//! 求解器中的点积、残差 L1/L2 范数都经过这里；开启 `parallel` 特性时用 rayon 并行。
//! 结果只是本进程的部分和，需要再经通信器做全局归约。

use super::kahan_sum::KahanSum;
use crate::scalar::RuntimeScalar;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// 点积 Σ aᵢbᵢ
#[cfg(not(feature = "parallel"))]
#[inline]
pub fn sum_prod<S: RuntimeScalar>(a: &[S], b: &[S]) -> S {
    debug_assert_eq!(a.len(), b.len(), "sum_prod: 长度不一致");
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
}

/// 点积 Σ aᵢbᵢ（并行版本）
#[cfg(feature = "parallel")]
#[inline]
pub fn sum_prod<S: RuntimeScalar>(a: &[S], b: &[S]) -> S {
    debug_assert_eq!(a.len(), b.len(), "sum_prod: 长度不一致");
    a.par_iter().zip(b.par_iter()).map(|(&x, &y)| x * y).sum()
}

/// 平方和 Σ aᵢ²
#[inline]
pub fn sum_sqr<S: RuntimeScalar>(a: &[S]) -> S {
    sum_prod(a, a)
}

/// 绝对值和 Σ |aᵢ|
#[inline]
pub fn sum_mag<S: RuntimeScalar>(a: &[S]) -> S {
    KahanSum::sum_iter(a.iter().map(|v| v.abs()))
}

/// 代数和 Σ aᵢ
#[inline]
pub fn sum<S: RuntimeScalar>(a: &[S]) -> S {
    KahanSum::sum_iter(a.iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_prod() {
        let a = [1.0f64, 2.0, 3.0];
        let b = [4.0f64, -5.0, 6.0];
        assert_eq!(sum_prod(&a, &b), 12.0);
        assert_eq!(sum_sqr(&a), 14.0);
    }

    #[test]
    fn test_sum_mag() {
        let a = [1.0f64, -2.0, 3.0];
        assert_eq!(sum_mag(&a), 6.0);
        assert_eq!(sum(&a), 2.0);
    }
}
