// crates/fv_numerics/src/ldu/matrix.rs

//! LDU 稀疏矩阵
//!
//! 按面存储的结构对称稀疏矩阵：
//! - `diag[c]`: 单元 c 的对角元
//! - `upper[f]`: 行 l(f)、列 u(f) 的元素
//! - `lower[f]`: 行 u(f)、列 l(f) 的元素
//!
//! 耦合边界（cyclic/processor）的系数不在矩阵内，由 [`InterfaceSet`] 提供，
//! 乘法时统一按 `result[fc] -= coeff * ψ_nbr` 计入。

use super::interfaces::InterfaceSet;
use fv_foundation::{FvError, FvResult};
use fv_mesh::LduAddressing;
use fv_runtime::RuntimeScalar;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// LDU 矩阵
#[derive(Debug, Clone)]
pub struct LduMatrix<S: RuntimeScalar> {
    addressing: Arc<LduAddressing>,
    diag: Vec<S>,
    lower: Vec<S>,
    upper: Vec<S>,
}

/// 常用别名
pub type LduMatrixF64 = LduMatrix<f64>;

impl<S: RuntimeScalar> LduMatrix<S> {
    /// 零矩阵
    pub fn new(addressing: Arc<LduAddressing>) -> Self {
        let n = addressing.n_cells();
        let nf = addressing.n_faces();
        Self {
            addressing,
            diag: vec![S::ZERO; n],
            lower: vec![S::ZERO; nf],
            upper: vec![S::ZERO; nf],
        }
    }

    /// 由系数直接构造
    pub fn from_coeffs(
        addressing: Arc<LduAddressing>,
        diag: Vec<S>,
        lower: Vec<S>,
        upper: Vec<S>,
    ) -> FvResult<Self> {
        FvError::check_size("diag", addressing.n_cells(), diag.len())?;
        FvError::check_size("lower", addressing.n_faces(), lower.len())?;
        FvError::check_size("upper", addressing.n_faces(), upper.len())?;
        Ok(Self {
            addressing,
            diag,
            lower,
            upper,
        })
    }

    // =========================================================================
    // 访问
    // =========================================================================

    /// 寻址
    #[inline]
    pub fn addressing(&self) -> &LduAddressing {
        &self.addressing
    }

    /// 寻址句柄
    #[inline]
    pub fn addressing_handle(&self) -> Arc<LduAddressing> {
        Arc::clone(&self.addressing)
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.diag.len()
    }

    /// 内部面数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.upper.len()
    }

    /// 对角元
    #[inline]
    pub fn diag(&self) -> &[S] {
        &self.diag
    }

    /// 对角元（可写）
    #[inline]
    pub fn diag_mut(&mut self) -> &mut [S] {
        &mut self.diag
    }

    /// 下三角系数
    #[inline]
    pub fn lower(&self) -> &[S] {
        &self.lower
    }

    /// 下三角系数（可写）
    #[inline]
    pub fn lower_mut(&mut self) -> &mut [S] {
        &mut self.lower
    }

    /// 上三角系数
    #[inline]
    pub fn upper(&self) -> &[S] {
        &self.upper
    }

    /// 上三角系数（可写）
    #[inline]
    pub fn upper_mut(&mut self) -> &mut [S] {
        &mut self.upper
    }

    /// 数值是否对称
    pub fn is_symmetric(&self) -> bool {
        self.lower == self.upper
    }

    /// 是否只有对角元
    pub fn is_diagonal(&self) -> bool {
        self.lower.iter().chain(&self.upper).all(|v| *v == S::ZERO)
    }

    // =========================================================================
    // 组装
    // =========================================================================

    /// diag = −Σ 相邻非对角元（按列求和）
    pub fn neg_sum_diag(&mut self) {
        let (l, u) = (self.addressing.lower(), self.addressing.upper());
        for f in 0..self.upper.len() {
            self.diag[l[f]] -= self.lower[f];
            self.diag[u[f]] -= self.upper[f];
        }
    }

    /// 矩阵相加
    pub fn add_assign(&mut self, other: &Self) -> FvResult<()> {
        self.check_compatible(other)?;
        add_slices(&mut self.diag, &other.diag);
        add_slices(&mut self.lower, &other.lower);
        add_slices(&mut self.upper, &other.upper);
        Ok(())
    }

    /// 矩阵相减
    pub fn sub_assign(&mut self, other: &Self) -> FvResult<()> {
        self.check_compatible(other)?;
        for (a, b) in self.diag.iter_mut().zip(&other.diag) {
            *a -= *b;
        }
        for (a, b) in self.lower.iter_mut().zip(&other.lower) {
            *a -= *b;
        }
        for (a, b) in self.upper.iter_mut().zip(&other.upper) {
            *a -= *b;
        }
        Ok(())
    }

    /// 所有系数取负
    pub fn negate(&mut self) {
        for v in self.diag.iter_mut().chain(&mut self.lower).chain(&mut self.upper) {
            *v = -*v;
        }
    }

    /// 所有系数乘以常数
    pub fn scale(&mut self, factor: S) {
        for v in self.diag.iter_mut().chain(&mut self.lower).chain(&mut self.upper) {
            *v *= factor;
        }
    }

    fn check_compatible(&self, other: &Self) -> FvResult<()> {
        if !Arc::ptr_eq(&self.addressing, &other.addressing) && *self.addressing != *other.addressing
        {
            return Err(FvError::invalid_input("LDU 矩阵寻址不一致，不能相加"));
        }
        Ok(())
    }

    // =========================================================================
    // 运算
    // =========================================================================

    /// 内部部分乘法 Aψ（不含耦合边界）
    pub fn amul_internal(&self, psi: &[S], result: &mut [S]) {
        let (l, u) = (self.addressing.lower(), self.addressing.upper());
        mul_diag(&self.diag, psi, result);
        for f in 0..self.upper.len() {
            result[u[f]] += self.lower[f] * psi[l[f]];
            result[l[f]] += self.upper[f] * psi[u[f]];
        }
    }

    /// 完整乘法 Aψ，含耦合边界
    ///
    /// 非阻塞通信时先发出边界数据，内部乘法完成后再接收。
    pub fn amul(&self, psi: &[S], interfaces: &InterfaceSet<S>, result: &mut [S]) -> FvResult<()> {
        interfaces.init_update(psi)?;
        self.amul_internal(psi, result);
        interfaces.update(psi, result, -S::ONE)
    }

    /// 残差 r = b − Aψ，含耦合边界
    pub fn residual(
        &self,
        psi: &[S],
        source: &[S],
        interfaces: &InterfaceSet<S>,
        result: &mut [S],
    ) -> FvResult<()> {
        self.amul(psi, interfaces, result)?;
        for (r, b) in result.iter_mut().zip(source) {
            *r = *b - *r;
        }
        Ok(())
    }

    /// 行和（含耦合系数），等于 A 作用于全 1 场
    pub fn sum_a(&self, interfaces: &InterfaceSet<S>) -> Vec<S> {
        let (l, u) = (self.addressing.lower(), self.addressing.upper());
        let mut sum = self.diag.clone();
        for f in 0..self.upper.len() {
            sum[u[f]] += self.lower[f];
            sum[l[f]] += self.upper[f];
        }
        interfaces.sub_coeffs(&mut sum);
        sum
    }

    /// H 运算：−Σ 非对角元·ψ_nbr（不含耦合边界）
    pub fn h_op(&self, psi: &[S]) -> Vec<S> {
        let (l, u) = (self.addressing.lower(), self.addressing.upper());
        let mut h = vec![S::ZERO; self.diag.len()];
        for f in 0..self.upper.len() {
            h[u[f]] -= self.lower[f] * psi[l[f]];
            h[l[f]] -= self.upper[f] * psi[u[f]];
        }
        h
    }

    /// H1 运算：−Σ 非对角元
    pub fn h1(&self) -> Vec<S> {
        let (l, u) = (self.addressing.lower(), self.addressing.upper());
        let mut h1 = vec![S::ZERO; self.diag.len()];
        for f in 0..self.upper.len() {
            h1[u[f]] -= self.lower[f];
            h1[l[f]] -= self.upper[f];
        }
        h1
    }

    /// 内部面上的非对角通量 upper·ψ_u − lower·ψ_l
    pub fn face_h(&self, psi: &[S]) -> Vec<S> {
        let (l, u) = (self.addressing.lower(), self.addressing.upper());
        (0..self.upper.len())
            .map(|f| self.upper[f] * psi[u[f]] - self.lower[f] * psi[l[f]])
            .collect()
    }

    /// 每行非对角元绝对值之和
    pub fn sum_mag_off_diag(&self) -> Vec<S> {
        let (l, u) = (self.addressing.lower(), self.addressing.upper());
        let mut s = vec![S::ZERO; self.diag.len()];
        for f in 0..self.upper.len() {
            s[l[f]] += self.upper[f].abs();
            s[u[f]] += self.lower[f].abs();
        }
        s
    }
}

#[inline]
fn add_slices<S: RuntimeScalar>(a: &mut [S], b: &[S]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x += *y;
    }
}

#[cfg(not(feature = "parallel"))]
#[inline]
fn mul_diag<S: RuntimeScalar>(diag: &[S], psi: &[S], result: &mut [S]) {
    for ((r, d), p) in result.iter_mut().zip(diag).zip(psi) {
        *r = *d * *p;
    }
}

#[cfg(feature = "parallel")]
#[inline]
fn mul_diag<S: RuntimeScalar>(diag: &[S], psi: &[S], result: &mut [S]) {
    result
        .par_iter_mut()
        .zip(diag.par_iter())
        .zip(psi.par_iter())
        .for_each(|((r, d), p)| *r = *d * *p);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain3() -> LduMatrix<f64> {
        let addr = Arc::new(LduAddressing::new(3, vec![0, 1], vec![1, 2]).unwrap());
        LduMatrix::from_coeffs(addr, vec![2.0, 3.0, 4.0], vec![-1.0, -0.5], vec![-2.0, -1.5])
            .unwrap()
    }

    #[test]
    fn test_amul_internal() {
        let m = chain3();
        let mut r = vec![0.0; 3];
        m.amul_internal(&[1.0, 2.0, 3.0], &mut r);
        // 行0: 2*1 - 2*2 = -2; 行1: -1*1 + 3*2 - 1.5*3 = 0.5; 行2: -0.5*2 + 4*3 = 11
        assert_eq!(r, vec![-2.0, 0.5, 11.0]);
    }

    #[test]
    fn test_neg_sum_diag_gives_zero_row_sums() {
        let addr = Arc::new(LduAddressing::new(3, vec![0, 1], vec![1, 2]).unwrap());
        let mut m = LduMatrix::<f64>::new(addr);
        m.upper_mut().copy_from_slice(&[1.0, 2.0]);
        m.lower_mut().copy_from_slice(&[1.0, 2.0]);
        m.neg_sum_diag();
        let s = m.sum_a(&InterfaceSet::empty());
        assert!(s.iter().all(|v| v.abs() < 1e-15));
        assert!(m.is_symmetric());
    }

    #[test]
    fn test_h_and_face_h() {
        let m = chain3();
        let psi = [1.0, 2.0, 3.0];
        assert_eq!(m.h_op(&psi), vec![4.0, 5.5, 1.0]);
        assert_eq!(m.h1(), vec![2.0, 2.5, 0.5]);
        assert_eq!(m.face_h(&psi), vec![-2.0 * 2.0 + 1.0, -1.5 * 3.0 + 0.5 * 2.0]);
    }

    #[test]
    fn test_add_and_negate() {
        let mut a = chain3();
        let b = chain3();
        a.add_assign(&b).unwrap();
        assert_eq!(a.diag(), &[4.0, 6.0, 8.0]);
        a.negate();
        assert_eq!(a.upper(), &[4.0, 3.0]);
        a.sub_assign(&b).unwrap();
        assert_eq!(a.diag(), &[-6.0, -9.0, -12.0]);
    }
}
