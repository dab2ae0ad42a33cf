// crates/fv_numerics/src/solvers/preconditioners.rs

//! 预条件子
//!
//! 核心操作 `precondition`: w = M⁻¹ r。
//!
//! - DIC: 对角不完全 Cholesky，只修改对角元，适用于对称矩阵
//! - DILU: 对角不完全 LU，前代按 losort 顺序，回代按面逆序
//! - diagonal: Jacobi
//! - none: 恒等

use super::gamg::GamgSolver;
use super::SolverContext;
use crate::ldu::LduMatrix;
use fv_config::PreconditionerKind;
use fv_foundation::{FvError, FvResult};
use fv_runtime::RuntimeScalar;

/// 预条件子
pub trait LduPreconditioner<S: RuntimeScalar> {
    /// 名称
    fn name(&self) -> &'static str;

    /// w = M⁻¹ r
    fn precondition(&self, w: &mut [S], r: &[S]) -> FvResult<()>;
}

/// 按配置创建预条件子
pub fn new_preconditioner<'a, S: RuntimeScalar>(
    ctx: SolverContext<'a, S>,
    kind: PreconditionerKind,
) -> FvResult<Box<dyn LduPreconditioner<S> + 'a>> {
    if kind.requires_symmetric() && !ctx.matrix.is_symmetric() {
        return Err(FvError::invalid_config(
            format!("solvers.{}.preconditioner", ctx.field),
            kind.name(),
            "矩阵不对称, 应使用 DILU",
        ));
    }
    Ok(match kind {
        PreconditionerKind::Dic => Box::new(DicPreconditioner::new(ctx.matrix)),
        PreconditionerKind::Dilu => Box::new(DiluPreconditioner::new(ctx.matrix)),
        PreconditionerKind::Diagonal => Box::new(DiagonalPreconditioner::new(ctx.matrix)),
        PreconditionerKind::None => Box::new(NoPreconditioner),
        PreconditionerKind::Gamg => Box::new(GamgSolver::new(ctx)?),
    })
}

// =============================================================================
// DIC
// =============================================================================

/// 对角不完全 Cholesky
#[derive(Debug, Clone)]
pub struct DicPreconditioner<'a, S: RuntimeScalar> {
    matrix: &'a LduMatrix<S>,
    r_d: Vec<S>,
}

impl<'a, S: RuntimeScalar> DicPreconditioner<'a, S> {
    /// 计算对角元倒数
    pub fn new(matrix: &'a LduMatrix<S>) -> Self {
        let mut r_d = matrix.diag().to_vec();
        Self::calc_reciprocal_d(&mut r_d, matrix);
        Self { matrix, r_d }
    }

    /// rD[u] −= upper²/rD[l]，然后取倒数
    pub fn calc_reciprocal_d(r_d: &mut [S], matrix: &LduMatrix<S>) {
        let addr = matrix.addressing();
        let (l, u) = (addr.lower(), addr.upper());
        let upper = matrix.upper();
        for f in 0..upper.len() {
            r_d[u[f]] -= upper[f] * upper[f] / r_d[l[f]];
        }
        for d in r_d.iter_mut() {
            *d = S::ONE / *d;
        }
    }

    /// 用给定的对角倒数做前代回代
    pub(crate) fn apply(r_d: &[S], matrix: &LduMatrix<S>, w: &mut [S]) {
        let addr = matrix.addressing();
        let (l, u) = (addr.lower(), addr.upper());
        let upper = matrix.upper();
        for f in 0..upper.len() {
            w[u[f]] -= r_d[u[f]] * upper[f] * w[l[f]];
        }
        for f in (0..upper.len()).rev() {
            w[l[f]] -= r_d[l[f]] * upper[f] * w[u[f]];
        }
    }
}

impl<S: RuntimeScalar> LduPreconditioner<S> for DicPreconditioner<'_, S> {
    fn name(&self) -> &'static str {
        "DIC"
    }

    fn precondition(&self, w: &mut [S], r: &[S]) -> FvResult<()> {
        for ((wi, &ri), &di) in w.iter_mut().zip(r).zip(&self.r_d) {
            *wi = di * ri;
        }
        Self::apply(&self.r_d, self.matrix, w);
        Ok(())
    }
}

// =============================================================================
// DILU
// =============================================================================

/// 对角不完全 LU
#[derive(Debug, Clone)]
pub struct DiluPreconditioner<'a, S: RuntimeScalar> {
    matrix: &'a LduMatrix<S>,
    r_d: Vec<S>,
}

impl<'a, S: RuntimeScalar> DiluPreconditioner<'a, S> {
    /// 计算对角元倒数
    pub fn new(matrix: &'a LduMatrix<S>) -> Self {
        let mut r_d = matrix.diag().to_vec();
        Self::calc_reciprocal_d(&mut r_d, matrix);
        Self { matrix, r_d }
    }

    /// rD[u] −= upper·lower/rD[l]，然后取倒数
    pub fn calc_reciprocal_d(r_d: &mut [S], matrix: &LduMatrix<S>) {
        let addr = matrix.addressing();
        let (l, u) = (addr.lower(), addr.upper());
        let (lower, upper) = (matrix.lower(), matrix.upper());
        for f in 0..upper.len() {
            r_d[u[f]] -= upper[f] * lower[f] / r_d[l[f]];
        }
        for d in r_d.iter_mut() {
            *d = S::ONE / *d;
        }
    }

    pub(crate) fn apply(r_d: &[S], matrix: &LduMatrix<S>, w: &mut [S]) {
        let addr = matrix.addressing();
        let (l, u, losort) = (addr.lower(), addr.upper(), addr.losort());
        let (lower, upper) = (matrix.lower(), matrix.upper());
        for &f in losort {
            w[u[f]] -= r_d[u[f]] * lower[f] * w[l[f]];
        }
        for f in (0..upper.len()).rev() {
            w[l[f]] -= r_d[l[f]] * upper[f] * w[u[f]];
        }
    }
}

impl<S: RuntimeScalar> LduPreconditioner<S> for DiluPreconditioner<'_, S> {
    fn name(&self) -> &'static str {
        "DILU"
    }

    fn precondition(&self, w: &mut [S], r: &[S]) -> FvResult<()> {
        for ((wi, &ri), &di) in w.iter_mut().zip(r).zip(&self.r_d) {
            *wi = di * ri;
        }
        Self::apply(&self.r_d, self.matrix, w);
        Ok(())
    }
}

// =============================================================================
// 对角 / 无
// =============================================================================

/// Jacobi 预条件
#[derive(Debug, Clone)]
pub struct DiagonalPreconditioner<S: RuntimeScalar> {
    r_d: Vec<S>,
}

impl<S: RuntimeScalar> DiagonalPreconditioner<S> {
    /// 对角元倒数
    pub fn new(matrix: &LduMatrix<S>) -> Self {
        Self {
            r_d: matrix.diag().iter().map(|&d| S::ONE / d).collect(),
        }
    }
}

impl<S: RuntimeScalar> LduPreconditioner<S> for DiagonalPreconditioner<S> {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn precondition(&self, w: &mut [S], r: &[S]) -> FvResult<()> {
        for ((wi, &ri), &di) in w.iter_mut().zip(r).zip(&self.r_d) {
            *wi = di * ri;
        }
        Ok(())
    }
}

/// 恒等预条件
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreconditioner;

impl<S: RuntimeScalar> LduPreconditioner<S> for NoPreconditioner {
    fn name(&self) -> &'static str {
        "none"
    }

    fn precondition(&self, w: &mut [S], r: &[S]) -> FvResult<()> {
        w.copy_from_slice(r);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_mesh::LduAddressing;
    use std::sync::Arc;

    fn tridiag(n: usize, lower: f64, upper: f64) -> LduMatrix<f64> {
        let addr = Arc::new(
            LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect()).unwrap(),
        );
        LduMatrix::from_coeffs(addr, vec![4.0; n], vec![lower; n - 1], vec![upper; n - 1]).unwrap()
    }

    /// 三对角矩阵的不完全分解是精确分解，预条件即为直接求解
    #[test]
    fn test_dic_exact_on_tridiagonal() {
        let m = tridiag(5, -1.0, -1.0);
        let p = DicPreconditioner::new(&m);
        let b = vec![1.0, 2.0, 3.0, 2.0, 1.0];
        let mut x = vec![0.0; 5];
        p.precondition(&mut x, &b).unwrap();
        let mut ax = vec![0.0; 5];
        m.amul_internal(&x, &mut ax);
        for (a, b) in ax.iter().zip(&b) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_dilu_exact_on_asymmetric_tridiagonal() {
        let m = tridiag(6, -1.5, -0.5);
        let p = DiluPreconditioner::new(&m);
        let b = vec![1.0, 0.0, -2.0, 3.0, 0.5, 1.0];
        let mut x = vec![0.0; 6];
        p.precondition(&mut x, &b).unwrap();
        let mut ax = vec![0.0; 6];
        m.amul_internal(&x, &mut ax);
        for (a, b) in ax.iter().zip(&b) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_diagonal_preconditioner() {
        let m = tridiag(3, -1.0, -1.0);
        let p = DiagonalPreconditioner::new(&m);
        let mut w = vec![0.0; 3];
        p.precondition(&mut w, &[4.0, 8.0, 2.0]).unwrap();
        assert_eq!(w, vec![1.0, 2.0, 0.5]);
    }
}
