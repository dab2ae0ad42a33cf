// crates/fv_numerics/src/solvers/smoothers.rs

//! 光顺器
//!
//! smoothSolver 与 GAMG 各层共用。Gauss-Seidel 类光顺把耦合边界
//! 贡献移到右端（b' = b + Σ coeff·ψ_nbr），每次扫描前交换一次；
//! DIC/DILU 光顺为 ψ += M⁻¹(b − Aψ)。

use super::preconditioners::{DicPreconditioner, DiluPreconditioner};
use super::SolverContext;
use crate::ldu::{InterfaceSet, LduMatrix};
use fv_config::SmootherKind;
use fv_foundation::{FvError, FvResult};
use fv_runtime::RuntimeScalar;

/// 光顺器
pub trait LduSmoother<S: RuntimeScalar> {
    /// 名称
    fn name(&self) -> &'static str;

    /// 做 `n_sweeps` 次光顺
    fn smooth(&self, psi: &mut [S], source: &[S], n_sweeps: usize) -> FvResult<()>;
}

/// 按配置创建光顺器
pub fn new_smoother<'a, S: RuntimeScalar>(
    field: &str,
    matrix: &'a LduMatrix<S>,
    interfaces: &'a InterfaceSet<S>,
    kind: SmootherKind,
) -> FvResult<Box<dyn LduSmoother<S> + 'a>> {
    let factors = SmootherFactors::new(field, matrix, kind)?;
    Ok(match kind {
        SmootherKind::GaussSeidel => Box::new(GaussSeidelSmoother::new(matrix, interfaces)),
        SmootherKind::SymGaussSeidel => Box::new(SymGaussSeidelSmoother::new(matrix, interfaces)),
        SmootherKind::Dic | SmootherKind::Dilu => Box::new(IluSmoother {
            matrix,
            interfaces,
            factors,
        }),
    })
}

/// 由求解上下文创建光顺器
pub(crate) fn smoother_for<'a, S: RuntimeScalar>(
    ctx: &SolverContext<'a, S>,
    kind: SmootherKind,
) -> FvResult<Box<dyn LduSmoother<S> + 'a>> {
    new_smoother(ctx.field, ctx.matrix, ctx.interfaces, kind)
}

// =============================================================================
// Gauss-Seidel
// =============================================================================

/// Gauss-Seidel 光顺器
#[derive(Debug, Clone, Copy)]
pub struct GaussSeidelSmoother<'a, S: RuntimeScalar> {
    matrix: &'a LduMatrix<S>,
    interfaces: &'a InterfaceSet<S>,
}

impl<'a, S: RuntimeScalar> GaussSeidelSmoother<'a, S> {
    /// 创建
    pub fn new(matrix: &'a LduMatrix<S>, interfaces: &'a InterfaceSet<S>) -> Self {
        Self { matrix, interfaces }
    }
}

/// b' = b + Σ coeff·ψ_nbr
fn b_prime<S: RuntimeScalar>(
    interfaces: &InterfaceSet<S>,
    psi: &[S],
    source: &[S],
    b: &mut [S],
) -> FvResult<()> {
    b.copy_from_slice(source);
    interfaces.apply(psi, b, S::ONE)
}

/// 按单元升序扫描一次，b' 中累积已更新单元的下三角贡献
fn forward_sweep<S: RuntimeScalar>(matrix: &LduMatrix<S>, psi: &mut [S], b: &mut [S]) {
    let addr = matrix.addressing();
    let (u, own_start) = (addr.upper(), addr.owner_start());
    let (diag, lower, upper) = (matrix.diag(), matrix.lower(), matrix.upper());

    for c in 0..diag.len() {
        let faces = own_start[c]..own_start[c + 1];
        let mut psi_c = b[c];
        for f in faces.clone() {
            psi_c -= upper[f] * psi[u[f]];
        }
        psi_c /= diag[c];
        for f in faces {
            b[u[f]] -= lower[f] * psi_c;
        }
        psi[c] = psi_c;
    }
}

impl<S: RuntimeScalar> LduSmoother<S> for GaussSeidelSmoother<'_, S> {
    fn name(&self) -> &'static str {
        "GaussSeidel"
    }

    fn smooth(&self, psi: &mut [S], source: &[S], n_sweeps: usize) -> FvResult<()> {
        gauss_seidel(self.matrix, self.interfaces, psi, source, n_sweeps)
    }
}

fn gauss_seidel<S: RuntimeScalar>(
    matrix: &LduMatrix<S>,
    interfaces: &InterfaceSet<S>,
    psi: &mut [S],
    source: &[S],
    n_sweeps: usize,
) -> FvResult<()> {
    let mut b = vec![S::ZERO; psi.len()];
    for _ in 0..n_sweeps {
        b_prime(interfaces, psi, source, &mut b)?;
        forward_sweep(matrix, psi, &mut b);
    }
    Ok(())
}

// =============================================================================
// 对称 Gauss-Seidel
// =============================================================================

/// 对称 Gauss-Seidel 光顺器：前扫后紧跟回扫
#[derive(Debug, Clone, Copy)]
pub struct SymGaussSeidelSmoother<'a, S: RuntimeScalar> {
    matrix: &'a LduMatrix<S>,
    interfaces: &'a InterfaceSet<S>,
}

impl<'a, S: RuntimeScalar> SymGaussSeidelSmoother<'a, S> {
    /// 创建
    pub fn new(matrix: &'a LduMatrix<S>, interfaces: &'a InterfaceSet<S>) -> Self {
        Self { matrix, interfaces }
    }
}

impl<S: RuntimeScalar> LduSmoother<S> for SymGaussSeidelSmoother<'_, S> {
    fn name(&self) -> &'static str {
        "symGaussSeidel"
    }

    fn smooth(&self, psi: &mut [S], source: &[S], n_sweeps: usize) -> FvResult<()> {
        sym_gauss_seidel(self.matrix, self.interfaces, psi, source, n_sweeps)
    }
}

fn sym_gauss_seidel<S: RuntimeScalar>(
    matrix: &LduMatrix<S>,
    interfaces: &InterfaceSet<S>,
    psi: &mut [S],
    source: &[S],
    n_sweeps: usize,
) -> FvResult<()> {
    let addr = matrix.addressing();
    let (u, own_start) = (addr.upper(), addr.owner_start());
    let (diag, lower, upper) = (matrix.diag(), matrix.lower(), matrix.upper());
    let mut b = vec![S::ZERO; psi.len()];

    for _ in 0..n_sweeps {
        b_prime(interfaces, psi, source, &mut b)?;
        forward_sweep(matrix, psi, &mut b);

        // 回扫：b' 保留前扫累积的下三角贡献
        for c in (0..diag.len()).rev() {
            let faces = own_start[c]..own_start[c + 1];
            let mut psi_c = b[c];
            for f in faces.clone() {
                psi_c -= upper[f] * psi[u[f]];
            }
            psi_c /= diag[c];
            for f in faces {
                b[u[f]] -= lower[f] * psi_c;
            }
            psi[c] = psi_c;
        }
    }
    Ok(())
}

// =============================================================================
// 预计算数据
// =============================================================================

/// 光顺器的预计算数据
///
/// 不借用矩阵，可随矩阵一起保存；DIC/DILU 的对角倒数只在构造时分解一次。
#[derive(Debug, Clone)]
pub struct SmootherFactors<S: RuntimeScalar> {
    kind: SmootherKind,
    r_d: Vec<S>,
}

impl<S: RuntimeScalar> SmootherFactors<S> {
    /// 检查对称性要求并分解
    pub fn new(field: &str, matrix: &LduMatrix<S>, kind: SmootherKind) -> FvResult<Self> {
        if kind.requires_symmetric() && !matrix.is_symmetric() {
            return Err(FvError::invalid_config(
                format!("solvers.{}.smoother", field),
                kind.name(),
                "矩阵不对称, 应使用 DILU 或 GaussSeidel",
            ));
        }
        let r_d = match kind {
            SmootherKind::GaussSeidel | SmootherKind::SymGaussSeidel => Vec::new(),
            SmootherKind::Dic => {
                let mut r_d = matrix.diag().to_vec();
                DicPreconditioner::calc_reciprocal_d(&mut r_d, matrix);
                r_d
            }
            SmootherKind::Dilu => {
                let mut r_d = matrix.diag().to_vec();
                DiluPreconditioner::calc_reciprocal_d(&mut r_d, matrix);
                r_d
            }
        };
        Ok(Self { kind, r_d })
    }

    /// 光顺器类型
    #[inline]
    pub fn kind(&self) -> SmootherKind {
        self.kind
    }

    /// 对构造时所用的矩阵做 `n_sweeps` 次光顺
    pub fn smooth(
        &self,
        matrix: &LduMatrix<S>,
        interfaces: &InterfaceSet<S>,
        psi: &mut [S],
        source: &[S],
        n_sweeps: usize,
    ) -> FvResult<()> {
        match self.kind {
            SmootherKind::GaussSeidel => gauss_seidel(matrix, interfaces, psi, source, n_sweeps),
            SmootherKind::SymGaussSeidel => {
                sym_gauss_seidel(matrix, interfaces, psi, source, n_sweeps)
            }
            SmootherKind::Dic | SmootherKind::Dilu => {
                let mut r = vec![S::ZERO; psi.len()];
                for _ in 0..n_sweeps {
                    matrix.residual(psi, source, interfaces, &mut r)?;
                    for (ri, &d) in r.iter_mut().zip(&self.r_d) {
                        *ri *= d;
                    }
                    if self.kind == SmootherKind::Dic {
                        DicPreconditioner::apply(&self.r_d, matrix, &mut r);
                    } else {
                        DiluPreconditioner::apply(&self.r_d, matrix, &mut r);
                    }
                    for (p, ri) in psi.iter_mut().zip(&r) {
                        *p += *ri;
                    }
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// DIC / DILU
// =============================================================================

/// 不完全分解光顺器：ψ += M⁻¹(b − Aψ)
#[derive(Debug, Clone)]
pub struct IluSmoother<'a, S: RuntimeScalar> {
    matrix: &'a LduMatrix<S>,
    interfaces: &'a InterfaceSet<S>,
    factors: SmootherFactors<S>,
}

impl<S: RuntimeScalar> LduSmoother<S> for IluSmoother<'_, S> {
    fn name(&self) -> &'static str {
        self.factors.kind.name()
    }

    fn smooth(&self, psi: &mut [S], source: &[S], n_sweeps: usize) -> FvResult<()> {
        self.factors.smooth(self.matrix, self.interfaces, psi, source, n_sweeps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_mesh::LduAddressing;
    use std::sync::Arc;

    fn laplace_1d(n: usize) -> LduMatrix<f64> {
        let addr = Arc::new(
            LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect()).unwrap(),
        );
        let mut diag = vec![2.0; n];
        diag[0] = 3.0;
        diag[n - 1] = 3.0;
        LduMatrix::from_coeffs(addr, diag, vec![-1.0; n - 1], vec![-1.0; n - 1]).unwrap()
    }

    fn residual_l1(m: &LduMatrix<f64>, psi: &[f64], b: &[f64]) -> f64 {
        let mut r = vec![0.0; psi.len()];
        m.residual(psi, b, &InterfaceSet::empty(), &mut r).unwrap();
        r.iter().map(|v| v.abs()).sum()
    }

    #[test]
    fn test_smoothers_reduce_residual() {
        let m = laplace_1d(8);
        let empty = InterfaceSet::empty();
        let b = vec![1.0; 8];
        let r0 = residual_l1(&m, &[0.0; 8], &b);

        for kind in [
            SmootherKind::GaussSeidel,
            SmootherKind::SymGaussSeidel,
            SmootherKind::Dic,
            SmootherKind::Dilu,
        ] {
            let s = new_smoother("T", &m, &empty, kind).unwrap();
            let mut psi = vec![0.0; 8];
            s.smooth(&mut psi, &b, 5).unwrap();
            assert!(residual_l1(&m, &psi, &b) < 0.5 * r0, "{} 未降低残差", s.name());
        }
    }

    #[test]
    fn test_gauss_seidel_first_sweep() {
        let m = laplace_1d(3);
        let interfaces = InterfaceSet::empty();
        let s = GaussSeidelSmoother::new(&m, &interfaces);
        let mut psi = vec![0.0; 3];
        s.smooth(&mut psi, &[3.0, 2.0, 3.0], 1).unwrap();
        // ψ0 = 3/3 = 1; ψ1 = (2 + 1)/2 = 1.5; ψ2 = (3 + 1.5)/3 = 1.5
        assert_eq!(psi, vec![1.0, 1.5, 1.5]);
    }

    #[test]
    fn test_dic_smoother_rejects_asymmetric() {
        let mut m = laplace_1d(3);
        m.lower_mut()[0] = -0.5;
        let empty = InterfaceSet::empty();
        assert!(new_smoother("T", &m, &empty, SmootherKind::Dic).is_err());
        assert!(new_smoother("T", &m, &empty, SmootherKind::Dilu).is_ok());
    }
}
