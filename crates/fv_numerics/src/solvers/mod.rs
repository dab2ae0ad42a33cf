// crates/fv_numerics/src/solvers/mod.rs

//! LDU 线性求解器
//!
//! 所有求解器遵循同一流程：
//!
//! 1. 计算初始残差 r = b − Aψ 并按归一化因子缩放
//! 2. 初始残差恰好为零时直接返回（0 次迭代，收敛）
//! 3. 迭代直到满足绝对/相对容差且达到最小迭代数，或达到最大迭代数
//! 4. 每次迭代检查发散（非有限值或超过初始残差的安全倍数）
//!
//! 所有全局量（点积、范数、平均值）经通信器归约，各分区得到相同的迭代序列。
//!
//! # 求解器
//!
//! - [`PcgSolver`]: 预条件共轭梯度（对称）
//! - [`PBiCgStabSolver`]: 预条件稳定双共轭梯度（非对称）
//! - [`SmoothSolver`]: 光顺器迭代
//! - [`GamgSolver`]: 代数多重网格
//! - [`DiagonalSolver`]: 对角矩阵

pub mod diagonal;
pub mod gamg;
pub mod pbicgstab;
pub mod pcg;
pub mod performance;
pub mod preconditioners;
pub mod smooth;
pub mod smoothers;

pub use diagonal::DiagonalSolver;
pub use gamg::GamgSolver;
pub use pbicgstab::PBiCgStabSolver;
pub use pcg::PcgSolver;
pub use performance::SolverPerformance;
pub use preconditioners::{
    new_preconditioner, DicPreconditioner, DiagonalPreconditioner, DiluPreconditioner,
    LduPreconditioner, NoPreconditioner,
};
pub use smooth::SmoothSolver;
pub use smoothers::{
    new_smoother, GaussSeidelSmoother, LduSmoother, SmootherFactors, SymGaussSeidelSmoother,
};

use crate::ldu::{InterfaceSet, LduMatrix};
use fv_config::{ResidualNorm, SolverControls, SolverKind};
use fv_foundation::{FvError, FvResult};
use fv_mesh::Communicator;
use fv_runtime::numerics::{sum, sum_mag, sum_prod, sum_sqr};
use fv_runtime::RuntimeScalar;

/// 线性求解器
pub trait LduSolver<S: RuntimeScalar> {
    /// 名称（日志中使用）
    fn name(&self) -> &'static str;

    /// 求解 Aψ = b，ψ 输入初值、输出解
    fn solve(&self, psi: &mut [S], source: &[S]) -> FvResult<SolverPerformance>;
}

// =============================================================================
// 公共上下文
// =============================================================================

/// 求解器共用的矩阵、接口与控制参数
#[derive(Debug, Clone, Copy)]
pub struct SolverContext<'a, S: RuntimeScalar> {
    /// 场名
    pub field: &'a str,
    /// 矩阵
    pub matrix: &'a LduMatrix<S>,
    /// 耦合接口
    pub interfaces: &'a InterfaceSet<S>,
    /// 控制参数
    pub controls: &'a SolverControls,
}

impl<'a, S: RuntimeScalar> SolverContext<'a, S> {
    /// 构造
    pub fn new(
        field: &'a str,
        matrix: &'a LduMatrix<S>,
        interfaces: &'a InterfaceSet<S>,
        controls: &'a SolverControls,
    ) -> Self {
        Self {
            field,
            matrix,
            interfaces,
            controls,
        }
    }

    /// 通信器
    #[inline]
    pub fn comm(&self) -> &dyn Communicator {
        self.interfaces.comm()
    }

    /// 残差 r = b − Aψ
    pub fn residual(&self, psi: &[S], source: &[S], r: &mut [S]) -> FvResult<()> {
        self.matrix.residual(psi, source, self.interfaces, r)
    }

    /// 归一化因子
    ///
    /// 以全局平均 ψ̄ 为参考：Σ(|Aψ − Aψ̄| + |b − Aψ̄|) + small，
    /// 使残差与 ψ 的整体水平无关。
    pub fn norm_factor(&self, psi: &[S], source: &[S], a_psi: &[S]) -> FvResult<f64> {
        let x_ref = g_average(self.comm(), psi)?;
        let sum_a = self.matrix.sum_a(self.interfaces);
        let terms = a_psi
            .iter()
            .zip(source)
            .zip(&sum_a)
            .map(|((&ap, &b), &sa)| {
                let a_ref = sa * x_ref;
                (ap - a_ref).abs() + (b - a_ref).abs()
            });

        let local = match self.controls.residual_norm {
            ResidualNorm::L1 => terms.map(|t| t.as_f64()).sum::<f64>(),
            ResidualNorm::L2 => terms.map(|t| t.as_f64().powi(2)).sum::<f64>(),
        };
        let global = self.comm().all_reduce_sum(local)?;
        let nf = match self.controls.residual_norm {
            ResidualNorm::L1 => global,
            ResidualNorm::L2 => global.sqrt(),
        };
        Ok(nf + f64::SMALL)
    }

    /// 归一化残差
    pub fn residual_norm(&self, r: &[S], norm_factor: f64) -> FvResult<f64> {
        let raw = match self.controls.residual_norm {
            ResidualNorm::L1 => g_sum_mag(self.comm(), r)?,
            ResidualNorm::L2 => g_sum_sqr(self.comm(), r)?.sqrt(),
        };
        Ok(raw / norm_factor)
    }

    /// 计算初始残差，返回 (r, 归一化因子)
    pub fn initial_residual(
        &self,
        psi: &[S],
        source: &[S],
        perf: &mut SolverPerformance,
    ) -> FvResult<(Vec<S>, f64)> {
        let n = psi.len();
        FvError::check_size("source", self.matrix.n_cells(), source.len())?;
        FvError::check_size("psi", self.matrix.n_cells(), n)?;

        let mut a_psi = vec![S::ZERO; n];
        self.matrix.amul(psi, self.interfaces, &mut a_psi)?;
        let norm_factor = self.norm_factor(psi, source, &a_psi)?;

        let r: Vec<S> = source.iter().zip(&a_psi).map(|(&b, &ap)| b - ap).collect();
        perf.initial_residual = self.residual_norm(&r, norm_factor)?;
        perf.final_residual = perf.initial_residual;
        Ok((r, norm_factor))
    }

    /// 是否继续迭代
    pub fn keep_iterating(&self, perf: &mut SolverPerformance) -> bool {
        let converged = perf.check_convergence(self.controls.tolerance, self.controls.rel_tol);
        (perf.iterations < self.controls.max_iter && !converged)
            || perf.iterations < self.controls.min_iter
    }

    /// verbose 时逐次输出
    #[inline]
    pub fn trace(&self, solver: &str, perf: &SolverPerformance) {
        if self.controls.verbose {
            log::trace!(
                "{} {} iter {}: residual = {:.6e}",
                solver,
                self.field,
                perf.iterations,
                perf.final_residual
            );
        }
    }
}

// =============================================================================
// 全局归约
// =============================================================================

/// 全局点积
pub fn g_sum_prod<S: RuntimeScalar>(comm: &dyn Communicator, a: &[S], b: &[S]) -> FvResult<f64> {
    comm.all_reduce_sum(sum_prod(a, b).as_f64())
}

/// 全局平方和
pub fn g_sum_sqr<S: RuntimeScalar>(comm: &dyn Communicator, a: &[S]) -> FvResult<f64> {
    comm.all_reduce_sum(sum_sqr(a).as_f64())
}

/// 全局绝对值和
pub fn g_sum_mag<S: RuntimeScalar>(comm: &dyn Communicator, a: &[S]) -> FvResult<f64> {
    comm.all_reduce_sum(sum_mag(a).as_f64())
}

/// 全局平均值
pub fn g_average<S: RuntimeScalar>(comm: &dyn Communicator, a: &[S]) -> FvResult<S> {
    let total = comm.all_reduce_sum(sum(a).as_f64())?;
    let count = comm.all_reduce_sum(a.len() as f64)?;
    if count == 0.0 {
        return Ok(S::ZERO);
    }
    Ok(S::from_config(total / count))
}

// =============================================================================
// 工厂
// =============================================================================

/// 按配置创建求解器
pub fn new_solver<'a, S: RuntimeScalar>(
    ctx: SolverContext<'a, S>,
) -> FvResult<Box<dyn LduSolver<S> + 'a>> {
    let symmetric = ctx.matrix.is_symmetric();
    let solver: Box<dyn LduSolver<S> + 'a> = match ctx.controls.solver {
        SolverKind::Pcg => {
            if !symmetric {
                return Err(FvError::invalid_config(
                    format!("solvers.{}.solver", ctx.field),
                    "PCG",
                    "矩阵不对称, 应使用 PBiCGStab 或 smoothSolver",
                ));
            }
            Box::new(PcgSolver::new(ctx)?)
        }
        SolverKind::PBiCgStab => Box::new(PBiCgStabSolver::new(ctx)?),
        SolverKind::Smooth => Box::new(SmoothSolver::new(ctx)?),
        SolverKind::Gamg => Box::new(GamgSolver::new(ctx)?),
        SolverKind::Diagonal => Box::new(DiagonalSolver::new(ctx)?),
    };
    Ok(solver)
}

/// 按配置求解 Aψ = b
pub fn solve<S: RuntimeScalar>(
    field: &str,
    matrix: &LduMatrix<S>,
    interfaces: &InterfaceSet<S>,
    psi: &mut [S],
    source: &[S],
    controls: &SolverControls,
) -> FvResult<SolverPerformance> {
    let ctx = SolverContext::new(field, matrix, interfaces, controls);
    new_solver(ctx)?.solve(psi, source)
}
