// crates/fv_numerics/src/solvers/diagonal.rs

//! 对角矩阵直接求解：ψ = b / D

use super::{LduSolver, SolverContext, SolverPerformance};
use fv_foundation::{FvError, FvResult};
use fv_runtime::RuntimeScalar;

/// 对角求解器
///
/// 只用于无非对角元、耦合系数全为零的矩阵（如显式时间推进），
/// 构造时检查；不计算残差，记录为 0 次迭代、收敛。
#[derive(Debug, Clone, Copy)]
pub struct DiagonalSolver<'a, S: RuntimeScalar> {
    ctx: SolverContext<'a, S>,
}

impl<'a, S: RuntimeScalar> DiagonalSolver<'a, S> {
    /// 创建，矩阵含非对角元或耦合系数时报配置错误
    pub fn new(ctx: SolverContext<'a, S>) -> FvResult<Self> {
        let coupled = ctx
            .interfaces
            .iter()
            .any(|i| i.coeffs.iter().any(|&k| k != S::ZERO));
        if !ctx.matrix.is_diagonal() || coupled {
            return Err(FvError::invalid_config(
                format!("solvers.{}.solver", ctx.field),
                "diagonal",
                "矩阵含非对角元或耦合系数",
            ));
        }
        Ok(Self { ctx })
    }
}

impl<S: RuntimeScalar> LduSolver<S> for DiagonalSolver<'_, S> {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn solve(&self, psi: &mut [S], source: &[S]) -> FvResult<SolverPerformance> {
        let diag = self.ctx.matrix.diag();
        FvError::check_size("psi", diag.len(), psi.len())?;
        FvError::check_size("source", diag.len(), source.len())?;
        for ((p, &b), &d) in psi.iter_mut().zip(source).zip(diag) {
            *p = b / d;
        }
        let mut perf = SolverPerformance::new(self.name(), self.ctx.field);
        perf.converged = true;
        Ok(perf)
    }
}
