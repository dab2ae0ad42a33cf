// crates/fv_numerics/src/solvers/smooth.rs

//! 光顺器迭代求解
//!
//! 每轮做 `n_sweeps` 次光顺后重新计算残差，迭代数按光顺次数累计。

use super::smoothers::{smoother_for, LduSmoother};
use super::{LduSolver, SolverContext, SolverPerformance};
use fv_foundation::FvResult;
use fv_runtime::RuntimeScalar;

/// smoothSolver
pub struct SmoothSolver<'a, S: RuntimeScalar> {
    ctx: SolverContext<'a, S>,
    smoother: Box<dyn LduSmoother<S> + 'a>,
}

impl<'a, S: RuntimeScalar> SmoothSolver<'a, S> {
    /// 按控制参数中的光顺器创建
    pub fn new(ctx: SolverContext<'a, S>) -> FvResult<Self> {
        let smoother = smoother_for(&ctx, ctx.controls.smoother)?;
        Ok(Self { ctx, smoother })
    }
}

impl<S: RuntimeScalar> LduSolver<S> for SmoothSolver<'_, S> {
    fn name(&self) -> &'static str {
        "smoothSolver"
    }

    fn solve(&self, psi: &mut [S], source: &[S]) -> FvResult<SolverPerformance> {
        let ctx = &self.ctx;
        let mut perf = SolverPerformance::new(self.name(), ctx.field);
        let (mut r_a, norm_factor) = ctx.initial_residual(psi, source, &mut perf)?;
        if perf.zero_initial_residual() {
            return Ok(perf);
        }

        let n_sweeps = ctx.controls.n_sweeps.max(1);
        while ctx.keep_iterating(&mut perf) {
            self.smoother.smooth(psi, source, n_sweeps)?;
            perf.iterations += n_sweeps;

            ctx.residual(psi, source, &mut r_a)?;
            perf.final_residual = ctx.residual_norm(&r_a, norm_factor)?;
            ctx.trace(self.name(), &perf);

            if perf.check_divergence(ctx.controls)? {
                break;
            }
        }

        Ok(perf)
    }
}
