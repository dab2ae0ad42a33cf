// crates/fv_numerics/src/solvers/pcg.rs

//! 预条件共轭梯度法
//!
//! 适用于对称（半）正定矩阵。

use super::preconditioners::{new_preconditioner, LduPreconditioner};
use super::{g_sum_prod, LduSolver, SolverContext, SolverPerformance};
use fv_foundation::FvResult;
use fv_runtime::RuntimeScalar;

/// PCG 求解器
pub struct PcgSolver<'a, S: RuntimeScalar> {
    ctx: SolverContext<'a, S>,
    preconditioner: Box<dyn LduPreconditioner<S> + 'a>,
}

impl<'a, S: RuntimeScalar> PcgSolver<'a, S> {
    /// 按控制参数中的预条件子创建
    pub fn new(ctx: SolverContext<'a, S>) -> FvResult<Self> {
        let preconditioner = new_preconditioner(ctx, ctx.controls.preconditioner)?;
        Ok(Self {
            ctx,
            preconditioner,
        })
    }
}

impl<S: RuntimeScalar> LduSolver<S> for PcgSolver<'_, S> {
    fn name(&self) -> &'static str {
        "PCG"
    }

    fn solve(&self, psi: &mut [S], source: &[S]) -> FvResult<SolverPerformance> {
        let ctx = &self.ctx;
        let comm = ctx.comm();
        let mut perf = SolverPerformance::new(self.name(), ctx.field);
        let (mut r_a, norm_factor) = ctx.initial_residual(psi, source, &mut perf)?;
        if perf.zero_initial_residual() {
            return Ok(perf);
        }

        let n = psi.len();
        let mut w_a = vec![S::ZERO; n];
        let mut p_a = vec![S::ZERO; n];
        let mut w_a_r_a = f64::GREAT;

        if ctx.keep_iterating(&mut perf) {
            loop {
                let w_a_r_a_old = w_a_r_a;

                self.preconditioner.precondition(&mut w_a, &r_a)?;
                w_a_r_a = g_sum_prod(comm, &w_a, &r_a)?;

                if perf.iterations == 0 {
                    p_a.copy_from_slice(&w_a);
                } else {
                    let beta = S::from_config(w_a_r_a / w_a_r_a_old);
                    for (p, &w) in p_a.iter_mut().zip(&w_a) {
                        *p = w + beta * *p;
                    }
                }

                ctx.matrix.amul(&p_a, ctx.interfaces, &mut w_a)?;
                let w_a_p_a = g_sum_prod(comm, &w_a, &p_a)?;

                if perf.check_singularity(w_a_p_a.abs() / norm_factor) {
                    break;
                }

                let alpha = S::from_config(w_a_r_a / w_a_p_a);
                for i in 0..n {
                    psi[i] += alpha * p_a[i];
                    r_a[i] -= alpha * w_a[i];
                }

                perf.final_residual = ctx.residual_norm(&r_a, norm_factor)?;
                perf.iterations += 1;
                ctx.trace(self.name(), &perf);

                if perf.check_divergence(ctx.controls)? || !ctx.keep_iterating(&mut perf) {
                    break;
                }
            }
        }

        Ok(perf)
    }
}
