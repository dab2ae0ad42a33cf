// crates/fv_numerics/src/solvers/pbicgstab.rs

//! 预条件稳定双共轭梯度法
//!
//! 适用于非对称矩阵（对流项）。影子残差取初始残差且保持不变。

use super::preconditioners::{new_preconditioner, LduPreconditioner};
use super::{g_sum_prod, g_sum_sqr, LduSolver, SolverContext, SolverPerformance};
use fv_foundation::FvResult;
use fv_runtime::RuntimeScalar;

/// PBiCGStab 求解器
pub struct PBiCgStabSolver<'a, S: RuntimeScalar> {
    ctx: SolverContext<'a, S>,
    preconditioner: Box<dyn LduPreconditioner<S> + 'a>,
}

impl<'a, S: RuntimeScalar> PBiCgStabSolver<'a, S> {
    /// 按控制参数中的预条件子创建
    pub fn new(ctx: SolverContext<'a, S>) -> FvResult<Self> {
        let preconditioner = new_preconditioner(ctx, ctx.controls.preconditioner)?;
        Ok(Self {
            ctx,
            preconditioner,
        })
    }
}

impl<S: RuntimeScalar> LduSolver<S> for PBiCgStabSolver<'_, S> {
    fn name(&self) -> &'static str {
        "PBiCGStab"
    }

    fn solve(&self, psi: &mut [S], source: &[S]) -> FvResult<SolverPerformance> {
        let ctx = &self.ctx;
        let comm = ctx.comm();
        let mut perf = SolverPerformance::new(self.name(), ctx.field);
        let (mut r_a, norm_factor) = ctx.initial_residual(psi, source, &mut perf)?;
        if perf.zero_initial_residual() || !ctx.keep_iterating(&mut perf) {
            return Ok(perf);
        }

        let n = psi.len();
        let r_a0 = r_a.clone();
        let mut p_a = vec![S::ZERO; n];
        let mut y_a = vec![S::ZERO; n];
        let mut ay_a = vec![S::ZERO; n];
        let mut s_a = vec![S::ZERO; n];
        let mut z_a = vec![S::ZERO; n];
        let mut t_a = vec![S::ZERO; n];

        let mut r_a0_r_a: f64 = 0.0;
        let mut alpha: f64 = 0.0;
        let mut omega: f64 = 0.0;

        loop {
            let r_a0_r_a_old = r_a0_r_a;
            r_a0_r_a = g_sum_prod(comm, &r_a0, &r_a)?;

            if perf.check_singularity(r_a0_r_a.abs() / norm_factor) {
                break;
            }

            if perf.iterations == 0 {
                p_a.copy_from_slice(&r_a);
            } else {
                if perf.check_singularity(omega.abs()) {
                    break;
                }
                let beta = S::from_config((r_a0_r_a / r_a0_r_a_old) * (alpha / omega));
                let om = S::from_config(omega);
                for i in 0..n {
                    p_a[i] = r_a[i] + beta * (p_a[i] - om * ay_a[i]);
                }
            }

            self.preconditioner.precondition(&mut y_a, &p_a)?;
            ctx.matrix.amul(&y_a, ctx.interfaces, &mut ay_a)?;
            let r_a0_ay_a = g_sum_prod(comm, &r_a0, &ay_a)?;
            if perf.check_singularity(r_a0_ay_a.abs() / norm_factor) {
                break;
            }
            alpha = r_a0_r_a / r_a0_ay_a;
            let al = S::from_config(alpha);

            for i in 0..n {
                s_a[i] = r_a[i] - al * ay_a[i];
            }

            // 中间残差已满足时只做半步更新
            perf.final_residual = ctx.residual_norm(&s_a, norm_factor)?;
            if perf.final_residual.is_finite()
                && perf.iterations + 1 >= ctx.controls.min_iter
                && perf.check_convergence(ctx.controls.tolerance, ctx.controls.rel_tol)
            {
                for (p, &y) in psi.iter_mut().zip(&y_a) {
                    *p += al * y;
                }
                perf.iterations += 1;
                ctx.trace(self.name(), &perf);
                break;
            }

            self.preconditioner.precondition(&mut z_a, &s_a)?;
            ctx.matrix.amul(&z_a, ctx.interfaces, &mut t_a)?;
            let t_a_t_a = g_sum_sqr(comm, &t_a)?;
            if t_a_t_a < f64::VSMALL {
                for (p, &y) in psi.iter_mut().zip(&y_a) {
                    *p += al * y;
                }
                perf.iterations += 1;
                break;
            }
            omega = g_sum_prod(comm, &t_a, &s_a)? / t_a_t_a;
            let om = S::from_config(omega);

            for i in 0..n {
                psi[i] += al * y_a[i] + om * z_a[i];
                r_a[i] = s_a[i] - om * t_a[i];
            }

            perf.final_residual = ctx.residual_norm(&r_a, norm_factor)?;
            perf.iterations += 1;
            ctx.trace(self.name(), &perf);

            if perf.check_divergence(ctx.controls)? || !ctx.keep_iterating(&mut perf) {
                break;
            }
        }

        Ok(perf)
    }
}
