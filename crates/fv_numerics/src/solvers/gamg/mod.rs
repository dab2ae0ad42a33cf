// crates/fv_numerics/src/solvers/gamg/mod.rs

//! 代数多重网格（GAMG）
//!
//! # 层次构造
//!
//! 以面权重 ½(|upper| + |lower|) 做成对聚合，粗矩阵由 Galerkin 投影得到：
//! 同一粗单元内的面系数并入对角，其余面系数累加到粗面上。
//! 耦合接口按单元映射粗化，系数不变。层数由全局单元数决定，
//! 各分区层数一致。
//!
//! # V 循环
//!
//! 前光顺 → 残差限制（求和）→ 粗层从零开始递归 → 延拓（分片常数）相加 → 后光顺。
//! 最粗层在单进程且 `direct_solve_coarsest` 时用稠密 LU，否则用 PCG/PBiCGStab
//! 迭代到 `coarsest_rel_tol`。
//!
//! 既可作为求解器（每次迭代一个 V 循环修正），也可作为预条件子
//! （从零开始做 `n_vcycles` 个 V 循环）。

pub mod agglomeration;
pub mod dense;

pub use agglomeration::{agglomerate, CoarseLevel, FaceRestrict};
pub use dense::DenseLu;

use super::preconditioners::LduPreconditioner;
use super::smoothers::SmootherFactors;
use super::{new_solver, LduSolver, SolverContext, SolverPerformance};
use crate::ldu::{InterfaceSet, LduMatrix};
use fv_config::{DivergencePolicy, PreconditionerKind, SolverControls, SolverKind};
use fv_foundation::FvResult;
use fv_runtime::RuntimeScalar;

const NAME: &str = "GAMG";

/// 一个粗层
#[derive(Debug, Clone)]
struct GamgLevel<S: RuntimeScalar> {
    /// 上一层单元 → 本层单元
    restrict_addr: Vec<usize>,
    matrix: LduMatrix<S>,
    interfaces: InterfaceSet<S>,
}

/// GAMG 求解器 / 预条件子
pub struct GamgSolver<'a, S: RuntimeScalar> {
    ctx: SolverContext<'a, S>,
    levels: Vec<GamgLevel<S>>,
    /// 除最粗层外各层的光顺数据，下标与层号一致
    smoothers: Vec<SmootherFactors<S>>,
    coarsest_lu: Option<DenseLu>,
    coarsest_controls: SolverControls,
}

impl<'a, S: RuntimeScalar> GamgSolver<'a, S> {
    /// 构造多重网格层次
    pub fn new(ctx: SolverContext<'a, S>) -> FvResult<Self> {
        let gamg = &ctx.controls.gamg;
        let comm = ctx.comm();
        let mut levels: Vec<GamgLevel<S>> = Vec::new();

        while levels.len() + 1 < gamg.max_levels {
            let (matrix, interfaces) = match levels.last() {
                Some(level) => (&level.matrix, &level.interfaces),
                None => (ctx.matrix, ctx.interfaces),
            };
            let n_fine = comm.all_reduce_sum(matrix.n_cells() as f64)?;
            if n_fine <= gamg.n_cells_in_coarsest_level as f64 {
                break;
            }

            let weights: Vec<f64> = matrix
                .upper()
                .iter()
                .zip(matrix.lower())
                .map(|(&u, &l)| 0.5 * (u.abs() + l.abs()).as_f64())
                .collect();
            let coarse = agglomerate(matrix.addressing(), &weights, gamg.merge_levels)?;

            let n_coarse = comm.all_reduce_sum(coarse.n_coarse() as f64)?;
            if n_coarse >= n_fine || n_coarse < gamg.n_cells_in_coarsest_level as f64 {
                break;
            }

            let level = GamgLevel {
                matrix: restrict_matrix(matrix, &coarse),
                interfaces: interfaces.restrict(&coarse.restrict_addr),
                restrict_addr: coarse.restrict_addr,
            };
            levels.push(level);
        }

        let smoothers = std::iter::once(ctx.matrix)
            .chain(levels.iter().map(|l| &l.matrix))
            .take(levels.len())
            .map(|m| SmootherFactors::new(ctx.field, m, gamg.smoother))
            .collect::<FvResult<Vec<_>>>()?;

        let (coarsest_matrix, coarsest_interfaces) = match levels.last() {
            Some(level) => (&level.matrix, &level.interfaces),
            None => (ctx.matrix, ctx.interfaces),
        };

        let coarsest_lu = if gamg.direct_solve_coarsest && !comm.is_parallel() {
            let lu = DenseLu::factorise(coarsest_matrix, coarsest_interfaces);
            if lu.is_none() {
                log::debug!("GAMG: {} 最粗层主元为零, 改用迭代求解", ctx.field);
            }
            lu
        } else {
            None
        };

        let coarsest_controls = {
            let (solver, preconditioner) = if coarsest_matrix.is_symmetric() {
                (SolverKind::Pcg, PreconditionerKind::Dic)
            } else {
                (SolverKind::PBiCgStab, PreconditionerKind::Dilu)
            };
            SolverControls::new(solver, 0.0)
                .with_preconditioner(preconditioner)
                .with_rel_tol(gamg.coarsest_rel_tol)
                .with_divergence(ctx.controls.divergence_factor, DivergencePolicy::Report)
        };

        log::debug!(
            "GAMG: {} 共 {} 层, 单元数 {} → {:?}",
            ctx.field,
            levels.len() + 1,
            ctx.matrix.n_cells(),
            levels.iter().map(|l| l.matrix.n_cells()).collect::<Vec<_>>()
        );

        Ok(Self {
            ctx,
            levels,
            smoothers,
            coarsest_lu,
            coarsest_controls,
        })
    }

    /// 层数（含最细层）
    pub fn n_levels(&self) -> usize {
        self.levels.len() + 1
    }

    /// 各层单元数
    pub fn level_sizes(&self) -> Vec<usize> {
        std::iter::once(self.ctx.matrix.n_cells())
            .chain(self.levels.iter().map(|l| l.matrix.n_cells()))
            .collect()
    }

    fn system(&self, level: usize) -> (&LduMatrix<S>, &InterfaceSet<S>) {
        match level {
            0 => (self.ctx.matrix, self.ctx.interfaces),
            k => (&self.levels[k - 1].matrix, &self.levels[k - 1].interfaces),
        }
    }

    fn v_cycle(&self, level: usize, psi: &mut [S], source: &[S]) -> FvResult<()> {
        if level == self.levels.len() {
            return self.solve_coarsest(psi, source);
        }

        let gamg = &self.ctx.controls.gamg;
        let (matrix, interfaces) = self.system(level);
        let smoother = &self.smoothers[level];

        if gamg.n_pre_sweeps > 0 {
            smoother.smooth(matrix, interfaces, psi, source, gamg.n_pre_sweeps)?;
        }

        let mut r = vec![S::ZERO; psi.len()];
        matrix.residual(psi, source, interfaces, &mut r)?;

        let coarse = &self.levels[level];
        let n_coarse = coarse.matrix.n_cells();
        let mut coarse_source = vec![S::ZERO; n_coarse];
        for (&cc, &ri) in coarse.restrict_addr.iter().zip(&r) {
            coarse_source[cc] += ri;
        }

        let mut coarse_psi = vec![S::ZERO; n_coarse];
        self.v_cycle(level + 1, &mut coarse_psi, &coarse_source)?;

        for (p, &cc) in psi.iter_mut().zip(&coarse.restrict_addr) {
            *p += coarse_psi[cc];
        }

        let n_post = if level == 0 {
            gamg.n_finest_sweeps
        } else {
            gamg.n_post_sweeps
        };
        if n_post > 0 {
            smoother.smooth(matrix, interfaces, psi, source, n_post)?;
        }
        Ok(())
    }

    fn solve_coarsest(&self, psi: &mut [S], source: &[S]) -> FvResult<()> {
        if let Some(lu) = &self.coarsest_lu {
            if lu.solve(psi, source) {
                return Ok(());
            }
            log::debug!("GAMG: {} 最粗层直接求解失败, 改用迭代求解", self.ctx.field);
        }
        let (matrix, interfaces) = self.system(self.levels.len());
        let ctx = SolverContext::new(self.ctx.field, matrix, interfaces, &self.coarsest_controls);
        new_solver(ctx)?.solve(psi, source)?;
        Ok(())
    }
}

/// Galerkin 粗矩阵
fn restrict_matrix<S: RuntimeScalar>(fine: &LduMatrix<S>, coarse: &CoarseLevel) -> LduMatrix<S> {
    let mut m = LduMatrix::new(std::sync::Arc::clone(&coarse.addressing));

    let diag = m.diag_mut();
    for (&cc, &d) in coarse.restrict_addr.iter().zip(fine.diag()) {
        diag[cc] += d;
    }

    for (f, target) in coarse.face_restrict.iter().enumerate() {
        let (u, l) = (fine.upper()[f], fine.lower()[f]);
        match *target {
            FaceRestrict::Diag(cc) => m.diag_mut()[cc] += u + l,
            FaceRestrict::Face { index, flipped } => {
                let (to_upper, to_lower) = if flipped { (l, u) } else { (u, l) };
                m.upper_mut()[index] += to_upper;
                m.lower_mut()[index] += to_lower;
            }
        }
    }
    m
}

impl<S: RuntimeScalar> LduSolver<S> for GamgSolver<'_, S> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn solve(&self, psi: &mut [S], source: &[S]) -> FvResult<SolverPerformance> {
        let ctx = &self.ctx;
        let mut perf = SolverPerformance::new(NAME, ctx.field);
        let (mut r_a, norm_factor) = ctx.initial_residual(psi, source, &mut perf)?;
        if perf.zero_initial_residual() {
            return Ok(perf);
        }

        let mut correction = vec![S::ZERO; psi.len()];
        while ctx.keep_iterating(&mut perf) {
            correction.fill(S::ZERO);
            self.v_cycle(0, &mut correction, &r_a)?;
            for (p, &c) in psi.iter_mut().zip(&correction) {
                *p += c;
            }

            ctx.residual(psi, source, &mut r_a)?;
            perf.final_residual = ctx.residual_norm(&r_a, norm_factor)?;
            perf.iterations += 1;
            ctx.trace(NAME, &perf);

            if perf.check_divergence(ctx.controls)? {
                break;
            }
        }

        Ok(perf)
    }
}

impl<S: RuntimeScalar> LduPreconditioner<S> for GamgSolver<'_, S> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn precondition(&self, w: &mut [S], r: &[S]) -> FvResult<()> {
        w.fill(S::ZERO);
        for _ in 0..self.ctx.controls.gamg.n_vcycles.max(1) {
            self.v_cycle(0, w, r)?;
        }
        Ok(())
    }
}
