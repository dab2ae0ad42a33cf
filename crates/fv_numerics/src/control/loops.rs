// crates/fv_numerics/src/control/loops.rs

//! SIMPLE / PISO 迭代控制
//!
//! 控制器只负责计数与收敛判断，方程的组装与求解由调用方完成：
//!
//! ```ignore
//! let mut simple = SimpleControl::new(&solution.algorithm, 500);
//! let mut dict = SolverPerformanceDict::new();
//! while simple.run(&mut dict) {
//!     // 动量预测、压力方程……
//!     for corr in simple.non_orth_correctors() {
//!         let perf = p_eqn.solve_with(&mut p, &solution, corr.is_final)?;
//!         dict.insert(perf);
//!     }
//! }
//! ```

use super::residuals::{ResidualControl, SolverPerformanceDict};
use fv_config::AlgorithmControls;

// ============================================================
// 修正步
// ============================================================

/// 非正交修正步（共 n + 1 次压力求解）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonOrthCorrector {
    /// 序号，从 0 开始
    pub index: usize,
    /// 是否最后一次
    pub is_final: bool,
}

/// PISO 压力修正步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PisoCorrector {
    /// 序号，从 0 开始
    pub index: usize,
    /// 是否最后一次
    pub is_final: bool,
}

/// `n` 次非正交修正对应的 n + 1 个求解步
pub fn non_orth_correctors(n: usize) -> impl Iterator<Item = NonOrthCorrector> {
    (0..=n).map(move |index| NonOrthCorrector {
        index,
        is_final: index == n,
    })
}

// ============================================================
// SIMPLE
// ============================================================

/// 稳态 SIMPLE 外层迭代
#[derive(Debug, Clone)]
pub struct SimpleControl {
    controls: AlgorithmControls,
    residuals: ResidualControl,
    max_iterations: usize,
    iteration: usize,
    converged: bool,
}

impl SimpleControl {
    /// 创建
    pub fn new(controls: &AlgorithmControls, max_iterations: usize) -> Self {
        Self {
            controls: controls.clone(),
            residuals: ResidualControl::new(controls),
            max_iterations,
            iteration: 0,
            converged: false,
        }
    }

    /// 推进一次迭代；已收敛或达到最大迭代数时返回 `false`
    ///
    /// 上一次迭代的求解记录在判断后清空。
    pub fn run(&mut self, dict: &mut SolverPerformanceDict) -> bool {
        if self.iteration > 0 && self.residuals.steady_satisfied(dict) {
            log::info!("SIMPLE 在 {} 次迭代后达到残差判据", self.iteration);
            self.converged = true;
            return false;
        }
        if self.iteration >= self.max_iterations {
            if self.residuals.has_steady_criteria() {
                log::warn!("SIMPLE 达到最大迭代数 {} 仍未收敛", self.max_iterations);
            }
            return false;
        }
        dict.clear();
        self.iteration += 1;
        log::debug!("SIMPLE 迭代 {}", self.iteration);
        true
    }

    /// 已完成的迭代数
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// 是否因残差判据停止
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// 是否求解动量预测
    pub fn momentum_predictor(&self) -> bool {
        self.controls.momentum_predictor
    }

    /// 非正交修正步
    pub fn non_orth_correctors(&self) -> impl Iterator<Item = NonOrthCorrector> {
        non_orth_correctors(self.controls.n_non_orthogonal_correctors)
    }

    /// 算法参数
    pub fn controls(&self) -> &AlgorithmControls {
        &self.controls
    }
}

// ============================================================
// PISO（带外层修正）
// ============================================================

/// 瞬态 PISO 控制：每个时间步内 nOuterCorrectors 次外层迭代，
/// 每次外层迭代内 nCorrectors 次压力修正
#[derive(Debug, Clone)]
pub struct PisoControl {
    controls: AlgorithmControls,
    residuals: ResidualControl,
    outer: usize,
}

impl PisoControl {
    /// 创建
    pub fn new(controls: &AlgorithmControls) -> Self {
        Self {
            controls: controls.clone(),
            residuals: ResidualControl::new(controls),
            outer: 0,
        }
    }

    /// 推进一次外层迭代；本时间步结束时返回 `false` 并复位计数
    pub fn outer_loop(&mut self, dict: &mut SolverPerformanceDict) -> bool {
        if self.outer > 0
            && self.residuals.has_corrector_criteria()
            && self.residuals.corrector_satisfied(dict, self.outer == 1)
        {
            log::info!("PISO 外层修正在 {} 次后达到残差判据", self.outer);
            self.outer = 0;
            return false;
        }
        if self.outer >= self.n_outer_correctors() {
            self.outer = 0;
            return false;
        }
        dict.clear();
        self.outer += 1;
        true
    }

    /// 当前外层迭代序号（从 1 开始，循环外为 0）
    pub fn outer_corrector(&self) -> usize {
        self.outer
    }

    /// 是否最后一次外层迭代
    pub fn final_outer(&self) -> bool {
        self.outer == self.n_outer_correctors()
    }

    /// 外层迭代次数
    pub fn n_outer_correctors(&self) -> usize {
        self.controls.n_outer_correctors.max(1)
    }

    /// 压力修正次数
    pub fn n_correctors(&self) -> usize {
        self.controls.n_correctors.max(1)
    }

    /// 是否求解动量预测
    pub fn momentum_predictor(&self) -> bool {
        self.controls.momentum_predictor
    }

    /// 压力修正步
    pub fn correctors(&self) -> impl Iterator<Item = PisoCorrector> {
        let n = self.n_correctors();
        (0..n).map(move |index| PisoCorrector {
            index,
            is_final: index + 1 == n,
        })
    }

    /// 非正交修正步
    pub fn non_orth_correctors(&self) -> impl Iterator<Item = NonOrthCorrector> {
        non_orth_correctors(self.controls.n_non_orthogonal_correctors)
    }

    /// 时间步内最后一次压力求解（使用 Final 求解设置）
    pub fn final_inner_iter(&self, corr: PisoCorrector, non_orth: NonOrthCorrector) -> bool {
        self.final_outer() && corr.is_final && non_orth.is_final
    }

    /// 算法参数
    pub fn controls(&self) -> &AlgorithmControls {
        &self.controls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::SolverPerformance;

    #[test]
    fn test_non_orth_runs_n_plus_one_times() {
        let steps: Vec<_> = non_orth_correctors(2).collect();
        assert_eq!(steps.len(), 3);
        assert!(!steps[0].is_final && !steps[1].is_final && steps[2].is_final);
        assert_eq!(non_orth_correctors(0).count(), 1);
    }

    #[test]
    fn test_simple_stops_at_max_iterations() {
        let mut simple = SimpleControl::new(&AlgorithmControls::default(), 3);
        let mut dict = SolverPerformanceDict::new();
        let mut count = 0;
        while simple.run(&mut dict) {
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(!simple.converged());
    }

    #[test]
    fn test_simple_stops_on_residual() {
        let mut controls = AlgorithmControls::default();
        controls.residual_control.insert("p".into(), 1e-3);
        let mut simple = SimpleControl::new(&controls, 100);
        let mut dict = SolverPerformanceDict::new();
        let mut residual = 1.0;
        while simple.run(&mut dict) {
            let mut perf = SolverPerformance::new("PCG", "p");
            perf.initial_residual = residual;
            dict.insert(perf);
            residual *= 0.1;
        }
        // 1, 0.1, 0.01, 0.001, 0.0001
        assert_eq!(simple.iteration(), 5);
        assert!(simple.converged());
    }

    #[test]
    fn test_piso_final_inner_iteration() {
        let controls = AlgorithmControls {
            n_correctors: 2,
            n_outer_correctors: 2,
            n_non_orthogonal_correctors: 1,
            ..AlgorithmControls::default()
        };
        let mut piso = PisoControl::new(&controls);
        let mut dict = SolverPerformanceDict::new();
        let mut finals = 0;
        let mut solves = 0;
        while piso.outer_loop(&mut dict) {
            for corr in piso.correctors() {
                for no in piso.non_orth_correctors() {
                    solves += 1;
                    if piso.final_inner_iter(corr, no) {
                        finals += 1;
                    }
                }
            }
        }
        assert_eq!(solves, 8);
        assert_eq!(finals, 1);
        assert_eq!(piso.outer_corrector(), 0);
    }
}
