// crates/fv_numerics/src/solvers/performance.rs

//! 求解记录
//!
//! 每次线性求解返回一条记录：初始残差、最终残差、迭代数、是否收敛。
//! 未收敛只记录不报错；发散按配置返回错误或标记。

use fv_config::{DivergencePolicy, SolverControls};
use fv_foundation::{FvError, FvResult};
use fv_runtime::RuntimeScalar;
use serde::Serialize;
use std::fmt;

/// 线性求解记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverPerformance {
    /// 求解器名称
    pub solver: &'static str,
    /// 场名（矢量场带分量后缀）
    pub field: String,
    /// 初始残差
    pub initial_residual: f64,
    /// 最终残差
    pub final_residual: f64,
    /// 迭代次数
    pub iterations: usize,
    /// 是否收敛
    pub converged: bool,
    /// 是否奇异
    pub singular: bool,
    /// 是否被判为发散（仅 report 策略下出现）
    pub diverged: bool,
}

impl SolverPerformance {
    /// 新记录
    pub fn new(solver: &'static str, field: impl Into<String>) -> Self {
        Self {
            solver,
            field: field.into(),
            initial_residual: 0.0,
            final_residual: 0.0,
            iterations: 0,
            converged: false,
            singular: false,
            diverged: false,
        }
    }

    /// 按绝对/相对容差判断收敛
    pub fn check_convergence(&mut self, tolerance: f64, rel_tol: f64) -> bool {
        self.converged = self.final_residual < tolerance
            || (rel_tol > 0.0 && self.final_residual < rel_tol * self.initial_residual);
        self.converged
    }

    /// 初始残差恰好为零：不迭代，直接收敛
    pub fn zero_initial_residual(&mut self) -> bool {
        if self.initial_residual == 0.0 {
            self.final_residual = 0.0;
            self.converged = true;
        }
        self.initial_residual == 0.0
    }

    /// 奇异性检查
    pub fn check_singularity(&mut self, residual: f64) -> bool {
        self.singular = residual < f64::VSMALL;
        self.singular
    }

    /// 发散检查：非有限值或超过初始残差的安全倍数
    ///
    /// fatal 策略返回错误；report 策略标记记录并返回 `Ok(true)`，调用方应停止迭代。
    pub fn check_divergence(&mut self, controls: &SolverControls) -> FvResult<bool> {
        let r = self.final_residual;
        let diverged =
            !r.is_finite() || r > controls.divergence_factor * self.initial_residual;
        if !diverged {
            return Ok(false);
        }
        match controls.divergence_policy {
            DivergencePolicy::Fatal => Err(FvError::SolverDiverged {
                solver: self.solver,
                field: self.field.clone(),
                initial: self.initial_residual,
                residual: r,
                iterations: self.iterations,
            }),
            DivergencePolicy::Report => {
                self.diverged = true;
                self.converged = false;
                log::warn!(
                    "{}: {} 发散, 初始残差 {:e}, 当前残差 {:e}, 迭代 {}",
                    self.solver,
                    self.field,
                    self.initial_residual,
                    r,
                    self.iterations
                );
                Ok(true)
            }
        }
    }

    /// 合并分量记录：残差与迭代数取最大，收敛取与
    pub fn merge(&mut self, other: &Self) {
        self.initial_residual = self.initial_residual.max(other.initial_residual);
        self.final_residual = self.final_residual.max(other.final_residual);
        self.iterations = self.iterations.max(other.iterations);
        self.converged &= other.converged;
        self.singular |= other.singular;
        self.diverged |= other.diverged;
    }

    /// 输出一行求解信息
    pub fn log(&self) {
        log::info!("{}", self);
        if !self.converged && !self.diverged && !self.singular {
            log::warn!("{}: {} 在 {} 次迭代内未收敛", self.solver, self.field, self.iterations);
        }
    }
}

impl fmt::Display for SolverPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:  Solving for {}, Initial residual = {:e}, Final residual = {:e}, No Iterations {}",
            self.solver, self.field, self.initial_residual, self.final_residual, self.iterations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_config::SolverKind;

    #[test]
    fn test_convergence_criteria() {
        let mut p = SolverPerformance::new("PCG", "T");
        p.initial_residual = 1.0;
        p.final_residual = 0.05;
        assert!(!p.check_convergence(1e-6, 0.0));
        assert!(p.check_convergence(1e-6, 0.1));
        assert!(p.check_convergence(0.1, 0.0));
    }

    #[test]
    fn test_divergence_policy() {
        let mut p = SolverPerformance::new("PCG", "T");
        p.initial_residual = 1.0;
        p.final_residual = f64::NAN;

        let fatal = SolverControls::new(SolverKind::Pcg, 1e-6);
        assert!(matches!(
            p.check_divergence(&fatal),
            Err(FvError::SolverDiverged { .. })
        ));

        let report = fatal.with_divergence(1e3, DivergencePolicy::Report);
        assert!(p.check_divergence(&report).unwrap());
        assert!(p.diverged);

        p.final_residual = 10.0;
        p.diverged = false;
        assert!(!p.check_divergence(&report).unwrap());
    }

    #[test]
    fn test_merge_and_display() {
        let mut a = SolverPerformance::new("smoothSolver", "Ux");
        a.initial_residual = 0.3;
        a.final_residual = 1e-7;
        a.iterations = 3;
        a.converged = true;
        let mut b = a.clone();
        b.initial_residual = 0.5;
        b.iterations = 5;
        b.converged = false;
        a.merge(&b);
        assert_eq!(a.initial_residual, 0.5);
        assert_eq!(a.iterations, 5);
        assert!(!a.converged);
        assert!(a.to_string().contains("Solving for Ux"));
    }

    #[test]
    fn test_serialized_record_keeps_field_names() {
        let mut p = SolverPerformance::new("GAMG", "p");
        p.initial_residual = 1.0;
        p.final_residual = 1e-7;
        p.iterations = 12;
        p.converged = true;
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["solver"], "GAMG");
        assert_eq!(json["field"], "p");
        assert_eq!(json["iterations"], 12);
        assert_eq!(json["converged"], true);
    }
}
