// crates/fv_numerics/src/control/residuals.rs

//! 求解记录汇总与残差收敛判据

use crate::solvers::SolverPerformance;
use fv_config::{AlgorithmControls, CorrectorTolerance};
use fv_runtime::RuntimeScalar;
use serde::Serialize;
use std::collections::BTreeMap;

/// 一次外层迭代内各场的求解记录（按求解顺序）
#[derive(Debug, Clone, Default, Serialize)]
pub struct SolverPerformanceDict {
    records: BTreeMap<String, Vec<SolverPerformance>>,
}

impl SolverPerformanceDict {
    /// 空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次求解，键为记录中的场名
    pub fn insert(&mut self, perf: SolverPerformance) {
        self.records.entry(perf.field.clone()).or_default().push(perf);
    }

    /// 清空（新的外层迭代开始时）
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// 场的第一次求解
    pub fn first(&self, field: &str) -> Option<&SolverPerformance> {
        self.records.get(field).and_then(|r| r.first())
    }

    /// 场的最后一次求解
    pub fn last(&self, field: &str) -> Option<&SolverPerformance> {
        self.records.get(field).and_then(|r| r.last())
    }

    /// 场的全部求解
    pub fn get(&self, field: &str) -> &[SolverPerformance] {
        self.records.get(field).map_or(&[], Vec::as_slice)
    }

    /// 有记录的场名
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 残差判据
///
/// - 稳态：每个被检查场本次迭代第一次求解的初始残差低于容差
/// - 外层修正：绝对容差，或相对于第一次外层迭代初始残差的相对容差
///
/// 两者都要求至少检查到一个场。
#[derive(Debug, Clone, Default)]
pub struct ResidualControl {
    steady: BTreeMap<String, f64>,
    corrector: BTreeMap<String, CorrectorTolerance>,
    first_residuals: BTreeMap<String, f64>,
}

impl ResidualControl {
    /// 由算法控制读取判据
    pub fn new(controls: &AlgorithmControls) -> Self {
        Self {
            steady: controls.residual_control.clone(),
            corrector: controls.outer_corrector_residual_control.clone(),
            first_residuals: BTreeMap::new(),
        }
    }

    /// 是否配置了稳态判据
    pub fn has_steady_criteria(&self) -> bool {
        !self.steady.is_empty()
    }

    /// 是否配置了外层修正判据
    pub fn has_corrector_criteria(&self) -> bool {
        !self.corrector.is_empty()
    }

    /// 稳态收敛判据
    pub fn steady_satisfied(&self, dict: &SolverPerformanceDict) -> bool {
        let mut checked = false;
        let mut achieved = true;
        for (field, &tol) in &self.steady {
            if let Some(perf) = dict.first(field) {
                checked = true;
                let ok = perf.initial_residual < tol;
                log::debug!(
                    "residualControl {}: {:e} < {:e} = {}",
                    field,
                    perf.initial_residual,
                    tol,
                    ok
                );
                achieved &= ok;
            }
        }
        checked && achieved
    }

    /// 外层修正收敛判据；`first_iter` 时记录参考残差，只做绝对判断
    pub fn corrector_satisfied(&mut self, dict: &SolverPerformanceDict, first_iter: bool) -> bool {
        let mut checked = false;
        let mut achieved = true;
        for (field, tol) in &self.corrector {
            let Some(perf) = dict.first(field) else {
                continue;
            };
            checked = true;
            let residual = perf.initial_residual;
            if first_iter {
                self.first_residuals.insert(field.clone(), residual);
            }
            let abs_ok = residual < tol.tolerance;
            let rel_ok = !first_iter && {
                let first = self.first_residuals.get(field).copied().unwrap_or(residual);
                residual / (first + f64::ROOT_VSMALL) < tol.rel_tol
            };
            log::debug!(
                "outerCorrectorResidualControl {}: residual {:e}, abs {}, rel {}",
                field,
                residual,
                abs_ok,
                rel_ok
            );
            achieved &= abs_ok || rel_ok;
        }
        checked && achieved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perf(field: &str, initial: f64) -> SolverPerformance {
        let mut p = SolverPerformance::new("PCG", field);
        p.initial_residual = initial;
        p
    }

    #[test]
    fn test_dict_keeps_first_and_last() {
        let mut dict = SolverPerformanceDict::new();
        dict.insert(perf("p", 1.0));
        dict.insert(perf("p", 0.1));
        assert_eq!(dict.first("p").map(|p| p.initial_residual), Some(1.0));
        assert_eq!(dict.last("p").map(|p| p.initial_residual), Some(0.1));
        assert_eq!(dict.get("U").len(), 0);
    }

    #[test]
    fn test_steady_criteria_need_a_checked_field() {
        let mut controls = AlgorithmControls::default();
        controls.residual_control.insert("p".into(), 1e-3);
        let rc = ResidualControl::new(&controls);

        let mut dict = SolverPerformanceDict::new();
        assert!(!rc.steady_satisfied(&dict));
        dict.insert(perf("U", 1.0));
        assert!(!rc.steady_satisfied(&dict));
        dict.insert(perf("p", 1e-4));
        assert!(rc.steady_satisfied(&dict));
    }

    #[test]
    fn test_corrector_relative_criterion() {
        let mut controls = AlgorithmControls::default();
        controls.outer_corrector_residual_control.insert(
            "U".into(),
            CorrectorTolerance {
                tolerance: 1e-8,
                rel_tol: 0.1,
            },
        );
        let mut rc = ResidualControl::new(&controls);

        let mut dict = SolverPerformanceDict::new();
        dict.insert(perf("U", 1.0));
        assert!(!rc.corrector_satisfied(&dict, true));

        dict.clear();
        dict.insert(perf("U", 0.5));
        assert!(!rc.corrector_satisfied(&dict, false));

        dict.clear();
        dict.insert(perf("U", 0.05));
        assert!(rc.corrector_satisfied(&dict, false));
    }
}
