// crates/fv_config/src/solution.rs

//! 求解字典：逐场的线性求解器、松弛因子与外层算法控制

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::solver_controls::SolverControls;

/// 最终迭代使用的名称后缀
pub const FINAL_SUFFIX: &str = "Final";

/// 松弛因子
///
/// `fields` 用于显式场松弛（ψ = ψ_prev + α(ψ − ψ_prev)），
/// `equations` 用于方程隐式松弛。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelaxationFactors {
    /// 场松弛因子
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
    /// 方程松弛因子
    #[serde(default)]
    pub equations: BTreeMap<String, f64>,
}

impl RelaxationFactors {
    fn lookup(map: &BTreeMap<String, f64>, name: &str, final_iter: bool) -> f64 {
        if final_iter {
            map.get(&format!("{}{}", name, FINAL_SUFFIX))
                .copied()
                .unwrap_or(1.0)
        } else {
            map.get(name).copied().unwrap_or(1.0)
        }
    }

    /// 场松弛因子，未配置为 1
    pub fn field(&self, name: &str, final_iter: bool) -> f64 {
        Self::lookup(&self.fields, name, final_iter)
    }

    /// 方程松弛因子，未配置为 1
    pub fn equation(&self, name: &str, final_iter: bool) -> f64 {
        Self::lookup(&self.equations, name, final_iter)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (group, map) in [("fields", &self.fields), ("equations", &self.equations)] {
            for (name, &alpha) in map {
                if !(alpha > 0.0 && alpha <= 1.0) {
                    return Err(ConfigError::invalid(
                        format!("relaxation_factors.{}.{}", group, name),
                        alpha,
                        "松弛因子必须在 (0, 1] 内",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// 修正器残差控制（绝对 + 相对）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectorTolerance {
    /// 绝对容差
    pub tolerance: f64,
    /// 相对容差
    #[serde(alias = "relTol")]
    pub rel_tol: f64,
}

/// 外层算法控制（SIMPLE / PISO）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmControls {
    /// 非正交修正次数
    #[serde(default, alias = "nNonOrthogonalCorrectors")]
    pub n_non_orthogonal_correctors: usize,

    /// PISO 压力修正次数
    #[serde(default = "default_one", alias = "nCorrectors")]
    pub n_correctors: usize,

    /// 外层修正次数
    #[serde(default = "default_one", alias = "nOuterCorrectors")]
    pub n_outer_correctors: usize,

    /// 是否求解动量预测
    #[serde(default = "default_true", alias = "momentumPredictor")]
    pub momentum_predictor: bool,

    /// 参考压力单元
    #[serde(default, alias = "pRefCell")]
    pub p_ref_cell: Option<usize>,

    /// 参考压力值
    #[serde(default, alias = "pRefValue")]
    pub p_ref_value: f64,

    /// 封闭区域时修正通量以保证全局守恒
    #[serde(default)]
    pub closed_volume: bool,

    /// 稳态收敛判据：场名 → 初始残差容差
    #[serde(default, alias = "residualControl")]
    pub residual_control: BTreeMap<String, f64>,

    /// 外层修正收敛判据：场名 → 绝对/相对容差
    #[serde(default, alias = "outerCorrectorResidualControl")]
    pub outer_corrector_residual_control: BTreeMap<String, CorrectorTolerance>,
}

fn default_one() -> usize {
    1
}
fn default_true() -> bool {
    true
}

impl Default for AlgorithmControls {
    fn default() -> Self {
        Self {
            n_non_orthogonal_correctors: 0,
            n_correctors: default_one(),
            n_outer_correctors: default_one(),
            momentum_predictor: true,
            p_ref_cell: None,
            p_ref_value: 0.0,
            closed_volume: false,
            residual_control: BTreeMap::new(),
            outer_corrector_residual_control: BTreeMap::new(),
        }
    }
}

/// 求解字典
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FvSolution {
    /// 逐场线性求解控制，键为场名，`<name>Final` 用于最终迭代
    #[serde(default)]
    pub solvers: BTreeMap<String, SolverControls>,

    /// 松弛因子
    #[serde(default, alias = "relaxationFactors")]
    pub relaxation_factors: RelaxationFactors,

    /// 外层算法控制
    #[serde(default)]
    pub algorithm: AlgorithmControls,
}

impl FvSolution {
    /// 查找场的求解控制；最终迭代优先 `<name>Final`，否则退回 `<name>`
    pub fn solver_controls(&self, name: &str, final_iter: bool) -> Result<&SolverControls, ConfigError> {
        if final_iter {
            if let Some(c) = self.solvers.get(&format!("{}{}", name, FINAL_SUFFIX)) {
                return Ok(c);
            }
        }
        self.solvers
            .get(name)
            .ok_or_else(|| ConfigError::Missing(format!("solvers.{}", name)))
    }

    /// 设置场的求解控制
    pub fn set_solver(&mut self, name: impl Into<String>, controls: SolverControls) {
        self.solvers.insert(name.into(), controls);
    }

    /// 验证
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, c) in &self.solvers {
            c.validate(&format!("solvers.{}", name))?;
        }
        self.relaxation_factors.validate()?;

        let a = &self.algorithm;
        if a.n_correctors == 0 {
            return Err(ConfigError::invalid(
                "algorithm.n_correctors",
                a.n_correctors,
                "修正次数至少为 1",
            ));
        }
        if a.n_outer_correctors == 0 {
            return Err(ConfigError::invalid(
                "algorithm.n_outer_correctors",
                a.n_outer_correctors,
                "外层修正次数至少为 1",
            ));
        }
        for (name, &tol) in &a.residual_control {
            if !(tol >= 0.0) {
                return Err(ConfigError::invalid(
                    format!("algorithm.residual_control.{}", name),
                    tol,
                    "容差必须为非负",
                ));
            }
        }
        for (name, t) in &a.outer_corrector_residual_control {
            if !(t.tolerance >= 0.0) || !(t.rel_tol >= 0.0) {
                return Err(ConfigError::invalid(
                    format!("algorithm.outer_corrector_residual_control.{}", name),
                    format!("{}/{}", t.tolerance, t.rel_tol),
                    "容差必须为非负",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver_controls::SolverKind;

    #[test]
    fn test_final_lookup_falls_back() {
        let mut s = FvSolution::default();
        s.set_solver("p", SolverControls::new(SolverKind::Gamg, 1e-6).with_rel_tol(0.05));
        s.set_solver("pFinal", SolverControls::new(SolverKind::Gamg, 1e-6));
        s.set_solver("U", SolverControls::new(SolverKind::Smooth, 1e-5));

        assert_eq!(s.solver_controls("p", false).unwrap().rel_tol, 0.05);
        assert_eq!(s.solver_controls("p", true).unwrap().rel_tol, 0.0);
        assert_eq!(
            s.solver_controls("U", true).unwrap().solver,
            SolverKind::Smooth
        );
        assert!(s.solver_controls("k", false).is_err());
    }

    #[test]
    fn test_relaxation_defaults() {
        let mut r = RelaxationFactors::default();
        r.fields.insert("p".into(), 0.3);
        r.equations.insert("U".into(), 0.7);
        assert_eq!(r.field("p", false), 0.3);
        assert_eq!(r.field("p", true), 1.0);
        assert_eq!(r.equation("U", false), 0.7);
        assert_eq!(r.equation("T", false), 1.0);
    }

    #[test]
    fn test_invalid_relaxation() {
        let mut s = FvSolution::default();
        s.relaxation_factors.equations.insert("U".into(), 1.5);
        assert!(s.validate().is_err());
        s.relaxation_factors.equations.insert("U".into(), 0.0);
        assert!(s.validate().is_err());
        s.relaxation_factors.equations.insert("U".into(), 1.0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_algorithm_json() {
        let json = r#"{
            "solvers": { "p": { "solver": "PCG", "preconditioner": "DIC", "tolerance": 1e-8 } },
            "algorithm": {
                "nNonOrthogonalCorrectors": 2,
                "pRefCell": 0,
                "residualControl": { "p": 1e-4 }
            }
        }"#;
        let s: FvSolution = serde_json::from_str(json).unwrap();
        assert_eq!(s.algorithm.n_non_orthogonal_correctors, 2);
        assert_eq!(s.algorithm.p_ref_cell, Some(0));
        assert_eq!(s.algorithm.n_correctors, 1);
        assert!(s.algorithm.momentum_predictor);
        assert_eq!(s.algorithm.residual_control["p"], 1e-4);
        assert!(s.validate().is_ok());
    }
}
