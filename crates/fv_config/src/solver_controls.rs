// crates/fv_config/src/solver_controls.rs

//! 线性求解器控制参数（逐场配置）
//!
//! 对应配置字典中 `solvers.<field>` 一项，例如
//!
//! ```json
//! { "solver": "PCG", "preconditioner": "DIC", "tolerance": 1e-8, "relTol": 0.01 }
//! ```
//!
//! 键名同时接受 snake_case 与常见的 camelCase 写法。

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry::named_kind;

named_kind! {
    /// 线性求解器类型
    pub enum SolverKind ("求解器") {
        /// 预条件共轭梯度（对称矩阵）
        Pcg => "PCG",
        /// 预条件稳定双共轭梯度（非对称矩阵）
        PBiCgStab => "PBiCGStab",
        /// 几何聚合代数多重网格
        Gamg => "GAMG",
        /// 光顺器迭代
        Smooth => "smoothSolver",
        /// 对角矩阵直接求解
        Diagonal => "diagonal",
    }
}

named_kind! {
    /// 预条件子类型
    pub enum PreconditionerKind ("预条件子") {
        /// 对角不完全 Cholesky（对称矩阵）
        Dic => "DIC",
        /// 对角不完全 LU
        Dilu => "DILU",
        /// 多重网格 V 循环
        Gamg => "GAMG",
        /// Jacobi 对角预条件
        Diagonal => "diagonal",
        /// 不做预条件
        None => "none",
    }
}

named_kind! {
    /// 光顺器类型（smoothSolver 与 GAMG 共用）
    pub enum SmootherKind ("光顺器") {
        /// Gauss-Seidel
        GaussSeidel => "GaussSeidel",
        /// 对称 Gauss-Seidel（前扫 + 回扫）
        SymGaussSeidel => "symGaussSeidel",
        /// DIC 光顺（对称矩阵）
        Dic => "DIC",
        /// DILU 光顺
        Dilu => "DILU",
    }
}

named_kind! {
    /// 残差范数
    pub enum ResidualNorm ("残差范数") {
        /// 归一化的绝对值和
        L1 => "L1",
        /// 归一化的平方和开方
        L2 => "L2",
    }
}

named_kind! {
    /// 发散处理策略
    pub enum DivergencePolicy ("发散策略") {
        /// 返回错误，终止运行
        Fatal => "fatal",
        /// 仅在求解记录中标记
        Report => "report",
    }
}

named_kind! {
    /// 耦合边界交换调度方式
    pub enum CommsType ("通信调度") {
        /// 每个边界依次发送并立即接收
        Blocking => "blocking",
        /// 先发送全部边界，再在等待点接收
        NonBlocking => "nonBlocking" | "non-blocking",
    }
}

impl Default for SolverKind {
    fn default() -> Self {
        Self::Pcg
    }
}

impl Default for PreconditionerKind {
    fn default() -> Self {
        Self::Dic
    }
}

impl Default for SmootherKind {
    fn default() -> Self {
        Self::GaussSeidel
    }
}

impl Default for ResidualNorm {
    fn default() -> Self {
        Self::L1
    }
}

impl Default for CommsType {
    fn default() -> Self {
        Self::Blocking
    }
}

impl Default for DivergencePolicy {
    fn default() -> Self {
        Self::Fatal
    }
}

impl SmootherKind {
    /// 是否只适用于对称矩阵
    pub fn requires_symmetric(self) -> bool {
        matches!(self, Self::Dic)
    }
}

impl PreconditionerKind {
    /// 是否只适用于对称矩阵
    pub fn requires_symmetric(self) -> bool {
        matches!(self, Self::Dic)
    }
}

/// GAMG 参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamgControls {
    /// 最粗层目标单元数
    #[serde(default = "default_coarsest_cells", alias = "nCellsInCoarsestLevel")]
    pub n_cells_in_coarsest_level: usize,

    /// 每层合并的配对轮数
    #[serde(default = "default_merge_levels", alias = "mergeLevels")]
    pub merge_levels: usize,

    /// 最大层数
    #[serde(default = "default_max_levels", alias = "maxLevels")]
    pub max_levels: usize,

    /// 前光顺次数
    #[serde(default, alias = "nPreSweeps")]
    pub n_pre_sweeps: usize,

    /// 后光顺次数
    #[serde(default = "default_post_sweeps", alias = "nPostSweeps")]
    pub n_post_sweeps: usize,

    /// 最粗层光顺次数（不直接求解时）
    #[serde(default = "default_finest_sweeps", alias = "nFinestSweeps")]
    pub n_finest_sweeps: usize,

    /// 最粗层是否直接求解（仅单进程有效）
    #[serde(default, alias = "directSolveCoarsest")]
    pub direct_solve_coarsest: bool,

    /// 最粗层迭代求解的相对容差
    #[serde(default = "default_coarsest_rel_tol")]
    pub coarsest_rel_tol: f64,

    /// 作为预条件子时每次应用的 V 循环数
    #[serde(default = "default_n_vcycles", alias = "nVcycles")]
    pub n_vcycles: usize,

    /// 光顺器
    #[serde(default)]
    pub smoother: SmootherKind,
}

fn default_coarsest_cells() -> usize {
    10
}
fn default_merge_levels() -> usize {
    1
}
fn default_max_levels() -> usize {
    50
}
fn default_post_sweeps() -> usize {
    2
}
fn default_finest_sweeps() -> usize {
    2
}
fn default_coarsest_rel_tol() -> f64 {
    1e-2
}
fn default_n_vcycles() -> usize {
    1
}

impl Default for GamgControls {
    fn default() -> Self {
        Self {
            n_cells_in_coarsest_level: default_coarsest_cells(),
            merge_levels: default_merge_levels(),
            max_levels: default_max_levels(),
            n_pre_sweeps: 0,
            n_post_sweeps: default_post_sweeps(),
            n_finest_sweeps: default_finest_sweeps(),
            direct_solve_coarsest: false,
            coarsest_rel_tol: default_coarsest_rel_tol(),
            n_vcycles: default_n_vcycles(),
            smoother: SmootherKind::default(),
        }
    }
}

/// 单个场的线性求解控制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverControls {
    /// 求解器
    #[serde(default)]
    pub solver: SolverKind,

    /// 预条件子（PCG/PBiCGStab 使用）
    #[serde(default)]
    pub preconditioner: PreconditionerKind,

    /// 光顺器（smoothSolver 使用）
    #[serde(default)]
    pub smoother: SmootherKind,

    /// 绝对容差
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// 相对容差（相对初始残差），0 表示不使用
    #[serde(default, alias = "relTol")]
    pub rel_tol: f64,

    /// 最大迭代数
    #[serde(default = "default_max_iter", alias = "maxIter")]
    pub max_iter: usize,

    /// 最小迭代数
    #[serde(default, alias = "minIter")]
    pub min_iter: usize,

    /// smoothSolver 每次残差检查之间的光顺次数
    #[serde(default = "default_n_sweeps", alias = "nSweeps")]
    pub n_sweeps: usize,

    /// 残差范数
    #[serde(default, alias = "residualNorm")]
    pub residual_norm: ResidualNorm,

    /// 发散判据：残差超过初始残差的此倍数视为发散
    #[serde(default = "default_divergence_factor", alias = "divergenceFactor")]
    pub divergence_factor: f64,

    /// 发散处理策略
    #[serde(default, alias = "divergencePolicy")]
    pub divergence_policy: DivergencePolicy,

    /// 逐次迭代输出 trace 日志
    #[serde(default)]
    pub verbose: bool,

    /// processor 边界交换调度
    #[serde(default, alias = "commsType")]
    pub comms_type: CommsType,

    /// GAMG 参数
    #[serde(default)]
    pub gamg: GamgControls,
}

fn default_tolerance() -> f64 {
    1e-6
}
fn default_max_iter() -> usize {
    1000
}
fn default_n_sweeps() -> usize {
    1
}
fn default_divergence_factor() -> f64 {
    1e10
}

impl Default for SolverControls {
    fn default() -> Self {
        Self {
            solver: SolverKind::default(),
            preconditioner: PreconditionerKind::default(),
            smoother: SmootherKind::default(),
            tolerance: default_tolerance(),
            rel_tol: 0.0,
            max_iter: default_max_iter(),
            min_iter: 0,
            n_sweeps: default_n_sweeps(),
            residual_norm: ResidualNorm::default(),
            divergence_factor: default_divergence_factor(),
            divergence_policy: DivergencePolicy::default(),
            verbose: false,
            comms_type: CommsType::default(),
            gamg: GamgControls::default(),
        }
    }
}

impl SolverControls {
    /// 以求解器与容差创建
    pub fn new(solver: SolverKind, tolerance: f64) -> Self {
        Self {
            solver,
            tolerance,
            ..Default::default()
        }
    }

    /// 设置预条件子
    pub fn with_preconditioner(mut self, preconditioner: PreconditionerKind) -> Self {
        self.preconditioner = preconditioner;
        self
    }

    /// 设置光顺器
    pub fn with_smoother(mut self, smoother: SmootherKind) -> Self {
        self.smoother = smoother;
        self
    }

    /// 设置交换调度
    pub fn with_comms_type(mut self, comms_type: CommsType) -> Self {
        self.comms_type = comms_type;
        self
    }

    /// 设置相对容差
    pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
        self.rel_tol = rel_tol;
        self
    }

    /// 设置最大、最小迭代数
    pub fn with_iterations(mut self, max_iter: usize, min_iter: usize) -> Self {
        self.max_iter = max_iter;
        self.min_iter = min_iter;
        self
    }

    /// 设置发散判据与策略
    pub fn with_divergence(mut self, factor: f64, policy: DivergencePolicy) -> Self {
        self.divergence_factor = factor;
        self.divergence_policy = policy;
        self
    }

    /// 验证参数，`key` 为报错时使用的配置路径前缀
    pub fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigError::invalid(
                format!("{}.tolerance", key),
                self.tolerance,
                "容差必须为非负有限值",
            ));
        }
        if !(0.0..1.0).contains(&self.rel_tol) {
            return Err(ConfigError::invalid(
                format!("{}.rel_tol", key),
                self.rel_tol,
                "相对容差必须在 [0, 1) 内",
            ));
        }
        if self.max_iter < self.min_iter {
            return Err(ConfigError::invalid(
                format!("{}.max_iter", key),
                self.max_iter,
                format!("最大迭代数不能小于最小迭代数 {}", self.min_iter),
            ));
        }
        if self.n_sweeps == 0 {
            return Err(ConfigError::invalid(
                format!("{}.n_sweeps", key),
                self.n_sweeps,
                "光顺次数至少为 1",
            ));
        }
        if !(self.divergence_factor > 1.0) {
            return Err(ConfigError::invalid(
                format!("{}.divergence_factor", key),
                self.divergence_factor,
                "发散倍数必须大于 1",
            ));
        }
        let g = &self.gamg;
        if g.n_cells_in_coarsest_level == 0 || g.merge_levels == 0 || g.max_levels == 0 {
            return Err(ConfigError::invalid(
                format!("{}.gamg", key),
                format!(
                    "{}/{}/{}",
                    g.n_cells_in_coarsest_level, g.merge_levels, g.max_levels
                ),
                "最粗层单元数、合并轮数与最大层数都必须为正",
            ));
        }
        if g.n_vcycles == 0 {
            return Err(ConfigError::invalid(
                format!("{}.gamg.n_vcycles", key),
                g.n_vcycles,
                "V 循环数至少为 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_controls_are_valid() {
        assert!(SolverControls::default().validate("solvers.p").is_ok());
    }

    #[test]
    fn test_parse_camel_case_keys() {
        let json = r#"{
            "solver": "PBiCGStab",
            "preconditioner": "DILU",
            "tolerance": 1e-7,
            "relTol": 0.1,
            "maxIter": 50,
            "minIter": 2
        }"#;
        let c: SolverControls = serde_json::from_str(json).unwrap();
        assert_eq!(c.solver, SolverKind::PBiCgStab);
        assert_eq!(c.preconditioner, PreconditionerKind::Dilu);
        assert_eq!(c.rel_tol, 0.1);
        assert_eq!(c.max_iter, 50);
        assert_eq!(c.min_iter, 2);
        assert_eq!(c.divergence_policy, DivergencePolicy::Fatal);
        assert_eq!(c.comms_type, CommsType::Blocking);
    }

    #[test]
    fn test_comms_type_selection() {
        let json = r#"{ "solver": "PCG", "commsType": "nonBlocking" }"#;
        let c: SolverControls = serde_json::from_str(json).unwrap();
        assert_eq!(c.comms_type, CommsType::NonBlocking);
        assert_eq!("non-blocking".parse::<CommsType>().unwrap(), CommsType::NonBlocking);
        assert!(CommsType::lookup("scheduled").is_err());
    }

    #[test]
    fn test_gamg_defaults_from_empty_block() {
        let g: GamgControls = serde_json::from_str("{}").unwrap();
        assert_eq!(g, GamgControls::default());
        assert_eq!(g.n_cells_in_coarsest_level, 10);
        assert_eq!(g.merge_levels, 1);
        assert_eq!(g.max_levels, 50);
        assert_eq!(g.n_post_sweeps, 2);
        assert_eq!(g.n_finest_sweeps, 2);
        assert_eq!(g.coarsest_rel_tol, 1e-2);
        assert_eq!(g.n_vcycles, 1);
    }

    #[test]
    fn test_unknown_solver_name_rejected() {
        let json = r#"{ "solver": "ICCG" }"#;
        let err = serde_json::from_str::<SolverControls>(json).unwrap_err();
        assert!(err.to_string().contains("ICCG"));
    }

    #[test]
    fn test_registry_lookup() {
        assert_eq!("GAMG".parse::<SolverKind>().unwrap(), SolverKind::Gamg);
        assert_eq!(PreconditionerKind::lookup("none").unwrap(), PreconditionerKind::None);
        assert!(SmootherKind::lookup("Jacobi").is_err());
        assert_eq!(SolverKind::Smooth.to_string(), "smoothSolver");
    }

    #[test]
    fn test_invalid_values() {
        let mut c = SolverControls::default();
        c.rel_tol = 1.5;
        assert!(c.validate("solvers.T").is_err());

        let c = SolverControls::default().with_iterations(1, 5);
        assert!(c.validate("solvers.T").is_err());

        let c = SolverControls::default().with_divergence(0.5, DivergencePolicy::Report);
        assert!(c.validate("solvers.T").is_err());
    }

    #[test]
    fn test_roundtrip() {
        let c = SolverControls::new(SolverKind::Gamg, 1e-8).with_rel_tol(0.05);
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"GAMG\""));
        let back: SolverControls = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
