// crates/fv_config/src/case.rs

//! 算例配置（命令行程序使用）
//!
//! 一个算例由网格描述、离散格式、求解字典、时间控制和少量物理参数组成，
//! 以 JSON 保存。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::registry::named_kind;
use crate::schemes::{ConvectionScheme, DdtKind, FvSchemes, InterpolationKind, LaplacianScheme, SnGradScheme};
use crate::solution::FvSolution;
use crate::solver_controls::{PreconditionerKind, SmootherKind, SolverControls, SolverKind};

named_kind! {
    /// 内置算例类型
    pub enum CaseKind ("算例类型") {
        /// 一维稳态/瞬态扩散
        Diffusion1d => "diffusion1d",
        /// 二维对流扩散
        Convection2d => "convection2d",
        /// 纯 Neumann 泊松方程（需要参考值）
        PoissonNeumann => "poissonNeumann" | "poisson-neumann",
        /// 顶盖驱动方腔（PISO）
        Cavity => "cavity",
    }
}

/// 结构化网格描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MeshSpec {
    /// 一维均匀网格，两端为 left/right 边界
    Line {
        /// 单元数
        n_cells: usize,
        /// 长度 [m]
        length: f64,
    },
    /// 一维周期网格，两端为 cyclic 边界
    PeriodicLine {
        /// 单元数
        n_cells: usize,
        /// 长度 [m]
        length: f64,
    },
    /// 二维矩形网格
    Rect {
        /// x 方向单元数
        nx: usize,
        /// y 方向单元数
        ny: usize,
        /// x 方向长度
        lx: f64,
        /// y 方向长度
        ly: f64,
    },
    /// 二维剪切变形网格（非正交）
    SkewedRect {
        /// x 方向单元数
        nx: usize,
        /// y 方向单元数
        ny: usize,
        /// x 方向长度
        lx: f64,
        /// y 方向长度
        ly: f64,
        /// 剪切系数，竖线倾斜 skew·y
        skew: f64,
    },
}

impl MeshSpec {
    /// 单元总数
    pub fn n_cells(&self) -> usize {
        match self {
            Self::Line { n_cells, .. } | Self::PeriodicLine { n_cells, .. } => *n_cells,
            Self::Rect { nx, ny, .. } | Self::SkewedRect { nx, ny, .. } => nx * ny,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (n, lengths) = match self {
            Self::Line { n_cells, length } | Self::PeriodicLine { n_cells, length } => {
                (*n_cells, vec![*length])
            }
            Self::Rect { nx, ny, lx, ly } | Self::SkewedRect { nx, ny, lx, ly, .. } => {
                (nx.min(ny).to_owned(), vec![*lx, *ly])
            }
        };
        if n == 0 {
            return Err(ConfigError::invalid("mesh", format!("{:?}", self), "单元数必须为正"));
        }
        if lengths.iter().any(|&l| !(l > 0.0)) {
            return Err(ConfigError::invalid("mesh", format!("{:?}", self), "长度必须为正"));
        }
        if let Self::PeriodicLine { n_cells, .. } = self {
            if *n_cells < 2 {
                return Err(ConfigError::invalid("mesh.n_cells", n_cells, "周期网格至少需要 2 个单元"));
            }
        }
        Ok(())
    }
}

/// 时间控制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeControls {
    /// 时间步长 [s]
    #[serde(default = "default_delta_t", alias = "deltaT")]
    pub delta_t: f64,
    /// 结束时间 [s]
    #[serde(default = "default_end_time", alias = "endTime")]
    pub end_time: f64,
}

fn default_delta_t() -> f64 {
    1.0
}
fn default_end_time() -> f64 {
    1.0
}

impl Default for TimeControls {
    fn default() -> Self {
        Self {
            delta_t: default_delta_t(),
            end_time: default_end_time(),
        }
    }
}

impl TimeControls {
    /// 时间步数（向上取整）
    pub fn n_steps(&self) -> usize {
        (self.end_time / self.delta_t - 1e-9).ceil().max(1.0) as usize
    }
}

/// 物理参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsParams {
    /// 扩散系数 [m²/s]
    #[serde(default = "default_diffusivity")]
    pub diffusivity: f64,
    /// 均匀输运速度 [m/s]
    #[serde(default = "default_velocity")]
    pub velocity: [f64; 3],
    /// 运动粘度 [m²/s]
    #[serde(default = "default_viscosity")]
    pub viscosity: f64,
    /// 顶盖速度 [m/s]
    #[serde(default = "default_one_f64")]
    pub lid_velocity: f64,
    /// 均匀体积源 [单位/s]
    #[serde(default)]
    pub source: f64,
    /// 左端（入口）值
    #[serde(default)]
    pub left_value: f64,
    /// 右端值
    #[serde(default = "default_right_value")]
    pub right_value: f64,
}

fn default_diffusivity() -> f64 {
    1.0
}
fn default_velocity() -> [f64; 3] {
    [1.0, 0.0, 0.0]
}
fn default_viscosity() -> f64 {
    0.01
}
fn default_one_f64() -> f64 {
    1.0
}
fn default_right_value() -> f64 {
    100.0
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            diffusivity: default_diffusivity(),
            velocity: default_velocity(),
            viscosity: default_viscosity(),
            lid_velocity: default_one_f64(),
            source: 0.0,
            left_value: 0.0,
            right_value: default_right_value(),
        }
    }
}

/// 算例配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseConfig {
    /// 算例名
    pub name: String,
    /// 算例类型
    pub kind: CaseKind,
    /// 网格
    pub mesh: MeshSpec,
    /// 分区数（> 1 时按单元编号均匀分块并行求解）
    #[serde(default = "default_n_ranks", alias = "nRanks")]
    pub n_ranks: usize,
    /// 离散格式
    #[serde(default)]
    pub schemes: FvSchemes,
    /// 求解字典
    #[serde(default)]
    pub solution: FvSolution,
    /// 时间控制
    #[serde(default)]
    pub time: TimeControls,
    /// 物理参数
    #[serde(default)]
    pub physics: PhysicsParams,
}

fn default_n_ranks() -> usize {
    1
}

impl CaseConfig {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// 从 JSON 字符串加载并验证
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: CaseConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mesh.validate()?;
        self.solution.validate()?;

        if !(self.time.delta_t > 0.0) || !(self.time.end_time > 0.0) {
            return Err(ConfigError::invalid(
                "time",
                format!("delta_t={}, end_time={}", self.time.delta_t, self.time.end_time),
                "时间步长与结束时间必须为正",
            ));
        }
        if self.physics.diffusivity < 0.0 || self.physics.viscosity < 0.0 {
            return Err(ConfigError::invalid(
                "physics",
                format!("diffusivity={}, viscosity={}", self.physics.diffusivity, self.physics.viscosity),
                "扩散系数与粘度不能为负",
            ));
        }
        if self.n_ranks == 0 || self.n_ranks > self.mesh.n_cells() {
            return Err(ConfigError::invalid(
                "n_ranks",
                self.n_ranks,
                format!("分区数必须在 1..={} 内", self.mesh.n_cells()),
            ));
        }
        if self.n_ranks > 1 && !matches!(self.kind, CaseKind::Diffusion1d | CaseKind::PoissonNeumann) {
            return Err(ConfigError::invalid(
                "n_ranks",
                self.n_ranks,
                format!("算例 {} 不支持分区求解", self.kind),
            ));
        }
        if self.kind == CaseKind::Cavity && !matches!(self.mesh, MeshSpec::Rect { .. }) {
            return Err(ConfigError::invalid("mesh", format!("{:?}", self.mesh), "方腔算例需要 rect 网格"));
        }
        Ok(())
    }

    /// 内置示例算例
    pub fn demo(kind: CaseKind) -> Self {
        let mut schemes = FvSchemes::default();
        let mut solution = FvSolution::default();
        let mut time = TimeControls::default();
        let mut physics = PhysicsParams::default();

        let mesh = match kind {
            CaseKind::Diffusion1d => {
                schemes.ddt = DdtKind::SteadyState;
                solution.set_solver(
                    "T",
                    SolverControls::new(SolverKind::Pcg, 1e-8)
                        .with_preconditioner(PreconditionerKind::Dic),
                );
                MeshSpec::Line { n_cells: 10, length: 1.0 }
            }
            CaseKind::Convection2d => {
                schemes.set_div("div(phi,T)", ConvectionScheme::new(InterpolationKind::VanLeer));
                solution.set_solver(
                    "T",
                    SolverControls::new(SolverKind::PBiCgStab, 1e-8)
                        .with_preconditioner(PreconditionerKind::Dilu),
                );
                time.delta_t = 0.01;
                time.end_time = 0.2;
                physics.diffusivity = 0.01;
                physics.velocity = [1.0, 0.5, 0.0];
                physics.left_value = 1.0;
                physics.right_value = 0.0;
                MeshSpec::Rect { nx: 20, ny: 20, lx: 1.0, ly: 1.0 }
            }
            CaseKind::PoissonNeumann => {
                schemes.ddt = DdtKind::SteadyState;
                schemes.laplacian = LaplacianScheme::new(SnGradScheme::Corrected);
                solution.set_solver(
                    "p",
                    SolverControls::new(SolverKind::Gamg, 1e-8).with_smoother(SmootherKind::GaussSeidel),
                );
                solution.algorithm.p_ref_cell = Some(0);
                solution.algorithm.n_non_orthogonal_correctors = 2;
                physics.source = 1.0;
                MeshSpec::SkewedRect { nx: 16, ny: 16, lx: 1.0, ly: 1.0, skew: 0.2 }
            }
            CaseKind::Cavity => {
                schemes.set_div("div(phi,U)", ConvectionScheme::LINEAR);
                solution.set_solver(
                    "p",
                    SolverControls::new(SolverKind::Pcg, 1e-6)
                        .with_preconditioner(PreconditionerKind::Dic)
                        .with_rel_tol(0.05),
                );
                solution.set_solver(
                    "pFinal",
                    SolverControls::new(SolverKind::Pcg, 1e-6).with_preconditioner(PreconditionerKind::Dic),
                );
                solution.set_solver(
                    "U",
                    SolverControls::new(SolverKind::Smooth, 1e-5).with_smoother(SmootherKind::SymGaussSeidel),
                );
                solution.algorithm.n_correctors = 2;
                solution.algorithm.p_ref_cell = Some(0);
                time.delta_t = 0.005;
                time.end_time = 0.1;
                MeshSpec::Rect { nx: 20, ny: 20, lx: 0.1, ly: 0.1 }
            }
        };

        Self {
            name: kind.name().to_string(),
            kind,
            mesh,
            n_ranks: 1,
            schemes,
            solution,
            time,
            physics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demos_validate() {
        for name in CaseKind::canonical_names() {
            let kind = CaseKind::lookup(name).unwrap();
            let case = CaseConfig::demo(kind);
            assert!(case.validate().is_ok(), "demo {} 无效", name);
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let case = CaseConfig::demo(CaseKind::PoissonNeumann);
        let json = serde_json::to_string_pretty(&case).unwrap();
        let back = CaseConfig::from_json_str(&json).unwrap();
        assert_eq!(back, case);
    }

    #[test]
    fn test_mesh_tag() {
        let json = r#"{ "type": "skewedRect", "nx": 4, "ny": 3, "lx": 1.0, "ly": 1.0, "skew": 0.1 }"#;
        let m: MeshSpec = serde_json::from_str(json).unwrap();
        assert_eq!(m.n_cells(), 12);
    }

    #[test]
    fn test_invalid_ranks() {
        let mut case = CaseConfig::demo(CaseKind::Cavity);
        case.n_ranks = 2;
        assert!(case.validate().is_err());

        let mut case = CaseConfig::demo(CaseKind::Diffusion1d);
        case.n_ranks = 11;
        assert!(case.validate().is_err());
        case.n_ranks = 2;
        assert!(case.validate().is_ok());
    }

    #[test]
    fn test_n_steps() {
        let t = TimeControls { delta_t: 0.1, end_time: 1.0 };
        assert_eq!(t.n_steps(), 10);
        let t = TimeControls { delta_t: 0.3, end_time: 1.0 };
        assert_eq!(t.n_steps(), 4);
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("fvkit_case_{}.json", std::process::id()));
        let case = CaseConfig::demo(CaseKind::Convection2d);
        case.save_to_file(&path).unwrap();
        let back = CaseConfig::from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back, case);

        assert!(matches!(
            CaseConfig::from_file(std::env::temp_dir().join("fvkit_missing_case.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
