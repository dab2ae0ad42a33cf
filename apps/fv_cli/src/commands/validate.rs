// apps/fv_cli/src/commands/validate.rs

//! 算例验证命令
//!
//! 先做配置本身的合法性检查（错误），再做与算例类型相关的一致性检查（警告），
//! 例如非对称方程选了 PCG、非正交网格没有非正交修正。

use anyhow::{bail, Result};
use clap::Args;
use fv_config::{
    CaseConfig, CaseKind, ConfigError, MeshSpec, PreconditionerKind, SmootherKind, SolverKind,
};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 算例文件（JSON）
    pub case: Option<PathBuf>,

    /// 内置算例
    #[arg(short, long)]
    pub demo: Option<String>,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn is_ok_strict(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== FvKit 算例验证 ===");

    let mut result = ValidationResult::default();
    match super::load_case(args.case.as_ref(), args.demo.as_deref()) {
        Ok(case) => check_case(&case, &mut result),
        Err(e) => match e.downcast_ref::<ConfigError>() {
            Some(config_error) => result.add_error(config_error.to_string()),
            None => return Err(e),
        },
    }

    print_validation_result(&result, args.strict)
}

/// 配置检查
pub fn check_case(case: &CaseConfig, result: &mut ValidationResult) {
    if let Err(e) = case.validate() {
        result.add_error(e.to_string());
        return;
    }

    let asymmetric: &[&str] = match case.kind {
        CaseKind::Diffusion1d | CaseKind::PoissonNeumann => &[],
        CaseKind::Convection2d => &["T"],
        CaseKind::Cavity => &["U"],
    };
    for field in required_fields(case.kind) {
        match case.solution.solver_controls(field, false) {
            Ok(controls) if asymmetric.contains(field) => {
                if controls.solver == SolverKind::Pcg {
                    result.add_error(format!("{} 的方程不对称, 不能使用 PCG", field));
                }
                if controls.solver == SolverKind::PBiCgStab
                    && controls.preconditioner == PreconditionerKind::Dic
                {
                    result.add_error(format!("{} 的方程不对称, DIC 预条件只适用于对称矩阵", field));
                }
                if controls.solver == SolverKind::Smooth && controls.smoother == SmootherKind::Dic {
                    result.add_error(format!("{} 的方程不对称, DIC 光顺只适用于对称矩阵", field));
                }
            }
            Ok(_) => {}
            Err(e) => result.add_error(e.to_string()),
        }
    }

    if let MeshSpec::SkewedRect { skew, .. } = case.mesh {
        if skew != 0.0
            && case.solution.algorithm.n_non_orthogonal_correctors == 0
            && case.schemes.laplacian.sn_grad.corrected()
        {
            result.add_warning("非正交网格上没有非正交修正, 显式修正只按上一次的解计算");
        }
    }

    if matches!(case.kind, CaseKind::PoissonNeumann | CaseKind::Cavity)
        && case.solution.algorithm.p_ref_cell.is_none()
    {
        result.add_warning("未指定 pRefCell, 使用单元 0");
    }

    if let Some(courant) = estimated_courant(case) {
        if courant > 1.0 {
            result.add_warning(format!("估计 Courant 数 {:.2} 大于 1", courant));
        }
    }

    if case.kind == CaseKind::Cavity {
        if let Ok(controls) = case.solution.solver_controls("p", true) {
            if controls.rel_tol > 0.0 {
                result.add_warning("最后一次压力求解使用了相对容差 (可设置 pFinal)");
            }
        }
    }
}

fn required_fields(kind: CaseKind) -> &'static [&'static str] {
    match kind {
        CaseKind::Diffusion1d | CaseKind::Convection2d => &["T"],
        CaseKind::PoissonNeumann => &["p"],
        CaseKind::Cavity => &["U", "p"],
    }
}

/// |U|Δt/Δx 的粗略估计
fn estimated_courant(case: &CaseConfig) -> Option<f64> {
    let speed = match case.kind {
        CaseKind::Convection2d => case
            .physics
            .velocity
            .iter()
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt(),
        CaseKind::Cavity => case.physics.lid_velocity.abs(),
        _ => return None,
    };
    let dx = match case.mesh {
        MeshSpec::Line { n_cells, length } | MeshSpec::PeriodicLine { n_cells, length } => {
            length / n_cells as f64
        }
        MeshSpec::Rect { nx, ny, lx, ly } | MeshSpec::SkewedRect { nx, ny, lx, ly, .. } => {
            (lx / nx as f64).min(ly / ny as f64)
        }
    };
    Some(speed * case.time.delta_t / dx)
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    for e in &result.errors {
        error!("✗ {}", e);
    }
    for w in &result.warnings {
        warn!("! {}", w);
    }

    let ok = if strict {
        result.is_ok_strict()
    } else {
        result.is_ok()
    };
    if !ok {
        bail!(
            "验证失败: {} 个错误, {} 个警告",
            result.errors.len(),
            result.warnings.len()
        );
    }
    println!(
        "✓ 验证通过 ({} 个警告)",
        result.warnings.len()
    );
    Ok(())
}
