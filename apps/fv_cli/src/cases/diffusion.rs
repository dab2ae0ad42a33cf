// apps/fv_cli/src/cases/diffusion.rs

//! 一维扩散 ∂T/∂t − ∇·(Γ∇T) = S
//!
//! 左右两端固定值，稳态时一次求解，瞬态时按时间步推进。

use super::{global_range, CaseOutput};
use anyhow::Result;
use fv_config::{CaseConfig, DdtKind, MeshSpec};
use fv_foundation::DimensionSet;
use fv_mesh::FvMesh;
use fv_numerics::control::{non_orth_correctors, SolverPerformanceDict, TimeState};
use fv_numerics::fields::{BoundarySpec, VolField};
use fv_numerics::fvm::{self, Diffusivity};
use tracing::debug;

/// 求解（可在分区网格上调用）
pub fn solve(mesh: &FvMesh, case: &CaseConfig) -> Result<CaseOutput> {
    let physics = &case.physics;
    let mut t = VolField::uniform(mesh, "T", DimensionSet::TEMPERATURE, physics.left_value, |patch| {
        BoundarySpec::coupled_or(
            patch,
            match patch.name.as_str() {
                "left" => BoundarySpec::FixedValue(physics.left_value),
                "right" => BoundarySpec::FixedValue(physics.right_value),
                _ => BoundarySpec::ZeroGradient,
            },
        )
    })?;
    let source = VolField::uniform(
        mesh,
        "S",
        DimensionSet::TEMPERATURE / DimensionSet::TIME,
        physics.source,
        |patch| BoundarySpec::coupled_or(patch, BoundarySpec::ZeroGradient),
    )?;
    let gamma = Diffusivity::uniform(physics.diffusivity, DimensionSet::KINEMATIC_VISCOSITY);

    let steady = case.schemes.ddt == DdtKind::SteadyState;
    let (mut time, n_steps) = if steady {
        (TimeState::steady(), 1)
    } else {
        (TimeState::new(case.time.delta_t)?, case.time.n_steps())
    };

    let n_non_orth = case.solution.algorithm.n_non_orthogonal_correctors;
    let mut dict = SolverPerformanceDict::new();
    for _ in 0..n_steps {
        if !steady {
            time.advance();
            t.store_old_time();
            debug!("t = {}", time.value);
        }
        dict.clear();
        for corr in non_orth_correctors(n_non_orth) {
            let eqn = fvm::ddt(mesh, &t, case.schemes.ddt, &time)?
                .sub_matrix(fvm::laplacian(mesh, &gamma, &t, &case.schemes.laplacian)?)?
                .sub_matrix(fvm::su(mesh, &source, &t)?)?;
            dict.insert(eqn.solve_with(&mut t, &case.solution, corr.is_final)?);
        }
    }

    let mut out = CaseOutput {
        steps: n_steps,
        ..Default::default()
    };
    out.record(&dict);

    let (t_min, t_max) = global_range(mesh, t.internal())?;
    out.summary.insert("T_min".into(), t_min);
    out.summary.insert("T_max".into(), t_max);
    out.summary.insert("T_mean".into(), t.average(mesh)?);

    // 无源稳态解为线性分布，离散解在单元中心精确
    if let MeshSpec::Line { length, .. } = case.mesh {
        if steady && physics.source == 0.0 {
            let slope = (physics.right_value - physics.left_value) / length;
            let local = mesh
                .cell_centres()
                .iter()
                .zip(t.internal())
                .map(|(c, &v)| (v - (physics.left_value + slope * c.x)).abs())
                .fold(0.0, f64::max);
            out.summary
                .insert("max_error".into(), mesh.comm().all_reduce_max(local)?);
        }
    }

    out.fields.insert("T".into(), t.internal().to_vec());
    Ok(out)
}
