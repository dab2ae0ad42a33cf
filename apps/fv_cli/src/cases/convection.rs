// apps/fv_cli/src/cases/convection.rs

//! 二维瞬态对流扩散 ∂T/∂t + ∇·(φT) − ∇·(Γ∇T) = 0
//!
//! 均匀速度场，左边界与下边界为入口（固定值），右、上边界零梯度。
//! 对流格式取 `div(phi,T)`，TVD 格式的高阶部分作显式修正。

use super::{courant_number, global_range, CaseOutput};
use anyhow::Result;
use fv_config::CaseConfig;
use fv_foundation::DimensionSet;
use fv_mesh::FvMesh;
use fv_numerics::control::{non_orth_correctors, SolverPerformanceDict, TimeState};
use fv_numerics::fields::{BoundarySpec, VolField};
use fv_numerics::fvc;
use fv_numerics::fvm::{self, Diffusivity};
use glam::DVec3;
use tracing::{debug, warn};

/// 求解
pub fn solve(mesh: &FvMesh, case: &CaseConfig) -> Result<CaseOutput> {
    let physics = &case.physics;
    let u0 = DVec3::from_array(physics.velocity);
    let u = VolField::uniform(mesh, "U", DimensionSet::VELOCITY, u0, |patch| {
        BoundarySpec::coupled_or(patch, BoundarySpec::FixedValue(u0))
    })?;
    let phi = fvc::flux(mesh, &u)?;

    let mut t = VolField::uniform(mesh, "T", DimensionSet::TEMPERATURE, physics.right_value, |patch| {
        BoundarySpec::coupled_or(
            patch,
            match patch.name.as_str() {
                "left" => BoundarySpec::FixedValue(physics.left_value),
                "bottom" => BoundarySpec::FixedValue(physics.right_value),
                _ => BoundarySpec::ZeroGradient,
            },
        )
    })?;

    let scheme = case.schemes.div_scheme("div(phi,T)")?;
    let gamma = Diffusivity::uniform(physics.diffusivity, DimensionSet::KINEMATIC_VISCOSITY);
    let mut time = TimeState::new(case.time.delta_t)?;
    let n_steps = case.time.n_steps();

    let courant = courant_number(mesh, &phi, time.delta_t)?;
    if courant > 1.0 {
        warn!("Courant 数 {:.3} 大于 1", courant);
    }

    let n_non_orth = case.solution.algorithm.n_non_orthogonal_correctors;
    let mut dict = SolverPerformanceDict::new();
    for _ in 0..n_steps {
        time.advance();
        t.store_old_time();
        dict.clear();
        for corr in non_orth_correctors(n_non_orth) {
            let eqn = fvm::ddt(mesh, &t, case.schemes.ddt, &time)?
                .add_matrix(fvm::div(mesh, &phi, &t, &scheme)?)?
                .sub_matrix(fvm::laplacian(mesh, &gamma, &t, &case.schemes.laplacian)?)?;
            dict.insert(eqn.solve_with(&mut t, &case.solution, corr.is_final)?);
        }
        debug!("t = {:.4}", time.value);
    }

    let mut out = CaseOutput {
        steps: n_steps,
        ..Default::default()
    };
    out.record(&dict);

    let (t_min, t_max) = global_range(mesh, t.internal())?;
    let lo = physics.left_value.min(physics.right_value);
    let hi = physics.left_value.max(physics.right_value);
    out.summary.insert("T_min".into(), t_min);
    out.summary.insert("T_max".into(), t_max);
    out.summary
        .insert("overshoot".into(), (t_max - hi).max(lo - t_min).max(0.0));
    out.summary.insert("courant_max".into(), courant);
    out.fields.insert("T".into(), t.internal().to_vec());
    Ok(out)
}
