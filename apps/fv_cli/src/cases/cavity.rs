// apps/fv_cli/src/cases/cavity.rs

//! 顶盖驱动方腔（不可压层流，PISO）
//!
//! 每个时间步：
//! 1. 组装动量方程 ∂U/∂t + ∇·(φU) − ∇·(ν∇U)，可选求解动量预测
//! 2. 压力修正：HbyA = H/A，∇·(rAU∇p) = ∇·φ(HbyA)，修正通量与速度
//!
//! 所有边界速度固定，压力零梯度，需要参考单元。

use super::{courant_number, global_range, CaseOutput};
use anyhow::Result;
use fv_config::CaseConfig;
use fv_foundation::DimensionSet;
use fv_mesh::{FvMesh, Patch};
use fv_numerics::control::{
    adjust_closed_volume, PisoControl, PressureReference, SolverPerformanceDict, TimeState,
};
use fv_numerics::fields::{BoundarySpec, FieldValue, VolField, VolVectorField};
use fv_numerics::fvc;
use fv_numerics::fvm::{self, Diffusivity};
use glam::DVec3;
use tracing::{debug, info};

fn velocity_boundary(lid: f64) -> impl Fn(&Patch) -> BoundarySpec<DVec3> + Copy {
    move |patch| {
        let value = if patch.name == "top" {
            DVec3::new(lid, 0.0, 0.0)
        } else {
            DVec3::ZERO
        };
        BoundarySpec::coupled_or(patch, BoundarySpec::FixedValue(value))
    }
}

/// 求解
pub fn solve(mesh: &FvMesh, case: &CaseConfig) -> Result<CaseOutput> {
    let physics = &case.physics;
    let velocity_bc = velocity_boundary(physics.lid_velocity);
    let mut u = VolField::uniform(mesh, "U", DimensionSet::VELOCITY, DVec3::ZERO, velocity_bc)?;
    let mut p = VolField::uniform(mesh, "p", DimensionSet::KINEMATIC_PRESSURE, 0.0, |patch| {
        BoundarySpec::coupled_or(patch, BoundarySpec::ZeroGradient)
    })?;
    let mut phi = fvc::flux(mesh, &u)?;

    let nu = Diffusivity::uniform(physics.viscosity, DimensionSet::KINEMATIC_VISCOSITY);
    let div_scheme = case.schemes.div_scheme("div(phi,U)")?;
    let laplacian_scheme = &case.schemes.laplacian;
    let solution = &case.solution;

    let mut piso = PisoControl::new(&solution.algorithm);
    let reference = PressureReference::new(mesh, &p, &solution.algorithm)?;
    let mut time = TimeState::new(case.time.delta_t)?;
    let n_steps = case.time.n_steps();
    let mut dict = SolverPerformanceDict::new();

    for _ in 0..n_steps {
        time.advance();
        u.store_old_time();

        while piso.outer_loop(&mut dict) {
            let mut u_eqn = fvm::ddt(mesh, &u, case.schemes.ddt, &time)?
                .add_matrix(fvm::div(mesh, &phi, &u, &div_scheme)?)?
                .sub_matrix(fvm::laplacian(mesh, &nu, &u, laplacian_scheme)?)?;
            u_eqn.relax_from(&u, &solution.relaxation_factors, piso.final_outer())?;

            if piso.momentum_predictor() {
                let grad_p = fvc::grad(mesh, &p)?;
                let minus_grad_p: Vec<DVec3> = grad_p.internal().iter().map(|g| -*g).collect();
                let predictor = u_eqn.clone().equate(&minus_grad_p, grad_p.dimensions())?;
                dict.insert(predictor.solve_with(&mut u, solution, piso.final_outer())?);
            }

            for corr in piso.correctors() {
                let r_au: Vec<f64> = u_eqn.a().iter().map(|a| 1.0 / a).collect();
                let r_au_field = VolField::new(mesh, "rAU", DimensionSet::TIME, r_au.clone(), |patch| {
                    BoundarySpec::coupled_or(patch, BoundarySpec::ZeroGradient)
                })?;
                let hbya_values: Vec<DVec3> = u_eqn
                    .h(&u)?
                    .into_iter()
                    .zip(&r_au)
                    .map(|(h, &r)| h * r)
                    .collect();
                let hbya = VolField::new(mesh, "HbyA", DimensionSet::VELOCITY, hbya_values, velocity_bc)?;
                let mut phi_hbya = fvc::flux(mesh, &hbya)?;
                adjust_closed_volume(mesh, &mut phi_hbya, &u, &p)?;

                let div_hbya = fvc::div(mesh, &phi_hbya);
                p.store_prev_iter();
                for non_orth in piso.non_orth_correctors() {
                    let mut p_eqn = fvm::laplacian(
                        mesh,
                        &Diffusivity::Cell(&r_au_field),
                        &p,
                        laplacian_scheme,
                    )?
                    .equate(&div_hbya, DimensionSet::TIME.inv())?;
                    reference.apply(&mut p_eqn)?;
                    let final_iter = piso.final_inner_iter(corr, non_orth);
                    dict.insert(p_eqn.solve_with(&mut p, solution, final_iter)?);

                    if non_orth.is_final {
                        phi = phi_hbya.clone();
                        phi.sub_assign(&p_eqn.flux(&p)?)?;
                    }
                }

                let p_alpha = solution
                    .relaxation_factors
                    .field("p", piso.final_outer() && corr.is_final);
                p.relax(p_alpha)?;
                p.correct_boundary_conditions(mesh)?;

                let grad_p = fvc::grad(mesh, &p)?;
                for (((uc, &h), &g), &r) in u
                    .internal_mut()
                    .iter_mut()
                    .zip(hbya.internal())
                    .zip(grad_p.internal())
                    .zip(&r_au)
                {
                    *uc = h - g * r;
                }
                u.correct_boundary_conditions(mesh)?;
                debug!("PISO 修正 {} 完成", corr.index + 1);
            }
        }

        let courant = courant_number(mesh, &phi, time.delta_t)?;
        info!(
            "t = {:.4}, Courant 最大值 {:.4}, 连续性误差 {:.3e}",
            time.value,
            courant,
            continuity_error(mesh, &phi, time.delta_t)?
        );
    }

    let mut out = CaseOutput {
        steps: n_steps,
        ..Default::default()
    };
    out.record(&dict);
    summarize(mesh, &u, &p, &phi, time.delta_t, &mut out)?;
    Ok(out)
}

/// Δt·(体积加权平均 |∇·φ|)
fn continuity_error(
    mesh: &FvMesh,
    phi: &fv_numerics::SurfaceScalarField,
    delta_t: f64,
) -> Result<f64> {
    let div = fvc::div(mesh, phi);
    let local: f64 = div
        .iter()
        .zip(mesh.cell_volumes())
        .map(|(d, v)| d.abs() * v)
        .sum();
    let total = mesh.comm().all_reduce_sum(local)?;
    Ok(delta_t * total / mesh.total_volume()?)
}

fn summarize(
    mesh: &FvMesh,
    u: &VolVectorField,
    p: &fv_numerics::VolScalarField,
    phi: &fv_numerics::SurfaceScalarField,
    delta_t: f64,
    out: &mut CaseOutput,
) -> Result<()> {
    let mag_u: Vec<f64> = u.internal().iter().map(|v| v.mag()).collect();
    let (_, u_max) = global_range(mesh, &mag_u)?;
    let (p_min, p_max) = global_range(mesh, p.internal())?;
    out.summary.insert("U_max".into(), u_max);
    out.summary.insert("p_min".into(), p_min);
    out.summary.insert("p_max".into(), p_max);
    out.summary
        .insert("courant_max".into(), courant_number(mesh, phi, delta_t)?);
    out.summary
        .insert("continuity_error".into(), continuity_error(mesh, phi, delta_t)?);

    out.fields
        .insert("Ux".into(), u.internal().iter().map(|v| v.x).collect());
    out.fields
        .insert("Uy".into(), u.internal().iter().map(|v| v.y).collect());
    out.fields.insert("magU".into(), mag_u);
    out.fields.insert("p".into(), p.internal().to_vec());
    Ok(())
}
