// apps/fv_cli/src/cases/poisson.rs

//! 纯 Neumann 泊松方程 −∇²p = f
//!
//! 所有边界零梯度，解只确定到一个常数，由参考单元固定。
//! 右端减去体积平均值以保证相容。

use super::{global_range, CaseOutput};
use anyhow::Result;
use fv_config::CaseConfig;
use fv_foundation::DimensionSet;
use fv_mesh::FvMesh;
use fv_numerics::control::{non_orth_correctors, PressureReference, SolverPerformanceDict};
use fv_numerics::fields::{BoundarySpec, VolField};
use fv_numerics::fvm::{self, Diffusivity};
use std::f64::consts::PI;

/// 求解（可在分区网格上调用）
pub fn solve(mesh: &FvMesh, case: &CaseConfig) -> Result<CaseOutput> {
    let neumann = |patch: &fv_mesh::Patch| BoundarySpec::coupled_or(patch, BoundarySpec::ZeroGradient);
    let mut p = VolField::uniform(mesh, "p", DimensionSet::KINEMATIC_PRESSURE, 0.0, neumann)?;

    let strength = case.physics.source;
    let values = mesh
        .cell_centres()
        .iter()
        .map(|c| strength * (PI * c.x).cos() * (PI * c.y).cos())
        .collect();
    let mut f = VolField::new(
        mesh,
        "f",
        DimensionSet::KINEMATIC_PRESSURE / DimensionSet::AREA,
        values,
        neumann,
    )?;
    let mean = f.average(mesh)?;
    for v in f.internal_mut() {
        *v -= mean;
    }

    let reference = PressureReference::new(mesh, &p, &case.solution.algorithm)?;
    let unit = Diffusivity::uniform(1.0, DimensionSet::DIMLESS);

    let mut dict = SolverPerformanceDict::new();
    for corr in non_orth_correctors(case.solution.algorithm.n_non_orthogonal_correctors) {
        let mut eqn = fvm::laplacian(mesh, &unit, &p, &case.schemes.laplacian)?
            .negate()
            .sub_matrix(fvm::su(mesh, &f, &p)?)?;
        reference.apply(&mut eqn)?;
        dict.insert(eqn.solve_with(&mut p, &case.solution, corr.is_final)?);
    }

    let mut out = CaseOutput {
        steps: 1,
        ..Default::default()
    };
    out.record(&dict);

    let (p_min, p_max) = global_range(mesh, p.internal())?;
    out.summary.insert("p_min".into(), p_min);
    out.summary.insert("p_max".into(), p_max);
    out.summary.insert("p_mean".into(), p.average(mesh)?);
    let local_ref = reference.cell().map_or(f64::NEG_INFINITY, |c| p.internal()[c]);
    let p_ref = mesh.comm().all_reduce_max(local_ref)?;
    if p_ref.is_finite() {
        out.summary.insert("p_ref".into(), p_ref);
    }

    out.fields.insert("p".into(), p.internal().to_vec());
    Ok(out)
}
