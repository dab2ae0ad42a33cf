// crates/fv_numerics/tests/solvers.rs

//! 不同求解器的结果一致性与错误处理

use fv_config::{
    ConvectionScheme, DivergencePolicy, LaplacianScheme, PreconditionerKind, SmootherKind,
    SolverControls, SolverKind,
};
use fv_foundation::{DimensionSet, FvError};
use fv_mesh::prelude::*;
use fv_numerics::control::TimeState;
use fv_numerics::ldu::{InterfaceSet, LduMatrix};
use fv_numerics::prelude::*;
use fv_numerics::solvers::{self, GamgSolver, SolverContext};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn boxed_field(mesh: &FvMesh) -> VolScalarField {
    VolField::uniform(mesh, "T", DimensionSet::TEMPERATURE, 0.0, |patch| {
        match patch.name.as_str() {
            "left" => BoundarySpec::FixedValue(0.0),
            "right" => BoundarySpec::FixedValue(1.0),
            _ => BoundarySpec::ZeroGradient,
        }
    })
    .unwrap()
}

fn random_source(mesh: &FvMesh, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    mesh.cell_volumes()
        .iter()
        .map(|v| v * rng.gen_range(-1.0..1.0))
        .collect()
}

fn max_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// 各求解器在同一方程上的解
fn solve_all<'m>(
    eqn: &FvMatrix<'m, f64>,
    template: &VolScalarField,
    all_controls: &[SolverControls],
) -> Vec<Vec<f64>> {
    all_controls
        .iter()
        .map(|controls| {
            let mut t = template.clone();
            let perf = eqn.solve(&mut t, controls).unwrap();
            assert!(perf.converged, "{}", perf);
            t.internal().to_vec()
        })
        .collect()
}

#[test]
fn test_symmetric_solvers_agree() {
    let mesh = rect_mesh(8, 8, 1.0, 1.0).unwrap();
    let t = boxed_field(&mesh);
    let mut eqn = fvm::laplacian(
        &mesh,
        &Diffusivity::uniform(1.0, DimensionSet::KINEMATIC_VISCOSITY),
        &t,
        &LaplacianScheme::default(),
    )
    .unwrap()
    .negate();
    for (s, r) in eqn.source_mut().iter_mut().zip(random_source(&mesh, 7)) {
        *s += r;
    }

    let tol = 1e-11;
    let controls = [
        SolverControls::new(SolverKind::Pcg, tol),
        SolverControls::new(SolverKind::Pcg, tol).with_preconditioner(PreconditionerKind::Diagonal),
        SolverControls::new(SolverKind::PBiCgStab, tol),
        SolverControls::new(SolverKind::Gamg, tol),
        SolverControls::new(SolverKind::Smooth, tol)
            .with_smoother(SmootherKind::SymGaussSeidel)
            .with_iterations(5000, 0),
    ];
    let solutions = solve_all(&eqn, &t, &controls);
    for (i, s) in solutions.iter().enumerate().skip(1) {
        let d = max_diff(&solutions[0], s);
        assert!(d < 1e-7, "{}: 差 {}", controls[i].solver, d);
    }
}

#[test]
fn test_asymmetric_solvers_agree() {
    let mesh = rect_mesh(10, 6, 1.0, 0.6).unwrap();
    let u0 = DVec3::new(1.0, 0.3, 0.0);
    let u = VolField::uniform(&mesh, "U", DimensionSet::VELOCITY, u0, |_| {
        BoundarySpec::FixedValue(u0)
    })
    .unwrap();
    let phi = fvc::flux(&mesh, &u).unwrap();
    let t = boxed_field(&mesh);

    let conv = fvm::div(&mesh, &phi, &t, &ConvectionScheme::UPWIND).unwrap();
    let diff = fvm::laplacian(
        &mesh,
        &Diffusivity::uniform(0.05, DimensionSet::KINEMATIC_VISCOSITY),
        &t,
        &LaplacianScheme::default(),
    )
    .unwrap();
    let eqn = conv.sub_matrix(diff).unwrap();
    assert!(!eqn.ldu().is_symmetric());

    let tol = 1e-11;
    let controls = [
        SolverControls::new(SolverKind::PBiCgStab, tol).with_preconditioner(PreconditionerKind::Dilu),
        SolverControls::new(SolverKind::Gamg, tol),
        SolverControls::new(SolverKind::Smooth, tol)
            .with_smoother(SmootherKind::Dilu)
            .with_iterations(5000, 0),
        SolverControls::new(SolverKind::Smooth, tol).with_iterations(5000, 0),
    ];
    let solutions = solve_all(&eqn, &t, &controls);
    for (i, s) in solutions.iter().enumerate().skip(1) {
        let d = max_diff(&solutions[0], s);
        assert!(d < 1e-7, "{}: 差 {}", controls[i].solver, d);
    }
}

#[test]
fn test_gamg_builds_hierarchy() {
    let mesh = rect_mesh(16, 16, 1.0, 1.0).unwrap();
    let t = boxed_field(&mesh);
    let eqn = fvm::laplacian(
        &mesh,
        &Diffusivity::uniform(1.0, DimensionSet::KINEMATIC_VISCOSITY),
        &t,
        &LaplacianScheme::default(),
    )
    .unwrap()
    .negate();
    let interfaces = InterfaceSet::empty();
    let controls = SolverControls::new(SolverKind::Gamg, 1e-8);
    let ctx = SolverContext::new("T", eqn.ldu(), &interfaces, &controls);
    let gamg = GamgSolver::new(ctx).unwrap();
    let sizes = gamg.level_sizes();
    assert!(gamg.n_levels() > 2, "{:?}", sizes);
    assert!(sizes.windows(2).all(|w| w[1] < w[0]));
}

#[test]
fn test_pcg_rejects_asymmetric_matrix() {
    let mesh = line_mesh(4, 1.0).unwrap();
    let addr = mesh.ldu_addressing().unwrap();
    let a = LduMatrix::from_coeffs(addr, vec![2.0; 4], vec![-1.0; 3], vec![-0.5; 3]).unwrap();
    let mut x = vec![0.0; 4];
    let err = solvers::solve(
        "x",
        &a,
        &InterfaceSet::empty(),
        &mut x,
        &[1.0; 4],
        &SolverControls::new(SolverKind::Pcg, 1e-8),
    )
    .unwrap_err();
    assert!(matches!(err, FvError::InvalidConfig { .. }), "{}", err);
}

#[test]
fn test_divergence_policies() {
    let n = 10;
    let mesh = line_mesh(n, 1.0).unwrap();
    let addr = mesh.ldu_addressing().unwrap();
    // 非对角占优，Gauss-Seidel 发散
    let a = LduMatrix::from_coeffs(addr, vec![1.0; n], vec![3.0; n - 1], vec![3.0; n - 1]).unwrap();
    let b = vec![1.0; n];
    let interfaces = InterfaceSet::empty();

    let fatal = SolverControls::new(SolverKind::Smooth, 1e-10);
    let mut x = vec![0.0; n];
    let err = solvers::solve("x", &a, &interfaces, &mut x, &b, &fatal).unwrap_err();
    assert!(matches!(err, FvError::SolverDiverged { .. }), "{}", err);

    let report = fatal.with_divergence(1e3, DivergencePolicy::Report);
    let mut x = vec![0.0; n];
    let perf = solvers::solve("x", &a, &interfaces, &mut x, &b, &report).unwrap();
    assert!(perf.diverged);
    assert!(!perf.converged);
    assert!(perf.iterations < report.max_iter);
}

#[test]
fn test_mismatched_dimensions_rejected() {
    let mesh = line_mesh(4, 1.0).unwrap();
    let mut t = boxed_field(&mesh);
    t.store_old_time();
    let time = TimeState::new(0.1).unwrap();
    let ddt = fvm::ddt(&mesh, &t, fv_config::DdtKind::Euler, &time).unwrap();
    // Γ 量纲错误：m² 而非 m²/s
    let diff = fvm::laplacian(
        &mesh,
        &Diffusivity::uniform(1.0, DimensionSet::AREA),
        &t,
        &LaplacianScheme::default(),
    )
    .unwrap();
    let err = ddt.sub_matrix(diff).unwrap_err();
    assert!(matches!(err, FvError::DimensionMismatch { .. }), "{}", err);

    let ddt = fvm::ddt(&mesh, &t, fv_config::DdtKind::Euler, &time).unwrap();
    let err = ddt
        .add_source(&[1.0; 4], DimensionSet::TEMPERATURE)
        .unwrap_err();
    assert!(matches!(err, FvError::DimensionMismatch { .. }), "{}", err);
}
