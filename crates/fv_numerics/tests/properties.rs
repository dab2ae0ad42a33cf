// crates/fv_numerics/tests/properties.rs

//! 离散与求解的基本性质

use fv_config::{
    ConvectionScheme, LaplacianScheme, PreconditionerKind, SmootherKind, SnGradScheme,
    SolverControls, SolverKind,
};
use fv_foundation::DimensionSet;
use fv_mesh::prelude::*;
use fv_numerics::ldu::{InterfaceSet, LduMatrix};
use fv_numerics::prelude::*;
use fv_numerics::solvers;
use glam::DVec3;

// ============================================================
// 辅助
// ============================================================

/// 含边界对角贡献的行和
fn row_sums(m: &FvMatrix<'_, f64>) -> Vec<f64> {
    let mesh = m.mesh();
    let ldu = m.ldu();
    let addr = ldu.addressing();
    let mut s = ldu.diag().to_vec();
    for f in 0..ldu.n_faces() {
        s[addr.lower()[f]] += ldu.upper()[f];
        s[addr.upper()[f]] += ldu.lower()[f];
    }
    for patchi in 0..mesh.patches().len() {
        for (i, &c) in mesh.patch_face_cells(patchi).iter().enumerate() {
            s[c] += m.internal_coeffs()[patchi][i];
        }
    }
    s
}

fn uniform_velocity(mesh: &FvMesh, u0: DVec3) -> VolVectorField {
    VolField::uniform(mesh, "U", DimensionSet::VELOCITY, u0, |_| {
        BoundarySpec::FixedValue(u0)
    })
    .unwrap()
}

fn dirichlet_line(mesh: &FvMesh, left: f64, right: f64) -> VolScalarField {
    VolField::uniform(mesh, "T", DimensionSet::TEMPERATURE, 0.0, |patch| {
        if patch.name == "left" {
            BoundarySpec::FixedValue(left)
        } else {
            BoundarySpec::FixedValue(right)
        }
    })
    .unwrap()
}

fn nu() -> DimensionSet {
    DimensionSet::KINEMATIC_VISCOSITY
}

/// 稳态对流扩散 ∇·(φT) − ∇·(Γ∇T) = 0
fn convection_diffusion<'m>(
    mesh: &'m FvMesh,
    phi: &SurfaceScalarField,
    t: &VolScalarField,
    gamma: f64,
) -> FvMatrix<'m, f64> {
    let conv = fvm::div(mesh, phi, t, &ConvectionScheme::UPWIND).unwrap();
    let diff = fvm::laplacian(
        mesh,
        &Diffusivity::uniform(gamma, nu()),
        t,
        &LaplacianScheme::default(),
    )
    .unwrap();
    conv.sub_matrix(diff).unwrap()
}

fn asymmetric_controls() -> SolverControls {
    SolverControls::new(SolverKind::PBiCgStab, 1e-12).with_preconditioner(PreconditionerKind::Dilu)
}

// ============================================================
// 守恒
// ============================================================

#[test]
fn test_zero_gradient_laplacian_rows_sum_to_zero() {
    let mesh = skewed_rect_mesh(4, 3, 1.0, 0.75, 0.2).unwrap();
    let t = VolField::uniform(&mesh, "T", DimensionSet::TEMPERATURE, 1.0, |_| {
        BoundarySpec::ZeroGradient
    })
    .unwrap();
    let m = fvm::laplacian(
        &mesh,
        &Diffusivity::uniform(0.3, nu()),
        &t,
        &LaplacianScheme::new(SnGradScheme::Uncorrected),
    )
    .unwrap();
    assert!(m.ldu().is_symmetric());
    for s in row_sums(&m) {
        assert!(s.abs() < 1e-12, "row sum {}", s);
    }
}

#[test]
fn test_divergence_free_convection_rows_sum_to_zero() {
    let mesh = rect_mesh(4, 3, 1.0, 0.75).unwrap();
    let u = uniform_velocity(&mesh, DVec3::new(1.0, 0.5, 0.0));
    let phi = fvc::flux(&mesh, &u).unwrap();
    let t = VolField::uniform(&mesh, "T", DimensionSet::TEMPERATURE, 0.0, |_| {
        BoundarySpec::ZeroGradient
    })
    .unwrap();
    let m = fvm::div(&mesh, &phi, &t, &ConvectionScheme::UPWIND).unwrap();
    for s in row_sums(&m) {
        assert!(s.abs() < 1e-12, "row sum {}", s);
    }
    assert!(fvc::div(&mesh, &phi).iter().all(|d| d.abs() < 1e-12));
}

// ============================================================
// 有界性与松弛
// ============================================================

#[test]
fn test_upwind_solution_is_bounded_and_monotone() {
    let mesh = line_mesh(20, 1.0).unwrap();
    let u = uniform_velocity(&mesh, DVec3::X);
    let phi = fvc::flux(&mesh, &u).unwrap();
    let mut t = dirichlet_line(&mesh, 0.0, 1.0);

    let eqn = convection_diffusion(&mesh, &phi, &t, 0.01);
    assert!(!eqn.ldu().is_symmetric());
    let perf = eqn.solve(&mut t, &asymmetric_controls()).unwrap();
    assert!(perf.converged);

    let values = t.internal();
    assert!(values.iter().all(|&v| (-1e-10..=1.0 + 1e-10).contains(&v)));
    assert!(values.windows(2).all(|w| w[1] >= w[0] - 1e-10));
}

#[test]
fn test_upwind_gauss_seidel_sweep_stays_within_bounds() {
    let mesh = line_mesh(10, 1.0).unwrap();
    let u = uniform_velocity(&mesh, DVec3::X);
    let phi = fvc::flux(&mesh, &u).unwrap();
    let initial: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 0.2 } else { 0.8 }).collect();
    let mut t = VolField::new(&mesh, "T", DimensionSet::TEMPERATURE, initial, |patch| {
        if patch.name == "left" {
            BoundarySpec::FixedValue(0.5)
        } else {
            BoundarySpec::ZeroGradient
        }
    })
    .unwrap();

    let eqn = fvm::div(&mesh, &phi, &t, &ConvectionScheme::UPWIND).unwrap();
    let controls = SolverControls::new(SolverKind::Smooth, 0.0)
        .with_smoother(SmootherKind::GaussSeidel)
        .with_iterations(1, 0);
    let perf = eqn.solve(&mut t, &controls).unwrap();
    assert_eq!(perf.iterations, 1);

    let (lo, hi) = (0.2, 0.8);
    for (i, &v) in t.internal().iter().enumerate() {
        assert!((lo - 1e-12..=hi + 1e-12).contains(&v), "cell {}: {}", i, v);
    }
    // 前扫把入口值逐单元带到下游
    assert!(t.internal().iter().all(|&v| (v - 0.5).abs() < 1e-12));
}

#[test]
fn test_relaxation_keeps_converged_solution() {
    let mesh = line_mesh(20, 1.0).unwrap();
    let u = uniform_velocity(&mesh, DVec3::X);
    let phi = fvc::flux(&mesh, &u).unwrap();
    let mut t = dirichlet_line(&mesh, 0.0, 1.0);
    convection_diffusion(&mesh, &phi, &t, 0.05)
        .solve(&mut t, &asymmetric_controls())
        .unwrap();

    let mut relaxed = convection_diffusion(&mesh, &phi, &t, 0.05);
    relaxed.relax(&t, 0.7).unwrap();
    let r = relaxed.residual(&t).unwrap();
    assert!(r.iter().all(|v| v.abs() < 1e-8), "{:?}", r);

    let before = t.internal().to_vec();
    relaxed.solve(&mut t, &asymmetric_controls()).unwrap();
    for (a, b) in before.iter().zip(t.internal()) {
        assert!((a - b).abs() < 1e-8);
    }
}

// ============================================================
// 参考压力
// ============================================================

#[test]
fn test_reference_is_idempotent_and_keeps_compatible_solution() {
    let mesh = rect_mesh(4, 4, 1.0, 1.0).unwrap();
    let mut p = VolField::uniform(&mesh, "p", DimensionSet::KINEMATIC_PRESSURE, 0.0, |_| {
        BoundarySpec::ZeroGradient
    })
    .unwrap();
    let mut eqn = fvm::laplacian(
        &mesh,
        &Diffusivity::uniform(1.0, DimensionSet::TIME),
        &p,
        &LaplacianScheme::default(),
    )
    .unwrap()
    .negate();
    // Σb = 0，纯 Neumann 问题相容
    for (s, c) in eqn.source_mut().iter_mut().zip(mesh.cell_centres()) {
        *s = (c.x - 0.5) / 16.0;
    }
    let original = eqn.clone();

    eqn.set_reference(5, 2.0).unwrap();
    let once = eqn.clone();
    eqn.set_reference(5, 2.0).unwrap();
    assert_eq!(once.ldu().diag(), eqn.ldu().diag());
    assert_eq!(once.ldu().upper(), eqn.ldu().upper());
    assert_eq!(once.ldu().lower(), eqn.ldu().lower());
    assert_eq!(once.source(), eqn.source());
    assert!(eqn.ldu().is_symmetric());

    let perf = eqn
        .solve(&mut p, &SolverControls::new(SolverKind::Pcg, 1e-12))
        .unwrap();
    assert!(perf.converged);
    assert!((p.internal()[5] - 2.0).abs() < 1e-9);
    let r = original.residual(&p).unwrap();
    assert!(r.iter().all(|v| v.abs() < 1e-8), "{:?}", r);
}

// ============================================================
// 线性求解器
// ============================================================

fn tridiagonal(n: usize) -> LduMatrix<f64> {
    let mesh = line_mesh(n, 1.0).unwrap();
    let addr = mesh.ldu_addressing().unwrap();
    LduMatrix::from_coeffs(addr, vec![4.0; n], vec![-1.0; n - 1], vec![-1.0; n - 1]).unwrap()
}

#[test]
fn test_pcg_converges_within_matrix_size() {
    let a = tridiagonal(5);
    let interfaces = InterfaceSet::empty();
    let b = [1.0, 2.0, 3.0, 4.0, 5.0];
    for pre in [PreconditionerKind::Dic, PreconditionerKind::Diagonal, PreconditionerKind::None] {
        let mut x = vec![0.0; 5];
        let controls = SolverControls::new(SolverKind::Pcg, 1e-10).with_preconditioner(pre);
        let perf = solvers::solve("x", &a, &interfaces, &mut x, &b, &controls).unwrap();
        assert!(perf.converged, "{}: {}", pre, perf);
        assert!(perf.iterations <= 5, "{}: {}", pre, perf);

        let mut r = vec![0.0; 5];
        a.residual(&x, &b, &interfaces, &mut r).unwrap();
        assert!(r.iter().all(|v| v.abs() < 1e-8));
    }
}

#[test]
fn test_zero_initial_residual_skips_iterations() {
    let a = tridiagonal(6);
    let interfaces = InterfaceSet::empty();
    for kind in [SolverKind::Pcg, SolverKind::PBiCgStab, SolverKind::Smooth, SolverKind::Gamg] {
        let mut x = vec![0.0; 6];
        let controls = SolverControls::new(kind, 1e-10);
        let perf = solvers::solve("x", &a, &interfaces, &mut x, &[0.0; 6], &controls).unwrap();
        assert_eq!(perf.iterations, 0, "{}", kind);
        assert!(perf.converged);
        assert_eq!(perf.initial_residual, 0.0);
        assert!(x.iter().all(|&v| v == 0.0));
    }
}

// ============================================================
// 精度
// ============================================================

#[test]
fn test_one_dimensional_diffusion_is_exact() {
    let mesh = line_mesh(10, 1.0).unwrap();
    let mut t = dirichlet_line(&mesh, 0.0, 100.0);
    let eqn = fvm::laplacian(
        &mesh,
        &Diffusivity::uniform(1.0, nu()),
        &t,
        &LaplacianScheme::default(),
    )
    .unwrap()
    .negate();
    let perf = eqn
        .solve(&mut t, &SolverControls::new(SolverKind::Pcg, 1e-10))
        .unwrap();
    assert!(perf.converged);
    for (i, &v) in t.internal().iter().enumerate() {
        let exact = 100.0 * (i as f64 + 0.5) / 10.0;
        assert!((v - exact).abs() < 1e-6, "cell {}: {} vs {}", i, v, exact);
    }
}

#[test]
fn test_non_orthogonal_correctors_reduce_residual() {
    let mesh = skewed_rect_mesh(6, 6, 1.0, 1.0, 0.2).unwrap();
    let controls = SolverControls::new(SolverKind::Pcg, 1e-12);
    let gamma = Diffusivity::uniform(1.0, nu());
    let assemble = |t: &VolScalarField| {
        fvm::laplacian(&mesh, &gamma, t, &LaplacianScheme::default())
            .unwrap()
            .negate()
    };

    let mut residuals = Vec::new();
    for n_non_orth in 0..=3 {
        let mut t = VolField::uniform(&mesh, "T", DimensionSet::TEMPERATURE, 0.0, |patch| {
            match patch.name.as_str() {
                "left" => BoundarySpec::FixedValue(0.0),
                "right" => BoundarySpec::FixedValue(1.0),
                _ => BoundarySpec::ZeroGradient,
            }
        })
        .unwrap();

        let mut passes = 0;
        for corr in fv_numerics::control::non_orth_correctors(n_non_orth) {
            assemble(&t).solve(&mut t, &controls).unwrap();
            passes += 1;
            assert_eq!(corr.is_final, corr.index == n_non_orth);
        }
        assert_eq!(passes, n_non_orth + 1);
        assert!(t.internal().iter().all(|&v| (-0.05..=1.05).contains(&v)));

        let r: f64 = assemble(&t).residual(&t).unwrap().iter().map(|v| v.abs()).sum();
        residuals.push(r);
    }

    assert!(residuals[0] > 1e-6, "非正交修正量应不为零: {:?}", residuals);
    for w in residuals.windows(2) {
        assert!(w[1] <= w[0], "残差应随修正次数单调下降: {:?}", residuals);
    }
    assert!(residuals[3] < 0.1 * residuals[0], "{:?}", residuals);
}
