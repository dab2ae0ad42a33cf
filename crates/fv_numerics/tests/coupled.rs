// crates/fv_numerics/tests/coupled.rs

//! cyclic 与 processor 耦合边界

use fv_config::{CommsType, DdtKind, LaplacianScheme, SolverControls, SolverKind};
use fv_foundation::DimensionSet;
use fv_mesh::decompose::decompose;
use fv_mesh::prelude::*;
use fv_numerics::control::TimeState;
use fv_numerics::prelude::*;
use std::f64::consts::PI;
use std::sync::Arc;

fn nu() -> DimensionSet {
    DimensionSet::KINEMATIC_VISCOSITY
}

#[test]
fn test_periodic_diffusion_decays_cosine_mode() {
    let n = 20;
    let dx = 1.0 / n as f64;
    let (dt, gamma) = (0.01, 1.0);
    let mesh = periodic_line_mesh(n, 1.0).unwrap();

    let initial: Vec<f64> = mesh
        .cell_centres()
        .iter()
        .map(|c| (2.0 * PI * c.x).cos())
        .collect();
    let mut t = VolField::new(&mesh, "T", DimensionSet::TEMPERATURE, initial.clone(), |patch| {
        BoundarySpec::coupled_or(patch, BoundarySpec::ZeroGradient)
    })
    .unwrap();
    t.store_old_time();

    let time = TimeState::new(dt).unwrap();
    let eqn = fvm::ddt(&mesh, &t, DdtKind::Euler, &time)
        .unwrap()
        .sub_matrix(
            fvm::laplacian(
                &mesh,
                &Diffusivity::uniform(gamma, nu()),
                &t,
                &LaplacianScheme::default(),
            )
            .unwrap(),
        )
        .unwrap();
    assert!(eqn.ldu().is_symmetric());
    let perf = eqn
        .solve(&mut t, &SolverControls::new(SolverKind::Pcg, 1e-12))
        .unwrap();
    assert!(perf.converged);

    // 余弦模态是离散算子的特征向量
    let lambda = gamma * (2.0 - 2.0 * (2.0 * PI * dx).cos()) / (dx * dx);
    let factor = 1.0 / (1.0 + dt * lambda);
    for (i, (&v, &v0)) in t.internal().iter().zip(&initial).enumerate() {
        assert!((v - factor * v0).abs() < 1e-8, "cell {}: {} vs {}", i, v, factor * v0);
    }
}

/// −∇·∇T = f，左右固定值，上下零梯度
fn poisson_solution(mesh: &FvMesh, comms_type: CommsType) -> Vec<f64> {
    let mut t = VolField::uniform(mesh, "T", DimensionSet::TEMPERATURE, 0.0, |patch| {
        BoundarySpec::coupled_or(
            patch,
            match patch.name.as_str() {
                "left" => BoundarySpec::FixedValue(0.0),
                "right" => BoundarySpec::FixedValue(1.0),
                _ => BoundarySpec::ZeroGradient,
            },
        )
    })
    .unwrap();
    let f_values = mesh
        .cell_centres()
        .iter()
        .map(|c| 4.0 * c.x * (1.0 - c.y))
        .collect();
    let f = VolField::new(
        mesh,
        "f",
        DimensionSet::TEMPERATURE / DimensionSet::TIME,
        f_values,
        |patch| BoundarySpec::coupled_or(patch, BoundarySpec::ZeroGradient),
    )
    .unwrap();

    let eqn = fvm::laplacian(
        mesh,
        &Diffusivity::uniform(1.0, nu()),
        &t,
        &LaplacianScheme::default(),
    )
    .unwrap()
    .negate()
    .sub_matrix(fvm::su(mesh, &f, &t).unwrap())
    .unwrap();
    let controls = SolverControls::new(SolverKind::Pcg, 1e-12).with_comms_type(comms_type);
    let perf = eqn.solve(&mut t, &controls).unwrap();
    assert!(perf.converged, "{}", perf);
    t.internal().to_vec()
}

#[test]
fn test_decomposed_solution_matches_serial() {
    let mesh = rect_mesh(8, 4, 1.0, 0.5).unwrap();
    let serial = poisson_solution(&mesh, CommsType::default());
    let ranks: Vec<usize> = (0..mesh.n_cells()).map(|c| usize::from(c % 8 >= 4)).collect();

    for comms_type in [CommsType::Blocking, CommsType::NonBlocking] {
        let subs = decompose(&mesh, &ranks, 2).unwrap();
        let comms = LocalWorld::create(2);

        let parts: Vec<(Vec<usize>, Vec<f64>)> = std::thread::scope(|s| {
            let handles: Vec<_> = subs
                .into_iter()
                .zip(comms)
                .map(|(sub, comm)| {
                    s.spawn(move || {
                        let local = sub.mesh.with_communicator(Arc::new(comm));
                        let values = poisson_solution(&local, comms_type);
                        (sub.cell_map, values)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("rank 线程异常"))
                .collect()
        });

        let mut covered = 0;
        for (cell_map, values) in parts {
            for (&global, &v) in cell_map.iter().zip(&values) {
                assert!(
                    (serial[global] - v).abs() < 1e-7,
                    "{} cell {}: serial {} vs decomposed {}",
                    comms_type,
                    global,
                    serial[global],
                    v
                );
                covered += 1;
            }
        }
        assert_eq!(covered, mesh.n_cells());
    }
}
