// crates/fv_mesh/tests/mesh_tests.rs

//! 网格层集成测试

use fv_mesh::decompose::decompose;
use fv_mesh::prelude::*;
use std::sync::Arc;

#[test]
fn test_rect_ldu_addressing_is_upper_triangular() {
    let mesh = rect_mesh(4, 3, 1.0, 0.75).unwrap();
    let addr = mesh.ldu_addressing().unwrap();
    assert_eq!(addr.n_cells(), 12);
    assert_eq!(addr.n_faces(), 3 * 3 + 4 * 2);
    for f in 0..addr.n_faces() {
        assert!(addr.lower()[f] < addr.upper()[f]);
    }
    // losort 按 upper 升序
    let up: Vec<_> = addr.losort().iter().map(|&f| addr.upper()[f]).collect();
    assert!(up.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_skewed_mesh_has_non_orthogonal_correction() {
    let mesh = skewed_rect_mesh(4, 4, 1.0, 1.0, 0.2).unwrap();
    let g = mesh.geometry().unwrap();
    let max_corr = g
        .non_orth_correction
        .iter()
        .map(|k| k.length())
        .fold(0.0, f64::max);
    assert!(max_corr > 0.05);

    let orth = rect_mesh(4, 4, 1.0, 1.0).unwrap();
    let g0 = orth.geometry().unwrap();
    assert!(g0.non_orth_correction.iter().all(|k| k.length() < 1e-12));
    for (w, dc) in g0.weights.iter().zip(&g0.delta_coeffs) {
        assert!((w - 0.5).abs() < 1e-12);
        assert!((dc - 4.0).abs() < 1e-9);
    }
}

#[test]
fn test_boundary_delta_is_normal_distance() {
    let mesh = skewed_rect_mesh(2, 2, 1.0, 1.0, 0.3).unwrap();
    let g = mesh.geometry().unwrap();
    let left = mesh.find_patch("left").unwrap();
    let pg = &g.patches[left];
    for (i, f) in mesh.patches()[left].range().enumerate() {
        let n = mesh.face_areas()[f].normalize();
        let dn = n.dot(mesh.face_centres()[f] - mesh.cell_centres()[mesh.owner()[f]]);
        assert!((pg.delta_coeffs[i] - 1.0 / dn).abs() < 1e-12);
    }
}

#[test]
fn test_decomposed_meshes_agree_across_ranks() {
    let mesh = rect_mesh(4, 2, 1.0, 0.5).unwrap();
    let ranks: Vec<usize> = (0..8).map(|c| usize::from(c % 4 >= 2)).collect();
    let subs = decompose(&mesh, &ranks, 2).unwrap();
    let comms = LocalWorld::create(2);

    std::thread::scope(|s| {
        for (sub, comm) in subs.into_iter().zip(comms) {
            s.spawn(move || {
                let m = sub.mesh.with_communicator(Arc::new(comm));
                m.check_parallel().unwrap();
                let total = m.total_volume().unwrap();
                assert!((total - 0.5).abs() < 1e-12);
            });
        }
    });
}

#[test]
fn test_processor_patch_on_serial_comm_rejected() {
    let mesh = line_mesh(4, 1.0).unwrap();
    let subs = decompose(&mesh, &[0, 0, 1, 1], 2).unwrap();
    assert!(subs[0].mesh.check_parallel().is_err());
}
