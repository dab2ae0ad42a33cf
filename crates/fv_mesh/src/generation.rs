// crates/fv_mesh/src/generation.rs

//! 结构化测试网格生成
//!
//! 生成的网格厚度为 1（z 方向），不带前后面 patch。
//! 单元编号 `c = j * nx + i`，每个单元依次生成东面、北面，
//! 因此内部面天然满足上三角顺序。

use crate::error::{MeshError, MeshResult};
use crate::mesh::{FvMesh, MeshData};
use crate::patch::{CyclicTransform, Patch, PatchKind};
use glam::DVec3;

/// 一维网格，两端 patch 为 `left` 与 `right`
pub fn line_mesh(n_cells: usize, length: f64) -> MeshResult<FvMesh> {
    FvMesh::new(line_data(n_cells, length, PatchKind::Patch, PatchKind::Patch)?)
}

/// 一维周期网格，两端为互相配对的 cyclic patch
pub fn periodic_line_mesh(n_cells: usize, length: f64) -> MeshResult<FvMesh> {
    let left = PatchKind::Cyclic {
        neighbour_patch: 1,
        transform: CyclicTransform::Translational {
            separation: DVec3::new(-length, 0.0, 0.0),
        },
    };
    let right = PatchKind::Cyclic {
        neighbour_patch: 0,
        transform: CyclicTransform::Translational {
            separation: DVec3::new(length, 0.0, 0.0),
        },
    };
    FvMesh::new(line_data(n_cells, length, left, right)?)
}

fn line_data(n: usize, length: f64, left: PatchKind, right: PatchKind) -> MeshResult<MeshData> {
    check_extent("line_mesh", n, length)?;
    let dx = length / n as f64;

    let mut d = MeshData {
        n_cells: n,
        cell_centres: (0..n)
            .map(|i| DVec3::new((i as f64 + 0.5) * dx, 0.5, 0.5))
            .collect(),
        cell_volumes: vec![dx; n],
        ..Default::default()
    };

    for i in 0..n - 1 {
        d.owner.push(i);
        d.neighbour.push(i + 1);
        d.face_areas.push(DVec3::X);
        d.face_centres
            .push(DVec3::new((i + 1) as f64 * dx, 0.5, 0.5));
    }

    d.owner.extend([0, n - 1]);
    d.face_areas.extend([-DVec3::X, DVec3::X]);
    d.face_centres
        .extend([DVec3::new(0.0, 0.5, 0.5), DVec3::new(length, 0.5, 0.5)]);
    d.patches = vec![
        Patch::new("left", n - 1, 1, left),
        Patch::new("right", n, 1, right),
    ];
    Ok(d)
}

/// 矩形网格，patch 依次为 `left`、`right`、`bottom`、`top`
pub fn rect_mesh(nx: usize, ny: usize, lx: f64, ly: f64) -> MeshResult<FvMesh> {
    skewed_rect_mesh(nx, ny, lx, ly, 0.0)
}

/// 剪切变形的矩形网格：x' = x + skew·y
///
/// 东西向的面随之倾斜，单元中心连线不再与面法向平行，
/// 用于检验非正交修正。
pub fn skewed_rect_mesh(nx: usize, ny: usize, lx: f64, ly: f64, skew: f64) -> MeshResult<FvMesh> {
    check_extent("rect_mesh", nx, lx)?;
    check_extent("rect_mesh", ny, ly)?;
    if !skew.is_finite() {
        return Err(MeshError::topology("rect_mesh", format!("剪切系数无效: {}", skew)));
    }

    let dx = lx / nx as f64;
    let dy = ly / ny as f64;
    let n_cells = nx * ny;
    let at = |x: f64, y: f64| DVec3::new(x + skew * y, y, 0.5);
    let cell = |i: usize, j: usize| j * nx + i;

    let east_sf = DVec3::new(dy, -skew * dy, 0.0);
    let north_sf = DVec3::new(0.0, dx, 0.0);

    let mut d = MeshData {
        n_cells,
        ..Default::default()
    };
    for j in 0..ny {
        for i in 0..nx {
            d.cell_centres
                .push(at((i as f64 + 0.5) * dx, (j as f64 + 0.5) * dy));
            d.cell_volumes.push(dx * dy);
        }
    }

    for j in 0..ny {
        for i in 0..nx {
            let c = cell(i, j);
            if i + 1 < nx {
                d.owner.push(c);
                d.neighbour.push(c + 1);
                d.face_areas.push(east_sf);
                d.face_centres
                    .push(at((i + 1) as f64 * dx, (j as f64 + 0.5) * dy));
            }
            if j + 1 < ny {
                d.owner.push(c);
                d.neighbour.push(c + nx);
                d.face_areas.push(north_sf);
                d.face_centres
                    .push(at((i as f64 + 0.5) * dx, (j + 1) as f64 * dy));
            }
        }
    }

    let left = (0..ny)
        .map(|j| (cell(0, j), -east_sf, at(0.0, (j as f64 + 0.5) * dy)))
        .collect();
    push_patch(&mut d, "left", left);
    let right = (0..ny)
        .map(|j| (cell(nx - 1, j), east_sf, at(lx, (j as f64 + 0.5) * dy)))
        .collect();
    push_patch(&mut d, "right", right);
    let bottom = (0..nx)
        .map(|i| (cell(i, 0), -north_sf, at((i as f64 + 0.5) * dx, 0.0)))
        .collect();
    push_patch(&mut d, "bottom", bottom);
    let top = (0..nx)
        .map(|i| (cell(i, ny - 1), north_sf, at((i as f64 + 0.5) * dx, ly)))
        .collect();
    push_patch(&mut d, "top", top);

    FvMesh::new(d)
}

fn push_patch(d: &mut MeshData, name: &str, faces: Vec<(usize, DVec3, DVec3)>) {
    let start = d.owner.len();
    let size = faces.len();
    for (c, sf, cf) in faces {
        d.owner.push(c);
        d.face_areas.push(sf);
        d.face_centres.push(cf);
    }
    d.patches.push(Patch::new(name, start, size, PatchKind::Patch));
}

fn check_extent(operation: &'static str, n: usize, length: f64) -> MeshResult<()> {
    if n == 0 {
        return Err(MeshError::topology(operation, "单元数必须为正"));
    }
    if !(length > 0.0 && length.is_finite()) {
        return Err(MeshError::topology(operation, format!("长度无效: {}", length)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_mesh_layout() {
        let m = line_mesh(10, 1.0).unwrap();
        assert_eq!(m.n_cells(), 10);
        assert_eq!(m.n_internal_faces(), 9);
        assert_eq!(m.n_faces(), 11);
        assert!((m.cell_centres()[3].x - 0.35).abs() < 1e-14);
        assert_eq!(m.patch_face_cells(0), &[0]);
        assert_eq!(m.patch_face_cells(1), &[9]);
    }

    #[test]
    fn test_single_cell_line() {
        let m = line_mesh(1, 2.0).unwrap();
        assert_eq!(m.n_internal_faces(), 0);
        assert_eq!(m.patches().len(), 2);
    }

    #[test]
    fn test_periodic_line_geometry_wraps() {
        let m = periodic_line_mesh(4, 1.0).unwrap();
        let g = m.geometry().unwrap();
        let left = &g.patches[0];
        assert!((left.neighbour_centres[0].x + 0.125).abs() < 1e-14);
        assert!((left.weights[0] - 0.5).abs() < 1e-14);
        assert!((left.delta_coeffs[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_rect_mesh_closed_cells() {
        let m = skewed_rect_mesh(3, 2, 1.0, 1.0, 0.3).unwrap();
        let mut sum = vec![DVec3::ZERO; m.n_cells()];
        for f in 0..m.n_faces() {
            sum[m.owner()[f]] += m.face_areas()[f];
            if f < m.n_internal_faces() {
                sum[m.neighbour()[f]] -= m.face_areas()[f];
            }
        }
        for s in sum {
            assert!(s.length() < 1e-12);
        }
        assert_eq!(m.patches().len(), 4);
    }

    #[test]
    fn test_rect_mesh_rejects_empty() {
        assert!(rect_mesh(0, 2, 1.0, 1.0).is_err());
        assert!(line_mesh(3, -1.0).is_err());
    }
}
