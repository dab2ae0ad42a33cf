// crates/fv_mesh/src/decompose.rs

//! 按单元归属把网格拆成分区网格
//!
//! 分区策略由调用方给出（每个单元的 rank）。跨分区的内部面在两侧
//! 各变成一个 processor patch 面，两侧按全局面序号升序配对。

use crate::error::{MeshError, MeshResult};
use crate::mesh::{FvMesh, MeshData};
use crate::patch::{Patch, PatchKind};
use std::collections::BTreeMap;

/// 单个分区
#[derive(Debug)]
pub struct SubMesh {
    /// 分区网格（通信器为串行，使用前需 `with_communicator`）
    pub mesh: FvMesh,
    /// 本地单元到全局单元
    pub cell_map: Vec<usize>,
}

/// processor patch 名称
pub fn processor_patch_name(rank: usize, neighbour_rank: usize) -> String {
    format!("procBoundary{}to{}", rank, neighbour_rank)
}

/// 分区网格
///
/// 原有 patch 在每个分区上都保留（可能为空），processor patch 追加在后。
/// cyclic 配对面的两侧单元必须在同一分区。
pub fn decompose(mesh: &FvMesh, cell_ranks: &[usize], n_ranks: usize) -> MeshResult<Vec<SubMesh>> {
    MeshError::check_size("cell_ranks", mesh.n_cells(), cell_ranks.len())?;
    if n_ranks == 0 {
        return Err(MeshError::topology("decompose", "分区数必须为正"));
    }
    if let Some(&r) = cell_ranks.iter().find(|&&r| r >= n_ranks) {
        return Err(MeshError::topology(
            "decompose",
            format!("rank {} 超出分区数 {}", r, n_ranks),
        ));
    }

    let owner = mesh.owner();
    let neighbour = mesh.neighbour();

    for patch in mesh.patches() {
        if let PatchKind::Cyclic {
            neighbour_patch, ..
        } = &patch.kind
        {
            let nbr = &mesh.patches()[*neighbour_patch];
            for (f, g) in patch.range().zip(nbr.range()) {
                if cell_ranks[owner[f]] != cell_ranks[owner[g]] {
                    return Err(MeshError::coupled(
                        &patch.name,
                        format!("面 {} 与对应面 {} 的单元不在同一分区", f, g),
                    ));
                }
            }
        }
        if matches!(patch.kind, PatchKind::Processor { .. }) {
            return Err(MeshError::coupled(&patch.name, "不能再次分区已分区的网格"));
        }
    }

    let mut local_index = vec![0usize; mesh.n_cells()];
    let mut cell_maps = vec![Vec::new(); n_ranks];
    for (c, &r) in cell_ranks.iter().enumerate() {
        local_index[c] = cell_maps[r].len();
        cell_maps[r].push(c);
    }

    let mut subs = Vec::with_capacity(n_ranks);
    for (rank, cell_map) in cell_maps.into_iter().enumerate() {
        if cell_map.is_empty() {
            return Err(MeshError::topology(
                "decompose",
                format!("分区 {} 没有单元", rank),
            ));
        }

        let mut d = MeshData {
            n_cells: cell_map.len(),
            cell_centres: cell_map.iter().map(|&c| mesh.cell_centres()[c]).collect(),
            cell_volumes: cell_map.iter().map(|&c| mesh.cell_volumes()[c]).collect(),
            ..Default::default()
        };
        let push_face = |d: &mut MeshData, f: usize, cell: usize, flip: bool| {
            let sf = mesh.face_areas()[f];
            d.owner.push(local_index[cell]);
            d.face_areas.push(if flip { -sf } else { sf });
            d.face_centres.push(mesh.face_centres()[f]);
        };

        // 内部面：局部编号保持全局顺序，上三角顺序不变
        let mut shared: BTreeMap<usize, Vec<(usize, usize, bool)>> = BTreeMap::new();
        for f in 0..mesh.n_internal_faces() {
            let (o, n) = (owner[f], neighbour[f]);
            match (cell_ranks[o] == rank, cell_ranks[n] == rank) {
                (true, true) => {
                    push_face(&mut d, f, o, false);
                    d.neighbour.push(local_index[n]);
                }
                (true, false) => shared.entry(cell_ranks[n]).or_default().push((f, o, false)),
                (false, true) => shared.entry(cell_ranks[o]).or_default().push((f, n, true)),
                (false, false) => {}
            }
        }

        for patch in mesh.patches() {
            let start = d.owner.len();
            for f in patch.range() {
                if cell_ranks[owner[f]] == rank {
                    push_face(&mut d, f, owner[f], false);
                }
            }
            d.patches.push(Patch::new(
                patch.name.clone(),
                start,
                d.owner.len() - start,
                patch.kind.clone(),
            ));
        }

        for (nbr_rank, faces) in shared {
            let start = d.owner.len();
            let mut centres = Vec::with_capacity(faces.len());
            for &(f, cell, flip) in &faces {
                push_face(&mut d, f, cell, flip);
                let other = if flip { owner[f] } else { neighbour[f] };
                centres.push(mesh.cell_centres()[other]);
            }
            let (lo, hi) = (rank.min(nbr_rank), rank.max(nbr_rank));
            d.patches.push(Patch::new(
                processor_patch_name(rank, nbr_rank),
                start,
                faces.len(),
                PatchKind::Processor {
                    neighbour_rank: nbr_rank,
                    tag: (lo * n_ranks + hi) as u32,
                    neighbour_cell_centres: centres,
                },
            ));
        }

        log::debug!(
            "分区 {}: {} 单元, {} 内部面, {} patch",
            rank,
            d.n_cells,
            d.neighbour.len(),
            d.patches.len()
        );
        subs.push(SubMesh {
            mesh: FvMesh::new(d)?,
            cell_map,
        });
    }

    Ok(subs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{line_mesh, periodic_line_mesh};

    #[test]
    fn test_split_line_in_two() {
        let mesh = line_mesh(6, 1.0).unwrap();
        let subs = decompose(&mesh, &[0, 0, 0, 1, 1, 1], 2).unwrap();
        assert_eq!(subs.len(), 2);

        let m0 = &subs[0].mesh;
        assert_eq!(m0.n_cells(), 3);
        assert_eq!(m0.n_internal_faces(), 2);
        let p0 = m0.find_patch("procBoundary0to1").unwrap();
        assert_eq!(m0.patches()[p0].size, 1);
        assert!(m0.face_areas()[m0.patches()[p0].start].x > 0.0);

        let m1 = &subs[1].mesh;
        let p1 = m1.find_patch("procBoundary1to0").unwrap();
        // rank 1 上的面法向翻转为指向外侧
        assert!(m1.face_areas()[m1.patches()[p1].start].x < 0.0);
        assert_eq!(subs[1].cell_map, vec![3, 4, 5]);

        // 原 patch 保留，rank 0 上 right 为空
        let right = m0.find_patch("right").unwrap();
        assert_eq!(m0.patches()[right].size, 0);
    }

    #[test]
    fn test_processor_geometry_matches_internal_face() {
        let mesh = line_mesh(4, 1.0).unwrap();
        let serial = mesh.geometry().unwrap();
        let subs = decompose(&mesh, &[0, 0, 1, 1], 2).unwrap();
        let g = subs[0].mesh.geometry().unwrap();
        let p = subs[0].mesh.find_patch("procBoundary0to1").unwrap();
        assert!((g.patches[p].weights[0] - serial.weights[1]).abs() < 1e-14);
        assert!((g.patches[p].delta_coeffs[0] - serial.delta_coeffs[1]).abs() < 1e-12);
    }

    #[test]
    fn test_cyclic_split_rejected() {
        let mesh = periodic_line_mesh(4, 1.0).unwrap();
        assert!(decompose(&mesh, &[0, 0, 1, 1], 2).is_err());
        assert!(decompose(&mesh, &[0, 0, 0, 0], 1).is_ok());
    }

    #[test]
    fn test_empty_rank_rejected() {
        let mesh = line_mesh(4, 1.0).unwrap();
        assert!(decompose(&mesh, &[0, 0, 0, 0], 2).is_err());
        assert!(decompose(&mesh, &[0, 0, 2, 0], 2).is_err());
    }
}
