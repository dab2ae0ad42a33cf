// crates/fv_numerics/src/solvers/gamg/agglomeration.rs

//! 成对聚合
//!
//! 每个未聚合单元与耦合最强（面权重最大）的未聚合邻居配对；
//! 没有未聚合邻居时并入耦合最强的已聚合邻居，否则单独成为粗单元。
//! 一层内重复 `merge_levels` 轮，粗面权重为对应细面权重之和。

use fv_foundation::FvResult;
use fv_mesh::LduAddressing;
use std::collections::BTreeMap;
use std::sync::Arc;

const UNSET: usize = usize::MAX;

/// 细面在粗层上的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceRestrict {
    /// 两侧落在同一粗单元，系数并入对角
    Diag(usize),
    /// 落在粗面上；`flipped` 表示细面的 owner 映射到粗面的 neighbour
    Face {
        /// 粗面编号
        index: usize,
        /// 上下三角是否互换
        flipped: bool,
    },
}

/// 一层粗化的结果
#[derive(Debug, Clone)]
pub struct CoarseLevel {
    /// 细单元 → 粗单元
    pub restrict_addr: Vec<usize>,
    /// 细面 → 粗面或粗单元
    pub face_restrict: Vec<FaceRestrict>,
    /// 粗层寻址
    pub addressing: Arc<LduAddressing>,
}

impl CoarseLevel {
    /// 粗单元数
    #[inline]
    pub fn n_coarse(&self) -> usize {
        self.addressing.n_cells()
    }
}

/// 单轮成对聚合，返回 (细 → 粗映射, 粗单元数)
pub fn agglomerate_pairs(addr: &LduAddressing, weights: &[f64]) -> (Vec<usize>, usize) {
    let n = addr.n_cells();
    let lower = addr.lower();
    let upper = addr.upper();

    let mut map = vec![UNSET; n];
    let mut n_coarse = 0;

    for c in 0..n {
        if map[c] != UNSET {
            continue;
        }

        let neighbours = addr
            .owned_faces(c)
            .map(|f| (upper[f], weights[f]))
            .chain(addr.neighbour_faces(c).iter().map(|&f| (lower[f], weights[f])));

        let mut free: Option<(usize, f64)> = None;
        let mut taken: Option<(usize, f64)> = None;
        for (other, w) in neighbours {
            let slot = if map[other] == UNSET { &mut free } else { &mut taken };
            if slot.map_or(true, |(_, best)| w > best) {
                *slot = Some((other, w));
            }
        }

        match (free, taken) {
            (Some((other, _)), _) => {
                map[c] = n_coarse;
                map[other] = n_coarse;
                n_coarse += 1;
            }
            (None, Some((other, _))) => map[c] = map[other],
            (None, None) => {
                map[c] = n_coarse;
                n_coarse += 1;
            }
        }
    }

    (map, n_coarse)
}

/// 由单元映射构造粗层寻址与面映射
pub fn build_coarse_level(
    addr: &LduAddressing,
    restrict_addr: Vec<usize>,
    n_coarse: usize,
) -> FvResult<CoarseLevel> {
    let lower = addr.lower();
    let upper = addr.upper();

    let mut faces: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for f in 0..addr.n_faces() {
        let (cl, cu) = (restrict_addr[lower[f]], restrict_addr[upper[f]]);
        if cl != cu {
            faces.insert((cl.min(cu), cl.max(cu)), 0);
        }
    }
    // BTreeMap 按 (owner, neighbour) 升序，正好是上三角序
    for (i, index) in faces.values_mut().enumerate() {
        *index = i;
    }

    let face_restrict = (0..addr.n_faces())
        .map(|f| {
            let (cl, cu) = (restrict_addr[lower[f]], restrict_addr[upper[f]]);
            if cl == cu {
                FaceRestrict::Diag(cl)
            } else {
                FaceRestrict::Face {
                    index: faces[&(cl.min(cu), cl.max(cu))],
                    flipped: cl > cu,
                }
            }
        })
        .collect();

    let (coarse_lower, coarse_upper): (Vec<usize>, Vec<usize>) = faces.keys().copied().unzip();
    let addressing = LduAddressing::new(n_coarse, coarse_lower, coarse_upper)?;

    Ok(CoarseLevel {
        restrict_addr,
        face_restrict,
        addressing: Arc::new(addressing),
    })
}

/// 一层粗化：`merge_levels` 轮成对聚合的复合
pub fn agglomerate(
    addr: &LduAddressing,
    weights: &[f64],
    merge_levels: usize,
) -> FvResult<CoarseLevel> {
    let (restrict_addr, n_coarse) = agglomerate_pairs(addr, weights);
    let mut level = build_coarse_level(addr, restrict_addr, n_coarse)?;

    for _ in 1..merge_levels {
        let mut coarse_weights = vec![0.0; level.addressing.n_faces()];
        for (f, target) in level.face_restrict.iter().enumerate() {
            if let FaceRestrict::Face { index, .. } = *target {
                coarse_weights[index] += weights[f];
            }
        }

        let (merge, n_merged) = agglomerate_pairs(&level.addressing, &coarse_weights);
        if n_merged == level.n_coarse() {
            break;
        }
        let composed = level.restrict_addr.iter().map(|&c| merge[c]).collect();
        level = build_coarse_level(addr, composed, n_merged)?;
    }

    Ok(level)
}
