// crates/fv_mesh/src/geometry.rs

//! 面插值几何
//!
//! 离散格式需要的面量：面积模、线性插值权重、单元中心距矢量、
//! 距离系数及非正交修正矢量。内部面与耦合边界面用同一套公式，
//! 耦合面的“邻居中心”取自对应 patch（cyclic 经变换）或预存的
//! 对侧单元中心（processor）。

use crate::error::{MeshError, MeshResult};
use crate::mesh::FvMesh;
use crate::patch::PatchKind;
use glam::DVec3;

/// 非正交距离系数下限比例，对应 n·d ≥ 0.05|d|
pub const NON_ORTH_LIMIT: f64 = 0.05;

/// 单个 patch 的面几何
#[derive(Debug, Clone, Default)]
pub struct PatchGeometry {
    /// 面积模
    pub mag_sf: Vec<f64>,
    /// 本侧权重；非耦合面为 1
    pub weights: Vec<f64>,
    /// 单元中心到邻居中心（非耦合面为到面的法向投影）的矢量
    pub delta: Vec<DVec3>,
    /// 1/|d|
    pub delta_coeffs: Vec<f64>,
    /// 1/max(n·d, 0.05|d|)
    pub non_orth_delta_coeffs: Vec<f64>,
    /// n − d·nonOrthDeltaCoeffs；非耦合面为零
    pub non_orth_correction: Vec<DVec3>,
    /// 单位外法向
    pub nf: Vec<DVec3>,
    /// 面心相对本侧单元中心的偏移 C_f − C_P
    pub face_offset: Vec<DVec3>,
    /// 耦合面对侧单元中心（本侧坐标系）；非耦合面为空
    pub neighbour_centres: Vec<DVec3>,
}

impl PatchGeometry {
    /// 面数
    #[inline]
    pub fn len(&self) -> usize {
        self.mag_sf.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mag_sf.is_empty()
    }
}

/// 全网格面几何
#[derive(Debug, Clone)]
pub struct SurfaceGeometry {
    /// 内部面面积模
    pub mag_sf: Vec<f64>,
    /// 内部面 owner 侧权重
    pub weights: Vec<f64>,
    /// 内部面 C_N − C_P
    pub delta: Vec<DVec3>,
    /// 内部面 1/|d|
    pub delta_coeffs: Vec<f64>,
    /// 内部面 1/max(n·d, 0.05|d|)
    pub non_orth_delta_coeffs: Vec<f64>,
    /// 内部面非正交修正矢量
    pub non_orth_correction: Vec<DVec3>,
    /// 各 patch 几何
    pub patches: Vec<PatchGeometry>,
}

impl SurfaceGeometry {
    /// 计算网格的面几何
    pub fn build(mesh: &FvMesh) -> MeshResult<Self> {
        let sf = mesh.face_areas();
        let cf = mesh.face_centres();
        let c = mesh.cell_centres();
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let n_internal = mesh.n_internal_faces();

        let mut geo = Self {
            mag_sf: Vec::with_capacity(n_internal),
            weights: Vec::with_capacity(n_internal),
            delta: Vec::with_capacity(n_internal),
            delta_coeffs: Vec::with_capacity(n_internal),
            non_orth_delta_coeffs: Vec::with_capacity(n_internal),
            non_orth_correction: Vec::with_capacity(n_internal),
            patches: Vec::with_capacity(mesh.patches().len()),
        };

        for f in 0..n_internal {
            let fg = coupled_face(sf[f], cf[f], c[owner[f]], c[neighbour[f]]);
            geo.mag_sf.push(fg.mag_sf);
            geo.weights.push(fg.weight);
            geo.delta.push(fg.delta);
            geo.delta_coeffs.push(fg.delta_coeff);
            geo.non_orth_delta_coeffs.push(fg.non_orth_delta_coeff);
            geo.non_orth_correction.push(fg.non_orth_correction);
        }

        for (patchi, patch) in mesh.patches().iter().enumerate() {
            let mut pg = PatchGeometry::default();
            let nbr_centres = match &patch.kind {
                PatchKind::Cyclic {
                    neighbour_patch,
                    transform,
                } => {
                    let nbr = &mesh.patches()[*neighbour_patch];
                    nbr.range()
                        .map(|f| transform.transform_position(c[owner[f]]))
                        .collect()
                }
                PatchKind::Processor {
                    neighbour_cell_centres,
                    ..
                } => {
                    if neighbour_cell_centres.len() != patch.size {
                        return Err(MeshError::coupled(
                            &patch.name,
                            format!(
                                "对侧单元中心数 {} 与面数 {} 不一致",
                                neighbour_cell_centres.len(),
                                patch.size
                            ),
                        ));
                    }
                    neighbour_cell_centres.clone()
                }
                _ => Vec::new(),
            };

            for (i, f) in patch.range().enumerate() {
                let cp = c[owner[f]];
                pg.nf.push(sf[f].normalize());
                pg.face_offset.push(cf[f] - cp);
                if patch.is_coupled() {
                    let fg = coupled_face(sf[f], cf[f], cp, nbr_centres[i]);
                    pg.mag_sf.push(fg.mag_sf);
                    pg.weights.push(fg.weight);
                    pg.delta.push(fg.delta);
                    pg.delta_coeffs.push(fg.delta_coeff);
                    pg.non_orth_delta_coeffs.push(fg.non_orth_delta_coeff);
                    pg.non_orth_correction.push(fg.non_orth_correction);
                } else {
                    let mag = sf[f].length();
                    let n = sf[f] / mag;
                    let d = n * n.dot(cf[f] - cp);
                    let dc = 1.0 / d.length();
                    pg.mag_sf.push(mag);
                    pg.weights.push(1.0);
                    pg.delta.push(d);
                    pg.delta_coeffs.push(dc);
                    pg.non_orth_delta_coeffs.push(dc);
                    pg.non_orth_correction.push(DVec3::ZERO);
                }
            }
            pg.neighbour_centres = nbr_centres;

            log::trace!("patch {} 几何: {} 面", patchi, pg.len());
            geo.patches.push(pg);
        }

        Ok(geo)
    }

    /// 内部面数
    #[inline]
    pub fn n_internal_faces(&self) -> usize {
        self.mag_sf.len()
    }
}

struct FaceGeometry {
    mag_sf: f64,
    weight: f64,
    delta: DVec3,
    delta_coeff: f64,
    non_orth_delta_coeff: f64,
    non_orth_correction: DVec3,
}

/// 两侧有单元中心的面
fn coupled_face(sf: DVec3, cf: DVec3, cp: DVec3, cn: DVec3) -> FaceGeometry {
    let mag_sf = sf.length();
    let n = sf / mag_sf;
    let d = cn - cp;

    let d_own = sf.dot(cf - cp).abs();
    let d_nei = sf.dot(cn - cf).abs();
    let weight = d_nei / (d_own + d_nei);

    let non_orth_delta_coeff = 1.0 / n.dot(d).max(NON_ORTH_LIMIT * d.length());

    FaceGeometry {
        mag_sf,
        weight,
        delta: d,
        delta_coeff: 1.0 / d.length(),
        non_orth_delta_coeff,
        non_orth_correction: n - d * non_orth_delta_coeff,
    }
}
