// crates/fv_mesh/src/mesh.rs

//! 面寻址有限体积网格
//!
//! 网格只描述拓扑和几何：
//! - `owner` 覆盖全部面，`neighbour` 只覆盖内部面
//! - 内部面按 (owner, neighbour) 严格递增排列，且 owner < neighbour
//! - 边界面按 patch 连续排列在内部面之后
//! - 面积矢量从 owner 指向 neighbour（边界面指向外侧）
//!
//! 派生量（面几何、LDU 寻址）按 `generation` 缓存。

use crate::cache::DemandCache;
use crate::error::{MeshError, MeshResult};
use crate::geometry::SurfaceGeometry;
use crate::ldu::LduAddressing;
use crate::parallel::{Communicator, SerialComm};
use crate::patch::{CyclicTransform, Patch, PatchKind};
use fv_foundation::{FvError, FvResult};
use glam::DVec3;
use std::fmt;
use std::sync::Arc;

/// 构造网格的原始数据
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// 单元数
    pub n_cells: usize,
    /// 每个面的 owner 单元
    pub owner: Vec<usize>,
    /// 每个内部面的 neighbour 单元
    pub neighbour: Vec<usize>,
    /// 面积矢量
    pub face_areas: Vec<DVec3>,
    /// 面中心
    pub face_centres: Vec<DVec3>,
    /// 单元中心
    pub cell_centres: Vec<DVec3>,
    /// 单元体积
    pub cell_volumes: Vec<f64>,
    /// 边界 patch
    pub patches: Vec<Patch>,
}

/// 有限体积网格
pub struct FvMesh {
    data: MeshData,
    volumes_old: Option<Vec<f64>>,
    volumes_old_old: Option<Vec<f64>>,
    generation: u64,
    comm: Arc<dyn Communicator>,
    geometry: DemandCache<SurfaceGeometry>,
    addressing: DemandCache<LduAddressing>,
}

impl fmt::Debug for FvMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FvMesh")
            .field("n_cells", &self.n_cells())
            .field("n_internal_faces", &self.n_internal_faces())
            .field("n_faces", &self.n_faces())
            .field("n_patches", &self.data.patches.len())
            .field("generation", &self.generation)
            .field("rank", &self.comm.rank())
            .finish()
    }
}

impl FvMesh {
    /// 从原始数据构造并校验
    pub fn new(data: MeshData) -> MeshResult<Self> {
        check(&data)?;
        Ok(Self {
            data,
            volumes_old: None,
            volumes_old_old: None,
            generation: 0,
            comm: Arc::new(SerialComm),
            geometry: DemandCache::new(),
            addressing: DemandCache::new(),
        })
    }

    /// 指定通信器（分区网格）
    pub fn with_communicator(mut self, comm: Arc<dyn Communicator>) -> Self {
        self.comm = comm;
        self
    }

    // =========================================================================
    // 拓扑
    // =========================================================================

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.data.n_cells
    }

    /// 总面数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.data.owner.len()
    }

    /// 内部面数
    #[inline]
    pub fn n_internal_faces(&self) -> usize {
        self.data.neighbour.len()
    }

    /// 面 owner
    #[inline]
    pub fn owner(&self) -> &[usize] {
        &self.data.owner
    }

    /// 内部面 neighbour
    #[inline]
    pub fn neighbour(&self) -> &[usize] {
        &self.data.neighbour
    }

    /// 边界 patch 列表
    #[inline]
    pub fn patches(&self) -> &[Patch] {
        &self.data.patches
    }

    /// 按序号取 patch
    pub fn patch(&self, patchi: usize) -> MeshResult<&Patch> {
        MeshError::check_index("patch", patchi, self.data.patches.len())?;
        Ok(&self.data.patches[patchi])
    }

    /// 按名称查找 patch 序号
    pub fn find_patch(&self, name: &str) -> Option<usize> {
        self.data.patches.iter().position(|p| p.name == name)
    }

    /// patch 面的 owner 单元
    #[inline]
    pub fn patch_face_cells(&self, patchi: usize) -> &[usize] {
        &self.data.owner[self.data.patches[patchi].range()]
    }

    // =========================================================================
    // 几何
    // =========================================================================

    /// 面积矢量
    #[inline]
    pub fn face_areas(&self) -> &[DVec3] {
        &self.data.face_areas
    }

    /// 面中心
    #[inline]
    pub fn face_centres(&self) -> &[DVec3] {
        &self.data.face_centres
    }

    /// 单元中心
    #[inline]
    pub fn cell_centres(&self) -> &[DVec3] {
        &self.data.cell_centres
    }

    /// 单元体积
    #[inline]
    pub fn cell_volumes(&self) -> &[f64] {
        &self.data.cell_volumes
    }

    /// 上一时间层体积；静止网格等于当前体积
    pub fn volumes_old(&self) -> &[f64] {
        self.volumes_old
            .as_deref()
            .unwrap_or(&self.data.cell_volumes)
    }

    /// 上上时间层体积
    pub fn volumes_old_old(&self) -> &[f64] {
        self.volumes_old_old
            .as_deref()
            .unwrap_or_else(|| self.volumes_old())
    }

    /// 是否有体积变化历史
    #[inline]
    pub fn is_moving(&self) -> bool {
        self.volumes_old.is_some()
    }

    /// 总体积（全局）
    pub fn total_volume(&self) -> FvResult<f64> {
        self.comm
            .all_reduce_sum(self.data.cell_volumes.iter().sum())
    }

    /// 面几何（按代缓存）
    pub fn geometry(&self) -> MeshResult<Arc<SurfaceGeometry>> {
        self.geometry
            .get_or_try_init(self.generation, || SurfaceGeometry::build(self))
    }

    /// LDU 寻址（按代缓存）
    pub fn ldu_addressing(&self) -> MeshResult<Arc<LduAddressing>> {
        self.addressing.get_or_try_init(self.generation, || {
            LduAddressing::new(
                self.data.n_cells,
                self.data.owner[..self.n_internal_faces()].to_vec(),
                self.data.neighbour.clone(),
            )
        })
    }

    // =========================================================================
    // 变化通知
    // =========================================================================

    /// 网格代数
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 更新单元体积（运动网格），旧体积依次后移
    pub fn move_volumes(&mut self, volumes: Vec<f64>) -> MeshResult<()> {
        MeshError::check_size("cell_volumes", self.data.n_cells, volumes.len())?;
        if let Some(c) = volumes.iter().position(|v| !(*v > 0.0)) {
            return Err(MeshError::topology(
                "move_volumes",
                format!("单元 {} 体积非正: {}", c, volumes[c]),
            ));
        }
        let current = std::mem::replace(&mut self.data.cell_volumes, volumes);
        self.volumes_old_old = self.volumes_old.take().or_else(|| Some(current.clone()));
        self.volumes_old = Some(current);
        self.invalidate();
        Ok(())
    }

    /// 显式通知网格变化，派生量在下次访问时重算
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.geometry.invalidate();
        self.addressing.invalidate();
        log::debug!("网格代数更新为 {}", self.generation);
    }

    // =========================================================================
    // 并行
    // =========================================================================

    /// 通信器
    #[inline]
    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// 通信器句柄
    #[inline]
    pub fn comm_handle(&self) -> Arc<dyn Communicator> {
        Arc::clone(&self.comm)
    }

    /// 与对侧 rank 核对 processor patch 面数
    pub fn check_parallel(&self) -> FvResult<()> {
        let procs: Vec<_> = self
            .data
            .patches
            .iter()
            .filter_map(|p| match &p.kind {
                PatchKind::Processor {
                    neighbour_rank,
                    tag,
                    ..
                } => Some((p, *neighbour_rank, *tag)),
                _ => None,
            })
            .collect();

        if !procs.is_empty() && !self.comm.is_parallel() {
            return Err(FvError::coupled_patch(
                &procs[0].0.name,
                "串行通信器下不能使用 processor patch",
            ));
        }

        for &(p, nbr, tag) in &procs {
            self.comm.send(nbr, tag, vec![p.size as f64])?;
        }
        for &(p, nbr, tag) in &procs {
            let msg = self.comm.recv(nbr, tag)?;
            let nbr_size = msg.first().copied().unwrap_or(-1.0);
            if nbr_size != p.size as f64 {
                return Err(FvError::coupled_patch(
                    &p.name,
                    format!("面数 {} 与 rank {} 上对应面数 {} 不一致", p.size, nbr, nbr_size),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// 校验
// =============================================================================

fn check(data: &MeshData) -> MeshResult<()> {
    let n_cells = data.n_cells;
    let n_faces = data.owner.len();
    let n_internal = data.neighbour.len();

    if n_cells == 0 {
        return Err(MeshError::topology("check", "网格没有单元"));
    }
    if n_internal > n_faces {
        return Err(MeshError::topology(
            "check",
            format!("内部面数 {} 超过总面数 {}", n_internal, n_faces),
        ));
    }
    MeshError::check_size("face_areas", n_faces, data.face_areas.len())?;
    MeshError::check_size("face_centres", n_faces, data.face_centres.len())?;
    MeshError::check_size("cell_centres", n_cells, data.cell_centres.len())?;
    MeshError::check_size("cell_volumes", n_cells, data.cell_volumes.len())?;

    for &c in &data.owner {
        MeshError::check_index("owner", c, n_cells)?;
    }
    for &c in &data.neighbour {
        MeshError::check_index("neighbour", c, n_cells)?;
    }

    // 上三角顺序
    for f in 0..n_internal {
        let (o, n) = (data.owner[f], data.neighbour[f]);
        if o >= n {
            return Err(MeshError::topology(
                "check",
                format!("内部面 {} 的 owner {} 不小于 neighbour {}", f, o, n),
            ));
        }
        if f > 0 && (data.owner[f - 1], data.neighbour[f - 1]) >= (o, n) {
            return Err(MeshError::topology(
                "check",
                format!("内部面 {} 未按 (owner, neighbour) 递增排列", f),
            ));
        }
    }

    if let Some(c) = data.cell_volumes.iter().position(|v| !(*v > 0.0)) {
        return Err(MeshError::topology(
            "check",
            format!("单元 {} 体积非正: {}", c, data.cell_volumes[c]),
        ));
    }
    if let Some(f) = data.face_areas.iter().position(|s| !(s.length() > 0.0)) {
        return Err(MeshError::topology("check", format!("面 {} 面积为零", f)));
    }

    // patch 连续覆盖边界面
    let mut next = n_internal;
    for p in &data.patches {
        if p.start != next {
            return Err(MeshError::topology(
                "check",
                format!("patch {} 起点 {} 应为 {}", p.name, p.start, next),
            ));
        }
        next += p.size;
    }
    if next != n_faces {
        return Err(MeshError::topology(
            "check",
            format!("patch 覆盖到面 {}, 总面数 {}", next, n_faces),
        ));
    }

    for (patchi, p) in data.patches.iter().enumerate() {
        if let PatchKind::Cyclic {
            neighbour_patch,
            transform,
        } = &p.kind
        {
            check_cyclic(data, patchi, *neighbour_patch, transform)?;
        }
        if let PatchKind::Processor {
            neighbour_cell_centres,
            ..
        } = &p.kind
        {
            if neighbour_cell_centres.len() != p.size {
                return Err(MeshError::coupled(
                    &p.name,
                    format!(
                        "对侧单元中心数 {} 与面数 {} 不一致",
                        neighbour_cell_centres.len(),
                        p.size
                    ),
                ));
            }
        }
    }

    Ok(())
}

fn check_cyclic(
    data: &MeshData,
    patchi: usize,
    nbr: usize,
    transform: &CyclicTransform,
) -> MeshResult<()> {
    let p = &data.patches[patchi];
    let q = data
        .patches
        .get(nbr)
        .ok_or_else(|| MeshError::coupled(&p.name, format!("对应 patch {} 不存在", nbr)))?;

    if nbr == patchi {
        return Err(MeshError::coupled(&p.name, "cyclic patch 不能与自身配对"));
    }
    match &q.kind {
        PatchKind::Cyclic {
            neighbour_patch,
            transform: back,
        } => {
            if *neighbour_patch != patchi {
                return Err(MeshError::coupled(
                    &p.name,
                    format!("对应 patch {} 未回指本 patch", q.name),
                ));
            }
            if !transforms_close(&back.inverse(), transform) {
                return Err(MeshError::coupled(
                    &p.name,
                    format!("与 {} 的变换不互逆", q.name),
                ));
            }
        }
        _ => {
            return Err(MeshError::coupled(
                &p.name,
                format!("对应 patch {} 不是 cyclic", q.name),
            ))
        }
    }
    if p.size != q.size {
        return Err(MeshError::coupled(
            &p.name,
            format!("面数 {} 与对应 patch {} 面数 {} 不一致", p.size, q.name, q.size),
        ));
    }
    Ok(())
}

fn transforms_close(a: &CyclicTransform, b: &CyclicTransform) -> bool {
    const TOL: f64 = 1e-10;
    match (a, b) {
        (CyclicTransform::None, CyclicTransform::None) => true,
        (
            CyclicTransform::Translational { separation: s1 },
            CyclicTransform::Translational { separation: s2 },
        ) => (*s1 - *s2).length() <= TOL * (1.0 + s1.length()),
        (
            CyclicTransform::Rotational { rotation: r1 },
            CyclicTransform::Rotational { rotation: r2 },
        ) => r1.abs_diff_eq(*r2, TOL),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cells() -> MeshData {
        MeshData {
            n_cells: 2,
            owner: vec![0, 0, 1],
            neighbour: vec![1],
            face_areas: vec![DVec3::X, -DVec3::X, DVec3::X],
            face_centres: vec![
                DVec3::new(1.0, 0.5, 0.5),
                DVec3::new(0.0, 0.5, 0.5),
                DVec3::new(2.0, 0.5, 0.5),
            ],
            cell_centres: vec![DVec3::new(0.5, 0.5, 0.5), DVec3::new(1.5, 0.5, 0.5)],
            cell_volumes: vec![1.0, 1.0],
            patches: vec![
                Patch::new("left", 1, 1, PatchKind::Patch),
                Patch::new("right", 2, 1, PatchKind::Patch),
            ],
        }
    }

    #[test]
    fn test_valid_mesh() {
        let mesh = FvMesh::new(two_cells()).unwrap();
        assert_eq!(mesh.n_cells(), 2);
        assert_eq!(mesh.n_internal_faces(), 1);
        assert_eq!(mesh.patch_face_cells(1), &[1]);
        assert_eq!(mesh.find_patch("left"), Some(0));
        assert!(mesh.check_parallel().is_ok());
    }

    #[test]
    fn test_reject_lower_triangular_face() {
        let mut d = two_cells();
        d.owner[0] = 1;
        d.neighbour[0] = 0;
        assert!(matches!(
            FvMesh::new(d),
            Err(MeshError::InvalidTopology { .. })
        ));
    }

    #[test]
    fn test_reject_patch_gap() {
        let mut d = two_cells();
        d.patches.pop();
        assert!(FvMesh::new(d).is_err());
    }

    #[test]
    fn test_reject_unpaired_cyclic() {
        let mut d = two_cells();
        d.patches[0].kind = PatchKind::Cyclic {
            neighbour_patch: 1,
            transform: CyclicTransform::None,
        };
        assert!(matches!(FvMesh::new(d), Err(MeshError::CoupledPatch { .. })));
    }

    #[test]
    fn test_geometry_cached_by_generation() {
        let mut mesh = FvMesh::new(two_cells()).unwrap();
        let g1 = mesh.geometry().unwrap();
        let g2 = mesh.geometry().unwrap();
        assert!(Arc::ptr_eq(&g1, &g2));

        mesh.move_volumes(vec![1.1, 0.9]).unwrap();
        assert_eq!(mesh.generation(), 1);
        assert_eq!(mesh.volumes_old(), &[1.0, 1.0]);
        let g3 = mesh.geometry().unwrap();
        assert!(!Arc::ptr_eq(&g1, &g3));
    }

    #[test]
    fn test_move_volumes_shifts_history() {
        let mut mesh = FvMesh::new(two_cells()).unwrap();
        assert!(!mesh.is_moving());
        mesh.move_volumes(vec![2.0, 2.0]).unwrap();
        mesh.move_volumes(vec![3.0, 3.0]).unwrap();
        assert_eq!(mesh.cell_volumes(), &[3.0, 3.0]);
        assert_eq!(mesh.volumes_old(), &[2.0, 2.0]);
        assert_eq!(mesh.volumes_old_old(), &[1.0, 1.0]);
        assert!(mesh.move_volumes(vec![1.0]).is_err());
    }
}
