// crates/fv_numerics/src/fields/vol_field.rs

//! 体心场
//!
//! 单元值加逐 patch 的边界场。构造时按 patch 类型校验边界条件：
//! 耦合 patch 只能用耦合条件，对称 patch 只能用对称条件，反之亦然。

use super::patch_field::{BoundarySpec, PatchCondition, PatchField};
use super::value::FieldValue;
use crate::fvc;
use fv_foundation::{DimensionSet, FvError, FvResult};
use fv_mesh::{FvMesh, Patch, PatchKind};

/// 体心场
#[derive(Debug, Clone, PartialEq)]
pub struct VolField<T: FieldValue> {
    name: String,
    dimensions: DimensionSet,
    internal: Vec<T>,
    boundary: Vec<PatchField<T>>,
    old_time: Option<Vec<T>>,
    old_old_time: Option<Vec<T>>,
    prev_iter: Option<Vec<T>>,
}

/// 标量体心场
pub type VolScalarField = VolField<f64>;
/// 矢量体心场
pub type VolVectorField = VolField<glam::DVec3>;

impl<T: FieldValue> VolField<T> {
    /// 创建场，`boundary` 为每个 patch 给出边界设定
    pub fn new(
        mesh: &FvMesh,
        name: impl Into<String>,
        dimensions: DimensionSet,
        internal: Vec<T>,
        boundary: impl Fn(&Patch) -> BoundarySpec<T>,
    ) -> FvResult<Self> {
        let name = name.into();
        FvError::check_size("internal field", mesh.n_cells(), internal.len())?;

        let patches = mesh
            .patches()
            .iter()
            .map(|patch| build_patch_field(&name, patch, boundary(patch)))
            .collect::<FvResult<Vec<_>>>()?;

        let mut field = Self {
            name,
            dimensions,
            internal,
            boundary: patches,
            old_time: None,
            old_old_time: None,
            prev_iter: None,
        };
        field.correct_boundary_conditions(mesh)?;
        Ok(field)
    }

    /// 均匀初值
    pub fn uniform(
        mesh: &FvMesh,
        name: impl Into<String>,
        dimensions: DimensionSet,
        value: T,
        boundary: impl Fn(&Patch) -> BoundarySpec<T>,
    ) -> FvResult<Self> {
        Self::new(mesh, name, dimensions, vec![value; mesh.n_cells()], boundary)
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 量纲
    #[inline]
    pub fn dimensions(&self) -> DimensionSet {
        self.dimensions
    }

    /// 单元数
    #[inline]
    pub fn len(&self) -> usize {
        self.internal.len()
    }

    /// 是否无单元
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.internal.is_empty()
    }

    /// 单元值
    #[inline]
    pub fn internal(&self) -> &[T] {
        &self.internal
    }

    /// 单元值（可写）；修改后应调用 [`Self::correct_boundary_conditions`]
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [T] {
        &mut self.internal
    }

    /// 全部边界场
    #[inline]
    pub fn boundary(&self) -> &[PatchField<T>] {
        &self.boundary
    }

    /// 单个边界场
    pub fn boundary_field(&self, patchi: usize) -> FvResult<&PatchField<T>> {
        let n = self.boundary.len();
        self.boundary
            .get(patchi)
            .ok_or_else(|| FvError::index_out_of_bounds("patch", patchi, n))
    }

    /// 单个边界场（可写）
    pub fn boundary_field_mut(&mut self, patchi: usize) -> FvResult<&mut PatchField<T>> {
        let n = self.boundary.len();
        self.boundary
            .get_mut(patchi)
            .ok_or_else(|| FvError::index_out_of_bounds("patch", patchi, n))
    }

    /// 修改 fixedValue 边界的值
    pub fn set_fixed_value(&mut self, patchi: usize, value: T) -> FvResult<()> {
        let name = self.name.clone();
        let pf = self.boundary_field_mut(patchi)?;
        if pf.condition != PatchCondition::FixedValue {
            return Err(FvError::boundary_condition(
                name,
                patchi.to_string(),
                format!("{} 边界不能直接赋值", pf.condition.type_name()),
            ));
        }
        pf.value.fill(value);
        Ok(())
    }

    /// patch 面所在单元的值
    pub fn patch_internal_field(&self, mesh: &FvMesh, patchi: usize) -> Vec<T> {
        mesh.patch_face_cells(patchi)
            .iter()
            .map(|&c| self.internal[c])
            .collect()
    }

    /// 按边界条件更新全部边界值，耦合边界先交换对侧单元值
    pub fn correct_boundary_conditions(&mut self, mesh: &FvMesh) -> FvResult<()> {
        let geo = mesh.geometry()?;
        self.update_extrapolated_gradients(mesh)?;

        let neighbours = coupled_neighbour_values(mesh, &self.internal)?;
        for (patchi, nbr) in neighbours.into_iter().enumerate() {
            let psi_p = self.patch_internal_field(mesh, patchi);
            let pf = &mut self.boundary[patchi];
            if let Some(nbr) = nbr {
                pf.neighbour = nbr;
            }
            pf.evaluate(&geo.patches[patchi], &psi_p);
        }
        Ok(())
    }

    /// 外推边界的法向梯度取单元梯度在 C_f − C_P 上的投影（使用当前边界值，滞后一步）
    fn update_extrapolated_gradients(&mut self, mesh: &FvMesh) -> FvResult<()> {
        if !self
            .boundary
            .iter()
            .any(|pf| matches!(pf.condition, PatchCondition::Extrapolated { .. }))
        {
            return Ok(());
        }
        let geo = mesh.geometry()?;

        for k in 0..T::N_COMPONENTS {
            let internal: Vec<f64> = self.internal.iter().map(|v| v.component(k)).collect();
            let boundary: Vec<Vec<f64>> = self
                .boundary
                .iter()
                .map(|pf| pf.value.iter().map(|v| v.component(k)).collect())
                .collect();
            let grad = fvc::gauss_grad_component(mesh, &internal, &boundary)?;

            for (patchi, pf) in self.boundary.iter_mut().enumerate() {
                if let PatchCondition::Extrapolated { gradient } = &mut pf.condition {
                    let pg = &geo.patches[patchi];
                    for (i, &c) in mesh.patch_face_cells(patchi).iter().enumerate() {
                        let g = grad[c].dot(pg.face_offset[i]) * pg.delta_coeffs[i];
                        gradient[i].set_component(k, g);
                    }
                }
            }
        }
        Ok(())
    }

    /// 是否需要参考值：没有任何 patch（全局）固定场的水平
    pub fn needs_reference(&self, mesh: &FvMesh) -> FvResult<bool> {
        let fixed = self.boundary.iter().any(|pf| pf.condition.fixes_value());
        let any_fixed = mesh.comm().all_reduce_max(if fixed { 1.0 } else { 0.0 })?;
        Ok(any_fixed == 0.0)
    }

    /// 体积加权平均（全局）
    pub fn average(&self, mesh: &FvMesh) -> FvResult<T> {
        let v = mesh.cell_volumes();
        let comm = mesh.comm();
        let total_volume = comm.all_reduce_sum(v.iter().sum())?;
        let mut avg = T::zero();
        for k in 0..T::N_COMPONENTS {
            let local: f64 = self
                .internal
                .iter()
                .zip(v)
                .map(|(x, &vol)| x.component(k) * vol)
                .sum();
            avg.set_component(k, comm.all_reduce_sum(local)? / total_volume);
        }
        Ok(avg)
    }

    // =========================================================================
    // 时间层与迭代层
    // =========================================================================

    /// 保存当前值为旧时间层，原旧时间层后移
    pub fn store_old_time(&mut self) {
        self.old_old_time = self.old_time.take();
        self.old_time = Some(self.internal.clone());
    }

    /// 旧时间层；未保存时为当前值
    pub fn old_time(&self) -> &[T] {
        self.old_time.as_deref().unwrap_or(&self.internal)
    }

    /// 是否已保存旧时间层
    pub fn has_old_time(&self) -> bool {
        self.old_time.is_some()
    }

    /// 更旧的时间层
    pub fn old_old_time(&self) -> Option<&[T]> {
        self.old_old_time.as_deref()
    }

    /// 保存当前值为上一迭代值
    pub fn store_prev_iter(&mut self) {
        self.prev_iter = Some(self.internal.clone());
    }

    /// 上一迭代值
    pub fn prev_iter(&self) -> Option<&[T]> {
        self.prev_iter.as_deref()
    }

    /// 显式松弛 ψ = ψ_prev + α(ψ − ψ_prev)
    ///
    /// 未保存上一迭代值时不做处理。边界值需随后重新计算。
    pub fn relax(&mut self, alpha: f64) -> FvResult<()> {
        FvError::check_range("relaxation factor", alpha, f64::MIN_POSITIVE, 1.0)?;
        match &self.prev_iter {
            Some(prev) => {
                for (x, &p) in self.internal.iter_mut().zip(prev) {
                    *x = p + (*x - p) * alpha;
                }
            }
            None => log::debug!("{}: 无上一迭代值, 跳过场松弛", self.name),
        }
        Ok(())
    }
}

/// 由均匀设定构造边界场并校验 patch 类型
fn build_patch_field<T: FieldValue>(
    field: &str,
    patch: &Patch,
    spec: BoundarySpec<T>,
) -> FvResult<PatchField<T>> {
    let n = patch.size;
    let mismatch = |reason: &str| FvError::boundary_condition(field, &patch.name, reason);

    let coupled = matches!(spec, BoundarySpec::Coupled);
    if coupled != patch.is_coupled() {
        return Err(mismatch(if coupled {
            "耦合条件只能用于 cyclic/processor patch"
        } else {
            "耦合 patch 必须使用耦合条件"
        }));
    }
    let symmetry = matches!(spec, BoundarySpec::Symmetry);
    if symmetry != (patch.kind == PatchKind::Symmetry) {
        return Err(mismatch(if symmetry {
            "对称条件只能用于 symmetry patch"
        } else {
            "symmetry patch 必须使用对称条件"
        }));
    }

    let zeros = vec![T::zero(); n];
    let pf = match spec {
        BoundarySpec::FixedValue(v) => PatchField::new(PatchCondition::FixedValue, vec![v; n]),
        BoundarySpec::FixedGradient(g) => PatchField::new(
            PatchCondition::FixedGradient {
                gradient: vec![g; n],
            },
            zeros,
        ),
        BoundarySpec::ZeroGradient => PatchField::new(PatchCondition::ZeroGradient, zeros),
        BoundarySpec::Mixed {
            ref_value,
            ref_grad,
            value_fraction,
        } => {
            if !(0.0..=1.0).contains(&value_fraction) {
                return Err(mismatch("mixed 的值权重必须在 [0, 1] 内"));
            }
            PatchField::new(
                PatchCondition::Mixed {
                    ref_value: vec![ref_value; n],
                    ref_grad: vec![ref_grad; n],
                    value_fraction: vec![value_fraction; n],
                },
                zeros,
            )
        }
        BoundarySpec::Symmetry => PatchField::new(PatchCondition::Symmetry, zeros),
        BoundarySpec::Extrapolated => PatchField::new(
            PatchCondition::Extrapolated {
                gradient: zeros.clone(),
            },
            zeros,
        ),
        BoundarySpec::Coupled => match patch.kind {
            PatchKind::Cyclic { .. } => PatchField::new(PatchCondition::Cyclic, zeros),
            _ => PatchField::new(PatchCondition::Processor, zeros),
        },
    };
    Ok(pf)
}

/// 各 patch 的耦合对侧单元值（非耦合 patch 为 `None`）
///
/// 先发出全部 processor 数据再逐个接收；cyclic 值经旋转变换到本侧。
pub fn coupled_neighbour_values<T: FieldValue>(
    mesh: &FvMesh,
    internal: &[T],
) -> FvResult<Vec<Option<Vec<T>>>> {
    let comm = mesh.comm();

    for (patchi, patch) in mesh.patches().iter().enumerate() {
        if let PatchKind::Processor {
            neighbour_rank,
            tag,
            ..
        } = &patch.kind
        {
            let data = mesh
                .patch_face_cells(patchi)
                .iter()
                .flat_map(|&c| (0..T::N_COMPONENTS).map(move |k| internal[c].component(k)))
                .collect();
            comm.send(*neighbour_rank, *tag, data)?;
        }
    }

    mesh.patches()
        .iter()
        .map(|patch| match &patch.kind {
            PatchKind::Cyclic {
                neighbour_patch,
                transform,
            } => {
                let rotation = transform.rotation();
                let values = mesh
                    .patch_face_cells(*neighbour_patch)
                    .iter()
                    .map(|&c| match &rotation {
                        Some(r) => internal[c].transform(r),
                        None => internal[c],
                    })
                    .collect();
                Ok(Some(values))
            }
            PatchKind::Processor {
                neighbour_rank,
                tag,
                ..
            } => {
                let data = comm.recv(*neighbour_rank, *tag)?;
                if data.len() != patch.size * T::N_COMPONENTS {
                    return Err(FvError::coupled_patch(
                        &patch.name,
                        format!(
                            "收到 {} 个分量, 期望 {}",
                            data.len(),
                            patch.size * T::N_COMPONENTS
                        ),
                    ));
                }
                let values = data
                    .chunks_exact(T::N_COMPONENTS)
                    .map(|chunk| {
                        let mut v = T::zero();
                        for (k, &x) in chunk.iter().enumerate() {
                            v.set_component(k, x);
                        }
                        v
                    })
                    .collect();
                Ok(Some(values))
            }
            _ => Ok(None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_mesh::generation::{line_mesh, periodic_line_mesh};

    #[test]
    fn test_boundary_evaluated_on_construction() {
        let mesh = line_mesh(4, 1.0).unwrap();
        let t = VolField::new(
            &mesh,
            "T",
            DimensionSet::TEMPERATURE,
            vec![1.0, 2.0, 3.0, 4.0],
            |p| {
                if p.name == "left" {
                    BoundarySpec::FixedValue(0.0)
                } else {
                    BoundarySpec::FixedGradient(8.0)
                }
            },
        )
        .unwrap();
        assert_eq!(t.boundary()[0].value, vec![0.0]);
        // ψ_b = ψ_P + g·|d| = 4 + 8·0.125
        assert!((t.boundary()[1].value[0] - 5.0).abs() < 1e-12);
        assert!(!t.needs_reference(&mesh).unwrap());
    }

    #[test]
    fn test_condition_patch_validation() {
        let mesh = periodic_line_mesh(4, 1.0).unwrap();
        let err = VolField::uniform(&mesh, "T", DimensionSet::DIMLESS, 0.0, |_| {
            BoundarySpec::ZeroGradient
        })
        .unwrap_err();
        assert!(matches!(err, FvError::BoundaryCondition { .. }));

        let t = VolField::uniform(&mesh, "T", DimensionSet::DIMLESS, 1.0, |_| {
            BoundarySpec::Coupled
        })
        .unwrap();
        assert!(t.needs_reference(&mesh).unwrap());
    }

    #[test]
    fn test_cyclic_neighbour_values() {
        let mesh = periodic_line_mesh(4, 1.0).unwrap();
        let t = VolField::new(
            &mesh,
            "T",
            DimensionSet::DIMLESS,
            vec![1.0, 2.0, 3.0, 4.0],
            |_| BoundarySpec::Coupled,
        )
        .unwrap();
        // 左端对侧为最右单元，权重 0.5
        assert_eq!(t.boundary()[0].neighbour, vec![4.0]);
        assert!((t.boundary()[0].value[0] - 2.5).abs() < 1e-12);
        assert_eq!(t.boundary()[1].neighbour, vec![1.0]);
    }

    #[test]
    fn test_old_time_levels_and_relax() {
        let mesh = line_mesh(2, 1.0).unwrap();
        let mut t = VolField::uniform(&mesh, "T", DimensionSet::DIMLESS, 1.0, |_| {
            BoundarySpec::ZeroGradient
        })
        .unwrap();
        assert!(!t.has_old_time());
        t.store_old_time();
        t.internal_mut().fill(2.0);
        t.store_old_time();
        assert_eq!(t.old_time(), &[2.0, 2.0]);
        assert_eq!(t.old_old_time(), Some(&[1.0, 1.0][..]));

        t.store_prev_iter();
        t.internal_mut().fill(4.0);
        t.relax(0.5).unwrap();
        assert_eq!(t.internal(), &[3.0, 3.0]);
        assert!(t.relax(1.5).is_err());
    }

    #[test]
    fn test_average_is_volume_weighted() {
        let mesh = line_mesh(4, 1.0).unwrap();
        let t = VolField::new(
            &mesh,
            "T",
            DimensionSet::DIMLESS,
            vec![1.0, 2.0, 3.0, 6.0],
            |_| BoundarySpec::ZeroGradient,
        )
        .unwrap();
        assert!((t.average(&mesh).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_extrapolated_follows_linear_profile() {
        let mesh = line_mesh(4, 1.0).unwrap();
        // 单元中心 0.125, 0.375, ...；ψ = x
        let mut t = VolField::new(
            &mesh,
            "T",
            DimensionSet::DIMLESS,
            vec![0.125, 0.375, 0.625, 0.875],
            |p| {
                if p.name == "left" {
                    BoundarySpec::FixedValue(0.0)
                } else {
                    BoundarySpec::Extrapolated
                }
            },
        )
        .unwrap();
        // 梯度滞后一步，误差每次减半
        for _ in 0..60 {
            t.correct_boundary_conditions(&mesh).unwrap();
        }
        let right = t.boundary()[1].value[0];
        assert!((right - 1.0).abs() < 1e-12, "right = {}", right);
    }
}
