// crates/fv_numerics/src/fv_matrix.rs

//! 有限体积方程矩阵
//!
//! [`FvMatrix`] 表示离散后的表达式 `Aψ − b`：
//!
//! - `ldu`: 内部面系数与对角元
//! - `source`: 右端 b（每单元，与场同型）
//! - `internal_coeffs[patch][face]`: 加到 owner 对角元的边界系数
//! - `boundary_coeffs[patch][face]`: 非耦合边界加到右端；耦合边界作为接口耦合系数
//! - `face_flux_correction`: 显式修正部分的面通量（非正交修正、linearUpwind 修正）
//!
//! 组合运算按值消耗操作数，量纲与场名不一致时报错。
//! 边界贡献只在求解、残差、H 运算时临时并入，矩阵本身保持未修改。

use crate::fields::{FieldValue, SurfaceField, VolField};
use crate::ldu::{InterfaceSet, LduInterface, LduMatrix};
use crate::solvers::{self, SolverPerformance};
use fv_config::{CommsType, FvSolution, RelaxationFactors, SolverControls};
use fv_foundation::{ensure, DimensionSet, FvError, FvResult};
use fv_mesh::{FvMesh, PatchKind};

/// 有限体积方程
#[derive(Debug, Clone)]
pub struct FvMatrix<'m, T: FieldValue> {
    mesh: &'m FvMesh,
    field: String,
    dimensions: DimensionSet,
    ldu: LduMatrix<f64>,
    source: Vec<T>,
    internal_coeffs: Vec<Vec<T>>,
    boundary_coeffs: Vec<Vec<T>>,
    face_flux_correction: Option<SurfaceField<T>>,
}

impl<'m, T: FieldValue> FvMatrix<'m, T> {
    /// 场 `psi` 的空方程，`dimensions` 为体积分后表达式的量纲
    pub fn new(mesh: &'m FvMesh, psi: &VolField<T>, dimensions: DimensionSet) -> FvResult<Self> {
        FvError::check_size("field", mesh.n_cells(), psi.len())?;
        let zeros = || {
            mesh.patches()
                .iter()
                .map(|p| vec![T::zero(); p.size])
                .collect::<Vec<_>>()
        };
        Ok(Self {
            mesh,
            field: psi.name().to_string(),
            dimensions,
            ldu: LduMatrix::new(mesh.ldu_addressing()?),
            source: vec![T::zero(); mesh.n_cells()],
            internal_coeffs: zeros(),
            boundary_coeffs: zeros(),
            face_flux_correction: None,
        })
    }

    // =========================================================================
    // 访问
    // =========================================================================

    /// 网格
    #[inline]
    pub fn mesh(&self) -> &'m FvMesh {
        self.mesh
    }

    /// 场名
    #[inline]
    pub fn field_name(&self) -> &str {
        &self.field
    }

    /// 量纲
    #[inline]
    pub fn dimensions(&self) -> DimensionSet {
        self.dimensions
    }

    /// LDU 系数
    #[inline]
    pub fn ldu(&self) -> &LduMatrix<f64> {
        &self.ldu
    }

    /// LDU 系数（可写）
    #[inline]
    pub fn ldu_mut(&mut self) -> &mut LduMatrix<f64> {
        &mut self.ldu
    }

    /// 右端
    #[inline]
    pub fn source(&self) -> &[T] {
        &self.source
    }

    /// 右端（可写）
    #[inline]
    pub fn source_mut(&mut self) -> &mut [T] {
        &mut self.source
    }

    /// 边界对角系数
    #[inline]
    pub fn internal_coeffs(&self) -> &[Vec<T>] {
        &self.internal_coeffs
    }

    /// 边界对角系数（可写）
    #[inline]
    pub fn internal_coeffs_mut(&mut self) -> &mut [Vec<T>] {
        &mut self.internal_coeffs
    }

    /// 边界右端或耦合系数
    #[inline]
    pub fn boundary_coeffs(&self) -> &[Vec<T>] {
        &self.boundary_coeffs
    }

    /// 边界右端或耦合系数（可写）
    #[inline]
    pub fn boundary_coeffs_mut(&mut self) -> &mut [Vec<T>] {
        &mut self.boundary_coeffs
    }

    /// 单个边界系数 (internal, boundary)
    pub fn patch_coeffs(&self, patchi: usize, face: usize) -> FvResult<(T, T)> {
        FvError::check_index("patch", patchi, self.internal_coeffs.len())?;
        FvError::check_index("patch face", face, self.internal_coeffs[patchi].len())?;
        Ok((
            self.internal_coeffs[patchi][face],
            self.boundary_coeffs[patchi][face],
        ))
    }

    /// 显式修正的面通量
    #[inline]
    pub fn face_flux_correction(&self) -> Option<&SurfaceField<T>> {
        self.face_flux_correction.as_ref()
    }

    /// 设置显式修正的面通量（量纲须与方程一致）
    pub fn set_face_flux_correction(&mut self, correction: SurfaceField<T>) -> FvResult<()> {
        ensure!(
            correction.dimensions() == self.dimensions,
            FvError::dimension_mismatch(
                "faceFluxCorrection",
                &self.field,
                self.dimensions,
                correction.dimensions()
            )
        );
        self.face_flux_correction = Some(correction);
        Ok(())
    }

    fn check_field(&self, psi: &VolField<T>) -> FvResult<()> {
        if psi.name() != self.field {
            return Err(FvError::FieldMismatch {
                expected: self.field.clone(),
                actual: psi.name().to_string(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // 组合
    // =========================================================================

    /// 方程相加
    pub fn add_matrix(mut self, other: Self) -> FvResult<Self> {
        if other.field != self.field {
            return Err(FvError::FieldMismatch {
                expected: self.field,
                actual: other.field,
            });
        }
        ensure!(
            other.dimensions == self.dimensions,
            FvError::dimension_mismatch("+", &self.field, self.dimensions, other.dimensions)
        );

        self.ldu.add_assign(&other.ldu)?;
        for (a, b) in self.source.iter_mut().zip(&other.source) {
            *a += *b;
        }
        for (a, b) in self
            .internal_coeffs
            .iter_mut()
            .flatten()
            .zip(other.internal_coeffs.iter().flatten())
        {
            *a += *b;
        }
        for (a, b) in self
            .boundary_coeffs
            .iter_mut()
            .flatten()
            .zip(other.boundary_coeffs.iter().flatten())
        {
            *a += *b;
        }
        self.face_flux_correction = match (self.face_flux_correction, other.face_flux_correction) {
            (Some(mut a), Some(b)) => {
                a.add_assign(&b)?;
                Some(a)
            }
            (a, b) => a.or(b),
        };
        Ok(self)
    }

    /// 方程相减
    pub fn sub_matrix(self, other: Self) -> FvResult<Self> {
        self.add_matrix(other.negate())
    }

    /// 取负
    pub fn negate(mut self) -> Self {
        self.ldu.negate();
        for v in self
            .source
            .iter_mut()
            .chain(self.internal_coeffs.iter_mut().flatten())
            .chain(self.boundary_coeffs.iter_mut().flatten())
        {
            *v = -*v;
        }
        if let Some(corr) = &mut self.face_flux_correction {
            corr.scale(-1.0);
        }
        self
    }

    fn check_source_dimensions(&self, operation: &'static str, dims: DimensionSet) -> FvResult<()> {
        let integrated = dims * DimensionSet::VOLUME;
        ensure!(
            integrated == self.dimensions,
            FvError::dimension_mismatch(operation, &self.field, self.dimensions, integrated)
        );
        Ok(())
    }

    /// 加显式项 `A + su`（su 为单位体积量）
    pub fn add_source(mut self, su: &[T], dims: DimensionSet) -> FvResult<Self> {
        self.check_source_dimensions("+", dims)?;
        FvError::check_size("source term", self.source.len(), su.len())?;
        for ((s, &v), &vol) in self.source.iter_mut().zip(su).zip(self.mesh.cell_volumes()) {
            *s -= v * vol;
        }
        Ok(self)
    }

    /// 减显式项 `A − su`
    pub fn sub_source(mut self, su: &[T], dims: DimensionSet) -> FvResult<Self> {
        self.check_source_dimensions("-", dims)?;
        FvError::check_size("source term", self.source.len(), su.len())?;
        for ((s, &v), &vol) in self.source.iter_mut().zip(su).zip(self.mesh.cell_volumes()) {
            *s += v * vol;
        }
        Ok(self)
    }

    /// 方程 `A == su`
    pub fn equate(self, su: &[T], dims: DimensionSet) -> FvResult<Self> {
        self.sub_source(su, dims)
    }

    /// 方程 `A == su`，右端为体心场
    pub fn equate_field(self, su: &VolField<T>) -> FvResult<Self> {
        self.sub_source(su.internal(), su.dimensions())
    }

    // =========================================================================
    // 松弛与参考值
    // =========================================================================

    /// 隐式松弛
    ///
    /// 先保证对角占优 |D| ≥ Σ|offdiag|，再 D → D/α，
    /// 右端补 (D/α − D₀)ψ，收敛解不变。
    pub fn relax(&mut self, psi: &VolField<T>, alpha: f64) -> FvResult<()> {
        self.check_field(psi)?;
        FvError::check_range("relaxation factor", alpha, f64::MIN_POSITIVE, 1.0)?;

        let d0 = self.ldu.diag().to_vec();
        let mut d = d0.clone();
        let mut sum_off = self.ldu.sum_mag_off_diag();
        let mut boundary_diag = vec![0.0; d.len()];

        for (patchi, patch) in self.mesh.patches().iter().enumerate() {
            let face_cells = self.mesh.patch_face_cells(patchi);
            for (i, &c) in face_cells.iter().enumerate() {
                let ic = cmpt_max(self.internal_coeffs[patchi][i]);
                boundary_diag[c] += ic;
                if patch.is_coupled() {
                    sum_off[c] += cmpt_max(self.boundary_coeffs[patchi][i].cmpt_mag());
                }
            }
        }

        let mut non_dominant = 0usize;
        for c in 0..d.len() {
            let total = d[c] + boundary_diag[c];
            let dominant = total.abs().max(sum_off[c]);
            if dominant > total.abs() {
                non_dominant += 1;
            }
            let sign = if total < 0.0 { -1.0 } else { 1.0 };
            d[c] = sign * dominant / alpha - boundary_diag[c];
        }
        if non_dominant > 0 {
            log::debug!("{}: 松弛时修正 {} 个非对角占优单元", self.field, non_dominant);
        }

        for ((s, &p), (&dn, &d_old)) in self
            .source
            .iter_mut()
            .zip(psi.internal())
            .zip(d.iter().zip(&d0))
        {
            *s += p * (dn - d_old);
        }
        self.ldu.diag_mut().copy_from_slice(&d);
        Ok(())
    }

    /// 按松弛因子表松弛方程；因子为 1 时不处理
    pub fn relax_from(
        &mut self,
        psi: &VolField<T>,
        factors: &RelaxationFactors,
        final_iter: bool,
    ) -> FvResult<()> {
        let alpha = factors.equation(&self.field, final_iter);
        if alpha < 1.0 {
            log::debug!("{}: 方程松弛因子 {}", self.field, alpha);
            self.relax(psi, alpha)?;
        }
        Ok(())
    }

    /// 固定单元值
    ///
    /// 去掉该单元与相邻单元的全部耦合（相邻单元右端补上已知值的贡献），
    /// 对角元取全矩阵最大 |diag|，右端令解等于 `value`。重复调用结果不变。
    pub fn set_reference(&mut self, cell: usize, value: T) -> FvResult<()> {
        FvError::check_index("reference cell", cell, self.ldu.n_cells())?;

        let addr = self.ldu.addressing_handle();
        for f in addr.owned_faces(cell) {
            let other = addr.upper()[f];
            let coupling = self.ldu.lower()[f];
            self.source[other] -= value * coupling;
            self.ldu.lower_mut()[f] = 0.0;
            self.ldu.upper_mut()[f] = 0.0;
        }
        for &f in addr.neighbour_faces(cell) {
            let other = addr.lower()[f];
            let coupling = self.ldu.upper()[f];
            self.source[other] -= value * coupling;
            self.ldu.lower_mut()[f] = 0.0;
            self.ldu.upper_mut()[f] = 0.0;
        }
        for patchi in 0..self.mesh.patches().len() {
            for (i, &c) in self.mesh.patch_face_cells(patchi).iter().enumerate() {
                if c == cell {
                    self.internal_coeffs[patchi][i] = T::zero();
                    self.boundary_coeffs[patchi][i] = T::zero();
                }
            }
        }

        let scale = self
            .ldu
            .diag()
            .iter()
            .fold(0.0_f64, |m, d| m.max(d.abs()));
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let d = if self.ldu.diag()[cell] < 0.0 { -scale } else { scale };
        self.ldu.diag_mut()[cell] = d;
        self.source[cell] = value * d;
        Ok(())
    }

    // =========================================================================
    // 分量系统
    // =========================================================================

    /// 第 k 分量的求解系统：对角并入边界系数，非耦合边界并入右端，耦合边界生成接口
    ///
    /// 旋转 cyclic 上矢量分量只隐式保留 R_kk，其余分量的耦合显式计入右端。
    fn component_system(
        &self,
        psi: &VolField<T>,
        k: usize,
        comms_type: CommsType,
    ) -> FvResult<(LduMatrix<f64>, Vec<f64>, InterfaceSet<f64>)> {
        let mesh = self.mesh;
        let mut diag = self.ldu.diag().to_vec();
        let mut source: Vec<f64> = self.source.iter().map(|s| s.component(k)).collect();
        let mut interfaces = InterfaceSet::new(mesh.comm_handle(), comms_type);

        for (patchi, patch) in mesh.patches().iter().enumerate() {
            let face_cells = mesh.patch_face_cells(patchi);
            let ic = &self.internal_coeffs[patchi];
            let bc = &self.boundary_coeffs[patchi];
            for (i, &c) in face_cells.iter().enumerate() {
                diag[c] += ic[i].component(k);
            }

            if !patch.is_coupled() {
                for (i, &c) in face_cells.iter().enumerate() {
                    source[c] += bc[i].component(k);
                }
                continue;
            }

            let rotation = match &patch.kind {
                PatchKind::Cyclic { transform, .. } if T::RANK > 0 => transform.rotation(),
                _ => None,
            };
            let coeffs = match (rotation, &patch.kind) {
                (
                    Some(r),
                    PatchKind::Cyclic {
                        neighbour_patch, ..
                    },
                ) => {
                    let r_kk = r.col(k)[k];
                    let nbr_cells = mesh.patch_face_cells(*neighbour_patch);
                    let transformed = &psi.boundary()[patchi].neighbour;
                    for (i, &c) in face_cells.iter().enumerate() {
                        let raw = psi.internal()[nbr_cells[i]].component(k);
                        let explicit = transformed[i].component(k) - r_kk * raw;
                        source[c] += bc[i].component(k) * explicit;
                    }
                    bc.iter().map(|b| b.component(k) * r_kk).collect()
                }
                _ => bc.iter().map(|b| b.component(k)).collect(),
            };
            if let Some(interface) = LduInterface::from_patch(mesh, patchi, coeffs)? {
                interfaces.push(interface);
            }
        }

        let matrix = LduMatrix::from_coeffs(
            self.ldu.addressing_handle(),
            diag,
            self.ldu.lower().to_vec(),
            self.ldu.upper().to_vec(),
        )?;
        Ok((matrix, source, interfaces))
    }

    // =========================================================================
    // 求解
    // =========================================================================

    /// 逐分量求解，返回每个分量的记录；求解后更新边界
    pub fn solve_segregated(
        &self,
        psi: &mut VolField<T>,
        controls: &SolverControls,
    ) -> FvResult<Vec<SolverPerformance>> {
        self.check_field(psi)?;
        log::debug!(
            "{}: 求解 {} 单元, {} 内部面, 求解器 {}",
            self.field,
            self.ldu.n_cells(),
            self.ldu.n_faces(),
            controls.solver.name()
        );

        let mut records = Vec::with_capacity(T::N_COMPONENTS);
        for k in 0..T::N_COMPONENTS {
            let (matrix, source, interfaces) =
                self.component_system(psi, k, controls.comms_type)?;
            let mut x: Vec<f64> = psi.internal().iter().map(|v| v.component(k)).collect();
            let name = format!("{}{}", self.field, T::component_name(k));
            let perf = solvers::solve(&name, &matrix, &interfaces, &mut x, &source, controls)?;
            perf.log();
            for (v, &xv) in psi.internal_mut().iter_mut().zip(&x) {
                v.set_component(k, xv);
            }
            records.push(perf);
        }
        psi.correct_boundary_conditions(self.mesh)?;
        Ok(records)
    }

    /// 求解，矢量场的分量记录合并为一条
    pub fn solve(
        &self,
        psi: &mut VolField<T>,
        controls: &SolverControls,
    ) -> FvResult<SolverPerformance> {
        let mut records = self.solve_segregated(psi, controls)?.into_iter();
        let mut merged = fv_foundation::require!(
            records.next(),
            FvError::internal(format!("{}: 没有可求解的分量", self.field))
        );
        for r in records {
            merged.merge(&r);
        }
        if T::N_COMPONENTS > 1 {
            merged.field = self.field.clone();
        }
        Ok(merged)
    }

    /// 按求解字典查找控制参数后求解
    pub fn solve_with(
        &self,
        psi: &mut VolField<T>,
        solution: &FvSolution,
        final_iter: bool,
    ) -> FvResult<SolverPerformance> {
        let controls = solution.solver_controls(&self.field, final_iter)?;
        self.solve(psi, controls)
    }

    /// 残差 b − Aψ（含边界）
    pub fn residual(&self, psi: &VolField<T>) -> FvResult<Vec<T>> {
        self.check_field(psi)?;
        let mut result = vec![T::zero(); psi.len()];
        for k in 0..T::N_COMPONENTS {
            let (matrix, source, interfaces) =
                self.component_system(psi, k, CommsType::default())?;
            let x: Vec<f64> = psi.internal().iter().map(|v| v.component(k)).collect();
            let mut r = vec![0.0; x.len()];
            matrix.residual(&x, &source, &interfaces, &mut r)?;
            for (v, &rv) in result.iter_mut().zip(&r) {
                v.set_component(k, rv);
            }
        }
        Ok(result)
    }

    // =========================================================================
    // 压力-速度耦合所需运算
    // =========================================================================

    /// 含边界的对角元（分量平均）
    fn total_diag(&self) -> Vec<f64> {
        let mut d = self.ldu.diag().to_vec();
        for patchi in 0..self.mesh.patches().len() {
            for (i, &c) in self.mesh.patch_face_cells(patchi).iter().enumerate() {
                d[c] += cmpt_av(self.internal_coeffs[patchi][i]);
            }
        }
        d
    }

    /// 对角元除以体积 A = D/V
    pub fn a(&self) -> Vec<f64> {
        self.total_diag()
            .iter()
            .zip(self.mesh.cell_volumes())
            .map(|(d, v)| d / v)
            .collect()
    }

    /// H(ψ) = (b − Σ offdiag·ψ_N)/V，含边界右端与耦合对侧值
    pub fn h(&self, psi: &VolField<T>) -> FvResult<Vec<T>> {
        self.check_field(psi)?;
        let mesh = self.mesh;
        let mut h = vec![T::zero(); psi.len()];

        for k in 0..T::N_COMPONENTS {
            let x: Vec<f64> = psi.internal().iter().map(|v| v.component(k)).collect();
            let mut hk = self.ldu.h_op(&x);
            for (v, s) in hk.iter_mut().zip(&self.source) {
                *v += s.component(k);
            }
            for (patchi, patch) in mesh.patches().iter().enumerate() {
                let pf = psi.boundary_field(patchi)?;
                for (i, &c) in mesh.patch_face_cells(patchi).iter().enumerate() {
                    let ic = self.internal_coeffs[patchi][i];
                    let bc = self.boundary_coeffs[patchi][i].component(k);
                    hk[c] += (cmpt_av(ic) - ic.component(k)) * x[c];
                    hk[c] += if patch.is_coupled() {
                        bc * pf.neighbour[i].component(k)
                    } else {
                        bc
                    };
                }
            }
            for (v, &hv) in h.iter_mut().zip(&hk) {
                v.set_component(k, hv);
            }
        }

        for (v, &vol) in h.iter_mut().zip(mesh.cell_volumes()) {
            *v = *v * (1.0 / vol);
        }
        Ok(h)
    }

    /// H1 = −Σ offdiag（含耦合边界）/V
    pub fn h1(&self) -> Vec<f64> {
        let mut h1 = self.ldu.h1();
        for (patchi, patch) in self.mesh.patches().iter().enumerate() {
            if !patch.is_coupled() {
                continue;
            }
            for (i, &c) in self.mesh.patch_face_cells(patchi).iter().enumerate() {
                h1[c] += cmpt_av(self.boundary_coeffs[patchi][i]);
            }
        }
        h1.iter()
            .zip(self.mesh.cell_volumes())
            .map(|(h, v)| h / v)
            .collect()
    }
}

impl<'m> FvMatrix<'m, f64> {
    /// 方程算子对应的面通量：内部面 upper·ψ_N − lower·ψ_P，
    /// 边界面 internalCoeffs·ψ_P − boundaryCoeffs（耦合面乘对侧值），加显式修正
    pub fn flux(&self, psi: &VolField<f64>) -> FvResult<SurfaceField<f64>> {
        self.check_field(psi)?;
        let mesh = self.mesh;
        let internal = self.ldu.face_h(psi.internal());
        let mut boundary = Vec::with_capacity(mesh.patches().len());
        for (patchi, patch) in mesh.patches().iter().enumerate() {
            let pf = psi.boundary_field(patchi)?;
            let values = mesh
                .patch_face_cells(patchi)
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    let ic = self.internal_coeffs[patchi][i];
                    let bc = self.boundary_coeffs[patchi][i];
                    if patch.is_coupled() {
                        ic * psi.internal()[c] - bc * pf.neighbour[i]
                    } else {
                        ic * psi.internal()[c] - bc
                    }
                })
                .collect();
            boundary.push(values);
        }

        let mut flux = SurfaceField::new(
            mesh,
            format!("flux({})", self.field),
            self.dimensions,
            internal,
            boundary,
        )?;
        if let Some(corr) = &self.face_flux_correction {
            flux.add_assign(corr)?;
        }
        Ok(flux)
    }
}

#[inline]
fn cmpt_max<T: FieldValue>(v: T) -> f64 {
    (0..T::N_COMPONENTS)
        .map(|k| v.component(k))
        .fold(f64::NEG_INFINITY, f64::max)
}

#[inline]
fn cmpt_av<T: FieldValue>(v: T) -> f64 {
    (0..T::N_COMPONENTS).map(|k| v.component(k)).sum::<f64>() / T::N_COMPONENTS as f64
}
