// crates/fv_numerics/src/fvm/laplacian.rs

//! 隐式扩散项 ∇·(Γ∇ψ)
//!
//! 面系数 Γ_f|S_f|·δ_f 对称地放入 upper/lower，对角元为相邻系数和的负值。
//! 非正交网格上 δ_f 取非正交距离系数，剩余部分 Γ_f|S_f| k·(∇ψ)_f
//! 作为显式修正进入右端，同时保存为面通量修正，供压力修正后的通量计算使用。
//!
//! 边界：internalCoeffs = Γ|S|·gradientInternalCoeffs，
//! boundaryCoeffs = −Γ|S|·gradientBoundaryCoeffs。

use crate::fields::{FieldValue, SurfaceField, SurfaceScalarField, VolField, VolScalarField};
use crate::fv_matrix::FvMatrix;
use crate::fvc;
use fv_config::LaplacianScheme;
use fv_foundation::{DimensionSet, FvResult};
use fv_mesh::FvMesh;

/// 扩散系数
#[derive(Debug, Clone, Copy)]
pub enum Diffusivity<'a> {
    /// 全场常数
    Uniform {
        /// 数值
        value: f64,
        /// 量纲
        dimensions: DimensionSet,
    },
    /// 单元值，线性插值到面
    Cell(&'a VolScalarField),
    /// 直接给出面值
    Face(&'a SurfaceScalarField),
}

impl<'a> Diffusivity<'a> {
    /// 常数扩散系数
    pub fn uniform(value: f64, dimensions: DimensionSet) -> Self {
        Self::Uniform { value, dimensions }
    }

    /// 量纲
    pub fn dimensions(&self) -> DimensionSet {
        match self {
            Self::Uniform { dimensions, .. } => *dimensions,
            Self::Cell(vf) => vf.dimensions(),
            Self::Face(sf) => sf.dimensions(),
        }
    }

    /// 面上的扩散系数
    pub fn face_values(&self, mesh: &FvMesh) -> FvResult<SurfaceScalarField> {
        match self {
            Self::Uniform { value, dimensions } => {
                Ok(SurfaceField::uniform(mesh, "gamma", *dimensions, *value))
            }
            Self::Cell(vf) => fvc::interpolate(mesh, vf),
            Self::Face(sf) => Ok((*sf).clone()),
        }
    }
}

/// ∇·(Γ∇ψ)
pub fn laplacian<'m, T: FieldValue>(
    mesh: &'m FvMesh,
    gamma: &Diffusivity<'_>,
    psi: &VolField<T>,
    scheme: &LaplacianScheme,
) -> FvResult<FvMatrix<'m, T>> {
    let geo = mesh.geometry()?;
    let dims = gamma.dimensions() * psi.dimensions() * DimensionSet::LENGTH;
    let mut fvm = FvMatrix::new(mesh, psi, dims)?;

    let gamma_f = gamma.face_values(mesh)?;
    let mut gamma_mag_sf =
        gamma_f.map("gammaMagSf", gamma_f.dimensions() * DimensionSet::AREA, |g| g);
    for (g, &m) in gamma_mag_sf.internal_mut().iter_mut().zip(&geo.mag_sf) {
        *g *= m;
    }
    for (patchi, pg) in geo.patches.iter().enumerate() {
        for (g, &m) in gamma_mag_sf.boundary_mut()[patchi].iter_mut().zip(&pg.mag_sf) {
            *g *= m;
        }
    }

    let (delta, patch_delta) = fvc::scheme_delta_coeffs(&geo, scheme.sn_grad);
    {
        let ldu = fvm.ldu_mut();
        for (f, (&g, &d)) in gamma_mag_sf.internal().iter().zip(&delta).enumerate() {
            ldu.upper_mut()[f] = g * d;
        }
        let upper = ldu.upper().to_vec();
        ldu.lower_mut().copy_from_slice(&upper);
        ldu.neg_sum_diag();
    }

    for (patchi, pf) in psi.boundary().iter().enumerate() {
        let pg = &geo.patches[patchi];
        let psi_p = psi.patch_internal_field(mesh, patchi);
        let gic = pf.gradient_internal_coeffs(pg, &patch_delta[patchi]);
        let gbc = pf.gradient_boundary_coeffs(pg, &patch_delta[patchi], &psi_p);
        let pgamma = &gamma_mag_sf.boundary()[patchi];
        for i in 0..pf.len() {
            fvm.internal_coeffs_mut()[patchi][i] = gic[i] * pgamma[i];
            fvm.boundary_coeffs_mut()[patchi][i] = -(gbc[i] * pgamma[i]);
        }
    }

    if scheme.sn_grad.corrected() {
        let corr = fvc::sn_grad_correction(mesh, psi, scheme.sn_grad)?;
        let mut flux_corr = SurfaceField::uniform(
            mesh,
            format!("faceFluxCorrection({})", psi.name()),
            dims,
            T::zero(),
        );
        for ((fc, &c), &g) in flux_corr
            .internal_mut()
            .iter_mut()
            .zip(corr.internal())
            .zip(gamma_mag_sf.internal())
        {
            *fc = c * g;
        }
        for (patchi, values) in corr.boundary().iter().enumerate() {
            for (i, &c) in values.iter().enumerate() {
                flux_corr.boundary_mut()[patchi][i] = c * gamma_mag_sf.boundary()[patchi][i];
            }
        }
        for (s, v) in fvm.source_mut().iter_mut().zip(fvc::surface_sum(mesh, &flux_corr)) {
            *s -= v;
        }
        fvm.set_face_flux_correction(flux_corr)?;
    }

    log::trace!("laplacian({}) 组装完成: {}", psi.name(), scheme);
    Ok(fvm)
}
