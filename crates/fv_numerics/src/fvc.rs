// crates/fv_numerics/src/fvc.rs

//! 显式有限体积运算（fvc）
//!
//! 由已知场直接计算面值、梯度、散度，不生成矩阵。
//! 梯度采用 Gauss 定理：∇ψ_P = (1/V_P) Σ_f S_f ψ_f，面值线性插值。

use crate::fields::{
    coupled_neighbour_values, BoundarySpec, FieldValue, SurfaceField, SurfaceScalarField,
    VolField, VolScalarField, VolVectorField,
};
use fv_config::SnGradScheme;
use fv_foundation::{DimensionSet, FvError, FvResult};
use fv_mesh::{FvMesh, PatchKind, SurfaceGeometry};
use glam::DVec3;

// =============================================================================
// 插值
// =============================================================================

/// 线性插值到面：ψ_f = w ψ_P + (1 − w) ψ_N，边界面取边界值
pub fn interpolate<T: FieldValue>(mesh: &FvMesh, vf: &VolField<T>) -> FvResult<SurfaceField<T>> {
    let geo = mesh.geometry()?;
    let psi = vf.internal();
    let internal = (0..mesh.n_internal_faces())
        .map(|f| {
            let w = geo.weights[f];
            psi[mesh.owner()[f]] * w + psi[mesh.neighbour()[f]] * (1.0 - w)
        })
        .collect();
    let boundary = vf.boundary().iter().map(|pf| pf.value.clone()).collect();
    SurfaceField::new(
        mesh,
        format!("interpolate({})", vf.name()),
        vf.dimensions(),
        internal,
        boundary,
    )
}

// =============================================================================
// 梯度
// =============================================================================

/// 单分量 Gauss 梯度，边界面值由调用方给出
pub fn gauss_grad_component(
    mesh: &FvMesh,
    internal: &[f64],
    boundary: &[Vec<f64>],
) -> FvResult<Vec<DVec3>> {
    FvError::check_size("grad internal", mesh.n_cells(), internal.len())?;
    FvError::check_size("grad patches", mesh.patches().len(), boundary.len())?;
    let geo = mesh.geometry()?;
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let sf = mesh.face_areas();

    let mut grad = vec![DVec3::ZERO; mesh.n_cells()];
    for f in 0..mesh.n_internal_faces() {
        let w = geo.weights[f];
        let face = w * internal[owner[f]] + (1.0 - w) * internal[neighbour[f]];
        grad[owner[f]] += sf[f] * face;
        grad[neighbour[f]] -= sf[f] * face;
    }
    for (patch, values) in mesh.patches().iter().zip(boundary) {
        FvError::check_size("grad patch values", patch.size, values.len())?;
        for (f, &v) in patch.range().zip(values) {
            grad[owner[f]] += sf[f] * v;
        }
    }
    for (g, &v) in grad.iter_mut().zip(mesh.cell_volumes()) {
        *g /= v;
    }
    Ok(grad)
}

/// 各分量的单元梯度
pub fn grad_components<T: FieldValue>(mesh: &FvMesh, vf: &VolField<T>) -> FvResult<Vec<Vec<DVec3>>> {
    (0..T::N_COMPONENTS)
        .map(|k| {
            let internal: Vec<f64> = vf.internal().iter().map(|v| v.component(k)).collect();
            let boundary: Vec<Vec<f64>> = vf
                .boundary()
                .iter()
                .map(|pf| pf.value.iter().map(|v| v.component(k)).collect())
                .collect();
            gauss_grad_component(mesh, &internal, &boundary)
        })
        .collect()
}

/// 标量场梯度
///
/// 结果在非耦合边界取零梯度外推，对称面取对称条件，耦合边界交换对侧值。
pub fn grad(mesh: &FvMesh, vf: &VolScalarField) -> FvResult<VolVectorField> {
    let mut components = grad_components(mesh, vf)?;
    let internal = components.pop().unwrap_or_default();
    VolField::new(
        mesh,
        format!("grad({})", vf.name()),
        vf.dimensions() / DimensionSet::LENGTH,
        internal,
        |patch| match patch.kind {
            PatchKind::Symmetry => BoundarySpec::Symmetry,
            _ => BoundarySpec::coupled_or(patch, BoundarySpec::ZeroGradient),
        },
    )
}

// =============================================================================
// 面法向梯度
// =============================================================================

/// 格式选定的距离系数：orthogonal 用 1/|d|，其余用非正交距离系数
pub fn scheme_delta_coeffs(geo: &SurfaceGeometry, scheme: SnGradScheme) -> (Vec<f64>, Vec<Vec<f64>>) {
    match scheme {
        SnGradScheme::Orthogonal => (
            geo.delta_coeffs.clone(),
            geo.patches.iter().map(|p| p.delta_coeffs.clone()).collect(),
        ),
        _ => (
            geo.non_orth_delta_coeffs.clone(),
            geo.patches
                .iter()
                .map(|p| p.non_orth_delta_coeffs.clone())
                .collect(),
        ),
    }
}

/// 显式非正交修正 k·(∇ψ)_f，内部面与耦合面；非耦合面为零
///
/// limited 格式把修正量限制在正交部分的 ψ/(1 − ψ) 倍以内。
pub fn sn_grad_correction<T: FieldValue>(
    mesh: &FvMesh,
    vf: &VolField<T>,
    scheme: SnGradScheme,
) -> FvResult<SurfaceField<T>> {
    let geo = mesh.geometry()?;
    let name = format!("snGradCorr({})", vf.name());
    let dims = vf.dimensions() / DimensionSet::LENGTH;
    let mut corr = SurfaceField::uniform(mesh, name, dims, T::zero());
    if !scheme.corrected() {
        return Ok(corr);
    }

    let grads = grad_components(mesh, vf)?;
    let nbr_grads = grads
        .iter()
        .map(|g| coupled_neighbour_values(mesh, g))
        .collect::<FvResult<Vec<_>>>()?;
    let limit = scheme.limit_coefficient();
    let (delta, patch_delta) = scheme_delta_coeffs(&geo, scheme);
    let psi = vf.internal();

    let limited = |orth: T, c: T| -> T {
        if limit >= 1.0 {
            return c;
        }
        let l = (limit * orth.mag() / ((1.0 - limit) * c.mag() + f64::MIN_POSITIVE)).min(1.0);
        c * l
    };

    for f in 0..mesh.n_internal_faces() {
        let (p, n) = (mesh.owner()[f], mesh.neighbour()[f]);
        let w = geo.weights[f];
        let k = geo.non_orth_correction[f];
        let mut c = T::zero();
        for (ci, g) in grads.iter().enumerate() {
            c.set_component(ci, k.dot(g[p] * w + g[n] * (1.0 - w)));
        }
        let orth = (psi[n] - psi[p]) * delta[f];
        corr.internal_mut()[f] = limited(orth, c);
    }

    for (patchi, patch) in mesh.patches().iter().enumerate() {
        if !patch.is_coupled() {
            continue;
        }
        let pg = &geo.patches[patchi];
        let face_cells = mesh.patch_face_cells(patchi);
        let nbr_psi = &vf.boundary()[patchi].neighbour;
        for (i, &p) in face_cells.iter().enumerate() {
            let w = pg.weights[i];
            let k = pg.non_orth_correction[i];
            let mut c = T::zero();
            for (ci, g) in grads.iter().enumerate() {
                let g_n = nbr_grads[ci][patchi]
                    .as_ref()
                    .map_or(g[p], |values| values[i]);
                c.set_component(ci, k.dot(g[p] * w + g_n * (1.0 - w)));
            }
            let orth = (nbr_psi[i] - psi[p]) * patch_delta[patchi][i];
            corr.boundary_mut()[patchi][i] = limited(orth, c);
        }
    }
    Ok(corr)
}

/// 面法向梯度
pub fn sn_grad<T: FieldValue>(
    mesh: &FvMesh,
    vf: &VolField<T>,
    scheme: SnGradScheme,
) -> FvResult<SurfaceField<T>> {
    let geo = mesh.geometry()?;
    let (delta, _) = scheme_delta_coeffs(&geo, scheme);
    let psi = vf.internal();

    let mut result = sn_grad_correction(mesh, vf, scheme)?;
    for f in 0..mesh.n_internal_faces() {
        let (p, n) = (mesh.owner()[f], mesh.neighbour()[f]);
        let orth = (psi[n] - psi[p]) * delta[f];
        result.internal_mut()[f] += orth;
    }
    for (patchi, pf) in vf.boundary().iter().enumerate() {
        let psi_p = vf.patch_internal_field(mesh, patchi);
        let mut pg = geo.patches[patchi].clone();
        if scheme == SnGradScheme::Orthogonal {
            pg.non_orth_delta_coeffs = pg.delta_coeffs.clone();
        }
        for (r, g) in result.boundary_mut()[patchi]
            .iter_mut()
            .zip(pf.sn_grad(&pg, &psi_p))
        {
            *r += g;
        }
    }
    Ok(result)
}

// =============================================================================
// 通量、散度与积分
// =============================================================================

/// 体积通量 φ = S_f · U_f
pub fn flux(mesh: &FvMesh, u: &VolVectorField) -> FvResult<SurfaceScalarField> {
    let uf = interpolate(mesh, u)?;
    let sf = mesh.face_areas();
    let internal = uf
        .internal()
        .iter()
        .zip(sf)
        .map(|(v, s)| v.dot(*s))
        .collect();
    let boundary = mesh
        .patches()
        .iter()
        .zip(uf.boundary())
        .map(|(patch, values)| {
            patch
                .range()
                .zip(values)
                .map(|(f, v)| v.dot(sf[f]))
                .collect()
        })
        .collect();
    SurfaceField::new(
        mesh,
        format!("phi({})", u.name()),
        u.dimensions() * DimensionSet::AREA,
        internal,
        boundary,
    )
}

/// 面值求和 Σ_f (owner 为正、neighbour 为负)
pub fn surface_sum<T: FieldValue>(mesh: &FvMesh, sf: &SurfaceField<T>) -> Vec<T> {
    let mut result = vec![T::zero(); mesh.n_cells()];
    for (f, &v) in sf.internal().iter().enumerate() {
        result[mesh.owner()[f]] += v;
        result[mesh.neighbour()[f]] -= v;
    }
    for (patch, values) in mesh.patches().iter().zip(sf.boundary()) {
        for (f, &v) in patch.range().zip(values) {
            result[mesh.owner()[f]] += v;
        }
    }
    result
}

/// 面积分除以体积
pub fn surface_integrate<T: FieldValue>(mesh: &FvMesh, sf: &SurfaceField<T>) -> Vec<T> {
    let mut result = surface_sum(mesh, sf);
    for (r, &v) in result.iter_mut().zip(mesh.cell_volumes()) {
        *r = *r * (1.0 / v);
    }
    result
}

/// 通量散度 (1/V) Σ φ_f
pub fn div(mesh: &FvMesh, flux: &SurfaceScalarField) -> Vec<f64> {
    surface_integrate(mesh, flux)
}

/// 体积分 Σ V ψ（全局）
pub fn domain_integrate<T: FieldValue>(mesh: &FvMesh, vf: &VolField<T>) -> FvResult<T> {
    let comm = mesh.comm();
    let mut total = T::zero();
    for k in 0..T::N_COMPONENTS {
        let local: f64 = vf
            .internal()
            .iter()
            .zip(mesh.cell_volumes())
            .map(|(v, &vol)| v.component(k) * vol)
            .sum();
        total.set_component(k, comm.all_reduce_sum(local)?);
    }
    Ok(total)
}
