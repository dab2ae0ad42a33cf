// crates/fv_numerics/src/fvm/convection.rs

//! 隐式对流项 ∇·(φψ)
//!
//! 面值 ψ_f = w ψ_P + (1 − w) ψ_N，矩阵系数：
//!
//! ```text
//! lower = −w φ
//! upper = lower + φ
//! diag  = −Σ (lower, upper)
//! ```
//!
//! 边界：internalCoeffs = φ_b · valueInternalCoeffs，
//! boundaryCoeffs = −φ_b · valueBoundaryCoeffs。
//!
//! TVD 格式的权重为 `limiter·w_linear + (1 − limiter)·w_upwind`，
//! 限制器以梯度比 r = 2 (d·∇ψ_C)/(ψ_N − ψ_P) − 1 为自变量。
//! linearUpwind 取迎风权重，另加显式修正 φ (C_f − C_C)·∇ψ_C。

use crate::fields::{coupled_neighbour_values, FieldValue, SurfaceField, SurfaceScalarField, VolField};
use crate::fv_matrix::FvMatrix;
use crate::fvc;
use fv_config::{ConvectionScheme, InterpolationKind};
use fv_foundation::{DimensionSet, FvError, FvResult};
use fv_mesh::FvMesh;
use fv_runtime::RuntimeScalar;
use glam::DVec3;

// =============================================================================
// 限制器
// =============================================================================

/// 梯度比 r，对大比值截断
///
/// `grad_c` 为迎风单元梯度在 d = C_N − C_P 上的投影，`grad_f` 为 ψ_N − ψ_P。
pub fn gradient_ratio(grad_c: f64, grad_f: f64) -> f64 {
    let sign = |x: f64| if x >= 0.0 { 1.0 } else { -1.0 };
    if grad_c.abs() >= 1000.0 * grad_f.abs() {
        2.0 * 1000.0 * sign(grad_c) * sign(grad_f) - 1.0
    } else {
        2.0 * (grad_c / grad_f) - 1.0
    }
}

/// 限制器函数 ψ(r) ∈ [0, 2]
pub fn limiter(kind: InterpolationKind, coefficient: f64, r: f64) -> f64 {
    match kind {
        InterpolationKind::LimitedLinear => {
            let two_by_k = 2.0 / coefficient.max(f64::SMALL);
            (two_by_k * r).min(1.0).max(0.0)
        }
        InterpolationKind::VanLeer => (r + r.abs()) / (1.0 + r.abs()),
        InterpolationKind::Minmod => r.min(1.0).min(2.0).max(0.0),
        InterpolationKind::SuperBee => (2.0 * r).min(1.0).max(r.min(2.0)).max(0.0),
        InterpolationKind::Muscl => (2.0 * r).min(0.5 * r + 0.5).min(2.0).max(0.0),
        InterpolationKind::Linear => 1.0,
        InterpolationKind::Upwind | InterpolationKind::LinearUpwind => 0.0,
    }
}

#[inline]
fn pos0(phi: f64) -> f64 {
    if phi >= 0.0 {
        1.0
    } else {
        0.0
    }
}

/// 单个面的 TVD 权重，矢量取各分量限制器的最小值
#[allow(clippy::too_many_arguments)]
fn limited_weight<T: FieldValue>(
    scheme: &ConvectionScheme,
    phi: f64,
    w_linear: f64,
    d: DVec3,
    psi_p: T,
    psi_n: T,
    grad_p: &[DVec3],
    grad_n: &[DVec3],
) -> f64 {
    let mut lim = 2.0_f64;
    for k in 0..T::N_COMPONENTS {
        let grad_f = psi_n.component(k) - psi_p.component(k);
        let grad_c = if phi > 0.0 {
            d.dot(grad_p[k])
        } else {
            d.dot(grad_n[k])
        };
        let r = gradient_ratio(grad_c, grad_f);
        lim = lim.min(limiter(scheme.interpolation, scheme.coefficient, r));
    }
    lim * w_linear + (1.0 - lim) * pos0(phi)
}

// =============================================================================
// 权重
// =============================================================================

/// 各格式的 owner 侧插值权重（内部面与耦合面；非耦合面为 1）
pub fn weights<T: FieldValue>(
    mesh: &FvMesh,
    phi: &SurfaceScalarField,
    psi: &VolField<T>,
    scheme: &ConvectionScheme,
) -> FvResult<SurfaceScalarField> {
    let geo = mesh.geometry()?;
    let mut w = SurfaceField::uniform(mesh, "weights", DimensionSet::DIMLESS, 1.0);

    match scheme.interpolation {
        InterpolationKind::Linear => {
            w.internal_mut().copy_from_slice(&geo.weights);
            for (patchi, pg) in geo.patches.iter().enumerate() {
                w.boundary_mut()[patchi].copy_from_slice(&pg.weights);
            }
        }
        InterpolationKind::Upwind | InterpolationKind::LinearUpwind => {
            for (wf, &f) in w.internal_mut().iter_mut().zip(phi.internal()) {
                *wf = pos0(f);
            }
            for (patchi, patch) in mesh.patches().iter().enumerate() {
                if patch.is_coupled() {
                    for (wf, &f) in w.boundary_mut()[patchi].iter_mut().zip(&phi.boundary()[patchi]) {
                        *wf = pos0(f);
                    }
                }
            }
        }
        _ => {
            let grads = fvc::grad_components(mesh, psi)?;
            let nbr_grads = grads
                .iter()
                .map(|g| coupled_neighbour_values(mesh, g))
                .collect::<FvResult<Vec<_>>>()?;
            let values = psi.internal();
            let mut gp = vec![DVec3::ZERO; T::N_COMPONENTS];
            let mut gn = vec![DVec3::ZERO; T::N_COMPONENTS];

            for f in 0..mesh.n_internal_faces() {
                let (p, n) = (mesh.owner()[f], mesh.neighbour()[f]);
                for k in 0..T::N_COMPONENTS {
                    gp[k] = grads[k][p];
                    gn[k] = grads[k][n];
                }
                w.internal_mut()[f] = limited_weight(
                    scheme,
                    phi.internal()[f],
                    geo.weights[f],
                    geo.delta[f],
                    values[p],
                    values[n],
                    &gp,
                    &gn,
                );
            }

            for (patchi, patch) in mesh.patches().iter().enumerate() {
                if !patch.is_coupled() {
                    continue;
                }
                let pg = &geo.patches[patchi];
                let nbr_values = &psi.boundary()[patchi].neighbour;
                for (i, &p) in mesh.patch_face_cells(patchi).iter().enumerate() {
                    for k in 0..T::N_COMPONENTS {
                        gp[k] = grads[k][p];
                        gn[k] = nbr_grads[k][patchi].as_ref().map_or(gp[k], |g| g[i]);
                    }
                    w.boundary_mut()[patchi][i] = limited_weight(
                        scheme,
                        phi.boundary()[patchi][i],
                        pg.weights[i],
                        pg.delta[i],
                        values[p],
                        nbr_values[i],
                        &gp,
                        &gn,
                    );
                }
            }
        }
    }
    Ok(w)
}

/// linearUpwind 的显式面值修正 (C_f − C_C)·∇ψ_C
fn linear_upwind_correction<T: FieldValue>(
    mesh: &FvMesh,
    phi: &SurfaceScalarField,
    psi: &VolField<T>,
) -> FvResult<SurfaceField<T>> {
    let geo = mesh.geometry()?;
    let grads = fvc::grad_components(mesh, psi)?;
    let nbr_grads = grads
        .iter()
        .map(|g| coupled_neighbour_values(mesh, g))
        .collect::<FvResult<Vec<_>>>()?;
    let cf = mesh.face_centres();
    let cc = mesh.cell_centres();
    let mut corr = SurfaceField::uniform(mesh, "linearUpwindCorr", psi.dimensions(), T::zero());

    for f in 0..mesh.n_internal_faces() {
        let (p, n) = (mesh.owner()[f], mesh.neighbour()[f]);
        let (c, offset) = if phi.internal()[f] > 0.0 {
            (p, cf[f] - cc[p])
        } else {
            (n, cf[f] - cc[n])
        };
        let mut v = T::zero();
        for (k, g) in grads.iter().enumerate() {
            v.set_component(k, offset.dot(g[c]));
        }
        corr.internal_mut()[f] = v;
    }

    for (patchi, patch) in mesh.patches().iter().enumerate() {
        if !patch.is_coupled() {
            continue;
        }
        let pg = &geo.patches[patchi];
        for (i, &p) in mesh.patch_face_cells(patchi).iter().enumerate() {
            let mut v = T::zero();
            for (k, g) in grads.iter().enumerate() {
                let value = if phi.boundary()[patchi][i] > 0.0 {
                    pg.face_offset[i].dot(g[p])
                } else {
                    let g_n = nbr_grads[k][patchi].as_ref().map_or(g[p], |gn| gn[i]);
                    (pg.face_offset[i] - pg.delta[i]).dot(g_n)
                };
                v.set_component(k, value);
            }
            corr.boundary_mut()[patchi][i] = v;
        }
    }
    Ok(corr)
}

// =============================================================================
// 组装
// =============================================================================

/// ∇·(φψ)
pub fn div<'m, T: FieldValue>(
    mesh: &'m FvMesh,
    phi: &SurfaceScalarField,
    psi: &VolField<T>,
    scheme: &ConvectionScheme,
) -> FvResult<FvMatrix<'m, T>> {
    FvError::check_size("flux", mesh.n_internal_faces(), phi.internal().len())?;
    let geo = mesh.geometry()?;
    let dims = phi.dimensions() * psi.dimensions();
    let mut fvm = FvMatrix::new(mesh, psi, dims)?;

    let w = weights(mesh, phi, psi, scheme)?;
    {
        let ldu = fvm.ldu_mut();
        for (f, (&wf, &flux)) in w.internal().iter().zip(phi.internal()).enumerate() {
            let lower = -wf * flux;
            ldu.lower_mut()[f] = lower;
            ldu.upper_mut()[f] = lower + flux;
        }
        ldu.neg_sum_diag();
    }

    for (patchi, patch) in mesh.patches().iter().enumerate() {
        let pf = psi.boundary_field(patchi)?;
        let patch_flux = &phi.boundary()[patchi];
        let mut pg = geo.patches[patchi].clone();
        if patch.is_coupled() {
            pg.weights.copy_from_slice(&w.boundary()[patchi]);
        }
        let psi_p = psi.patch_internal_field(mesh, patchi);
        let vic = pf.value_internal_coeffs(&pg);
        let vbc = pf.value_boundary_coeffs(&pg, &psi_p);
        for i in 0..patch.size {
            fvm.internal_coeffs_mut()[patchi][i] = vic[i] * patch_flux[i];
            fvm.boundary_coeffs_mut()[patchi][i] = -(vbc[i] * patch_flux[i]);
        }
    }

    if scheme.interpolation == InterpolationKind::LinearUpwind {
        let corr = linear_upwind_correction(mesh, phi, psi)?;
        let mut flux_corr = SurfaceField::uniform(
            mesh,
            format!("faceFluxCorrection({})", psi.name()),
            dims,
            T::zero(),
        );
        for ((fc, &c), &flux) in flux_corr
            .internal_mut()
            .iter_mut()
            .zip(corr.internal())
            .zip(phi.internal())
        {
            *fc = c * flux;
        }
        for (patchi, values) in corr.boundary().iter().enumerate() {
            for (i, &c) in values.iter().enumerate() {
                flux_corr.boundary_mut()[patchi][i] = c * phi.boundary()[patchi][i];
            }
        }
        for (s, v) in fvm.source_mut().iter_mut().zip(fvc::surface_sum(mesh, &flux_corr)) {
            *s -= v;
        }
        fvm.set_face_flux_correction(flux_corr)?;
    }

    log::trace!("div({}, {}) 组装完成: {}", phi.name(), psi.name(), scheme.interpolation);
    Ok(fvm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::BoundarySpec;
    use fv_mesh::generation::line_mesh;

    fn flux(mesh: &FvMesh, value: f64) -> SurfaceScalarField {
        SurfaceField::uniform(mesh, "phi", DimensionSet::FLUX, value)
    }

    fn field(mesh: &FvMesh, values: Vec<f64>) -> VolField<f64> {
        VolField::new(mesh, "T", DimensionSet::TEMPERATURE, values, |p| {
            if p.name == "left" {
                BoundarySpec::FixedValue(1.0)
            } else {
                BoundarySpec::ZeroGradient
            }
        })
        .unwrap()
    }

    #[test]
    fn test_limiters() {
        use InterpolationKind::*;
        assert_eq!(limiter(VanLeer, 1.0, 1.0), 1.0);
        assert_eq!(limiter(VanLeer, 1.0, -1.0), 0.0);
        assert_eq!(limiter(Minmod, 1.0, 0.5), 0.5);
        assert_eq!(limiter(Minmod, 1.0, 3.0), 1.0);
        assert_eq!(limiter(SuperBee, 1.0, 0.25), 0.5);
        assert_eq!(limiter(SuperBee, 1.0, 3.0), 2.0);
        assert_eq!(limiter(Muscl, 1.0, 1.0), 1.0);
        assert_eq!(limiter(LimitedLinear, 1.0, 0.25), 0.5);
        assert_eq!(limiter(LimitedLinear, 1.0, -0.5), 0.0);
        assert_eq!(gradient_ratio(1.0, 1.0), 1.0);
    }

    #[test]
    fn test_upwind_coefficients() {
        let mesh = line_mesh(3, 3.0).unwrap();
        let psi = field(&mesh, vec![0.0; 3]);
        let phi = flux(&mesh, 2.0);
        let m = div(&mesh, &phi, &psi, &ConvectionScheme::UPWIND).unwrap();
        assert_eq!(m.ldu().lower(), &[-2.0, -2.0]);
        assert_eq!(m.ldu().upper(), &[0.0, 0.0]);
        assert_eq!(m.ldu().diag(), &[2.0, 2.0, 0.0]);

        let (ic, bc) = m.patch_coeffs(0, 0).unwrap();
        assert_eq!(ic, 0.0);
        assert_eq!(bc, -2.0);
        let (ic, bc) = m.patch_coeffs(1, 0).unwrap();
        assert_eq!(ic, 2.0);
        assert_eq!(bc, 0.0);
    }

    #[test]
    fn test_uniform_field_gives_zero_tvd_correction() {
        let mesh = line_mesh(5, 1.0).unwrap();
        let psi = field(&mesh, vec![1.0; 5]);
        let phi = flux(&mesh, 1.0);
        let w = weights(&mesh, &phi, &psi, &ConvectionScheme::new(InterpolationKind::VanLeer))
            .unwrap();
        assert!(w.internal().iter().all(|&x| (0.0..=1.0).contains(&x)));

        let m = div(
            &mesh,
            &phi,
            &psi,
            &ConvectionScheme::new(InterpolationKind::LinearUpwind),
        )
        .unwrap();
        let corr = m.face_flux_correction().unwrap();
        assert!(corr.internal().iter().all(|c| c.abs() < 1e-12));
    }

    #[test]
    fn test_linear_weights_on_uniform_mesh() {
        let mesh = line_mesh(4, 1.0).unwrap();
        let psi = field(&mesh, vec![0.0; 4]);
        let phi = flux(&mesh, -1.0);
        let m = div(&mesh, &phi, &psi, &ConvectionScheme::LINEAR).unwrap();
        for (&l, &u) in m.ldu().lower().iter().zip(m.ldu().upper()) {
            assert!((l - 0.5).abs() < 1e-12);
            assert!((u + 0.5).abs() < 1e-12);
        }
    }
}
