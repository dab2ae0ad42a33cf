// crates/fv_numerics/src/fvm/ddt.rs

//! 隐式时间导数
//!
//! ```text
//! Euler:     diag = V/Δt,                 b = V⁰ψ⁰/Δt
//! backward:  diag = c·V/Δt,               b = (c₀V⁰ψ⁰ − c₀₀V⁰⁰ψ⁰⁰)/Δt
//!            c   = 1 + Δt/(Δt + Δt₀)
//!            c₀₀ = Δt²/(Δt₀(Δt + Δt₀))
//!            c₀  = c + c₀₀
//! ```
//!
//! 没有更旧时间层时 backward 退化为 Euler。

use crate::control::TimeState;
use crate::fields::{FieldValue, VolField, VolScalarField};
use crate::fv_matrix::FvMatrix;
use fv_config::DdtKind;
use fv_foundation::{DimensionSet, FvError, FvResult};
use fv_mesh::FvMesh;

/// 二阶后向差分系数 (c, c₀, c₀₀)
fn backward_coeffs(time: &TimeState) -> (f64, f64, f64) {
    let (dt, dt0) = (time.delta_t, time.delta_t0);
    let c = 1.0 + dt / (dt + dt0);
    let c00 = dt * dt / (dt0 * (dt + dt0));
    (c, c + c00, c00)
}

/// 时间格式是否实际使用二阶系数
fn use_backward<T: FieldValue>(scheme: DdtKind, psi: &VolField<T>) -> bool {
    scheme == DdtKind::Backward && psi.old_old_time().is_some()
}

/// ∂ψ/∂t
pub fn ddt<'m, T: FieldValue>(
    mesh: &'m FvMesh,
    psi: &VolField<T>,
    scheme: DdtKind,
    time: &TimeState,
) -> FvResult<FvMatrix<'m, T>> {
    let dims = psi.dimensions() * DimensionSet::VOLUME / DimensionSet::TIME;
    let mut fvm = FvMatrix::new(mesh, psi, dims)?;
    if scheme == DdtKind::SteadyState {
        return Ok(fvm);
    }
    check_delta_t(time)?;

    let rdt = time.rdelta_t();
    let v = mesh.cell_volumes();
    let v0 = mesh.volumes_old();
    let psi0 = psi.old_time();

    if use_backward(scheme, psi) {
        let (c, c0, c00) = backward_coeffs(time);
        let v00 = mesh.volumes_old_old();
        let psi00 = psi.old_old_time().unwrap_or(psi0);
        for (d, &vol) in fvm.ldu_mut().diag_mut().iter_mut().zip(v) {
            *d = c * rdt * vol;
        }
        for (i, s) in fvm.source_mut().iter_mut().enumerate() {
            *s = (psi0[i] * (c0 * v0[i]) - psi00[i] * (c00 * v00[i])) * rdt;
        }
    } else {
        for (d, &vol) in fvm.ldu_mut().diag_mut().iter_mut().zip(v) {
            *d = rdt * vol;
        }
        for (i, s) in fvm.source_mut().iter_mut().enumerate() {
            *s = psi0[i] * (rdt * v0[i]);
        }
    }
    Ok(fvm)
}

/// ∂(ρψ)/∂t
pub fn ddt_rho<'m, T: FieldValue>(
    mesh: &'m FvMesh,
    rho: &VolScalarField,
    psi: &VolField<T>,
    scheme: DdtKind,
    time: &TimeState,
) -> FvResult<FvMatrix<'m, T>> {
    FvError::check_size("rho", mesh.n_cells(), rho.len())?;
    let dims = rho.dimensions() * psi.dimensions() * DimensionSet::VOLUME / DimensionSet::TIME;
    let mut fvm = FvMatrix::new(mesh, psi, dims)?;
    if scheme == DdtKind::SteadyState {
        return Ok(fvm);
    }
    check_delta_t(time)?;

    let rdt = time.rdelta_t();
    let v = mesh.cell_volumes();
    let v0 = mesh.volumes_old();
    let (rho_n, rho0) = (rho.internal(), rho.old_time());
    let psi0 = psi.old_time();

    if use_backward(scheme, psi) {
        let (c, c0, c00) = backward_coeffs(time);
        let v00 = mesh.volumes_old_old();
        let rho00 = rho.old_old_time().unwrap_or(rho0);
        let psi00 = psi.old_old_time().unwrap_or(psi0);
        for (i, d) in fvm.ldu_mut().diag_mut().iter_mut().enumerate() {
            *d = c * rdt * rho_n[i] * v[i];
        }
        for (i, s) in fvm.source_mut().iter_mut().enumerate() {
            *s = (psi0[i] * (c0 * rho0[i] * v0[i]) - psi00[i] * (c00 * rho00[i] * v00[i])) * rdt;
        }
    } else {
        for (i, d) in fvm.ldu_mut().diag_mut().iter_mut().enumerate() {
            *d = rdt * rho_n[i] * v[i];
        }
        for (i, s) in fvm.source_mut().iter_mut().enumerate() {
            *s = psi0[i] * (rdt * rho0[i] * v0[i]);
        }
    }
    Ok(fvm)
}

fn check_delta_t(time: &TimeState) -> FvResult<()> {
    if !(time.delta_t > 0.0 && time.delta_t0 > 0.0) {
        return Err(FvError::invalid_input(format!(
            "时间步长必须为正: Δt = {}, Δt₀ = {}",
            time.delta_t, time.delta_t0
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::BoundarySpec;
    use fv_mesh::generation::line_mesh;

    fn field(mesh: &FvMesh, value: f64) -> VolScalarField {
        VolField::uniform(mesh, "T", DimensionSet::TEMPERATURE, value, |_| {
            BoundarySpec::ZeroGradient
        })
        .unwrap()
    }

    #[test]
    fn test_euler_coefficients() {
        let mesh = line_mesh(4, 1.0).unwrap();
        let mut psi = field(&mesh, 2.0);
        psi.store_old_time();
        let time = TimeState::new(0.5).unwrap();
        let m = ddt(&mesh, &psi, DdtKind::Euler, &time).unwrap();
        for (&d, &s) in m.ldu().diag().iter().zip(m.source()) {
            assert!((d - 0.25 / 0.5).abs() < 1e-14);
            assert!((s - 2.0 * 0.25 / 0.5).abs() < 1e-14);
        }
        assert_eq!(
            m.dimensions(),
            DimensionSet::TEMPERATURE * DimensionSet::VOLUME / DimensionSet::TIME
        );
    }

    #[test]
    fn test_backward_falls_back_to_euler() {
        let mesh = line_mesh(2, 1.0).unwrap();
        let mut psi = field(&mesh, 1.0);
        psi.store_old_time();
        let time = TimeState::new(0.1).unwrap();
        let euler = ddt(&mesh, &psi, DdtKind::Euler, &time).unwrap();
        let backward = ddt(&mesh, &psi, DdtKind::Backward, &time).unwrap();
        assert_eq!(euler.ldu().diag(), backward.ldu().diag());
        assert_eq!(euler.source(), backward.source());
    }

    #[test]
    fn test_backward_uniform_steps() {
        let mesh = line_mesh(2, 1.0).unwrap();
        let mut psi = field(&mesh, 1.0);
        psi.store_old_time();
        psi.internal_mut().fill(3.0);
        psi.store_old_time();
        let time = TimeState::new(1.0).unwrap();
        let m = ddt(&mesh, &psi, DdtKind::Backward, &time).unwrap();
        // 等步长：c = 3/2, c₀ = 2, c₀₀ = 1/2
        let v = 0.5;
        assert!((m.ldu().diag()[0] - 1.5 * v).abs() < 1e-14);
        assert!((m.source()[0] - (2.0 * 3.0 - 0.5 * 1.0) * v).abs() < 1e-14);
    }

    #[test]
    fn test_steady_state_is_empty() {
        let mesh = line_mesh(3, 1.0).unwrap();
        let psi = field(&mesh, 1.0);
        let m = ddt(&mesh, &psi, DdtKind::SteadyState, &TimeState::steady()).unwrap();
        assert!(m.ldu().diag().iter().all(|&d| d == 0.0));
        assert!(m.source().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_rho_euler_on_moving_mesh() {
        let mut mesh = line_mesh(2, 1.0).unwrap();
        mesh.move_volumes(vec![0.6, 0.4]).unwrap();
        let mut psi = field(&mesh, 1.0);
        psi.store_old_time();
        let mut rho = VolField::uniform(&mesh, "rho", DimensionSet::DIMLESS, 1.0, |_| {
            BoundarySpec::ZeroGradient
        })
        .unwrap();
        rho.store_old_time();
        rho.internal_mut().fill(2.0);

        let time = TimeState::new(0.5).unwrap();
        let m = ddt_rho(&mesh, &rho, &psi, DdtKind::Euler, &time).unwrap();
        // diag = ρV/Δt，右端用旧体积与旧密度 ρ⁰V⁰ψ⁰/Δt
        assert!((m.ldu().diag()[0] - 2.0 * 0.6 / 0.5).abs() < 1e-14);
        assert!((m.ldu().diag()[1] - 2.0 * 0.4 / 0.5).abs() < 1e-14);
        assert!((m.source()[0] - 0.5 / 0.5).abs() < 1e-14);
        assert!((m.source()[1] - 0.5 / 0.5).abs() < 1e-14);
    }
}
