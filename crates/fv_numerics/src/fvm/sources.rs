// crates/fv_numerics/src/fvm/sources.rs

//! 源项
//!
//! - `su`: 显式源，b −= V·su
//! - `sp`: 隐式线性源 sp·ψ，diag += V·sp
//! - `susp`: 按符号拆分，sp > 0 隐式，sp < 0 以当前 ψ 显式处理，保持对角元不减

use crate::fields::{FieldValue, VolField, VolScalarField};
use crate::fv_matrix::FvMatrix;
use fv_foundation::{DimensionSet, FvError, FvResult};
use fv_mesh::FvMesh;

/// 显式源项 su
pub fn su<'m, T: FieldValue>(
    mesh: &'m FvMesh,
    source: &VolField<T>,
    psi: &VolField<T>,
) -> FvResult<FvMatrix<'m, T>> {
    FvError::check_size("Su", mesh.n_cells(), source.len())?;
    let mut fvm = FvMatrix::new(mesh, psi, source.dimensions() * DimensionSet::VOLUME)?;
    for ((s, &v), &vol) in fvm
        .source_mut()
        .iter_mut()
        .zip(source.internal())
        .zip(mesh.cell_volumes())
    {
        *s -= v * vol;
    }
    Ok(fvm)
}

/// 隐式源项 sp·ψ
pub fn sp<'m, T: FieldValue>(
    mesh: &'m FvMesh,
    sp: &VolScalarField,
    psi: &VolField<T>,
) -> FvResult<FvMatrix<'m, T>> {
    FvError::check_size("Sp", mesh.n_cells(), sp.len())?;
    let dims = sp.dimensions() * psi.dimensions() * DimensionSet::VOLUME;
    let mut fvm = FvMatrix::new(mesh, psi, dims)?;
    for ((d, &k), &vol) in fvm
        .ldu_mut()
        .diag_mut()
        .iter_mut()
        .zip(sp.internal())
        .zip(mesh.cell_volumes())
    {
        *d += k * vol;
    }
    Ok(fvm)
}

/// 按符号拆分的源项 sp·ψ
pub fn susp<'m, T: FieldValue>(
    mesh: &'m FvMesh,
    sp: &VolScalarField,
    psi: &VolField<T>,
) -> FvResult<FvMatrix<'m, T>> {
    FvError::check_size("SuSp", mesh.n_cells(), sp.len())?;
    let dims = sp.dimensions() * psi.dimensions() * DimensionSet::VOLUME;
    let mut fvm = FvMatrix::new(mesh, psi, dims)?;
    let v = mesh.cell_volumes();
    for (i, &k) in sp.internal().iter().enumerate() {
        fvm.ldu_mut().diag_mut()[i] += v[i] * k.max(0.0);
        fvm.source_mut()[i] -= psi.internal()[i] * (v[i] * k.min(0.0));
    }
    Ok(fvm)
}
