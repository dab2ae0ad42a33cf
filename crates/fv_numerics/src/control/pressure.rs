// crates/fv_numerics/src/control/pressure.rs

//! 压力参考与封闭区域通量修正
//!
//! 所有边界都不固定压力时，压力方程只确定到一个常数，
//! 需要在参考单元上固定压力值；同时边界通量必须全局平衡，
//! 否则压力方程无解。

use crate::fields::{SurfaceScalarField, VolScalarField, VolVectorField};
use crate::fv_matrix::FvMatrix;
use fv_config::AlgorithmControls;
use fv_foundation::{ensure, FvError, FvResult};
use fv_mesh::FvMesh;
use fv_runtime::RuntimeScalar;

/// 压力参考点
///
/// 参考单元编号是主 rank 上的局部单元编号，其他 rank 不施加参考。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureReference {
    cell: Option<usize>,
    value: f64,
}

impl PressureReference {
    /// 根据压力场边界判断是否需要参考点
    pub fn new(mesh: &FvMesh, p: &VolScalarField, controls: &AlgorithmControls) -> FvResult<Self> {
        let value = controls.p_ref_value;
        if !p.needs_reference(mesh)? {
            return Ok(Self { cell: None, value });
        }
        let cell = controls.p_ref_cell.unwrap_or(0);
        if !mesh.comm().is_master() {
            return Ok(Self { cell: None, value });
        }
        ensure!(
            cell < mesh.n_cells(),
            FvError::invalid_config(
                "pRefCell",
                cell.to_string(),
                format!("超出网格范围 (单元数 {})", mesh.n_cells()),
            )
        );
        log::info!("{}: 参考单元 {}, 参考值 {}", p.name(), cell, value);
        Ok(Self {
            cell: Some(cell),
            value,
        })
    }

    /// 不施加参考
    pub fn none() -> Self {
        Self {
            cell: None,
            value: 0.0,
        }
    }

    /// 本 rank 上的参考单元
    pub fn cell(&self) -> Option<usize> {
        self.cell
    }

    /// 参考值
    pub fn value(&self) -> f64 {
        self.value
    }

    /// 本 rank 是否施加参考
    pub fn is_active(&self) -> bool {
        self.cell.is_some()
    }

    /// 在压力方程上施加参考
    pub fn apply(&self, eqn: &mut FvMatrix<'_, f64>) -> FvResult<()> {
        match self.cell {
            Some(cell) => eqn.set_reference(cell, self.value),
            None => Ok(()),
        }
    }
}

/// 修正可调出口的边界通量，使封闭或纯 Neumann 区域的总通量为零
///
/// 入流取所有非耦合边界上 φ < 0 的部分；固定速度边界上的出流不可调，
/// 其余边界上的出流按比例缩放。压力不需要参考时直接返回 `false`。
pub fn adjust_closed_volume(
    mesh: &FvMesh,
    phi: &mut SurfaceScalarField,
    u: &VolVectorField,
    p: &VolScalarField,
) -> FvResult<bool> {
    if !p.needs_reference(mesh)? {
        return Ok(false);
    }

    let mut mass_in = 0.0;
    let mut fixed_out = 0.0;
    let mut adjustable_out = 0.0;
    for (patchi, up) in u.boundary().iter().enumerate() {
        if up.is_coupled() {
            continue;
        }
        let fixed = up.condition.fixes_value();
        for &f in &phi.boundary()[patchi] {
            if f < 0.0 {
                mass_in -= f;
            } else if fixed {
                fixed_out += f;
            } else {
                adjustable_out += f;
            }
        }
    }

    let comm = mesh.comm();
    let mass_in = comm.all_reduce_sum(mass_in)?;
    let fixed_out = comm.all_reduce_sum(fixed_out)?;
    let adjustable_out = comm.all_reduce_sum(adjustable_out)?;

    let imbalance = mass_in - fixed_out;
    let total = mass_in + fixed_out + adjustable_out;
    if adjustable_out.abs() <= f64::VSMALL {
        ensure!(
            imbalance.abs() <= f64::SMALL * total.max(1.0),
            FvError::invalid_input(format!(
                "无法通过调整出口通量消除连续性误差: 入流 {:e}, 固定出流 {:e}",
                mass_in, fixed_out
            ))
        );
        return Ok(true);
    }

    let factor = imbalance / adjustable_out;
    log::debug!("{}: 出口通量修正系数 {}", phi.name(), factor);
    for (patchi, up) in u.boundary().iter().enumerate() {
        if up.is_coupled() || up.condition.fixes_value() {
            continue;
        }
        for f in phi.boundary_mut()[patchi].iter_mut() {
            if *f > 0.0 {
                *f *= factor;
            }
        }
    }
    Ok(true)
}
