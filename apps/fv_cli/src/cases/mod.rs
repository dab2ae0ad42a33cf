// apps/fv_cli/src/cases/mod.rs

//! 内置算例
//!
//! - [`diffusion`]: 一维扩散（可分区）
//! - [`convection`]: 二维瞬态对流扩散
//! - [`poisson`]: 纯 Neumann 泊松方程（可分区）
//! - [`cavity`]: 顶盖驱动方腔，PISO

pub mod cavity;
pub mod convection;
pub mod diffusion;
pub mod poisson;
mod report;

pub use report::RunReport;

use anyhow::{anyhow, Context, Result};
use fv_config::{CaseConfig, CaseKind, MeshSpec};
use fv_mesh::decompose::decompose;
use fv_mesh::generation::{line_mesh, periodic_line_mesh, rect_mesh, skewed_rect_mesh};
use fv_mesh::{FvMesh, LocalWorld};
use fv_numerics::control::SolverPerformanceDict;
use fv_numerics::fields::SurfaceScalarField;
use fv_numerics::SolverPerformance;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// 单个算例（或单个分区）的求解结果
#[derive(Debug, Clone, Default)]
pub struct CaseOutput {
    /// 单元场，矢量按分量展开
    pub fields: BTreeMap<String, Vec<f64>>,
    /// 最后一个时间步的求解记录
    pub performance: Vec<SolverPerformance>,
    /// 全局统计量
    pub summary: BTreeMap<String, f64>,
    /// 时间步数（稳态为 1）
    pub steps: usize,
}

impl CaseOutput {
    /// 取出求解表中各场的全部记录
    pub fn record(&mut self, dict: &SolverPerformanceDict) {
        self.performance = dict
            .fields()
            .flat_map(|name| dict.get(name).iter().cloned())
            .collect();
    }
}

/// 按描述生成网格
pub fn build_mesh(spec: &MeshSpec) -> Result<FvMesh> {
    let mesh = match *spec {
        MeshSpec::Line { n_cells, length } => line_mesh(n_cells, length),
        MeshSpec::PeriodicLine { n_cells, length } => periodic_line_mesh(n_cells, length),
        MeshSpec::Rect { nx, ny, lx, ly } => rect_mesh(nx, ny, lx, ly),
        MeshSpec::SkewedRect {
            nx,
            ny,
            lx,
            ly,
            skew,
        } => skewed_rect_mesh(nx, ny, lx, ly, skew),
    }
    .context("网格生成失败")?;
    Ok(mesh)
}

/// 运行算例
pub fn run_case(case: &CaseConfig) -> Result<RunReport> {
    case.validate().context("算例配置无效")?;
    let mesh = build_mesh(&case.mesh)?;
    info!(
        "算例 {} ({}): {} 单元, {} 内部面, {} 分区",
        case.name,
        case.kind,
        mesh.n_cells(),
        mesh.n_internal_faces(),
        case.n_ranks
    );

    let start = Instant::now();
    let output = match case.kind {
        CaseKind::Diffusion1d => run_decomposed(&mesh, case, diffusion::solve)?,
        CaseKind::PoissonNeumann => run_decomposed(&mesh, case, poisson::solve)?,
        CaseKind::Convection2d => convection::solve(&mesh, case)?,
        CaseKind::Cavity => cavity::solve(&mesh, case)?,
    };
    Ok(RunReport::new(case, mesh.n_cells(), output, start.elapsed()))
}

type CaseSolver = fn(&FvMesh, &CaseConfig) -> Result<CaseOutput>;

/// 按单元编号均匀分块，每个分区一个线程求解后按全局编号合并
fn run_decomposed(mesh: &FvMesh, case: &CaseConfig, solve: CaseSolver) -> Result<CaseOutput> {
    let n_ranks = case.n_ranks;
    if n_ranks <= 1 {
        return solve(mesh, case);
    }

    let n_cells = mesh.n_cells();
    let cell_ranks: Vec<usize> = (0..n_cells).map(|c| c * n_ranks / n_cells).collect();
    let subs = decompose(mesh, &cell_ranks, n_ranks).context("分区失败")?;
    let comms = LocalWorld::create(n_ranks);

    let parts: Vec<Result<(Vec<usize>, CaseOutput)>> = std::thread::scope(|s| {
        let handles: Vec<_> = subs
            .into_iter()
            .zip(comms)
            .map(|(sub, comm)| {
                s.spawn(move || {
                    let local = sub.mesh.with_communicator(Arc::new(comm));
                    solve(&local, case).map(|out| (sub.cell_map, out))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| anyhow!("分区线程异常退出"))?)
            .collect()
    });

    let mut merged = CaseOutput::default();
    for (rank, part) in parts.into_iter().enumerate() {
        let (cell_map, out) = part.with_context(|| format!("分区 {} 求解失败", rank))?;
        for (name, values) in out.fields {
            let global = merged
                .fields
                .entry(name)
                .or_insert_with(|| vec![0.0; n_cells]);
            for (&c, v) in cell_map.iter().zip(values) {
                global[c] = v;
            }
        }
        // 残差与统计量都是全局归约结果，取主分区即可
        if rank == 0 {
            merged.performance = out.performance;
            merged.summary = out.summary;
            merged.steps = out.steps;
        }
    }
    Ok(merged)
}

/// 最大 Courant 数 0.5 Σ|φ| Δt / V（全局）
pub fn courant_number(mesh: &FvMesh, phi: &SurfaceScalarField, delta_t: f64) -> Result<f64> {
    let mut sum_phi = vec![0.0; mesh.n_cells()];
    for (f, &p) in phi.internal().iter().enumerate() {
        sum_phi[mesh.owner()[f]] += p.abs();
        sum_phi[mesh.neighbour()[f]] += p.abs();
    }
    for (patchi, values) in phi.boundary().iter().enumerate() {
        for (&c, &p) in mesh.patch_face_cells(patchi).iter().zip(values) {
            sum_phi[c] += p.abs();
        }
    }
    let local = sum_phi
        .iter()
        .zip(mesh.cell_volumes())
        .map(|(s, v)| 0.5 * s * delta_t / v)
        .fold(0.0, f64::max);
    Ok(mesh.comm().all_reduce_max(local)?)
}

/// 局部最小/最大值的全局归约
pub fn global_range(mesh: &FvMesh, values: &[f64]) -> Result<(f64, f64)> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let comm = mesh.comm();
    Ok((comm.all_reduce_min(min)?, comm.all_reduce_max(max)?))
}
