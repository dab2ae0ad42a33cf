// crates/fv_numerics/src/ldu/interfaces.rs

//! 耦合边界接口
//!
//! 每个接口对应一个 cyclic 或 processor patch，保存：
//! - `face_cells`: 本侧面所在单元
//! - `coeffs`: 耦合系数（即该 patch 的 boundaryCoeffs 分量）
//!
//! 对侧值的获取：cyclic 直接读本进程对应单元，processor 经通信器交换。
//! 非阻塞调度下 [`InterfaceSet::init_update`] 先发出全部数据，
//! [`InterfaceSet::update`] 是唯一的等待点。

use fv_foundation::{FvError, FvResult};
use fv_config::CommsType;
use fv_mesh::{Communicator, FvMesh, PatchKind, SerialComm};
use fv_runtime::RuntimeScalar;
use std::sync::Arc;

/// 接口类型
#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceKind {
    /// 本进程内周期耦合，对侧面单元
    Cyclic {
        /// 对侧面所在单元（与 `face_cells` 逐面配对）
        neighbour_face_cells: Vec<usize>,
    },
    /// 进程间耦合
    Processor {
        /// 对侧进程
        neighbour_rank: usize,
        /// 消息标签
        tag: u32,
    },
}

/// 单个耦合接口
#[derive(Debug, Clone)]
pub struct LduInterface<S: RuntimeScalar> {
    /// patch 序号
    pub patch: usize,
    /// patch 名称
    pub name: String,
    /// 本侧面所在单元
    pub face_cells: Vec<usize>,
    /// 耦合系数
    pub coeffs: Vec<S>,
    /// 类型
    pub kind: InterfaceKind,
}

impl<S: RuntimeScalar> LduInterface<S> {
    /// 由网格耦合 patch 构造；非耦合 patch 返回 `None`
    pub fn from_patch(mesh: &FvMesh, patchi: usize, coeffs: Vec<S>) -> FvResult<Option<Self>> {
        let patch = mesh.patch(patchi)?;
        FvError::check_size("interface coeffs", patch.size, coeffs.len())?;
        let kind = match &patch.kind {
            PatchKind::Cyclic {
                neighbour_patch, ..
            } => InterfaceKind::Cyclic {
                neighbour_face_cells: mesh.patch_face_cells(*neighbour_patch).to_vec(),
            },
            PatchKind::Processor {
                neighbour_rank,
                tag,
                ..
            } => InterfaceKind::Processor {
                neighbour_rank: *neighbour_rank,
                tag: *tag,
            },
            _ => return Ok(None),
        };
        Ok(Some(Self {
            patch: patchi,
            name: patch.name.clone(),
            face_cells: mesh.patch_face_cells(patchi).to_vec(),
            coeffs,
            kind,
        }))
    }

    /// 面数
    #[inline]
    pub fn len(&self) -> usize {
        self.face_cells.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.face_cells.is_empty()
    }

    /// 本侧面单元上的值
    fn internal_field(&self, psi: &[S]) -> Vec<f64> {
        self.face_cells.iter().map(|&c| psi[c].as_f64()).collect()
    }
}

/// 一个矩阵的全部耦合接口
#[derive(Debug, Clone)]
pub struct InterfaceSet<S: RuntimeScalar> {
    interfaces: Vec<LduInterface<S>>,
    comm: Arc<dyn Communicator>,
    comms_type: CommsType,
}

impl<S: RuntimeScalar> Default for InterfaceSet<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: RuntimeScalar> InterfaceSet<S> {
    /// 无接口（串行）
    pub fn empty() -> Self {
        Self {
            interfaces: Vec::new(),
            comm: Arc::new(SerialComm),
            comms_type: CommsType::default(),
        }
    }

    /// 指定通信器与调度方式
    pub fn new(comm: Arc<dyn Communicator>, comms_type: CommsType) -> Self {
        Self {
            interfaces: Vec::new(),
            comm,
            comms_type,
        }
    }

    /// 添加接口
    pub fn push(&mut self, interface: LduInterface<S>) {
        self.interfaces.push(interface);
    }

    /// 接口列表
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, LduInterface<S>> {
        self.interfaces.iter()
    }

    /// 接口数
    #[inline]
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// 是否无接口
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

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

    /// 调度方式
    #[inline]
    pub fn comms_type(&self) -> CommsType {
        self.comms_type
    }

    /// 是否含进程间接口
    pub fn has_processor(&self) -> bool {
        self.interfaces
            .iter()
            .any(|i| matches!(i.kind, InterfaceKind::Processor { .. }))
    }

    // =========================================================================
    // 交换
    // =========================================================================

    /// 开始交换：非阻塞调度下发出全部 processor 数据
    pub fn init_update(&self, psi: &[S]) -> FvResult<()> {
        if self.comms_type != CommsType::NonBlocking {
            return Ok(());
        }
        for i in &self.interfaces {
            if let InterfaceKind::Processor {
                neighbour_rank,
                tag,
            } = i.kind
            {
                self.comm.send(neighbour_rank, tag, i.internal_field(psi))?;
            }
        }
        Ok(())
    }

    /// 完成交换并累加：`result[fc] += factor · coeff · ψ_nbr`
    ///
    /// 矩阵乘法使用 `factor = -1`，Gauss-Seidel 的右端修正使用 `factor = 1`。
    pub fn update(&self, psi: &[S], result: &mut [S], factor: S) -> FvResult<()> {
        for i in &self.interfaces {
            let nbr = self.neighbour_values(i, psi)?;
            for ((&c, &k), v) in i.face_cells.iter().zip(&i.coeffs).zip(nbr) {
                result[c] += factor * k * v;
            }
        }
        Ok(())
    }

    /// 一次完成 `init_update` + `update`
    pub fn apply(&self, psi: &[S], result: &mut [S], factor: S) -> FvResult<()> {
        self.init_update(psi)?;
        self.update(psi, result, factor)
    }

    fn neighbour_values(&self, i: &LduInterface<S>, psi: &[S]) -> FvResult<Vec<S>> {
        match &i.kind {
            InterfaceKind::Cyclic {
                neighbour_face_cells,
            } => Ok(neighbour_face_cells.iter().map(|&c| psi[c]).collect()),
            InterfaceKind::Processor {
                neighbour_rank,
                tag,
            } => {
                if self.comms_type == CommsType::Blocking {
                    self.comm.send(*neighbour_rank, *tag, i.internal_field(psi))?;
                }
                let data = self.comm.recv(*neighbour_rank, *tag)?;
                if data.len() != i.len() {
                    return Err(FvError::coupled_patch(
                        &i.name,
                        format!("收到 {} 个值, 期望 {}", data.len(), i.len()),
                    ));
                }
                Ok(data.into_iter().map(S::from_config).collect())
            }
        }
    }

    // =========================================================================
    // 系数
    // =========================================================================

    /// `sum[fc] -= coeff`（行和中的耦合部分）
    pub fn sub_coeffs(&self, sum: &mut [S]) {
        for i in &self.interfaces {
            for (&c, &k) in i.face_cells.iter().zip(&i.coeffs) {
                sum[c] -= k;
            }
        }
    }

    /// 粗化：按单元聚合映射改写面单元，耦合系数保持不变
    pub fn restrict(&self, restrict_addr: &[usize]) -> Self {
        let interfaces = self
            .interfaces
            .iter()
            .map(|i| LduInterface {
                patch: i.patch,
                name: i.name.clone(),
                face_cells: i.face_cells.iter().map(|&c| restrict_addr[c]).collect(),
                coeffs: i.coeffs.clone(),
                kind: match &i.kind {
                    InterfaceKind::Cyclic {
                        neighbour_face_cells,
                    } => InterfaceKind::Cyclic {
                        neighbour_face_cells: neighbour_face_cells
                            .iter()
                            .map(|&c| restrict_addr[c])
                            .collect(),
                    },
                    k => k.clone(),
                },
            })
            .collect();
        Self {
            interfaces,
            comm: Arc::clone(&self.comm),
            comms_type: self.comms_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cyclic_pair() -> InterfaceSet<f64> {
        let mut set = InterfaceSet::empty();
        set.push(LduInterface {
            patch: 0,
            name: "left".into(),
            face_cells: vec![0],
            coeffs: vec![2.0],
            kind: InterfaceKind::Cyclic {
                neighbour_face_cells: vec![3],
            },
        });
        set.push(LduInterface {
            patch: 1,
            name: "right".into(),
            face_cells: vec![3],
            coeffs: vec![2.0],
            kind: InterfaceKind::Cyclic {
                neighbour_face_cells: vec![0],
            },
        });
        set
    }

    #[test]
    fn test_cyclic_update() {
        let set = cyclic_pair();
        let psi = [1.0, 0.0, 0.0, 5.0];
        let mut r = vec![0.0; 4];
        set.apply(&psi, &mut r, -1.0).unwrap();
        assert_eq!(r, vec![-10.0, 0.0, 0.0, -2.0]);
    }

    #[test]
    fn test_restrict_maps_cells() {
        let set = cyclic_pair().restrict(&[0, 0, 1, 1]);
        let first = set.iter().next().unwrap();
        assert_eq!(first.face_cells, vec![0]);
        assert_eq!(
            first.kind,
            InterfaceKind::Cyclic {
                neighbour_face_cells: vec![1]
            }
        );
        let mut s = vec![0.0; 2];
        set.sub_coeffs(&mut s);
        assert_eq!(s, vec![-2.0, -2.0]);
    }

    #[test]
    fn test_schedule_defaults_to_blocking_and_survives_restrict() {
        assert_eq!(InterfaceSet::<f64>::empty().comms_type(), CommsType::Blocking);
        let set = InterfaceSet::<f64>::new(Arc::new(SerialComm), CommsType::NonBlocking);
        assert_eq!(set.restrict(&[]).comms_type(), CommsType::NonBlocking);
    }
}
