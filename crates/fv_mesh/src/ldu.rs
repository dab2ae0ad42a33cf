// crates/fv_mesh/src/ldu.rs

//! LDU 寻址
//!
//! 内部面按 (owner, neighbour) 升序排列且 owner < neighbour（上三角序），
//! 于是第 f 个面对应矩阵上三角元素 (lower[f], upper[f]) 和下三角元素
//! (upper[f], lower[f])。
//!
//! - `owner_start[c]..owner_start[c+1]`: owner 为 c 的面
//! - `losort[losort_start[c]..losort_start[c+1]]`: neighbour 为 c 的面，按 owner 升序
//!
//! Gauss-Seidel、DIC/DILU 的前代/回代依赖这种顺序。

use crate::error::{MeshError, MeshResult};

/// LDU 寻址
#[derive(Debug, Clone, PartialEq)]
pub struct LduAddressing {
    n_cells: usize,
    lower: Vec<usize>,
    upper: Vec<usize>,
    losort: Vec<usize>,
    owner_start: Vec<usize>,
    losort_start: Vec<usize>,
}

impl LduAddressing {
    /// 由面的 (owner, neighbour) 列表创建，要求上三角序
    pub fn new(n_cells: usize, lower: Vec<usize>, upper: Vec<usize>) -> MeshResult<Self> {
        MeshError::check_size("upper", lower.len(), upper.len())?;

        for (f, (&l, &u)) in lower.iter().zip(upper.iter()).enumerate() {
            MeshError::check_index("upper", u, n_cells)?;
            if l >= u {
                return Err(MeshError::topology(
                    "LduAddressing::new",
                    format!("面 {} 的 owner {} 不小于 neighbour {}", f, l, u),
                ));
            }
            if f > 0 {
                let (pl, pu) = (lower[f - 1], upper[f - 1]);
                if (l, u) <= (pl, pu) {
                    return Err(MeshError::topology(
                        "LduAddressing::new",
                        format!("面 {} ({}, {}) 未按上三角序排列或重复", f, l, u),
                    ));
                }
            }
        }

        let n_faces = lower.len();

        // owner 起点
        let mut owner_start = vec![0usize; n_cells + 1];
        for &l in &lower {
            owner_start[l + 1] += 1;
        }
        for c in 0..n_cells {
            owner_start[c + 1] += owner_start[c];
        }

        // 按 neighbour 稳定排序，同一 neighbour 内保持 owner 升序
        let mut losort: Vec<usize> = (0..n_faces).collect();
        losort.sort_by_key(|&f| upper[f]);

        let mut losort_start = vec![0usize; n_cells + 1];
        for &u in &upper {
            losort_start[u + 1] += 1;
        }
        for c in 0..n_cells {
            losort_start[c + 1] += losort_start[c];
        }

        Ok(Self {
            n_cells,
            lower,
            upper,
            losort,
            owner_start,
            losort_start,
        })
    }

    /// 单元数（矩阵阶数）
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// 内部面数（上三角非零元数）
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.lower.len()
    }

    /// 面的 owner（行号较小的单元）
    #[inline]
    pub fn lower(&self) -> &[usize] {
        &self.lower
    }

    /// 面的 neighbour
    #[inline]
    pub fn upper(&self) -> &[usize] {
        &self.upper
    }

    /// 按 neighbour 排序的面序号
    #[inline]
    pub fn losort(&self) -> &[usize] {
        &self.losort
    }

    /// owner 起点表
    #[inline]
    pub fn owner_start(&self) -> &[usize] {
        &self.owner_start
    }

    /// losort 起点表
    #[inline]
    pub fn losort_start(&self) -> &[usize] {
        &self.losort_start
    }

    /// 单元 c 作为 owner 的面
    #[inline]
    pub fn owned_faces(&self, c: usize) -> std::ops::Range<usize> {
        self.owner_start[c]..self.owner_start[c + 1]
    }

    /// 单元 c 作为 neighbour 的面
    #[inline]
    pub fn neighbour_faces(&self, c: usize) -> &[usize] {
        &self.losort[self.losort_start[c]..self.losort_start[c + 1]]
    }
}
