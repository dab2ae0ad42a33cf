// crates/fv_numerics/src/solvers/gamg/dense.rs

//! 最粗层稠密 LU（nalgebra 列主元分解）

use crate::ldu::{InterfaceKind, InterfaceSet, LduMatrix};
use fv_runtime::RuntimeScalar;
use nalgebra::{DMatrix, DVector, Dyn, LU};

/// 稠密 LU 分解
#[derive(Debug, Clone)]
pub struct DenseLu {
    n: usize,
    lu: LU<f64, Dyn, Dyn>,
}

impl DenseLu {
    /// 由 LDU 矩阵与 cyclic 接口组装并分解
    ///
    /// 含 processor 接口或遇到零主元时返回 `None`，调用方改用迭代求解。
    pub fn factorise<S: RuntimeScalar>(
        matrix: &LduMatrix<S>,
        interfaces: &InterfaceSet<S>,
    ) -> Option<Self> {
        if interfaces.has_processor() {
            return None;
        }

        let n = matrix.n_cells();
        let mut a = DMatrix::<f64>::zeros(n, n);
        for (c, &d) in matrix.diag().iter().enumerate() {
            a[(c, c)] = d.as_f64();
        }
        let addr = matrix.addressing();
        for f in 0..matrix.n_faces() {
            let (l, u) = (addr.lower()[f], addr.upper()[f]);
            a[(l, u)] += matrix.upper()[f].as_f64();
            a[(u, l)] += matrix.lower()[f].as_f64();
        }
        // 矩阵乘法中接口贡献为 −coeff·ψ_nbr
        for i in interfaces.iter() {
            if let InterfaceKind::Cyclic {
                neighbour_face_cells,
            } = &i.kind
            {
                for ((&c, &nbr), &k) in i.face_cells.iter().zip(neighbour_face_cells).zip(&i.coeffs)
                {
                    a[(c, nbr)] -= k.as_f64();
                }
            }
        }

        let lu = a.lu();
        let u = lu.u();
        let min_pivot = u.diagonal().iter().fold(f64::GREAT, |m, d| m.min(d.abs()));
        if n == 0 || min_pivot < f64::VSMALL {
            return None;
        }
        Some(Self { n, lu })
    }

    /// 维数
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// 解 Ax = b，分解不可逆时返回 `false` 且不修改 `x`
    pub fn solve<S: RuntimeScalar>(&self, x: &mut [S], b: &[S]) -> bool {
        let rhs = DVector::from_iterator(b.len(), b.iter().map(|v| v.as_f64()));
        match self.lu.solve(&rhs) {
            Some(sol) => {
                for (xi, &yi) in x.iter_mut().zip(sol.iter()) {
                    *xi = S::from_config(yi);
                }
                true
            }
            None => false,
        }
    }
}
