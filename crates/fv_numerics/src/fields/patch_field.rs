// crates/fv_numerics/src/fields/patch_field.rs

//! 边界条件
//!
//! 每种边界条件给出四组逐面系数，满足
//!
//! ```text
//! 面值      ψ_f   = valueInternalCoeffs ⊙ ψ_P + valueBoundaryCoeffs
//! 法向梯度  ∂ψ/∂n = gradientInternalCoeffs ⊙ ψ_P + gradientBoundaryCoeffs
//! ```
//!
//! 对流项用面值系数，扩散项用梯度系数。耦合边界（cyclic、processor）的
//! 系数是插值权重与距离系数，对侧单元值在求解时经接口交换得到。
//!
//! | 条件 | vIC | vBC | gIC | gBC |
//! |------|-----|-----|-----|-----|
//! | fixedValue | 0 | ψ_b | −δ | δψ_b |
//! | fixedGradient | 1 | g/δ | 0 | g |
//! | zeroGradient | 1 | 0 | 0 | 0 |
//! | mixed | 1−f | f·ψ_ref + (1−f)g_ref/δ | −fδ | fδψ_ref + (1−f)g_ref |
//! | symmetry | 1−D | ψ_b − vIC⊙ψ_P | −δD | ∂ψ/∂n − gIC⊙ψ_P |
//! | cyclic/processor | w | 1−w | −δ | δ |

use super::value::{reflection, FieldValue};
use fv_mesh::{Patch, PatchGeometry};

/// 边界条件
#[derive(Debug, Clone, PartialEq)]
pub enum PatchCondition<T: FieldValue> {
    /// 给定值（值存于 [`PatchField::value`]）
    FixedValue,
    /// 给定法向梯度
    FixedGradient {
        /// 逐面梯度
        gradient: Vec<T>,
    },
    /// 零法向梯度
    ZeroGradient,
    /// 值与梯度混合
    Mixed {
        /// 参考值
        ref_value: Vec<T>,
        /// 参考梯度
        ref_grad: Vec<T>,
        /// 值权重 f ∈ [0, 1]
        value_fraction: Vec<f64>,
    },
    /// 对称面：标量为零梯度，矢量去掉法向分量
    Symmetry,
    /// 按单元梯度线性外推（梯度滞后一步更新）
    Extrapolated {
        /// 当前使用的法向梯度
        gradient: Vec<T>,
    },
    /// 本进程周期耦合
    Cyclic,
    /// 进程间耦合
    Processor,
}

impl<T: FieldValue> PatchCondition<T> {
    /// 类型名
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::FixedValue => "fixedValue",
            Self::FixedGradient { .. } => "fixedGradient",
            Self::ZeroGradient => "zeroGradient",
            Self::Mixed { .. } => "mixed",
            Self::Symmetry => "symmetry",
            Self::Extrapolated { .. } => "extrapolated",
            Self::Cyclic => "cyclic",
            Self::Processor => "processor",
        }
    }

    /// 是否为耦合条件
    #[inline]
    pub fn is_coupled(&self) -> bool {
        matches!(self, Self::Cyclic | Self::Processor)
    }

    /// 是否固定场的水平（决定压力方程是否需要参考点）
    pub fn fixes_value(&self) -> bool {
        match self {
            Self::FixedValue => true,
            Self::Mixed { value_fraction, .. } => value_fraction.iter().any(|&f| f > 0.0),
            _ => false,
        }
    }
}

/// 构造场时使用的均匀边界设定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundarySpec<T: FieldValue> {
    /// 给定值
    FixedValue(T),
    /// 给定法向梯度
    FixedGradient(T),
    /// 零法向梯度
    ZeroGradient,
    /// 混合
    Mixed {
        /// 参考值
        ref_value: T,
        /// 参考梯度
        ref_grad: T,
        /// 值权重
        value_fraction: f64,
    },
    /// 对称面
    Symmetry,
    /// 梯度外推
    Extrapolated,
    /// 耦合（按 patch 类型取 cyclic 或 processor）
    Coupled,
}

impl<T: FieldValue> BoundarySpec<T> {
    /// 耦合 patch 取 `Coupled`，其余取 `spec`
    pub fn coupled_or(patch: &Patch, spec: Self) -> Self {
        if patch.is_coupled() {
            Self::Coupled
        } else {
            spec
        }
    }
}

/// 单个 patch 上的场
#[derive(Debug, Clone, PartialEq)]
pub struct PatchField<T: FieldValue> {
    /// 边界条件
    pub condition: PatchCondition<T>,
    /// 面值
    pub value: Vec<T>,
    /// 耦合边界对侧单元值（本侧坐标系）；非耦合为空
    pub neighbour: Vec<T>,
}

impl<T: FieldValue> PatchField<T> {
    /// 创建，面值初始化为 `value`
    pub fn new(condition: PatchCondition<T>, value: Vec<T>) -> Self {
        Self {
            condition,
            value,
            neighbour: Vec::new(),
        }
    }

    /// 面数
    #[inline]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// 是否为耦合边界
    #[inline]
    pub fn is_coupled(&self) -> bool {
        self.condition.is_coupled()
    }

    /// 按边界条件更新面值
    ///
    /// 耦合边界需先设置 `neighbour`。
    pub fn evaluate(&mut self, geo: &PatchGeometry, psi_p: &[T]) {
        let dc = &geo.delta_coeffs;
        match &self.condition {
            PatchCondition::FixedValue => {}
            PatchCondition::FixedGradient { gradient }
            | PatchCondition::Extrapolated { gradient } => {
                for i in 0..self.value.len() {
                    self.value[i] = psi_p[i] + gradient[i] * (1.0 / dc[i]);
                }
            }
            PatchCondition::ZeroGradient => self.value.copy_from_slice(psi_p),
            PatchCondition::Mixed {
                ref_value,
                ref_grad,
                value_fraction,
            } => {
                for i in 0..self.value.len() {
                    let f = value_fraction[i];
                    self.value[i] =
                        ref_value[i] * f + (psi_p[i] + ref_grad[i] * (1.0 / dc[i])) * (1.0 - f);
                }
            }
            PatchCondition::Symmetry => {
                for i in 0..self.value.len() {
                    let reflected = psi_p[i].transform(&reflection(geo.nf[i]));
                    self.value[i] = (psi_p[i] + reflected) * 0.5;
                }
            }
            PatchCondition::Cyclic | PatchCondition::Processor => {
                for i in 0..self.value.len() {
                    let w = geo.weights[i];
                    self.value[i] = psi_p[i] * w + self.neighbour[i] * (1.0 - w);
                }
            }
        }
    }

    /// 面法向梯度
    pub fn sn_grad(&self, geo: &PatchGeometry, psi_p: &[T]) -> Vec<T> {
        let dc = &geo.delta_coeffs;
        match &self.condition {
            PatchCondition::FixedGradient { gradient }
            | PatchCondition::Extrapolated { gradient } => gradient.clone(),
            PatchCondition::ZeroGradient => vec![T::zero(); self.len()],
            PatchCondition::Mixed {
                ref_value,
                ref_grad,
                value_fraction,
            } => (0..self.len())
                .map(|i| {
                    let f = value_fraction[i];
                    (ref_value[i] - psi_p[i]) * (f * dc[i]) + ref_grad[i] * (1.0 - f)
                })
                .collect(),
            PatchCondition::Symmetry => (0..self.len())
                .map(|i| {
                    let reflected = psi_p[i].transform(&reflection(geo.nf[i]));
                    (reflected - psi_p[i]) * (0.5 * dc[i])
                })
                .collect(),
            PatchCondition::FixedValue => (0..self.len())
                .map(|i| (self.value[i] - psi_p[i]) * dc[i])
                .collect(),
            PatchCondition::Cyclic | PatchCondition::Processor => (0..self.len())
                .map(|i| (self.neighbour[i] - psi_p[i]) * geo.non_orth_delta_coeffs[i])
                .collect(),
        }
    }

    /// 面值对本侧单元值的系数
    pub fn value_internal_coeffs(&self, geo: &PatchGeometry) -> Vec<T> {
        let n = self.len();
        match &self.condition {
            PatchCondition::FixedValue => vec![T::zero(); n],
            PatchCondition::FixedGradient { .. }
            | PatchCondition::Extrapolated { .. }
            | PatchCondition::ZeroGradient => vec![T::splat(1.0); n],
            PatchCondition::Mixed { value_fraction, .. } => {
                value_fraction.iter().map(|&f| T::splat(1.0 - f)).collect()
            }
            PatchCondition::Symmetry => geo
                .nf
                .iter()
                .map(|&nf| T::splat(1.0) - T::transform_diag(nf))
                .collect(),
            PatchCondition::Cyclic | PatchCondition::Processor => {
                geo.weights.iter().map(|&w| T::splat(w)).collect()
            }
        }
    }

    /// 面值的常数部分
    pub fn value_boundary_coeffs(&self, geo: &PatchGeometry, psi_p: &[T]) -> Vec<T> {
        let n = self.len();
        let dc = &geo.delta_coeffs;
        match &self.condition {
            PatchCondition::FixedValue => self.value.clone(),
            PatchCondition::FixedGradient { gradient }
            | PatchCondition::Extrapolated { gradient } => {
                (0..n).map(|i| gradient[i] * (1.0 / dc[i])).collect()
            }
            PatchCondition::ZeroGradient => vec![T::zero(); n],
            PatchCondition::Mixed {
                ref_value,
                ref_grad,
                value_fraction,
            } => (0..n)
                .map(|i| {
                    let f = value_fraction[i];
                    ref_value[i] * f + ref_grad[i] * ((1.0 - f) / dc[i])
                })
                .collect(),
            PatchCondition::Symmetry => {
                let vic = self.value_internal_coeffs(geo);
                let mut face = self.clone();
                face.evaluate(geo, psi_p);
                (0..n)
                    .map(|i| face.value[i] - vic[i].cmpt_mul(psi_p[i]))
                    .collect()
            }
            PatchCondition::Cyclic | PatchCondition::Processor => {
                geo.weights.iter().map(|&w| T::splat(1.0 - w)).collect()
            }
        }
    }

    /// 法向梯度对本侧单元值的系数
    ///
    /// `delta` 为格式选定的距离系数，只对耦合边界起作用。
    pub fn gradient_internal_coeffs(&self, geo: &PatchGeometry, delta: &[f64]) -> Vec<T> {
        let n = self.len();
        let dc = &geo.delta_coeffs;
        match &self.condition {
            PatchCondition::FixedValue => dc.iter().map(|&d| T::splat(-d)).collect(),
            PatchCondition::FixedGradient { .. }
            | PatchCondition::Extrapolated { .. }
            | PatchCondition::ZeroGradient => vec![T::zero(); n],
            PatchCondition::Mixed { value_fraction, .. } => (0..n)
                .map(|i| T::splat(-value_fraction[i] * dc[i]))
                .collect(),
            PatchCondition::Symmetry => (0..n)
                .map(|i| T::transform_diag(geo.nf[i]) * -dc[i])
                .collect(),
            PatchCondition::Cyclic | PatchCondition::Processor => {
                delta.iter().map(|&d| T::splat(-d)).collect()
            }
        }
    }

    /// 法向梯度的常数部分
    pub fn gradient_boundary_coeffs(
        &self,
        geo: &PatchGeometry,
        delta: &[f64],
        psi_p: &[T],
    ) -> Vec<T> {
        let n = self.len();
        let dc = &geo.delta_coeffs;
        match &self.condition {
            PatchCondition::FixedValue => (0..n).map(|i| self.value[i] * dc[i]).collect(),
            PatchCondition::FixedGradient { gradient }
            | PatchCondition::Extrapolated { gradient } => gradient.clone(),
            PatchCondition::ZeroGradient => vec![T::zero(); n],
            PatchCondition::Mixed {
                ref_value,
                ref_grad,
                value_fraction,
            } => (0..n)
                .map(|i| {
                    let f = value_fraction[i];
                    ref_value[i] * (f * dc[i]) + ref_grad[i] * (1.0 - f)
                })
                .collect(),
            PatchCondition::Symmetry => {
                let gic = self.gradient_internal_coeffs(geo, delta);
                let sn_grad = self.sn_grad(geo, psi_p);
                (0..n).map(|i| sn_grad[i] - gic[i].cmpt_mul(psi_p[i])).collect()
            }
            PatchCondition::Cyclic | PatchCondition::Processor => {
                delta.iter().map(|&d| T::splat(d)).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn geometry(n: usize, dc: f64, nf: DVec3) -> PatchGeometry {
        PatchGeometry {
            mag_sf: vec![1.0; n],
            weights: vec![1.0; n],
            delta: vec![nf / dc; n],
            delta_coeffs: vec![dc; n],
            non_orth_delta_coeffs: vec![dc; n],
            non_orth_correction: vec![DVec3::ZERO; n],
            nf: vec![nf; n],
            face_offset: vec![nf / dc; n],
            neighbour_centres: Vec::new(),
        }
    }

    /// 由系数重建的面值与 evaluate 一致
    fn assert_consistent<T: FieldValue>(pf: &PatchField<T>, geo: &PatchGeometry, psi_p: &[T]) {
        let vic = pf.value_internal_coeffs(geo);
        let vbc = pf.value_boundary_coeffs(geo, psi_p);
        let gic = pf.gradient_internal_coeffs(geo, &geo.delta_coeffs);
        let gbc = pf.gradient_boundary_coeffs(geo, &geo.delta_coeffs, psi_p);
        let mut evaluated = pf.clone();
        evaluated.evaluate(geo, psi_p);
        let sn_grad = pf.sn_grad(geo, psi_p);
        for i in 0..pf.len() {
            let face = vic[i].cmpt_mul(psi_p[i]) + vbc[i];
            let grad = gic[i].cmpt_mul(psi_p[i]) + gbc[i];
            assert!((face - evaluated.value[i]).mag() < 1e-12, "{}", pf.condition.type_name());
            assert!((grad - sn_grad[i]).mag() < 1e-12, "{}", pf.condition.type_name());
        }
    }

    #[test]
    fn test_scalar_conditions_consistent() {
        let geo = geometry(2, 4.0, DVec3::X);
        let psi_p = [1.0, 3.0];
        for condition in [
            PatchCondition::FixedValue,
            PatchCondition::FixedGradient {
                gradient: vec![2.0, -1.0],
            },
            PatchCondition::ZeroGradient,
            PatchCondition::Mixed {
                ref_value: vec![5.0, 5.0],
                ref_grad: vec![1.0, 0.0],
                value_fraction: vec![0.25, 1.0],
            },
            PatchCondition::Symmetry,
        ] {
            let pf = PatchField::new(condition, vec![10.0, 20.0]);
            assert_consistent(&pf, &geo, &psi_p);
        }
    }

    #[test]
    fn test_vector_symmetry_removes_normal_component() {
        let geo = geometry(1, 2.0, DVec3::Y);
        let psi_p = [DVec3::new(1.0, 2.0, 0.0)];
        let mut pf = PatchField::new(PatchCondition::Symmetry, vec![DVec3::ZERO]);
        pf.evaluate(&geo, &psi_p);
        assert_eq!(pf.value[0], DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(pf.sn_grad(&geo, &psi_p)[0], DVec3::new(0.0, -4.0, 0.0));
        assert_consistent(&pf, &geo, &psi_p);
    }

    #[test]
    fn test_fixed_value_coeffs() {
        let geo = geometry(1, 4.0, DVec3::X);
        let pf = PatchField::new(PatchCondition::FixedValue, vec![100.0]);
        assert_eq!(pf.value_internal_coeffs(&geo), vec![0.0]);
        assert_eq!(pf.value_boundary_coeffs(&geo, &[0.0]), vec![100.0]);
        assert_eq!(pf.gradient_internal_coeffs(&geo, &[4.0]), vec![-4.0]);
        assert_eq!(pf.gradient_boundary_coeffs(&geo, &[4.0], &[0.0]), vec![400.0]);
        assert!(pf.condition.fixes_value());
    }

    #[test]
    fn test_coupled_coeffs() {
        let mut geo = geometry(1, 2.0, DVec3::X);
        geo.weights = vec![0.4];
        let mut pf = PatchField::new(PatchCondition::Cyclic, vec![0.0]);
        pf.neighbour = vec![6.0];
        assert_eq!(pf.value_internal_coeffs(&geo), vec![0.4]);
        assert!((pf.value_boundary_coeffs(&geo, &[1.0])[0] - 0.6).abs() < 1e-15);
        pf.evaluate(&geo, &[1.0]);
        assert!((pf.value[0] - (0.4 + 3.6)).abs() < 1e-12);
        assert_eq!(pf.gradient_boundary_coeffs(&geo, &[3.0], &[1.0]), vec![3.0]);
    }
}
