// crates/fv_foundation/src/dimension.rs

//! 物理量纲
//!
//! 以七个基本量的整数指数 `[质量, 长度, 时间, 温度, 物质的量, 电流, 发光强度]`
//! 表示物理量纲。方程的各项在组合前比较量纲，不一致即为配置错误。
//!
//! # 用法
//!
//! ```
//! use fv_foundation::dimension::DimensionSet;
//!
//! let nu = DimensionSet::KINEMATIC_VISCOSITY;
//! let lap = nu * DimensionSet::VELOCITY / DimensionSet::AREA;
//! assert_eq!(lap, DimensionSet::ACCELERATION);
//! assert_eq!(lap.to_string(), "[0 1 -2 0 0 0 0]");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Div, Mul};

/// 基本量个数
pub const N_BASE_DIMENSIONS: usize = 7;

/// 物理量纲集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DimensionSet(pub [i8; N_BASE_DIMENSIONS]);

impl DimensionSet {
    /// 无量纲
    pub const DIMLESS: Self = Self::new(0, 0, 0, 0, 0);
    /// 质量 kg
    pub const MASS: Self = Self::new(1, 0, 0, 0, 0);
    /// 长度 m
    pub const LENGTH: Self = Self::new(0, 1, 0, 0, 0);
    /// 时间 s
    pub const TIME: Self = Self::new(0, 0, 1, 0, 0);
    /// 温度 K
    pub const TEMPERATURE: Self = Self::new(0, 0, 0, 1, 0);
    /// 物质的量 mol
    pub const MOLES: Self = Self::new(0, 0, 0, 0, 1);

    /// 面积 m²
    pub const AREA: Self = Self::new(0, 2, 0, 0, 0);
    /// 体积 m³
    pub const VOLUME: Self = Self::new(0, 3, 0, 0, 0);
    /// 速度 m/s
    pub const VELOCITY: Self = Self::new(0, 1, -1, 0, 0);
    /// 加速度 m/s²
    pub const ACCELERATION: Self = Self::new(0, 1, -2, 0, 0);
    /// 密度 kg/m³
    pub const DENSITY: Self = Self::new(1, -3, 0, 0, 0);
    /// 压力 Pa
    pub const PRESSURE: Self = Self::new(1, -1, -2, 0, 0);
    /// 运动压力 p/ρ, m²/s²
    pub const KINEMATIC_PRESSURE: Self = Self::new(0, 2, -2, 0, 0);
    /// 运动粘度 m²/s
    pub const KINEMATIC_VISCOSITY: Self = Self::new(0, 2, -1, 0, 0);
    /// 动力粘度 kg/(m·s)
    pub const DYNAMIC_VISCOSITY: Self = Self::new(1, -1, -1, 0, 0);
    /// 体积通量 m³/s
    pub const FLUX: Self = Self::new(0, 3, -1, 0, 0);
    /// 质量通量 kg/s
    pub const MASS_FLUX: Self = Self::new(1, 0, -1, 0, 0);

    /// 由前五个基本量的指数创建（电流、发光强度为 0）
    pub const fn new(mass: i8, length: i8, time: i8, temperature: i8, moles: i8) -> Self {
        Self([mass, length, time, temperature, moles, 0, 0])
    }

    /// 指数乘法（量纲相乘）
    pub const fn product(self, other: Self) -> Self {
        let mut out = [0i8; N_BASE_DIMENSIONS];
        let mut i = 0;
        while i < N_BASE_DIMENSIONS {
            out[i] = self.0[i] + other.0[i];
            i += 1;
        }
        Self(out)
    }

    /// 指数减法（量纲相除）
    pub const fn quotient(self, other: Self) -> Self {
        let mut out = [0i8; N_BASE_DIMENSIONS];
        let mut i = 0;
        while i < N_BASE_DIMENSIONS {
            out[i] = self.0[i] - other.0[i];
            i += 1;
        }
        Self(out)
    }

    /// 整数次幂
    pub const fn pow(self, n: i8) -> Self {
        let mut out = [0i8; N_BASE_DIMENSIONS];
        let mut i = 0;
        while i < N_BASE_DIMENSIONS {
            out[i] = self.0[i] * n;
            i += 1;
        }
        Self(out)
    }

    /// 倒数
    pub const fn inv(self) -> Self {
        self.pow(-1)
    }

    /// 是否无量纲
    pub fn is_dimensionless(&self) -> bool {
        self.0.iter().all(|&e| e == 0)
    }
}

impl Mul for DimensionSet {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.product(rhs)
    }
}

impl Div for DimensionSet {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        self.quotient(rhs)
    }
}

impl fmt::Display for DimensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", e)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_units() {
        assert_eq!(DimensionSet::VELOCITY * DimensionSet::TIME, DimensionSet::LENGTH);
        assert_eq!(
            DimensionSet::DENSITY * DimensionSet::VOLUME,
            DimensionSet::MASS
        );
        assert_eq!(
            DimensionSet::PRESSURE / DimensionSet::DENSITY,
            DimensionSet::KINEMATIC_PRESSURE
        );
    }

    #[test]
    fn test_pow_and_inv() {
        assert_eq!(DimensionSet::LENGTH.pow(3), DimensionSet::VOLUME);
        assert_eq!(
            DimensionSet::TIME.inv() * DimensionSet::TIME,
            DimensionSet::DIMLESS
        );
        assert!(DimensionSet::DIMLESS.is_dimensionless());
        assert!(!DimensionSet::AREA.is_dimensionless());
    }

    #[test]
    fn test_display() {
        assert_eq!(DimensionSet::PRESSURE.to_string(), "[1 -1 -2 0 0 0 0]");
    }

    #[test]
    fn test_serde_as_array() {
        let json = serde_json::to_string(&DimensionSet::VELOCITY).unwrap();
        assert_eq!(json, "[0,1,-1,0,0,0,0]");
        let back: DimensionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DimensionSet::VELOCITY);
    }
}
