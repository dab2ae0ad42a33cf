// crates/fv_config/src/schemes.rs

//! 离散格式选择
//!
//! 格式以字符串给出，解析一次后以枚举保存：
//!
//! - 时间项: `"steadyState"`, `"Euler"`, `"backward"`
//! - 对流项: `"Gauss upwind"`, `"Gauss limitedLinear 1"`, `"Gauss vanLeer"`, ...
//! - 扩散项: `"Gauss linear corrected"`, `"Gauss linear limited 0.5"`, ...
//! - 面法向梯度: `"corrected"`, `"uncorrected"`, `"limited 0.33"`, `"orthogonal"`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::registry::named_kind;

named_kind! {
    /// 时间导数格式
    pub enum DdtKind ("时间格式") {
        /// 稳态，时间项为零
        SteadyState => "steadyState",
        /// 一阶隐式 Euler
        Euler => "Euler",
        /// 二阶后向差分
        Backward => "backward",
    }
}

named_kind! {
    /// 面插值格式
    pub enum InterpolationKind ("插值格式") {
        /// 迎风
        Upwind => "upwind",
        /// 线性（中心）
        Linear => "linear",
        /// 迎风加显式梯度修正
        LinearUpwind => "linearUpwind",
        /// 限制线性，系数 k ∈ [0, 1]
        LimitedLinear => "limitedLinear",
        /// van Leer 限制器
        VanLeer => "vanLeer",
        /// Minmod 限制器
        Minmod => "Minmod" | "minmod",
        /// SuperBee 限制器
        SuperBee => "SuperBee" | "superBee",
        /// MUSCL 限制器
        Muscl => "MUSCL",
    }
}

impl Default for DdtKind {
    fn default() -> Self {
        Self::Euler
    }
}

impl Default for InterpolationKind {
    fn default() -> Self {
        Self::Linear
    }
}

impl InterpolationKind {
    /// 是否需要系数
    pub fn takes_coefficient(self) -> bool {
        matches!(self, Self::LimitedLinear)
    }

    /// 是否为 TVD 限制格式
    pub fn is_limited(self) -> bool {
        matches!(
            self,
            Self::LimitedLinear | Self::VanLeer | Self::Minmod | Self::SuperBee | Self::Muscl
        )
    }
}

/// 去掉可选的 "Gauss" 前缀后切分
fn tokens(s: &str) -> Vec<&str> {
    let mut t: Vec<&str> = s.split_whitespace().collect();
    if t.first() == Some(&"Gauss") {
        t.remove(0);
    }
    t
}

fn parse_coefficient(key: &str, token: &str) -> Result<f64, ConfigError> {
    let v: f64 = token
        .parse()
        .map_err(|_| ConfigError::invalid(key, token, "无法解析为数值"))?;
    if !(0.0..=1.0).contains(&v) {
        return Err(ConfigError::invalid(key, token, "系数必须在 [0, 1] 内"));
    }
    Ok(v)
}

// =============================================================================
// 对流格式
// =============================================================================

/// 对流项格式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvectionScheme {
    /// 插值格式
    pub interpolation: InterpolationKind,
    /// limitedLinear 的系数 k
    pub coefficient: f64,
}

impl ConvectionScheme {
    /// 迎风格式
    pub const UPWIND: Self = Self {
        interpolation: InterpolationKind::Upwind,
        coefficient: 1.0,
    };

    /// 线性格式
    pub const LINEAR: Self = Self {
        interpolation: InterpolationKind::Linear,
        coefficient: 1.0,
    };

    /// 由插值格式创建
    pub fn new(interpolation: InterpolationKind) -> Self {
        Self {
            interpolation,
            coefficient: 1.0,
        }
    }

    /// limitedLinear(k)
    pub fn limited_linear(k: f64) -> Self {
        Self {
            interpolation: InterpolationKind::LimitedLinear,
            coefficient: k,
        }
    }
}

impl FromStr for ConvectionScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = tokens(s);
        let name = t
            .first()
            .ok_or_else(|| ConfigError::invalid("div", s, "格式为空"))?;
        let interpolation = InterpolationKind::lookup(name)?;
        let coefficient = match (interpolation.takes_coefficient(), t.get(1)) {
            (true, Some(c)) => parse_coefficient("div", c)?,
            (true, None) => {
                return Err(ConfigError::invalid("div", s, "limitedLinear 需要系数"));
            }
            (false, Some(_)) => {
                // linearUpwind 后可跟梯度格式名，只支持 Gauss linear 梯度
                if interpolation != InterpolationKind::LinearUpwind {
                    return Err(ConfigError::invalid("div", s, "多余的参数"));
                }
                1.0
            }
            (false, None) => 1.0,
        };
        Ok(Self {
            interpolation,
            coefficient,
        })
    }
}

impl fmt::Display for ConvectionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.interpolation.takes_coefficient() {
            write!(f, "Gauss {} {}", self.interpolation, self.coefficient)
        } else {
            write!(f, "Gauss {}", self.interpolation)
        }
    }
}

// =============================================================================
// 面法向梯度与扩散格式
// =============================================================================

/// 面法向梯度格式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnGradScheme {
    /// 隐式正交部分 + 显式非正交修正
    Corrected,
    /// 只用非正交距离系数，不做修正
    Uncorrected,
    /// 修正量限制为正交部分的 ψ 倍，ψ ∈ [0, 1]
    Limited(f64),
    /// 用 1/|d|，忽略非正交性
    Orthogonal,
}

impl Default for SnGradScheme {
    fn default() -> Self {
        Self::Corrected
    }
}

impl SnGradScheme {
    /// 是否带显式非正交修正
    pub fn corrected(&self) -> bool {
        match self {
            Self::Corrected => true,
            Self::Limited(psi) => *psi > 0.0,
            Self::Uncorrected | Self::Orthogonal => false,
        }
    }

    /// 修正限制系数，corrected 为 1
    pub fn limit_coefficient(&self) -> f64 {
        match self {
            Self::Corrected => 1.0,
            Self::Limited(psi) => *psi,
            Self::Uncorrected | Self::Orthogonal => 0.0,
        }
    }

    fn parse_tokens(t: &[&str], source: &str) -> Result<Self, ConfigError> {
        match t {
            ["corrected"] => Ok(Self::Corrected),
            ["uncorrected"] => Ok(Self::Uncorrected),
            ["orthogonal"] => Ok(Self::Orthogonal),
            ["limited", c] | ["limited", "corrected", c] => {
                let psi = parse_coefficient("snGrad.limited", c)?;
                Ok(if psi == 1.0 {
                    Self::Corrected
                } else if psi == 0.0 {
                    Self::Uncorrected
                } else {
                    Self::Limited(psi)
                })
            }
            _ => Err(ConfigError::invalid(
                "snGrad",
                source,
                "可选: corrected, uncorrected, limited <ψ>, orthogonal",
            )),
        }
    }
}

impl FromStr for SnGradScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t: Vec<&str> = s.split_whitespace().collect();
        Self::parse_tokens(&t, s)
    }
}

impl fmt::Display for SnGradScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrected => f.write_str("corrected"),
            Self::Uncorrected => f.write_str("uncorrected"),
            Self::Limited(psi) => write!(f, "limited {}", psi),
            Self::Orthogonal => f.write_str("orthogonal"),
        }
    }
}

/// 扩散项格式
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LaplacianScheme {
    /// 扩散系数插值（目前为 linear）
    pub interpolation: InterpolationKind,
    /// 面法向梯度格式
    pub sn_grad: SnGradScheme,
}

impl LaplacianScheme {
    /// Gauss linear + 指定面法向梯度
    pub fn new(sn_grad: SnGradScheme) -> Self {
        Self {
            interpolation: InterpolationKind::Linear,
            sn_grad,
        }
    }
}

impl FromStr for LaplacianScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = tokens(s);
        let (name, rest) = t
            .split_first()
            .ok_or_else(|| ConfigError::invalid("laplacian", s, "格式为空"))?;
        let interpolation = InterpolationKind::lookup(name)?;
        if interpolation != InterpolationKind::Linear {
            return Err(ConfigError::invalid(
                "laplacian",
                s,
                "扩散系数只支持 linear 插值",
            ));
        }
        let sn_grad = SnGradScheme::parse_tokens(rest, s)?;
        Ok(Self {
            interpolation,
            sn_grad,
        })
    }
}

impl fmt::Display for LaplacianScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gauss {} {}", self.interpolation, self.sn_grad)
    }
}

/// 以字符串形式序列化的格式类型
macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(ConvectionScheme);
string_serde!(SnGradScheme);
string_serde!(LaplacianScheme);

// =============================================================================
// 格式字典
// =============================================================================

/// 离散格式字典
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FvSchemes {
    /// 时间导数格式
    #[serde(default)]
    pub ddt: DdtKind,

    /// 对流项格式，键为项名，例如 `"div(phi,T)"`
    #[serde(default)]
    pub div: BTreeMap<String, ConvectionScheme>,

    /// 未单独指定时的对流格式
    #[serde(default)]
    pub default_div: Option<ConvectionScheme>,

    /// 扩散项格式
    #[serde(default)]
    pub laplacian: LaplacianScheme,

    /// 面法向梯度格式（fvc::sn_grad 使用）
    #[serde(default)]
    pub sn_grad: SnGradScheme,
}

impl Default for FvSchemes {
    fn default() -> Self {
        Self {
            ddt: DdtKind::default(),
            div: BTreeMap::new(),
            default_div: Some(ConvectionScheme::UPWIND),
            laplacian: LaplacianScheme::default(),
            sn_grad: SnGradScheme::default(),
        }
    }
}

impl FvSchemes {
    /// 查找对流项格式
    pub fn div_scheme(&self, term: &str) -> Result<ConvectionScheme, ConfigError> {
        self.div
            .get(term)
            .copied()
            .or(self.default_div)
            .ok_or_else(|| ConfigError::Missing(format!("schemes.div.{}", term)))
    }

    /// 设置对流项格式
    pub fn set_div(&mut self, term: impl Into<String>, scheme: ConvectionScheme) {
        self.div.insert(term.into(), scheme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convection() {
        let s: ConvectionScheme = "Gauss limitedLinear 0.5".parse().unwrap();
        assert_eq!(s.interpolation, InterpolationKind::LimitedLinear);
        assert_eq!(s.coefficient, 0.5);

        let s: ConvectionScheme = "vanLeer".parse().unwrap();
        assert_eq!(s.interpolation, InterpolationKind::VanLeer);

        assert!("Gauss limitedLinear".parse::<ConvectionScheme>().is_err());
        assert!("Gauss limitedLinear 2".parse::<ConvectionScheme>().is_err());
        assert!("Gauss QUICKV".parse::<ConvectionScheme>().is_err());
    }

    #[test]
    fn test_parse_laplacian() {
        let s: LaplacianScheme = "Gauss linear corrected".parse().unwrap();
        assert_eq!(s.sn_grad, SnGradScheme::Corrected);

        let s: LaplacianScheme = "Gauss linear limited 0.33".parse().unwrap();
        assert_eq!(s.sn_grad, SnGradScheme::Limited(0.33));
        assert!(s.sn_grad.corrected());

        let s: LaplacianScheme = "Gauss linear limited corrected 0".parse().unwrap();
        assert_eq!(s.sn_grad, SnGradScheme::Uncorrected);

        assert!("Gauss upwind corrected".parse::<LaplacianScheme>().is_err());
        assert!("Gauss linear skewCorrected".parse::<LaplacianScheme>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["Gauss upwind", "Gauss limitedLinear 1", "Gauss MUSCL"] {
            let s: ConvectionScheme = text.parse().unwrap();
            assert_eq!(s.to_string(), text);
        }
        let l: LaplacianScheme = "Gauss linear uncorrected".parse().unwrap();
        assert_eq!(l.to_string(), "Gauss linear uncorrected");
    }

    #[test]
    fn test_schemes_json() {
        let json = r#"{
            "ddt": "backward",
            "div": { "div(phi,T)": "Gauss vanLeer" },
            "laplacian": "Gauss linear limited 0.5"
        }"#;
        let s: FvSchemes = serde_json::from_str(json).unwrap();
        assert_eq!(s.ddt, DdtKind::Backward);
        assert_eq!(
            s.div_scheme("div(phi,T)").unwrap().interpolation,
            InterpolationKind::VanLeer
        );
        assert!(s.div_scheme("div(phi,U)").is_err());
        assert_eq!(s.laplacian.sn_grad, SnGradScheme::Limited(0.5));
    }

    #[test]
    fn test_default_div_fallback() {
        let s = FvSchemes::default();
        assert_eq!(s.div_scheme("div(phi,k)").unwrap(), ConvectionScheme::UPWIND);
    }
}
