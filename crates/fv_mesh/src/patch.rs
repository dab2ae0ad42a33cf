// crates/fv_mesh/src/patch.rs

//! 边界 patch 定义
//!
//! 每个 patch 是一段连续的边界面 `[start, start + size)`。
//! 耦合 patch（cyclic、processor）的第 i 个面与对应 patch 的第 i 个面配对。

use glam::{DMat3, DVec3};
use std::fmt;

/// cyclic 耦合的几何变换
///
/// 变换把对应 patch 一侧的位置/矢量带到本 patch 的坐标系中。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CyclicTransform {
    /// 两侧重合（无变换）
    #[default]
    None,
    /// 平移：本侧位置 = 对侧位置 + separation
    Translational {
        /// 平移矢量
        separation: DVec3,
    },
    /// 绕原点旋转：本侧位置 = R · 对侧位置，矢量同样旋转
    Rotational {
        /// 旋转矩阵
        rotation: DMat3,
    },
}

impl CyclicTransform {
    /// 变换对侧位置到本侧
    #[inline]
    pub fn transform_position(&self, p: DVec3) -> DVec3 {
        match self {
            Self::None => p,
            Self::Translational { separation } => p + *separation,
            Self::Rotational { rotation } => *rotation * p,
        }
    }

    /// 旋转矩阵（只有旋转变换才有）
    #[inline]
    pub fn rotation(&self) -> Option<DMat3> {
        match self {
            Self::Rotational { rotation } => Some(*rotation),
            _ => None,
        }
    }

    /// 对侧应使用的逆变换
    pub fn inverse(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Translational { separation } => Self::Translational {
                separation: -*separation,
            },
            Self::Rotational { rotation } => Self::Rotational {
                rotation: rotation.transpose(),
            },
        }
    }
}

/// patch 类型
#[derive(Debug, Clone, PartialEq)]
pub enum PatchKind {
    /// 一般边界
    Patch,
    /// 壁面
    Wall,
    /// 对称面
    Symmetry,
    /// 周期耦合
    Cyclic {
        /// 对应 patch 序号
        neighbour_patch: usize,
        /// 对侧到本侧的变换
        transform: CyclicTransform,
    },
    /// 进程间边界
    Processor {
        /// 对侧进程号
        neighbour_rank: usize,
        /// 消息标签（两侧相同）
        tag: u32,
        /// 对侧单元中心（已在本侧坐标系中）
        neighbour_cell_centres: Vec<DVec3>,
    },
}

impl PatchKind {
    /// 是否为耦合边界
    #[inline]
    pub fn is_coupled(&self) -> bool {
        matches!(self, Self::Cyclic { .. } | Self::Processor { .. })
    }

    /// 类型名
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::Wall => "wall",
            Self::Symmetry => "symmetry",
            Self::Cyclic { .. } => "cyclic",
            Self::Processor { .. } => "processor",
        }
    }
}

/// 边界 patch
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// 名称
    pub name: String,
    /// 全局面序号中的起点
    pub start: usize,
    /// 面数
    pub size: usize,
    /// 类型
    pub kind: PatchKind,
}

impl Patch {
    /// 创建 patch
    pub fn new(name: impl Into<String>, start: usize, size: usize, kind: PatchKind) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            kind,
        }
    }

    /// 面序号范围
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.size
    }

    /// 是否为耦合边界
    #[inline]
    pub fn is_coupled(&self) -> bool {
        self.kind.is_coupled()
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} 面, 起点 {})",
            self.name,
            self.kind.type_name(),
            self.size,
            self.start
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translational_inverse() {
        let t = CyclicTransform::Translational {
            separation: DVec3::new(-2.0, 0.0, 0.0),
        };
        let p = DVec3::new(1.5, 0.0, 0.0);
        assert_eq!(t.inverse().transform_position(t.transform_position(p)), p);
    }

    #[test]
    fn test_rotational_inverse() {
        let r = DMat3::from_rotation_z(std::f64::consts::FRAC_PI_2);
        let t = CyclicTransform::Rotational { rotation: r };
        let p = DVec3::new(1.0, 0.0, 0.0);
        let q = t.transform_position(p);
        assert!((q - DVec3::new(0.0, 1.0, 0.0)).length() < 1e-12);
        assert!((t.inverse().transform_position(q) - p).length() < 1e-12);
        assert!(t.rotation().is_some());
    }

    #[test]
    fn test_patch_range() {
        let p = Patch::new("left", 4, 2, PatchKind::Wall);
        assert_eq!(p.range(), 4..6);
        assert!(!p.is_coupled());
        assert!(p.to_string().contains("wall"));
    }
}
