// crates/fv_mesh/src/error.rs
//! 网格处理错误类型
//!
//! 包含拓扑、寻址与耦合边界的错误定义，
//! 所有错误可转换为 `fv_foundation::FvError` 向上传播

use fv_foundation::FvError;
use thiserror::Error;

/// 网格模块结果类型
pub type MeshResult<T> = Result<T, MeshError>;

/// 网格错误枚举
#[derive(Error, Debug)]
pub enum MeshError {
    /// 拓扑错误
    #[error("拓扑错误: {operation} 失败, {details}")]
    InvalidTopology {
        /// 出错的操作
        operation: &'static str,
        /// 详情
        details: String,
    },

    /// 耦合边界错误
    #[error("耦合边界错误: 边界 {patch}, {reason}")]
    CoupledPatch {
        /// 边界名
        patch: String,
        /// 原因
        reason: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别
        index_type: &'static str,
        /// 索引
        index: usize,
        /// 上界
        len: usize,
    },
}

impl MeshError {
    /// 拓扑错误
    pub fn topology(operation: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidTopology {
            operation,
            details: details.into(),
        }
    }

    /// 耦合边界错误
    pub fn coupled(patch: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CoupledPatch {
            patch: patch.into(),
            reason: reason.into(),
        }
    }

    /// 检查数组大小
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> MeshResult<()> {
        if expected != actual {
            Err(Self::SizeMismatch {
                name,
                expected,
                actual,
            })
        } else {
            Ok(())
        }
    }

    /// 检查索引
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> MeshResult<()> {
        if index >= len {
            Err(Self::IndexOutOfBounds {
                index_type,
                index,
                len,
            })
        } else {
            Ok(())
        }
    }
}

impl From<MeshError> for FvError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::InvalidTopology { operation, details } => {
                FvError::invalid_mesh(format!("{}: {}", operation, details))
            }
            MeshError::CoupledPatch { patch, reason } => FvError::coupled_patch(patch, reason),
            MeshError::SizeMismatch {
                name,
                expected,
                actual,
            } => FvError::size_mismatch(name, expected, actual),
            MeshError::IndexOutOfBounds {
                index_type,
                index,
                len,
            } => FvError::index_out_of_bounds(index_type, index, len),
        }
    }
}
