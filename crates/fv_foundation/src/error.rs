// crates/fv_foundation/src/error.rs

//! 统一错误类型 `FvError` 与 `FvResult`
//!
//! # 错误分类
//!
//! 1. **配置错误**: 量纲不匹配、耦合边界缺失、格式名称无法识别，装配或初始化时立即报告
//! 2. **数值发散**: 残差非有限或超过安全倍数，默认致命，可配置为仅标记
//! 3. **寻址错误**: 索引越界、数组长度不一致，属于编程错误
//!
//! 达到最大迭代数而未收敛不是错误，只记录在求解性能记录中。
//!
//! ```
//! use fv_foundation::error::{FvError, FvResult};
//!
//! fn check_alpha(alpha: f64) -> FvResult<f64> {
//!     if alpha <= 0.0 {
//!         return Err(FvError::invalid_config("alpha", alpha.to_string(), "必须为正"));
//!     }
//!     Ok(alpha)
//! }
//!
//! assert!(check_alpha(-1.0).unwrap_err().is_configuration_error());
//! ```

use crate::dimension::DimensionSet;
use thiserror::Error;

/// 统一结果类型
pub type FvResult<T> = Result<T, FvError>;

/// 有限体积装配与求解的错误
#[derive(Error, Debug)]
pub enum FvError {
    // ========================================================================
    // 数据与寻址
    // ========================================================================

    /// 文件读写失败
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// 参数不合法
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明
        message: String,
    },

    /// 数值超出允许区间
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 参数名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 下限
        min: f64,
        /// 上限
        max: f64,
    },

    /// 数组长度与网格不一致
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数组名
        name: &'static str,
        /// 期望长度
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别
        index_type: &'static str,
        /// 索引
        index: usize,
        /// 长度
        len: usize,
    },

    // ========================================================================
    // 网格与边界
    // ========================================================================

    /// 网格拓扑不合法
    #[error("无效的网格拓扑: {message}")]
    InvalidMesh {
        /// 说明
        message: String,
    },

    /// 耦合边界缺少对应边界或面数不一致
    #[error("耦合边界错误: 边界 {patch}, {reason}")]
    CoupledPatch {
        /// 边界名
        patch: String,
        /// 原因
        reason: String,
    },

    /// 边界条件与边界类型不兼容
    #[error("边界条件错误: 场 {field} 边界 {patch}, {reason}")]
    BoundaryCondition {
        /// 场名
        field: String,
        /// 边界名
        patch: String,
        /// 原因
        reason: String,
    },

    // ========================================================================
    // 方程装配
    // ========================================================================

    /// 量纲不匹配
    #[error("量纲不匹配: 方程 {field} 在 {operation} 中, 左侧 {lhs}, 右侧 {rhs}")]
    DimensionMismatch {
        /// 运算
        operation: &'static str,
        /// 方程对应的场名
        field: String,
        /// 左操作数量纲
        lhs: DimensionSet,
        /// 右操作数量纲
        rhs: DimensionSet,
    },

    /// 两个方程属于不同的场
    #[error("方程不匹配: 方程属于 {expected}, 实际传入 {actual}")]
    FieldMismatch {
        /// 方程所属场
        expected: String,
        /// 传入的场
        actual: String,
    },

    // ========================================================================
    // 配置
    // ========================================================================

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 说明
        message: String,
    },

    /// 缺少配置项，例如某个场没有求解器设置
    #[error("缺少必需的配置项: {key}")]
    MissingConfig {
        /// 配置键
        key: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    // ========================================================================
    // 求解
    // ========================================================================

    /// 线性求解发散
    #[error(
        "求解发散: {solver} 求解 {field}, 初始残差 {initial:.6e}, 当前残差 {residual:.6e}, 迭代 {iterations} 次"
    )]
    SolverDiverged {
        /// 求解器名称
        solver: &'static str,
        /// 场名
        field: String,
        /// 初始残差
        initial: f64,
        /// 发散时的残差
        residual: f64,
        /// 已执行迭代数
        iterations: usize,
    },

    /// 分区间通信失败
    #[error("通信失败: {message}")]
    Communication {
        /// 原因
        message: String,
    },

    /// 不应出现的内部状态
    #[error("内部错误: {message}")]
    Internal {
        /// 说明
        message: String,
    },
}

// ========================================================================
// 构造
// ========================================================================

impl FvError {
    /// 参数不合法
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 数值超出区间
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 数组长度不一致
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 网格拓扑不合法
    pub fn invalid_mesh(message: impl Into<String>) -> Self {
        Self::InvalidMesh {
            message: message.into(),
        }
    }

    /// 耦合边界错误
    pub fn coupled_patch(patch: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CoupledPatch {
            patch: patch.into(),
            reason: reason.into(),
        }
    }

    /// 边界条件错误
    pub fn boundary_condition(
        field: impl Into<String>,
        patch: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::BoundaryCondition {
            field: field.into(),
            patch: patch.into(),
            reason: reason.into(),
        }
    }

    /// 量纲不匹配
    pub fn dimension_mismatch(
        operation: &'static str,
        field: impl Into<String>,
        lhs: DimensionSet,
        rhs: DimensionSet,
    ) -> Self {
        Self::DimensionMismatch {
            operation,
            field: field.into(),
            lhs,
            rhs,
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 缺少配置项
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig { key: key.into() }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 通信失败
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 配置类错误，运行应立即终止
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. }
                | Self::CoupledPatch { .. }
                | Self::BoundaryCondition { .. }
                | Self::Config { .. }
                | Self::MissingConfig { .. }
                | Self::InvalidConfig { .. }
        )
    }

    /// 长度检查
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> FvResult<()> {
        if expected != actual {
            return Err(Self::size_mismatch(name, expected, actual));
        }
        Ok(())
    }

    /// 闭区间检查，NaN 不通过
    #[inline]
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> FvResult<()> {
        if !(min..=max).contains(&value) {
            return Err(Self::out_of_range(field, value, min, max));
        }
        Ok(())
    }

    /// 索引检查
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> FvResult<()> {
        if index >= len {
            return Err(Self::index_out_of_bounds(index_type, index, len));
        }
        Ok(())
    }
}

// ========================================================================
// 宏
// ========================================================================

/// 条件不满足时返回错误
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

/// 取出 `Option` 中的值，`None` 时返回错误
#[macro_export]
macro_rules! require {
    ($opt:expr, $err:expr $(,)?) => {
        match $opt {
            Some(value) => value,
            None => return Err($err.into()),
        }
    };
}
