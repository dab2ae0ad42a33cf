// crates/fv_config/src/error.rs

//! 配置层错误类型

use fv_foundation::FvError;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 缺失配置
    #[error("缺失配置: {0}")]
    Missing(String),

    /// 名称无法识别
    #[error("未知的{kind}: '{name}', 可选: {valid}")]
    UnknownName {
        /// 名称类别（求解器、预条件子、格式……）
        kind: &'static str,
        /// 输入的名称
        name: String,
        /// 可用名称列表
        valid: String,
    },
}

impl ConfigError {
    /// 构造无效值错误
    pub fn invalid(key: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for FvError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => FvError::from(e),
            ConfigError::Parse(message) => FvError::config(format!("解析失败: {}", message)),
            ConfigError::InvalidValue { key, value, reason } => {
                FvError::invalid_config(key, value, reason)
            }
            ConfigError::Missing(key) => FvError::missing_config(key),
            e @ ConfigError::UnknownName { .. } => FvError::config(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("relaxation_factors.fields.p", -1.0, "必须在 (0, 1] 内");
        assert!(err.to_string().contains("relaxation_factors.fields.p"));
    }

    #[test]
    fn test_into_fv_error() {
        let err: FvError = ConfigError::Missing("solvers.p".into()).into();
        assert!(matches!(err, FvError::MissingConfig { .. }));
        assert!(err.is_configuration_error());
    }
}
