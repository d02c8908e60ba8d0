//! 错误处理模块
//!
//! 定义翻译库中使用的错误类型和错误处理机制。
//!
//! 单个文本片段的翻译失败不会以错误形式返回给调用者：片段保留原文并记录警告。
//! 只有占位符恢复失败（结构性错误）和I/O、配置错误会终止整个文档的翻译。

use thiserror::Error;

/// 翻译错误类型
///
/// 包含翻译过程中可能出现的各种错误情况。
///
/// # 变体说明
///
/// * `Http` - HTTP请求错误
/// * `Custom` - 自定义错误消息
/// * `RateLimitError` - 速率限制错误
/// * `ApiError` - API响应错误，包含错误代码和消息
/// * `ParseError` - 解析错误
/// * `Io` - 文件读写错误
/// * `Config` - 配置文件错误
/// * `StructuralInvariant` - 占位符丢失或重复，文档结构无法安全恢复
/// * `Task` - 并发翻译任务异常退出
/// * `InvalidPattern` - 片段匹配器的正则无效或能匹配空字符串
#[derive(Debug, Error)]
pub enum TranslationError {
    /// HTTP请求错误
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// 自定义错误消息
    #[error("{0}")]
    Custom(String),
    /// 速率限制错误
    #[error("Rate limit error: {0}")]
    RateLimitError(String),
    /// API响应错误
    #[error("API error {code}: {message}")]
    ApiError {
        /// 错误代码
        code: i32,
        /// 错误消息
        message: String
    },
    /// 解析错误
    #[error("Parse error: {0}")]
    ParseError(String),
    /// 文件读写错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// 配置文件错误
    #[error("Config error: {0}")]
    Config(String),
    /// 占位符在恢复时出现次数不为1
    #[error("Placeholder {placeholder} found {occurrences} times during restore, expected exactly once")]
    StructuralInvariant {
        /// 出问题的占位符
        placeholder: String,
        /// 实际出现次数
        occurrences: usize,
    },
    /// 翻译任务异常
    #[error("Task error: {0}")]
    Task(String),
    /// 片段匹配器模式无效
    #[error("Invalid span pattern: {0}")]
    InvalidPattern(String),
}

impl From<String> for TranslationError {
    fn from(error: String) -> Self {
        TranslationError::Custom(error)
    }
}

impl From<&str> for TranslationError {
    fn from(error: &str) -> Self {
        TranslationError::Custom(error.to_string())
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::Config(error.to_string())
    }
}

impl From<toml::ser::Error> for TranslationError {
    fn from(error: toml::ser::Error) -> Self {
        TranslationError::Config(error.to_string())
    }
}

/// 翻译结果类型别名
///
/// 简化返回类型，使用 `TranslationError` 作为错误类型。
///
/// # 示例
///
/// ```rust
/// use markdown_prose_translator::{Result, TranslationError};
///
/// fn example_function() -> Result<String> {
///     Ok("Success".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_conversions_become_custom() {
        let err: TranslationError = "boom".into();
        assert!(matches!(err, TranslationError::Custom(ref m) if m == "boom"));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn structural_error_names_the_placeholder() {
        let err = TranslationError::StructuralInvariant {
            placeholder: "__CODE_BLOCK_0__".to_string(),
            occurrences: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("__CODE_BLOCK_0__"));
        assert!(msg.contains("2 times"));
    }
}
