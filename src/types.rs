//! 类型定义模块
//!
//! 定义翻译库中使用的配置类型和DeepLX请求/响应结构。

use serde::{Deserialize, Serialize};

/// 翻译配置
///
/// 包含翻译服务的所有配置选项，如API地址、语言设置、性能参数等。
///
/// # 字段说明
///
/// * `enabled` - 是否启用翻译功能
/// * `source_lang` - 源语言代码，"auto"表示自动检测
/// * `target_lang` - 目标语言代码
/// * `deeplx_api_url` - DeepLX API地址
/// * `max_requests_per_second` - 每秒最大请求数
/// * `max_text_length` - 单次请求的最大文本长度，超出时按句子切分
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// 是否启用翻译功能
    pub enabled: bool,
    /// 源语言代码，"auto"表示自动检测
    pub source_lang: String,
    /// 目标语言代码
    pub target_lang: String,
    /// DeepLX API地址
    pub deeplx_api_url: String,
    /// 每秒最大请求数
    pub max_requests_per_second: f64,
    /// 单次请求的最大文本长度（字节）
    pub max_text_length: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source_lang: "auto".to_string(),
            target_lang: "zh".to_string(),
            deeplx_api_url: "http://localhost:1188/translate".to_string(),
            max_requests_per_second: 0.5,
            max_text_length: 3000,
        }
    }
}

/// Markdown处理选项
///
/// 控制屏蔽与恢复阶段的行为以及行级并发度。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    /// 恢复公式时是否包裹 `math-block` / `math-inline` 渲染标记
    pub render_math_hints: bool,
    /// 是否屏蔽HTML表格
    pub shield_html_tables: bool,
    /// 同时翻译的最大行数
    pub max_concurrent_lines: usize,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            render_math_hints: true,
            shield_html_tables: true,
            max_concurrent_lines: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            backoff_multiplier: 1.2,
        }
    }
}

/// 标准DeepLX与dptrans接口共用的请求体
#[derive(Debug, Serialize, Deserialize)]
pub struct DeepLXRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

#[derive(Debug, Deserialize)]
pub struct DeepLXResponse {
    pub code: i32,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_markdown_section_uses_defaults() {
        let options: MarkdownOptions = toml::from_str("render_math_hints = false").unwrap();
        assert!(!options.render_math_hints);
        assert!(options.shield_html_tables);
        assert_eq!(options.max_concurrent_lines, 4);
    }

    #[test]
    fn deeplx_response_parses() {
        let resp: DeepLXResponse = serde_json::from_str(r#"{"code":200,"data":"你好"}"#).unwrap();
        assert_eq!(resp.code, 200);
        assert_eq!(resp.data, "你好");
    }
}
