//! 翻译能力模块
//!
//! 定义可注入的 [`Translator`] 接口，以及基于DeepLX API的实现 [`TranslationService`]，
//! 包括速率限制和指数退避重试。

use crate::error::{Result, TranslationError};
use crate::types::{DeepLXRequest, DeepLXResponse, RetryConfig, TranslationConfig};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;

/// 翻译能力
///
/// Markdown翻译器只通过这个接口访问翻译服务。实现应当对空字符串原样返回，
/// 失败时返回错误而不是静默返回错误的文本。
#[async_trait]
pub trait Translator: Send + Sync {
    /// 翻译单段文本
    async fn translate(&self, text: &str, from_lang: &str, to_lang: &str) -> Result<String>;

    /// 批量翻译，结果顺序与输入一致
    ///
    /// 默认实现逐条调用 [`Translator::translate`]，遇到第一个错误即返回。
    async fn batch_translate(
        &self,
        texts: &[String],
        from_lang: &str,
        to_lang: &str,
    ) -> Result<Vec<String>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.translate(text, from_lang, to_lang).await?);
        }
        Ok(results)
    }
}

/// 把同步闭包包装为 [`Translator`]
///
/// # 示例
///
/// ```rust
/// use markdown_prose_translator::FnTranslator;
///
/// let upper = FnTranslator::new(|text: &str, _from: &str, _to: &str| Ok(text.to_uppercase()));
/// ```
pub struct FnTranslator<F> {
    func: F,
}

impl<F> FnTranslator<F>
where
    F: Fn(&str, &str, &str) -> Result<String> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Translator for FnTranslator<F>
where
    F: Fn(&str, &str, &str) -> Result<String> + Send + Sync,
{
    async fn translate(&self, text: &str, from_lang: &str, to_lang: &str) -> Result<String> {
        (self.func)(text, from_lang, to_lang)
    }
}

/// 速率限制器
///
/// 用于控制API请求频率，防止超出服务提供商的速率限制。
/// 支持并发请求和自适应延迟。
#[derive(Clone)]
pub struct RateLimiter {
    /// 信号量，用于控制并发请求数量
    semaphore: Arc<Semaphore>,
    /// 请求间隔延迟
    delay: Duration,
}

impl RateLimiter {
    /// 创建新的速率限制器
    ///
    /// # 参数
    ///
    /// * `requests_per_second` - 每秒允许的最大请求数
    ///
    /// # 示例
    ///
    /// ```rust
    /// use markdown_prose_translator::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(1.0); // 每秒1个请求
    /// ```
    pub fn new(requests_per_second: f64) -> Self {
        let requests_per_second = if requests_per_second > 0.0 { requests_per_second } else { 1.0 };
        let permits = (requests_per_second * 2.0).ceil() as usize;
        let delay = Duration::from_millis((500.0 / requests_per_second) as u64);

        Self {
            semaphore: Arc::new(Semaphore::new(permits.max(1))),
            delay,
        }
    }

    /// 获取请求许可
    ///
    /// 在发起API请求前调用此方法，确保不超过配置的速率限制。
    pub async fn acquire(&self) -> Result<()> {
        let _permit = self.semaphore.acquire().await
            .map_err(|e| TranslationError::RateLimitError(format!("Rate limiter error: {}", e)))?;
        if self.delay > Duration::from_millis(100) {
            sleep(self.delay).await;
        }
        Ok(())
    }
}

/// 带指数退避的重试机制
///
/// 为API调用提供可靠的重试机制，在失败时按指数增长的延迟重试。
///
/// # 参数
///
/// * `operation` - 要执行的异步操作
/// * `config` - 重试配置
/// * `rate_limiter` - 速率限制器
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    config: &RetryConfig,
    rate_limiter: &RateLimiter,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delay = config.initial_delay_ms;

    for attempt in 0..=config.max_retries {
        rate_limiter.acquire().await?;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt == config.max_retries => return Err(e),
            Err(e) => {
                warn!("Attempt {} failed: {}. Retrying in {}ms...", attempt + 1, e, delay);
                sleep(Duration::from_millis(delay)).await;
                delay = std::cmp::min(
                    (delay as f64 * config.backoff_multiplier) as u64,
                    config.max_delay_ms,
                );
            }
        }
    }

    unreachable!()
}

const SENTENCE_ENDS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// 把超过 `max_len` 字节的文本切成若干段
///
/// 优先在句末标点之后断开，其次在空白之后，都找不到时按字符边界硬切。各段拼接后等于原文。
pub(crate) fn split_long_text(text: &str, max_len: usize) -> Vec<&str> {
    let max_len = max_len.max(1);
    let mut pieces = Vec::new();
    let mut start = 0;

    while text.len() - start > max_len {
        let mut end = start + max_len;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let window = &text[start..end];

        let cut = window
            .char_indices()
            .rev()
            .find(|(_, c)| SENTENCE_ENDS.contains(c))
            .or_else(|| window.char_indices().rev().find(|(_, c)| c.is_whitespace()))
            .map(|(i, c)| start + i + c.len_utf8())
            .unwrap_or(end);

        let cut = if cut > start {
            cut
        } else {
            start + text[start..].chars().next().map_or(1, char::len_utf8)
        };

        pieces.push(&text[start..cut]);
        start = cut;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// 解析DeepLX响应体
///
/// 优先按标准 `{code, data}` 格式解析；否则尝试常见的JSON字段名，最后把非JSON正文视为译文。
pub(crate) fn parse_response(response_text: &str) -> Result<String> {
    if let Ok(result) = serde_json::from_str::<DeepLXResponse>(response_text) {
        return if result.code == 200 {
            if result.data.is_empty() {
                Err(TranslationError::Custom("DeepLX返回了空的翻译结果".to_string()))
            } else {
                Ok(result.data)
            }
        } else {
            Err(TranslationError::ApiError {
                code: result.code,
                message: format!("DeepLX翻译失败，返回代码: {}", result.code),
            })
        };
    }

    if response_text.trim().is_empty() {
        return Err(TranslationError::Custom("API返回了空的翻译结果".to_string()));
    }

    if response_text.starts_with('{') {
        let json_value = serde_json::from_str::<serde_json::Value>(response_text)
            .map_err(|_| TranslationError::ParseError(format!("无法解析JSON响应: {}", response_text)))?;
        return json_value
            .get("translated_text")
            .or_else(|| json_value.get("result"))
            .or_else(|| json_value.get("translation"))
            .or_else(|| json_value.get("data"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                TranslationError::ParseError(format!("无法从JSON响应中提取翻译结果: {}", response_text))
            });
    }

    debug!("假设响应是纯文本翻译结果");
    Ok(response_text.to_string())
}

/// DeepLX翻译服务
///
/// 实现 [`Translator`]，内置速率限制与重试。Markdown结构由 [`crate::MarkdownTranslator`]
/// 处理，这里只负责单段文本的网络翻译。
///
/// # 示例
///
/// ```rust,no_run
/// use markdown_prose_translator::{TranslationService, TranslationConfig, Translator};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = TranslationConfig { enabled: true, ..TranslationConfig::default() };
///     let service = TranslationService::new(config);
///
///     let result = service.translate("Hello, world!", "en", "zh").await?;
///     println!("Translation: {}", result);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TranslationService {
    /// HTTP客户端，用于API调用
    client: Client,
    /// 速率限制器
    rate_limiter: RateLimiter,
    /// 翻译配置
    config: TranslationConfig,
}

impl TranslationService {
    /// 创建新的翻译服务实例
    pub fn new(config: TranslationConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent("Mozilla/5.0 (compatible; MarkdownProseTranslator/1.0)")
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to create optimized client: {}, using default", e);
                Client::new()
            });

        Self {
            client,
            rate_limiter: RateLimiter::new(config.max_requests_per_second),
            config,
        }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    async fn translate_piece(&self, piece: &str, from_lang: &str, to_lang: &str) -> Result<String> {
        let core = piece.trim();
        if core.is_empty() {
            return Ok(piece.to_string());
        }
        let leading = &piece[..piece.len() - piece.trim_start().len()];
        let trailing = &piece[piece.trim_end().len()..];

        let retry_config = RetryConfig::default();
        let translated = retry_with_backoff(
            || self.request_once(core, from_lang, to_lang),
            &retry_config,
            &self.rate_limiter,
        )
        .await?;
        Ok(format!("{}{}{}", leading, translated, trailing))
    }

    async fn request_once(&self, text: &str, from_lang: &str, to_lang: &str) -> Result<String> {
        let request = DeepLXRequest {
            text: text.to_string(),
            source_lang: from_lang.to_string(),
            target_lang: to_lang.to_string(),
        };

        let builder = self
            .client
            .post(&self.config.deeplx_api_url)
            .header("Content-Type", "application/json");

        let builder = if self.config.deeplx_api_url.contains("dptrans") {
            debug!("使用dptrans API格式请求");
            builder
                .header("Accept", "application/json, text/plain, */*")
                .header("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        } else {
            builder.header("Accept", "application/json")
        };

        let response = builder.json(&request).send().await?;

        let status = response.status();
        debug!("DeepLX响应状态: {}", status);

        if status.is_success() {
            let response_text = response.text().await?;
            parse_response(&response_text)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            Err(TranslationError::ApiError {
                code: status.as_u16() as i32,
                message: format!("DeepLX API请求失败: {} - {}", status, error_text),
            })
        }
    }
}

#[async_trait]
impl Translator for TranslationService {
    async fn translate(&self, text: &str, from_lang: &str, to_lang: &str) -> Result<String> {
        if !self.config.enabled || text.trim().is_empty() {
            return Ok(text.to_string());
        }

        debug!("发送翻译请求到: {} ({} 字符)", self.config.deeplx_api_url, text.len());

        if text.len() <= self.config.max_text_length {
            return self.translate_piece(text, from_lang, to_lang).await;
        }

        let pieces = split_long_text(text, self.config.max_text_length);
        debug!("文本较长，分为 {} 段进行翻译", pieces.len());

        let mut translated = String::with_capacity(text.len());
        for piece in pieces {
            translated.push_str(&self.translate_piece(piece, from_lang, to_lang).await?);
        }
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_response_is_accepted() {
        assert_eq!(parse_response(r#"{"code":200,"data":"你好"}"#).unwrap(), "你好");
    }

    #[test]
    fn non_200_code_is_api_error() {
        let err = parse_response(r#"{"code":429,"data":""}"#).unwrap_err();
        assert!(matches!(err, TranslationError::ApiError { code: 429, .. }));
    }

    #[test]
    fn loose_json_fields_are_recognised() {
        assert_eq!(parse_response(r#"{"translated_text":"Hallo"}"#).unwrap(), "Hallo");
        assert_eq!(parse_response(r#"{"result":"Salut"}"#).unwrap(), "Salut");
        assert!(matches!(
            parse_response(r#"{"other":1}"#).unwrap_err(),
            TranslationError::ParseError(_)
        ));
    }

    #[test]
    fn plain_text_body_is_the_translation() {
        assert_eq!(parse_response("Bonjour").unwrap(), "Bonjour");
        assert!(parse_response("   ").is_err());
    }

    #[test]
    fn long_text_splits_after_sentences() {
        assert_eq!(split_long_text("One. Two. Three.", 10), vec!["One. Two.", " Three."]);
        assert_eq!(split_long_text("你好。世界。", 10), vec!["你好。", "世界。"]);
        assert_eq!(split_long_text("short", 10), vec!["short"]);
    }

    #[test]
    fn long_text_falls_back_to_whitespace_then_hard_cut() {
        assert_eq!(split_long_text("alpha beta gamma", 8), vec!["alpha ", "beta ", "gamma"]);
        assert_eq!(split_long_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        let text = "é".repeat(5);
        assert_eq!(split_long_text(&text, 1).concat(), text);
    }

    #[tokio::test]
    async fn disabled_service_passes_text_through() {
        let service = TranslationService::new(TranslationConfig::default());
        assert_eq!(service.translate("Hello", "en", "zh").await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn blank_text_never_hits_the_network() {
        let config = TranslationConfig {
            enabled: true,
            deeplx_api_url: "http://127.0.0.1:9/translate".to_string(),
            ..TranslationConfig::default()
        };
        let service = TranslationService::new(config);
        assert_eq!(service.translate("  ", "en", "zh").await.unwrap(), "  ");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let config = TranslationConfig {
            enabled: true,
            deeplx_api_url: "http://127.0.0.1:9/translate".to_string(),
            max_requests_per_second: 100.0,
            ..TranslationConfig::default()
        };
        let service = TranslationService::new(config);
        let err = service.translate("Hello", "en", "zh").await.unwrap_err();
        assert!(matches!(err, TranslationError::Http(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_retries() {
        let limiter = RateLimiter::new(100.0);
        let config = RetryConfig { max_retries: 2, initial_delay_ms: 1, max_delay_ms: 2, backoff_multiplier: 1.0 };
        let mut calls = 0;
        let result: Result<()> = retry_with_backoff(
            || {
                calls += 1;
                async { Err(TranslationError::Custom("down".to_string())) }
            },
            &config,
            &limiter,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn batch_translate_keeps_order() {
        let upper = FnTranslator::new(|text: &str, _: &str, _: &str| Ok(text.to_uppercase()));
        let texts = vec!["a".to_string(), "b".to_string()];
        assert_eq!(upper.batch_translate(&texts, "en", "fr").await.unwrap(), vec!["A", "B"]);
    }
}
