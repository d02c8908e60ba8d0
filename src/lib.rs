//! # Markdown Prose Translator
//!
//! 翻译Markdown文档中的自然语言文本，同时保持代码、数学公式、链接、图片和格式语法原样不动。
//!
//! ## 主要特性
//!
//! - **结构屏蔽**: 代码块、HTML表格和LaTeX公式在翻译前替换为占位符，翻译后一次性恢复
//! - **行内切分**: 行内代码、链接地址、图片地址保持不变，只翻译链接文字、alt文本和强调内容
//! - **失败隔离**: 单个片段翻译失败时保留原文，文档翻译继续进行
//! - **并行翻译**: 多行并发翻译，结果按原顺序重组
//! - **渲染标记**: 公式恢复时包裹 `math-block` / `math-inline`，供下游HTML/PDF渲染器识别
//! - **配置灵活**: 支持TOML配置文件和程序化配置
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use markdown_prose_translator::{MarkdownTranslator, TranslationLibConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TranslationLibConfig::load_from_default_locations();
//!     let translator = MarkdownTranslator::from_config(&config);
//!
//!     let markdown = "# Hello\n\nSee [the docs](https://example.com) for $x^2$.\n";
//!     let translated = translator.translate_document(markdown).await?;
//!     println!("{}", translated);
//!
//!     Ok(())
//! }
//! ```
//!
//! 任何实现了 [`Translator`] 的类型都可以替换DeepLX服务，测试中常用 [`FnTranslator`]。

pub mod config;
pub mod document;
pub mod error;
pub mod line;
pub mod shield;
pub mod spans;
pub mod translator;
pub mod types;

pub use config::TranslationLibConfig;
pub use document::{default_output_path, translate_document, MarkdownTranslator};
pub use error::{Result, TranslationError};
pub use line::{is_special_line, split_line, translate_line, translate_spans, LineParts};
pub use shield::{
    restore_code, restore_formulas, shield_code, shield_formulas, shield_html_tables, MathRendering,
    ShieldEntry, ShieldKind, ShieldTable,
};
pub use spans::{flatten, split_special_elements, Segment, Span, SpanClassifier, SpanMatcher, SpanShape};
pub use translator::{retry_with_backoff, FnTranslator, RateLimiter, TranslationService, Translator};
pub use types::{DeepLXRequest, DeepLXResponse, MarkdownOptions, RetryConfig, TranslationConfig};
