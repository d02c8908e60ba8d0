//! 单行翻译
//!
//! 一行被拆为 `(prefix, body, suffix)`：前缀是标题、列表、引用等块级语法，
//! 后缀是行尾空白，只有正文参与片段切分与翻译。

use crate::spans::{flatten, split_special_elements, Span};
use crate::translator::Translator;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

static LINE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:#+\s+|[-*+]\s+|[0-9]+\.\s+|>\s+)?").unwrap());

static IMAGE_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^!\[[^\]]*\]\([^)]*\)$").unwrap());

static BLOCK_TOKEN_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^__(?:CODE_BLOCK|HTML_TABLE)_\d+__$").unwrap());

/// 行的三段式拆分，`prefix + body + suffix` 等于原行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineParts<'a> {
    pub prefix: &'a str,
    pub body: &'a str,
    pub suffix: &'a str,
}

/// 拆出行首块级语法与行尾空白
///
/// 以数字加句点开头的普通句子（如 "1. "）也会被当作有序列表标记。
pub fn split_line(line: &str) -> LineParts<'_> {
    let prefix_len = LINE_PREFIX.find(line).map_or(0, |m| m.end());
    let (prefix, rest) = line.split_at(prefix_len);
    let body = rest.trim_end();
    let suffix = &rest[body.len()..];
    LineParts { prefix, body, suffix }
}

/// 不需要翻译、原样保留的行
///
/// 空白行、只包含一张图片的行，以及整行只是代码块/表格占位符的行。
pub fn is_special_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || IMAGE_ONLY.is_match(trimmed) || BLOCK_TOKEN_ONLY.is_match(trimmed)
}

/// 按顺序翻译片段并拼接
///
/// 纯空白片段不送去翻译。某个片段翻译失败时保留原文并继续处理后面的片段。
pub async fn translate_spans(
    spans: &[Span<'_>],
    translator: &dyn Translator,
    from_lang: &str,
    to_lang: &str,
) -> String {
    let mut out = String::new();

    for segment in flatten(spans) {
        if !segment.translatable || segment.text.trim().is_empty() {
            out.push_str(segment.text);
            continue;
        }
        match translator.translate(segment.text, from_lang, to_lang).await {
            Ok(translated) => out.push_str(&translated),
            Err(e) => {
                warn!("Keeping original text for span {:?}: {}", segment.text, e);
                out.push_str(segment.text);
            }
        }
    }

    out
}

/// 翻译一行，保持块级语法、行内代码、链接地址与占位符不变
///
/// 本函数不会失败：翻译出错的片段保留原文。
pub async fn translate_line(
    line: &str,
    translator: &dyn Translator,
    from_lang: &str,
    to_lang: &str,
) -> String {
    if is_special_line(line) {
        return line.to_string();
    }

    let parts = split_line(line);
    if parts.body.trim().is_empty() {
        return line.to_string();
    }

    let spans = split_special_elements(parts.body);
    let body = translate_spans(&spans, translator, from_lang, to_lang).await;
    format!("{}{}{}", parts.prefix, body, parts.suffix)
}
