//! 行内片段分类
//!
//! 把一行正文切分为可翻译与不可翻译的片段。分类器是一组有序的独立匹配器：
//! 每个扫描位置取起点最靠左的匹配，起点相同时排在前面的匹配器优先。
//! 新增片段类型（例如脚注）只需追加一个 [`SpanMatcher`]。
//!
//! 链接文字、alt文本和强调内容会用同一个分类器再切分一次，
//! 嵌在其中的行内代码和占位符仍然不可翻译。

use crate::error::{Result, TranslationError};
use once_cell::sync::Lazy;
use regex::{Match, Regex};

/// 正文中的一个连续片段
///
/// 所有片段按顺序拼接后与原正文完全一致。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span<'a> {
    /// 普通文本，整体翻译
    Text(&'a str),
    /// 行内代码、占位符等，原样保留
    Opaque(&'a str),
    /// 链接、图片、强调等：`open` 与 `close` 原样保留，`inner` 是再次切分的内部片段
    Wrapped {
        open: &'a str,
        inner: Vec<Span<'a>>,
        close: &'a str,
    },
}

/// 展开后的叶子片段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub translatable: bool,
}

impl<'a> Span<'a> {
    /// 按顺序追加叶子片段，包裹符号作为不可翻译片段
    pub fn flatten_into(&self, out: &mut Vec<Segment<'a>>) {
        match self {
            Span::Text(text) => out.push(Segment { text: *text, translatable: true }),
            Span::Opaque(text) => out.push(Segment { text: *text, translatable: false }),
            Span::Wrapped { open, inner, close } => {
                out.push(Segment { text: *open, translatable: false });
                for span in inner {
                    span.flatten_into(out);
                }
                out.push(Segment { text: *close, translatable: false });
            }
        }
    }

    /// 原文
    pub fn source(&self) -> String {
        let mut segments = Vec::new();
        self.flatten_into(&mut segments);
        segments.iter().map(|s| s.text).collect()
    }
}

/// 展开一组片段
pub fn flatten<'a>(spans: &[Span<'a>]) -> Vec<Segment<'a>> {
    let mut out = Vec::new();
    for span in spans {
        span.flatten_into(&mut out);
    }
    out
}

/// 匹配器对匹配文本的解释
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanShape<'a> {
    /// 整个匹配原样保留
    Opaque,
    /// `open + inner + close` 等于匹配文本，`inner` 会再次切分
    Wrapped {
        open: &'a str,
        inner: &'a str,
        close: &'a str,
    },
}

/// 单个片段匹配器
pub struct SpanMatcher {
    name: &'static str,
    pattern: Regex,
    build: fn(&str) -> SpanShape<'_>,
}

impl SpanMatcher {
    /// `build` 接收完整的匹配文本，返回其结构
    ///
    /// 能匹配空字符串的模式会被拒绝。
    pub fn new(name: &'static str, pattern: &str, build: fn(&str) -> SpanShape<'_>) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| TranslationError::InvalidPattern(format!("{}: {}", name, e)))?;
        if pattern.is_match("") {
            return Err(TranslationError::InvalidPattern(format!(
                "{}: pattern matches the empty string",
                name
            )));
        }
        Ok(Self { name, pattern, build })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 从 `at` 起第一个非空匹配
    fn find_from<'h>(&self, haystack: &'h str, mut at: usize) -> Option<Match<'h>> {
        loop {
            let m = self.pattern.find_at(haystack, at)?;
            if !m.as_str().is_empty() {
                return Some(m);
            }
            at = m.end() + haystack[m.end()..].chars().next()?.len_utf8();
        }
    }
}

fn opaque(_matched: &str) -> SpanShape<'_> {
    SpanShape::Opaque
}

/// `[text](url)`：只翻译显示文本
fn link(matched: &str) -> SpanShape<'_> {
    match matched.find("](") {
        Some(split) => SpanShape::Wrapped {
            open: &matched[..1],
            inner: &matched[1..split],
            close: &matched[split..],
        },
        None => SpanShape::Opaque,
    }
}

/// `![alt](url)`：只翻译alt文本，alt为空时整体保留
fn image(matched: &str) -> SpanShape<'_> {
    match matched.find("](") {
        Some(split) if !matched[2..split].trim().is_empty() => SpanShape::Wrapped {
            open: &matched[..2],
            inner: &matched[2..split],
            close: &matched[split..],
        },
        _ => SpanShape::Opaque,
    }
}

fn delimited(matched: &str, width: usize) -> SpanShape<'_> {
    let end = matched.len() - width;
    SpanShape::Wrapped {
        open: &matched[..width],
        inner: &matched[width..end],
        close: &matched[end..],
    }
}

fn bold(matched: &str) -> SpanShape<'_> {
    delimited(matched, 2)
}

fn italic(matched: &str) -> SpanShape<'_> {
    delimited(matched, 1)
}

fn strikethrough(matched: &str) -> SpanShape<'_> {
    delimited(matched, 2)
}

/// 有序匹配器集合
pub struct SpanClassifier {
    matchers: Vec<SpanMatcher>,
}

impl SpanClassifier {
    /// 标准Markdown片段：行内代码、链接、图片、粗体、斜体、删除线、屏蔽占位符
    pub fn standard() -> Self {
        let table: [(&'static str, &str, fn(&str) -> SpanShape<'_>); 7] = [
            ("inline_code", r"`[^`]+`", opaque),
            ("link", r"\[[^\]]+\]\([^)]+\)", link),
            ("image", r"!\[[^\]]*\]\([^)]+\)", image),
            ("bold", r"\*\*[^*]+\*\*", bold),
            ("italic", r"\*[^*]+\*", italic),
            ("strikethrough", r"~~[^~]+~~", strikethrough),
            (
                "shield_token",
                r"__(?:MATH_BLOCK|MATH_INLINE|CODE_BLOCK|HTML_TABLE)_\d+__",
                opaque,
            ),
        ];

        let matchers = table
            .into_iter()
            .map(|(name, pattern, build)| {
                SpanMatcher::new(name, pattern, build).expect("built-in span pattern is valid")
            })
            .collect();

        Self { matchers }
    }

    /// 追加匹配器，优先级低于已有的全部匹配器
    pub fn push(&mut self, matcher: SpanMatcher) {
        self.matchers.push(matcher);
    }

    /// 切分正文
    pub fn split<'a>(&self, body: &'a str) -> Vec<Span<'a>> {
        let mut spans = Vec::new();
        let mut pos = 0;

        while pos < body.len() {
            let next = self
                .matchers
                .iter()
                .filter_map(|matcher| matcher.find_from(body, pos).map(|m| (m, matcher)))
                .min_by_key(|(m, _)| m.start());

            match next {
                Some((m, matcher)) => {
                    if m.start() > pos {
                        spans.push(Span::Text(&body[pos..m.start()]));
                    }
                    spans.push(self.build(m.as_str(), matcher));
                    pos = m.end();
                }
                None => {
                    spans.push(Span::Text(&body[pos..]));
                    break;
                }
            }
        }

        spans
    }

    fn build<'a>(&self, matched: &'a str, matcher: &SpanMatcher) -> Span<'a> {
        match (matcher.build)(matched) {
            SpanShape::Opaque => Span::Opaque(matched),
            // 内部与整个匹配等长时不再递归
            SpanShape::Wrapped { open, inner, close } if inner.len() < matched.len() => Span::Wrapped {
                open,
                inner: self.split(inner),
                close,
            },
            SpanShape::Wrapped { open, inner, close } => Span::Wrapped {
                open,
                inner: vec![Span::Text(inner)],
                close,
            },
        }
    }
}

impl Default for SpanClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

static STANDARD: Lazy<SpanClassifier> = Lazy::new(SpanClassifier::standard);

/// 使用标准分类器切分正文
pub fn split_special_elements(body: &str) -> Vec<Span<'_>> {
    STANDARD.split(body)
}
