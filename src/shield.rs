//! 屏蔽与恢复模块
//!
//! 在翻译之前把代码块、HTML表格和LaTeX公式替换为不透明的占位符，
//! 翻译之后再一次性恢复。每次文档翻译拥有自己的 [`ShieldTable`]，
//! 计数器从0开始，不存在进程级共享状态。
//!
//! 占位符格式：
//!
//! - `__MATH_BLOCK_<n>__` / `__MATH_INLINE_<n>__`（同一张公式表，共用计数器）
//! - `__CODE_BLOCK_<n>__`
//! - `__HTML_TABLE_<n>__`

use crate::error::{Result, TranslationError};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static BLOCK_FORMULA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$([^$]+?)\$\$").unwrap());

static INLINE_FORMULA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([^$]+?)\$").unwrap());

static HTML_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(?:<html>\s*<body>\s*)?<table\b.*?</table>(?:\s*</body>\s*</html>)?").unwrap()
});

/// 匹配任意一种占位符，用于单次扫描恢复
static SHIELD_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"__(?:MATH_BLOCK|MATH_INLINE|CODE_BLOCK|HTML_TABLE)_\d+__").unwrap()
});

const FENCE: &str = "```";

/// 被屏蔽内容的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldKind {
    MathBlock,
    MathInline,
    CodeBlock,
    HtmlTable,
}

impl ShieldKind {
    fn tag(self) -> &'static str {
        match self {
            ShieldKind::MathBlock => "MATH_BLOCK",
            ShieldKind::MathInline => "MATH_INLINE",
            ShieldKind::CodeBlock => "CODE_BLOCK",
            ShieldKind::HtmlTable => "HTML_TABLE",
        }
    }
}

/// 公式恢复方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathRendering {
    /// 包裹 `<div class="math-block">` / `<span class="math-inline">`，供下游渲染器识别
    Hinted,
    /// 原样恢复 `$$...$$` / `$...$`
    Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldEntry {
    pub token: String,
    pub original: String,
    pub kind: ShieldKind,
}

impl ShieldEntry {
    fn render(&self, rendering: MathRendering) -> String {
        match (self.kind, rendering) {
            (ShieldKind::MathBlock, MathRendering::Hinted) => {
                format!(r#"<div class="math-block">{}</div>"#, self.original)
            }
            (ShieldKind::MathInline, MathRendering::Hinted) => {
                format!(r#"<span class="math-inline">{}</span>"#, self.original)
            }
            _ => self.original.clone(),
        }
    }
}

/// 占位符表
///
/// 记录占位符到原始文本的映射，插入顺序即计数顺序。
#[derive(Debug, Default, Clone)]
pub struct ShieldTable {
    entries: Vec<ShieldEntry>,
    index: HashMap<String, usize>,
    next_id: usize,
}

impl ShieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一段原文，返回新的占位符
    pub fn insert(&mut self, kind: ShieldKind, original: String) -> String {
        let token = format!("__{}_{}__", kind.tag(), self.next_id);
        self.next_id += 1;
        self.index.insert(token.clone(), self.entries.len());
        self.entries.push(ShieldEntry {
            token: token.clone(),
            original,
            kind,
        });
        token
    }

    pub fn get(&self, token: &str) -> Option<&ShieldEntry> {
        self.index.get(token).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[ShieldEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 单次扫描恢复所有占位符
    ///
    /// 替换进去的内容不会被再次扫描，因此代码块里出现形如占位符的文本也不会被递归展开。
    /// 不属于本表的占位符保持不变。表中每个占位符必须恰好出现一次，否则返回
    /// [`TranslationError::StructuralInvariant`]。
    pub fn restore(&self, text: &str, rendering: MathRendering) -> Result<String> {
        if self.entries.is_empty() {
            return Ok(text.to_string());
        }

        let mut seen = vec![0usize; self.entries.len()];
        let restored = SHIELD_TOKEN.replace_all(text, |caps: &Captures| {
            let token = &caps[0];
            match self.index.get(token) {
                Some(&i) => {
                    seen[i] += 1;
                    self.entries[i].render(rendering)
                }
                None => token.to_string(),
            }
        });

        if let Some((i, &occurrences)) = seen.iter().enumerate().find(|(_, n)| **n != 1) {
            return Err(TranslationError::StructuralInvariant {
                placeholder: self.entries[i].token.clone(),
                occurrences,
            });
        }

        Ok(restored.into_owned())
    }
}

/// 屏蔽数学公式
///
/// 先在全文中匹配 `$$...$$` 块级公式，再在剩余文本中匹配 `$...$` 行内公式，
/// 这样块级分隔符不会被误读为两个行内分隔符。
///
/// 不成对的 `$`（例如金额）如果恰好组成一对，也会被当作公式，这是已知的误判。
pub fn shield_formulas(text: &str) -> (String, ShieldTable) {
    let mut table = ShieldTable::new();

    let shielded = BLOCK_FORMULA
        .replace_all(text, |caps: &Captures| {
            table.insert(ShieldKind::MathBlock, format!("$${}$$", &caps[1]))
        })
        .into_owned();

    let shielded = INLINE_FORMULA
        .replace_all(&shielded, |caps: &Captures| {
            table.insert(ShieldKind::MathInline, format!("${}$", &caps[1]))
        })
        .into_owned();

    (shielded, table)
}

/// 恢复公式并包裹渲染标记
pub fn restore_formulas(text: &str, table: &ShieldTable) -> Result<String> {
    table.restore(text, MathRendering::Hinted)
}

/// 围栏扫描状态
///
/// `Inside` 持有正在累积的代码块行（包括开头的围栏行）。
enum FenceState<'a> {
    Outside,
    Inside(Vec<&'a str>),
}

fn is_fence(line: &str) -> bool {
    line.trim().starts_with(FENCE)
}

/// 屏蔽围栏代码块
///
/// 逐行扫描，去除首尾空白后以三个反引号开头的行切换状态。整个代码块（含两条围栏行）
/// 被替换为独占一行的占位符。文档结束时仍未闭合的代码块视为延伸到文末，同样被屏蔽。
pub fn shield_code(text: &str) -> (String, ShieldTable) {
    let mut table = ShieldTable::new();
    let mut output: Vec<String> = Vec::new();
    let mut state = FenceState::Outside;

    for line in text.split('\n') {
        state = match state {
            FenceState::Outside if is_fence(line) => FenceState::Inside(vec![line]),
            FenceState::Outside => {
                output.push(line.to_string());
                FenceState::Outside
            }
            FenceState::Inside(mut block) => {
                block.push(line);
                if is_fence(line) {
                    output.push(table.insert(ShieldKind::CodeBlock, block.join("\n")));
                    FenceState::Outside
                } else {
                    FenceState::Inside(block)
                }
            }
        };
    }

    if let FenceState::Inside(block) = state {
        log::debug!("Unterminated code fence, shielding {} trailing lines", block.len());
        output.push(table.insert(ShieldKind::CodeBlock, block.join("\n")));
    }

    (output.join("\n"), table)
}

/// 原样恢复代码块
pub fn restore_code(text: &str, table: &ShieldTable) -> Result<String> {
    table.restore(text, MathRendering::Verbatim)
}

/// 屏蔽HTML表格
///
/// PDF抽取工具常把表格输出为 `<html><body><table>...</table></body></html>`，
/// 表格内容不参与逐行翻译。
pub fn shield_html_tables(text: &str) -> (String, ShieldTable) {
    let mut table = ShieldTable::new();
    let shielded = HTML_TABLE
        .replace_all(text, |caps: &Captures| {
            table.insert(ShieldKind::HtmlTable, caps[0].to_string())
        })
        .into_owned();
    (shielded, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_formula_is_not_split_into_inline() {
        let (text, table) = shield_formulas("a $$x+y$$ b $z$ c");
        assert_eq!(text, "a __MATH_BLOCK_0__ b __MATH_INLINE_1__ c");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("__MATH_BLOCK_0__").unwrap().original, "$$x+y$$");
        assert_eq!(table.get("__MATH_INLINE_1__").unwrap().original, "$z$");
    }

    #[test]
    fn formulas_restore_with_render_hints() {
        let (text, table) = shield_formulas("$$E=mc^2$$ and $a$");
        let restored = restore_formulas(&text, &table).unwrap();
        assert_eq!(
            restored,
            r#"<div class="math-block">$$E=mc^2$$</div> and <span class="math-inline">$a$</span>"#
        );
    }

    #[test]
    fn formulas_round_trip_verbatim() {
        let doc = "Cost is $5 and $10 here.\n$$\\sum_i x_i$$\nlone $ sign";
        let (text, table) = shield_formulas(doc);
        assert_eq!(table.restore(&text, MathRendering::Verbatim).unwrap(), doc);
    }

    #[test]
    fn currency_pair_is_a_known_false_positive() {
        let (text, table) = shield_formulas("between $5 and $10");
        assert_eq!(text, "between __MATH_INLINE_0__10");
        assert_eq!(table.entries()[0].original, "$5 and $");
    }

    #[test]
    fn code_block_becomes_single_line() {
        let doc = "intro\n```rust\nlet x = 1;\n```\noutro";
        let (text, table) = shield_code(doc);
        assert_eq!(text, "intro\n__CODE_BLOCK_0__\noutro");
        assert_eq!(table.entries()[0].original, "```rust\nlet x = 1;\n```");
        assert_eq!(restore_code(&text, &table).unwrap(), doc);
    }

    #[test]
    fn indented_fence_is_recognised() {
        let doc = "- item\n    ```\n    code\n    ```\n";
        let (text, table) = shield_code(doc);
        assert_eq!(text, "- item\n__CODE_BLOCK_0__\n");
        assert_eq!(restore_code(&text, &table).unwrap(), doc);
    }

    #[test]
    fn unterminated_fence_runs_to_end_of_document() {
        let doc = "text\n```python\nprint(1)\nmore";
        let (text, table) = shield_code(doc);
        assert_eq!(text, "text\n__CODE_BLOCK_0__");
        assert_eq!(table.entries()[0].original, "```python\nprint(1)\nmore");
        assert_eq!(restore_code(&text, &table).unwrap(), doc);
    }

    #[test]
    fn restore_is_not_reentrant() {
        let doc = "```\nliteral __CODE_BLOCK_1__ inside\n```\n```\nsecond\n```";
        let (text, table) = shield_code(doc);
        assert_eq!(text, "__CODE_BLOCK_0__\n__CODE_BLOCK_1__");
        assert_eq!(restore_code(&text, &table).unwrap(), doc);
    }

    #[test]
    fn lost_placeholder_is_structural_error() {
        let (_, table) = shield_code("```\nx\n```");
        let err = restore_code("nothing here", &table).unwrap_err();
        assert!(matches!(
            err,
            TranslationError::StructuralInvariant { occurrences: 0, .. }
        ));
    }

    #[test]
    fn colliding_input_is_structural_error() {
        let (text, table) = shield_code("__CODE_BLOCK_0__\n```\nx\n```");
        let err = restore_code(&text, &table).unwrap_err();
        assert!(matches!(
            err,
            TranslationError::StructuralInvariant { occurrences: 2, .. }
        ));
    }

    #[test]
    fn foreign_tokens_are_left_alone() {
        let (text, table) = shield_formulas("$x$ __CODE_BLOCK_3__");
        assert_eq!(
            table.restore(&text, MathRendering::Verbatim).unwrap(),
            "$x$ __CODE_BLOCK_3__"
        );
    }

    #[test]
    fn html_table_is_shielded_whole() {
        let doc = "before\n<html><body><table><tr><td>Cell</td></tr>\n</table></body></html>\nafter";
        let (text, table) = shield_html_tables(doc);
        assert_eq!(text, "before\n__HTML_TABLE_0__\nafter");
        assert_eq!(restore_code(&text, &table).unwrap(), doc);
    }
}
