//! 文档翻译编排
//!
//! 流水线严格按以下顺序执行：
//!
//! 1. 屏蔽代码块（先于公式，代码中的 `$` 不会被误认为公式）
//! 2. 屏蔽HTML表格（可选）
//! 3. 屏蔽公式
//! 4. 逐行翻译，按行号放回原位置
//! 5. 按相反顺序恢复：公式、表格、代码块

use crate::config::TranslationLibConfig;
use crate::error::{Result, TranslationError};
use crate::line::{is_special_line, translate_line};
use crate::shield::{restore_code, shield_code, shield_formulas, shield_html_tables, MathRendering, ShieldTable};
use crate::translator::{TranslationService, Translator};
use crate::types::MarkdownOptions;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Markdown文档翻译器
///
/// 只翻译自然语言文本，代码、公式、链接地址、图片和格式语法保持原位。
///
/// # 示例
///
/// ```rust
/// use std::sync::Arc;
/// use markdown_prose_translator::{FnTranslator, MarkdownTranslator};
///
/// # tokio_test::block_on(async {
/// let upper = FnTranslator::new(|text: &str, _: &str, _: &str| Ok(text.to_uppercase()));
/// let translator = MarkdownTranslator::new(Arc::new(upper), "en", "fr");
///
/// let out = translator.translate_document("# hello `code`").await.unwrap();
/// assert_eq!(out, "# HELLO `code`");
/// # });
/// ```
#[derive(Clone)]
pub struct MarkdownTranslator {
    translator: Arc<dyn Translator>,
    source_lang: String,
    target_lang: String,
    options: MarkdownOptions,
}

impl MarkdownTranslator {
    pub fn new(
        translator: Arc<dyn Translator>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            translator,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            options: MarkdownOptions::default(),
        }
    }

    /// 使用配置文件中的DeepLX服务与Markdown选项
    pub fn from_config(config: &TranslationLibConfig) -> Self {
        let service = TranslationService::new(config.translation.clone());
        Self::new(
            Arc::new(service),
            config.translation.source_lang.clone(),
            config.translation.target_lang.clone(),
        )
        .with_options(config.markdown.clone())
    }

    pub fn with_options(mut self, options: MarkdownOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &MarkdownOptions {
        &self.options
    }

    /// 翻译整篇Markdown文档
    ///
    /// 单个片段翻译失败只会让该片段保留原文；占位符丢失或重复时返回
    /// [`TranslationError::StructuralInvariant`]，不会输出损坏的文档。
    pub async fn translate_document(&self, text: &str) -> Result<String> {
        let (working, code_table) = shield_code(text);
        let (working, table_table) = if self.options.shield_html_tables {
            shield_html_tables(&working)
        } else {
            (working, ShieldTable::new())
        };
        let (working, formula_table) = shield_formulas(&working);

        info!(
            "Translating document {} -> {}: {} code blocks, {} tables, {} formulas shielded",
            self.source_lang,
            self.target_lang,
            code_table.len(),
            table_table.len(),
            formula_table.len()
        );

        let translated = self.translate_lines(&working).await?;

        let rendering = if self.options.render_math_hints {
            MathRendering::Hinted
        } else {
            MathRendering::Verbatim
        };
        let restored = formula_table.restore(&translated, rendering)?;
        let restored = table_table.restore(&restored, MathRendering::Verbatim)?;
        restore_code(&restored, &code_table)
    }

    /// 并发翻译各行，结果按原行号放回
    ///
    /// 同时运行的任务不超过 `max_concurrent_lines`。任一任务异常时立即返回，
    /// 尚未完成的任务随 `JoinSet` 一起被中止。
    async fn translate_lines(&self, text: &str) -> Result<String> {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut output: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
        let limit = self.options.max_concurrent_lines.max(1);

        let pending: Vec<(usize, String)> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !is_special_line(line))
            .map(|(index, line)| (index, line.to_string()))
            .collect();

        debug!("{} of {} lines scheduled for translation", pending.len(), lines.len());

        let mut tasks = JoinSet::new();
        for (index, line) in pending {
            if tasks.len() >= limit {
                if let Some(joined) = tasks.join_next().await {
                    let (done, translated) = joined.map_err(|e| TranslationError::Task(e.to_string()))?;
                    output[done] = translated;
                }
            }

            let translator = Arc::clone(&self.translator);
            let from_lang = self.source_lang.clone();
            let to_lang = self.target_lang.clone();
            tasks.spawn(async move {
                let translated = translate_line(&line, translator.as_ref(), &from_lang, &to_lang).await;
                (index, translated)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (done, translated) = joined.map_err(|e| TranslationError::Task(e.to_string()))?;
            output[done] = translated;
        }

        Ok(output.join("\n"))
    }

    /// 翻译Markdown文件
    ///
    /// 未指定输出路径时写到输入文件旁的 `<stem>_translated.<ext>`。返回实际写入的路径。
    pub async fn translate_file(&self, input: impl AsRef<Path>, output: Option<&Path>) -> Result<PathBuf> {
        let input = input.as_ref();
        let content = tokio::fs::read_to_string(input).await?;

        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(input));

        let translated = self.translate_document(&content).await?;
        tokio::fs::write(&output, translated).await?;

        info!("翻译完成，已保存到 {}", output.display());
        Ok(output)
    }
}

/// `docs/paper.md` -> `docs/paper_translated.md`
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}_translated.{}", stem, ext.to_string_lossy()),
        None => format!("{}_translated", stem),
    };
    input.with_file_name(name)
}

/// 以默认选项翻译文档
pub async fn translate_document(
    text: &str,
    translator: Arc<dyn Translator>,
    from_lang: &str,
    to_lang: &str,
) -> Result<String> {
    MarkdownTranslator::new(translator, from_lang, to_lang)
        .translate_document(text)
        .await
}
