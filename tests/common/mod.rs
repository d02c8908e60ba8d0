/*!
 * Shared stub translators for the integration tests
 */

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use markdown_prose_translator::{FnTranslator, Result, TranslationError, Translator};

/// Install a test logger once; later calls are no-ops
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn identity() -> Arc<dyn Translator> {
    Arc::new(FnTranslator::new(|text: &str, _: &str, _: &str| Ok(text.to_string())))
}

pub fn uppercase() -> Arc<dyn Translator> {
    Arc::new(FnTranslator::new(|text: &str, _: &str, _: &str| Ok(text.to_uppercase())))
}

/// Uppercases everything except the exact input `word`, which errors
pub fn failing_on(word: &'static str) -> Arc<dyn Translator> {
    Arc::new(FnTranslator::new(move |text: &str, _: &str, _: &str| {
        if text == word {
            Err(TranslationError::ApiError { code: 401, message: "unauthorized".to_string() })
        } else {
            Ok(text.to_uppercase())
        }
    }))
}

/// Records every text it is asked to translate and returns it unchanged
#[derive(Default)]
pub struct RecordingTranslator {
    calls: Mutex<Vec<String>>,
}

impl RecordingTranslator {
    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl Translator for RecordingTranslator {
    async fn translate(&self, text: &str, _from: &str, _to: &str) -> Result<String> {
        self.calls.lock().unwrap().push(text.to_string());
        Ok(text.to_string())
    }
}

pub const SAMPLE_DOCUMENT: &str = r#"# Attention Is All You Need

## 1. Introduction

Recurrent models compute $h_t$ as a function of $h_{t-1}$ and the input.
See [the paper](https://arxiv.org/abs/1706.03762) and ![the figure](images/fig1.png) below.

![](images/fig1.png)

$$
\text{Attention}(Q, K, V) = \text{softmax}\left(\frac{QK^T}{\sqrt{d_k}}\right)V
$$

- **Encoder** stacks six identical layers
- *Decoder* also has six layers
- ~~Convolution~~ is not used

1. Scaled dot-product attention
2. Multi-head attention with `h = 8`

> Attention weights sum to one.

```python
def softmax(x):
    # cost is $5 per **call**
    return np.exp(x) / np.exp(x).sum()
```

<html><body><table><tr><td>Model</td><td>BLEU</td></tr>
<tr><td>Transformer</td><td>28.4</td></tr></table></body></html>

The end.
"#;
