//! Rule body rendering with minijinja.
//!
//! Rule bodies are templates parameterized by their descriptor's
//! `template_args`, so several descriptors can share one body file. Bodies
//! are arbitrary strings, not pre-registered templates, so a fresh
//! [`minijinja::Environment`] is built per render call.

use minijinja::UndefinedBehavior;

/// Errors raised while rendering a rule body.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("rule body is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("template rendering failed: {0}")]
    Template(#[from] minijinja::Error),
}

/// Renders rule bodies against their template arguments.
#[derive(Debug, Default)]
pub struct RuleRenderer {
    _private: (),
}

impl RuleRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Strict undefined handling: a body referencing an argument the
    /// descriptor does not provide fails instead of rendering blanks.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env
    }

    /// Render `body` with `args` as the template context.
    pub fn render(
        &self,
        body: &[u8],
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, RenderError> {
        let source = std::str::from_utf8(body)?;
        let env = Self::build_env();
        Ok(env.render_str(source, args)?)
    }
}
