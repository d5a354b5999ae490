//! Mustache-style text substitution for subjects and bodies.
//!
//! Templates reference spreadsheet columns as `{{Column}}`. Rendering is
//! strict: a reference to a column the row does not have is an error rather
//! than an empty string, and values are inserted verbatim since the output is
//! plain text.

use std::collections::BTreeMap;

use handlebars::{Handlebars, RenderErrorReason};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template references a variable the row does not define.
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    /// The template could not be compiled or written.
    #[error("Template rendering failed: {0}")]
    Render(String),
}

/// Renders templates against a row's variables.
pub struct TextBuilder {
    handlebars: Handlebars<'static>,
}

impl TextBuilder {
    #[must_use]
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    /// Substitute `variables` into `template`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UndefinedVariable`] when the template refers to
    /// a name missing from `variables`, and [`TemplateError::Render`] for
    /// syntax errors and any other rendering failure.
    pub fn substitute(
        &self,
        template: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<String, TemplateError> {
        self.handlebars
            .render_template(template, variables)
            .map_err(|e| match e.reason() {
                RenderErrorReason::MissingVariable(name) => TemplateError::UndefinedVariable(
                    name.clone().unwrap_or_else(|| "unknown".to_string()),
                ),
                _ => TemplateError::Render(e.to_string()),
            })
    }
}

impl Default for TextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
