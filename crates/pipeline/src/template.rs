//! Scaffold rendering for chat snippets.

use serde::Serialize;
use tera::{Context, Tera};

use playpen_core::{Error, Result};

/// Name of the built-in scaffold.
pub const DEFAULT_TEMPLATE: &str = "scaffold";

/// Wraps an expression in `main` and prints its value with `{:?}`.
pub const DEFAULT_SCAFFOLD: &str = r#"#![allow(dead_code, unused_variables)]

static VERSION: &'static str = {{ version }};

fn show<T: std::fmt::Debug>(e: T) { println!("{:?}", e) }

fn main() {
    show({
        {{ code }}
    });
}
"#;

/// How a snippet becomes a runnable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderMode {
    /// The snippet is already a complete program.
    Verbatim,
    /// Substitute the snippet into the named template.
    Template(String),
}

impl RenderMode {
    pub fn wrapped() -> Self {
        Self::Template(DEFAULT_TEMPLATE.to_string())
    }

    /// Whether rendering needs the compiler version banner.
    pub fn wraps(&self) -> bool {
        matches!(self, Self::Template(_))
    }
}

#[derive(Serialize)]
struct Scaffold<'a> {
    code: &'a str,
    /// Already a quoted Rust string literal.
    version: String,
}

/// Holds the compiled scaffolds. Templates are parsed once, when added.
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// A renderer that knows the built-in scaffold.
    pub fn new() -> Result<Self> {
        let mut renderer = Self {
            tera: Tera::default(),
        };
        renderer.register(DEFAULT_TEMPLATE, DEFAULT_SCAFFOLD)?;
        Ok(renderer)
    }

    /// Add a scaffold with `{{ code }}` and `{{ version }}` placeholders.
    pub fn register(&mut self, name: &str, body: &str) -> Result<()> {
        self.tera
            .add_raw_template(name, body)
            .map_err(|e| Error::template(format!("Invalid template {}: {}", name, e)))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Produce the runnable unit. The snippet is substituted literally; it is
    /// never parsed or escaped.
    pub fn render(&self, mode: &RenderMode, code: &str, version: &str) -> Result<String> {
        match mode {
            RenderMode::Verbatim => Ok(code.to_string()),
            RenderMode::Template(name) => {
                let scaffold = Scaffold {
                    code,
                    version: format!("{:?}", version),
                };
                let context = Context::from_serialize(&scaffold)
                    .map_err(|e| Error::template(e.to_string()))?;
                self.tera
                    .render(name, &context)
                    .map_err(|e| Error::template(format!("Failed to render {}: {}", name, e)))
            }
        }
    }
}
