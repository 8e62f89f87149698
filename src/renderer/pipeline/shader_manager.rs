//! Shader Template Manager
//!
//! All WGSL in the crate is rendered through one minijinja [`Environment`]
//! configured with the engine's custom syntax:
//!
//! | Syntax        | Meaning                       |
//! |---------------|-------------------------------|
//! | `{$ ... $}`   | block (`if`, `for`, `include`) |
//! | `{{ ... }}`   | variable                      |
//! | `$$ ...`      | line statement                |
//!
//! Templates are `.wgsl` files embedded from `src/renderer/pipeline/shaders`;
//! debug builds read them from disk first so shader edits need no rebuild.
//! `include` paths resolve relative to `chunks/`.
//!
//! [`ShaderManager`] validates finished WGSL with naga and deduplicates
//! device modules by the xxh3-128 of their source.

use std::borrow::Cow;
use std::sync::OnceLock;

use minijinja::{Environment, Error, ErrorKind, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use rustc_hash::FxHashMap;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_128;

use crate::errors::{HoloError, Result};

static SHADER_ENV: OnceLock<Environment<'static>> = OnceLock::new();

#[derive(RustEmbed)]
#[folder = "src/renderer/pipeline/shaders"]
struct ShaderAssets;

pub fn get_env() -> &'static Environment<'static> {
    SHADER_ENV.get_or_init(|| {
        let mut env = Environment::new();

        match SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .variable_delimiters("{{", "}}")
            .line_statement_prefix("$$")
            .build()
        {
            Ok(syntax) => env.set_syntax(syntax),
            Err(e) => log::error!("Failed to configure shader template syntax: {e}"),
        }

        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(minijinja::UndefinedBehavior::SemiStrict);
        env.set_loader(shader_loader);
        env.set_path_join_callback(|name, _parent| format!("chunks/{name}").into());

        env
    })
}

fn shader_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    let filename = if std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wgsl"))
    {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.wgsl"))
    };

    #[cfg(debug_assertions)]
    {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("src/renderer/pipeline/shaders")
            .join(filename.as_ref());
        if path.exists() {
            return std::fs::read_to_string(&path).map(Some).map_err(|e| {
                Error::new(
                    ErrorKind::TemplateNotFound,
                    format!("Failed to read {}: {e}", path.display()),
                )
            });
        }
    }

    if let Some(file) = ShaderAssets::get(&filename)
        && let Ok(source) = std::str::from_utf8(file.data.as_ref())
    {
        return Ok(Some(source.to_string()));
    }

    Ok(None)
}

/// Raw, unrendered template text.
pub fn load_source(name: &str) -> Result<String> {
    shader_loader(name)?.ok_or_else(|| {
        HoloError::ShaderTemplate(Error::new(
            ErrorKind::TemplateNotFound,
            format!("shader template `{name}` not found"),
        ))
    })
}

/// Renders a named template.
pub fn render_template<S: Serialize>(name: &str, ctx: S) -> Result<String> {
    let template = get_env().get_template(name)?;
    Ok(template.render(ctx)?)
}

/// Renders inline template code (patched segments).
pub fn render_str<S: Serialize>(source: &str, ctx: S) -> Result<String> {
    Ok(get_env().render_str(source, ctx)?)
}

/// Parses and validates WGSL with naga.
pub fn validate_wgsl(label: &str, source: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| HoloError::ShaderValidation {
        label: label.to_string(),
        message: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| HoloError::ShaderValidation {
        label: label.to_string(),
        message: e.emit_to_string(source),
    })?;

    Ok(module)
}

// ─── ShaderManager ────────────────────────────────────────────────────────────

/// Device-side shader module cache keyed by xxh3-128 of the final WGSL.
pub struct ShaderManager {
    module_cache: FxHashMap<u128, wgpu::ShaderModule>,
}

impl Default for ShaderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            module_cache: FxHashMap::default(),
        }
    }

    /// Validates and compiles `source`, or returns the cached module.
    pub fn get_or_compile(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        source: &str,
    ) -> Result<(&wgpu::ShaderModule, u128)> {
        let hash = xxh3_128(source.as_bytes());

        if !self.module_cache.contains_key(&hash) {
            validate_wgsl(label, source)?;
            if cfg!(debug_assertions) {
                log::trace!(
                    "Generated shader `{label}`:\n{}",
                    collapse_blank_lines(source)
                );
            }
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.to_owned().into()),
            });
            self.module_cache.insert(hash, module);
        }

        let module = &self.module_cache[&hash];
        Ok((module, hash))
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.module_cache.len()
    }

    pub fn clear(&mut self) {
        self.module_cache.clear();
    }
}

/// Collapses runs of newlines left behind by template blocks.
#[must_use]
pub fn collapse_blank_lines(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_newline = false;
    for c in s.chars() {
        if c == '\n' {
            if !last_was_newline {
                result.push('\n');
                last_was_newline = true;
            }
        } else {
            result.push(c);
            last_was_newline = false;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_syntax_renders_blocks_and_variables() {
        let ctx = minijinja::context! { USE_ENV_MAP => "1", weight => "0.5" };
        let out = render_str("{$ if USE_ENV_MAP $}a{{ weight }}{$ else $}b{$ endif $}", ctx).unwrap();
        assert_eq!(out, "a0.5");
    }

    #[test]
    fn undefined_defines_are_falsy() {
        let out = render_str("{$ if USE_ENV_MAP $}a{$ else $}b{$ endif $}", minijinja::context! {}).unwrap();
        assert_eq!(out, "b");
    }

    #[test]
    fn missing_template_is_configuration_error() {
        let err = load_source("passes/does_not_exist").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn collapse_blank_lines_keeps_single_newlines() {
        assert_eq!(collapse_blank_lines("a\n\n\nb\nc"), "a\nb\nc");
    }
}
