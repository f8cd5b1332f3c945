//! Template rendering and content digests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::HostError;

/// Context passed to a render: placeholder name to replacement text.
///
/// Values are plain strings; structured blocks (e.g. a serialized YAML
/// section) are produced by the caller and substituted whole.
pub type RenderContext = BTreeMap<String, String>;

/// Renders named artifact templates and reports their content digests.
///
/// `render` is a deterministic pure function of template plus context.
/// A missing template or a placeholder without a context entry is fatal.
/// `digest` drives template-change detection: the engine regenerates an
/// artifact whenever its template's digest differs from the one recorded
/// at last generation.
pub trait Renderer {
    /// Render `template` with `context` and write the result to `target`.
    fn render(
        &self,
        template: &str,
        target: &Path,
        context: &RenderContext,
    ) -> Result<(), HostError>;

    /// Digest of the template's current source content.
    fn digest(&self, template: &str) -> Result<String, HostError>;
}

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// On-disk template directory.
///
/// Templates are plain text files containing `{{ name }}` placeholders.
/// Operators may edit the installed copies; the digest change forces
/// regeneration on the next pass.
#[derive(Debug)]
pub struct TemplateDir {
    dir: PathBuf,
    placeholder: Regex,
}

impl TemplateDir {
    /// Create a renderer over the template files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            placeholder: Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap(),
        }
    }

    fn source(&self, template: &str) -> Result<String, HostError> {
        let path = self.dir.join(template);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(HostError::MissingTemplate {
                name: template.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl Renderer for TemplateDir {
    fn render(
        &self,
        template: &str,
        target: &Path,
        context: &RenderContext,
    ) -> Result<(), HostError> {
        let source = self.source(template)?;

        // Reject undefined placeholders before writing anything.
        for captures in self.placeholder.captures_iter(&source) {
            let variable = &captures[1];
            if !context.contains_key(variable) {
                return Err(HostError::UndefinedVariable {
                    template: template.to_string(),
                    variable: variable.to_string(),
                });
            }
        }

        let rendered = self.placeholder.replace_all(&source, |captures: &regex::Captures<'_>| {
            context[&captures[1]].clone()
        });

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, rendered.as_bytes())?;
        debug!(template, target = %target.display(), "rendered template");
        Ok(())
    }

    fn digest(&self, template: &str) -> Result<String, HostError> {
        Ok(sha256_hex(self.source(template)?.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn context(pairs: &[(&str, &str)]) -> RenderContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("defaults.tmpl"),
            "# Managed file\nARGS=\"{{ args }}\"\n",
        )
        .unwrap();

        let renderer = TemplateDir::new(dir.path());
        let target = dir.path().join("out");
        renderer
            .render("defaults.tmpl", &target, &context(&[("args", "-a 1 -b 2")]))
            .unwrap();

        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "# Managed file\nARGS=\"-a 1 -b 2\"\n"
        );
    }

    #[test]
    fn missing_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = TemplateDir::new(dir.path());
        let err = renderer
            .render("nope.tmpl", &dir.path().join("out"), &RenderContext::new())
            .unwrap_err();
        assert!(matches!(err, HostError::MissingTemplate { .. }));
    }

    #[test]
    fn undefined_variable_is_fatal_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("t.tmpl"), "{{ known }} {{ unknown }}").unwrap();

        let renderer = TemplateDir::new(dir.path());
        let target = dir.path().join("out");
        let err = renderer
            .render("t.tmpl", &target, &context(&[("known", "x")]))
            .unwrap_err();

        match err {
            HostError::UndefinedVariable { variable, .. } => assert_eq!(variable, "unknown"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!target.exists());
    }

    #[test]
    fn digest_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.tmpl");
        fs::write(&path, "one").unwrap();

        let renderer = TemplateDir::new(dir.path());
        let first = renderer.digest("t.tmpl").unwrap();
        assert_eq!(first, renderer.digest("t.tmpl").unwrap());

        fs::write(&path, "two").unwrap();
        assert_ne!(first, renderer.digest("t.tmpl").unwrap());
    }

    #[test]
    fn render_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("t.tmpl"), "port={{ port }}").unwrap();

        let renderer = TemplateDir::new(dir.path());
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let ctx = context(&[("port", "9090")]);
        renderer.render("t.tmpl", &a, &ctx).unwrap();
        renderer.render("t.tmpl", &b, &ctx).unwrap();
        assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    }
}
