//! Named source text shared by the scanner, the session, and every diagnostic
//! built while reading it.

use miette::NamedSource;
use std::sync::Arc;

/// Source text plus the name it is reported under.
///
/// Cloning is cheap: the text and its `miette` wrapper are reference counted,
/// so errors and warnings can hold on to the source after the session is gone.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: Arc<String>,
    named: Arc<NamedSource<String>>,
}

impl SourceContext {
    /// Source read from a file (or a REPL turn) under the given name.
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        let content = Arc::new(content.into());
        let named = Arc::new(NamedSource::new(name.clone(), content.as_ref().clone()));
        Self { name, content, named }
    }

    /// Placeholder used for diagnostics that have no source text of their own.
    pub fn fallback(context: &str) -> Self {
        Self::from_file("<none>", format!("// {}", context))
    }

    /// Shared `miette` view of this source.
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::clone(&self.named)
    }

    pub fn named(&self) -> &NamedSource<String> {
        &self.named
    }

    /// The text of the line starting at byte offset `line_start`, without its newline.
    pub fn line_at(&self, line_start: usize) -> &str {
        let start = line_start.min(self.content.len());
        self.content[start..].lines().next().unwrap_or("")
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::fallback("default context")
    }
}
