use std::sync::Arc;

/// Immutable snapshot of the shader text being previewed.
///
/// A new snapshot is produced for every edit; surfaces only ever see it
/// through a shared [`Arc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    revision: u64,
    fragment_text: String,
    vertex_text: String,
}

impl ShaderSource {
    pub fn new(
        revision: u64,
        fragment_text: impl Into<String>,
        vertex_text: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            revision,
            fragment_text: fragment_text.into(),
            vertex_text: vertex_text.into(),
        })
    }

    /// Session-wide edit counter; later snapshots carry larger revisions.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn fragment_text(&self) -> &str {
        &self.fragment_text
    }

    pub fn vertex_text(&self) -> &str {
        &self.vertex_text
    }
}
