use std::path::{Path, PathBuf};

use tracing::Span;

use crate::catalog::PageId;

/// Shared handles a page needs at construction: where to log and where the
/// bundled assets live. Passed explicitly instead of living in globals.
#[derive(Clone, Debug)]
pub struct AppContext {
    span: Span,
    asset_root: PathBuf,
}

impl AppContext {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        let asset_root = asset_root.into();
        let span = tracing::info_span!("dlcgui", assets = %asset_root.display());
        Self { span, asset_root }
    }

    pub fn with_span(span: Span, asset_root: impl Into<PathBuf>) -> Self {
        Self {
            span,
            asset_root: asset_root.into(),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    pub fn asset(&self, name: &str) -> PathBuf {
        self.asset_root.join(name)
    }

    /// Child span for one page. Field changes and task steps log inside it.
    pub fn page_span(&self, page: PageId) -> Span {
        tracing::info_span!(parent: &self.span, "page", page = page.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assets_resolve_under_root() {
        let ctx = AppContext::new("/opt/dlcgui/assets");
        assert_eq!(ctx.asset("logo.png"), PathBuf::from("/opt/dlcgui/assets/logo.png"));
    }
}
