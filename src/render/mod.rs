//! Headless-renderer interface.
//!
//! Browser rendering is an external collaborator: the engine only defines
//! the contract (URL in, rendered HTML plus discovered subresources out)
//! and substitutes the rendered HTML for the fetched body when a renderer
//! is installed and `js_rendering` is enabled. Renderer resources are
//! engine-scoped: created by the embedder, handed to the crawler at
//! construction, released when the crawler stops.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use url::Url;

/// Wait budget applied by renderer implementations at each page phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RenderingConfig {
    /// Wait after initial navigation, before the first DOM snapshot.
    pub initial_wait_ms: u64,
    /// Wait after scrolling to trigger lazy-loaded content.
    pub scroll_wait_ms: u64,
    /// Final settle time before the DOM is captured.
    pub final_wait_ms: u64,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            initial_wait_ms: 500,
            scroll_wait_ms: 250,
            final_wait_ms: 250,
        }
    }
}

/// Output of a render pass.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// The DOM serialized after scripts ran.
    pub html: String,
    /// Subresource URLs the page loaded (scripts, frames, XHR targets).
    /// Fed into discovery alongside links extracted from the DOM.
    pub subresources: Vec<String>,
}

/// Contract for headless page renderers.
pub trait PageRenderer: Send + Sync {
    /// Render the URL and return the settled DOM.
    fn render(
        &self,
        url: &Url,
        config: &RenderingConfig,
    ) -> BoxFuture<'_, anyhow::Result<RenderedPage>>;
}
