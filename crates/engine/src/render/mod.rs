//! Rendering engines that turn legacy mobile-sections JSON into documents.
//!
//! A [`Renderer`] accepts a lead/remaining JSON pair and reports the
//! rendered document through a callback, exactly once, on whatever thread
//! the engine likes. Engines:
//!
//! - [`SectionsRenderer`]: rule-based, no external dependencies
//! - `HeadlessRenderer` (feature `headless`): runs the bundled converter
//!   page in headless Chrome/Chromium via chromiumoxide

#[cfg(feature = "headless")]
mod headless;
mod sections;

use std::sync::Arc;

use savedpages_core::{AppConfig, Error, RendererKind};
use thiserror::Error;

#[cfg(feature = "headless")]
pub use headless::HeadlessRenderer;
pub use sections::SectionsRenderer;

/// Errors that can occur while rendering a document.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// The engine could not be started.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Input JSON could not be understood.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// The converter script raised or could not be evaluated.
    #[error("converter script failed: {0}")]
    Script(String),

    /// The engine answered with nothing usable (`null`, empty).
    #[error("converter returned no document")]
    EmptyOutput,

    /// No answer within the per-document deadline.
    #[error("render timeout after {0}ms")]
    Timeout(u64),

    /// The engine dropped the request without answering.
    #[error("engine dropped the request")]
    EngineClosed,
}

impl From<RenderError> for Error {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::EngineUnavailable(msg) => Error::EngineUnavailable(msg),
            other => Error::RenderFailed(other.to_string()),
        }
    }
}

/// One document to render.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Page title, for logging.
    pub title: String,
    /// Raw mobile-sections-lead response.
    pub lead_json: String,
    /// Raw mobile-sections-remaining response.
    pub remaining_json: String,
}

/// Receives the result of one submission.
pub type RenderCallback = Box<dyn FnOnce(Result<String, RenderError>) + Send + 'static>;

/// Capability interface of a rendering engine.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Prepare the engine before the first submission.
    ///
    /// Only called when there is something to convert.
    async fn ready(&self) -> Result<(), RenderError> {
        Ok(())
    }

    /// Queue a job. Returns immediately; `on_result` is invoked exactly once
    /// later, possibly on another thread.
    fn submit(&self, job: RenderJob, on_result: RenderCallback);
}

/// Build the renderer selected by the configuration.
///
/// Engines are started lazily in [`Renderer::ready`], so this never touches
/// the browser or the converter assets.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn Renderer>, Error> {
    match config.renderer {
        RendererKind::Sections => Ok(Arc::new(SectionsRenderer::new())),
        #[cfg(feature = "headless")]
        RendererKind::Headless => Ok(Arc::new(HeadlessRenderer::new(config.converter_assets.clone()))),
        #[cfg(not(feature = "headless"))]
        RendererKind::Headless => Err(Error::EngineUnavailable(
            "built without the `headless` feature".to_string(),
        )),
    }
}

/// Undo the transport encoding an engine applied to its output.
///
/// Script engines hand results back as JSON string literals, so quotes,
/// newlines and unicode arrive escaped. Anything that is not a string
/// literal is taken verbatim. `null`, `undefined` and blank output mean the
/// conversion produced nothing.
pub fn decode_output(raw: &str) -> Result<String, RenderError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" || trimmed == "undefined" {
        return Err(RenderError::EmptyOutput);
    }

    if trimmed.starts_with('"') {
        let decoded: String =
            serde_json::from_str(trimmed).map_err(|e| RenderError::Malformed(format!("undecodable output: {e}")))?;
        if decoded.trim().is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        return Ok(decoded);
    }

    Ok(raw.to_string())
}
