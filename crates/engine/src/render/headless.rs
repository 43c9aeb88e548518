//! Headless Chrome/Chromium renderer running the bundled converter page.
//!
//! The converter page exposes
//! `PCSHTMLConverter.convertMobileSectionsJSONToMobileHTML(lead, remaining)`;
//! each submission evaluates that call with the raw JSON pasted in as
//! object literals.

use std::path::PathBuf;

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use tokio::sync::OnceCell;

use savedpages_core::cache::files;

use super::{RenderCallback, RenderError, RenderJob, Renderer};

const CONVERT_FN: &str = "PCSHTMLConverter.convertMobileSectionsJSONToMobileHTML";

struct Engine {
    _browser: Browser,
    page: Page,
}

/// Renderer backed by one headless browser page.
pub struct HeadlessRenderer {
    assets: PathBuf,
    engine: OnceCell<Engine>,
}

impl HeadlessRenderer {
    /// Create a renderer for the converter page at `assets`.
    ///
    /// The browser is launched on the first [`Renderer::ready`] call.
    pub fn new(assets: PathBuf) -> Self {
        Self { assets, engine: OnceCell::new() }
    }

    async fn start(&self) -> Result<Engine, RenderError> {
        let html = files::read_to_string(&self.assets)
            .await
            .map_err(|e| RenderError::EngineUnavailable(format!("converter assets: {e}")))?;

        let (browser, mut handler) = Browser::launch(
            BrowserConfig::builder()
                .build()
                .map_err(RenderError::EngineUnavailable)?,
        )
        .await
        .map_err(|e| RenderError::EngineUnavailable(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::EngineUnavailable(e.to_string()))?;
        page.set_content(html)
            .await
            .map_err(|e| RenderError::EngineUnavailable(format!("loading converter page: {e}")))?;

        tracing::info!(assets = %self.assets.display(), "headless converter ready");
        Ok(Engine { _browser: browser, page })
    }
}

#[async_trait::async_trait]
impl Renderer for HeadlessRenderer {
    async fn ready(&self) -> Result<(), RenderError> {
        self.engine.get_or_try_init(|| self.start()).await.map(|_| ())
    }

    fn submit(&self, job: RenderJob, on_result: RenderCallback) {
        let Some(engine) = self.engine.get() else {
            on_result(Err(RenderError::EngineUnavailable("renderer not started".to_string())));
            return;
        };

        let page = engine.page.clone();
        tokio::spawn(async move {
            let expression = format!("{CONVERT_FN}({}, {})", job.lead_json, job.remaining_json);
            let result = match page.evaluate(expression).await {
                // Hand back the JSON text; the orchestrator decodes it.
                Ok(evaluation) => evaluation
                    .into_value::<serde_json::Value>()
                    .map(|value| value.to_string())
                    .map_err(|e| RenderError::Script(e.to_string())),
                Err(e) => Err(RenderError::Script(e.to_string())),
            };
            on_result(result);
        });
    }
}
