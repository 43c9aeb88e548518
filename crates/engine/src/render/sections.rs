//! Rule-based renderer for mobile-sections responses.
//!
//! Produces a mobile-html style document: a header with the display title
//! and description, then one `<section>` per mobile section in order.

use serde::Deserialize;

use super::{RenderCallback, RenderError, RenderJob, Renderer};

#[derive(Debug, Deserialize)]
struct LeadResponse {
    #[serde(default)]
    displaytitle: Option<String>,
    #[serde(default)]
    normalizedtitle: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct RemainingResponse {
    #[serde(default)]
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    id: i64,
    #[serde(default)]
    toclevel: Option<u8>,
    #[serde(default)]
    line: Option<String>,
    #[serde(default)]
    anchor: Option<String>,
    #[serde(default)]
    text: String,
}

/// Renders on the blocking pool and answers from there.
#[derive(Debug, Clone, Default)]
pub struct SectionsRenderer;

impl SectionsRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Renderer for SectionsRenderer {
    fn submit(&self, job: RenderJob, on_result: RenderCallback) {
        tokio::task::spawn_blocking(move || {
            let result = render_document(&job);
            if let Err(e) = &result {
                tracing::debug!(title = %job.title, error = %e, "sections render failed");
            }
            on_result(result);
        });
    }
}

/// Render one lead/remaining pair into a complete HTML document.
pub(crate) fn render_document(job: &RenderJob) -> Result<String, RenderError> {
    let lead: LeadResponse = serde_json::from_str(&job.lead_json)
        .map_err(|e| RenderError::Malformed(format!("lead section of {}: {e}", job.title)))?;
    let remaining: RemainingResponse = serde_json::from_str(&job.remaining_json)
        .map_err(|e| RenderError::Malformed(format!("remaining sections of {}: {e}", job.title)))?;

    let plain_title = lead.normalizedtitle.as_deref().unwrap_or(&job.title);
    let display_title = match lead.displaytitle.as_deref() {
        Some(t) => t.to_string(),
        None => html_escape(plain_title),
    };

    let mut html = String::with_capacity(job.lead_json.len() + job.remaining_json.len() + 512);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", html_escape(plain_title)));
    html.push_str("</head>\n<body>\n<div id=\"pcs\">\n<header>\n");
    html.push_str(&format!("<h1 class=\"pcs-edit-section-title\">{display_title}</h1>\n"));
    if let Some(description) = lead.description.as_deref().filter(|d| !d.is_empty()) {
        html.push_str(&format!(
            "<p class=\"pcs-edit-section-title-description\">{}</p>\n",
            html_escape(description)
        ));
    }
    html.push_str("</header>\n");

    for section in lead.sections.iter().chain(remaining.sections.iter()) {
        push_section(&mut html, section);
    }

    html.push_str("</div>\n</body>\n</html>\n");
    Ok(html)
}

fn push_section(html: &mut String, section: &Section) {
    html.push_str(&format!("<section data-mw-section-id=\"{}\">\n", section.id));

    if let Some(line) = section.line.as_deref().filter(|_| section.id > 0) {
        let level = section.toclevel.unwrap_or(1).saturating_add(1).clamp(2, 6);
        let anchor = section.anchor.as_deref().unwrap_or(line);
        html.push_str(&format!(
            "<div class=\"pcs-edit-section-header\"><h{level} id=\"{}\" class=\"pcs-edit-section-title\">{line}</h{level}></div>\n",
            html_escape(anchor)
        ));
    }

    html.push_str(&section.text);
    html.push_str("\n</section>\n");
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
