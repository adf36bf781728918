//! Bounded pool of concurrent headless-browser sessions.
//!
//! One Chrome instance serves the whole evaluation run; a counting semaphore
//! caps how many pages are live at once so that rendering many documents
//! cannot exhaust the machine. Sessions render a document to a full-page
//! screenshot and separately read back browser-computed style values for a
//! target stylesheet's selectors.

mod chrome;

pub use chrome::find_chrome_executable;

use anyhow::{Context as _, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::EventLoadingFailed;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::page::Page;
use futures::StreamExt as _;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::{create_dir_all, write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use style_model::{Stylesheet, page_styles_from_markup};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use url::Url;

/// Fixed logical viewport width for every rendered page.
pub const VIEWPORT_WIDTH: u32 = 1536;

/// Initial viewport height; screenshots resize to the document height.
const VIEWPORT_HEIGHT: u32 = 720;

/// Upper bound on navigation and load waits.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Computed style values per selector, restricted to the queried properties.
pub type ComputedStyles = HashMap<String, HashMap<String, String>>;

/// Pool construction options.
#[derive(Clone, Debug)]
pub struct PoolOptions {
    /// Maximum number of concurrently live sessions.
    pub max_sessions: usize,
    /// Base URL of the local content server documents resolve against.
    pub base_url: Url,
}

impl PoolOptions {
    /// Options with the default session cap for the given content server.
    pub fn new(base_url: Url) -> Self {
        Self {
            max_sessions: 10,
            base_url,
        }
    }
}

/// A bounded pool of headless-Chrome page sessions.
pub struct RenderPool {
    browser: Browser,
    handler_task: JoinHandle<()>,
    slots: Arc<Semaphore>,
    base_url: Url,
}

impl RenderPool {
    /// Launches headless Chrome and readies the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if Chrome cannot be found or fails to launch.
    pub async fn launch(options: PoolOptions) -> Result<Self> {
        let config = chrome::headless_config(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch headless Chrome")?;

        // Drain browser events for the life of the pool.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    log::debug!("browser handler error: {err}");
                }
            }
            log::debug!("browser handler stream ended");
        });

        Ok(Self {
            browser,
            handler_task,
            slots: Arc::new(Semaphore::new(options.max_sessions)),
            base_url: options.base_url,
        })
    }

    /// Acquires an exclusive page session, waiting for a free slot.
    ///
    /// The slot is held by the returned session and freed when the session
    /// drops, on every exit path including cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is shutting down or the page cannot be
    /// created.
    pub async fn session(&self) -> Result<PageSession> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .context("render pool is closed")?;

        let page = self.browser.new_page("about:blank").await?;
        let log_tasks = spawn_diagnostics(&page).await;

        Ok(PageSession {
            page,
            base_url: self.base_url.clone(),
            _permit: permit,
            log_tasks,
        })
    }

    /// Shuts the browser down.
    ///
    /// # Errors
    ///
    /// Returns an error if Chrome refuses to close.
    pub async fn shutdown(mut self) -> Result<()> {
        self.browser.close().await?;
        self.browser.wait().await?;
        self.handler_task.abort();
        Ok(())
    }
}

/// Subscribes to page diagnostics: console errors, uncaught exceptions, and
/// failed sub-resource requests. All are logged, none fail rendering.
async fn spawn_diagnostics(page: &Page) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    if let Ok(mut console) = page.event_listener::<EventConsoleApiCalled>().await {
        tasks.push(tokio::spawn(async move {
            while let Some(event) = console.next().await {
                if matches!(event.r#type, ConsoleApiCalledType::Error) {
                    let text = event
                        .args
                        .iter()
                        .filter_map(|arg| {
                            arg.value
                                .as_ref()
                                .map(JsonValue::to_string)
                                .or_else(|| arg.description.clone())
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    log::warn!("browser console error: {text}");
                }
            }
        }));
    }

    if let Ok(mut exceptions) = page.event_listener::<EventExceptionThrown>().await {
        tasks.push(tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                log::warn!("page error: {}", event.exception_details.text);
            }
        }));
    }

    if let Ok(mut failures) = page.event_listener::<EventLoadingFailed>().await {
        tasks.push(tokio::spawn(async move {
            while let Some(event) = failures.next().await {
                log::warn!(
                    "request failed: {:?} - {}",
                    event.request_id,
                    event.error_text
                );
            }
        }));
    }

    tasks
}

/// An exclusive browsing session bound to one pool slot.
pub struct PageSession {
    page: Page,
    base_url: Url,
    _permit: OwnedSemaphorePermit,
    log_tasks: Vec<JoinHandle<()>>,
}

impl PageSession {
    /// Navigates to a document path on the content server and waits for the
    /// load to settle.
    ///
    /// Navigation failures are logged and swallowed: a partially loaded page
    /// is still screenshotted and queried best-effort. Callers that cannot
    /// tolerate that must verify the output is non-degenerate themselves.
    ///
    /// # Errors
    ///
    /// Returns an error only if the path cannot be resolved against the
    /// content-server base URL.
    pub async fn navigate(&self, path: &str) -> Result<()> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("invalid document path '{path}'"))?;

        match timeout(NAVIGATION_TIMEOUT, self.page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                log::warn!("navigation error for {url}: {err}");
                return Ok(());
            }
            Err(_elapsed) => {
                log::warn!("navigation timeout for {url}");
                return Ok(());
            }
        }

        match timeout(NAVIGATION_TIMEOUT, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => log::warn!("load wait failed for {url}: {err}"),
            Err(_elapsed) => log::warn!("load wait timeout for {url}"),
        }
        Ok(())
    }

    /// Captures a full-page screenshot and writes it as PNG to `png_path`.
    ///
    /// Measures the document height, resizes the viewport to match, and
    /// captures at device pixel scale.
    ///
    /// # Errors
    ///
    /// Returns an error if measurement, capture, or the file write fails.
    pub async fn screenshot_to(&self, png_path: &Path) -> Result<()> {
        let total_height = self
            .page
            .evaluate("document.documentElement.scrollHeight")
            .await?
            .value()
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| anyhow!("could not measure document height"))?
            .max(1);
        log::debug!("document height: {total_height}");

        let viewport = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(VIEWPORT_WIDTH))
            .height(total_height)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|message| anyhow!("failed to build viewport params: {message}"))?;
        self.page.execute(viewport).await?;

        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .from_surface(true)
            .build();
        let response = self.page.execute(params).await?;
        let base64_str: &str = response.data.as_ref();
        let bytes = BASE64_STANDARD
            .decode(base64_str)
            .context("failed to decode base64 screenshot")?;

        if let Some(parent) = png_path.parent() {
            create_dir_all(parent)?;
        }
        write(png_path, bytes)
            .with_context(|| format!("failed to write {}", png_path.display()))?;
        Ok(())
    }

    /// Reads the rendered document's own style rules back and resolves each
    /// selector's declared properties via the computed-style API.
    ///
    /// For each selector with at least one live element, the first match's
    /// values are read for exactly the declared property names. Selectors
    /// matching zero elements are silently omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the document content or style queries fail.
    pub async fn computed_styles(&self) -> Result<ComputedStyles> {
        let markup = self.page.content().await?;
        let sheet = page_styles_from_markup(&markup)?;
        self.computed_styles_for(&sheet).await
    }

    /// [`Self::computed_styles`] against an explicit target stylesheet.
    ///
    /// # Errors
    ///
    /// Returns an error if a style query fails or returns malformed data.
    pub async fn computed_styles_for(&self, sheet: &Stylesheet) -> Result<ComputedStyles> {
        let mut computed = ComputedStyles::new();
        for rule in sheet.rules() {
            let properties: Vec<&str> = rule.property_names().collect();
            let script = computed_style_script(&rule.selector, &properties)?;
            let result = self.page.evaluate(script).await?;
            let Some(JsonValue::String(payload)) = result.value() else {
                // null: no element matched this selector.
                continue;
            };
            let values: HashMap<String, String> = serde_json::from_str(payload)
                .with_context(|| format!("bad computed styles for '{}'", rule.selector))?;
            computed.insert(rule.selector.clone(), values);
        }
        Ok(computed)
    }

    /// Closes the page. The pool slot frees when the session drops.
    ///
    /// # Errors
    ///
    /// Returns an error if the page refuses to close.
    pub async fn close(mut self) -> Result<()> {
        for task in self.log_tasks.drain(..) {
            task.abort();
        }
        self.page.clone().close().await?;
        Ok(())
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        // The permit frees with the session on every exit path; diagnostics
        // tasks must not outlive the page they watch.
        for task in &self.log_tasks {
            task.abort();
        }
    }
}

/// JavaScript that resolves the first matching element's computed values for
/// exactly the requested properties, as a JSON string, or null when no
/// element matches.
fn computed_style_script(selector: &str, properties: &[&str]) -> Result<String> {
    let selector_literal = serde_json::to_string(selector)?;
    let properties_literal = serde_json::to_string(properties)?;
    Ok(format!(
        "(() => {{\
            const el = document.querySelector({selector_literal});\
            if (!el) return null;\
            const cs = window.getComputedStyle(el);\
            const out = {{}};\
            for (const prop of {properties_literal}) {{\
                out[prop] = cs.getPropertyValue(prop);\
            }}\
            return JSON.stringify(out);\
        }})()"
    ))
}

/// Deterministic sibling path for a document's screenshot artifact.
pub fn screenshot_sibling(document_path: &Path) -> std::path::PathBuf {
    document_path.with_extension("png")
}
