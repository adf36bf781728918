//! The evaluation state machine for one (project, page, variant, model) unit.
//!
//! Init → SkipCheck → BuildCandidate → InvokeModel → ValidateStructure →
//! RenderCorrected → JudgeCoverage → JudgeValues → Done. Every terminal
//! state persists a typed verdict; intermediate artifacts (corrupted markup,
//! corrected markup, raw model response, the prompt payload) are persisted
//! for offline inspection regardless of outcome.

use crate::artifacts::PageArtifacts;
use crate::config::Config;
use crate::judge::{judge_coverage, judge_values};
use crate::model::{ModelClient, ModelResponse};
use crate::prompt::{build_request, request_to_html};
use crate::settings::Settings;
use crate::verdict::{ErrorCode, Verdict};
use anyhow::{Context as _, Result, anyhow};
use render_pool::{ComputedStyles, RenderPool, screenshot_sibling};
use std::fs::{create_dir_all, read_to_string, write};
use std::path::Path;
use style_model::{Stylesheet, apply_changes, inline_global_css, splice_page_styles};

/// How a unit invokes the model collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Call the external collaborator; honor previously persisted verdicts.
    Normal {
        /// Re-run even when a final verdict exists.
        force: bool,
    },
    /// Bypass the collaborator with the config's oracle stylesheet.
    /// Always re-runs.
    SelfTest,
}

/// One evaluation unit.
#[derive(Clone, Debug)]
pub struct EvalUnit {
    pub project: String,
    pub page: String,
    pub variant_id: String,
    pub model: String,
    pub mode: RunMode,
}

impl EvalUnit {
    fn label(&self) -> String {
        format!("{}.{}.{}", self.project, self.page, self.variant_id)
    }
}

/// Terminal outcome of driving a unit.
#[derive(Clone, Debug)]
pub enum UnitOutcome {
    /// A final verdict already existed; nothing was invoked.
    Skipped,
    /// The unit ran to a verdict, now persisted.
    Completed(Verdict),
}

/// Drives one unit through the full state machine.
///
/// # Errors
///
/// Returns an error for harness misconfiguration: config validation
/// failures, an unknown variant id, missing artifacts, or rendering
/// infrastructure faults. Model-under-test failures are not errors; they
/// come back as failed verdicts.
pub async fn run_unit<C: ModelClient>(
    settings: &Settings,
    pool: &RenderPool,
    client: &C,
    unit: &EvalUnit,
) -> Result<UnitOutcome> {
    let artifacts = PageArtifacts::new(&settings.data_dir, &unit.project, &unit.page);

    // Init: load config and resolve the variant. Failure here is fatal to
    // the unit and persists nothing.
    let config = Config::load(&artifacts.page_dir())?;
    let variant = config
        .variant(&unit.variant_id)
        .ok_or_else(|| anyhow!("variant '{}' not found in config", unit.variant_id))?;

    // SkipCheck: a persisted final verdict stands unless force is on.
    let result_path = artifacts.result_json(&unit.variant_id, &unit.model);
    let force = matches!(unit.mode, RunMode::SelfTest | RunMode::Normal { force: true });
    if verdict_stands(&result_path, force) {
        log::info!("[eval] {} - verdict already exists, skipping", unit.label());
        return Ok(UnitOutcome::Skipped);
    }

    // BuildCandidate: corrupted page plus the cached reference artifacts.
    let template = read_to_string(artifacts.page_dir().join("page.html"))
        .context("failed to read page template")?;
    let global_css = read_to_string(artifacts.global_css()).ok();

    let reference_markup =
        page_markup(&template, &config.correct_css, global_css.as_deref())?;
    ensure_document(&artifacts.reference_html(), &reference_markup)?;
    ensure_screenshot(pool, &artifacts, &artifacts.reference_html()).await?;

    let corrupted_css = apply_changes(&config.correct_css, &[&variant.css_changes]);
    let corrupted_markup = page_markup(&template, &corrupted_css, global_css.as_deref())?;
    let variant_html = artifacts.variant_html(&unit.variant_id);
    ensure_document(&variant_html, &corrupted_markup)?;
    ensure_screenshot(pool, &artifacts, &variant_html).await?;

    // InvokeModel, or synthesize the oracle response in self-test mode.
    let response = match unit.mode {
        RunMode::SelfTest => oracle_response(&config, variant.css_changes.pairs())?,
        RunMode::Normal { .. } => {
            let request = build_request(
                &corrupted_markup,
                &artifacts.variant_png(&unit.variant_id),
                &artifacts.reference_png(),
                variant.css_changes.pair_count(),
            )?;
            write_artifact(
                &artifacts.prompt_html(&unit.variant_id),
                &request_to_html(&request),
            )?;

            match client.complete(&unit.model, &request).await {
                Ok(response) => response,
                Err(failure) => {
                    let verdict = Verdict::failed(
                        ErrorCode::Transport,
                        format!("{}: {}", failure.kind.as_str(), failure.message),
                    );
                    return finish(unit, &result_path, verdict);
                }
            }
        }
    };

    write_artifact(
        &artifacts.response_json(&unit.variant_id, &unit.model),
        &serde_json::to_string_pretty(&response)?,
    )?;

    // ValidateStructure: the fix must be a legal change set.
    if let Err(violation) = config.verify_changes(&response.css_changes) {
        let verdict = Verdict::failed(ErrorCode::InvalidCssChanges, violation.to_string());
        return finish(unit, &result_path, verdict);
    }

    // RenderCorrected: fix layer applied last, so it can override the
    // corruption but never remove declarations.
    let corrected_css = apply_changes(
        &config.correct_css,
        &[&variant.css_changes, &response.css_changes],
    );
    let corrected_markup = page_markup(&template, &corrected_css, global_css.as_deref())?;
    let corrected_html = artifacts.corrected_html(&unit.variant_id, &unit.model);
    write_artifact(&corrected_html, &corrected_markup)?;
    render_screenshot(pool, &artifacts, &corrected_html).await?;

    // Grading is scoped to the declarations the variant corrupted.
    let reference_computed =
        computed_for(pool, &artifacts, &artifacts.reference_html(), &variant.css_changes)
            .await?;
    let corrected_computed =
        computed_for(pool, &artifacts, &corrected_html, &variant.css_changes).await?;

    // JudgeCoverage, then JudgeValues; first violation wins.
    let verdict = judge_coverage(&variant.css_changes, &response.css_changes)
        .or_else(|| {
            judge_values(
                &response.css_changes,
                &reference_computed,
                &corrected_computed,
            )
        })
        .unwrap_or_else(Verdict::passed);

    finish(unit, &result_path, verdict)
}

/// Splices a concrete stylesheet into the template and inlines the shared
/// stylesheet so the document renders without external style fetches.
fn page_markup(
    template: &str,
    sheet: &Stylesheet,
    global_css: Option<&str>,
) -> Result<String> {
    let spliced = splice_page_styles(template, sheet)?;
    Ok(match global_css {
        Some(css) => inline_global_css(&spliced, css),
        None => spliced,
    })
}

/// Synthesizes the self-test response: the oracle stylesheet restricted to
/// exactly the corrupted (selector, property) pairs.
fn oracle_response(config: &Config, pairs: Vec<(String, String)>) -> Result<ModelResponse> {
    let oracle = config
        .oracle_css
        .as_ref()
        .ok_or_else(|| anyhow!("config has no oracle stylesheet, cannot run self-test"))?;

    let mut css_changes = Stylesheet::new();
    for (selector, property) in pairs {
        if let Some(value) = oracle.get(&selector, &property) {
            css_changes.set(&selector, &property, value);
        }
    }

    Ok(ModelResponse {
        reasoning: "oracle self-test response".to_owned(),
        css_changes,
    })
}

/// Whether a previously persisted verdict makes this unit a no-op.
///
/// Every persisted verdict is final except a transport failure; forcing
/// re-runs everything. A missing or corrupt verdict file never stands.
fn verdict_stands(result_path: &Path, force: bool) -> bool {
    if force {
        return false;
    }
    Verdict::load(result_path).is_some_and(|existing| existing.is_final())
}

fn finish(unit: &EvalUnit, result_path: &Path, verdict: Verdict) -> Result<UnitOutcome> {
    verdict.save(result_path)?;
    log::info!(
        "[eval] {} - finished, correct: {}, error: {:?}",
        unit.label(),
        verdict.passed,
        verdict.error_code,
    );
    Ok(UnitOutcome::Completed(verdict))
}

/// Writes a generated document only when it does not exist yet, keeping
/// reruns byte-stable.
fn ensure_document(path: &Path, markup: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    write_artifact(path, markup)
}

fn write_artifact(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Renders `document`'s screenshot at its sibling path unless already there.
async fn ensure_screenshot(
    pool: &RenderPool,
    artifacts: &PageArtifacts,
    document: &Path,
) -> Result<()> {
    if screenshot_sibling(document).exists() {
        return Ok(());
    }
    render_screenshot(pool, artifacts, document).await
}

async fn render_screenshot(
    pool: &RenderPool,
    artifacts: &PageArtifacts,
    document: &Path,
) -> Result<()> {
    let session = pool.session().await?;
    session.navigate(&artifacts.server_path(document)).await?;
    let rendered = session.screenshot_to(&screenshot_sibling(document)).await;
    session.close().await?;
    rendered
}

/// Reads computed values for the selectors/properties in `target` from a
/// freshly rendered `document`.
async fn computed_for(
    pool: &RenderPool,
    artifacts: &PageArtifacts,
    document: &Path,
    target: &Stylesheet,
) -> Result<ComputedStyles> {
    let session = pool.session().await?;
    session.navigate(&artifacts.server_path(document)).await?;
    let computed = session.computed_styles_for(target).await;
    session.close().await?;
    computed
}
