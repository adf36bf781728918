//! End-to-end self-test: corrupt a page, synthesize the oracle fix, render
//! both pages in Chrome, and judge computed values.
//!
//! Needs a local Chrome install, so these run with `cargo test -- --ignored`.
//! Documents are served over `file://`, which the launch flags permit.

use render_pool::{PoolOptions, RenderPool};
use restyle::model::{FailureKind, ModelClient, ModelFailure, ModelOutcome};
use restyle::orchestrator::{EvalUnit, RunMode, UnitOutcome, run_unit};
use restyle::prompt::ModelRequest;
use restyle::{Settings, Verdict};
use std::fs::{create_dir_all, write};
use std::path::Path;
use std::time::Duration;
use url::Url;

const PAGE_MARKUP: &str = r#"<!DOCTYPE html>
<html>
<head>
    <style id="page-styles">
.title { color: blue; font-size: 16px; }
    </style>
</head>
<body>
    <h1 class="title">Welcome</h1>
</body>
</html>"#;

const SIDECAR: &str = r#"{
    "variants": [
        {"id": "wrong-color", "css_changes": {".title": {"color": "red"}}}
    ],
    "oracle_css": {".title": {"color": "blue", "font-size": "16px"}}
}"#;

/// Self-test mode never touches the collaborator; this client proves it.
struct UnreachableClient;

impl ModelClient for UnreachableClient {
    async fn complete(&self, _model: &str, _request: &ModelRequest) -> ModelOutcome {
        Err(ModelFailure {
            kind: FailureKind::ApiError,
            message: "self-test must not invoke the model collaborator".to_owned(),
        })
    }
}

fn settings_for(data_dir: &Path) -> Settings {
    Settings {
        data_dir: data_dir.to_owned(),
        base_url: Url::from_directory_path(data_dir).expect("absolute data dir"),
        max_sessions: 2,
        api_base: Url::parse("http://localhost:1/").expect("url"),
        api_key: None,
        model_timeout: Duration::from_secs(1),
        max_retries: 0,
        retry_delay: Duration::from_secs(0),
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Chrome install"]
async fn oracle_fix_passes_end_to_end() {
    let root = tempfile::tempdir().expect("tempdir");
    let page_dir = root.path().join("demo/pages/landing");
    create_dir_all(&page_dir).expect("page dir");
    write(page_dir.join("page.html"), PAGE_MARKUP).expect("page.html");
    write(page_dir.join("config.json"), SIDECAR).expect("config.json");

    let settings = settings_for(root.path());
    let pool = RenderPool::launch(PoolOptions {
        max_sessions: settings.max_sessions,
        base_url: settings.base_url.clone(),
    })
    .await
    .expect("chrome launches");

    let unit = EvalUnit {
        project: "demo".to_owned(),
        page: "landing".to_owned(),
        variant_id: "wrong-color".to_owned(),
        model: "oracle".to_owned(),
        mode: RunMode::SelfTest,
    };

    let outcome = run_unit(&settings, &pool, &UnreachableClient, &unit)
        .await
        .expect("unit completes");
    let UnitOutcome::Completed(verdict) = outcome else {
        panic!("self-test mode must never skip");
    };
    assert!(
        verdict.passed,
        "oracle fix must pass: {:?} {:?}",
        verdict.error_code, verdict.error_details
    );

    // The verdict and every inspection artifact are on disk.
    let generated = page_dir.join("generated");
    assert!(generated.join("reference.html").exists());
    assert!(generated.join("reference.png").exists());
    assert!(generated.join("wrong-color/page.html").exists());
    assert!(generated.join("wrong-color/page.png").exists());
    assert!(generated.join("wrong-color/oracle/response.json").exists());
    assert!(generated.join("wrong-color/oracle/page.png").exists());
    let saved = Verdict::load(&generated.join("wrong-color/oracle/result.json"))
        .expect("verdict persisted");
    assert!(saved.passed);

    // The rendered reference resolves the authored color.
    let session = pool.session().await.expect("session");
    session
        .navigate("demo/pages/landing/generated/reference.html")
        .await
        .expect("navigates");
    let computed = session.computed_styles().await.expect("computed styles");
    session.close().await.expect("closes");
    let title = computed.get(".title").expect(".title has a live element");
    assert_eq!(title.get("color").map(String::as_str), Some("rgb(0, 0, 255)"));

    pool.shutdown().await.expect("pool shuts down");
}
