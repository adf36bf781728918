use anyhow::{Result, bail};
use log::{error, info};
use render_pool::{PoolOptions, RenderPool};
use restyle::orchestrator::{EvalUnit, RunMode, UnitOutcome, run_unit};
use restyle::{Config, HttpModelClient, PageArtifacts, Settings};
use std::env;
use std::sync::Arc;

const USAGE: &str = "usage: restyle <project> <page> \
    [--variant <id>]... [--model <name>]... [--test] [--force]";

struct Options {
    project: String,
    page: String,
    variants: Vec<String>,
    models: Vec<String>,
    test: bool,
    force: bool,
}

fn parse_args(mut args: env::Args) -> Result<Options> {
    let _program = args.next();
    let mut positionals = Vec::new();
    let mut variants = Vec::new();
    let mut models = Vec::new();
    let mut test = false;
    let mut force = false;

    while let Some(arg) = args.next() {
        if arg == "--variant" {
            match args.next() {
                Some(id) => variants.push(id),
                None => bail!("--variant needs a value\n{USAGE}"),
            }
        } else if arg == "--model" {
            match args.next() {
                Some(name) => models.push(name),
                None => bail!("--model needs a value\n{USAGE}"),
            }
        } else if arg == "--test" {
            test = true;
        } else if arg == "--force" {
            force = true;
        } else if arg.starts_with("--") {
            bail!("unknown flag '{arg}'\n{USAGE}");
        } else {
            positionals.push(arg);
        }
    }

    let [project, page] = positionals.try_into().map_err(|_extra| {
        anyhow::anyhow!("expected exactly <project> and <page>\n{USAGE}")
    })?;
    if models.is_empty() {
        if !test {
            bail!("at least one --model is required outside --test mode\n{USAGE}");
        }
        models.push("oracle".to_owned());
    }

    Ok(Options {
        project,
        page,
        variants,
        models,
        test,
        force,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let options = parse_args(env::args())?;
    let settings = Settings::from_env()?;

    // Enumerate variants up front; each unit still loads its own config.
    let artifacts = PageArtifacts::new(&settings.data_dir, &options.project, &options.page);
    let config = Config::load(&artifacts.page_dir())?;
    let variant_ids: Vec<String> = if options.variants.is_empty() {
        config
            .variants
            .iter()
            .map(|variant| variant.id.clone())
            .collect()
    } else {
        options.variants.clone()
    };
    if variant_ids.is_empty() {
        bail!("config declares no variants and none were requested");
    }

    let pool = Arc::new(
        RenderPool::launch(PoolOptions {
            max_sessions: settings.max_sessions,
            base_url: settings.base_url.clone(),
        })
        .await?,
    );
    let client = Arc::new(HttpModelClient::new(&settings)?);

    let mode = if options.test {
        RunMode::SelfTest
    } else {
        RunMode::Normal {
            force: options.force,
        }
    };

    let mut tasks = Vec::new();
    for variant_id in &variant_ids {
        for model in &options.models {
            let unit = EvalUnit {
                project: options.project.clone(),
                page: options.page.clone(),
                variant_id: variant_id.clone(),
                model: model.clone(),
                mode,
            };
            let settings = settings.clone();
            let pool = Arc::clone(&pool);
            let client = Arc::clone(&client);
            tasks.push(tokio::spawn(async move {
                let outcome = run_unit(&settings, &pool, client.as_ref(), &unit).await;
                (unit, outcome)
            }));
        }
    }

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut errored = 0usize;
    for task in tasks {
        let (unit, outcome) = task.await?;
        match outcome {
            Ok(UnitOutcome::Skipped) => {
                info!("{}.{} skipped", unit.variant_id, unit.model);
            }
            Ok(UnitOutcome::Completed(verdict)) if verdict.passed => passed += 1,
            Ok(UnitOutcome::Completed(_)) => failed += 1,
            Err(err) => {
                // A unit-fatal error never aborts sibling units.
                errored += 1;
                error!(
                    "{}.{}.{} errored: {err:#}",
                    unit.project, unit.variant_id, unit.model
                );
            }
        }
    }

    info!("run complete: {passed} passed, {failed} failed, {errored} errored");

    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.shutdown().await?,
        Err(_still_shared) => error!("render pool still referenced at shutdown"),
    }

    if errored > 0 {
        bail!("{errored} evaluation unit(s) hit harness errors");
    }
    Ok(())
}
