use crate::{OutputMode, Settings, emit_success};
use anyhow::Context;
use factsync::config::{self, FactsyncConfig};
use factsync::ui::{self, Icons, Spinner, section, success, summary_row};
use factsync::{Fact, FactId, FactsViewModel, FetchClient, Status};
use owo_colors::OwoColorize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub fn run_version(output_mode: OutputMode) -> anyhow::Result<()> {
    if output_mode.is_human() {
        ui::header(&format!(
            "{} {}",
            "factsync".bold(),
            env!("CARGO_PKG_VERSION")
        ));
    } else {
        let data = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        });
        emit_success(output_mode, "version", data)?;
    }
    Ok(())
}

pub fn run_init(output_mode: OutputMode, path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config::default_config_path);
    config::write_config(&path, &FactsyncConfig::starter(), force)?;
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    config::ensure_gitignore(root)?;

    if output_mode.is_human() {
        success(&format!("Wrote {}", path.display()));
    } else {
        emit_success(output_mode, "init", serde_json::json!({ "config": path }))?;
    }
    Ok(())
}

pub async fn run_fetch(output_mode: OutputMode, settings: &Settings) -> anyhow::Result<()> {
    let store = settings.open_store()?;
    let client = FetchClient::new(settings.config.fetch_config())?;

    let spinner = Spinner::new(&format!("Fetching facts from {}", client.config().endpoint));
    let fetched = client.fetch().await;
    spinner.finish_and_clear();
    let facts = fetched.context("fetch failed")?;

    let commit = store.append(facts.clone()).await.context("failed to store facts")?;

    if output_mode.is_human() {
        for fact in &facts {
            ui::fact_added(fact);
        }
        success(&format!("Stored {} facts", commit.affected));
    } else {
        emit_success(
            output_mode,
            "fetch",
            serde_json::json!({ "facts": facts, "revision": commit.revision }),
        )?;
    }
    Ok(())
}

pub async fn run_clear(output_mode: OutputMode, settings: &Settings) -> anyhow::Result<()> {
    let store = settings.open_store()?;
    let commit = store.delete_all().await?;

    if output_mode.is_human() {
        success(&format!("Deleted {} facts", commit.affected));
    } else {
        emit_success(output_mode, "clear", serde_json::json!({ "deleted": commit.affected }))?;
    }
    Ok(())
}

pub async fn run_delete(output_mode: OutputMode, settings: &Settings, ids: &[String]) -> anyhow::Result<()> {
    let ids = ids
        .iter()
        .map(|id| id.parse::<FactId>())
        .collect::<factsync::Result<Vec<_>>>()?;

    let store = settings.open_store()?;
    let requested = ids.len();
    let commit = store.delete_many(ids).await?;

    if output_mode.is_human() {
        success(&format!("Deleted {} of {} facts", commit.affected, requested));
    } else {
        emit_success(output_mode, "delete", serde_json::json!({ "deleted": commit.affected }))?;
    }
    Ok(())
}

pub async fn run_list(output_mode: OutputMode, settings: &Settings, table: bool) -> anyhow::Result<()> {
    let store = settings.open_store()?;
    let snapshot = store.snapshot().await?;

    if !output_mode.is_human() {
        return emit_success(output_mode, "list", serde_json::to_value(&snapshot.facts)?);
    }

    if snapshot.is_empty() {
        println!("{} No facts stored. Run `factsync fetch`.", Icons::EMPTY);
    } else if table {
        println!("{}", ui::facts_table(&snapshot.facts));
    } else {
        for (i, fact) in snapshot.facts.iter().enumerate() {
            ui::fact_line(i, fact);
        }
    }
    Ok(())
}

pub async fn run_stats(output_mode: OutputMode, settings: &Settings) -> anyhow::Result<()> {
    let store = settings.open_store()?;
    let stats = store.stats().await?;

    if output_mode.is_human() {
        println!("{} factsync statistics", Icons::STATS);
        summary_row("Database:", &settings.database.display().to_string());
        println!("{}", ui::stats_table(&stats));
    } else {
        emit_success(output_mode, "stats", serde_json::to_value(&stats)?)?;
    }
    Ok(())
}

/// Interactive list: `f` fetches, `d` deletes everything, `q` quits.
pub async fn run_watch(settings: &Settings) -> anyhow::Result<()> {
    let store = Arc::new(settings.open_store()?);
    let client = FetchClient::new(settings.config.fetch_config())?;
    let view_model = Arc::new(FactsViewModel::new(store, Arc::new(client))?);
    let mut rx = view_model.watch();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    ui::header("Watching facts");
    summary_row("Keys:", "f + Enter = fetch, d + Enter = delete all, q + Enter = quit");

    // The adapter already holds the stored list; later changes arrive on `rx`
    let initial = rx.borrow_and_update().clone();
    section(&format!("{} facts", initial.facts.len()));
    for (i, fact) in initial.facts.iter().enumerate() {
        ui::fact_line(i, fact);
    }
    let mut shown = initial.facts;
    let mut last_status = initial.status;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = rx.borrow_and_update().clone();

                let (removed, added) = fact_diff(&shown, &view.facts);
                for fact in removed {
                    ui::fact_removed(fact);
                }
                for fact in added {
                    ui::fact_added(fact);
                }
                shown = view.facts;

                if view.status != last_status {
                    match &view.status {
                        Status::Fetching => ui::info("Status", "fetching..."),
                        Status::Error(msg) => ui::error(msg),
                        Status::Disconnected => ui::warn("Store closed"),
                        Status::Idle => {}
                    }
                    last_status = view.status;
                }
                if !view.live {
                    ui::warn("Live updates stopped");
                    break;
                }
            }
            line = input.next_line() => {
                match line?.as_deref().map(str::trim) {
                    Some("f") => {
                        let vm = view_model.clone();
                        tokio::spawn(async move {
                            // Failures surface through the view state
                            let _ = vm.fetch_facts().await;
                        });
                    }
                    Some("d") => {
                        let vm = view_model.clone();
                        tokio::spawn(async move {
                            let _ = vm.delete_facts().await;
                        });
                    }
                    Some("q") | None => break,
                    Some(_) => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

/// Facts that disappeared and facts that appeared, each in list order
fn fact_diff<'a>(before: &'a [Fact], after: &'a [Fact]) -> (Vec<&'a Fact>, Vec<&'a Fact>) {
    let before_ids: HashSet<FactId> = before.iter().map(|f| f.id).collect();
    let after_ids: HashSet<FactId> = after.iter().map(|f| f.id).collect();

    let removed = before.iter().filter(|f| !after_ids.contains(&f.id)).collect();
    let added = after.iter().filter(|f| !before_ids.contains(&f.id)).collect();
    (removed, added)
}

pub async fn run_serve(settings: &Settings, bind: Option<String>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| settings.config.bind_addr());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", bind))?;

    let store = Arc::new(settings.open_store()?);
    let client = FetchClient::new(settings.config.fetch_config())?;
    let view_model = FactsViewModel::new(store, Arc::new(client))?;

    println!("{} Server running at http://{}", Icons::GLOBE, addr);
    println!("{} Database: {}", Icons::DATABASE, settings.database.display());
    factsync::server::start_server(addr, view_model).await
}
