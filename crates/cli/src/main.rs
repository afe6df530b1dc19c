//! lookahead terminal front-end.
//!
//! A line-oriented search REPL over the GitHub Search API. Results are served
//! from the in-memory cache when possible; the next page is prefetched while
//! the prompt waits for input, and `:h`/`:f`/`:t` simulate hovering a page
//! link. Logging goes to stderr so it never interleaves with rendered pages.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use lookahead_client::{GithubClient, GithubConfig, validate_query};
use lookahead_core::{AppConfig, CacheStore, DebouncedValue, SearchCoordinator, SearchType, TokioScheduler};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod command;
mod render;
mod session;

use command::Command;
use session::Session;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if std::env::var_os("LOOKAHEAD_LOG_JSON").is_some() {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn prompt() -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load().context("loading configuration")?;
    let client = GithubClient::new(GithubConfig::from(&config)).context("building GitHub client")?;
    let authenticated = match config.require_github_token() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "searching anonymously");
            false
        }
    };
    let default_type = if authenticated { SearchType::Issues } else { SearchType::Repositories };
    tracing::info!(base_url = %config.api_base_url, authenticated, "starting lookahead");

    let scheduler = Arc::new(TokioScheduler::new());
    let coordinator = SearchCoordinator::new(
        CacheStore::new(config.store_options()),
        Arc::new(client),
        scheduler.clone(),
        config.prefetch_options(),
    );
    let mut session = Session::new(coordinator.clone(), default_type, config.per_page, config.window_size, authenticated);

    let input = DebouncedValue::new(scheduler.clone(), config.input_debounce());
    let mut settled = input.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("lookahead: searching {default_type}; type a query or ? for help");
    prompt()?;

    loop {
        scheduler.notify_idle();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match command::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Query(query))) => match validate_query(&query) {
                        Ok(()) => input.set(query),
                        Err(e) => println!("{e}"),
                    },
                    Ok(Some(cmd)) => println!("{}", session.execute(cmd).await),
                    Err(e) => println!("{e}"),
                }
                if !input.is_pending() {
                    prompt()?;
                }
            }
            changed = settled.changed() => {
                if changed.is_err() {
                    break;
                }
                let query = settled.borrow_and_update().clone();
                if let Some(query) = query {
                    println!();
                    println!("{}", session.search(query).await);
                    tracing::debug!(params = ?session.params(), "search settled");
                    prompt()?;
                }
            }
        }
    }

    coordinator.teardown();
    tracing::debug!(outstanding = scheduler.outstanding(), "shutting down");
    Ok(())
}
