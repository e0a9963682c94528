mod dom;
mod face;
mod hands;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use element_stylist::config::AgentConfig;
use element_stylist::{Command, Notifier, PageAgent};
use face::AgentEvent;
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    element_stylist::init_tracing();

    let config = AgentConfig::parse();
    let store = config.settings_store();
    let enabled = store.load_or_default().enabled();
    info!(enabled, path = %store.path().display(), "loaded persisted flag");

    // 1. Control server first so a panel can connect while Chrome starts
    let (cmd_rx, event_tx) =
        face::start_server(config.port, store, config.data_url.clone()).await?;

    // 2. Browser launch blocks on process startup
    info!("launching Chrome");
    let launch_config = config.clone();
    let session = tokio::task::spawn_blocking(move || {
        let session =
            hands::BrowserSession::launch(&launch_config.debug_url, launch_config.headless)?;
        if launch_config.url != "about:blank" {
            session.open(&launch_config.url)?;
        }
        Ok::<_, anyhow::Error>(session)
    })
    .await
    .map_err(|e| anyhow::anyhow!("browser launch panicked: {}", e))??;

    // 3. The agent owns the tab for the rest of the process
    let runtime = tokio::runtime::Handle::current();
    tokio::task::spawn_blocking(move || run_agent(session, cmd_rx, event_tx, enabled, runtime, config))
        .await
        .map_err(|e| anyhow::anyhow!("page agent panicked: {}", e))?
}

/// Single-threaded agent loop: page events, then queued commands, then sleep.
fn run_agent(
    session: hands::BrowserSession,
    mut cmd_rx: mpsc::Receiver<Command>,
    events: broadcast::Sender<AgentEvent>,
    enabled: bool,
    runtime: tokio::runtime::Handle,
    config: AgentConfig,
) -> Result<()> {
    let chrome = dom::ChromeDom::attach(session.tab.clone(), enabled)
        .context("installing page hook")?;
    let sink = Arc::new(dom::ChromeNoticeSink::new(session.tab.clone(), events.clone()));
    let notifier = Notifier::new(sink, runtime, config.notice_ttl());
    let mut agent = PageAgent::new(chrome, notifier, enabled);

    let _ = events.send(AgentEvent::Ready);
    info!("page agent ready");

    loop {
        // Page events first: they were recorded before any command read below.
        let page_events = agent.dom_mut().drain_events().unwrap_or_else(|e| {
            warn!(error = %e, "could not read page events");
            Vec::new()
        });

        let mut commands = Vec::new();
        loop {
            match cmd_rx.try_recv() {
                Ok(command) => commands.push(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("control server gone, stopping agent");
                    return Ok(());
                }
            }
        }

        let changed = agent.step(page_events, commands);
        if changed {
            let _ = events.send(dom::describe(agent.state()));
        }

        std::thread::sleep(config.poll_interval());
    }
}
