use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::storage::SettingsStore;

/// Page agent: drives a Chrome tab and accepts style commands over HTTP.
#[derive(Debug, Clone, Parser)]
#[command(name = "agent", version)]
pub struct AgentConfig {
    /// Page to open once the browser is ready.
    #[arg(long, env = "STYLIST_URL", default_value = "about:blank")]
    pub url: String,

    /// First port tried for the control server; the next nine are fallbacks.
    #[arg(long, env = "STYLIST_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Settings file holding the persisted enabled flag.
    #[arg(long, env = "STYLIST_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// How long a notice stays on screen, in milliseconds.
    #[arg(long, env = "STYLIST_NOTICE_MS", default_value_t = 2000)]
    pub notice_ms: u64,

    /// Page event polling interval, in milliseconds.
    #[arg(long, env = "STYLIST_POLL_MS", default_value_t = 50)]
    pub poll_ms: u64,

    /// DevTools endpoint of an already running Chrome.
    #[arg(long, env = "STYLIST_CHROME_DEBUG_URL", default_value = "http://127.0.0.1:9222")]
    pub debug_url: String,

    /// Launch Chrome without a window when no running instance is found.
    #[arg(long, env = "STYLIST_HEADLESS")]
    pub headless: bool,

    /// Optional URL the web panel fetches on open (display only).
    #[arg(long, env = "STYLIST_DATA_URL")]
    pub data_url: Option<String>,
}

impl AgentConfig {
    pub fn settings_store(&self) -> SettingsStore {
        SettingsStore::new(
            self.state_file
                .clone()
                .unwrap_or_else(SettingsStore::default_path),
        )
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

/// Native control panel for a running agent.
#[derive(Debug, Clone, Parser)]
#[command(name = "element-stylist", version)]
pub struct PanelConfig {
    /// Base URL of the agent's control server.
    #[arg(long = "agent", env = "STYLIST_AGENT_URL", default_value = "http://127.0.0.1:3000")]
    pub agent_url: String,

    /// Settings file holding the persisted enabled flag.
    #[arg(long, env = "STYLIST_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Optional URL fetched once when the panel opens (display only).
    #[arg(long, env = "STYLIST_DATA_URL")]
    pub data_url: Option<String>,
}

impl PanelConfig {
    pub fn settings_store(&self) -> SettingsStore {
        SettingsStore::new(
            self.state_file
                .clone()
                .unwrap_or_else(SettingsStore::default_path),
        )
    }

    pub fn command_url(&self) -> String {
        format!("{}/command", self.agent_url.trim_end_matches('/'))
    }
}
