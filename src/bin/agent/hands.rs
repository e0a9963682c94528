use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Browser the agent inspects. Created once and reused for the process lifetime.
pub struct BrowserSession {
    _browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(debug_url: &str, headless: bool) -> Result<Self> {
        // 1. Attach to a Chrome the user already has open
        info!(%debug_url, "attempting to attach to running Chrome");
        if let Ok(browser) = Browser::connect(debug_url.to_string()) {
            info!("attached to existing Chrome");

            let existing = {
                let tabs_lock = browser.get_tabs();
                let tabs = tabs_lock
                    .lock()
                    .map_err(|_| anyhow::anyhow!("browser tab list lock poisoned"))?;
                tabs.first().cloned()
            };
            let tab = match existing {
                Some(t) => {
                    info!("using existing tab");
                    t
                }
                None => {
                    info!("no tabs found, creating one");
                    browser.new_tab()?
                }
            };

            return Ok(Self {
                _browser: browser,
                tab,
            });
        }

        warn!("could not attach, launching a dedicated profile");

        let chrome_path = find_chrome()?;
        let profile = profile_dir();
        std::fs::create_dir_all(&profile)
            .with_context(|| format!("creating profile dir {}", profile.display()))?;

        let options = LaunchOptions {
            headless,
            path: Some(chrome_path),
            user_data_dir: Some(profile),
            args: vec![
                std::ffi::OsStr::new("--no-first-run"),
                std::ffi::OsStr::new("--no-default-browser-check"),
                std::ffi::OsStr::new("--disable-infobars"),
                std::ffi::OsStr::new("--password-store=basic"),
            ],
            // The user may leave the page idle for a long time between edits.
            idle_browser_timeout: std::time::Duration::from_secs(60 * 60),
            ..Default::default()
        };

        info!("starting Chrome");
        let browser = Browser::new(options).context("browser launch failed")?;
        let tab = browser.new_tab()?;

        info!("Chrome ready");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    pub fn open(&self, url: &str) -> Result<()> {
        info!(%url, "opening page");
        self.tab.navigate_to(url)?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }
}

fn profile_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("element-stylist"))
        .unwrap_or_default()
        .join("chrome-profile")
}

fn find_chrome() -> Result<PathBuf> {
    let candidates = [
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    for path in &candidates {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    headless_chrome::browser::default_executable().map_err(|e| {
        anyhow::anyhow!("Chrome executable not found ({e}). Please ensure Google Chrome is installed.")
    })
}
