use anyhow::{Result, anyhow};
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use element_stylist::notice::Notice;
use element_stylist::{Command, SettingsStore};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

/// Events streamed to open control panels via SSE.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentEvent {
    Notice(Notice),
    NoticeDismissed { id: u64 },
    State { enabled: bool, selected: Option<u64> },
    Ready,
}

impl AgentEvent {
    fn name(&self) -> &'static str {
        match self {
            AgentEvent::Notice(_) => "notice",
            AgentEvent::NoticeDismissed { .. } => "notice_dismissed",
            AgentEvent::State { .. } => "state",
            AgentEvent::Ready => "ready",
        }
    }

    fn to_sse_event(&self) -> Event {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Event::default().event(self.name()).data(data)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub cmd_tx: mpsc::Sender<Command>,
    pub event_tx: broadcast::Sender<AgentEvent>,
    pub store: SettingsStore,
    pub data_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsView {
    plugin_enabled: bool,
    data_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsUpdate {
    plugin_enabled: bool,
}

/// Starts the control server on the first free port in `first_port..first_port + 10`.
/// Returns the command queue consumed by the page agent and the event bus.
pub async fn start_server(
    first_port: u16,
    store: SettingsStore,
    data_url: Option<String>,
) -> Result<(mpsc::Receiver<Command>, broadcast::Sender<AgentEvent>)> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(32);
    let (event_tx, _) = broadcast::channel::<AgentEvent>(64);

    let state = Arc::new(AppState {
        cmd_tx,
        event_tx: event_tx.clone(),
        store,
        data_url,
    });

    let app = router(state);

    let mut bound = None;
    for p in first_port..first_port.saturating_add(10) {
        match tokio::net::TcpListener::bind(format!("127.0.0.1:{}", p)).await {
            Ok(l) => {
                bound = Some((l, p));
                break;
            }
            Err(_) => continue,
        }
    }
    let (listener, port) = bound.ok_or_else(|| {
        anyhow!(
            "could not bind to any port {}-{}; stop the old agent first",
            first_port,
            first_port.saturating_add(9)
        )
    })?;

    info!("control panel running at http://localhost:{}", port);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "control server stopped");
        }
    });

    Ok((cmd_rx, event_tx))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/command", post(command_handler))
        .route("/events", get(sse_handler))
        .route("/settings", get(get_settings).put(put_settings))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn command_handler(
    State(state): State<Arc<AppState>>,
    Json(command): Json<Command>,
) -> StatusCode {
    info!(?command, "POST /command");
    match state.cmd_tx.send(command).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsView> {
    let settings = state.store.load_or_default();
    Json(SettingsView {
        plugin_enabled: settings.enabled(),
        data_url: state.data_url.clone(),
    })
}

async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> StatusCode {
    match state.store.set_enabled(update.plugin_enabled) {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            warn!(error = %e, "failed to persist settings");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();
    let stream =
        BroadcastStream::new(rx).filter_map(|result: Result<AgentEvent, _>| match result {
            Ok(event) => Some(Ok::<_, Infallible>(event.to_sse_event())),
            Err(_) => None,
        });
    Sse::new(stream).keep_alive(KeepAlive::default())
}


const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Element Stylist</title>
<style>
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body {
    background: #0a0a0f;
    color: #e0e0e0;
    font-family: 'Segoe UI', system-ui, -apple-system, sans-serif;
    display: flex;
    justify-content: center;
    padding: 32px;
  }
  .panel { width: 320px; display: flex; flex-direction: column; gap: 14px; }
  h1 { font-size: 18px; font-weight: 600; color: #fff; }
  .row { display: flex; align-items: center; justify-content: space-between; gap: 12px; }
  label { font-size: 14px; }
  input, select {
    background: #111118;
    border: 1px solid #222;
    border-radius: 6px;
    padding: 6px 8px;
    color: #fff;
    font-size: 14px;
  }
  input[type=color] { padding: 0; width: 48px; height: 28px; }
  .toggle { padding: 10px 12px; border-radius: 8px; background: #0a1a0a; border-left: 3px solid #22c55e; }
  .toggle.off { background: #1a0a0a; border-left-color: #ef4444; }
  .buttons { display: flex; gap: 8px; }
  button {
    flex: 1;
    background: #6366f1;
    color: #fff;
    border: none;
    border-radius: 8px;
    padding: 10px;
    font-size: 14px;
    font-weight: 600;
    cursor: pointer;
  }
  button.reset { background: #333; }
  button:disabled { background: #222; color: #666; cursor: not-allowed; }
  .status { font-size: 13px; padding: 8px 10px; border-radius: 6px; background: #111118; }
  .status.error { color: #fca5a5; }
  .status.ok { color: #86efac; }
  #notice:empty { display: none; }
</style>
</head>
<body>
<div class="panel">
  <h1>Element Stylist</h1>
  <div class="row toggle" id="toggleRow">
    <label for="enabled">Enable style editing</label>
    <input type="checkbox" id="enabled" checked>
  </div>
  <div class="row"><label for="fontSize">Font size</label>
    <input type="number" id="fontSize" min="8" max="72" value="16"></div>
  <div class="row"><label for="color">Text color</label>
    <input type="color" id="color" value="#000000"></div>
  <div class="row"><label for="backgroundColor">Background</label>
    <input type="color" id="backgroundColor" value="#ffffff"></div>
  <div class="row"><label for="fontFamily">Font family</label>
    <select id="fontFamily">
      <option>Arial</option><option>Helvetica</option><option>Times New Roman</option>
      <option>Georgia</option><option>Verdana</option><option>Microsoft YaHei</option>
      <option>SimSun</option>
    </select></div>
  <div class="row"><label for="fontWeight">Font weight</label>
    <select id="fontWeight">
      <option value="normal">Normal</option><option value="bold">Bold</option>
      <option value="lighter">Lighter</option>
    </select></div>
  <div class="buttons">
    <button id="apply">Apply</button>
    <button id="reset" class="reset">Reset</button>
  </div>
  <div class="status" id="notice"></div>
  <div class="status" id="data" hidden></div>
</div>
<script>
  const $ = id => document.getElementById(id);
  const enabled = $('enabled');

  function send(command) {
    return fetch('/command', {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify(command),
    });
  }

  function render() {
    $('toggleRow').className = 'row toggle' + (enabled.checked ? '' : ' off');
    $('apply').disabled = !enabled.checked;
    $('reset').disabled = !enabled.checked;
  }

  function showStatus(el, cls, text) {
    el.hidden = false;
    el.className = 'status ' + cls;
    el.textContent = text;
  }

  enabled.addEventListener('change', async () => {
    render();
    await fetch('/settings', {
      method: 'PUT',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify({pluginEnabled: enabled.checked}),
    });
    send({action: 'togglePlugin', enabled: enabled.checked});
  });

  $('apply').addEventListener('click', () => {
    if (!enabled.checked) { showStatus($('notice'), 'error', 'Enable style editing first'); return; }
    send({action: 'applyStyles', styles: {
      fontSize: $('fontSize').value + 'px',
      color: $('color').value,
      backgroundColor: $('backgroundColor').value,
      fontFamily: $('fontFamily').value,
      fontWeight: $('fontWeight').value,
    }});
  });

  $('reset').addEventListener('click', () => {
    if (!enabled.checked) { showStatus($('notice'), 'error', 'Enable style editing first'); return; }
    send({action: 'resetStyles'});
  });

  const es = new EventSource('/events');
  es.addEventListener('notice', e => {
    const d = JSON.parse(e.data);
    showStatus($('notice'), d.kind === 'success' ? 'ok' : 'error', d.message);
  });
  es.addEventListener('notice_dismissed', () => { $('notice').textContent = ''; });

  (async () => {
    const settings = await (await fetch('/settings')).json();
    enabled.checked = settings.pluginEnabled;
    render();
    send({action: 'togglePlugin', enabled: settings.pluginEnabled});

    if (settings.dataUrl) {
      const data = $('data');
      showStatus(data, '', 'Loading...');
      try {
        const res = await fetch(settings.dataUrl);
        if (!res.ok) throw new Error('HTTP ' + res.status);
        await res.json();
        showStatus(data, 'ok', 'Data loaded');
      } catch (err) {
        showStatus(data, 'error', 'Error: ' + (err.message || 'request failed'));
      }
    }
  })();
</script>
</body>
</html>
"##;
