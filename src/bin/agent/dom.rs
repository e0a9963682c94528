use element_stylist::notice::{Notice, NoticeSink};
use element_stylist::{AgentState, Dom, DomError, Marker, NodeId, PageEvent, StyleProperty};
use headless_chrome::Tab;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::face::AgentEvent;

/// JavaScript installed into the inspected page.
///
/// The hook:
///   1. Gives every element a pointer event lands on a numeric id, which is
///      the `NodeId` the agent sees. Ids live in a `WeakMap` on the element
///      side and a `WeakRef` table on the id side, so clones made by the page
///      never share an id. Numbering starts at `__NEXT_ID__`, which the agent
///      carries over from the previous document.
///   2. Queues hover / hoverExit / click records for the agent to drain.
///   3. While `intercept` is set, cancels clicks in the capture phase so the
///      page never sees them (this has to happen synchronously, in-page).
///   4. Adds the stylesheet that draws hover and selection outlines from the
///      `data-style-agent-mark` attribute.
///
/// Evaluates to `true` if the hook was already present.
const HOOK_JS: &str = r#"
(() => {
  if (window.__styleAgent) return true;
  const MARK = 'data-style-agent-mark';
  const hook = { nextId: __NEXT_ID__, queue: [], intercept: false };
  const ids = new WeakMap();
  const refs = new Map();

  const css = document.createElement('style');
  css.id = '__style-agent-css';
  css.textContent =
    '[' + MARK + '="hover"]{outline:2px solid #4CAF50 !important;cursor:pointer !important}' +
    '[' + MARK + '="selected"]{outline:3px solid #ff6b6b !important}';
  (document.head || document.documentElement).appendChild(css);

  function idOf(el) {
    let id = ids.get(el);
    if (id === undefined) {
      id = hook.nextId++;
      ids.set(el, id);
      refs.set(id, new WeakRef(el));
    }
    return id;
  }
  function record(kind, e) {
    if (e.target instanceof Element) hook.queue.push({ kind, id: idOf(e.target) });
  }

  document.addEventListener('mouseover', e => record('hover', e), true);
  document.addEventListener('mouseout', e => record('hoverExit', e), true);
  document.addEventListener('click', e => {
    if (hook.intercept) {
      e.preventDefault();
      e.stopImmediatePropagation();
    }
    record('click', e);
  }, true);

  hook.find = id => {
    const ref = refs.get(id);
    const el = ref && ref.deref();
    if (!el) {
      refs.delete(id);
      return null;
    }
    return el.isConnected ? el : null;
  };
  hook.idOf = el => ids.get(el);
  window.__styleAgent = hook;
  return false;
})()
"#;

const DRAIN_JS: &str =
    "JSON.stringify(window.__styleAgent ? window.__styleAgent.queue.splice(0) : null)";

/// Marked elements the hook knows about. A mark copied onto a clone has no
/// id, so it is stripped here.
const MARKED_JS: &str = r#"
JSON.stringify([...document.querySelectorAll('[data-style-agent-mark]')]
  .map(el => {
    const id = window.__styleAgent && window.__styleAgent.idOf(el);
    if (id === undefined) el.removeAttribute('data-style-agent-mark');
    return id;
  })
  .filter(id => id !== undefined))
"#;

fn hook_script(next_id: u64) -> String {
    HOOK_JS.replace("__NEXT_ID__", &next_id.to_string())
}

/// `Dom` backed by a live Chrome tab over the DevTools protocol.
pub struct ChromeDom {
    tab: Arc<Tab>,
    intercept: bool,
    /// Bumped on every hook install; each install means a fresh document.
    document: u64,
    /// First id the next hook install hands out.
    next_id: u64,
}

impl ChromeDom {
    pub fn attach(tab: Arc<Tab>, intercept: bool) -> Result<Self, DomError> {
        let mut dom = Self {
            tab,
            intercept,
            document: 0,
            next_id: 1,
        };
        dom.ensure_hook()?;
        Ok(dom)
    }

    /// Installs the page hook if a navigation wiped it, then re-applies the
    /// interception flag.
    fn ensure_hook(&mut self) -> Result<(), DomError> {
        let present = self
            .eval(&hook_script(self.next_id))?
            .as_bool()
            .unwrap_or(false);
        if !present {
            self.document += 1;
            info!(document = self.document, first_id = self.next_id, "page hook installed");
            self.sync_intercept()?;
        }
        Ok(())
    }

    fn sync_intercept(&self) -> Result<(), DomError> {
        self.eval(&format!(
            "window.__styleAgent && (window.__styleAgent.intercept = {})",
            self.intercept
        ))?;
        Ok(())
    }

    /// Pointer events recorded since the last call, oldest first.
    pub fn drain_events(&mut self) -> Result<Vec<PageEvent>, DomError> {
        let raw = self.eval(DRAIN_JS)?;
        let queued: Option<Vec<PageEvent>> = match raw.as_str() {
            Some(json) => serde_json::from_str(json).map_err(|e| DomError::Backend(e.to_string()))?,
            None => None,
        };
        match queued {
            Some(events) => {
                if let Some(max) = events.iter().map(|e| e.node().0).max() {
                    self.next_id = self.next_id.max(max + 1);
                }
                Ok(events)
            }
            None => {
                // The page navigated and took the hook with it.
                self.ensure_hook()?;
                Ok(Vec::new())
            }
        }
    }

    fn eval(&self, js: &str) -> Result<serde_json::Value, DomError> {
        let result = self
            .tab
            .evaluate(js, false)
            .map_err(|e| DomError::Backend(e.to_string()))?;
        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    /// Evaluates `body` with `el` bound to the node, or yields `Detached`.
    fn with_node(&self, node: NodeId, body: &str) -> Result<serde_json::Value, DomError> {
        // Objects do not come back by value, so the result travels as JSON text.
        let js = format!(
            "(() => {{ const el = window.__styleAgent && window.__styleAgent.find({id}); \
             if (!el) return JSON.stringify({{ detached: true }}); \
             return JSON.stringify({{ value: ({body}) }}); }})()",
            id = node.0,
        );
        let raw = self.eval(&js)?;
        let result: serde_json::Value = match raw.as_str() {
            Some(json) => serde_json::from_str(json).map_err(|e| DomError::Backend(e.to_string()))?,
            None => serde_json::Value::Null,
        };
        if result.get("detached").and_then(|v| v.as_bool()) == Some(true) {
            return Err(DomError::Detached(node));
        }
        Ok(result.get("value").cloned().unwrap_or(serde_json::Value::Null))
    }
}

impl Dom for ChromeDom {
    fn is_attached(&self, node: NodeId) -> bool {
        self.with_node(node, "true").is_ok()
    }

    fn is_root(&self, node: NodeId) -> bool {
        self.with_node(node, "el === document.documentElement || el === document.body")
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn inline_style(&self, node: NodeId, property: StyleProperty) -> Result<String, DomError> {
        let value = self.with_node(node, &format!("el.style.{}", property.js_name()))?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn set_inline_style(
        &mut self,
        node: NodeId,
        property: StyleProperty,
        value: &str,
    ) -> Result<(), DomError> {
        let literal = serde_json::json!(value);
        self.with_node(
            node,
            &format!("el.style.{} = {}", property.js_name(), literal),
        )?;
        Ok(())
    }

    fn set_marker(&mut self, node: NodeId, marker: Marker) -> Result<(), DomError> {
        self.with_node(
            node,
            &format!("el.setAttribute('data-style-agent-mark', '{}')", marker.as_str()),
        )?;
        Ok(())
    }

    fn clear_marker(&mut self, node: NodeId) -> Result<(), DomError> {
        self.with_node(node, "el.removeAttribute('data-style-agent-mark')")?;
        Ok(())
    }

    fn marked(&self) -> Result<Vec<NodeId>, DomError> {
        let raw = self.eval(MARKED_JS)?;
        let ids: Vec<u64> = match raw.as_str() {
            Some(json) => serde_json::from_str(json).map_err(|e| DomError::Backend(e.to_string()))?,
            None => Vec::new(),
        };
        Ok(ids.into_iter().map(NodeId).collect())
    }

    fn document(&self) -> u64 {
        self.document
    }

    fn set_click_interception(&mut self, enabled: bool) -> Result<(), DomError> {
        self.intercept = enabled;
        self.sync_intercept()
    }
}

/// Renders notices as a fixed overlay in the page and mirrors them to the
/// control server's event stream.
pub struct ChromeNoticeSink {
    tab: Arc<Tab>,
    events: broadcast::Sender<AgentEvent>,
}

impl ChromeNoticeSink {
    pub fn new(tab: Arc<Tab>, events: broadcast::Sender<AgentEvent>) -> Self {
        Self { tab, events }
    }

    fn eval(&self, js: &str) {
        if let Err(e) = self.tab.evaluate(js, false) {
            warn!(error = %e, "notice overlay update failed");
        }
    }
}

impl NoticeSink for ChromeNoticeSink {
    fn show(&self, notice: &Notice) {
        let js = format!(
            r#"(() => {{
  const old = document.getElementById('__style-agent-notice');
  if (old) old.remove();
  const n = document.createElement('div');
  n.id = '__style-agent-notice';
  n.dataset.noticeId = '{id}';
  n.textContent = {message};
  n.style.cssText = 'position:fixed;top:20px;right:20px;background:{color};color:white;' +
    'padding:10px 20px;border-radius:5px;z-index:2147483647;font-size:14px;font-family:sans-serif';
  (document.body || document.documentElement).appendChild(n);
}})()"#,
            id = notice.id,
            message = serde_json::json!(notice.message),
            color = notice.kind.color(),
        );
        self.eval(&js);
        let _ = self.events.send(AgentEvent::Notice(notice.clone()));
    }

    fn dismiss(&self, id: u64) {
        debug!(id, "dismissing notice");
        self.eval(&format!(
            "(() => {{ const n = document.getElementById('__style-agent-notice'); \
             if (n && n.dataset.noticeId === '{id}') n.remove(); }})()"
        ));
        let _ = self.events.send(AgentEvent::NoticeDismissed { id });
    }
}

/// Summary pushed to panels after each state change.
pub fn describe(state: &AgentState) -> AgentEvent {
    AgentEvent::State {
        enabled: state.is_enabled(),
        selected: state.selection().map(|s| s.node.0),
    }
}
