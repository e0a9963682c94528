use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dom::{Dom, DomError};
use crate::notice::Notifier;
use crate::types::{Command, Marker, NodeId, PageEvent, StyleProperty, StylePayload};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("style editing is disabled")]
    NotEnabled,

    #[error("select an element on the page first")]
    NoSelection,

    #[error("the selected element {0} is no longer on the page")]
    StaleTarget(NodeId),

    #[error(transparent)]
    Dom(DomError),
}

impl From<DomError> for AgentError {
    fn from(err: DomError) -> Self {
        match err {
            DomError::Detached(node) => AgentError::StaleTarget(node),
            other => AgentError::Dom(other),
        }
    }
}

/// Inline values of the tracked properties, captured when an element is selected.
pub type StyleSnapshot = BTreeMap<StyleProperty, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub node: NodeId,
    /// The `Dom::document` the node id was issued in.
    pub document: u64,
    pub snapshot: StyleSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    Disabled,
    EnabledNoSelection,
    EnabledWithSelection(Selection),
}

impl AgentState {
    pub fn initial(enabled: bool) -> Self {
        if enabled {
            AgentState::EnabledNoSelection
        } else {
            AgentState::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, AgentState::Disabled)
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            AgentState::EnabledWithSelection(selection) => Some(selection),
            _ => None,
        }
    }
}

/// What the host should do with the click that reached `on_click`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickDisposition {
    /// Cancel the default action and stop propagation.
    Suppress,
    /// Let the page handle the click normally.
    PassThrough,
}

/// Selection and style-mutation state machine for one inspected page.
pub struct PageAgent<D: Dom> {
    dom: D,
    notifier: Notifier,
    state: AgentState,
    hovered: Option<(NodeId, u64)>,
}

impl<D: Dom> PageAgent<D> {
    /// Builds an agent whose initial state follows the persisted enabled flag.
    pub fn new(mut dom: D, notifier: Notifier, enabled: bool) -> Self {
        if let Err(e) = dom.set_click_interception(enabled) {
            warn!(error = %e, "failed to sync click interception");
        }
        Self {
            dom,
            notifier,
            state: AgentState::initial(enabled),
            hovered: None,
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn hovered(&self) -> Option<NodeId> {
        let document = self.dom.document();
        self.hovered
            .filter(|(_, doc)| *doc == document)
            .map(|(node, _)| node)
    }

    /// One poll tick: page events recorded so far are routed before the
    /// commands, since they happened before the commands were read.
    /// Returns true if anything was processed.
    pub fn step(
        &mut self,
        page_events: impl IntoIterator<Item = PageEvent>,
        commands: impl IntoIterator<Item = Command>,
    ) -> bool {
        let mut changed = false;
        for event in page_events {
            self.dispatch(event);
            changed = true;
        }
        for command in commands {
            self.handle(command);
            changed = true;
        }
        changed
    }

    /// Runs one control-surface command. Failures are already shown as notices.
    pub fn handle(&mut self, command: Command) {
        info!(?command, "received command");
        let result = match command {
            Command::TogglePlugin { enabled } => {
                self.toggle(enabled);
                Ok(())
            }
            Command::ApplyStyles { styles } => self.apply(&styles),
            Command::ResetStyles => self.reset(),
        };
        if let Err(e) = result {
            warn!(error = %e, "command rejected");
        }
    }

    /// Routes a pointer event recorded in the page.
    pub fn dispatch(&mut self, event: PageEvent) {
        debug!(?event, "page event");
        match event {
            PageEvent::Hover(node) => self.on_hover(node),
            PageEvent::HoverExit(node) => self.on_hover_exit(node),
            PageEvent::Click(node) => {
                self.on_click(node);
            }
        }
    }

    pub fn toggle(&mut self, enabled: bool) {
        if enabled {
            if !self.state.is_enabled() {
                self.state = AgentState::EnabledNoSelection;
            }
        } else {
            self.clear_all_markers();
            self.state = AgentState::Disabled;
            self.hovered = None;
        }

        if let Err(e) = self.dom.set_click_interception(enabled) {
            warn!(error = %e, "failed to sync click interception");
        }

        info!(enabled, "style editing toggled");
        self.notifier.success(if enabled {
            "Style editing enabled"
        } else {
            "Style editing disabled"
        });
    }

    pub fn apply(&mut self, styles: &StylePayload) -> Result<(), AgentError> {
        let result = self.try_apply(styles);
        match &result {
            Ok(()) => {
                self.notifier.success("Styles applied");
            }
            Err(e) => self.reject(e),
        }
        result
    }

    pub fn reset(&mut self) -> Result<(), AgentError> {
        let result = self.try_reset();
        match &result {
            Ok(()) => {
                self.notifier.success("Styles reset");
            }
            Err(e) => self.reject(e),
        }
        result
    }

    pub fn on_hover(&mut self, target: NodeId) {
        if !self.state.is_enabled() || self.dom.is_root(target) {
            return;
        }
        let selected = self.selected_node();
        let previous = self.hovered();
        self.hovered = None;
        if let Some(previous) = previous {
            if previous != target && Some(previous) != selected {
                // The previous element may have been removed by the page.
                let _ = self.dom.clear_marker(previous);
            }
        }
        if Some(target) == selected {
            return;
        }
        match self.dom.set_marker(target, Marker::Hover) {
            Ok(()) => self.hovered = Some((target, self.dom.document())),
            Err(e) => debug!(node = %target, error = %e, "hover ignored"),
        }
    }

    pub fn on_hover_exit(&mut self, target: NodeId) {
        if !self.state.is_enabled() || self.dom.is_root(target) {
            return;
        }
        if self.hovered() == Some(target) {
            self.hovered = None;
        }
        if Some(target) == self.selected_node() {
            return;
        }
        if let Err(e) = self.dom.clear_marker(target) {
            debug!(node = %target, error = %e, "hover exit ignored");
        }
    }

    pub fn on_click(&mut self, target: NodeId) -> ClickDisposition {
        if !self.state.is_enabled() {
            return ClickDisposition::PassThrough;
        }

        if let Some(previous) = self.selected_node() {
            if previous != target {
                let _ = self.dom.clear_marker(previous);
            }
        }

        match self.select(target) {
            Ok(selection) => {
                info!(node = %target, "element selected");
                if self.hovered() == Some(target) {
                    self.hovered = None;
                }
                self.state = AgentState::EnabledWithSelection(selection);
            }
            Err(e) => {
                warn!(node = %target, error = %e, "could not select element");
                self.state = AgentState::EnabledNoSelection;
            }
        }
        ClickDisposition::Suppress
    }

    fn select(&mut self, target: NodeId) -> Result<Selection, DomError> {
        let mut snapshot = StyleSnapshot::new();
        for property in StyleProperty::ALL {
            snapshot.insert(property, self.dom.inline_style(target, property)?);
        }
        self.dom.set_marker(target, Marker::Selected)?;
        Ok(Selection {
            node: target,
            document: self.dom.document(),
            snapshot,
        })
    }

    fn try_apply(&mut self, styles: &StylePayload) -> Result<(), AgentError> {
        let node = self.live_selection()?;
        for (property, value) in styles.entries() {
            self.dom
                .set_inline_style(node, property, value)
                .map_err(|e| self.forget_if_stale(e))?;
        }
        Ok(())
    }

    fn try_reset(&mut self) -> Result<(), AgentError> {
        let node = self.live_selection()?;
        let snapshot = match self.state.selection() {
            Some(selection) => selection.snapshot.clone(),
            None => return Err(AgentError::NoSelection),
        };
        for (property, value) in &snapshot {
            self.dom
                .set_inline_style(node, *property, value)
                .map_err(|e| self.forget_if_stale(e))?;
        }
        Ok(())
    }

    /// The selected node if it belongs to the loaded document.
    fn selected_node(&self) -> Option<NodeId> {
        self.state
            .selection()
            .filter(|s| s.document == self.dom.document())
            .map(|s| s.node)
    }

    /// The selected node, checked for liveness. Precondition order is
    /// enabled, then selected, then attached.
    fn live_selection(&mut self) -> Result<NodeId, AgentError> {
        if !self.state.is_enabled() {
            return Err(AgentError::NotEnabled);
        }
        let selection = self.state.selection().ok_or(AgentError::NoSelection)?;
        let node = selection.node;
        // An id from a replaced document may name an unrelated new element.
        if selection.document != self.dom.document() || !self.dom.is_attached(node) {
            self.state = AgentState::EnabledNoSelection;
            return Err(AgentError::StaleTarget(node));
        }
        Ok(node)
    }

    fn forget_if_stale(&mut self, err: DomError) -> AgentError {
        let err = AgentError::from(err);
        if matches!(err, AgentError::StaleTarget(_)) {
            self.state = AgentState::EnabledNoSelection;
        }
        err
    }

    fn clear_all_markers(&mut self) {
        if let Some(node) = self.selected_node() {
            let _ = self.dom.clear_marker(node);
        }
        match self.dom.marked() {
            Ok(nodes) => {
                for node in nodes {
                    let _ = self.dom.clear_marker(node);
                }
            }
            Err(e) => warn!(error = %e, "could not list highlighted elements"),
        }
    }

    fn reject(&mut self, err: &AgentError) {
        self.notifier.rejection(err.to_string());
    }
}
