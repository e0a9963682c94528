use std::sync::Arc;
use std::time::Duration;

use element_stylist::{
    AgentError, AgentState, ClickDisposition, Command, Dom, Marker, MemoryDom, NodeId,
    NoticeBoard, NoticeKind, Notifier, PageAgent, PageEvent, StyleProperty, StylePayload,
};
use tokio::runtime::Handle;

fn payload(font_size: &str, color: &str) -> StylePayload {
    StylePayload {
        font_size: font_size.into(),
        color: color.into(),
        background_color: "#ffffff".into(),
        font_family: "Georgia".into(),
        font_weight: "bold".into(),
    }
}

fn agent(dom: MemoryDom, enabled: bool) -> (PageAgent<MemoryDom>, Arc<NoticeBoard>) {
    let board = NoticeBoard::new();
    let notifier = Notifier::new(board.clone(), Handle::current(), Duration::from_secs(2));
    (PageAgent::new(dom, notifier, enabled), board)
}

fn snapshot_all(dom: &MemoryDom, node: NodeId) -> Vec<String> {
    StyleProperty::ALL
        .iter()
        .map(|p| dom.style(node, *p).to_string())
        .collect()
}

#[tokio::test]
async fn initial_state_follows_persisted_flag() {
    let (on, _) = agent(MemoryDom::new(), true);
    assert_eq!(on.state(), &AgentState::EnabledNoSelection);
    assert!(on.dom().is_intercepting());

    let (off, _) = agent(MemoryDom::new(), false);
    assert_eq!(off.state(), &AgentState::Disabled);
    assert!(!off.dom().is_intercepting());
}

#[tokio::test]
async fn font_size_round_trip_scenario() {
    let mut dom = MemoryDom::new();
    let x = dom.insert("p");
    dom.with_style(x, StyleProperty::FontSize, "12px");
    let (mut agent, board) = agent(dom, true);

    assert_eq!(agent.on_click(x), ClickDisposition::Suppress);
    let selection = agent.state().selection().expect("selected");
    assert_eq!(selection.snapshot[&StyleProperty::FontSize], "12px");
    assert_eq!(selection.snapshot[&StyleProperty::Color], "");

    agent.handle(Command::ApplyStyles {
        styles: payload("24px", "#ff0000"),
    });
    assert_eq!(agent.dom().style(x, StyleProperty::FontSize), "24px");
    assert_eq!(board.last_shown().unwrap().kind, NoticeKind::Success);

    agent.handle(Command::ResetStyles);
    assert_eq!(agent.dom().style(x, StyleProperty::FontSize), "12px");
    assert_eq!(agent.dom().style(x, StyleProperty::Color), "");
    assert_eq!(board.last_shown().unwrap().message, "Styles reset");
}

#[tokio::test]
async fn reset_restores_originals_after_many_applies() {
    let mut dom = MemoryDom::new();
    let x = dom.insert("span");
    dom.with_style(x, StyleProperty::Color, "blue")
        .with_style(x, StyleProperty::FontWeight, "300");
    let before = snapshot_all(&dom, x);
    let (mut agent, _) = agent(dom, true);

    agent.on_click(x);
    agent.apply(&payload("10px", "red")).unwrap();
    agent.apply(&payload("30px", "green")).unwrap();
    assert_eq!(agent.dom().style(x, StyleProperty::FontSize), "30px");
    assert_eq!(agent.dom().style(x, StyleProperty::Color), "green");

    agent.reset().unwrap();
    assert_eq!(snapshot_all(agent.dom(), x), before);

    // Reset keeps the selection and can run again.
    agent.reset().unwrap();
    assert_eq!(snapshot_all(agent.dom(), x), before);
    assert_eq!(agent.state().selection().map(|s| s.node), Some(x));
}

#[tokio::test]
async fn disabled_apply_is_rejected_without_mutation() {
    let mut dom = MemoryDom::new();
    let x = dom.insert("p");
    dom.with_style(x, StyleProperty::FontSize, "12px");
    let (mut agent, board) = agent(dom, false);

    agent.on_click(x);
    assert_eq!(agent.apply(&payload("24px", "red")), Err(AgentError::NotEnabled));
    assert_eq!(agent.dom().style(x, StyleProperty::FontSize), "12px");
    assert_eq!(agent.dom().marker(x), None);

    let notice = board.current().expect("rejection shown");
    assert_eq!(notice.kind, NoticeKind::Rejection);
}

#[tokio::test]
async fn disabling_clears_selection_and_every_highlight() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("div");
    let b = dom.insert("div");
    let (mut agent, _) = agent(dom, true);

    agent.on_click(a);
    agent.on_hover(b);
    assert_eq!(agent.dom().marker(a), Some(Marker::Selected));
    assert_eq!(agent.dom().marker(b), Some(Marker::Hover));

    agent.handle(Command::TogglePlugin { enabled: false });
    assert_eq!(agent.state(), &AgentState::Disabled);
    assert!(agent.dom().marked().unwrap().is_empty());
    assert!(!agent.dom().is_intercepting());

    agent.handle(Command::ApplyStyles {
        styles: payload("24px", "red"),
    });
    assert_eq!(agent.dom().style(a, StyleProperty::FontSize), "");
    assert_eq!(agent.reset(), Err(AgentError::NotEnabled));
}

#[tokio::test]
async fn disabled_pointer_events_are_ignored() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("a");
    let (mut agent, _) = agent(dom, false);

    agent.on_hover(a);
    assert_eq!(agent.dom().marker(a), None);
    assert_eq!(agent.on_click(a), ClickDisposition::PassThrough);
    assert!(agent.state().selection().is_none());
}

#[tokio::test]
async fn reenabling_starts_without_selection() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("div");
    let (mut agent, board) = agent(dom, true);

    agent.on_click(a);
    agent.toggle(false);
    agent.toggle(true);
    assert_eq!(agent.state(), &AgentState::EnabledNoSelection);
    assert_eq!(agent.reset(), Err(AgentError::NoSelection));
    assert_eq!(board.last_shown().unwrap().kind, NoticeKind::Rejection);
}

#[tokio::test]
async fn toggling_on_while_enabled_keeps_selection() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("div");
    let (mut agent, _) = agent(dom, true);

    agent.on_click(a);
    agent.toggle(true);
    assert_eq!(agent.state().selection().map(|s| s.node), Some(a));
    assert_eq!(agent.dom().marker(a), Some(Marker::Selected));
}

#[tokio::test]
async fn apply_without_selection_is_rejected() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("div");
    let (mut agent, board) = agent(dom, true);

    assert_eq!(agent.apply(&payload("24px", "red")), Err(AgentError::NoSelection));
    assert_eq!(agent.dom().style(a, StyleProperty::FontSize), "");
    let notice = board.current().unwrap();
    assert_eq!(notice.kind, NoticeKind::Rejection);
    assert_eq!(notice.message, "select an element on the page first");
}

#[tokio::test]
async fn hover_trail_leaves_no_highlight() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("li");
    let b = dom.insert("li");
    let (mut agent, _) = agent(dom, true);

    agent.dispatch(PageEvent::Hover(a));
    agent.dispatch(PageEvent::Hover(b));
    assert_eq!(agent.dom().marker(a), None);
    assert_eq!(agent.dom().marker(b), Some(Marker::Hover));

    agent.dispatch(PageEvent::HoverExit(b));
    assert_eq!(agent.dom().marker(a), None);
    assert_eq!(agent.dom().marker(b), None);
    assert_eq!(agent.hovered(), None);
}

#[tokio::test]
async fn selection_outline_survives_hover_exit() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("h1");
    let (mut agent, _) = agent(dom, true);

    agent.dispatch(PageEvent::Click(a));
    agent.dispatch(PageEvent::Hover(a));
    assert_eq!(agent.dom().marker(a), Some(Marker::Selected));
    agent.dispatch(PageEvent::HoverExit(a));
    assert_eq!(agent.dom().marker(a), Some(Marker::Selected));
}

#[tokio::test]
async fn hovered_element_becomes_selected_on_click() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("button");
    let (mut agent, _) = agent(dom, true);

    agent.on_hover(a);
    agent.on_click(a);
    agent.on_hover_exit(a);
    assert_eq!(agent.dom().marker(a), Some(Marker::Selected));
}

#[tokio::test]
async fn root_elements_are_never_hover_highlighted() {
    let dom = MemoryDom::new();
    let (html, body) = (dom.html(), dom.body());
    let (mut agent, _) = agent(dom, true);

    agent.on_hover(html);
    agent.on_hover(body);
    assert!(agent.dom().marked().unwrap().is_empty());
}

#[tokio::test]
async fn new_click_replaces_selection_and_snapshot() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("p");
    let b = dom.insert("p");
    dom.with_style(a, StyleProperty::FontSize, "10px");
    dom.with_style(b, StyleProperty::FontSize, "20px");
    let (mut agent, _) = agent(dom, true);

    agent.on_click(a);
    agent.on_click(b);
    assert_eq!(agent.dom().marker(a), None);
    assert_eq!(agent.dom().marker(b), Some(Marker::Selected));

    agent.apply(&payload("99px", "red")).unwrap();
    agent.reset().unwrap();
    assert_eq!(agent.dom().style(a, StyleProperty::FontSize), "10px");
    assert_eq!(agent.dom().style(b, StyleProperty::FontSize), "20px");
}

#[tokio::test]
async fn vanished_selection_is_reported_and_dropped() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("p");
    let (mut agent, board) = agent(dom, true);

    agent.on_click(a);
    agent.dom_mut().detach(a);
    assert_eq!(agent.apply(&payload("24px", "red")), Err(AgentError::StaleTarget(a)));
    assert_eq!(agent.state(), &AgentState::EnabledNoSelection);
    assert_eq!(board.current().unwrap().kind, NoticeKind::Rejection);

    // Later commands see no selection rather than the stale one.
    assert_eq!(agent.reset(), Err(AgentError::NoSelection));
}

#[tokio::test]
async fn selection_from_a_replaced_document_is_stale_even_if_its_id_returns() {
    let mut dom = MemoryDom::new();
    let old = dom.insert("p");
    let other = dom.insert("span");
    let (mut agent, board) = agent(dom, true);

    agent.on_click(old);
    agent.on_hover(other);
    assert_eq!(agent.hovered(), Some(other));
    agent.dom_mut().reload();
    let newcomer = agent.dom_mut().insert("h1");
    assert_eq!(newcomer, old);
    assert_eq!(agent.hovered(), None);

    assert_eq!(agent.apply(&payload("24px", "red")), Err(AgentError::StaleTarget(old)));
    assert_eq!(agent.reset(), Err(AgentError::NoSelection));
    assert_eq!(snapshot_all(agent.dom(), newcomer), vec![""; 5]);
    assert_eq!(agent.dom().marker(newcomer), None);
    assert_eq!(board.last_shown().unwrap().kind, NoticeKind::Rejection);

    // The reused id is an ordinary element of the new document.
    agent.on_click(newcomer);
    assert!(agent.apply(&payload("24px", "red")).is_ok());
    assert_eq!(agent.dom().style(newcomer, StyleProperty::FontSize), "24px");
}

#[tokio::test]
async fn click_recorded_before_a_command_is_routed_first() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("p");
    let b = dom.insert("p");
    let (mut agent, _) = agent(dom, true);
    agent.on_click(a);

    let changed = agent.step(
        [PageEvent::Click(b)],
        [Command::ApplyStyles {
            styles: payload("24px", "red"),
        }],
    );
    assert!(changed);
    assert_eq!(agent.state().selection().map(|s| s.node), Some(b));
    assert_eq!(agent.dom().style(b, StyleProperty::FontSize), "24px");
    assert_eq!(agent.dom().style(a, StyleProperty::FontSize), "");

    assert!(!agent.step(Vec::<PageEvent>::new(), Vec::<Command>::new()));
}

#[tokio::test]
async fn events_for_vanished_elements_are_harmless() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("p");
    let b = dom.insert("p");
    let (mut agent, _) = agent(dom, true);

    agent.on_hover(a);
    agent.dom_mut().detach(a);
    agent.on_hover(b);
    agent.on_hover_exit(a);
    assert_eq!(agent.dom().marker(b), Some(Marker::Hover));

    agent.dom_mut().detach(b);
    assert_eq!(agent.on_click(b), ClickDisposition::Suppress);
    assert!(agent.state().selection().is_none());

    agent.toggle(false);
    assert_eq!(agent.state(), &AgentState::Disabled);
}

#[tokio::test]
async fn independent_agents_do_not_share_state() {
    let mut first_dom = MemoryDom::new();
    let a = first_dom.insert("p");
    let (mut first, _) = agent(first_dom, true);
    let (second, _) = agent(MemoryDom::new(), true);

    first.on_click(a);
    assert!(first.state().selection().is_some());
    assert!(second.state().selection().is_none());
}

#[tokio::test]
async fn every_command_produces_one_visible_notice() {
    let mut dom = MemoryDom::new();
    let a = dom.insert("p");
    let (mut agent, board) = agent(dom, true);

    agent.handle(Command::ResetStyles);
    agent.on_click(a);
    agent.handle(Command::ApplyStyles {
        styles: payload("24px", "red"),
    });
    agent.handle(Command::TogglePlugin { enabled: false });

    let kinds: Vec<NoticeKind> = board.shown().iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        [NoticeKind::Rejection, NoticeKind::Success, NoticeKind::Success]
    );
    assert_eq!(board.current().unwrap().message, "Style editing disabled");
}
