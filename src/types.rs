use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an element in the inspected page.
///
/// The agent never owns the element. A `NodeId` may outlive the element it
/// names, so every use must go through `Dom::is_attached` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The five inline style properties the agent snapshots and rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleProperty {
    FontSize,
    Color,
    BackgroundColor,
    FontFamily,
    FontWeight,
}

impl StyleProperty {
    pub const ALL: [StyleProperty; 5] = [
        StyleProperty::FontSize,
        StyleProperty::Color,
        StyleProperty::BackgroundColor,
        StyleProperty::FontFamily,
        StyleProperty::FontWeight,
    ];

    /// Property name as used on `element.style` and in the wire protocol.
    pub fn js_name(self) -> &'static str {
        match self {
            StyleProperty::FontSize => "fontSize",
            StyleProperty::Color => "color",
            StyleProperty::BackgroundColor => "backgroundColor",
            StyleProperty::FontFamily => "fontFamily",
            StyleProperty::FontWeight => "fontWeight",
        }
    }

    pub fn css_name(self) -> &'static str {
        match self {
            StyleProperty::FontSize => "font-size",
            StyleProperty::Color => "color",
            StyleProperty::BackgroundColor => "background-color",
            StyleProperty::FontFamily => "font-family",
            StyleProperty::FontWeight => "font-weight",
        }
    }
}

impl fmt::Display for StyleProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_name())
    }
}

/// Style values sent by the control surface. Values are opaque CSS text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePayload {
    pub font_size: String,
    pub color: String,
    pub background_color: String,
    pub font_family: String,
    pub font_weight: String,
}

impl StylePayload {
    pub fn get(&self, property: StyleProperty) -> &str {
        match property {
            StyleProperty::FontSize => &self.font_size,
            StyleProperty::Color => &self.color,
            StyleProperty::BackgroundColor => &self.background_color,
            StyleProperty::FontFamily => &self.font_family,
            StyleProperty::FontWeight => &self.font_weight,
        }
    }

    /// Iterates the payload in `StyleProperty::ALL` order.
    pub fn entries(&self) -> impl Iterator<Item = (StyleProperty, &str)> {
        StyleProperty::ALL.into_iter().map(|p| (p, self.get(p)))
    }
}

/// A single message from the control surface to the page agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    TogglePlugin { enabled: bool },
    ApplyStyles { styles: StylePayload },
    ResetStyles,
}

/// Pointer events recorded by the in-page listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum PageEvent {
    Hover(NodeId),
    HoverExit(NodeId),
    Click(NodeId),
}

impl PageEvent {
    pub fn node(&self) -> NodeId {
        match self {
            PageEvent::Hover(node) | PageEvent::HoverExit(node) | PageEvent::Click(node) => *node,
        }
    }
}

/// Visual tag carried by an element. `Selected` wins over `Hover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Marker {
    Hover,
    Selected,
}

impl Marker {
    pub fn as_str(self) -> &'static str {
        match self {
            Marker::Hover => "hover",
            Marker::Selected => "selected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_toggle_message() {
        let cmd: Command =
            serde_json::from_str(r#"{"action":"togglePlugin","enabled":false}"#).unwrap();
        assert_eq!(cmd, Command::TogglePlugin { enabled: false });
    }

    #[test]
    fn decodes_apply_message_with_camel_case_styles() {
        let raw = r##"{
            "action": "applyStyles",
            "styles": {
                "fontSize": "24px",
                "color": "#ff0000",
                "backgroundColor": "#ffffff",
                "fontFamily": "Georgia",
                "fontWeight": "bold"
            }
        }"##;
        let Command::ApplyStyles { styles } = serde_json::from_str(raw).unwrap() else {
            panic!("expected applyStyles");
        };
        assert_eq!(styles.get(StyleProperty::FontSize), "24px");
        assert_eq!(styles.get(StyleProperty::BackgroundColor), "#ffffff");
        assert_eq!(styles.font_weight, "bold");
    }

    #[test]
    fn reset_needs_no_payload() {
        let bare: Command = serde_json::from_str(r#"{"action":"resetStyles"}"#).unwrap();
        assert_eq!(bare, Command::ResetStyles);
    }

    #[test]
    fn apply_without_every_key_is_rejected() {
        let raw = r#"{"action":"applyStyles","styles":{"fontSize":"12px"}}"#;
        assert!(serde_json::from_str::<Command>(raw).is_err());
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_str::<Command>(r#"{"action":"explode"}"#).is_err());
    }

    #[test]
    fn page_events_use_kind_and_id() {
        let events: Vec<PageEvent> = serde_json::from_str(
            r#"[{"kind":"hover","id":3},{"kind":"hoverExit","id":3},{"kind":"click","id":7}]"#,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![
                PageEvent::Hover(NodeId(3)),
                PageEvent::HoverExit(NodeId(3)),
                PageEvent::Click(NodeId(7)),
            ]
        );
    }

    #[test]
    fn payload_entries_follow_property_order() {
        let payload = StylePayload {
            font_size: "1".into(),
            color: "2".into(),
            background_color: "3".into(),
            font_family: "4".into(),
            font_weight: "5".into(),
        };
        let values: Vec<&str> = payload.entries().map(|(_, v)| v).collect();
        assert_eq!(values, ["1", "2", "3", "4", "5"]);
    }
}
