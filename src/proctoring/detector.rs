//! Classifies raw browser signals. The detector is stateless: deduplicating one
//! incident that surfaces as several signals is the disqualification controller's job.

use serde::{Deserialize, Serialize};

const ZOOM_KEYS: &[&str] = &["+", "=", "-", "_", "0"];
const CTRL_FORBIDDEN: &[&str] = &["r", "w", "t", "n", "u"];
const CTRL_FORBIDDEN_NAMED: &[&str] = &["Tab", "PageUp", "PageDown"];
const CTRL_SHIFT_FORBIDDEN: &[&str] = &["i", "j", "c", "k"];

pub(crate) const FOCUS_LOSS_REASON: &str = "You switched tabs or minimized the window.";
pub(crate) const SHORTCUT_REASON: &str = "Shortcut keys are disabled during the test.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct KeyStroke {
    pub(crate) key: String,
    #[serde(default)]
    pub(crate) code: String,
    #[serde(default)]
    pub(crate) ctrl: bool,
    #[serde(default)]
    pub(crate) shift: bool,
    #[serde(default)]
    pub(crate) alt: bool,
    #[serde(default)]
    pub(crate) meta: bool,
}

impl KeyStroke {
    pub(crate) fn plain(key: &str) -> Self {
        Self { key: key.to_string(), ..Self::default() }
    }

    pub(crate) fn ctrl(key: &str) -> Self {
        Self { key: key.to_string(), ctrl: true, ..Self::default() }
    }

    pub(crate) fn alt(key: &str) -> Self {
        Self { key: key.to_string(), alt: true, ..Self::default() }
    }

    fn is(&self, name: &str) -> bool {
        self.key == name || self.code == name
    }

    fn lower_key(&self) -> String {
        self.key.to_ascii_lowercase()
    }
}

/// Element a pointer or clipboard event targeted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TargetElement {
    #[serde(default)]
    pub(crate) tag: String,
    #[serde(default)]
    pub(crate) content_editable: bool,
    #[serde(default)]
    pub(crate) role: Option<String>,
}

impl TargetElement {
    pub(crate) fn is_editable(&self) -> bool {
        let tag = self.tag.to_ascii_lowercase();
        tag == "input"
            || tag == "textarea"
            || self.content_editable
            || self.role.as_deref() == Some("textbox")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ClipboardAction {
    Copy,
    Cut,
    Paste,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub(crate) enum BrowserSignal {
    VisibilityChange {
        hidden: bool,
    },
    WindowBlur,
    WindowFocus,
    KeyDown(KeyStroke),
    Clipboard {
        action: ClipboardAction,
        #[serde(default)]
        target: TargetElement,
    },
    ContextMenu {
        #[serde(default)]
        target: TargetElement,
    },
    SelectStart {
        #[serde(default)]
        target: TargetElement,
    },
    DragStart {
        #[serde(default)]
        target: TargetElement,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ViolationKind {
    FocusLoss,
    ForbiddenShortcut,
}

impl ViolationKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ViolationKind::FocusLoss => "focus_loss",
            ViolationKind::ForbiddenShortcut => "forbidden_shortcut",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Violation {
    pub(crate) kind: ViolationKind,
    pub(crate) reason: String,
}

impl Violation {
    fn focus_loss() -> Self {
        Self { kind: ViolationKind::FocusLoss, reason: FOCUS_LOSS_REASON.to_string() }
    }

    fn shortcut() -> Self {
        Self { kind: ViolationKind::ForbiddenShortcut, reason: SHORTCUT_REASON.to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Detection {
    /// The shell should cancel the browser's default action.
    pub(crate) prevent: bool,
    pub(crate) violation: Option<Violation>,
    /// Focus or visibility came back; re-arms the focus-loss latch.
    pub(crate) focus_regained: bool,
}

impl Detection {
    fn pass() -> Self {
        Self::default()
    }

    fn suppress() -> Self {
        Self { prevent: true, ..Self::default() }
    }

    fn violation(violation: Violation, prevent: bool) -> Self {
        Self { prevent, violation: Some(violation), focus_regained: false }
    }

    fn regained() -> Self {
        Self { focus_regained: true, ..Self::default() }
    }
}

pub(crate) fn classify(signal: &BrowserSignal) -> Detection {
    match signal {
        BrowserSignal::VisibilityChange { hidden: true } | BrowserSignal::WindowBlur => {
            Detection::violation(Violation::focus_loss(), false)
        }
        BrowserSignal::VisibilityChange { hidden: false } | BrowserSignal::WindowFocus => {
            Detection::regained()
        }
        BrowserSignal::KeyDown(stroke) => classify_key(stroke),
        BrowserSignal::Clipboard { target, .. }
        | BrowserSignal::ContextMenu { target }
        | BrowserSignal::SelectStart { target }
        | BrowserSignal::DragStart { target } => {
            if target.is_editable() {
                Detection::pass()
            } else {
                Detection::suppress()
            }
        }
    }
}

fn classify_key(stroke: &KeyStroke) -> Detection {
    if stroke.is("Escape") || stroke.is("F11") {
        return Detection::suppress();
    }

    let is_zoom = (stroke.ctrl || stroke.meta) && ZOOM_KEYS.contains(&stroke.key.as_str());
    if is_zoom {
        return Detection::pass();
    }

    if stroke.meta || stroke.alt || stroke.is("F12") || stroke.is("F5") {
        return Detection::violation(Violation::shortcut(), true);
    }

    if stroke.ctrl {
        let key = stroke.lower_key();
        let forbidden = if stroke.shift {
            CTRL_SHIFT_FORBIDDEN.contains(&key.as_str())
        } else {
            CTRL_FORBIDDEN.contains(&key.as_str())
        };
        if forbidden || CTRL_FORBIDDEN_NAMED.contains(&stroke.key.as_str()) {
            return Detection::violation(Violation::shortcut(), true);
        }
    }

    Detection::pass()
}
