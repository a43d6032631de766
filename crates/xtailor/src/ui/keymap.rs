//! Configurable key bindings for list actions.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::infra::config::Keybindings;

/// Actions that can be rebound through `[keybindings]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    ToggleSelection,
    CycleSeverity,
    Delete,
    Filter,
    Export,
}

/// A key plus the modifiers that must be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    code: KeyCode,
    modifiers: KeyModifiers,
}

impl KeyBinding {
    /// Parse bindings such as `"k"`, `"space"`, `"ctrl+e"` or `"alt+enter"`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_ascii_lowercase();
        let mut modifiers = KeyModifiers::NONE;
        let mut parts: Vec<&str> = text.split('+').collect();
        // A lone "+" splits into two empty parts.
        if text.ends_with("++") || text == "+" {
            parts.retain(|part| !part.is_empty());
            parts.push("+");
        }
        let key = parts.pop()?;

        for modifier in parts {
            match modifier {
                "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
                "alt" | "meta" => modifiers |= KeyModifiers::ALT,
                "shift" => modifiers |= KeyModifiers::SHIFT,
                _ => return None,
            }
        }

        let code = match key {
            "space" => KeyCode::Char(' '),
            "enter" | "return" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "esc" | "escape" => KeyCode::Esc,
            "delete" | "del" => KeyCode::Delete,
            "backspace" => KeyCode::Backspace,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            other => {
                let mut chars = other.chars();
                let ch = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                KeyCode::Char(ch)
            }
        };

        Some(Self { code, modifiers })
    }

    /// Whether `key` triggers this binding. Shift is ignored for character keys.
    pub fn matches(&self, key: &KeyEvent) -> bool {
        let relevant = KeyModifiers::CONTROL | KeyModifiers::ALT;
        match (self.code, key.code) {
            (KeyCode::Char(expected), KeyCode::Char(actual)) => {
                expected.eq_ignore_ascii_case(&actual)
                    && (key.modifiers & relevant) == (self.modifiers & relevant)
            }
            (expected, actual) => expected == actual && key.modifiers == self.modifiers,
        }
    }
}

/// Resolved bindings for every [`Action`].
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: Vec<(Action, KeyBinding)>,
}

impl Keymap {
    pub fn from_config(config: &Keybindings) -> Self {
        let entries = [
            (Action::Up, config.up(), Keybindings::DEFAULT_UP),
            (Action::Down, config.down(), Keybindings::DEFAULT_DOWN),
            (Action::ToggleSelection, config.toggle(), Keybindings::DEFAULT_TOGGLE),
            (Action::CycleSeverity, config.severity(), Keybindings::DEFAULT_SEVERITY),
            (Action::Delete, config.delete(), Keybindings::DEFAULT_DELETE),
            (Action::Filter, config.filter(), Keybindings::DEFAULT_FILTER),
            (Action::Export, config.export(), Keybindings::DEFAULT_EXPORT),
        ];

        let bindings = entries
            .into_iter()
            .filter_map(|(action, text, fallback)| {
                let binding = KeyBinding::parse(text).or_else(|| {
                    tracing::warn!(?action, binding = %text, "invalid key binding, using default");
                    KeyBinding::parse(fallback)
                })?;
                Some((action, binding))
            })
            .collect();
        Self { bindings }
    }

    pub fn action(&self, key: &KeyEvent) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(_, binding)| binding.matches(key))
            .map(|(action, _)| *action)
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::from_config(&Keybindings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn parses_modifiers_and_named_keys() {
        let binding = KeyBinding::parse("Ctrl+E").unwrap();
        assert!(binding.matches(&key(KeyCode::Char('e'), KeyModifiers::CONTROL)));
        assert!(!binding.matches(&key(KeyCode::Char('e'), KeyModifiers::NONE)));

        let space = KeyBinding::parse("space").unwrap();
        assert!(space.matches(&key(KeyCode::Char(' '), KeyModifiers::NONE)));
        assert!(KeyBinding::parse("hyper+x").is_none());
        assert!(KeyBinding::parse("xy").is_none());
    }

    #[test]
    fn default_keymap_resolves_actions() {
        let keymap = Keymap::default();
        assert_eq!(
            keymap.action(&key(KeyCode::Char('j'), KeyModifiers::NONE)),
            Some(Action::Down)
        );
        assert_eq!(
            keymap.action(&key(KeyCode::Char('e'), KeyModifiers::CONTROL)),
            Some(Action::Export)
        );
        assert_eq!(keymap.action(&key(KeyCode::Char('z'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn invalid_binding_falls_back_to_default() {
        let config = Keybindings {
            delete: Some("not a key".into()),
            ..Keybindings::default()
        };
        let keymap = Keymap::from_config(&config);
        assert_eq!(
            keymap.action(&key(KeyCode::Char('d'), KeyModifiers::NONE)),
            Some(Action::Delete)
        );
    }
}
