//! Hotkey handling
//!
//! Maps single-character key presses to manual commands.

use serde::Serialize;

use crate::avatar::OverrideCommand;
use crate::config::HotkeyConfig;

/// A command triggered by a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCommand {
    Override(OverrideCommand),
    /// Show or hide the debug panel. Does not touch the expression state.
    ToggleDebug,
}

/// Key bindings, compared case-insensitively
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkeys {
    bindings: Vec<(char, KeyCommand)>,
}

impl Default for Hotkeys {
    fn default() -> Self {
        Self::from_config(&HotkeyConfig::default())
    }
}

impl Hotkeys {
    /// Build bindings from config. Entries that are not a single character
    /// are skipped; `Config::validate` rejects them up front.
    pub fn from_config(config: &HotkeyConfig) -> Self {
        let entries = [
            (&config.laugh, KeyCommand::Override(OverrideCommand::Laugh)),
            (&config.cry, KeyCommand::Override(OverrideCommand::Cry)),
            (&config.clear, KeyCommand::Override(OverrideCommand::Clear)),
            (&config.debug, KeyCommand::ToggleDebug),
        ];

        let bindings = entries
            .into_iter()
            .filter_map(|(key, command)| single_char(key).map(|c| (c, command)))
            .collect();

        Self { bindings }
    }

    /// Resolve a key press
    pub fn resolve(&self, key: char) -> Option<KeyCommand> {
        let key = key.to_ascii_lowercase();
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, command)| *command)
    }

    /// Resolve a key name as sent by a browser (`KeyboardEvent.key`)
    pub fn resolve_str(&self, key: &str) -> Option<KeyCommand> {
        single_char(key).and_then(|c| self.resolve(c))
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c.to_ascii_lowercase()),
        _ => None,
    }
}
