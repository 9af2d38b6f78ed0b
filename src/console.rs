//! Line commands accepted on stdin by the `boresight` binary.

use crate::overlay::transform::DisplaySelectionMode;
use crate::overlay::OverlayCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleInput {
    Overlay(OverlayCommand),
    Quit,
}

pub const HELP: &str = "commands: toggle, show, hide, lock, crosshairs, text, origin, copy, \
follow, display <n>, settings open|close, reset, quit";

pub fn parse_console_command(line: &str) -> Option<ConsoleInput> {
    let mut words = line.split_whitespace();
    let head = words.next()?.to_ascii_lowercase();
    let arg = words.next();
    let command = match (head.as_str(), arg) {
        ("quit" | "exit" | "q", None) => return Some(ConsoleInput::Quit),
        ("toggle", None) => OverlayCommand::ToggleVisibility,
        ("show", None) => OverlayCommand::Show,
        ("hide", None) => OverlayCommand::Hide,
        ("lock", None) => OverlayCommand::ToggleLock,
        ("crosshairs", None) => OverlayCommand::ToggleCrosshairs,
        ("text", None) => OverlayCommand::ToggleCoordinateText,
        ("origin", None) => OverlayCommand::ToggleOrigin,
        ("copy", None) => OverlayCommand::CopyReadout,
        ("reset", None) => OverlayCommand::ResetAppearance,
        ("follow", None) => OverlayCommand::SetDisplayMode(DisplaySelectionMode::FollowCursor),
        ("display", Some(index)) => {
            OverlayCommand::SetDisplayMode(DisplaySelectionMode::FixedDisplay(index.parse().ok()?))
        }
        ("settings", Some("open")) => OverlayCommand::SettingsOpened,
        ("settings", Some("close")) => OverlayCommand::SettingsClosed,
        _ => return None,
    };
    if words.next().is_some() {
        return None;
    }
    Some(ConsoleInput::Overlay(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overlay_commands() {
        assert_eq!(
            parse_console_command("  Copy "),
            Some(ConsoleInput::Overlay(OverlayCommand::CopyReadout))
        );
        assert_eq!(
            parse_console_command("display 1"),
            Some(ConsoleInput::Overlay(OverlayCommand::SetDisplayMode(
                DisplaySelectionMode::FixedDisplay(1)
            )))
        );
        assert_eq!(parse_console_command("quit"), Some(ConsoleInput::Quit));
    }

    #[test]
    fn rejects_unknown_or_malformed_lines() {
        assert_eq!(parse_console_command(""), None);
        assert_eq!(parse_console_command("display"), None);
        assert_eq!(parse_console_command("display two"), None);
        assert_eq!(parse_console_command("copy now"), None);
        assert_eq!(parse_console_command("settings maybe"), None);
    }
}
