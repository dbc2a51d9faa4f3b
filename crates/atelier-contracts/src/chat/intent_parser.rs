use super::command_registry::{find_action, NO_ARG_COMMANDS, REFINE_COMMAND, TOGGLE_COMMANDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentAction {
    Noop,
    Send,
    SetReasoning,
    SetSearch,
    Refine,
    History,
    Help,
    Exit,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub action: IntentAction,
    pub raw: String,
    /// Chat message for `Send`, prompt text for `Refine`.
    pub text: Option<String>,
    /// `Some(true|false)` for explicit toggles, `None` to flip.
    pub enabled: Option<bool>,
    /// Style label for `Refine`, offending command for `Unknown`.
    pub argument: Option<String>,
}

impl Intent {
    fn new(action: IntentAction, raw: &str) -> Self {
        Self {
            action,
            raw: raw.to_string(),
            text: None,
            enabled: None,
            argument: None,
        }
    }
}

fn parse_toggle(arg: &str) -> Result<Option<bool>, String> {
    match arg.trim().to_ascii_lowercase().as_str() {
        "" | "toggle" => Ok(None),
        "on" | "true" | "yes" | "1" => Ok(Some(true)),
        "off" | "false" | "no" | "0" => Ok(Some(false)),
        other => Err(other.to_string()),
    }
}

fn split_words(arg: &str) -> Vec<String> {
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

/// `/refine "Studio Lighting" a red car in the rain` → (style, prompt).
fn parse_refine_args(arg: &str) -> (Option<String>, Option<String>) {
    let mut words = split_words(arg).into_iter();
    let style = words.next();
    let prompt = words.collect::<Vec<String>>().join(" ");
    (style, Some(prompt).filter(|value| !value.is_empty()))
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new(IntentAction::Noop, text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, TOGGLE_COMMANDS) {
                return match parse_toggle(arg) {
                    Ok(enabled) => {
                        let mut intent = Intent::new(action, text);
                        intent.enabled = enabled;
                        intent
                    }
                    Err(bad) => {
                        let mut intent = Intent::new(IntentAction::Unknown, text);
                        intent.argument = Some(format!("{command} {bad}"));
                        intent
                    }
                };
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if command == REFINE_COMMAND.command {
                let (style, prompt) = parse_refine_args(arg);
                let mut intent = Intent::new(REFINE_COMMAND.action, text);
                intent.argument = style;
                intent.text = prompt;
                return intent;
            }

            let mut intent = Intent::new(IntentAction::Unknown, text);
            intent.argument = Some(command);
            return intent;
        }
    }

    let mut intent = Intent::new(IntentAction::Send, text);
    intent.text = Some(raw_trimmed.to_string());
    intent
}
