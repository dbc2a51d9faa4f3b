use super::intent_parser::IntentAction;

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: IntentAction,
}

/// Commands taking an optional `on`/`off` argument; a bare command toggles.
pub(crate) const TOGGLE_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "think",
        action: IntentAction::SetReasoning,
    },
    CommandSpec {
        command: "search",
        action: IntentAction::SetSearch,
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "history",
        action: IntentAction::History,
    },
    CommandSpec {
        command: "help",
        action: IntentAction::Help,
    },
    CommandSpec {
        command: "exit",
        action: IntentAction::Exit,
    },
    CommandSpec {
        command: "quit",
        action: IntentAction::Exit,
    },
];

pub(crate) const REFINE_COMMAND: CommandSpec = CommandSpec {
    command: "refine",
    action: IntentAction::Refine,
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/think [on|off]",
    "/search [on|off]",
    "/refine <style> <prompt>",
    "/history",
    "/help",
    "/exit",
];

pub(crate) fn find_action(command: &str, specs: &[CommandSpec]) -> Option<IntentAction> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}
