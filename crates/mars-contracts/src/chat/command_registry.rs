#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole tail is a single raw argument.
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "category",
        action: "set_category",
    },
    CommandSpec {
        command: "model",
        action: "set_model",
    },
    CommandSpec {
        command: "echo",
        action: "echo",
    },
    CommandSpec {
        command: "image",
        action: "generate_image",
    },
    CommandSpec {
        command: "load",
        action: "load_session",
    },
    // `/history` lists past exchanges; `/history <n>` reprints entry n in
    // full, bypassing playback.
    CommandSpec {
        command: "history",
        action: "history",
    },
];

/// Commands that update one session setting from their argument.
pub(crate) const SETTINGS_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "mode",
        action: "set_mode",
    },
    CommandSpec {
        command: "length",
        action: "set_length",
    },
    CommandSpec {
        command: "temperature",
        action: "set_temperature",
    },
    CommandSpec {
        command: "max_tokens",
        action: "set_max_tokens",
    },
];

/// Bare preset shortcuts: `/precise` is `/mode precise`, `/long` is
/// `/length long`, and so on.
pub(crate) const MODE_PRESET_COMMANDS: &[&str] = &["precise", "balanced", "creative"];
pub(crate) const LENGTH_PRESET_COMMANDS: &[&str] = &["short", "medium", "long"];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "clear",
        action: "clear",
    },
    CommandSpec {
        command: "time",
        action: "time",
    },
    CommandSpec {
        command: "clear_history",
        action: "clear_history",
    },
    CommandSpec {
        command: "save",
        action: "save_session",
    },
    CommandSpec {
        command: "whoami",
        action: "whoami",
    },
    CommandSpec {
        command: "logout",
        action: "logout",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/help",
    "/clear",
    "/echo",
    "/time",
    "/history",
    "/clear_history",
    "/save",
    "/load",
    "/category",
    "/model",
    "/mode",
    "/length",
    "/precise",
    "/balanced",
    "/creative",
    "/short",
    "/medium",
    "/long",
    "/temperature",
    "/max_tokens",
    "/image",
    "/whoami",
    "/logout",
];
