use std::collections::BTreeMap;

use serde_json::{Number, Value};

use super::command_registry::{
    CommandSpec, LENGTH_PRESET_COMMANDS, MODE_PRESET_COMMANDS, NO_ARG_COMMANDS, RAW_ARG_COMMANDS,
    SETTINGS_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub settings_update: BTreeMap<String, Value>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            settings_update: BTreeMap::new(),
            command_args: BTreeMap::new(),
        }
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn raw_arg_key(action: &str) -> &'static str {
    match action {
        "set_category" => "category",
        "set_model" => "model",
        "echo" => "message",
        "generate_image" => "prompt",
        "load_session" => "session",
        "history" => "index",
        _ => "arg",
    }
}

fn settings_value(action: &str, arg: &str) -> Value {
    match action {
        "set_temperature" => arg
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "set_max_tokens" => arg
            .parse::<u64>()
            .ok()
            .map(|value| Value::Number(value.into()))
            .unwrap_or(Value::Null),
        _ => {
            let normalized = arg.trim().to_ascii_lowercase();
            if normalized.is_empty() {
                Value::Null
            } else {
                Value::String(normalized)
            }
        }
    }
}

fn settings_key(action: &str) -> &'static str {
    match action {
        "set_mode" => "mode",
        "set_length" => "length",
        "set_temperature" => "temperature",
        _ => "max_tokens",
    }
}

/// Argument splitting for commands that may carry quoted values.
pub(crate) fn parse_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
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

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let remainder = &slash_tail[command_len..];
            let arg = if remainder.is_empty() {
                ""
            } else {
                remainder.trim()
            };

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                let mut intent = Intent::new(action, text);
                // Session ids may be quoted; everything else is taken verbatim.
                let value = if action == "load_session" {
                    parse_args(arg).into_iter().next().unwrap_or_default()
                } else {
                    arg.to_string()
                };
                intent
                    .command_args
                    .insert(raw_arg_key(action).to_string(), Value::String(value));
                return intent;
            }

            if let Some(action) = find_action(&command, SETTINGS_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent
                    .settings_update
                    .insert(settings_key(action).to_string(), settings_value(action, arg));
                return intent;
            }

            if MODE_PRESET_COMMANDS.iter().any(|value| *value == command) {
                let mut intent = Intent::new("set_mode", text);
                intent
                    .settings_update
                    .insert("mode".to_string(), Value::String(command));
                return intent;
            }

            if LENGTH_PRESET_COMMANDS.iter().any(|value| *value == command) {
                let mut intent = Intent::new("set_length", text);
                intent
                    .settings_update
                    .insert("length".to_string(), Value::String(command));
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("generate", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_args, parse_intent};

    #[test]
    fn plain_text_becomes_a_generation_prompt() {
        let intent = parse_intent("  write a loop  ");
        assert_eq!(intent.action, "generate");
        assert_eq!(intent.prompt.as_deref(), Some("write a loop"));
    }

    #[test]
    fn blank_input_is_a_noop() {
        assert_eq!(parse_intent("").action, "noop");
        assert_eq!(parse_intent("   \t ").action, "noop");
    }

    #[test]
    fn parse_category_and_model_commands() {
        let category = parse_intent("/category coding");
        assert_eq!(category.action, "set_category");
        assert_eq!(category.command_args["category"], json!("coding"));

        let model = parse_intent("/model claude-3-opus");
        assert_eq!(model.action, "set_model");
        assert_eq!(model.command_args["model"], json!("claude-3-opus"));
    }

    #[test]
    fn parse_settings_commands_with_typed_values() {
        let temperature = parse_intent("/temperature 0.35");
        assert_eq!(temperature.action, "set_temperature");
        assert_eq!(temperature.settings_update["temperature"], json!(0.35));

        let max_tokens = parse_intent("/max_tokens 1500");
        assert_eq!(max_tokens.action, "set_max_tokens");
        assert_eq!(max_tokens.settings_update["max_tokens"], json!(1500));

        let bad = parse_intent("/temperature warm");
        assert_eq!(bad.settings_update["temperature"], json!(null));
    }

    #[test]
    fn parse_mode_and_length_shortcuts() {
        let precise = parse_intent("/precise");
        assert_eq!(precise.action, "set_mode");
        assert_eq!(precise.settings_update["mode"], json!("precise"));

        let long = parse_intent("/long");
        assert_eq!(long.action, "set_length");
        assert_eq!(long.settings_update["length"], json!("long"));

        let mode = parse_intent("/mode Creative");
        assert_eq!(mode.action, "set_mode");
        assert_eq!(mode.settings_update["mode"], json!("creative"));
    }

    #[test]
    fn parse_image_command_keeps_prompt_verbatim() {
        let intent = parse_intent("/image a red fox in snow");
        assert_eq!(intent.action, "generate_image");
        assert_eq!(intent.command_args["prompt"], json!("a red fox in snow"));
    }

    #[test]
    fn parse_session_and_no_arg_commands() {
        let load = parse_intent("/load session-42");
        assert_eq!(load.action, "load_session");
        assert_eq!(load.command_args["session"], json!("session-42"));

        let quoted = parse_intent("/load \"session 42\"");
        assert_eq!(quoted.command_args["session"], json!("session 42"));

        assert_eq!(parse_intent("/save").action, "save_session");
        assert_eq!(parse_intent("/clear_history").action, "clear_history");
        assert_eq!(parse_intent("/logout").action, "logout");
    }

    #[test]
    fn parse_history_with_and_without_index() {
        let listing = parse_intent("/history");
        assert_eq!(listing.action, "history");
        assert_eq!(listing.command_args["index"], json!(""));

        let reload = parse_intent("/history 2");
        assert_eq!(reload.action, "history");
        assert_eq!(reload.command_args["index"], json!("2"));
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }

    #[test]
    fn parse_args_honors_quotes() {
        assert_eq!(
            parse_args("\"two words\" one"),
            vec!["two words".to_string(), "one".to_string()]
        );
    }
}
