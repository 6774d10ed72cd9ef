use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use mars_client::auth::RegisterData;
use mars_client::files::{CsvAnalysisOptions, PollPolicy};
use mars_client::generation::{GenerationOutcome, GenerationRequest};
use mars_client::{
    ApiClient, AuthService, ClientConfig, FileCredentialStore, FileService, GenerationService,
};
use mars_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use mars_contracts::events::{EventPayload, EventWriter};
use mars_contracts::models::IMAGE_MODEL;
use mars_contracts::params::{GenerationParams, ResponseLength, TemperatureMode};
use mars_contracts::playback::{reveal, PLAYBACK_DELAY};
use mars_contracts::session::{SessionEntry, SessionHistory, SessionManifest};

#[derive(Debug, Parser)]
#[command(name = "mars", version, about = "Mars GenAI terminal client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Login(LoginArgs),
    Register(RegisterArgs),
    Logout(CommonArgs),
    Whoami(CommonArgs),
    Generate(GenerateArgs),
    Analyze(AnalyzeArgs),
    Chat(ChatArgs),
}

#[derive(Debug, Parser)]
struct CommonArgs {
    /// API root; falls back to MARS_API_BASE, then the default backend.
    #[arg(long)]
    api_base: Option<String>,
    /// Directory holding credentials and session artifacts.
    #[arg(long, default_value = ".mars")]
    state_dir: PathBuf,
}

#[derive(Debug, Parser)]
struct LoginArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    email: String,
    /// Prompted on stdin when absent.
    #[arg(long)]
    password: Option<String>,
}

#[derive(Debug, Parser)]
struct RegisterArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    /// Prompted on stdin when absent.
    #[arg(long)]
    password: Option<String>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "general")]
    category: String,
    #[arg(long, default_value = "balanced")]
    mode: String,
    #[arg(long, default_value = "medium")]
    length: String,
    /// Explicit model id; wins over the category table.
    #[arg(long)]
    model: Option<String>,
    /// Custom temperature override (0..=1 by convention).
    #[arg(long)]
    temperature: Option<f64>,
    /// Custom max-token override (100..=4000 by convention).
    #[arg(long)]
    max_tokens: Option<u32>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    question: Option<String>,
    #[arg(long)]
    analysis_type: Option<String>,
    #[arg(long)]
    temperature: Option<f64>,
    #[arg(long)]
    max_tokens: Option<u32>,
    /// Upper bound on status polling, in seconds.
    #[arg(long, default_value_t = 120)]
    poll_timeout: u64,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Directory for saved sessions and image artifacts.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value = "general")]
    category: String,
    #[arg(long)]
    model: Option<String>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("mars error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Login(args) => run_login(args),
        Command::Register(args) => run_register(args),
        Command::Logout(args) => run_logout(args),
        Command::Whoami(args) => run_whoami(args),
        Command::Generate(args) => run_generate(args),
        Command::Analyze(args) => run_analyze(args),
        Command::Chat(args) => run_chat(args),
    }?;
    Ok(0)
}

fn build_api(common: &CommonArgs) -> Result<ApiClient> {
    let config = ClientConfig::resolve(common.api_base.as_deref());
    let credentials = FileCredentialStore::new(common.state_dir.join("credentials.json"));
    ApiClient::new(config, std::sync::Arc::new(credentials))
}

fn read_password(flag: Option<String>) -> Result<String> {
    let password = match flag {
        Some(password) => password,
        None => {
            print!("Password: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim_end_matches(['\n', '\r']).to_string()
        }
    };
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok(password)
}

fn run_login(args: LoginArgs) -> Result<()> {
    let api = build_api(&args.common)?;
    let auth = AuthService::new(&api);
    let password = read_password(args.password)?;
    let response = auth.login(&args.email, &password)?;
    let name = response
        .get("user")
        .and_then(|user| user.get("name"))
        .and_then(Value::as_str)
        .unwrap_or(args.email.as_str());
    println!("Logged in as {name}.");
    Ok(())
}

fn run_register(args: RegisterArgs) -> Result<()> {
    let api = build_api(&args.common)?;
    let auth = AuthService::new(&api);
    let password = read_password(args.password)?;
    let data = RegisterData {
        email: args.email.clone(),
        password,
        name: args.name.clone(),
    };
    auth.register(&data)?;
    if auth.is_authenticated() {
        println!("Registered and logged in as {}.", args.name);
    } else {
        println!("Registered {}. Log in with `mars login`.", args.email);
    }
    Ok(())
}

fn run_logout(args: CommonArgs) -> Result<()> {
    let api = build_api(&args)?;
    let auth = AuthService::new(&api);
    // Local credential is gone either way; a server error is only a warning.
    if let Err(err) = auth.logout() {
        eprintln!("warning: server logout failed: {err:#}");
    }
    println!("Logged out.");
    Ok(())
}

fn run_whoami(args: CommonArgs) -> Result<()> {
    let api = build_api(&args)?;
    let auth = AuthService::new(&api);
    if !auth.is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }
    let profile = auth.current_user()?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn resolve_params(
    mode: &str,
    length: &str,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
) -> Result<GenerationParams> {
    if temperature.is_some() || max_tokens.is_some() {
        let mode = parse_mode(mode)?;
        let length = parse_length(length)?;
        return Ok(GenerationParams::custom(
            temperature.unwrap_or_else(|| mode.temperature()),
            max_tokens.unwrap_or_else(|| length.max_tokens()),
        ));
    }
    Ok(GenerationParams::resolve(parse_mode(mode)?, parse_length(length)?))
}

fn parse_mode(name: &str) -> Result<TemperatureMode> {
    TemperatureMode::from_name(name)
        .ok_or_else(|| anyhow::anyhow!("unknown mode '{name}' (precise|balanced|creative)"))
}

fn parse_length(name: &str) -> Result<ResponseLength> {
    ResponseLength::from_name(name)
        .ok_or_else(|| anyhow::anyhow!("unknown length '{name}' (short|medium|long)"))
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let api = build_api(&args.common)?;
    let generation = GenerationService::new(&api);
    let params = resolve_params(&args.mode, &args.length, args.temperature, args.max_tokens)?;

    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.common.state_dir.join("events.jsonl"));
    let events = EventWriter::new(&events_path, uuid::Uuid::new_v4().to_string());

    let request = GenerationRequest {
        prompt: args.prompt.clone(),
        category: args.category.clone(),
        params,
        model: args.model.clone(),
    };
    events.generation_started(&request.category, request.model.as_deref(), params)?;

    match generation.generate(&request) {
        Ok(outcome) => {
            render_outcome(&generation, &outcome, &args.common.state_dir)?;
            events.generation_completed(outcome.model(), outcome.output_text().chars().count())?;
            Ok(())
        }
        Err(err) => {
            events.generation_failed(&format!("{err:#}"))?;
            Err(err)
        }
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let api = build_api(&args.common)?;
    let files = FileService::new(&api);
    let options = CsvAnalysisOptions {
        model: args.model,
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        analysis_type: args.analysis_type,
        question: args.question,
    };
    let policy = PollPolicy {
        timeout: std::time::Duration::from_secs(args.poll_timeout),
        ..PollPolicy::default()
    };

    let events = EventWriter::new(
        args.common.state_dir.join("events.jsonl"),
        uuid::Uuid::new_v4().to_string(),
    );
    events.file_analysis_started(&args.file.display().to_string())?;

    let mut report = |percent: u8| {
        println!("processing {} ... {percent}%", args.file.display());
        let _ = events.file_analysis_progress(percent);
    };
    let analysis = match files.upload_and_analyze(&args.file, &options, policy, Some(&mut report)) {
        Ok(analysis) => analysis,
        Err(err) => {
            events.file_analysis_failed(&format!("{err:#}"))?;
            return Err(err);
        }
    };
    events.file_analysis_completed(analysis.data.summary.chars().count())?;

    println!("Summary: {}", analysis.data.summary);
    if let Some(insights) = analysis.data.insights.as_deref() {
        for insight in insights {
            println!("- {insight}");
        }
    }
    if let Some(statistics) = &analysis.data.statistics {
        println!("Statistics: {}", serde_json::to_string_pretty(statistics)?);
    }
    Ok(())
}

/// Session-wide generation settings the chat commands mutate.
#[derive(Debug, Clone)]
struct ChatSettings {
    category: String,
    model: Option<String>,
    mode: TemperatureMode,
    length: ResponseLength,
    custom_temperature: Option<f64>,
    custom_max_tokens: Option<u32>,
}

impl ChatSettings {
    fn new(category: String, model: Option<String>) -> Self {
        Self {
            category,
            model,
            mode: TemperatureMode::Balanced,
            length: ResponseLength::Medium,
            custom_temperature: None,
            custom_max_tokens: None,
        }
    }

    fn params(&self) -> GenerationParams {
        if self.custom_temperature.is_some() || self.custom_max_tokens.is_some() {
            GenerationParams::custom(
                self.custom_temperature
                    .unwrap_or_else(|| self.mode.temperature()),
                self.custom_max_tokens
                    .unwrap_or_else(|| self.length.max_tokens()),
            )
        } else {
            GenerationParams::resolve(self.mode, self.length)
        }
    }

    fn as_map(&self) -> Map<String, Value> {
        let params = self.params();
        event_payload(serde_json::json!({
            "category": self.category.as_str(),
            "model": self.model.as_deref(),
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        }))
    }
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let api = build_api(&args.common)?;
    let auth = AuthService::new(&api);
    let generation = GenerationService::new(&api);

    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| args.common.state_dir.join("sessions"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed creating {}", out_dir.display()))?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| out_dir.join("events.jsonl"));
    let events = EventWriter::new(&events_path, session_id.clone());
    let mut manifest = SessionManifest::new(out_dir.join(format!("{session_id}.json")));

    let mut settings = ChatSettings::new(args.category.clone(), args.model.clone());
    let mut history = SessionHistory::new();

    println!("Mars chat started. Type /help for commands.");
    // Opportunistic token check; an invalid credential is cleared here
    // instead of on the first failing generation.
    if auth.is_authenticated() && !auth.validate_token() {
        println!("Stored credential was rejected; log in again with `mars login`.");
    }
    events.lifecycle("session_started")?;

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        match intent.action.as_str() {
            "noop" => continue,
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            "clear" => {
                print!("\x1b[2J\x1b[H");
                io::stdout().flush()?;
            }
            "echo" => {
                println!(
                    "{}",
                    value_as_non_empty_string(intent.command_args.get("message"))
                        .unwrap_or_default()
                );
            }
            "time" => {
                println!("Current time: {}", chrono::Utc::now().to_rfc3339());
            }
            "set_category" => {
                if let Some(category) =
                    value_as_non_empty_string(intent.command_args.get("category"))
                {
                    settings.category = category.clone();
                    println!("Category set to {category}");
                } else {
                    println!("/category requires a value (general|research|coding|creative)");
                }
            }
            "set_model" => {
                match value_as_non_empty_string(intent.command_args.get("model")) {
                    Some(model) => {
                        println!("Model set to {model}");
                        settings.model = Some(model);
                    }
                    None => {
                        settings.model = None;
                        println!("Model reset to the category default");
                    }
                }
            }
            "set_mode" => {
                match intent
                    .settings_update
                    .get("mode")
                    .and_then(Value::as_str)
                    .and_then(TemperatureMode::from_name)
                {
                    Some(mode) => {
                        settings.mode = mode;
                        settings.custom_temperature = None;
                        println!("Temperature set to {}", mode.temperature());
                    }
                    None => println!("/mode requires precise, balanced or creative"),
                }
            }
            "set_length" => {
                match intent
                    .settings_update
                    .get("length")
                    .and_then(Value::as_str)
                    .and_then(ResponseLength::from_name)
                {
                    Some(length) => {
                        settings.length = length;
                        settings.custom_max_tokens = None;
                        println!("Max tokens set to {}", length.max_tokens());
                    }
                    None => println!("/length requires short, medium or long"),
                }
            }
            "set_temperature" => {
                match intent
                    .settings_update
                    .get("temperature")
                    .and_then(Value::as_f64)
                {
                    Some(value) => {
                        settings.custom_temperature = Some(value);
                        println!("Custom temperature set to {value}");
                    }
                    None => println!("/temperature requires a number between 0 and 1"),
                }
            }
            "set_max_tokens" => {
                match max_tokens_arg(&intent.settings_update) {
                    Some(value) => {
                        settings.custom_max_tokens = Some(value);
                        println!("Custom max tokens set to {value}");
                    }
                    None => println!("/max_tokens requires a positive integer"),
                }
            }
            "history" => {
                show_history(&history, value_as_non_empty_string(intent.command_args.get("index")));
            }
            "clear_history" => {
                history.clear();
                println!("History cleared.");
            }
            "save_session" => {
                if manifest.turns.is_empty() {
                    println!("Nothing to save yet.");
                } else {
                    manifest.save()?;
                    println!("Session saved with id {}", manifest.session_id);
                    events.lifecycle("session_saved")?;
                }
            }
            "load_session" => {
                match value_as_non_empty_string(intent.command_args.get("session")) {
                    Some(id) => {
                        let path = out_dir.join(format!("{id}.json"));
                        if !path.exists() {
                            println!("No saved session {id}");
                        } else {
                            let loaded = SessionManifest::load(&path);
                            history.replace(loaded.entries());
                            println!(
                                "Loaded session {} with {} turn(s)",
                                loaded.session_id,
                                loaded.turns.len()
                            );
                            manifest = loaded;
                        }
                    }
                    None => println!("/load requires a session id"),
                }
            }
            "whoami" => {
                if !auth.is_authenticated() {
                    println!("Not logged in.");
                } else {
                    match auth.current_user() {
                        Ok(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
                        Err(err) => println!("Error: {err:#}"),
                    }
                }
            }
            "logout" => {
                if let Err(err) = auth.logout() {
                    println!("warning: server logout failed: {err:#}");
                }
                println!("Logged out.");
                events.lifecycle("logged_out")?;
            }
            "generate_image" => {
                let prompt = value_as_non_empty_string(intent.command_args.get("prompt"))
                    .unwrap_or_default();
                dispatch(
                    &generation,
                    &events,
                    &mut history,
                    &mut manifest,
                    &settings,
                    &prompt,
                    Some(IMAGE_MODEL.to_string()),
                    &out_dir,
                );
            }
            "generate" => {
                let prompt = intent.prompt.clone().unwrap_or_default();
                dispatch(
                    &generation,
                    &events,
                    &mut history,
                    &mut manifest,
                    &settings,
                    &prompt,
                    settings.model.clone(),
                    &out_dir,
                );
            }
            "unknown" => {
                let command = intent
                    .command_args
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or("?");
                println!("Unknown command /{command}. Type /help for commands.");
            }
            other => {
                println!("Unhandled action {other}");
            }
        }
    }

    events.lifecycle("session_ended")?;
    Ok(())
}

/// One submission end to end: guard, dispatch, render, record. The history
/// gains exactly one entry on terminal success of either path and none on
/// failure; the loading flag is released in every branch.
#[allow(clippy::too_many_arguments)]
fn dispatch(
    generation: &GenerationService<'_>,
    events: &EventWriter,
    history: &mut SessionHistory,
    manifest: &mut SessionManifest,
    settings: &ChatSettings,
    prompt: &str,
    model: Option<String>,
    out_dir: &Path,
) {
    if prompt.trim().is_empty() {
        return;
    }
    if !history.begin_submission() {
        println!("A generation is already in flight.");
        return;
    }

    let params = settings.params();
    let request = GenerationRequest {
        prompt: prompt.to_string(),
        category: settings.category.clone(),
        params,
        model,
    };
    let _ = events.generation_started(&request.category, request.model.as_deref(), params);

    let result = generation.generate(&request);
    match &result {
        Ok(outcome) => {
            if let Err(err) = render_outcome(generation, outcome, out_dir) {
                println!("warning: {err:#}");
            }
            let _ =
                events.generation_completed(outcome.model(), outcome.output_text().chars().count());
        }
        Err(err) => {
            println!("Error: {err:#}");
            let _ = events.generation_failed(&format!("{err:#}"));
        }
    }
    record_terminal(
        &result,
        prompt,
        &settings.category,
        settings.as_map(),
        history,
        manifest,
    );

    history.finish_submission();
}

/// Terminal-state rule for one submission: a success of either path appends
/// exactly one history entry (carrying the image URL when the image endpoint
/// produced one) and one manifest turn. A failure records nothing.
fn record_terminal(
    result: &Result<GenerationOutcome>,
    prompt: &str,
    category: &str,
    settings: Map<String, Value>,
    history: &mut SessionHistory,
    manifest: &mut SessionManifest,
) {
    let Ok(outcome) = result else {
        return;
    };
    let mut entry = SessionEntry::new(
        prompt.trim(),
        outcome.output_text(),
        category,
        outcome.model(),
    );
    if let Some(url) = outcome.image_url() {
        entry = entry.with_image(url);
    }
    manifest.record(entry.clone(), settings);
    history.push(entry);
}

/// Prints a text result through the cosmetic playback, or materializes an
/// image artifact on disk.
fn render_outcome(
    generation: &GenerationService<'_>,
    outcome: &GenerationOutcome,
    out_dir: &Path,
) -> Result<()> {
    match outcome {
        GenerationOutcome::Text { content, .. } => {
            reveal(content, PLAYBACK_DELAY, |chunk| {
                print!("{chunk}");
                let _ = io::stdout().flush();
            });
            println!();
        }
        GenerationOutcome::Image { image, .. } => {
            let bytes = generation.fetch_image(image)?;
            let artifact = out_dir.join(format!(
                "artifact-{}.png",
                chrono::Utc::now().timestamp_millis()
            ));
            std::fs::create_dir_all(out_dir)
                .with_context(|| format!("failed creating {}", out_dir.display()))?;
            std::fs::write(&artifact, &bytes)
                .with_context(|| format!("failed writing {}", artifact.display()))?;
            match image::load_from_memory(&bytes) {
                Ok(decoded) => println!(
                    "{} ({}x{}) -> {}",
                    mars_client::generation::IMAGE_CONFIRMATION,
                    decoded.width(),
                    decoded.height(),
                    artifact.display()
                ),
                Err(_) => println!(
                    "{} -> {}",
                    mars_client::generation::IMAGE_CONFIRMATION,
                    artifact.display()
                ),
            }
            if let Some(url) = image.url() {
                println!("Image URL: {url}");
            }
        }
    }
    Ok(())
}

fn show_history(history: &SessionHistory, index: Option<String>) {
    if history.is_empty() {
        println!("History is empty.");
        return;
    }
    match index.and_then(|value| value.parse::<usize>().ok()) {
        // Reloading a past entry shows the final text immediately, without
        // playback.
        Some(index) => match history.get(index) {
            Some(entry) => {
                println!("[{index}] {}", entry.prompt);
                println!("{}", entry.output);
                if let Some(url) = entry.image_url.as_deref() {
                    println!("Image URL: {url}");
                }
            }
            None => println!("No history entry {index}"),
        },
        None => {
            for (idx, entry) in history.entries().iter().enumerate() {
                println!("[{idx}] {} -> {}", entry.prompt, preview(&entry.output, 60));
            }
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let truncated: String = first_line.chars().take(max_chars).collect();
    format!("{truncated}…")
}

/// `/max_tokens` argument as a bounded integer; oversized values are
/// rejected rather than wrapped.
fn max_tokens_arg(update: &BTreeMap<String, Value>) -> Option<u32> {
    update
        .get("max_tokens")
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn event_payload(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use mars_client::generation::{ImagePayload, IMAGE_CONFIRMATION};

    use super::*;

    #[test]
    fn text_success_appends_exactly_one_entry() {
        let mut history = SessionHistory::new();
        let mut manifest = SessionManifest::new("unused.json");
        let result: Result<GenerationOutcome> = Ok(GenerationOutcome::Text {
            model: "gemini-2.0-flash".to_string(),
            content: "for i in range(10): ...".to_string(),
        });

        record_terminal(
            &result,
            "  write a loop  ",
            "coding",
            Map::new(),
            &mut history,
            &mut manifest,
        );

        assert_eq!(history.len(), 1);
        assert_eq!(manifest.turns.len(), 1);
        let entry = &history.entries()[0];
        assert_eq!(entry.prompt, "write a loop");
        assert_eq!(entry.output, "for i in range(10): ...");
        assert_eq!(entry.model, "gemini-2.0-flash");
        assert_eq!(entry.image_url, None);
    }

    #[test]
    fn image_success_records_confirmation_and_url() {
        let mut history = SessionHistory::new();
        let mut manifest = SessionManifest::new("unused.json");
        let result: Result<GenerationOutcome> = Ok(GenerationOutcome::Image {
            model: IMAGE_MODEL.to_string(),
            image: ImagePayload::Url("https://cdn.example/fox.png".to_string()),
        });

        record_terminal(
            &result,
            "a red fox in snow",
            "general",
            Map::new(),
            &mut history,
            &mut manifest,
        );

        assert_eq!(history.len(), 1);
        let entry = &history.entries()[0];
        assert_eq!(entry.output, IMAGE_CONFIRMATION);
        assert_eq!(entry.image_url.as_deref(), Some("https://cdn.example/fox.png"));
        assert_eq!(manifest.turns[0].entry.model, IMAGE_MODEL);
    }

    #[test]
    fn failure_records_nothing() {
        let mut history = SessionHistory::new();
        let mut manifest = SessionManifest::new("unused.json");
        let result: Result<GenerationOutcome> = Err(anyhow::anyhow!("backend unavailable"));

        record_terminal(
            &result,
            "write a loop",
            "coding",
            Map::new(),
            &mut history,
            &mut manifest,
        );

        assert!(history.is_empty());
        assert!(manifest.turns.is_empty());
    }

    #[test]
    fn max_tokens_arg_rejects_values_beyond_u32() {
        let mut update = BTreeMap::new();
        update.insert("max_tokens".to_string(), serde_json::json!(2000));
        assert_eq!(max_tokens_arg(&update), Some(2000));

        update.insert("max_tokens".to_string(), serde_json::json!(4_294_967_297u64));
        assert_eq!(max_tokens_arg(&update), None);

        update.remove("max_tokens");
        assert_eq!(max_tokens_arg(&update), None);
    }

    #[test]
    fn resolve_params_uses_presets_without_overrides() {
        let params = resolve_params("balanced", "medium", None, None).unwrap();
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.max_tokens, 1000);
    }

    #[test]
    fn resolve_params_custom_override_wins() {
        let params = resolve_params("precise", "short", Some(0.55), None).unwrap();
        assert_eq!(params.temperature, 0.55);
        // Unset half of the override falls back to the selected preset.
        assert_eq!(params.max_tokens, 500);
    }

    #[test]
    fn resolve_params_rejects_unknown_names() {
        assert!(resolve_params("warm", "medium", None, None).is_err());
        assert!(resolve_params("balanced", "huge", None, None).is_err());
    }

    #[test]
    fn chat_settings_params_follow_mode_until_overridden() {
        let mut settings = ChatSettings::new("general".to_string(), None);
        settings.mode = TemperatureMode::Creative;
        settings.length = ResponseLength::Long;
        assert_eq!(settings.params().temperature, 0.9);
        assert_eq!(settings.params().max_tokens, 2000);

        settings.custom_temperature = Some(0.15);
        let params = settings.params();
        assert_eq!(params.temperature, 0.15);
        assert_eq!(params.max_tokens, 2000);
    }

    #[test]
    fn preview_truncates_long_first_lines() {
        assert_eq!(preview("short answer", 60), "short answer");
        let long = "x".repeat(100);
        assert_eq!(preview(&long, 60).chars().count(), 61);
        assert_eq!(preview("line one\nline two", 60), "line one");
    }
}
