use std::io::{self, BufRead, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use atelier_contracts::chat::{parse_intent, IntentAction, CHAT_HELP_COMMANDS};
use atelier_contracts::conversation::{ChatFlags, Role, Turn};
use atelier_contracts::events::EventLog;
use atelier_contracts::options::{
    AspectRatio, ImageSize, PromptStyle, VideoAspectRatio, VideoResolution,
};
use atelier_contracts::requests::{
    AnalyzeRequest, Artifact, ImageEditRequest, ImageGenerateRequest, RefineRequest, VideoRequest,
};
use atelier_contracts::{StudioError, StudioResult};
use atelier_engine::artifacts::{extension_for_mime, write_image_artifact};
use atelier_engine::inputs::load_image;
use atelier_engine::{
    CancelToken, Credential, CredentialGate, EnvCredentialGate, Studio, StudioConfig,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "warn,atelier=info,atelier_engine=info";

#[derive(Debug, Parser)]
#[command(name = "atelier", version, about = "Gemini design studio from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive design-assistant chat.
    Chat(ChatArgs),
    /// Rewrite a prompt in a target style.
    Refine(RefineArgs),
    /// Structured design breakdown of an image.
    Analyze(AnalyzeArgs),
    /// Image generation and editing.
    #[command(subcommand)]
    Image(ImageCommand),
    /// Generate a short video clip.
    Video(VideoArgs),
}

#[derive(Debug, Subcommand)]
enum ImageCommand {
    /// Text-to-image with the pro image model.
    Generate(ImageGenerateArgs),
    /// Apply an instruction to an existing image.
    Edit(ImageEditArgs),
}

#[derive(Debug, Args)]
struct SessionArgs {
    /// Append diagnostic events to this JSONL file.
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value = "outputs")]
    out_dir: PathBuf,
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[command(flatten)]
    session: SessionArgs,
    #[arg(long)]
    think: bool,
    #[arg(long)]
    search: bool,
}

#[derive(Debug, Args)]
struct RefineArgs {
    #[command(flatten)]
    session: SessionArgs,
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "Photorealistic")]
    style: PromptStyle,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    session: SessionArgs,
    #[arg(long)]
    image: PathBuf,
}

#[derive(Debug, Args)]
struct ImageOutputArgs {
    /// Write the decoded image here.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Print the image as a data URI instead of writing a file.
    #[arg(long)]
    data_uri: bool,
}

#[derive(Debug, Args)]
struct ImageGenerateArgs {
    #[command(flatten)]
    session: SessionArgs,
    #[command(flatten)]
    output: ImageOutputArgs,
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "1:1")]
    aspect_ratio: AspectRatio,
    #[arg(long, default_value = "1K")]
    size: ImageSize,
}

#[derive(Debug, Args)]
struct ImageEditArgs {
    #[command(flatten)]
    session: SessionArgs,
    #[command(flatten)]
    output: ImageOutputArgs,
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    instruction: String,
}

#[derive(Debug, Args)]
struct VideoArgs {
    #[command(flatten)]
    session: SessionArgs,
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "16:9")]
    aspect_ratio: VideoAspectRatio,
    #[arg(long, default_value = "720p")]
    resolution: VideoResolution,
    /// Optional starting frame.
    #[arg(long)]
    reference: Option<PathBuf>,
}

/// Env key when present; paid-tier selection asks for a key on stdin.
struct PromptCredentialGate {
    selected: Mutex<Option<Credential>>,
}

impl PromptCredentialGate {
    fn from_env() -> Self {
        Self {
            selected: Mutex::new(EnvCredentialGate::from_env().selected_key()),
        }
    }
}

impl CredentialGate for PromptCredentialGate {
    fn has_selected_key(&self) -> bool {
        self.selected
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    fn open_select_key(&self) -> StudioResult<()> {
        eprint!("This operation needs a paid-tier Gemini API key. Key: ");
        io::stderr().flush().ok();
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|err| StudioError::CredentialMissing(format!("key entry failed: {err}")))?;
        let credential = Credential::new(line)?;
        let mut slot = self
            .selected
            .lock()
            .map_err(|_| StudioError::CredentialMissing("key store lock poisoned".to_string()))?;
        *slot = Some(credential);
        Ok(())
    }

    fn selected_key(&self) -> Option<Credential> {
        self.selected.lock().ok().and_then(|slot| slot.clone())
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("atelier error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => run_chat(args),
        Command::Refine(args) => run_refine(args),
        Command::Analyze(args) => run_analyze(args),
        Command::Image(ImageCommand::Generate(args)) => run_image_generate(args),
        Command::Image(ImageCommand::Edit(args)) => run_image_edit(args),
        Command::Video(args) => run_video(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ATELIER_LOG")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn open_studio(session: &SessionArgs) -> Result<Studio> {
    let session_id = uuid::Uuid::new_v4().simple().to_string();
    let events = match session.events.as_ref() {
        Some(path) => EventLog::new(path, session_id),
        None => EventLog::disabled(session_id),
    };
    let config = StudioConfig::from_env();
    tracing::debug!(api_base = %config.api_base, "studio configured");
    Studio::new(
        &config,
        Box::new(PromptCredentialGate::from_env()),
        events,
        &session.out_dir,
    )
}

/// Prints the user-facing message and maps the failure to exit code 1.
fn report(err: &StudioError) -> i32 {
    tracing::debug!(kind = %err.kind(), "operation failed: {err}");
    eprintln!("atelier: {}", err.user_message());
    1
}

fn run_chat(args: ChatArgs) -> Result<i32> {
    let mut studio = open_studio(&args.session)?;
    let mut flags = ChatFlags {
        reasoning: args.think,
        search: args.search,
    };

    println!("Atelier chat started. Type /help for commands.");
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{}> ", flag_badge(flags));
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.lock().read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action {
            IntentAction::Noop => {}
            IntentAction::Help => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
            IntentAction::Exit => break,
            IntentAction::SetReasoning => {
                flags.reasoning = intent.enabled.unwrap_or(!flags.reasoning);
                println!("Extended reasoning {}", on_off(flags.reasoning));
            }
            IntentAction::SetSearch => {
                flags.search = intent.enabled.unwrap_or(!flags.search);
                println!("Web search {}", on_off(flags.search));
            }
            IntentAction::History => {
                for turn in studio.conversation().turns() {
                    print_turn(turn);
                }
            }
            IntentAction::Refine => {
                let Some(style) = intent.argument.as_deref() else {
                    println!("Usage: /refine <style> <prompt>");
                    continue;
                };
                let style = match style.parse::<PromptStyle>() {
                    Ok(style) => style,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                let request = RefineRequest {
                    prompt: intent.text.clone().unwrap_or_default(),
                    style,
                };
                match studio.refine(&request) {
                    Ok(refined) => println!("{refined}"),
                    Err(err) => {
                        report(&err);
                    }
                }
            }
            IntentAction::Unknown => {
                println!(
                    "Unknown command: {}",
                    intent.argument.as_deref().unwrap_or(intent.raw.as_str())
                );
            }
            IntentAction::Send => {
                let message = intent.text.unwrap_or_default();
                match studio.send_message(&message, flags) {
                    Ok(reply) => print_turn(&reply),
                    Err(err) => {
                        if let Some(turn) = studio.conversation().last().filter(|turn| turn.failed)
                        {
                            print_turn(turn);
                        }
                        report(&err);
                    }
                }
            }
        }
    }
    Ok(0)
}

fn run_refine(args: RefineArgs) -> Result<i32> {
    let mut studio = open_studio(&args.session)?;
    let request = RefineRequest {
        prompt: args.prompt,
        style: args.style,
    };
    match studio.refine(&request) {
        Ok(refined) => {
            println!("{refined}");
            Ok(0)
        }
        Err(err) => Ok(report(&err)),
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let mut studio = open_studio(&args.session)?;
    let image = match load_image(&args.image) {
        Ok(image) => image,
        Err(err) => return Ok(report(&err)),
    };
    match studio.analyze(&AnalyzeRequest { image: Some(image) }) {
        Ok(analysis) => {
            println!("{analysis}");
            Ok(0)
        }
        Err(err) => Ok(report(&err)),
    }
}

fn run_image_generate(args: ImageGenerateArgs) -> Result<i32> {
    let mut studio = open_studio(&args.session)?;
    let request = ImageGenerateRequest {
        prompt: args.prompt,
        aspect_ratio: args.aspect_ratio,
        size: args.size,
    };
    match studio.generate_image(&request) {
        Ok(artifact) => emit_image(&studio, &artifact, &args.output, "generated"),
        Err(err) => Ok(report(&err)),
    }
}

fn run_image_edit(args: ImageEditArgs) -> Result<i32> {
    let mut studio = open_studio(&args.session)?;
    let image = match load_image(&args.image) {
        Ok(image) => image,
        Err(err) => return Ok(report(&err)),
    };
    let request = ImageEditRequest {
        image: Some(image),
        instruction: args.instruction,
    };
    match studio.edit_image(&request) {
        Ok(artifact) => emit_image(&studio, &artifact, &args.output, "edited"),
        Err(err) => Ok(report(&err)),
    }
}

fn run_video(args: VideoArgs) -> Result<i32> {
    let mut studio = open_studio(&args.session)?;
    let reference = match args.reference.as_deref().map(load_image).transpose() {
        Ok(reference) => reference,
        Err(err) => return Ok(report(&err)),
    };
    let request = VideoRequest {
        prompt: args.prompt,
        aspect_ratio: args.aspect_ratio,
        resolution: args.resolution,
        reference,
    };
    eprintln!("Generating video. This can take a few minutes.");
    match studio.generate_video(&request, &CancelToken::new()) {
        Ok(Artifact::Video { path, byte_len, .. }) => {
            println!("{} ({byte_len} bytes)", path.display());
            Ok(0)
        }
        Ok(other) => bail!("unexpected artifact from video generation: {other:?}"),
        Err(err) => Ok(report(&err)),
    }
}

fn emit_image(
    studio: &Studio,
    artifact: &Artifact,
    output: &ImageOutputArgs,
    stem: &str,
) -> Result<i32> {
    if output.data_uri {
        println!("{}", artifact.locator());
        return Ok(0);
    }
    let path = output.out.clone().unwrap_or_else(|| {
        studio
            .out_dir()
            .join(format!("{stem}.{}", extension_for_mime(artifact.mime_type())))
    });
    write_image_artifact(&path, artifact)
        .with_context(|| format!("saving image to {}", path.display()))?;
    println!("{}", path.display());
    Ok(0)
}

fn print_turn(turn: &Turn) {
    let speaker = match turn.role {
        Role::User => "you",
        Role::Model if turn.used_reasoning => "atelier (reasoned)",
        Role::Model => "atelier",
    };
    println!("{speaker}: {}", turn.text);
    for (index, source) in turn.sources.iter().enumerate() {
        println!("  [{}] {} <{}>", index + 1, source.label(), source.uri);
    }
}

fn flag_badge(flags: ChatFlags) -> String {
    let mut badge = Vec::new();
    if flags.reasoning {
        badge.push("think");
    }
    if flags.search {
        badge.push("search");
    }
    if badge.is_empty() {
        String::new()
    } else {
        format!("[{}] ", badge.join("+"))
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
