//! CLI for GenEdit - prompt-driven image editing.

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use genedit::{
    Completion, EditConfig, EditError, Editor, GeminiEditClient, GeminiModel, Phase, PromptHistory,
    SessionSnapshot, DOWNLOAD_FILE_NAME,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genedit")]
#[command(about = "Edit images with natural-language prompts via Gemini image models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Model to use (overrides GENEDIT_MODEL)
    #[arg(short, long, global = true, value_enum)]
    model: Option<ModelArg>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply one edit to an image and save the result
    Edit(EditArgs),

    /// Start an interactive editing session
    Session(SessionArgs),
}

#[derive(Args)]
struct EditArgs {
    /// Input image (png, jpg, gif, webp)
    input: PathBuf,

    /// The edit to apply
    prompt: String,

    /// Output file path
    #[arg(short, long, default_value = DOWNLOAD_FILE_NAME)]
    output: PathBuf,
}

#[derive(Args)]
struct SessionArgs {
    /// Image to open at startup
    input: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    #[value(name = "nano-banana")]
    NanoBanana,
    #[value(name = "nano-banana-pro")]
    NanoBananaPro,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::NanoBanana => GeminiModel::NanoBanana,
            ModelArg::NanoBananaPro => GeminiModel::NanoBananaPro,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // A missing credential stops us here, before any session exists.
    let mut config = EditConfig::from_env().context("failed to load configuration")?;
    if let Some(model) = cli.model {
        config = config.with_model(model.into());
    }
    let editor = Editor::new(Arc::new(GeminiEditClient::new(config)));

    match cli.command {
        Commands::Edit(args) => {
            edit_once(editor, args, cli.json).await?;
        }
        Commands::Session(args) => {
            run_session(editor, args, cli.json).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "genedit=warn",
        1 => "genedit=info",
        _ => "genedit=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn edit_once(mut editor: Editor, args: EditArgs, json_output: bool) -> anyhow::Result<()> {
    if args.prompt.trim().is_empty() {
        anyhow::bail!("prompt must not be empty");
    }

    editor
        .upload_file(&args.input)
        .await
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    editor.set_prompt_text(&args.prompt);

    let completion = editor.submit_and_wait().await?;
    let session = editor.session();

    let image = match (completion, session.current_result()) {
        (Completion::Applied, Some(image)) => image,
        _ => anyhow::bail!(
            "{}",
            session.last_error().unwrap_or("edit did not complete")
        ),
    };

    image.save(&args.output)?;

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "input": args.input.display().to_string(),
            "output": args.output.display().to_string(),
            "prompt": args.prompt.trim(),
            "size_bytes": image.size(),
            "format": image.format.extension(),
            "model": image.metadata.model,
            "duration_ms": image.metadata.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Edited image: {} ({} bytes)",
            args.output.display(),
            image.size()
        );
        if let Some(duration) = image.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }

    Ok(())
}

/// A line typed in the interactive session.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Open(PathBuf),
    History,
    Use(usize),
    Submit,
    Save(Option<PathBuf>),
    Reset,
    Status,
    Help,
    Quit,
    Prompt(String),
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix(':') else {
            return Some(Self::Prompt(line.to_string()));
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let command = match (name, arg) {
            ("open" | "upload", path) if !path.is_empty() => Self::Open(PathBuf::from(path)),
            ("history" | "h", _) => Self::History,
            ("use" | "u", n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => Self::Use(n - 1),
                _ => Self::Unknown(line.to_string()),
            },
            ("submit" | "go", _) => Self::Submit,
            ("save" | "download", "") => Self::Save(None),
            ("save" | "download", path) => Self::Save(Some(PathBuf::from(path))),
            ("reset" | "clear", _) => Self::Reset,
            ("status" | "s", _) => Self::Status,
            ("help" | "?", _) => Self::Help,
            ("quit" | "q" | "exit", _) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        };
        Some(command)
    }
}

const HELP: &str = "\
Type a prompt and press enter to edit the current image.
  :open <path>   load an image (png, jpg, gif, webp)
  :history       list successful prompts
  :use <n>       copy history entry n into the prompt
  :submit        submit the current prompt again
  :save [path]   save the edited image (default edited-image.png)
  :reset         start over (history is kept)
  :status        show the session state
  :quit          exit";

const BUSY_NOTICE: &str = "An edit is still running; wait for it to finish.";

async fn run_session(
    mut editor: Editor,
    args: SessionArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    if let Some(path) = args.input {
        if let Err(e) = editor.upload_file(&path).await {
            eprintln!("Could not open {}: {e}", path.display());
        }
    }
    if !json_output {
        println!("{HELP}\n");
    }
    render(&editor.snapshot(), json_output)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let in_flight = editor.session().is_request_in_flight();
        tokio::select! {
            completion = editor.next_completion(), if in_flight => {
                if completion.is_some_and(|c| c != Completion::Stale) {
                    render(&editor.snapshot(), json_output)?;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(command) = Command::parse(&line) else { continue };
                if command == Command::Quit {
                    break;
                }
                handle_command(&mut editor, command, json_output).await?;
            }
        }
    }

    Ok(())
}

async fn handle_command(
    editor: &mut Editor,
    command: Command,
    json_output: bool,
) -> anyhow::Result<()> {
    match command {
        Command::Open(path) => {
            // Errors are already recorded in the session.
            let _ = editor.upload_file(&path).await;
        }
        Command::Prompt(text) => {
            editor.set_prompt_text(text);
            if !submit(editor) {
                return Ok(());
            }
        }
        Command::Submit => {
            if !submit(editor) {
                return Ok(());
            }
        }
        Command::Use(index) => {
            match editor.select_history(index) {
                Ok(true) => println!(
                    "Prompt set to \"{}\". Use :submit to run it.",
                    editor.session().prompt_text()
                ),
                Ok(false) => eprintln!("No history entry {}.", index + 1),
                Err(EditError::RequestInFlight) => eprintln!("{BUSY_NOTICE}"),
                Err(e) => eprintln!("{e}"),
            }
            return Ok(());
        }
        Command::History => {
            print_history(editor.session().history(), json_output)?;
            return Ok(());
        }
        Command::Save(path) => {
            let path = path.unwrap_or_else(|| PathBuf::from(DOWNLOAD_FILE_NAME));
            save_result(editor, &path)?;
            return Ok(());
        }
        Command::Reset => editor.reset(),
        Command::Status => {}
        Command::Help => {
            println!("{HELP}");
            return Ok(());
        }
        Command::Unknown(line) => {
            eprintln!("Unknown command: {line} (try :help)");
            return Ok(());
        }
        Command::Quit => return Ok(()),
    }
    render(&editor.snapshot(), json_output)
}

/// Submits the current prompt. Returns false when the submission was turned
/// away because another edit is still running.
fn submit(editor: &mut Editor) -> bool {
    match editor.submit() {
        Err(EditError::RequestInFlight) => {
            eprintln!("{BUSY_NOTICE}");
            false
        }
        // Validation failures are recorded in the session and rendered.
        _ => true,
    }
}

fn save_result(editor: &Editor, path: &Path) -> anyhow::Result<()> {
    match editor.session().current_result() {
        Some(image) => {
            image.save(path)?;
            println!("Saved {} ({} bytes)", path.display(), image.size());
        }
        None => eprintln!("Nothing to save yet."),
    }
    Ok(())
}

fn print_history(history: &PromptHistory, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string(history)?);
    } else if history.is_empty() {
        println!("Your successful prompts will appear here for easy reuse.");
    } else {
        for (i, prompt) in history.entries().iter().enumerate() {
            println!("  {:>2}. {}", i + 1, PromptHistory::label(prompt));
        }
    }
    Ok(())
}

fn render(snapshot: &SessionSnapshot, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    match snapshot.phase {
        Phase::Idle => println!("[idle] Upload an image with :open <path> to get started."),
        Phase::Ready => println!(
            "[ready] {} loaded. Your generated image will appear here.",
            describe(snapshot.image.as_ref())
        ),
        Phase::Submitting => println!("[working] AI is working its magic..."),
        Phase::Succeeded => println!(
            "[done] Edited image ready: {}. Use :save to download.",
            describe(snapshot.result.as_ref())
        ),
        Phase::Failed => println!(
            "[error] {}",
            snapshot.last_error.as_deref().unwrap_or("Something went wrong.")
        ),
    }
    Ok(())
}

fn describe(image: Option<&genedit::session::ImageSummary>) -> String {
    match image {
        Some(image) => format!(
            "{} image, {} bytes",
            image.media_type.extension(),
            image.size_bytes
        ),
        None => "no image".to_string(),
    }
}
