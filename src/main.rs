//! callsheet-forge – render call sheets to PDF from the command line.
//!
//! Usage:
//!   callsheet-forge render <callsheet.json> [--override f] [--master f]
//!       [--config f] [--theme name] [--backend tree|html|direct]
//!       [--out-dir d] [--preview] [--viewer cmd] [--timeout-secs n]
//!   callsheet-forge filename <title>

use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use callsheet_forge::download::{derive_filename, DownloadManager, FsHost, SaveOutcome, DEFAULT_REVOKE_DELAY};
use callsheet_forge::error::{CallsheetError, ErrorKind};
use callsheet_forge::merge::{require_complete, CustomizationMerger, JsonFileSettings, MasterSettingsSource};
use callsheet_forge::themes::ThemeName;
use callsheet_forge::{Backend, Callsheet, PdfCustomization, RenderSession};

#[derive(Parser)]
#[command(name = "callsheet-forge", version, about = "Themeable call-sheet PDF generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a callsheet JSON file to PDF
    Render {
        /// Callsheet JSON file
        input: PathBuf,

        /// Partial customization JSON merged over the defaults
        #[arg(long = "override")]
        override_file: Option<PathBuf>,

        /// Master settings JSON, layered between the defaults and the override
        #[arg(long)]
        master: Option<PathBuf>,

        /// Complete customization JSON, used as-is instead of merging
        #[arg(long, conflicts_with_all = ["override_file", "master", "theme"])]
        config: Option<PathBuf>,

        /// Theme bundle: professional, modern, minimal, creative or dark
        #[arg(long, value_parser = parse_theme)]
        theme: Option<ThemeName>,

        /// Rendering backend
        #[arg(long, default_value = "tree", value_parser = parse_backend)]
        backend: Backend,

        /// Directory the PDF is saved into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Open the PDF in a viewer instead of saving it
        #[arg(long)]
        preview: bool,

        /// Viewer command used by --preview
        #[arg(long)]
        viewer: Option<String>,

        /// Give up when rendering takes longer than this
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Print the download filename derived from a project title
    Filename { title: String },
}

fn parse_backend(s: &str) -> Result<Backend, String> {
    Backend::parse(s).ok_or_else(|| format!("unknown backend `{s}` (expected tree, html or direct)"))
}

fn parse_theme(s: &str) -> Result<ThemeName, String> {
    ThemeName::parse(s).ok_or_else(|| format!("unknown theme `{s}`"))
}

fn read_json(path: &PathBuf) -> Result<Value, CallsheetError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| CallsheetError::Config(format!("reading {}: {e}", path.display())))?;
    Ok(serde_json::from_str(&raw)?)
}

fn exit_code(e: &CallsheetError) -> i32 {
    match e.kind() {
        ErrorKind::FixData => 2,
        ErrorKind::Retry => 3,
        ErrorKind::Environment => 4,
    }
}

struct RenderArgs {
    input: PathBuf,
    override_file: Option<PathBuf>,
    master: Option<PathBuf>,
    config: Option<PathBuf>,
    theme: Option<ThemeName>,
    backend: Backend,
    timeout: Option<Duration>,
}

fn customization(args: &RenderArgs) -> Result<PdfCustomization, CallsheetError> {
    if let Some(path) = &args.config {
        return require_complete(&read_json(path)?);
    }

    let mut requested = match &args.override_file {
        Some(path) => read_json(path)?,
        None => json!({}),
    };
    if let (Some(theme), Some(root)) = (args.theme, requested.as_object_mut()) {
        root.insert("theme".into(), json!(theme.as_str()));
    }

    let master = args.master.clone().map(JsonFileSettings::new);
    let merger = CustomizationMerger::with_master(move || match &master {
        Some(source) => source.load(),
        None => Ok(None),
    });
    merger.merge(&requested)
}

fn render(args: &RenderArgs) -> Result<(Callsheet, Vec<u8>), CallsheetError> {
    let raw = fs::read_to_string(&args.input)
        .map_err(|e| CallsheetError::Config(format!("reading {}: {e}", args.input.display())))?;
    let sheet = Callsheet::from_json(&raw)?;
    let c = customization(args)?;

    let mut session = RenderSession::new();
    let bytes = match args.timeout {
        Some(timeout) => session.render_with_timeout(args.backend, &sheet, &c, timeout)?,
        None => session.render(args.backend, &sheet, &c)?,
    };
    Ok((sheet, bytes))
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            input,
            override_file,
            master,
            config,
            theme,
            backend,
            out_dir,
            preview,
            viewer,
            timeout_secs,
        } => {
            let args = RenderArgs {
                input,
                override_file,
                master,
                config,
                theme,
                backend,
                timeout: timeout_secs.map(Duration::from_secs),
            };
            let (sheet, bytes) = match render(&args) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Error rendering callsheet: {e}");
                    process::exit(exit_code(&e));
                }
            };

            let mut host = FsHost::new(&out_dir);
            if let Some(cmd) = viewer {
                host = host.with_viewer(cmd);
            }
            let mut manager = DownloadManager::new(host);

            if preview {
                match manager.preview(&bytes) {
                    Ok(handle) => {
                        eprintln!("Opened preview {}", handle.0);
                        // Give the viewer time to read the file before it is revoked.
                        std::thread::sleep(DEFAULT_REVOKE_DELAY);
                        manager.reap();
                    }
                    Err(e) => {
                        eprintln!("Error opening preview: {e}");
                        process::exit(4);
                    }
                }
                return;
            }

            let filename = derive_filename(&sheet.project_title);
            match manager.save(&bytes, &filename) {
                Ok(SaveOutcome::Saved { location }) => {
                    eprintln!("Wrote '{location}' ({} bytes, {} backend)", bytes.len(), args.backend)
                }
                Ok(SaveOutcome::Downloaded { handle }) => eprintln!("Delivered {filename} via {}", handle.0),
                Ok(SaveOutcome::Cancelled) => eprintln!("Save of {filename} cancelled"),
                Err(e) => {
                    eprintln!("Error saving '{filename}': {e}");
                    process::exit(4);
                }
            }
        }
        Commands::Filename { title } => {
            println!("{}", derive_filename(&title));
        }
    }
}
