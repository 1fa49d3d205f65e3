use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{info, warn};
use page_selection::{
    SelectionError, SelectionManager, SourceFile, DOWNLOAD_FILE_NAME, MAX_PREVIEW_SCALE,
};
use pdf_engine::{default_engine, OpenSource, PdfEngine};
use serde::Serialize;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use storage::{Settings, Storage, StorageError};

mod pages;
mod session;

pub use pages::parse_page_list;
pub use session::Session;

#[derive(Debug, Parser)]
#[command(name = "pagepick")]
#[command(about = "Preview PDF pages and save a selection of them as a new PDF")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Directory holding settings.json instead of the platform default.
    #[arg(long, value_name = "DIR", global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render page previews as PNG files.
    Previews {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Only render this page (1-based).
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        scale: Option<f32>,
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Save the chosen pages as selected_pages.pdf.
    Extract {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Pages to keep, e.g. `5,2,8` or `1-3,7`.
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        pages: Option<String>,
        /// Keep every page.
        #[arg(long)]
        all: bool,
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Select pages interactively from stdin.
    Pick {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Show the saved settings, updating them first when options are given.
    Settings {
        #[arg(long)]
        preview_scale: Option<f32>,
        #[arg(long, value_name = "DIR", conflicts_with = "clear_download_dir")]
        download_dir: Option<PathBuf>,
        /// Go back to writing downloads into the working directory.
        #[arg(long)]
        clear_download_dir: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    let settings = load_settings(cli.config_dir.as_deref());

    match cli.command {
        Commands::Settings { preview_scale, download_dir, clear_download_dir } => {
            let update = SettingsUpdate { preview_scale, download_dir, clear_download_dir };
            run_settings(cli.config_dir.as_deref(), settings, update)
        }
        Commands::Info { file } => run_info(&file),
        Commands::Previews { file, page, scale, output_dir } => run_previews(
            &file,
            page,
            scale.unwrap_or(settings.preview_scale),
            output_dir.as_deref(),
        ),
        Commands::Extract { file, pages, all, output_dir } => {
            let download_dir = download_dir(output_dir, &settings);
            run_extract(&file, pages.as_deref(), all, &download_dir)
        }
        Commands::Pick { file, output_dir } => {
            let download_dir = download_dir(output_dir, &settings);
            run_pick(&file, download_dir)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Writes `bytes` as the download file inside `dir`, creating it if needed.
pub fn write_download(dir: &Path, bytes: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    let path = dir.join(DOWNLOAD_FILE_NAME);
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {} bytes to {}", bytes.len(), path.display());

    Ok(path)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    // A logger may already be installed when `run` is called more than once.
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

fn open_storage(config_dir: Option<&Path>) -> Result<Storage, StorageError> {
    match config_dir {
        Some(dir) => Ok(Storage::with_root(dir)),
        None => Storage::from_default_project(),
    }
}

fn load_settings(config_dir: Option<&Path>) -> Settings {
    match open_storage(config_dir).and_then(|storage| storage.load_settings()) {
        Ok(settings) => settings,
        Err(err) => {
            warn!("using default settings: {err}");
            Settings::default()
        }
    }
}

fn download_dir(flag: Option<PathBuf>, settings: &Settings) -> PathBuf {
    flag.or_else(|| settings.download_dir.clone()).unwrap_or_else(|| PathBuf::from("."))
}

struct SettingsUpdate {
    preview_scale: Option<f32>,
    download_dir: Option<PathBuf>,
    clear_download_dir: bool,
}

impl SettingsUpdate {
    fn is_empty(&self) -> bool {
        self.preview_scale.is_none() && self.download_dir.is_none() && !self.clear_download_dir
    }
}

fn run_settings(
    config_dir: Option<&Path>,
    mut settings: Settings,
    update: SettingsUpdate,
) -> Result<()> {
    let storage = open_storage(config_dir)?;

    if !update.is_empty() {
        if let Some(scale) = update.preview_scale {
            if !(scale.is_finite() && scale > 0.0 && scale <= MAX_PREVIEW_SCALE) {
                anyhow::bail!("preview scale must be in (0, {MAX_PREVIEW_SCALE}], got {scale}");
            }
            settings.preview_scale = scale;
        }
        if update.clear_download_dir {
            settings.download_dir = None;
        } else if let Some(dir) = update.download_dir {
            settings.download_dir = Some(dir);
        }

        storage.save_settings(&settings).with_context(|| {
            format!("failed to save settings to {}", storage.settings_path().display())
        })?;
        info!("saved settings to {}", storage.settings_path().display());
    }

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = engine.page_size(handle, 0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_previews(
    file: &Path,
    page: Option<u32>,
    scale: f32,
    output_dir: Option<&Path>,
) -> Result<()> {
    let manager = open_manager(file)?;

    let pages = match page {
        Some(page) => vec![page],
        None => (1..=manager.page_count()).collect(),
    };

    for page in pages {
        let image = manager
            .preview(page, scale)
            .with_context(|| format!("failed to render preview of page {page}"))?;

        let output = preview_output(file, page, output_dir);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        image
            .save_with_format(&output, image::ImageFormat::Png)
            .with_context(|| format!("failed to write image to {}", output.display()))?;

        println!("{}", output.display());
    }

    Ok(())
}

fn run_extract(file: &Path, pages: Option<&str>, all: bool, download_dir: &Path) -> Result<()> {
    let mut manager = open_manager(file)?;

    if all {
        manager.select_all_pages();
    } else {
        let pages = parse_page_list(pages.unwrap_or_default(), manager.page_count())?;
        manager.select_all(pages);
    }

    let result = manager.export_selection_with(|bytes| write_download(download_dir, bytes));
    let path = with_status(&manager, result)?;

    if let Some(status) = manager.status() {
        eprintln!("{}", status.text);
    }
    println!("{}", path.display());

    Ok(())
}

fn run_pick(file: &Path, download_dir: PathBuf) -> Result<()> {
    let manager = open_manager(file)?;
    let mut session = Session::new(manager, download_dir);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    session.run(stdin.lock(), &mut stdout)
}

fn open_manager(file: &Path) -> Result<SelectionManager> {
    ensure_pdf_exists(file)?;

    let source = SourceFile::from_path(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut manager = SelectionManager::default();
    let result = manager.load_document(Some(source));
    with_status(&manager, result)?;

    Ok(manager)
}

/// Attaches the manager's status text to a failed action.
fn with_status<T, E: PdfEngine>(
    manager: &SelectionManager<E>,
    result: Result<T, SelectionError>,
) -> Result<T> {
    result.map_err(|err| {
        let text = manager.status().map(|status| status.text.clone()).unwrap_or_default();
        anyhow::Error::new(err).context(text)
    })
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn preview_output(file: &Path, page: u32, output_dir: Option<&Path>) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("preview");
    let name = format!("{stem}-page-{page}.png");

    match output_dir {
        Some(dir) => dir.join(name),
        None => file.with_file_name(name),
    }
}
