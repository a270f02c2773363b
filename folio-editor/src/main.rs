//! `folio` — paginate documents from the command line and run the
//! collaboration relay.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use folio_collab::{RelayConfig, RelayServer};
use folio_core::{Document, EditorRuntimeConfig, FileEnvelope};
use folio_editor::read_content;
use folio_layout::{PageContentStore, PaginationEngine};

/// Paginated rich-text documents
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a document into pages and print a page summary
    Paginate(PaginateArgs),

    /// Paginate a document and print its plain text
    ExportText(ExportTextArgs),

    /// Run the collaboration relay server
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct PaginateArgs {
    /// Export file or Delta JSON
    file: PathBuf,

    /// Config file (defaults to ./folio.config.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the paginated document as an export file
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExportTextArgs {
    /// Export file or Delta JSON
    file: PathBuf,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:9090")]
    bind: String,

    /// Frames buffered per connection before a slow peer lags
    #[arg(long, default_value_t = 256)]
    capacity: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Paginate(args) => paginate(args),
        Command::ExportText(args) => export_text(args),
        Command::Serve(args) => serve(args).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EditorRuntimeConfig> {
    let config = match path {
        Some(path) => EditorRuntimeConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EditorRuntimeConfig::load(std::env::current_dir()?)?,
    };
    Ok(config)
}

/// Load `file` into an engine and settle its pages.
fn paginated(
    file: &Path,
    config: Option<&Path>,
) -> anyhow::Result<(Option<String>, String, PaginationEngine<folio_layout::MeasuredFactory>)> {
    let config = load_config(config)?;
    let loaded = read_content(file).with_context(|| format!("reading {}", file.display()))?;
    let mut engine = PaginationEngine::measured(config);
    engine.load_flat(&loaded.content);
    let report = engine.paginate_all();
    if report.overflow.aborted {
        log::warn!("some content could not be split and overflows its page");
    }
    Ok((loaded.title, loaded.description, engine))
}

fn paginate(args: PaginateArgs) -> anyhow::Result<()> {
    let (title, description, engine) = paginated(&args.file, args.config.as_deref())?;
    let target = engine.config().target_height_px();

    println!("{}: {} page(s)", args.file.display(), engine.page_count());
    for (n, id) in engine.page_ids().into_iter().enumerate() {
        let Some(store) = engine.store(id) else { continue };
        let chars = store.contents().visible_len();
        let height = store.content_height();
        let marker = if height > target { "  (overflows)" } else { "" };
        println!("  page {:>3}: {chars:>6} chars  {height:>7.1}px{marker}", n + 1);
    }

    if let Some(out) = args.out {
        let mut document = Document::new();
        if let Some(title) = title {
            document.title = title;
        }
        document.description = description;
        document.pages = engine.pages();
        let json = FileEnvelope::from_document(&document).to_json_pretty()?;
        std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
        println!("wrote {}", out.display());
    }
    Ok(())
}

fn export_text(args: ExportTextArgs) -> anyhow::Result<()> {
    let (_, _, engine) = paginated(&args.file, args.config.as_deref())?;
    let text: String = engine.pages().iter().map(|p| p.content.text()).collect();
    print!("{text}");
    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let server = RelayServer::new(RelayConfig {
        bind_addr: args.bind,
        broadcast_capacity: args.capacity,
    });
    server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("relay stopped: {e}"))
}
