use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use planner::calendar::MemoryCalendarStore;
use planner::config::ProcessorConfig;
use planner::core::PageResult;
use planner::ocr::JsonPayloadOcr;
use planner::processor::{PageResponse, PlannerTextProcessor};
use planner::qr::QrDecoder;
use planner::sync::{self, OrphanAction, SyncOptions};
use planner::time::{normalize_time, normalize_time_range};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "planner",
    about = "Interpret OCR output of a photographed planner page",
    version
)]
struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// JSON processor config; missing fields take their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the IANA timezone name.
    #[arg(long, global = true)]
    timezone: Option<String>,
    /// Override the UTC offset, in minutes east of UTC.
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset_minutes: Option<i32>,
    /// Page width in OCR units (defaults to the widest block edge).
    #[arg(long, global = true)]
    page_width: Option<f64>,
    /// Page height in OCR units (defaults to the lowest block edge).
    #[arg(long, global = true)]
    page_height: Option<f64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interpret an OCR result (block list, envelope, or Read response).
    Process(ProcessArgs),

    /// Decode an 11-digit template payload.
    DecodeQr(DecodeQrArgs),

    /// Canonicalize a time or time range.
    Time(TimeArgs),

    /// Process a page and write its events and todos into a JSON calendar store.
    Import(ImportArgs),
}

#[derive(Debug, Args)]
struct ProcessArgs {
    /// OCR result JSON file.
    input: PathBuf,
    /// Emit the `{success, data | error}` JSON response.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct DecodeQrArgs {
    /// Payload digits; spaces are ignored.
    payload: String,
}

#[derive(Debug, Args)]
struct TimeArgs {
    /// Raw time text, e.g. `900am` or `9-10:30pm`.
    raw: String,
    /// Surrounding words used to infer am/pm.
    #[arg(long, default_value = "")]
    context: String,
    /// Parse as a `start-end` range.
    #[arg(long)]
    range: bool,
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// OCR result JSON file.
    input: PathBuf,
    /// Calendar store JSON file (created when missing).
    #[arg(long)]
    store: PathBuf,
    /// Target calendar id.
    #[arg(long, default_value = "planner")]
    calendar: String,
    /// Reminder list id; defaults to the store's first list.
    #[arg(long)]
    reminders: Option<String>,
    /// Do not create reminders for todos.
    #[arg(long)]
    skip_reminders: bool,
    /// Delete calendar events in the page's range that the page does not list.
    #[arg(long)]
    delete_orphans: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli.config)?;
    match cli.command {
        Commands::Process(args) => handle_process(args, config).await,
        Commands::DecodeQr(args) => handle_decode_qr(args),
        Commands::Time(args) => handle_time(args),
        Commands::Import(args) => handle_import(args, config).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "planner=debug" } else { "planner=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &ConfigArgs) -> Result<ProcessorConfig> {
    let mut config = match &args.config {
        Some(path) => ProcessorConfig::from_json_file(path)?,
        None => ProcessorConfig::default(),
    };
    if let Some(timezone) = &args.timezone {
        config.timezone = timezone.clone();
    }
    if let Some(minutes) = args.utc_offset_minutes {
        config.utc_offset = chrono::FixedOffset::east_opt(minutes * 60)
            .with_context(|| format!("utc offset of {minutes} minutes is out of range"))?;
    }
    if args.page_width.is_some() {
        config.page_width = args.page_width;
    }
    if args.page_height.is_some() {
        config.page_height = args.page_height;
    }
    Ok(config)
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {:?}", path))
}

async fn handle_process(args: ProcessArgs, config: ProcessorConfig) -> Result<()> {
    let ProcessArgs { input, json } = args;
    let bytes = read_input(&input)?;
    let processor = PlannerTextProcessor::new(JsonPayloadOcr, config);
    let response = processor.respond(&bytes).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    match response {
        PageResponse {
            data: Some(page), ..
        } => {
            print!("{}", render_page(&page));
            Ok(())
        }
        PageResponse { error, .. } => {
            let message = error.unwrap_or_else(|| "unknown failure".to_string());
            anyhow::bail!("{message}; try again with a clearer photo")
        }
    }
}

fn handle_decode_qr(args: DecodeQrArgs) -> Result<()> {
    let qr = QrDecoder::default()
        .decode_payload(&args.payload)
        .with_context(|| format!("decoding {:?}", args.payload))?;
    println!("{}", serde_json::to_string_pretty(&qr)?);
    for day in qr.page_days() {
        println!("{} {}", day.date, day.day_name);
    }
    Ok(())
}

fn handle_time(args: TimeArgs) -> Result<()> {
    let TimeArgs {
        raw,
        context,
        range,
    } = args;
    let canonical = if range {
        normalize_time_range(&raw, &context).map(|t| t.to_string())
    } else {
        normalize_time(&raw, &context, None).map(|t| t.to_string())
    };
    match canonical {
        Some(text) => {
            println!("{text}");
            Ok(())
        }
        None => anyhow::bail!("{raw:?} is not a recognizable time"),
    }
}

async fn handle_import(args: ImportArgs, config: ProcessorConfig) -> Result<()> {
    let ImportArgs {
        input,
        store: store_path,
        calendar,
        reminders,
        skip_reminders,
        delete_orphans,
    } = args;

    let bytes = read_input(&input)?;
    let opts = SyncOptions::from_config(calendar.clone(), &config);
    let processor = PlannerTextProcessor::new(JsonPayloadOcr, config);
    let page = processor
        .process_page(&bytes)
        .await
        .with_context(|| format!("processing {:?}", input))?;

    let store = MemoryCalendarStore::load(&store_path)?;
    store.ensure_calendar(&calendar).await;

    let events = sync::import_events(&store, &page, &opts).await;
    println!(
        "Events: {} created, {} already on the calendar, {} failed",
        events.created,
        events.duplicates,
        events.errors.len()
    );
    for err in &events.errors {
        eprintln!("  {}: {}", err.title, err.message);
    }

    if !skip_reminders {
        let list = sync::resolve_reminder_list(&store, reminders.as_deref()).await?;
        let todos = sync::create_reminders(&store, &page, &list.id, &opts).await;
        println!(
            "Reminders ({}): {} created, {} already listed, {} failed",
            list.title,
            todos.created,
            todos.duplicates,
            todos.errors.len()
        );
        for err in &todos.errors {
            eprintln!("  {}: {}", err.title, err.message);
        }
    }

    let orphans = sync::find_orphaned_events(&store, &page, &opts).await?;
    if !orphans.is_empty() {
        println!("Not on the page:");
        for event in &orphans {
            println!("  {} {}", event.start_date.format("%Y-%m-%d %H:%M"), event.title);
        }
        let action = if delete_orphans {
            OrphanAction::Delete
        } else {
            OrphanAction::WriteInPlanner
        };
        let outcome = sync::apply_orphan_actions(
            &store,
            orphans.into_iter().map(|e| (e, action)).collect(),
        )
        .await;
        if delete_orphans {
            println!("Deleted {} event(s)", outcome.deleted);
        }
        for err in &outcome.errors {
            eprintln!("  {}: {}", err.title, err.message);
        }
    }

    store
        .save(&store_path)
        .await
        .with_context(|| format!("saving {:?}", store_path))?;
    Ok(())
}

fn render_page(page: &PageResult) -> String {
    let mut out = String::new();
    let meta = &page.metadata;
    let template = match &meta.qr_data {
        Some(qr) => format!(
            "template {} ({} page from {})",
            qr.template_code,
            if qr.is_left_page { "left" } else { "right" },
            qr.start_date
        ),
        None => "no template code".to_string(),
    };
    let year = page
        .year
        .map(|y| format!("{y} "))
        .unwrap_or_default();
    out.push_str(&format!(
        "{year}{template}, confidence {:.2}\n",
        meta.confidence
    ));
    for section in &page.sections {
        let date = section
            .date
            .map(|d| format!(" {d}"))
            .unwrap_or_default();
        out.push_str(&format!("{}{}\n", section.day, date));
        for event in &section.events {
            out.push_str(&format!("  {:<15} {}\n", event.when.to_string(), event.title));
        }
        for todo in &section.todos {
            out.push_str(&format!(
                "  [ ] {} (due {})\n",
                todo.text,
                todo.reminder_time.format("%H:%M")
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const PAGE: &str = r#"[
        {"text":"Monday, 6 January 2025","bounding":{"top":0,"left":0,"width":300,"height":30}},
        {"text":"9:00am Dentist","confidence":0.9,"bounding":{"top":50,"left":0,"width":300,"height":30}},
        {"text":"things to do","bounding":{"top":0,"left":600,"width":200,"height":30}},
        {"text":"- Call mom","bounding":{"top":50,"left":600,"width":200,"height":30}}
    ]"#;

    fn config_args(config: Option<PathBuf>) -> ConfigArgs {
        ConfigArgs {
            config,
            timezone: None,
            utc_offset_minutes: None,
            page_width: Some(1000.0),
            page_height: None,
        }
    }

    #[test]
    fn cli_flags_override_config_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("planner.json");
        fs::write(&path, r#"{"timezone":"Europe/Paris","utcOffsetSeconds":3600}"#)
            .expect("write config");

        let mut args = config_args(Some(path));
        args.utc_offset_minutes = Some(-300);
        let config = load_config(&args).expect("load config");
        assert_eq!(config.timezone, "Europe/Paris");
        assert_eq!(config.utc_offset.local_minus_utc(), -300 * 60);
        assert_eq!(config.page_width, Some(1000.0));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let args = config_args(Some(tmp.path().join("absent.json")));
        assert!(load_config(&args).is_err());
    }

    #[tokio::test]
    async fn import_writes_store_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = tmp.path().join("page.json");
        let store_path = tmp.path().join("store.json");
        fs::write(&input, PAGE).expect("write page");

        let config = load_config(&config_args(None)).expect("config");
        let args = ImportArgs {
            input: input.clone(),
            store: store_path.clone(),
            calendar: "family".into(),
            reminders: None,
            skip_reminders: false,
            delete_orphans: false,
        };
        handle_import(args, config).await.expect("import");

        let store = MemoryCalendarStore::load(&store_path).expect("reload");
        let events = store.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "dentist");
        assert_eq!(events[0].calendar_id, "family");
        assert_eq!(store.reminders().await[0].title, "Call mom");
    }

    #[tokio::test]
    async fn render_lists_items_per_day() {
        let processor = PlannerTextProcessor::new(
            JsonPayloadOcr,
            load_config(&config_args(None)).expect("config"),
        );
        let page = processor
            .process_page(PAGE.as_bytes())
            .await
            .expect("process");
        let text = render_page(&page);
        assert!(text.contains("Monday 2025-01-06"));
        assert!(text.contains("9:00am"));
        assert!(text.contains("dentist"));
        assert!(text.contains("[ ] Call mom (due 17:00)"));
    }
}
