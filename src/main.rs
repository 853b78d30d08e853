// ABOUTME: CLI entrypoint for pixseek command
// ABOUTME: Handles logging setup, error exit codes, and command dispatch

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pixseek::{
    cli::{Cli, Commands},
    model::{LastSearch, ScoredResult, SearchRequest},
    search::{SearchConfig, SearchOrchestrator},
    storage::Paths,
    Error, Result,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("pixseek: [E{}] {}", e.exit_code(), e);
        std::process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = Paths::new(cli.data_dir.clone())?.with_models_dir(cli.model_dir.clone());
    paths.ensure_dirs()?;

    match cli.command() {
        Commands::Search {
            folder,
            image,
            text,
            min_score,
            batch_size,
            workers,
            no_describe,
            json,
        } => {
            let request = match (image, text) {
                (Some(image), None) => SearchRequest::image(folder, image),
                (None, Some(text)) => SearchRequest::text(folder, text),
                _ => {
                    return Err(Error::Validation(
                        "pass exactly one of --image or --text".into(),
                    ))
                }
            }
            .with_min_score(min_score)
            .with_batch_size(batch_size);
            // fail before any model download
            request.validate()?;

            let config = SearchConfig {
                workers,
                describe_results: !no_describe,
                ..SearchConfig::for_paths(&paths)
            };
            let orchestrator = load_orchestrator(&paths, config)?;
            let results = runtime()?.block_on(search(&orchestrator, request))?;
            print_results(&results, json)?;
        }
        Commands::Last { json } => match pixseek::storage::load_last_search(&paths.settings_path)? {
            Some(record) => print_last(&record, json)?,
            None => println!("No previous search"),
        },
        Commands::FetchModel => {
            let model_paths = fetch_model(&paths)?;
            println!("Model ready in {}", display_parent(&model_paths));
        }
        #[cfg(feature = "mcp")]
        Commands::Serve => {
            let orchestrator = load_orchestrator(&paths, SearchConfig::for_paths(&paths))?;
            runtime()?.block_on(pixseek::mcp::serve_mcp(orchestrator))?;
        }
    }

    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

#[cfg(feature = "clip")]
fn fetch_model(paths: &Paths) -> Result<PathBuf> {
    let model_paths = pixseek::embeddings::ensure_model(&paths.models_dir)?;
    Ok(model_paths.vision_model_path)
}

#[cfg(not(feature = "clip"))]
fn fetch_model(_paths: &Paths) -> Result<PathBuf> {
    Err(Error::Embedding(
        "pixseek was built without the clip feature".into(),
    ))
}

#[cfg(feature = "clip")]
fn load_orchestrator(paths: &Paths, config: SearchConfig) -> Result<SearchOrchestrator> {
    use pixseek::embeddings::{ensure_model, ClipEngine};
    use std::sync::Arc;

    // reqwest's blocking client must run outside the tokio runtime
    let model_paths = ensure_model(&paths.models_dir)?;
    let engine = ClipEngine::load(&model_paths)?;
    Ok(SearchOrchestrator::new(Arc::new(engine), config))
}

#[cfg(not(feature = "clip"))]
fn load_orchestrator(_paths: &Paths, _config: SearchConfig) -> Result<SearchOrchestrator> {
    Err(Error::Embedding(
        "pixseek was built without the clip feature".into(),
    ))
}

async fn search(orchestrator: &SearchOrchestrator, request: SearchRequest) -> Result<Vec<ScoredResult>> {
    let job_id = orchestrator.submit(request).await?;

    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::default_bar().template("{msg:24} [{bar:40.cyan/blue}] {pos}%") {
        pb.set_style(style.progress_chars("#>-"));
    }

    let done = orchestrator
        .follow(&job_id, |snapshot| {
            pb.set_position(snapshot.progress as u64);
            pb.set_message(snapshot.message.clone());
        })
        .await?;
    pb.finish_and_clear();

    done.into_results()
}

fn print_results(results: &[ScoredResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No matching images");
        return Ok(());
    }

    for result in results {
        let dims = match (result.width, result.height) {
            (Some(w), Some(h)) => format!("  {}x{}", w, h),
            _ => String::new(),
        };
        println!("{:.3}  {}{}", result.score, result.path.display(), dims);
        if let Some(description) = &result.description {
            println!("       {}", description);
        }
    }
    Ok(())
}

fn print_last(record: &LastSearch, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!(
        "Last {:?} search for \"{}\" in {} at {}",
        record.kind,
        record.query,
        record.folder.display(),
        record.timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    print_results(&record.results, false)
}

fn display_parent(path: &std::path::Path) -> String {
    path.parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}
