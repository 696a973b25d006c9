//! CampusDesk: campus administration assistant over scraped office pages.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use campusdesk_chat::{Answerer, ChatMessage, GeminiClient, GenerationConfig};
use campusdesk_core::{CampusConfig, Error};
use campusdesk_resolve::{RetrievalEngine, RetrievalMode, RetrievalOutcome};

mod indexing;

fn resolve_data_dir() -> PathBuf {
    std::env::var("CAMPUSDESK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("CampusDesk: campus administration assistant");
    println!();
    println!("Usage: campusdesk <command>");
    println!();
    println!("Commands:");
    println!("  process [data-dir]                 Clean scraped pages and write the chunk artifact");
    println!("  index [data-dir]                   Embed the chunk artifact into the vector collection");
    println!("  query <text> [--single-stage] [--json]");
    println!("                                     Retrieve ranked chunks for a question");
    println!("  ask <text> [--identity <hint>] [--history <file>]");
    println!("                                     Retrieve and generate an answer; a JSON");
    println!("                                     history turns a follow-up into a full question");
    println!("  help                               Show this help message");
    println!();
    println!("Environment: CAMPUSDESK_DATA_DIR, CAMPUSDESK_COLLECTION, CAMPUSDESK_EMBEDDING_DIM,");
    println!("             GEMINI_API_KEY, RUST_LOG");
}

/// Positional words joined as the question, plus the flags that were seen.
struct QueryArgs {
    text: String,
    single_stage: bool,
    json: bool,
    identity: String,
    history: Option<PathBuf>,
}

fn parse_query_args(args: &[String]) -> anyhow::Result<QueryArgs> {
    let mut words = Vec::new();
    let mut parsed = QueryArgs {
        text: String::new(),
        single_stage: false,
        json: false,
        identity: String::new(),
        history: None,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--single-stage" => parsed.single_stage = true,
            "--json" => parsed.json = true,
            "--identity" => {
                parsed.identity = iter.next().context("--identity needs a value")?.clone();
            }
            "--history" => {
                parsed.history = Some(PathBuf::from(iter.next().context("--history needs a file")?));
            }
            _ => words.push(arg.as_str()),
        }
    }

    parsed.text = words.join(" ").trim().to_string();
    if parsed.text.is_empty() {
        bail!("missing question text");
    }
    Ok(parsed)
}

fn load_config(data_dir: PathBuf) -> anyhow::Result<CampusConfig> {
    info!("Data directory: {}", data_dir.display());
    CampusConfig::from_env(&data_dir)
        .with_context(|| format!("cannot prepare data directory {}", data_dir.display()))
}

/// Earlier turns as a JSON array of `{"role": "user" | "assistant", "content": ...}`.
fn load_history(path: &Path) -> anyhow::Result<Vec<ChatMessage>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read history {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid history in {}", path.display()))
}

fn print_outcome(outcome: &RetrievalOutcome) {
    println!("intent: {}  path: {:?}", outcome.intent, outcome.path);
    if !outcome.unit_ids.is_empty() {
        println!("units: {}", outcome.unit_ids.join(", "));
    }
    println!();

    let result = &outcome.result;
    for (i, ((doc, meta), distance)) in result
        .documents()
        .iter()
        .zip(result.metadatas())
        .zip(result.distances())
        .enumerate()
    {
        let preview: String = doc.chars().take(120).collect();
        println!(
            "{:>2}. [{:.3}] ({}) {}",
            i + 1,
            distance,
            meta.chunk_type.as_str(),
            meta.title
        );
        println!("    {}", preview.replace('\n', " "));
        println!("    {}", meta.url);
    }
    if result.is_empty() {
        println!("(no results)");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "process" => {
            let data_dir = args.get(2).map(PathBuf::from).unwrap_or_else(resolve_data_dir);
            let config = load_config(data_dir)?;
            let count = indexing::process(&config)?;
            println!("Wrote {} chunks to {}", count, config.data_paths.chunks_file.display());
        }
        "index" => {
            let data_dir = args.get(2).map(PathBuf::from).unwrap_or_else(resolve_data_dir);
            let config = load_config(data_dir)?;
            if !indexing::artifact_exists(&config.data_paths.chunks_file) {
                bail!(
                    "{} not found; run 'campusdesk process' first",
                    config.data_paths.chunks_file.display()
                );
            }
            let count = indexing::index(&config)?;
            println!("Indexed {} chunks into '{}'", count, config.collection_name);
        }
        "query" => {
            let query = parse_query_args(&args[2..])?;
            let config = load_config(resolve_data_dir())?;
            let collection = open(&config)?;
            let engine = RetrievalEngine::with_settings(&collection, config.retrieval.clone());

            let mode = if query.single_stage {
                RetrievalMode::SingleStage
            } else {
                RetrievalMode::TwoStage
            };
            let outcome = engine.retrieve_with(&query.text, mode)?;
            if query.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
        "ask" => {
            let query = parse_query_args(&args[2..])?;
            let config = load_config(resolve_data_dir())?;
            let generation = GenerationConfig::load(&config.data_paths.llm_config_file);
            let client = GeminiClient::from_config(&generation)?;
            let answerer = Answerer::new(client, generation.retry.clone());

            let history = match &query.history {
                Some(path) => load_history(path)?,
                None => Vec::new(),
            };
            let question = answerer.rewrite_query(&history, &query.text).await;
            if question != query.text {
                info!("Follow-up rewritten as: {}", question);
            }

            let collection = open(&config)?;
            let engine = RetrievalEngine::with_settings(&collection, config.retrieval.clone());
            let outcome = engine.retrieve(&question)?;

            match answerer.answer(&question, &outcome.result, &query.identity).await {
                Ok(answer) => println!("{}", answer.text),
                Err(Error::Quota(msg)) => {
                    bail!("request quota exhausted ({}); try again later", msg)
                }
                Err(e) => return Err(e.into()),
            }
            println!();
            for (i, meta) in outcome.result.metadatas().iter().enumerate() {
                println!("[{}] {} {}", i + 1, meta.title, meta.url);
            }
        }
        "--help" | "-h" | "help" => print_help(),
        other => {
            eprintln!("Unknown command: {}. Use 'campusdesk help' for usage.", other);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn open(config: &CampusConfig) -> anyhow::Result<campusdesk_store::SqliteCollection> {
    match indexing::open_collection(config) {
        Err(e @ Error::DimensionMismatch { .. }) => {
            Err(anyhow::Error::new(e).context("re-run 'campusdesk index' to rebuild the collection"))
        }
        other => Ok(other?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_parse_query_flags() {
        let parsed = parse_query_args(&args(&["註冊組", "在哪裡", "--single-stage", "--json"])).unwrap();
        assert_eq!(parsed.text, "註冊組 在哪裡");
        assert!(parsed.single_stage);
        assert!(parsed.json);
        assert!(parsed.identity.is_empty());
    }

    #[test]
    fn test_parse_identity() {
        let parsed = parse_query_args(&args(&["--identity", "- 學制：碩士", "休學"])).unwrap();
        assert_eq!(parsed.text, "休學");
        assert_eq!(parsed.identity, "- 學制：碩士");
        assert!(parse_query_args(&args(&["休學", "--identity"])).is_err());
    }

    #[test]
    fn test_parse_history() {
        let parsed = parse_query_args(&args(&["電話呢", "--history", "turns.json"])).unwrap();
        assert_eq!(parsed.text, "電話呢");
        assert_eq!(parsed.history, Some(PathBuf::from("turns.json")));
        assert!(parse_query_args(&args(&["電話呢", "--history"])).is_err());
    }

    #[test]
    fn test_load_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turns.json");
        std::fs::write(
            &path,
            r#"[{"role": "user", "content": "註冊組在哪"}, {"role": "assistant", "content": "行政大樓1樓"}]"#,
        )
        .unwrap();

        let history = load_history(&path).unwrap();
        assert_eq!(history, vec![ChatMessage::user("註冊組在哪"), ChatMessage::assistant("行政大樓1樓")]);

        std::fs::write(&path, "not json").unwrap();
        assert!(load_history(&path).is_err());
        assert!(load_history(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_parse_requires_text() {
        assert!(parse_query_args(&args(&["--json"])).is_err());
        assert!(parse_query_args(&[]).is_err());
    }
}
