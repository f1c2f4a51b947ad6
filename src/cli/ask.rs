use crate::cli::AskArgs;
use crate::config::{Config, StrategyKind};
use crate::observe::TracingSink;
use crate::pipeline::{Collaborators, Pipeline};
use crate::provider::{CliGenerator, CorpusSearch, MemoryCheckpoints};
use crate::state::RequestState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub async fn execute(args: AskArgs) -> anyhow::Result<()> {
    // Load and validate config
    info!("Loading config from {:?}", args.config);
    let mut config = Config::load(&args.config)?;

    // Apply CLI overrides
    if args.corpus.is_some() {
        config.corpus = args.corpus.clone();
    }

    let generator = Arc::new(CliGenerator {
        binary: config.generator.binary.clone(),
        args: config.generator.args.clone(),
        timeout: Duration::from_secs(config.timeouts.generation_secs),
    });

    let text = match &config.corpus {
        Some(path) => {
            let corpus = CorpusSearch::load(path)?;
            if corpus.is_empty() {
                warn!("Corpus {:?} holds no documents; retrieval will find nothing", path);
            }
            info!("Loaded {} corpus documents from {:?}", corpus.len(), path);
            Some(Arc::new(corpus) as Arc<dyn crate::provider::TextSearch>)
        }
        None => None,
    };

    // The CLI wires no embedding backend, so a configured semantic strategy
    // cannot run here. Drop it and keep going on what remains.
    if config
        .retrieve
        .strategies
        .contains(&StrategyKind::Semantic)
    {
        warn!("No embedding backend wired; dropping the semantic strategy for this run");
        config
            .retrieve
            .strategies
            .retain(|s| *s != StrategyKind::Semantic);
    }
    if config.retrieve.strategies.is_empty() {
        anyhow::bail!("no runnable retrieval strategy; configure a corpus for lexical search");
    }

    let checkpoints = args
        .thread
        .as_ref()
        .map(|_| Arc::new(MemoryCheckpoints::new()) as Arc<dyn crate::provider::CheckpointStore>);

    let collaborators = Collaborators {
        generator,
        embedder: None,
        vector: None,
        text,
        sink: Arc::new(TracingSink),
        checkpoints,
    };

    let pipeline = Pipeline::new(config, collaborators)?;

    let state = RequestState::new(&args.query)?.with_raw_texts(args.raw_texts.clone());
    let state = pipeline.run(state, args.thread.as_deref()).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    print_report(&state);
    Ok(())
}

fn print_report(state: &RequestState) {
    println!("\n=== Answer ===\n");
    println!("{}", state.answer);

    if !state.documents.is_empty() {
        println!("\n=== Sources ===\n");
        for doc in &state.documents {
            println!("  [{}] score {:.4}", doc.id, doc.score);
        }
    }

    if !state.warnings.is_empty() {
        println!("\n=== Warnings ===\n");
        for warning in &state.warnings {
            println!("  {}", warning);
        }
    }

    if let Some(error) = &state.error {
        println!("\n=== Error ===\n");
        println!("  {}: {}", error.tag, error.detail);
    }

    println!(
        "\nrequest {} route {} took {} ms",
        state.request_id,
        state.route,
        state
            .metrics
            .get("elapsed_ms")
            .cloned()
            .unwrap_or_default()
    );
}
