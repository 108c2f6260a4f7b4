use clap::{Parser, Subcommand};
use fabula::{
    create_pool, shutdown_channel, telemetry, BlobStore, Broker, Dispatcher,
    ElevenLabsClient, FabulaConfig, FabulaResult, FileSystemBlobStore, MockAudioSynthesizer,
    MockImageGenerator, MockTextGenerator, OpenRouterClient, PipelineContext, PipelineSettings,
    PostgresStoryRepository, ProviderSet, RedisBroker, StoryId, StoryRepository, SubmitRequest,
    SupabaseBlobStore, TogetherClient, Worker,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fabula")]
#[command(about = "Asynchronous illustrated audio story generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the story generation worker
    Worker,

    /// Submit a story and print its id
    Submit {
        /// Story title
        #[arg(short, long)]
        title: String,

        /// Generation prompt
        #[arg(short, long)]
        prompt: String,

        /// Submitting user id
        #[arg(short, long)]
        user: Option<String>,

        /// Style hint (fantasy, sci-fi, ...)
        #[arg(short, long)]
        style: Option<String>,

        /// Scene count hint (1-10)
        #[arg(short = 'n', long)]
        scenes: Option<u32>,
    },

    /// Print a story's status
    Status {
        /// Story identifier
        story_id: String,
    },

    /// Print a story with its scenes as JSON
    Show {
        /// Story identifier
        story_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_telemetry();

    let cli = Cli::parse();
    let config = FabulaConfig::load()?;

    match cli.command {
        Commands::Worker => run_worker(&config).await?,
        Commands::Submit {
            title,
            prompt,
            user,
            style,
            scenes,
        } => {
            let dispatcher = build_dispatcher(&config)?;
            let story_id = dispatcher
                .submit(SubmitRequest {
                    title,
                    prompt,
                    user_id: user,
                    style,
                    num_scenes: scenes,
                })
                .await?;
            println!("{story_id}");
        }
        Commands::Status { story_id } => {
            let story_id: StoryId = story_id.parse()?;
            let dispatcher = build_dispatcher(&config)?;
            let (status, error) = dispatcher.get_status(story_id).await?;
            match error {
                Some(error) => println!("{status} ({error})"),
                None => println!("{status}"),
            }
        }
        Commands::Show { story_id } => {
            let story_id: StoryId = story_id.parse()?;
            let dispatcher = build_dispatcher(&config)?;
            let (story, scenes) = dispatcher.get_story(story_id).await?;
            let output = serde_json::json!({ "story": story, "scenes": scenes });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

async fn run_worker(config: &FabulaConfig) -> FabulaResult<()> {
    let ctx = Arc::new(PipelineContext {
        repository: build_repository()?,
        broker: build_broker(config)?,
        blobs: build_blobs(config)?,
        providers: build_providers(config)?,
        settings: PipelineSettings::from_config(config),
    });

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    Worker::new(ctx, shutdown_rx).run().await;
    Ok(())
}

/// Resolves on SIGINT or, on unix, SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(_) => {
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn build_dispatcher(config: &FabulaConfig) -> FabulaResult<Dispatcher> {
    Ok(Dispatcher::new(build_repository()?, build_broker(config)?))
}

fn build_repository() -> FabulaResult<Arc<dyn StoryRepository>> {
    let pool = create_pool()?;
    Ok(Arc::new(PostgresStoryRepository::new(pool)))
}

fn build_broker(config: &FabulaConfig) -> FabulaResult<Arc<dyn Broker>> {
    let broker = RedisBroker::new(
        &config.broker.redis_url,
        config.pipeline.queue_name.clone(),
        config.pipeline.max_attempts,
    )?;
    Ok(Arc::new(broker))
}

fn build_blobs(config: &FabulaConfig) -> FabulaResult<Arc<dyn BlobStore>> {
    let storage = &config.storage;
    match &storage.supabase_url {
        Some(url) => Ok(Arc::new(SupabaseBlobStore::new(
            url.clone(),
            storage.bucket_images.clone(),
            storage.bucket_audio.clone(),
        )?)),
        None => Ok(Arc::new(FileSystemBlobStore::new(
            &storage.filesystem_root,
            storage.bucket_images.clone(),
            storage.bucket_audio.clone(),
        )?)),
    }
}

fn build_providers(config: &FabulaConfig) -> FabulaResult<ProviderSet> {
    if config.mock.mock_ai {
        tracing::info!("mock mode enabled, using canned providers");
        return Ok(ProviderSet {
            text: Arc::new(MockTextGenerator::new(&config.mock)),
            image: Arc::new(MockImageGenerator::new(&config.mock)),
            audio: Arc::new(MockAudioSynthesizer::new(&config.mock)),
        });
    }

    Ok(ProviderSet {
        text: Arc::new(OpenRouterClient::new(&config.text)?),
        image: Arc::new(TogetherClient::new(&config.image)?),
        audio: Arc::new(ElevenLabsClient::new(&config.audio)?),
    })
}
