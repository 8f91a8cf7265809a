use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facematch::{
    config, FaceRecognizer, FaceRegion, FileStore, FlattenExtractor, Identity, MatchResult,
    Pipeline,
};
use facematch_vision::{FaceLocator, FixedRegionLocator, WholeImageLocator};
use log::{debug, info, warn};

#[derive(Parser)]
#[command(name = "facematch")]
#[command(version, about = "Identify people from face images against an enrolled set")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Record store file, overrides the config
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a face image under a new or existing identity
    Enroll {
        /// Image file holding the face
        image: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: u32,
        #[arg(long)]
        profession: String,
        /// Identity to enroll under (a UUID is generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Face box as x,y,width,height (whole image when omitted)
        #[arg(long, value_parser = parse_region)]
        region: Option<FaceRegion>,
    },
    /// Identify the face in an image
    Recognize {
        image: PathBuf,
        #[arg(long, value_parser = parse_region)]
        region: Option<FaceRegion>,
    },
    /// Remove an enrolled identity
    Delete { id: String },
    /// List enrolled identities as JSON
    List,
    /// Show one enrolled identity as JSON
    Show { id: String },
    /// Open config file in editor
    Config,
}

type Recognizer = FaceRecognizer<FileStore>;

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        cfg.store_path = Some(store);
    }

    match cli.command {
        Commands::Enroll {
            image,
            name,
            age,
            profession,
            id,
            region,
        } => {
            let identity = match id {
                Some(id) => Identity::new(id, name, age, profession)?,
                None => Identity::generate(name, age, profession)?,
            };
            enroll(&cfg, identity, &image, region)
        }
        Commands::Recognize { image, region } => recognize(&cfg, &image, region),
        Commands::Delete { id } => delete(&cfg, &id),
        Commands::List => list(&cfg),
        Commands::Show { id } => show(&cfg, &id),
        Commands::Config => open_config(cli.config.as_deref()),
    }
}

fn open_recognizer(cfg: &config::Config) -> Result<Recognizer> {
    let store_path = cfg.store_path();
    let store = FileStore::open(&store_path)
        .with_context(|| format!("opening record store {}", store_path.display()))?;
    debug!("record store {} ({:?})", store.path().display(), store.format());
    let extractor =
        FlattenExtractor::new(cfg.input_size as usize, cfg.working_size as usize);
    FaceRecognizer::open(store, Box::new(extractor), cfg.threshold()?)
        .context("loading enrolled identities")
}

fn pipeline(cfg: &config::Config, region: Option<FaceRegion>) -> Pipeline {
    let locator: Box<dyn FaceLocator> = match region {
        Some(region) => Box::new(FixedRegionLocator::new(region)),
        None => Box::new(WholeImageLocator),
    };
    Pipeline::new(locator, cfg.input_size)
}

fn face_embedding(
    cfg: &config::Config,
    recognizer: &Recognizer,
    image_path: &Path,
    region: Option<FaceRegion>,
) -> Result<facematch::Embedding> {
    let img = image::open(image_path)
        .with_context(|| format!("reading {}", image_path.display()))?;
    let (located, face) = pipeline(cfg, region).canonical_face(&img)?;
    info!("Face at {:?}", located);
    recognizer
        .extract_embedding(&face)
        .context("extracting face embedding")
}

fn enroll(
    cfg: &config::Config,
    identity: Identity,
    image_path: &Path,
    region: Option<FaceRegion>,
) -> Result<()> {
    let recognizer = open_recognizer(cfg)?;
    let embedding = face_embedding(cfg, &recognizer, image_path, region)?;

    let identity_id = identity.identity_id().to_owned();
    let name = identity.name().to_owned();
    recognizer
        .enroll(identity, embedding)
        .context("Failed to save face record")?;

    info!("audit: identity added id={} name={}", identity_id, name);
    println!("{identity_id}");
    Ok(())
}

fn recognize(cfg: &config::Config, image_path: &Path, region: Option<FaceRegion>) -> Result<()> {
    let recognizer = open_recognizer(cfg)?;
    if recognizer.enrolled_count() == 0 {
        warn!("No enrolled identities. Run 'enroll' first.");
    }
    let embedding = face_embedding(cfg, &recognizer, image_path, region)?;

    let result = recognizer.recognize(&embedding)?;
    match &result {
        MatchResult::Match {
            identity_id,
            confidence,
        } => {
            info!(
                "audit: recognition success id={} confidence={:.1}",
                identity_id, confidence
            );
            let identity = recognizer.get(identity_id)?;
            let out = serde_json::json!({
                "recognized": true,
                "identity": identity,
                "confidence": confidence,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        MatchResult::NoMatch => {
            info!("audit: recognition failure, face not recognized");
            println!("{}", serde_json::json!({ "recognized": false }));
        }
    }
    Ok(())
}

fn delete(cfg: &config::Config, identity_id: &str) -> Result<()> {
    let recognizer = open_recognizer(cfg)?;
    recognizer
        .delete_identity(identity_id)
        .with_context(|| format!("Failed to delete identity {identity_id}"))?;
    info!("audit: identity deleted id={}", identity_id);
    Ok(())
}

fn list(cfg: &config::Config) -> Result<()> {
    let recognizer = open_recognizer(cfg)?;
    let identities = recognizer.list_identities()?;
    println!("{}", serde_json::to_string_pretty(&identities)?);
    Ok(())
}

fn show(cfg: &config::Config, identity_id: &str) -> Result<()> {
    let recognizer = open_recognizer(cfg)?;
    let identity = recognizer.get(identity_id)?;
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}

fn open_config(path: Option<&Path>) -> Result<()> {
    let config_path = path.unwrap_or(config::CONFIG_PATH.as_path());
    if !config_path.exists() {
        config::save_config(&config::Config::default(), Some(config_path))?;
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}

fn parse_region(s: &str) -> Result<FaceRegion, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid region {s:?}: {e}"))?;
    match parts.as_slice() {
        &[x, y, w, h] => FaceRegion::new(x, y, w, h).map_err(|e| e.to_string()),
        _ => Err(format!("region must be x,y,width,height, got {s:?}")),
    }
}
