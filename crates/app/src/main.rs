use anyhow::Context;
use clap::{Parser, ValueEnum};
use idscan_core::{BatchResult, Outcome};
use idscan_ocr::{
    run_batch, FieldExtractor, OcrBackend, OcrError, PoolError, SidecarRecognizer, WorkerPool,
};
use std::path::PathBuf;
use tracing::{error, info, warn};

mod scan;
mod settings;

use settings::AppSettings;

/// Extract identity fields from a directory of ID-card scans.
#[derive(Debug, Parser)]
#[command(name = "idscan", version)]
struct Args {
    /// Directory searched recursively for .jpg, .jpeg, .png and .bmp files.
    input_dir: PathBuf,

    /// Directory that receives ocr_results.json.
    output_dir: PathBuf,

    /// Worker threads, each with its own OCR engine [default: CPU count].
    #[arg(long)]
    workers: Option<usize>,

    /// Jobs that may wait in the queue at once [default: 1000].
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Config file [default: idscan.toml in the user config directory].
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Backend::Sidecar)]
    backend: Backend,

    /// Where the sidecar backend looks for `<stem>_res.json` files
    /// [default: next to each image].
    #[arg(long)]
    sidecar_dir: Option<PathBuf>,

    /// Tesseract data directory.
    #[arg(long)]
    tessdata: Option<String>,

    /// Tesseract language.
    #[arg(long, default_value = "eng")]
    lang: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Read detections written by an external OCR run.
    Sidecar,
    /// Run Tesseract in-process (needs the `tesseract` feature).
    Tesseract,
}

/// What each worker needs to build its own engine.
#[derive(Debug, Clone)]
struct EngineSpec {
    backend: Backend,
    sidecar_dir: Option<PathBuf>,
    #[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
    tessdata: Option<String>,
    #[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
    lang: String,
}

impl EngineSpec {
    fn build(&self, worker_id: usize) -> Result<Box<dyn OcrBackend>, OcrError> {
        tracing::debug!("Building {:?} engine for worker {worker_id}", self.backend);
        match self.backend {
            Backend::Sidecar => Ok(Box::new(SidecarRecognizer::new(self.sidecar_dir.clone()))),
            #[cfg(feature = "tesseract")]
            Backend::Tesseract => Ok(Box::new(idscan_ocr::TesseractRecognizer::new(
                self.tessdata.as_deref(),
                &self.lang,
            )?)),
            #[cfg(not(feature = "tesseract"))]
            Backend::Tesseract => Err(OcrError::NotAvailable),
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let settings = AppSettings::load(args.config.as_deref()).await?;
    let extractor = FieldExtractor::new(settings.extraction_config()?);
    let pool_config = settings.pool_config(args.workers, args.queue_capacity)?;

    let engine = EngineSpec {
        backend: args.backend,
        sidecar_dir: args.sidecar_dir.clone(),
        tessdata: args.tessdata.clone(),
        lang: args.lang.clone(),
    };
    if engine.backend == Backend::Tesseract && !cfg!(feature = "tesseract") {
        return Err(OcrError::NotAvailable.into());
    }

    let images = scan::find_images(&args.input_dir)
        .with_context(|| format!("Cannot scan input directory {}", args.input_dir.display()))?;
    if images.is_empty() {
        warn!("No images found in {}", args.input_dir.display());
    } else {
        info!("Found {} images in {}", images.len(), args.input_dir.display());
    }

    // Workers are plain OS threads; keep them off the async runtime.
    let batch = tokio::task::spawn_blocking(move || -> Result<BatchResult, PoolError> {
        let pool = WorkerPool::start(pool_config, extractor, move |id| engine.build(id))?;
        let batch = run_batch(&pool, images, |done, total, report| match &report.outcome {
            Outcome::Success { .. } => info!("✅ {done}/{total}: {}", report.path.display()),
            Outcome::Failure { error } => error!("❌ {}: {error}", report.path.display()),
        });
        pool.shutdown();
        batch
    })
    .await
    .context("Batch task aborted")??;

    let artifact = idscan_storage::artifact_path(&args.output_dir);
    idscan_storage::write_artifact(&artifact, &batch)
        .await
        .with_context(|| format!("Failed to write {}", artifact.display()))?;

    info!(
        "Processed {} images: {} succeeded, {} failed",
        batch.len(),
        batch.success_count(),
        batch.failure_count()
    );
    info!("Results saved to {}", artifact.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_dirs_and_flags() {
        let args = Args::try_parse_from([
            "idscan", "scans", "out", "--workers", "4", "--sidecar-dir", "ocr",
        ])
        .unwrap();
        assert_eq!(args.input_dir, PathBuf::from("scans"));
        assert_eq!(args.output_dir, PathBuf::from("out"));
        assert_eq!(args.workers, Some(4));
        assert_eq!(args.backend, Backend::Sidecar);
        assert_eq!(args.sidecar_dir, Some(PathBuf::from("ocr")));
    }

    #[test]
    fn output_dir_is_required() {
        assert!(Args::try_parse_from(["idscan", "scans"]).is_err());
    }

    #[test]
    fn sidecar_engine_builds() {
        let spec = EngineSpec {
            backend: Backend::Sidecar,
            sidecar_dir: None,
            tessdata: None,
            lang: "eng".into(),
        };
        assert!(spec.build(0).is_ok());
    }

    #[cfg(not(feature = "tesseract"))]
    #[test]
    fn tesseract_without_feature_is_unavailable() {
        let spec = EngineSpec {
            backend: Backend::Tesseract,
            sidecar_dir: None,
            tessdata: None,
            lang: "eng".into(),
        };
        assert!(matches!(spec.build(0), Err(OcrError::NotAvailable)));
    }
}
