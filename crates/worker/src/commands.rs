use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use styler_comfyui::backend::ComfyUIBackend;
use styler_comfyui::readiness::{wait_until_ready, BackoffConfig};
use styler_core::error::CoreError;
use styler_core::manifest::{WeightSource, WeightsManifest, WeightsMap};
use styler_core::mutation::apply_model;
use styler_pipeline::config::PipelineConfig;
use styler_pipeline::predictor::Predictor;
use styler_pipeline::templates::{TemplateKind, TemplateStore};
use styler_pipeline::weights::PreinstalledWeights;
use tokio_util::sync::CancellationToken;

use crate::cli::{PredictArgs, WeightsArgs};

/// Exit status for a request the caller has to fix.
pub const EXIT_USER_ERROR: u8 = 2;
/// Exit status for anything else that went wrong.
pub const EXIT_FAILURE: u8 = 1;

/// Whether `err` was caused by the caller's input, looking through any
/// context added on the way up.
pub fn is_user_error(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<CoreError>())
        .any(CoreError::is_user_error)
}

pub fn exit_code(err: &anyhow::Error) -> u8 {
    if is_user_error(err) {
        EXIT_USER_ERROR
    } else {
        EXIT_FAILURE
    }
}

/// Wait for ComfyUI, set up the predictor, and run one prediction.
pub async fn predict(args: PredictArgs, config: &PipelineConfig) -> anyhow::Result<()> {
    let backend = Arc::new(ComfyUIBackend::new(
        config.comfyui_url.clone(),
        config.comfyui_ws_url.clone(),
    ));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    wait_until_ready(backend.api(), &BackoffConfig::default(), &cancel)
        .await
        .context("ComfyUI server is not available")?;

    let predictor = Predictor::setup(
        config,
        args.variant.into(),
        backend,
        Arc::new(PreinstalledWeights),
    )
    .await
    .context("Predictor setup failed")?;

    let output = predictor
        .predict(args.to_input())
        .await
        .context("Prediction failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for file in &output.files {
            println!("{}", file.path.display());
        }
        println!("seed: {}", output.seed);
    }

    Ok(())
}

/// One row of the `weights` listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightEntry {
    pub name: String,
    #[serde(flatten)]
    pub source: WeightSource,
    pub installed: bool,
}

/// Weights the chosen template needs for `--model`, in graph order.
pub fn weight_entries(args: &WeightsArgs, config: &PipelineConfig) -> anyhow::Result<Vec<WeightEntry>> {
    let kind = TemplateKind::for_structure(args.structure);
    let templates = match kind {
        TemplateKind::Base => TemplateStore::load_base(&config.base_template)?,
        TemplateKind::WithStructure => {
            TemplateStore::load(&config.base_template, &config.structure_template)?
        }
    };

    let mut graph = templates.instantiate(kind)?;
    apply_model(&mut graph, args.model)?;

    let manifest = WeightsManifest::load(&config.manifest_path)?;
    let map = WeightsMap::build(&manifest, &config.weights);

    Ok(map
        .required_by(&graph)
        .into_iter()
        .map(|w| {
            let installed = w.local_path().exists();
            WeightEntry {
                name: w.name,
                source: w.source,
                installed,
            }
        })
        .collect())
}

/// Print the weights the chosen template needs for `--model`.
pub fn weights(args: WeightsArgs, config: &PipelineConfig) -> anyhow::Result<()> {
    let entries = weight_entries(&args, config)?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
