//! The prediction entry point.
//!
//! A [`Predictor`] is set up once (templates, manifest, base-template
//! weights) and then runs one prediction at a time: validate, stage
//! inputs, mutate a fresh graph, make its weights available, execute it
//! on the backend, and post-process whatever lands in the output
//! directory.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use styler_core::backend::{ExecutionBackend, WeightsFetcher};
use styler_core::error::CoreError;
use styler_core::manifest::{WeightsManifest, WeightsMap};
use styler_core::mutation::{apply_params, NegativePromptPolicy};
use styler_core::params::PredictionParams;

use crate::config::PipelineConfig;
use crate::inputs::{stage_image, STRUCTURE_IMAGE_NAME, STYLE_IMAGE_NAME};
use crate::outputs::{collect_outputs, OutputFile};
use crate::postprocess::postprocess;
use crate::staging::StagingArea;
use crate::templates::{TemplateKind, TemplateStore};
use crate::weights::ensure_weights;

/// Which deployment flavour is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictorVariant {
    /// Single template; structure images are refused; negative prompt
    /// is sent verbatim.
    Base,
    /// Both templates; the negative prompt gets the safety prefix.
    #[default]
    WithStructure,
}

impl PredictorVariant {
    pub fn negative_prompt_policy(self) -> NegativePromptPolicy {
        match self {
            Self::Base => NegativePromptPolicy::Verbatim,
            Self::WithStructure => NegativePromptPolicy::SafetyPrefixed,
        }
    }
}

/// One prediction request.
#[derive(Debug, Clone, Default)]
pub struct PredictionInput {
    /// Image whose style is copied. Required.
    pub style_image: Option<PathBuf>,
    /// Optional image whose layout is kept; outputs take its aspect ratio.
    pub structure_image: Option<PathBuf>,
    pub params: PredictionParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutput {
    /// Seed the run used, whether given or drawn.
    pub seed: u32,
    pub files: Vec<OutputFile>,
}

pub struct Predictor {
    variant: PredictorVariant,
    templates: TemplateStore,
    weights: WeightsMap,
    backend: Arc<dyn ExecutionBackend>,
    fetcher: Arc<dyn WeightsFetcher>,
    staging: StagingArea,
}

impl Predictor {
    pub fn new(
        variant: PredictorVariant,
        templates: TemplateStore,
        weights: WeightsMap,
        backend: Arc<dyn ExecutionBackend>,
        fetcher: Arc<dyn WeightsFetcher>,
        config: &PipelineConfig,
    ) -> Self {
        let staging = StagingArea::new(
            backend.clone(),
            config.input_dir.clone(),
            config.output_dir.clone(),
            config.temp_dir.clone(),
        );
        Self {
            variant,
            templates,
            weights,
            backend,
            fetcher,
            staging,
        }
    }

    /// Load templates and the weights manifest, then make sure the base
    /// template's weights are installed.
    pub async fn setup(
        config: &PipelineConfig,
        variant: PredictorVariant,
        backend: Arc<dyn ExecutionBackend>,
        fetcher: Arc<dyn WeightsFetcher>,
    ) -> Result<Self, CoreError> {
        let templates = match variant {
            PredictorVariant::Base => TemplateStore::load_base(&config.base_template)?,
            PredictorVariant::WithStructure => {
                TemplateStore::load(&config.base_template, &config.structure_template)?
            }
        };
        let manifest = WeightsManifest::load(&config.manifest_path)?;
        let weights = WeightsMap::build(&manifest, &config.weights);

        let predictor = Self::new(variant, templates, weights, backend, fetcher, config);

        let base = predictor.templates.instantiate(TemplateKind::Base)?;
        ensure_weights(&predictor.weights, &base, &*predictor.fetcher).await?;

        tracing::info!(?variant, weights = predictor.weights.len(), "Predictor ready");
        Ok(predictor)
    }

    pub fn variant(&self) -> PredictorVariant {
        self.variant
    }

    /// Run a single prediction.
    ///
    /// Input problems are reported as [`CoreError::Validation`] before
    /// the backend is touched. A backend failure fails the prediction
    /// with no files.
    pub async fn predict(&self, input: PredictionInput) -> Result<PredictionOutput, CoreError> {
        let style_image = input
            .style_image
            .ok_or_else(|| CoreError::Validation("Style image is required".to_string()))?;

        let has_structure = input.structure_image.is_some();
        if has_structure && !self.templates.supports(TemplateKind::WithStructure) {
            return Err(CoreError::Validation(
                "This predictor does not accept a structure image".to_string(),
            ));
        }

        let resolved = input.params.resolve(has_structure)?;
        let params = &resolved.params;

        let staging = self.staging.acquire().await?;

        stage_image(&style_image, staging.input_dir(), STYLE_IMAGE_NAME).await?;
        if let Some(structure) = &input.structure_image {
            stage_image(structure, staging.input_dir(), STRUCTURE_IMAGE_NAME).await?;
        }

        let kind = TemplateKind::for_structure(has_structure);
        let mut graph = self.templates.instantiate(kind)?;
        apply_params(&mut graph, &resolved, self.variant.negative_prompt_policy())?;

        ensure_weights(&self.weights, &graph, &*self.fetcher).await?;

        tracing::info!(
            ?kind,
            model = %params.model,
            seed = resolved.seed,
            images = params.number_of_images,
            "Running prediction",
        );

        self.backend.connect().await?;
        self.backend.run_workflow(&graph).await?;

        let files = collect_outputs(staging.output_dir())?;
        let files = postprocess(files, params.output_format, params.output_quality).await?;
        staging.release().await?;

        tracing::info!(seed = resolved.seed, files = files.len(), "Prediction complete");

        Ok(PredictionOutput {
            seed: resolved.seed,
            files,
        })
    }
}
