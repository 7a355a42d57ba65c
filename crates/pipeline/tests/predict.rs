//! End-to-end prediction tests against an in-process backend.
//!
//! The fake backend records every submitted graph and writes PNG files
//! into the output directory the way ComfyUI's `SaveImage` node would.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use styler_core::backend::{ExecutionBackend, WeightsFetcher};
use styler_core::error::CoreError;
use styler_core::graph::WorkflowGraph;
use styler_core::manifest::{RequiredWeight, WeightsMap};
use styler_core::params::{OutputFormat, PredictionParams};
use styler_core::profiles::ModelProfile;
use styler_pipeline::config::PipelineConfig;
use styler_pipeline::predictor::{PredictionInput, Predictor, PredictorVariant};
use styler_pipeline::templates::TemplateStore;

const BASE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../workflows/style-transfer-api.json"
));
const STRUCTURE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../workflows/style-transfer-with-structure-api.json"
));

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeBackend {
    output_dir: PathBuf,
    fail: bool,
    connects: AtomicUsize,
    clears: AtomicUsize,
    graphs: Mutex<Vec<serde_json::Value>>,
}

impl FakeBackend {
    fn new(output_dir: PathBuf, fail: bool) -> Self {
        Self {
            output_dir,
            fail,
            connects: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            graphs: Mutex::new(Vec::new()),
        }
    }

    fn last_graph(&self) -> serde_json::Value {
        self.graphs.lock().unwrap().last().cloned().unwrap()
    }

    fn runs(&self) -> usize {
        self.graphs.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionBackend for FakeBackend {
    async fn connect(&self) -> Result<(), CoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run_workflow(&self, graph: &WorkflowGraph) -> Result<(), CoreError> {
        self.graphs.lock().unwrap().push(graph.to_value()?);
        if self.fail {
            return Err(CoreError::Backend("execution_error in node 3".into()));
        }
        write_png(&self.output_dir.join("StyleTransfer_00002_.png"));
        write_png(&self.output_dir.join("StyleTransfer_00001_.png"));
        std::fs::create_dir_all(self.output_dir.join("batch")).unwrap();
        write_png(&self.output_dir.join("batch/extra.png"));
        std::fs::create_dir_all(self.output_dir.join("__MACOSX")).unwrap();
        std::fs::write(self.output_dir.join("__MACOSX/._junk.png"), b"x").unwrap();
        Ok(())
    }

    async fn clear_queue(&self) -> Result<(), CoreError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct NoFetch;

#[async_trait]
impl WeightsFetcher for NoFetch {
    async fn fetch(&self, _weight: &RequiredWeight) -> Result<(), CoreError> {
        Ok(())
    }
}

fn write_png(path: &Path) {
    image::RgbImage::from_pixel(4, 4, image::Rgb([90, 40, 200]))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

struct Harness {
    _root: tempfile::TempDir,
    root: PathBuf,
    backend: Arc<FakeBackend>,
    predictor: Predictor,
}

fn harness(variant: PredictorVariant, fail: bool) -> Harness {
    let root_dir = tempfile::tempdir().unwrap();
    let root = root_dir.path().to_path_buf();
    let config = PipelineConfig {
        input_dir: root.join("inputs"),
        output_dir: root.join("outputs"),
        temp_dir: root.join("temp"),
        ..Default::default()
    };

    let backend = Arc::new(FakeBackend::new(config.output_dir.clone(), fail));
    let templates = match variant {
        PredictorVariant::Base => TemplateStore::from_json(BASE, None).unwrap(),
        PredictorVariant::WithStructure => TemplateStore::from_json(BASE, Some(STRUCTURE)).unwrap(),
    };
    let predictor = Predictor::new(
        variant,
        templates,
        WeightsMap::default(),
        backend.clone(),
        Arc::new(NoFetch),
        &config,
    );

    Harness {
        _root: root_dir,
        root,
        backend,
        predictor,
    }
}

impl Harness {
    fn style_image(&self) -> PathBuf {
        let path = self.root.join("style.jpg");
        image::RgbImage::from_pixel(6, 6, image::Rgb([1, 2, 3]))
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .unwrap();
        path
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_style_image_fails_before_backend() {
    let h = harness(PredictorVariant::WithStructure, false);

    let result = h.predictor.predict(PredictionInput::default()).await;

    assert_matches!(result, Err(CoreError::Validation(_)));
    assert_eq!(h.backend.clears.load(Ordering::SeqCst), 0);
    assert_eq!(h.backend.connects.load(Ordering::SeqCst), 0);
    assert_eq!(h.backend.runs(), 0);
}

#[tokio::test]
async fn out_of_range_params_fail_before_backend() {
    let h = harness(PredictorVariant::WithStructure, false);
    let input = PredictionInput {
        style_image: Some(h.style_image()),
        params: PredictionParams {
            number_of_images: 11,
            ..Default::default()
        },
        ..Default::default()
    };

    assert_matches!(h.predictor.predict(input).await, Err(CoreError::Validation(_)));
    assert_eq!(h.backend.runs(), 0);
}

#[tokio::test]
async fn base_variant_refuses_structure_image() {
    let h = harness(PredictorVariant::Base, false);
    let style = h.style_image();
    let input = PredictionInput {
        style_image: Some(style.clone()),
        structure_image: Some(style),
        ..Default::default()
    };

    assert_matches!(h.predictor.predict(input).await, Err(CoreError::Validation(_)));
    assert_eq!(h.backend.runs(), 0);
}

#[tokio::test]
async fn style_only_prediction_writes_latent_and_reencodes_outputs() {
    let h = harness(PredictorVariant::WithStructure, false);
    let input = PredictionInput {
        style_image: Some(h.style_image()),
        params: PredictionParams {
            prompt: "a lighthouse".into(),
            negative_prompt: "blurry".into(),
            width: 768,
            height: 512,
            number_of_images: 3,
            model: ModelProfile::Realistic,
            seed: Some(1234),
            ..Default::default()
        },
        ..Default::default()
    };

    let output = h.predictor.predict(input).await.unwrap();

    assert_eq!(output.seed, 1234);
    let graph = h.backend.last_graph();
    assert_eq!(graph["10"]["inputs"]["width"], 768);
    assert_eq!(graph["10"]["inputs"]["height"], 512);
    assert_eq!(graph["10"]["inputs"]["batch_size"], 3);
    assert_eq!(graph["3"]["inputs"]["seed"], 1234);
    assert_eq!(graph["6"]["inputs"]["text"], "a lighthouse");
    assert_eq!(graph["7"]["inputs"]["text"], "nsfw, nude, blurry");
    assert_eq!(graph["2"]["inputs"]["ckpt_name"], "RealVisXL_V4.0.safetensors");

    // Files first, sorted, then the subdirectory; __MACOSX skipped; webp by default.
    let outputs = h.root.join("outputs");
    let paths: Vec<_> = output.files.iter().map(|f| f.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            outputs.join("StyleTransfer_00001_.webp"),
            outputs.join("StyleTransfer_00002_.webp"),
            outputs.join("batch/extra.webp"),
        ]
    );
    assert!(output.files.iter().all(|f| f.media_type == "image/webp"));
}

#[tokio::test]
async fn structure_prediction_drives_controlnet_and_batch() {
    let h = harness(PredictorVariant::WithStructure, false);
    let style = h.style_image();
    let input = PredictionInput {
        style_image: Some(style.clone()),
        structure_image: Some(style),
        params: PredictionParams {
            number_of_images: 2,
            structure_denoising_strength: 0.4,
            output_format: OutputFormat::Png,
            output_quality: 100,
            seed: Some(9),
            ..Default::default()
        },
    };

    let output = h.predictor.predict(input).await.unwrap();

    let graph = h.backend.last_graph();
    assert_eq!(graph["3"]["inputs"]["denoise"], 0.4);
    assert_eq!(graph["18"]["inputs"]["strength"], 0.4);
    assert_eq!(graph["24"]["inputs"]["amount"], 2);
    assert!(graph.get("10").is_none());

    // png at quality 100 is passed through untouched.
    assert_eq!(output.files.len(), 3);
    assert!(output.files.iter().all(|f| f.media_type == "image/png"));

    // Inputs are cleared once the prediction finishes.
    assert_eq!(std::fs::read_dir(h.root.join("inputs")).unwrap().count(), 0);
}

#[tokio::test]
async fn base_variant_sends_negative_prompt_verbatim() {
    let h = harness(PredictorVariant::Base, false);
    let input = PredictionInput {
        style_image: Some(h.style_image()),
        params: PredictionParams {
            negative_prompt: "text, watermark".into(),
            ..Default::default()
        },
        ..Default::default()
    };

    h.predictor.predict(input).await.unwrap();
    assert_eq!(h.backend.last_graph()["7"]["inputs"]["text"], "text, watermark");
}

#[tokio::test]
async fn random_seed_is_reported_and_used() {
    let h = harness(PredictorVariant::WithStructure, false);
    let input = PredictionInput {
        style_image: Some(h.style_image()),
        ..Default::default()
    };

    let output = h.predictor.predict(input).await.unwrap();
    assert_eq!(h.backend.last_graph()["3"]["inputs"]["seed"], output.seed);
}

#[tokio::test]
async fn backend_failure_fails_prediction() {
    let h = harness(PredictorVariant::WithStructure, true);
    let input = PredictionInput {
        style_image: Some(h.style_image()),
        ..Default::default()
    };

    assert_matches!(h.predictor.predict(input).await, Err(CoreError::Backend(_)));
    assert_eq!(h.backend.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn each_prediction_starts_from_empty_outputs() {
    let h = harness(PredictorVariant::WithStructure, false);
    for _ in 0..2 {
        let input = PredictionInput {
            style_image: Some(h.style_image()),
            params: PredictionParams {
                output_format: OutputFormat::Jpg,
                ..Default::default()
            },
            ..Default::default()
        };
        let output = h.predictor.predict(input).await.unwrap();
        assert_eq!(output.files.len(), 3);
    }
    assert_eq!(h.backend.clears.load(Ordering::SeqCst), 2);
}
