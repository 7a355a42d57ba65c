//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use styler_core::params::{
    OutputFormat, PredictionParams, DEFAULT_DENOISING_STRENGTH, DEFAULT_DEPTH_STRENGTH,
    DEFAULT_DIMENSION, DEFAULT_OUTPUT_QUALITY, DEFAULT_PROMPT, MIN_IMAGES,
};
use styler_core::profiles::ModelProfile;
use styler_pipeline::predictor::{PredictionInput, PredictorVariant};

#[derive(Debug, Parser)]
#[command(name = "styler-worker", about = "Style transfer on a ComfyUI server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one prediction and print the produced files.
    Predict(PredictArgs),
    /// Print the weights a workflow variant needs, as JSON.
    Weights(WeightsArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VariantArg {
    /// Style image only.
    Base,
    /// Style image with an optional structure image.
    Structure,
}

impl From<VariantArg> for PredictorVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Base => PredictorVariant::Base,
            VariantArg::Structure => PredictorVariant::WithStructure,
        }
    }
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    /// Copy the style from this image.
    #[arg(long)]
    pub style_image: PathBuf,

    /// Copy structure from this image; outputs take its aspect ratio.
    #[arg(long)]
    pub structure_image: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// Things you do not want to see in the image.
    #[arg(long, default_value = "")]
    pub negative_prompt: String,

    /// Ignored when a structure image is given.
    #[arg(long, default_value_t = DEFAULT_DIMENSION)]
    pub width: u32,

    /// Ignored when a structure image is given.
    #[arg(long, default_value_t = DEFAULT_DIMENSION)]
    pub height: u32,

    /// fast, high-quality, realistic, cinematic or animated.
    #[arg(long, default_value = "fast")]
    pub model: ModelProfile,

    #[arg(long, default_value_t = MIN_IMAGES)]
    pub number_of_images: u32,

    #[arg(long, default_value_t = DEFAULT_DEPTH_STRENGTH)]
    pub structure_depth_strength: f64,

    /// 0 keeps the structure image's colours, 1 repaints everything.
    #[arg(long, default_value_t = DEFAULT_DENOISING_STRENGTH)]
    pub structure_denoising_strength: f64,

    /// webp, jpg or png.
    #[arg(long, default_value = "webp")]
    pub output_format: OutputFormat,

    /// 0 to 100; applies to webp and jpg output.
    #[arg(long, default_value_t = DEFAULT_OUTPUT_QUALITY)]
    pub output_quality: u8,

    /// Random when omitted.
    #[arg(long)]
    pub seed: Option<u32>,

    #[arg(long, value_enum, default_value = "structure", env = "PREDICTOR_VARIANT")]
    pub variant: VariantArg,

    /// Print the result as JSON instead of one path per line.
    #[arg(long)]
    pub json: bool,
}

impl PredictArgs {
    pub fn to_input(&self) -> PredictionInput {
        PredictionInput {
            style_image: Some(self.style_image.clone()),
            structure_image: self.structure_image.clone(),
            params: PredictionParams {
                prompt: self.prompt.clone(),
                negative_prompt: self.negative_prompt.clone(),
                width: self.width,
                height: self.height,
                model: self.model,
                number_of_images: self.number_of_images,
                structure_depth_strength: self.structure_depth_strength,
                structure_denoising_strength: self.structure_denoising_strength,
                output_format: self.output_format,
                output_quality: self.output_quality,
                seed: self.seed,
            },
        }
    }
}

#[derive(Debug, Args)]
pub struct WeightsArgs {
    #[arg(long, default_value = "fast")]
    pub model: ModelProfile,

    /// Inspect the structure template instead of the base one.
    #[arg(long)]
    pub structure: bool,
}
