//! User-facing prediction parameters, their bounds, and seed resolution.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::profiles::ModelProfile;

// ---------------------------------------------------------------------------
// Defaults and bounds
// ---------------------------------------------------------------------------

pub const DEFAULT_PROMPT: &str = "An astronaut riding a unicorn";
pub const DEFAULT_DIMENSION: u32 = 1024;
pub const DEFAULT_DEPTH_STRENGTH: f64 = 1.0;
pub const DEFAULT_DENOISING_STRENGTH: f64 = 0.65;
pub const DEFAULT_OUTPUT_QUALITY: u8 = 80;

pub const MIN_IMAGES: u32 = 1;
pub const MAX_IMAGES: u32 = 10;
pub const MAX_DEPTH_STRENGTH: f64 = 2.0;
pub const MAX_DENOISING_STRENGTH: f64 = 1.0;
pub const MAX_OUTPUT_QUALITY: u8 = 100;

// ---------------------------------------------------------------------------
// Output format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Webp,
    Jpg,
    Png,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [Self::Webp, Self::Jpg, Self::Png];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }

    /// Formats that always trigger re-encoding of outputs.
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Webp | Self::Jpg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown output format '{s}'. Valid formats: webp, jpg, png"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Parameter set
// ---------------------------------------------------------------------------

/// Flat set of user-facing generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionParams {
    pub prompt: String,
    /// Things the caller does not want to see.
    pub negative_prompt: String,
    /// Ignored when a structure image is given.
    pub width: u32,
    /// Ignored when a structure image is given.
    pub height: u32,
    pub model: ModelProfile,
    pub number_of_images: u32,
    /// Accepted and range-checked only. The controlnet strength slot is
    /// driven by `structure_denoising_strength`.
    pub structure_depth_strength: f64,
    /// How much of the structure image to repaint (0 keeps all, 1 none).
    pub structure_denoising_strength: f64,
    pub output_format: OutputFormat,
    pub output_quality: u8,
    /// Random when `None`.
    pub seed: Option<u32>,
}

impl Default for PredictionParams {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            negative_prompt: String::new(),
            width: DEFAULT_DIMENSION,
            height: DEFAULT_DIMENSION,
            model: ModelProfile::default(),
            number_of_images: MIN_IMAGES,
            structure_depth_strength: DEFAULT_DEPTH_STRENGTH,
            structure_denoising_strength: DEFAULT_DENOISING_STRENGTH,
            output_format: OutputFormat::default(),
            output_quality: DEFAULT_OUTPUT_QUALITY,
            seed: None,
        }
    }
}

/// Parameters after validation, with the seed fixed and the graph
/// variant decided.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub params: PredictionParams,
    pub seed: u32,
    pub has_structure: bool,
}

impl PredictionParams {
    /// Check every bounded field.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.width == 0 || self.height == 0 {
            return Err(CoreError::Validation(
                "Width and height must be greater than 0".to_string(),
            ));
        }
        if !(MIN_IMAGES..=MAX_IMAGES).contains(&self.number_of_images) {
            return Err(CoreError::Validation(format!(
                "number_of_images must be between {MIN_IMAGES} and {MAX_IMAGES}, got {}",
                self.number_of_images
            )));
        }
        validate_strength(
            "structure_depth_strength",
            self.structure_depth_strength,
            MAX_DEPTH_STRENGTH,
        )?;
        validate_strength(
            "structure_denoising_strength",
            self.structure_denoising_strength,
            MAX_DENOISING_STRENGTH,
        )?;
        if self.output_quality > MAX_OUTPUT_QUALITY {
            return Err(CoreError::Validation(format!(
                "output_quality must be between 0 and {MAX_OUTPUT_QUALITY}, got {}",
                self.output_quality
            )));
        }
        Ok(())
    }

    /// Validate, then fix the seed (drawing one if absent).
    pub fn resolve(self, has_structure: bool) -> Result<ResolvedParams, CoreError> {
        self.validate()?;
        let seed = resolve_seed(self.seed);
        Ok(ResolvedParams {
            params: self,
            seed,
            has_structure,
        })
    }
}

/// Return the requested seed, or a uniformly random `u32`.
pub fn resolve_seed(requested: Option<u32>) -> u32 {
    match requested {
        Some(seed) => seed,
        None => {
            let seed: u32 = rand::rng().random();
            tracing::info!(seed, "Random seed set to {seed}");
            seed
        }
    }
}

fn validate_strength(field: &str, value: f64, max: f64) -> Result<(), CoreError> {
    if value.is_nan() || !(0.0..=max).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{field} must be between 0 and {max}, got {value}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
