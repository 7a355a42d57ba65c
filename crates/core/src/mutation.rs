//! Parameter-to-graph mutation for the style-transfer workflows.
//!
//! Writes resolved prediction parameters into fixed node coordinates of
//! the two shipped templates (with and without a structure image). Only
//! the slots listed here are touched; everything else keeps its
//! template default.

use crate::error::CoreError;
use crate::graph::WorkflowGraph;
use crate::nodes::{
    CheckpointLoader, ClipTextEncode, ControlNetApply, EmptyLatentImage, KSampler,
    RepeatImageBatch,
};
use crate::params::ResolvedParams;
use crate::profiles::ModelProfile;

// ---------------------------------------------------------------------------
// Node coordinates
// ---------------------------------------------------------------------------

pub const CHECKPOINT_NODE: &str = "2";
pub const SAMPLER_NODE: &str = "3";
pub const POSITIVE_PROMPT_NODE: &str = "6";
pub const NEGATIVE_PROMPT_NODE: &str = "7";
/// Only present in the template without a structure image.
pub const EMPTY_LATENT_NODE: &str = "10";
/// Only present in the structure template.
pub const STRUCTURE_CONTROLNET_NODE: &str = "18";
/// Only present in the structure template.
pub const BATCH_REPEAT_NODE: &str = "24";

/// Prepended to the negative prompt by the structure-capable predictor.
pub const NEGATIVE_PROMPT_SAFETY_PREFIX: &str = "nsfw, nude, ";

/// How the negative prompt is written into the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativePromptPolicy {
    /// Written exactly as supplied.
    Verbatim,
    /// [`NEGATIVE_PROMPT_SAFETY_PREFIX`] is prepended.
    SafetyPrefixed,
}

impl NegativePromptPolicy {
    pub fn apply(self, negative_prompt: &str) -> String {
        match self {
            Self::Verbatim => negative_prompt.to_string(),
            Self::SafetyPrefixed => format!("{NEGATIVE_PROMPT_SAFETY_PREFIX}{negative_prompt}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Write `resolved` into `graph`.
///
/// `graph` must be a per-prediction instance (a clone of a template).
/// Fails with [`CoreError::StructuralMismatch`] if any target node is
/// missing or of the wrong kind. Nodes are checked before any slot is
/// written, so a failed call leaves the graph unchanged.
pub fn apply_params(
    graph: &mut WorkflowGraph,
    resolved: &ResolvedParams,
    policy: NegativePromptPolicy,
) -> Result<(), CoreError> {
    check_targets(graph, resolved.has_structure)?;

    let params = &resolved.params;

    apply_model(graph, params.model)?;

    graph
        .typed_mut::<ClipTextEncode>(POSITIVE_PROMPT_NODE)?
        .set_text(&params.prompt);
    graph
        .typed_mut::<ClipTextEncode>(NEGATIVE_PROMPT_NODE)?
        .set_text(&policy.apply(&params.negative_prompt));

    graph
        .typed_mut::<KSampler>(SAMPLER_NODE)?
        .set_seed(resolved.seed);

    if resolved.has_structure {
        // Output size follows the structure image, so width/height are
        // left alone.
        let denoise = params.structure_denoising_strength;
        graph.typed_mut::<KSampler>(SAMPLER_NODE)?.set_denoise(denoise);
        graph
            .typed_mut::<ControlNetApply>(STRUCTURE_CONTROLNET_NODE)?
            .set_strength(denoise);
        graph
            .typed_mut::<RepeatImageBatch>(BATCH_REPEAT_NODE)?
            .set_amount(params.number_of_images);
    } else {
        let mut latent = graph.typed_mut::<EmptyLatentImage>(EMPTY_LATENT_NODE)?;
        latent.set_size(params.width, params.height);
        latent.set_batch_size(params.number_of_images);
    }

    tracing::debug!(
        model = %params.model,
        seed = resolved.seed,
        has_structure = resolved.has_structure,
        batch_size = params.number_of_images,
        "Workflow parameters applied",
    );

    Ok(())
}

/// Select checkpoint and sampler settings for `model`.
///
/// The checkpoint and sampler lookups are independent tables.
pub fn apply_model(graph: &mut WorkflowGraph, model: ModelProfile) -> Result<(), CoreError> {
    let sampler_settings = model.sampler();
    let mut sampler = graph.typed_mut::<KSampler>(SAMPLER_NODE)?;
    sampler.set_steps(sampler_settings.steps);
    sampler.set_cfg(sampler_settings.cfg);
    sampler.set_sampler_name(sampler_settings.sampler_name);

    graph
        .typed_mut::<CheckpointLoader>(CHECKPOINT_NODE)?
        .set_checkpoint(model.checkpoint());

    Ok(())
}

/// Confirm every node the chosen branch writes to exists with the right
/// kind.
fn check_targets(graph: &mut WorkflowGraph, has_structure: bool) -> Result<(), CoreError> {
    graph.typed_mut::<CheckpointLoader>(CHECKPOINT_NODE)?;
    graph.typed_mut::<KSampler>(SAMPLER_NODE)?;
    graph.typed_mut::<ClipTextEncode>(POSITIVE_PROMPT_NODE)?;
    graph.typed_mut::<ClipTextEncode>(NEGATIVE_PROMPT_NODE)?;
    if has_structure {
        graph.typed_mut::<ControlNetApply>(STRUCTURE_CONTROLNET_NODE)?;
        graph.typed_mut::<RepeatImageBatch>(BATCH_REPEAT_NODE)?;
    } else {
        graph.typed_mut::<EmptyLatentImage>(EMPTY_LATENT_NODE)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
