//! Node kinds the mutator writes to, with typed slot accessors.
//!
//! Each kind is a zero-sized marker implementing [`NodeKind`]; the
//! setters live on [`TypedNodeMut<K>`] so a slot can only be written
//! through a node whose `class_type` was checked.

use crate::graph::TypedNodeMut;

/// A ComfyUI node class the mutator knows how to address.
pub trait NodeKind {
    /// Value of the node's `class_type` field.
    const CLASS_TYPE: &'static str;
}

macro_rules! node_kind {
    ($(#[$doc:meta])* $name:ident => $class:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl NodeKind for $name {
            const CLASS_TYPE: &'static str = $class;
        }
    };
}

node_kind!(
    /// Loads the diffusion checkpoint.
    CheckpointLoader => "CheckpointLoaderSimple"
);
node_kind!(
    /// The denoising sampler.
    KSampler => "KSampler"
);
node_kind!(
    /// Text conditioning (positive or negative prompt).
    ClipTextEncode => "CLIPTextEncode"
);
node_kind!(
    /// Blank latent that fixes output size and batch when no structure
    /// image is given.
    EmptyLatentImage => "EmptyLatentImage"
);
node_kind!(
    /// Depth controlnet conditioning driven by the structure image.
    ControlNetApply => "ControlNetApplyAdvanced"
);
node_kind!(
    /// Repeats the encoded structure image to form the batch.
    RepeatImageBatch => "RepeatImageBatch"
);

impl TypedNodeMut<'_, CheckpointLoader> {
    pub fn set_checkpoint(&mut self, filename: &str) {
        self.set("ckpt_name", filename);
    }

    pub fn checkpoint(&self) -> Option<&str> {
        self.get("ckpt_name").and_then(|v| v.as_str())
    }
}

impl TypedNodeMut<'_, KSampler> {
    pub fn set_steps(&mut self, steps: u32) {
        self.set("steps", steps);
    }

    pub fn set_cfg(&mut self, cfg: f64) {
        self.set("cfg", cfg);
    }

    pub fn set_sampler_name(&mut self, name: &str) {
        self.set("sampler_name", name);
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.set("seed", seed);
    }

    pub fn set_denoise(&mut self, denoise: f64) {
        self.set("denoise", denoise);
    }

    pub fn seed(&self) -> Option<u64> {
        self.get("seed").and_then(|v| v.as_u64())
    }
}

impl TypedNodeMut<'_, ClipTextEncode> {
    pub fn set_text(&mut self, text: &str) {
        self.set("text", text);
    }
}

impl TypedNodeMut<'_, EmptyLatentImage> {
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.set("width", width);
        self.set("height", height);
    }

    pub fn set_batch_size(&mut self, batch_size: u32) {
        self.set("batch_size", batch_size);
    }
}

impl TypedNodeMut<'_, ControlNetApply> {
    pub fn set_strength(&mut self, strength: f64) {
        self.set("strength", strength);
    }
}

impl TypedNodeMut<'_, RepeatImageBatch> {
    pub fn set_amount(&mut self, amount: u32) {
        self.set("amount", amount);
    }
}
