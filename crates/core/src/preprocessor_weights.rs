//! Weights used by the ControlNet auxiliary preprocessor nodes.
//!
//! These annotator checkpoints are not listed in the weights manifest;
//! the preprocessor custom node looks for them under its own `ckpts/`
//! tree, mirrored by upstream repository path.

use crate::manifest::WeightSource;

/// Custom-node directory name, used in both the archive URL and the
/// install path.
pub const PREPROCESSOR_NODE_DIR: &str = "comfyui_controlnet_aux";

/// Annotator file name → upstream repository path.
pub const PREPROCESSOR_MODELS: &[(&str, &str)] = &[
    ("depth_anything_vitl14.pth", "LiheYoung/Depth-Anything/checkpoints"),
    ("depth_anything_vitb14.pth", "LiheYoung/Depth-Anything/checkpoints"),
    ("depth_anything_vits14.pth", "LiheYoung/Depth-Anything/checkpoints"),
    ("ZoeD_M12_N.pt", "lllyasviel/Annotators"),
    ("dpt_hybrid-midas-501f0c75.pt", "lllyasviel/Annotators"),
    ("res101.pth", "lllyasviel/Annotators"),
    ("body_pose_model.pth", "lllyasviel/Annotators"),
    ("hand_pose_model.pth", "lllyasviel/Annotators"),
    ("facenet.pth", "lllyasviel/Annotators"),
    ("table5_pidinet.pth", "lllyasviel/Annotators"),
    ("sk_model.pth", "lllyasviel/Annotators"),
    ("sk_model2.pth", "lllyasviel/Annotators"),
    ("dw-ll_ucoco_384_bs5.torchscript.pt", "hr16/DWPose-TorchScript-BatchSize5"),
    ("yolox_l.onnx", "yzd-v/DWPose"),
    ("mobile_sam.pt", "dhkim2810/MobileSAM"),
];

/// Build `(name, source)` entries for every preprocessor weight.
pub fn preprocessor_weights<'a>(
    base_url: &'a str,
    custom_nodes_path: &str,
) -> impl Iterator<Item = (String, WeightSource)> + 'a {
    let custom_nodes_path = custom_nodes_path.to_string();
    PREPROCESSOR_MODELS.iter().map(move |(name, repo)| {
        (
            name.to_string(),
            WeightSource {
                url: format!("{base_url}/custom_nodes/{PREPROCESSOR_NODE_DIR}/{name}.tar"),
                dest: format!("{custom_nodes_path}/{PREPROCESSOR_NODE_DIR}/ckpts/{repo}"),
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_anything_entry_layout() {
        let entries: Vec<_> = preprocessor_weights("https://host/w", "ComfyUI/custom_nodes").collect();
        let (_, source) = entries
            .iter()
            .find(|(name, _)| name == "depth_anything_vitl14.pth")
            .unwrap();
        assert_eq!(
            source.url,
            "https://host/w/custom_nodes/comfyui_controlnet_aux/depth_anything_vitl14.pth.tar"
        );
        assert_eq!(
            source.dest,
            "ComfyUI/custom_nodes/comfyui_controlnet_aux/ckpts/LiheYoung/Depth-Anything/checkpoints"
        );
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = PREPROCESSOR_MODELS.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PREPROCESSOR_MODELS.len());
    }
}
