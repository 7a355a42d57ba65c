//! Making sure the weights a workflow references are installed.

use async_trait::async_trait;
use styler_core::backend::WeightsFetcher;
use styler_core::error::CoreError;
use styler_core::graph::WorkflowGraph;
use styler_core::manifest::{RequiredWeight, WeightsMap};

/// Fetch every weight `graph` needs that is not already on disk.
///
/// Returns the weights that were fetched.
pub async fn ensure_weights(
    map: &WeightsMap,
    graph: &WorkflowGraph,
    fetcher: &dyn WeightsFetcher,
) -> Result<Vec<RequiredWeight>, CoreError> {
    let mut fetched = Vec::new();

    for weight in map.required_by(graph) {
        let local = weight.local_path();
        if local.exists() {
            tracing::debug!(weight = %weight.name, path = %local.display(), "Weight already present");
            continue;
        }

        tracing::info!(weight = %weight.name, url = %weight.source.url, "Fetching weight");
        fetcher.fetch(&weight).await?;
        fetched.push(weight);
    }

    Ok(fetched)
}

/// Fetcher for deployments where weights are baked into the image.
///
/// Any missing weight is an error naming the file and where it would
/// have come from.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreinstalledWeights;

#[async_trait]
impl WeightsFetcher for PreinstalledWeights {
    async fn fetch(&self, weight: &RequiredWeight) -> Result<(), CoreError> {
        Err(CoreError::Weights(format!(
            "{} is not installed at {} (source: {})",
            weight.name,
            weight.local_path().display(),
            weight.source.url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Mutex;
    use styler_core::manifest::{WeightsLayout, WeightsManifest};

    #[derive(Default)]
    struct RecordingFetcher {
        names: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WeightsFetcher for RecordingFetcher {
        async fn fetch(&self, weight: &RequiredWeight) -> Result<(), CoreError> {
            self.names.lock().unwrap().push(weight.name.clone());
            Ok(())
        }
    }

    fn graph() -> WorkflowGraph {
        WorkflowGraph::from_json(
            r#"{
                "2": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "present.safetensors"}},
                "14": {"class_type": "ControlNetLoader", "inputs": {"control_net_name": "missing.safetensors"}}
            }"#,
        )
        .unwrap()
    }

    fn layout(root: &std::path::Path) -> WeightsLayout {
        WeightsLayout {
            models_path: root.display().to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn only_missing_weights_are_fetched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("checkpoints")).unwrap();
        std::fs::write(dir.path().join("checkpoints/present.safetensors"), b"x").unwrap();

        let manifest = WeightsManifest::from_categories([
            ("checkpoints", vec!["present.safetensors"]),
            ("controlnet", vec!["missing.safetensors"]),
        ]);
        let map = WeightsMap::build(&manifest, &layout(dir.path()));
        let fetcher = RecordingFetcher::default();

        let fetched = ensure_weights(&map, &graph(), &fetcher).await.unwrap();

        assert_eq!(fetched.len(), 1);
        assert_eq!(*fetcher.names.lock().unwrap(), vec!["missing.safetensors".to_string()]);
    }

    #[tokio::test]
    async fn preinstalled_fetcher_names_the_missing_weight() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = WeightsManifest::from_categories([("controlnet", vec!["missing.safetensors"])]);
        let map = WeightsMap::build(&manifest, &layout(dir.path()));

        let err = ensure_weights(&map, &graph(), &PreinstalledWeights).await.unwrap_err();
        assert_matches!(&err, CoreError::Weights(msg) if msg.contains("missing.safetensors") && msg.contains(".tar"));
    }
}
