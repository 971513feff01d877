//! Rendering of the `GcpPubSubSource` CustomResourceDefinition.
use crate::{Error, GcpPubSubSource, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;
use std::path::Path;
use tracing::{debug, info};

/// Serialization format of a rendered manifest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ManifestFormat {
    #[default]
    Yaml,
    Json,
}

/// The CustomResourceDefinition of [`GcpPubSubSource`].
pub fn crd() -> CustomResourceDefinition {
    GcpPubSubSource::crd()
}

/// Renders the CustomResourceDefinition of [`GcpPubSubSource`] in the given format.
pub fn render(format: ManifestFormat) -> Result<String> {
    let crd = crd();
    debug!(name = ?crd.metadata.name, ?format, "rendering CustomResourceDefinition");

    let manifest = match format {
        ManifestFormat::Yaml => serde_yaml::to_string(&crd)?,
        ManifestFormat::Json => serde_json::to_string_pretty(&crd)?,
    };
    Ok(manifest)
}

/// Renders the CustomResourceDefinition and writes it to `path`.
pub fn write(format: ManifestFormat, path: &Path) -> Result<()> {
    let manifest = render(format)?;
    std::fs::write(path, manifest).map_err(|source| Error::Write { path: path.to_path_buf(), source })?;
    info!(path = %path.display(), "wrote CustomResourceDefinition");
    Ok(())
}
