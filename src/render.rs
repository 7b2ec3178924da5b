// Image list loading and render variable assembly

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::registry::{ErrorKind, ImageRef, ResolveError, Resolver};
use crate::settings::Settings;

/// Variable holding the controller manager image
pub const CONTROLLER_MANAGER_IMAGE: &str = "CONTROLLER_MANAGER_IMAGE";
/// Variable holding the operator version
pub const VERSION: &str = "VERSION";

/// Variables handed to the template renderer
pub type RenderVars = BTreeMap<String, String>;

/// One entry of the image list file
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSpec {
    #[serde(flatten)]
    pub image: ImageRef,
    /// Template variable receiving the resolved reference
    pub tplvar: String,
}

/// Load the JSON array of images from `path`.
pub fn load_images(path: &Path) -> Result<Vec<ImageSpec>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read image list {}", path.display()))?;
    let images: Vec<ImageSpec> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse image list {}", path.display()))?;
    info!("Loaded {} images from {}", images.len(), path.display());
    Ok(images)
}

/// Resolve every image, in order, and collect the render variables.
///
/// Prints `tplvar: reference` to stderr as each image is resolved. Stops at
/// the first image that cannot be resolved.
pub async fn build_render_vars(
    resolver: &Resolver,
    images: &[ImageSpec],
    settings: &Settings,
) -> Result<RenderVars> {
    let mut vars = RenderVars::new();

    for spec in images {
        let resolved = resolver.resolve(&spec.image).await.with_context(|| {
            format!(
                "Failed to resolve {}:{}",
                spec.image.repository(),
                spec.image.tag
            )
        })?;

        eprintln!("{}: {}", spec.tplvar, resolved);

        if vars
            .insert(spec.tplvar.clone(), resolved.to_string())
            .is_some()
        {
            warn!("Template variable {} is set by more than one image", spec.tplvar);
        }
    }

    vars.insert(
        CONTROLLER_MANAGER_IMAGE.to_string(),
        settings.controller_image.clone(),
    );
    vars.insert(VERSION.to_string(), settings.version.clone());

    Ok(vars)
}

/// Write `vars` as pretty JSON to `output`, or to stdout when unset.
pub fn write_render_vars(vars: &RenderVars, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(vars).context("Failed to serialize variables")?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, json + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote template variables to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Kind of the resolution failure behind `err`, if it came from the resolver
pub fn failure_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.downcast_ref::<ResolveError>().map(ResolveError::kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_write_render_vars_under_workspace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(
            Some(PathBuf::from("images.json")),
            Some("quay.io/org/ctrl:v1".to_string()),
            Some("1.2.3".to_string()),
            Some(temp_dir.path().to_path_buf()),
            Some(PathBuf::from("config/render-vars.json")),
        )
        .unwrap();

        let mut vars = RenderVars::new();
        vars.insert(CONTROLLER_MANAGER_IMAGE.to_string(), settings.controller_image.clone());
        vars.insert(VERSION.to_string(), settings.version.clone());

        write_render_vars(&vars, settings.output_path().as_deref()).unwrap();

        let written = temp_dir.path().join("config").join("render-vars.json");
        let content = std::fs::read_to_string(&written).unwrap();
        let parsed: RenderVars = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, vars);
    }

    #[test]
    fn test_failure_kind_through_context() {
        let err = anyhow::Error::new(ResolveError::MissingCredentials(
            "QUAY_IO_USERNAME".to_string(),
        ))
        .context("Failed to resolve quay.io/org/app:v1");
        assert_eq!(failure_kind(&err), Some(ErrorKind::Configuration));

        let other = anyhow::anyhow!("The environment variable \"IMG\" is not set.");
        assert_eq!(failure_kind(&other), None);
    }

    #[test]
    fn test_load_images() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("images.json");
        std::fs::write(
            &path,
            r#"[
  {"registry": "quay.io", "namespace": "org", "name": "agent", "tag": "v1", "tplvar": "AGENT_IMAGE"},
  {"registry": "registry.redhat.io", "namespace": "ubi9", "name": "ubi", "tag": "latest", "tplvar": "UBI_IMAGE"}
]"#,
        )
        .unwrap();

        let images = load_images(&path).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].tplvar, "AGENT_IMAGE");
        assert_eq!(images[0].image, ImageRef::new("quay.io", "org", "agent", "v1"));
        assert_eq!(images[1].image.registry, "registry.redhat.io");
    }

    #[test]
    fn test_load_images_missing_field() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("images.json");
        std::fs::write(
            &path,
            r#"[{"registry": "quay.io", "namespace": "org", "name": "agent", "tag": "v1"}]"#,
        )
        .unwrap();

        let err = load_images(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("tplvar"));
    }

    #[test]
    fn test_load_images_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = load_images(&temp_dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read image list"));
    }
}
