use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Operator version used when `VERSION` is not provided
pub const DEFAULT_VERSION: &str = "99.0.0";

/// Process configuration, built once at start-up and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    /// JSON file listing the images to resolve
    pub images_file: PathBuf,
    /// Controller manager image reference, passed through unchanged
    pub controller_image: String,
    /// Operator version
    pub version: String,
    /// Base directory for relative output paths
    pub base_path: PathBuf,
    /// Where to write the render variables; stdout when unset
    pub output: Option<PathBuf>,
}

impl Settings {
    /// Validate raw option values, usually coming from CLI flags or their
    /// environment fallbacks.
    pub fn new(
        images_file: Option<PathBuf>,
        controller_image: Option<String>,
        version: Option<String>,
        base_path: Option<PathBuf>,
        output: Option<PathBuf>,
    ) -> Result<Self> {
        let Some(images_file) = images_file else {
            bail!("The environment variable \"CONFIG_CONTAINER_IMAGES\" is not set.");
        };
        let Some(controller_image) = controller_image else {
            bail!("The environment variable \"IMG\" is not set.");
        };

        Ok(Self {
            images_file,
            controller_image,
            version: version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            base_path: base_path.unwrap_or_default(),
            output,
        })
    }

    /// Output path resolved against the base path
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output.as_deref().map(|path| self.resolve_path(path))
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}
