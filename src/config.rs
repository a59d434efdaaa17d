use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DPI: u32 = 1200;
pub const DEFAULT_PRUNE_ITERATIONS: usize = 15;
/// matplotlib's default figure size, in inches.
pub const DEFAULT_FIGURE_SIZE: [f64; 2] = [6.4, 4.8];
pub const MAX_IMAGE_SIDE_PX: f64 = 32_768.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlotConfig {
    /// Base directory; `dumps_dir` and `plots_dir` are resolved against it.
    pub root: PathBuf,
    pub dumps_dir: PathBuf,
    pub plots_dir: PathBuf,
    pub dpi: u32,
    pub prune_iterations: usize,
    pub arch_types: Vec<String>,
    pub datasets: Vec<String>,
    /// Width and height in inches.
    pub figure_size: [f64; 2],
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            dumps_dir: PathBuf::from("dumps/lt"),
            plots_dir: PathBuf::from("plots/lt/combined_plots"),
            dpi: DEFAULT_DPI,
            prune_iterations: DEFAULT_PRUNE_ITERATIONS,
            arch_types: vec!["fc1".to_string()],
            datasets: vec!["mnist".to_string()],
            figure_size: DEFAULT_FIGURE_SIZE,
        }
    }
}

impl PlotConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dpi == 0 {
            return Err(ConfigError::Invalid("dpi must be positive".to_string()));
        }
        if self.prune_iterations == 0 {
            return Err(ConfigError::Invalid(
                "prune_iterations must be positive".to_string(),
            ));
        }
        validate_names("arch_types", &self.arch_types)?;
        validate_names("datasets", &self.datasets)?;

        let [w, h] = self.figure_size;
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "figure_size must be positive, got {w}x{h}"
            )));
        }
        let dpi = self.dpi as f64;
        if w * dpi > MAX_IMAGE_SIDE_PX || h * dpi > MAX_IMAGE_SIDE_PX {
            return Err(ConfigError::Invalid(format!(
                "image of {:.0}x{:.0} px exceeds {MAX_IMAGE_SIDE_PX} px per side",
                w * dpi,
                h * dpi
            )));
        }
        Ok(())
    }

    /// (arch, dataset) pairs, architecture-major.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.arch_types.iter().flat_map(move |arch| {
            self.datasets
                .iter()
                .map(move |dataset| (arch.as_str(), dataset.as_str()))
        })
    }

    pub fn pair_count(&self) -> usize {
        self.arch_types.len() * self.datasets.len()
    }

    pub fn dump_dir(&self, arch: &str, dataset: &str) -> PathBuf {
        self.root.join(&self.dumps_dir).join(arch).join(dataset)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.plots_dir)
    }

    pub fn output_path(&self, arch: &str, dataset: &str) -> PathBuf {
        self.output_dir()
            .join(format!("combined_{arch}_{dataset}.png"))
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        let [w, h] = self.figure_size;
        (
            (w * dpi).round().max(1.0) as u32,
            (h * dpi).round().max(1.0) as u32,
        )
    }
}

fn validate_names(field: &str, names: &[String]) -> Result<(), ConfigError> {
    if names.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }
    for name in names {
        let mut components = Path::new(name).components();
        let single_normal = matches!(components.next(), Some(Component::Normal(_)))
            && components.next().is_none();
        if name.trim().is_empty() || !single_normal || name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "{field} entry {name:?} must be a single path component"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/src_inline/config.rs"]
mod tests;
