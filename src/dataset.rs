use log::warn;
use std::path::{Path, PathBuf};

use crate::BowResult;

/// Selection of images in a directory: files with a given extension, sorted by name,
/// keeping one every `step`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGlob {
    pub dir: PathBuf,
    pub extension: String,
    pub step: usize,
}

impl ImageGlob {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Sorted paths of the selected images.
    pub fn list(&self) -> BowResult<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in self.dir.read_dir()? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {:?}: {}", self.dir, e);
                    continue;
                }
            };
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.eq_ignore_ascii_case(&self.extension));
            if matches && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths.into_iter().step_by(self.step.max(1)).collect())
    }
}

impl Default for ImageGlob {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            extension: "png".to_string(),
            step: 6,
        }
    }
}
