//! Artifact path layout for one (project, page) under the data directory.
//!
//! Everything the pipeline writes (generated markup, screenshots, raw model
//! responses, verdicts) lands under `generated/` next to the authored page,
//! so a whole evaluation is inspectable offline after the fact.

use std::path::{Path, PathBuf};

/// Path helper for one (project, page).
#[derive(Clone, Debug)]
pub struct PageArtifacts {
    project: String,
    page: String,
    data_dir: PathBuf,
}

impl PageArtifacts {
    /// Creates the helper rooted at `data_dir`.
    pub fn new(data_dir: &Path, project: &str, page: &str) -> Self {
        Self {
            project: project.to_owned(),
            page: page.to_owned(),
            data_dir: data_dir.to_owned(),
        }
    }

    /// Flattens a model identifier for filesystem use (`a/b` → `a_b`).
    pub fn model_id(model: &str) -> String {
        model.replace('/', "_")
    }

    /// The page directory holding the authored template and sidecar config.
    pub fn page_dir(&self) -> PathBuf {
        self.data_dir
            .join(&self.project)
            .join("pages")
            .join(&self.page)
    }

    /// The project's shared stylesheet, inlined into generated documents.
    pub fn global_css(&self) -> PathBuf {
        self.data_dir.join(&self.project).join("global.css")
    }

    fn generated_dir(&self) -> PathBuf {
        self.page_dir().join("generated")
    }

    /// Rendered reference document.
    pub fn reference_html(&self) -> PathBuf {
        self.generated_dir().join("reference.html")
    }

    /// Reference screenshot.
    pub fn reference_png(&self) -> PathBuf {
        self.generated_dir().join("reference.png")
    }

    /// Corrupted document for a variant.
    pub fn variant_html(&self, variant: &str) -> PathBuf {
        self.generated_dir().join(variant).join("page.html")
    }

    /// Corrupted-page screenshot for a variant.
    pub fn variant_png(&self, variant: &str) -> PathBuf {
        self.generated_dir().join(variant).join("page.png")
    }

    /// Human-inspectable copy of the payload shown to the model.
    pub fn prompt_html(&self, variant: &str) -> PathBuf {
        self.generated_dir().join(variant).join("prompt.html")
    }

    fn model_dir(&self, variant: &str, model: &str) -> PathBuf {
        self.generated_dir().join(variant).join(Self::model_id(model))
    }

    /// Raw model response.
    pub fn response_json(&self, variant: &str, model: &str) -> PathBuf {
        self.model_dir(variant, model).join("response.json")
    }

    /// Corrected document composed from the model's fix.
    pub fn corrected_html(&self, variant: &str, model: &str) -> PathBuf {
        self.model_dir(variant, model).join("page.html")
    }

    /// Corrected-page screenshot.
    pub fn corrected_png(&self, variant: &str, model: &str) -> PathBuf {
        self.model_dir(variant, model).join("page.png")
    }

    /// Persisted verdict.
    pub fn result_json(&self, variant: &str, model: &str) -> PathBuf {
        self.model_dir(variant, model).join("result.json")
    }

    /// Converts an artifact path into the path the content server serves.
    ///
    /// Falls back to the raw path when it is not under the data directory.
    pub fn server_path(&self, artifact: &Path) -> String {
        let relative = artifact.strip_prefix(&self.data_dir).unwrap_or(artifact);
        relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_the_generated_tree() {
        let artifacts = PageArtifacts::new(Path::new("data"), "shop", "landing");
        assert_eq!(
            artifacts.reference_html(),
            Path::new("data/shop/pages/landing/generated/reference.html")
        );
        assert_eq!(
            artifacts.variant_png("v1"),
            Path::new("data/shop/pages/landing/generated/v1/page.png")
        );
        assert_eq!(
            artifacts.result_json("v1", "org/model"),
            Path::new("data/shop/pages/landing/generated/v1/org_model/result.json")
        );
    }

    #[test]
    fn server_path_is_relative_and_slash_separated() {
        let artifacts = PageArtifacts::new(Path::new("data"), "shop", "landing");
        assert_eq!(
            artifacts.server_path(&artifacts.reference_html()),
            "shop/pages/landing/generated/reference.html"
        );
    }
}
