use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::errors::VulnAgentError;

/// Variables available for `{{NAME}}` interpolation in prompt files.
#[derive(Debug, Clone, Default)]
pub struct PromptVariables {
    pub target_url: String,
    pub session_id: String,
    pub max_steps: u32,
}

/// Loads prompt files with `@include(path)` directives and variable interpolation.
pub struct PromptLoader {
    base_dir: PathBuf,
}

const MAX_INCLUDE_DEPTH: u8 = 5;

impl PromptLoader {
    pub fn new(base_dir: PathBuf) -> Self {
        debug!(dir = %base_dir.display(), "PromptLoader initialized");
        Self { base_dir }
    }

    /// Loader rooted at the file's own directory.
    pub fn for_file(path: &Path) -> Self {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::new(dir)
    }

    /// Read `path` (relative paths resolve against the base directory) and
    /// expand its includes.
    pub fn load_file(&self, path: &Path) -> Result<String, VulnAgentError> {
        let file_path = self.resolve(path);
        let content = std::fs::read_to_string(&file_path).map_err(|e| {
            VulnAgentError::Config(format!("Failed to read prompt {}: {}", file_path.display(), e))
        })?;
        self.process_includes(&content, 0)
    }

    /// Replace `{{TARGET_URL}}`, `{{SESSION_ID}}` and `{{MAX_STEPS}}`.
    pub fn interpolate(&self, template: &str, vars: &PromptVariables) -> String {
        let max_steps = vars.max_steps.to_string();
        let replacements: [(&str, &str); 3] = [
            ("{{TARGET_URL}}", &vars.target_url),
            ("{{SESSION_ID}}", &vars.session_id),
            ("{{MAX_STEPS}}", &max_steps),
        ];

        let mut result = template.to_string();
        for (placeholder, value) in replacements {
            result = result.replace(placeholder, value);
        }
        result
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn process_includes(&self, content: &str, depth: u8) -> Result<String, VulnAgentError> {
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(VulnAgentError::Config(format!(
                "Include depth limit ({}) exceeded, possible circular include",
                MAX_INCLUDE_DEPTH
            )));
        }

        let include_re = Regex::new(r"@include\(([^)]+)\)")
            .map_err(|e| VulnAgentError::Internal(format!("Invalid include pattern: {}", e)))?;

        let matches: Vec<(String, String)> = include_re
            .captures_iter(content)
            .map(|cap| (cap[0].to_string(), cap[1].trim().to_string()))
            .collect();

        let mut result = content.to_string();
        for (full_match, include_path) in matches {
            let file_path = self.resolve(Path::new(&include_path));
            let included = std::fs::read_to_string(&file_path).map_err(|e| {
                VulnAgentError::Config(format!(
                    "Failed to read included file {} (referenced as @include({})): {}",
                    file_path.display(),
                    include_path,
                    e
                ))
            })?;
            let processed = self.process_includes(&included, depth + 1)?;
            result = result.replace(&full_match, &processed);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup_test_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("shared")).unwrap();
        fs::write(dir.path().join("shared/_scope.txt"), "Scope: {{TARGET_URL}}").unwrap();
        fs::write(
            dir.path().join("system.txt"),
            "Session {{SESSION_ID}}\n@include(shared/_scope.txt)\nBudget {{MAX_STEPS}} steps.",
        )
        .unwrap();
        fs::write(dir.path().join("loop_a.txt"), "@include(loop_b.txt)").unwrap();
        fs::write(dir.path().join("loop_b.txt"), "@include(loop_a.txt)").unwrap();
        dir
    }

    #[test]
    fn test_load_with_includes_and_interpolate() {
        let dir = setup_test_dir();
        let path = dir.path().join("system.txt");
        let loader = PromptLoader::for_file(&path);
        let template = loader.load_file(&path).unwrap();
        assert!(!template.contains("@include"));

        let vars = PromptVariables {
            target_url: "http://localhost:3000".into(),
            session_id: "scan-1".into(),
            max_steps: 40,
        };
        assert_eq!(
            loader.interpolate(&template, &vars),
            "Session scan-1\nScope: http://localhost:3000\nBudget 40 steps."
        );
    }

    #[test]
    fn test_circular_include_is_an_error() {
        let dir = setup_test_dir();
        let loader = PromptLoader::new(dir.path().to_path_buf());
        let err = loader.load_file(Path::new("loop_a.txt")).unwrap_err();
        assert!(err.to_string().contains("Include depth limit"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = setup_test_dir();
        let loader = PromptLoader::new(dir.path().to_path_buf());
        assert!(matches!(
            loader.load_file(Path::new("nope.txt")),
            Err(VulnAgentError::Config(_))
        ));
    }
}
