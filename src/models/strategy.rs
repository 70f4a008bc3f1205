use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TestIntensity {
    Light,
    #[default]
    Normal,
    Thorough,
}

impl TestIntensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestIntensity::Light => "light",
            TestIntensity::Normal => "normal",
            TestIntensity::Thorough => "thorough",
        }
    }
}

impl fmt::Display for TestIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adaptive testing configuration. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStrategy {
    #[serde(default)]
    pub focus_areas: Vec<String>,
    /// URL substrings to avoid.
    #[serde(default)]
    pub skip_patterns: Vec<String>,
    pub max_depth: u32,
    #[serde(default)]
    pub test_intensity: TestIntensity,
}

impl Default for ScanStrategy {
    fn default() -> Self {
        Self {
            focus_areas: Vec::new(),
            skip_patterns: Vec::new(),
            max_depth: 3,
            test_intensity: TestIntensity::Normal,
        }
    }
}

impl ScanStrategy {
    /// First non-empty skip pattern contained in `url`.
    pub fn skip_match(&self, url: &str) -> Option<&str> {
        self.skip_patterns
            .iter()
            .map(String::as_str)
            .find(|p| !p.trim().is_empty() && url.contains(p))
    }

    /// Focus or intensity changed. Depth and skip patterns alone do not count.
    pub fn differs_significantly(&self, other: &ScanStrategy) -> bool {
        self.focus_areas != other.focus_areas || self.test_intensity != other.test_intensity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TacticPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tactic {
    pub technique: String,
    pub description: String,
    pub priority: TacticPriority,
}
