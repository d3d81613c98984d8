//! The installable backends and the recognition model set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two installable components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Source-built speech recognition engine (whisper.cpp).
    Recognition,
    /// Package-manager distributed speech synthesis service (Kokoro-FastAPI).
    Synthesis,
}

impl Backend {
    /// All backends, in install order.
    pub const ALL: [Backend; 2] = [Backend::Recognition, Backend::Synthesis];

    /// Human-facing project name.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Recognition => "whisper.cpp",
            Backend::Synthesis => "kokoro-fastapi",
        }
    }

    /// Directory name used under the install root by default.
    pub fn dir_name(&self) -> &'static str {
        self.name()
    }

    /// Prefix of the per-port service unit name.
    pub fn unit_prefix(&self) -> &'static str {
        match self {
            Backend::Recognition => "whisper-server",
            Backend::Synthesis => "kokoro-fastapi",
        }
    }

    /// Port the service listens on unless told otherwise.
    pub fn default_port(&self) -> u16 {
        match self {
            Backend::Recognition => 2022,
            Backend::Synthesis => 8880,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Recognition model sizes published as ggml weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecognitionModel {
    #[serde(rename = "tiny")]
    Tiny,
    #[serde(rename = "tiny.en")]
    TinyEn,
    #[serde(rename = "base")]
    Base,
    #[serde(rename = "base.en")]
    BaseEn,
    #[serde(rename = "small")]
    Small,
    #[serde(rename = "small.en")]
    SmallEn,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "medium.en")]
    MediumEn,
    #[serde(rename = "large-v1")]
    LargeV1,
    #[default]
    #[serde(rename = "large-v2")]
    LargeV2,
    #[serde(rename = "large-v3")]
    LargeV3,
    #[serde(rename = "large-v3-turbo")]
    LargeV3Turbo,
}

impl RecognitionModel {
    /// Every supported model.
    pub const ALL: [RecognitionModel; 12] = [
        RecognitionModel::Tiny,
        RecognitionModel::TinyEn,
        RecognitionModel::Base,
        RecognitionModel::BaseEn,
        RecognitionModel::Small,
        RecognitionModel::SmallEn,
        RecognitionModel::Medium,
        RecognitionModel::MediumEn,
        RecognitionModel::LargeV1,
        RecognitionModel::LargeV2,
        RecognitionModel::LargeV3,
        RecognitionModel::LargeV3Turbo,
    ];

    /// The model's canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionModel::Tiny => "tiny",
            RecognitionModel::TinyEn => "tiny.en",
            RecognitionModel::Base => "base",
            RecognitionModel::BaseEn => "base.en",
            RecognitionModel::Small => "small",
            RecognitionModel::SmallEn => "small.en",
            RecognitionModel::Medium => "medium",
            RecognitionModel::MediumEn => "medium.en",
            RecognitionModel::LargeV1 => "large-v1",
            RecognitionModel::LargeV2 => "large-v2",
            RecognitionModel::LargeV3 => "large-v3",
            RecognitionModel::LargeV3Turbo => "large-v3-turbo",
        }
    }

    /// Weight file name, e.g. `ggml-tiny.bin`.
    pub fn file_name(&self) -> String {
        format!("ggml-{}.bin", self.as_str())
    }
}

impl fmt::Display for RecognitionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecognitionModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecognitionModel::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<_> = RecognitionModel::ALL.iter().map(|m| m.as_str()).collect();
                format!("unknown model '{}'; expected one of: {}", s, names.join(", "))
            })
    }
}
