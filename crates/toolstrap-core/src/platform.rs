use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Os {
    Linux,
    Macos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arch {
    X86_64,
    Aarch64,
}

/// A resolved host platform.
///
/// Every artifact-naming routine works from this pair; raw OS/arch strings are
/// only accepted by [`Platform::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Os {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "linux" => Some(Self::Linux),
            "macos" | "darwin" | "osx" => Some(Self::Macos),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
        }
    }

    /// Lowercase token used by release URLs (`linux`, `darwin`).
    pub fn url_token(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "darwin",
        }
    }

    /// Capitalized token used by some release URLs (`Linux`, `Darwin`).
    pub fn title_token(self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::Macos => "Darwin",
        }
    }
}

impl Arch {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Some(Self::X86_64),
            "aarch64" | "arm64" => Some(Self::Aarch64),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
        }
    }

    pub fn url_token(self) -> &'static str {
        match self {
            Self::X86_64 => "amd64",
            Self::Aarch64 => "arm64",
        }
    }
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Resolves host spellings such as `("Darwin", "arm64")` or
    /// `("linux", "x86_64")`. Returns `None` for anything outside the closed set.
    pub fn resolve(os: &str, arch: &str) -> Option<Self> {
        Some(Self {
            os: Os::parse(os)?,
            arch: Arch::parse(arch)?,
        })
    }

    /// Substitutes `{version}`, `{os}`, `{Os}` and `{arch}` in a URL template.
    pub fn render_template(self, template: &str, version: &str) -> String {
        template
            .replace("{version}", version)
            .replace("{os}", self.os.url_token())
            .replace("{Os}", self.os.title_token())
            .replace("{arch}", self.arch.url_token())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (os, arch) = value
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow!("platform must be formatted as <os>-<arch>: {value}"))?;
        Self::resolve(os, arch).ok_or_else(|| anyhow!("unknown platform: {value}"))
    }
}

impl TryFrom<String> for Platform {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.to_string()
    }
}
