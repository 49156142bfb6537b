use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path};
use std::time::Duration;

use anyhow::{anyhow, Context};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveType;
use crate::platform::{Arch, Os, Platform};
use crate::tool::ToolId;

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Catalog {
    pub supported: Vec<Platform>,
    #[serde(default)]
    pub required_commands: Vec<String>,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub timeouts: Timeouts,
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timeouts {
    pub download_secs: u64,
    pub extract_secs: u64,
    pub build_secs: u64,
    pub self_check_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InstallBase {
    /// Rooted at the host filesystem root; needs elevated privileges.
    System,
    /// Rooted at the invoking user's home directory.
    UserHome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolSpec {
    pub id: ToolId,
    pub name: String,
    pub version: Version,
    pub install_base: InstallBase,
    pub install_root: String,
    pub binary: String,
    pub source: ToolSource,
    pub path_integration: Option<String>,
    pub profile_path: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub unsupported: Vec<Platform>,
    #[serde(default)]
    pub self_check: Vec<String>,
    pub toolchain: Option<Toolchain>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ToolSource {
    Archive(ArchiveSource),
    Build(BuildSource),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveSource {
    pub url: String,
    pub checksum_url: String,
    pub archive: Option<ArchiveType>,
    /// Path inside the extracted archive that gets installed. A directory has
    /// its entries placed into the install root; a file becomes the binary.
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildSource {
    pub toolchain: ToolId,
    pub module: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Toolchain {
    /// Arguments that make the installed toolchain print its workspace path.
    pub workspace_query: Vec<String>,
    /// Variable pinning the workspace for the build invocation.
    pub workspace_env: Option<String>,
    /// Variable moving the build cache inside the workspace.
    pub cache_env: Option<String>,
    pub build: Vec<String>,
    pub output_dir: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            download_secs: 600,
            extract_secs: 300,
            build_secs: 1200,
            self_check_secs: 60,
        }
    }
}

impl Timeouts {
    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }

    pub fn extract(&self) -> Duration {
        Duration::from_secs(self.extract_secs)
    }

    pub fn build(&self) -> Duration {
        Duration::from_secs(self.build_secs)
    }

    pub fn self_check(&self) -> Duration {
        Duration::from_secs(self.self_check_secs)
    }
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG).context("failed to load built-in tool catalog")
    }

    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let catalog: Self = toml::from_str(input).context("failed to parse tool catalog")?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn tool(&self, id: ToolId) -> Option<&ToolSpec> {
        self.tools.iter().find(|tool| tool.id == id)
    }

    pub fn is_supported(&self, platform: Platform) -> bool {
        self.supported.contains(&platform)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.supported.is_empty() {
            return Err(anyhow!("catalog must list at least one supported platform"));
        }

        let declared: Vec<ToolId> = self.tools.iter().map(|tool| tool.id).collect();
        if declared != ToolId::ORDER {
            return Err(anyhow!(
                "catalog must declare tools exactly once in order {:?}, found {:?}",
                ToolId::ORDER.map(ToolId::as_str),
                declared.iter().map(|id| id.as_str()).collect::<Vec<_>>()
            ));
        }

        let mut names = HashSet::new();
        for tool in &self.tools {
            if tool.name.trim().is_empty() {
                return Err(anyhow!("tool name must not be empty for '{}'", tool.id));
            }
            if !names.insert(tool.name.as_str()) {
                return Err(anyhow!("duplicate tool name '{}'", tool.name));
            }
            tool.validate(self)
                .with_context(|| format!("invalid catalog entry for '{}'", tool.id))?;
        }

        for profile in &self.profiles {
            validate_relative_path(profile)
                .with_context(|| format!("invalid profile file '{profile}'"))?;
        }

        Ok(())
    }
}

impl ToolSpec {
    pub fn is_supported_on(&self, platform: Platform) -> bool {
        !self.unsupported.contains(&platform)
    }

    /// Version string substituted into templates (`1.22.5`).
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    fn validate(&self, catalog: &Catalog) -> anyhow::Result<()> {
        validate_relative_path(&self.install_root).context("install_root")?;
        validate_relative_path(&self.binary).context("binary")?;
        if let Some(dir) = &self.path_integration {
            validate_relative_path(dir).context("path_integration")?;
        }
        if let Some(dir) = &self.profile_path {
            validate_relative_path(dir).context("profile_path")?;
        }
        if !self.unsupported.is_empty() && !self.optional {
            return Err(anyhow!("only optional tools may declare unsupported platforms"));
        }

        match &self.source {
            ToolSource::Archive(source) => {
                validate_template(&source.url).context("url")?;
                validate_template(&source.checksum_url).context("checksum_url")?;
                validate_relative_path(&source.payload).context("payload")?;
                source.archive_type()?;
            }
            ToolSource::Build(source) => {
                validate_template(&source.module).context("module")?;
                validate_relative_path(&source.output).context("output")?;
                let toolchain_tool = catalog.tool(source.toolchain).ok_or_else(|| {
                    anyhow!("build toolchain '{}' is not declared", source.toolchain)
                })?;
                let position = |id: ToolId| ToolId::ORDER.iter().position(|other| *other == id);
                if position(source.toolchain) >= position(self.id) {
                    return Err(anyhow!(
                        "build toolchain '{}' must be installed before '{}'",
                        source.toolchain,
                        self.id
                    ));
                }
                if toolchain_tool.toolchain.is_none() {
                    return Err(anyhow!(
                        "tool '{}' does not declare a toolchain section",
                        source.toolchain
                    ));
                }
            }
        }

        if let Some(toolchain) = &self.toolchain {
            if toolchain.workspace_query.is_empty() || toolchain.build.is_empty() {
                return Err(anyhow!("toolchain workspace_query and build must not be empty"));
            }
            validate_relative_path(&toolchain.output_dir).context("toolchain output_dir")?;
        }

        Ok(())
    }
}

impl ArchiveSource {
    pub fn archive_type(&self) -> anyhow::Result<ArchiveType> {
        if let Some(archive) = self.archive {
            return Ok(archive);
        }
        ArchiveType::infer_from_url(&self.url).ok_or_else(|| {
            anyhow!(
                "could not infer archive type from URL '{}'; set source.archive explicitly",
                self.url
            )
        })
    }

    pub fn artifact_url(&self, platform: Platform, version: &str) -> String {
        platform.render_template(&self.url, version)
    }

    pub fn checksum_url(&self, platform: Platform, version: &str) -> String {
        platform.render_template(&self.checksum_url, version)
    }

    /// Last path segment of the artifact URL, used both as the download file
    /// name and as the key looked up in checksum listings.
    pub fn artifact_file_name(&self, platform: Platform, version: &str) -> String {
        let url = self.artifact_url(platform, version);
        let without_query = url.split(['?', '#']).next().unwrap_or(&url);
        without_query
            .rsplit('/')
            .next()
            .unwrap_or(without_query)
            .to_string()
    }
}

impl BuildSource {
    pub fn module_ref(&self, version: &str) -> String {
        self.module.replace("{version}", version)
    }
}

impl Toolchain {
    pub fn build_args(&self, module_ref: &str) -> Vec<String> {
        self.build
            .iter()
            .map(|arg| arg.replace("{module}", module_ref))
            .collect()
    }
}

fn validate_template(template: &str) -> anyhow::Result<()> {
    let probe = Platform::new(Os::Linux, Arch::X86_64).render_template(template, "0.0.0");
    if probe.contains('{') || probe.contains('}') {
        return Err(anyhow!("template contains an unknown placeholder: {template}"));
    }
    Ok(())
}

fn validate_relative_path(value: &str) -> anyhow::Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("path must not be empty"));
    }
    let path = Path::new(value);
    if path
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(anyhow!("path must be relative without '.' or '..' segments: {value}"));
    }
    Ok(())
}
