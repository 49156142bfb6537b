use super::*;

fn linux_amd64() -> Platform {
    Platform::new(Os::Linux, Arch::X86_64)
}

fn macos_arm64() -> Platform {
    Platform::new(Os::Macos, Arch::Aarch64)
}

#[test]
fn builtin_catalog_loads_in_installation_order() {
    let catalog = Catalog::builtin().expect("built-in catalog must parse");
    let ids: Vec<ToolId> = catalog.tools.iter().map(|tool| tool.id).collect();
    assert_eq!(ids, ToolId::ORDER);
    assert_eq!(catalog.required_commands, vec!["curl", "tar", "unzip"]);
    assert_eq!(catalog.profiles, vec![".profile", ".zprofile"]);
}

#[test]
fn builtin_catalog_pins_runtime_toolchain() {
    let catalog = Catalog::builtin().expect("built-in catalog must parse");
    let runtime = catalog.tool(ToolId::Runtime).expect("runtime entry");
    let toolchain = runtime.toolchain.as_ref().expect("runtime toolchain");
    assert_eq!(toolchain.workspace_query, vec!["env", "GOPATH"]);
    assert_eq!(toolchain.workspace_env.as_deref(), Some("GOPATH"));
    assert_eq!(toolchain.cache_env.as_deref(), Some("GOCACHE"));
    assert_eq!(
        toolchain.env.get("GOFLAGS").map(String::as_str),
        Some("-modcacherw")
    );
    assert_eq!(runtime.path_integration.as_deref(), Some("bin"));

    let cli = catalog.tool(ToolId::Cli).expect("cli entry");
    let ToolSource::Build(build) = &cli.source else {
        panic!("cli must be built from the runtime");
    };
    assert_eq!(build.toolchain, ToolId::Runtime);
    let module_ref = build.module_ref(&cli.version_string());
    assert_eq!(module_ref, "github.com/terraform-linters/tflint@v0.52.0");
    assert_eq!(
        toolchain.build_args(&module_ref),
        vec!["install", "github.com/terraform-linters/tflint@v0.52.0"]
    );
}

#[test]
fn runtime_artifact_urls_follow_platform_tokens() {
    let catalog = Catalog::builtin().expect("built-in catalog must parse");
    let runtime = catalog.tool(ToolId::Runtime).expect("runtime entry");
    let ToolSource::Archive(source) = &runtime.source else {
        panic!("runtime must be an archive");
    };

    assert_eq!(
        source.artifact_url(linux_amd64(), "1.22.5"),
        "https://go.dev/dl/go1.22.5.linux-amd64.tar.gz"
    );
    assert_eq!(
        source.checksum_url(macos_arm64(), "1.22.5"),
        "https://go.dev/dl/go1.22.5.darwin-arm64.tar.gz.sha256"
    );
    assert_eq!(
        source.artifact_file_name(macos_arm64(), "1.22.5"),
        "go1.22.5.darwin-arm64.tar.gz"
    );
    assert_eq!(source.archive_type().expect("archive type"), ArchiveType::TarGz);
}

#[test]
fn gui_tool_urls_use_title_case_os() {
    let catalog = Catalog::builtin().expect("built-in catalog must parse");
    let gui = catalog.tool(ToolId::GuiTool).expect("gui entry");
    let ToolSource::Archive(source) = &gui.source else {
        panic!("gui tool must be an archive");
    };
    assert_eq!(
        source.artifact_url(macos_arm64(), "0.32.5"),
        "https://github.com/derailed/k9s/releases/download/v0.32.5/k9s_Darwin_arm64.tar.gz"
    );
    assert!(gui.optional);
    assert!(!gui.is_supported_on(Platform::new(Os::Linux, Arch::Aarch64)));
    assert!(gui.is_supported_on(linux_amd64()));
}

#[test]
fn platform_resolve_accepts_host_spellings() {
    assert_eq!(Platform::resolve("Linux", "x86_64"), Some(linux_amd64()));
    assert_eq!(Platform::resolve("Darwin", "arm64"), Some(macos_arm64()));
    assert_eq!(Platform::resolve("macos", "aarch64"), Some(macos_arm64()));
    assert_eq!(Platform::resolve("linux", "amd64"), Some(linux_amd64()));
    assert_eq!(Platform::resolve("Linux", "riscv64"), None);
    assert_eq!(Platform::resolve("FreeBSD", "x86_64"), None);
}

#[test]
fn platform_display_round_trips_through_from_str() {
    let platform: Platform = "macos-aarch64".parse().expect("must parse");
    assert_eq!(platform, macos_arm64());
    assert_eq!(platform.to_string(), "macos-aarch64");
    assert!("linux".parse::<Platform>().is_err());
}

#[test]
fn archive_type_inference_ignores_query_and_fragment() {
    assert_eq!(
        ArchiveType::infer_from_url("https://example.test/tool.tar.gz?token=1"),
        Some(ArchiveType::TarGz)
    );
    assert_eq!(
        ArchiveType::infer_from_url("https://example.test/tool.ZIP#frag"),
        Some(ArchiveType::Zip)
    );
    assert_eq!(ArchiveType::infer_from_url("https://example.test/tool"), None);
}

const MINIMAL_TOOLS: &str = r#"
[[tools]]
id = "runtime"
name = "go"
version = "1.22.5"
install_base = "system"
install_root = "usr/local/go"
binary = "bin/go"

[tools.source]
kind = "archive"
url = "https://example.test/go{version}.{os}-{arch}.tar.gz"
checksum_url = "https://example.test/go{version}.sha256"
payload = "go"

[tools.toolchain]
workspace_query = ["env", "GOPATH"]
build = ["install", "{module}"]
output_dir = "bin"

[[tools]]
id = "cli"
name = "tflint"
version = "0.52.0"
install_base = "system"
install_root = "usr/local/bin"
binary = "tflint"

[tools.source]
kind = "build"
toolchain = "runtime"
module = "example.test/tflint@v{version}"
output = "tflint"

[[tools]]
id = "iac-tool"
name = "terraform"
version = "1.9.2"
install_base = "system"
install_root = "usr/local/bin"
binary = "terraform"

[tools.source]
kind = "archive"
url = "https://example.test/terraform_{version}_{os}_{arch}.zip"
checksum_url = "https://example.test/terraform_{version}_SHA256SUMS"
payload = "terraform"

[[tools]]
id = "gui-tool"
name = "k9s"
version = "0.32.5"
install_base = "user-home"
install_root = ".k9s"
binary = "bin/k9s"
optional = true

[tools.source]
kind = "archive"
url = "https://example.test/k9s_{Os}_{arch}.tar.gz"
checksum_url = "https://example.test/checksums.sha256"
payload = "k9s"
"#;

#[test]
fn catalog_infers_archive_type_when_omitted() {
    let input = format!("supported = [\"linux-x86_64\"]\n{MINIMAL_TOOLS}");
    let catalog = Catalog::from_toml_str(&input).expect("catalog must parse");
    let iac = catalog.tool(ToolId::IacTool).expect("iac entry");
    let ToolSource::Archive(source) = &iac.source else {
        panic!("iac tool must be an archive");
    };
    assert_eq!(source.archive_type().expect("archive type"), ArchiveType::Zip);
    assert_eq!(catalog.timeouts, Timeouts::default());
}

#[test]
fn catalog_rejects_out_of_order_tools() {
    let reordered = MINIMAL_TOOLS.replacen("id = \"runtime\"", "id = \"placeholder\"", 1);
    let input = format!("supported = [\"linux-x86_64\"]\n{reordered}");
    assert!(Catalog::from_toml_str(&input).is_err());
}

#[test]
fn catalog_rejects_unknown_template_placeholder() {
    let broken = MINIMAL_TOOLS.replace("{Os}", "{platform}");
    let input = format!("supported = [\"linux-x86_64\"]\n{broken}");
    let err = Catalog::from_toml_str(&input).expect_err("must reject placeholder");
    assert!(format!("{err:#}").contains("unknown placeholder"));
}

#[test]
fn catalog_rejects_escaping_install_root() {
    let broken = MINIMAL_TOOLS.replace("install_root = \".k9s\"", "install_root = \"../k9s\"");
    let input = format!("supported = [\"linux-x86_64\"]\n{broken}");
    let err = Catalog::from_toml_str(&input).expect_err("must reject parent segments");
    assert!(format!("{err:#}").contains("install_root"));
}

#[test]
fn catalog_rejects_unsupported_list_on_required_tool() {
    let broken = MINIMAL_TOOLS.replace(
        "binary = \"terraform\"",
        "binary = \"terraform\"\nunsupported = [\"linux-aarch64\"]",
    );
    let input = format!("supported = [\"linux-x86_64\"]\n{broken}");
    assert!(Catalog::from_toml_str(&input).is_err());
}

#[test]
fn catalog_requires_supported_platforms() {
    let input = format!("supported = []\n{MINIMAL_TOOLS}");
    assert!(Catalog::from_toml_str(&input).is_err());
}
