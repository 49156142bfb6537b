mod archive;
mod catalog;
mod platform;
mod tool;

pub use archive::ArchiveType;
pub use catalog::{
    ArchiveSource, BuildSource, Catalog, InstallBase, Timeouts, ToolSource, ToolSpec, Toolchain,
};
pub use platform::{Arch, Os, Platform};
pub use tool::ToolId;

#[cfg(test)]
mod tests;
