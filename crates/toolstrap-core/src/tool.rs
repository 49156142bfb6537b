use std::fmt;

use serde::{Deserialize, Serialize};

/// Ledger identity of a managed tool, in installation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolId {
    Runtime,
    Cli,
    IacTool,
    GuiTool,
}

impl ToolId {
    pub const ORDER: [ToolId; 4] = [Self::Runtime, Self::Cli, Self::IacTool, Self::GuiTool];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Cli => "cli",
            Self::IacTool => "iac-tool",
            Self::GuiTool => "gui-tool",
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
