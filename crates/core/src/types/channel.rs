use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// =============================================================================
// Execution Options
// =============================================================================

/// Toolchain release channel. Each one selects a pre-provisioned root/image.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
    Stable,
    Beta,
    Nightly,
}

impl ReleaseChannel {
    /// All channels, in discriminant order.
    pub const ALL: [ReleaseChannel; 3] = [Self::Stable, Self::Beta, Self::Nightly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Beta => "beta",
            Self::Nightly => "nightly",
        }
    }

    /// Unstable channels publish oversized output as gists instead of
    /// shortened playground links.
    pub fn is_unstable(&self) -> bool {
        matches!(self, Self::Nightly)
    }
}

impl Default for ReleaseChannel {
    fn default() -> Self {
        Self::Stable
    }
}

impl fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseChannel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(Self::Stable),
            "beta" => Ok(Self::Beta),
            "nightly" => Ok(Self::Nightly),
            _ => Err(Error::validation(format!("unknown release channel {}", s))),
        }
    }
}

/// rustc optimization level.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum OptLevel {
    O0,
    O1,
    O2,
    O3,
}

impl OptLevel {
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::O0 => 0,
            Self::O1 => 1,
            Self::O2 => 2,
            Self::O3 => 3,
        }
    }

    /// Debug builds get `-g` and automatic backtraces.
    pub fn is_debug(&self) -> bool {
        matches!(self, Self::O0)
    }
}

impl Default for OptLevel {
    fn default() -> Self {
        Self::O2
    }
}

impl FromStr for OptLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Self::O0),
            "1" => Ok(Self::O1),
            "2" => Ok(Self::O2),
            "3" => Ok(Self::O3),
            _ => Err(Error::validation(format!("unknown optimization level {}", s))),
        }
    }
}

/// When to ask the program for a backtrace on panic.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Backtrace {
    Never,
    Always,
    /// Only for debug builds.
    Auto,
}

impl Backtrace {
    pub fn is_requested(&self, debug: bool) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Auto => debug,
        }
    }
}

impl Default for Backtrace {
    fn default() -> Self {
        Self::Auto
    }
}

impl FromStr for Backtrace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(Self::Never),
            "always" => Ok(Self::Always),
            "auto" => Ok(Self::Auto),
            _ => Err(Error::validation(format!("unknown backtrace mode {}", s))),
        }
    }
}

/// What `compile.json` should emit.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CompileOutput {
    Asm,
    LlvmIr,
    Mir,
}

impl CompileOutput {
    /// rustc flags selecting this output.
    pub fn as_opts(&self) -> &'static [&'static str] {
        match self {
            Self::Asm => &["--emit=asm"],
            Self::LlvmIr => &["--emit=llvm-ir"],
            Self::Mir => &["-Zunstable-options", "--unpretty=mir"],
        }
    }
}

impl Default for CompileOutput {
    fn default() -> Self {
        Self::Asm
    }
}

impl FromStr for CompileOutput {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asm" => Ok(Self::Asm),
            "llvm-ir" => Ok(Self::LlvmIr),
            "mir" => Ok(Self::Mir),
            _ => Err(Error::validation(format!("unknown output format {}", s))),
        }
    }
}

/// Assembly dialect for `--emit=asm`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum AsmFlavor {
    Att,
    Intel,
}

impl AsmFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Att => "att",
            Self::Intel => "intel",
        }
    }
}

impl Default for AsmFlavor {
    fn default() -> Self {
        Self::Att
    }
}

impl FromStr for AsmFlavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "att" => Ok(Self::Att),
            "intel" => Ok(Self::Intel),
            _ => Err(Error::validation(format!("unknown asm dialect {}", s))),
        }
    }
}
