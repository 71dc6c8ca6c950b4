//! Client Capability Detection
//!
//! A custom `MYSQL_PS1` prompt only renders correctly when the client is
//! linked against readline or editline. Linkage is inspected with a
//! platform tool; platforms without a trusted inspector report the
//! capability as unsupported.

use std::path::Path;

use tokio::process::Command;
use tracing::debug;

use crate::config::LinkageInspectorSetting;
use crate::error::{Result, ShellError};

/// Derived capabilities of the interactive client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientCapability {
    pub supports_prompt_customization: bool,
}

const OTOOL_ARGS: &[&str] = &["-L"];
const NO_ARGS: &[&str] = &[];

/// Strategy for listing the dynamic libraries of a binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkageInspector {
    /// `otool -L <binary>`
    Otool,
    /// `ldd <binary>`
    Ldd,
    /// No introspection available
    Unsupported,
}

impl LinkageInspector {
    /// Inspector for the platform this binary was built for.
    ///
    /// Linux clients are frequently linked statically against editline,
    /// so `ldd` output is not trusted there unless explicitly requested.
    #[must_use]
    pub const fn for_current_platform() -> Self {
        if cfg!(target_os = "macos") {
            Self::Otool
        } else {
            Self::Unsupported
        }
    }

    #[must_use]
    pub const fn from_setting(setting: LinkageInspectorSetting) -> Self {
        match setting {
            LinkageInspectorSetting::Auto => Self::for_current_platform(),
            LinkageInspectorSetting::Otool => Self::Otool,
            LinkageInspectorSetting::Ldd => Self::Ldd,
            LinkageInspectorSetting::None => Self::Unsupported,
        }
    }

    /// Command name and leading arguments, if any
    const fn command(self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Self::Otool => Some(("otool", OTOOL_ARGS)),
            Self::Ldd => Some(("ldd", NO_ARGS)),
            Self::Unsupported => None,
        }
    }

    /// Whether `binary` links against readline or editline.
    ///
    /// # Errors
    ///
    /// Returns `Inspection` when the inspector cannot run or exits
    /// unsuccessfully.
    pub async fn is_linked(self, binary: &Path) -> Result<bool> {
        let Some((program, args)) = self.command() else {
            return Ok(false);
        };
        let inspection_err = |reason: String| ShellError::Inspection {
            inspector: program.to_string(),
            binary: binary.display().to_string(),
            reason,
        };

        let output = Command::new(program)
            .args(args)
            .arg(binary)
            .output()
            .await
            .map_err(|e| inspection_err(format!("failed to run {program}: {e}")))?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if !output.status.success() {
            return Err(inspection_err(format!(
                "{program} exited with {}\noutput: {combined}",
                output.status
            )));
        }

        Ok(links_line_editor(&combined))
    }
}

/// Whether a library listing mentions readline (`libreadline`) or
/// editline (`libedit`).
#[must_use]
pub fn links_line_editor(libs: &str) -> bool {
    libs.contains("libreadline") || libs.contains("libedit")
}

/// Detect the client's capabilities. Never fails: any inspection problem
/// yields the unsupported default, reported only when `verbose`.
pub async fn detect(inspector: LinkageInspector, binary: &Path, verbose: bool) -> ClientCapability {
    let linked = match inspector.is_linked(binary).await {
        Ok(linked) => {
            if verbose {
                if linked {
                    debug!(client = %binary.display(), "Client is linked against readline/editline");
                } else {
                    debug!(client = %binary.display(), ?inspector, "Client is not linked against readline/editline");
                }
            }
            linked
        }
        Err(e) => {
            if verbose {
                debug!(client = %binary.display(), error = %e, "Failed to check client linking");
            }
            false
        }
    };

    ClientCapability {
        supports_prompt_customization: linked,
    }
}
