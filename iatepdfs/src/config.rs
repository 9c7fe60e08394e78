//! Configuration module for iatepdfs.
//!
//! Settings are assembled by the front-end (CLI flags, or a GUI preferences
//! pane) and handed to [`crate::app::AppState`]. Nothing here reads files or
//! environment variables: defaults apply unless a caller overrides them.
//!
//! This module covers:
//! - The fixed compression [`QualityPreset`] enumeration
//! - Locations of the external binaries
//! - Time budgets for external tool calls
//! - Thumbnail rendering parameters

use crate::{PdfToolError, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

/// Compression quality preset, passed to Ghostscript as `-dPDFSETTINGS=/<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// Low resolution, smallest output (72 dpi).
    Screen,
    /// Medium resolution (150 dpi).
    #[default]
    Ebook,
    /// High resolution (300 dpi).
    Printer,
    /// High resolution with colour profiles preserved (300 dpi).
    Prepress,
}

impl QualityPreset {
    /// All presets, lowest quality first.
    pub const ALL: [QualityPreset; 4] = [
        QualityPreset::Screen,
        QualityPreset::Ebook,
        QualityPreset::Printer,
        QualityPreset::Prepress,
    ];

    /// Name used on the command line and in the Ghostscript argument.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Ebook => "ebook",
            Self::Printer => "printer",
            Self::Prepress => "prepress",
        }
    }

    /// Image resolution the preset targets, in dots per inch.
    pub fn resolution_dpi(&self) -> u32 {
        match self {
            Self::Screen => 72,
            Self::Ebook => 150,
            Self::Printer | Self::Prepress => 300,
        }
    }

    /// Whether colour profiles survive compression.
    pub fn preserves_color_profile(&self) -> bool {
        matches!(self, Self::Prepress)
    }

    /// Preset-specific Ghostscript arguments.
    pub fn ghostscript_args(&self) -> Vec<String> {
        let mut args = vec![format!("-dPDFSETTINGS=/{}", self.name())];
        if self.preserves_color_profile() {
            args.push("-sColorConversionStrategy=LeaveColorUnchanged".to_string());
        }
        args
    }
}

impl FromStr for QualityPreset {
    type Err = PdfToolError;

    /// Parse a preset name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for anything other than screen, ebook,
    /// printer or prepress.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "screen" => Ok(Self::Screen),
            "ebook" => Ok(Self::Ebook),
            "printer" => Ok(Self::Printer),
            "prepress" => Ok(Self::Prepress),
            _ => Err(PdfToolError::invalid_config(format!(
                "Invalid quality preset: {s}. Must be one of: screen, ebook, printer, prepress"
            ))),
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Locations of the external binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Ghostscript, used for compression.
    pub ghostscript: PathBuf,
    /// Poppler's `pdftoppm`, used for previews.
    pub rasterizer: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ghostscript: PathBuf::from("gs"),
            rasterizer: PathBuf::from("pdftoppm"),
        }
    }
}

/// Time budgets for external tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// One Ghostscript compression run.
    pub compression: Duration,
    /// One page preview.
    pub thumbnail: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            compression: Duration::from_secs(120),
            thumbnail: Duration::from_secs(20),
        }
    }
}

/// Preview rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSettings {
    /// Resolution for file-list rows.
    pub file_dpi: u32,
    /// Resolution for page-grid tiles.
    pub page_dpi: u32,
    /// Width every preview is scaled to, in pixels.
    pub width: u32,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            file_dpi: 72,
            page_dpi: 96,
            width: 120,
        }
    }
}

/// Complete settings for an application session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// External binaries.
    pub tools: ToolPaths,
    /// Tool time budgets.
    pub timeouts: Timeouts,
    /// Preview parameters.
    pub thumbnails: ThumbnailSettings,
    /// Worker threads for the background runtime (None = number of CPUs).
    pub jobs: Option<usize>,
    /// Render previews when files are added or a document is opened.
    pub previews: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            timeouts: Timeouts::default(),
            thumbnails: ThumbnailSettings::default(),
            jobs: None,
            previews: true,
        }
    }
}

impl Settings {
    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a timeout is zero, a preview parameter is
    /// zero, a tool path is empty or the worker count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.timeouts.compression.is_zero() || self.timeouts.thumbnail.is_zero() {
            return Err(PdfToolError::invalid_config("timeouts must be positive"));
        }

        let thumbs = &self.thumbnails;
        if thumbs.file_dpi == 0 || thumbs.page_dpi == 0 || thumbs.width == 0 {
            return Err(PdfToolError::invalid_config(
                "thumbnail resolution and width must be positive",
            ));
        }

        if self.tools.ghostscript.as_os_str().is_empty()
            || self.tools.rasterizer.as_os_str().is_empty()
        {
            return Err(PdfToolError::invalid_config("tool paths must not be empty"));
        }

        if self.jobs == Some(0) {
            return Err(PdfToolError::invalid_config(
                "worker count must be at least 1",
            ));
        }

        Ok(())
    }

    /// Worker threads for the background runtime.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
        })
    }
}
