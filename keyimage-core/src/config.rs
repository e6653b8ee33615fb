//! Tool configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Point2, ToolError, ToolResult};

/// Default on-screen anchor of the key image indicator.
pub const DEFAULT_CANVAS_POSITION: [f64; 2] = [10.0, 10.0];

/// Default side length of the indicator box, in pixels.
pub const DEFAULT_CANVAS_SIZE: f64 = 10.0;

/// Default handle radius for point annotations.
pub const DEFAULT_HANDLE_RADIUS: &str = "6";

/// Per-instance configuration for the key image tool.
///
/// Field names follow the host's camelCase JSON so an existing tool
/// configuration can be loaded unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolConfig {
    /// Fixed screen anchor of the indicator.
    pub canvas_position: [f64; 2],
    /// Side length of the indicator box.
    pub canvas_size: f64,
    /// Radius of the point handle glyph, as the host's style string.
    pub handle_radius: String,
    /// New annotations describe a whole series.
    pub series_level: bool,
    /// New annotations render as a dot at the handle.
    pub is_point: bool,
    /// Remove an annotation whose handle ends outside the image.
    pub prevent_handle_outside_image: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            canvas_position: DEFAULT_CANVAS_POSITION,
            canvas_size: DEFAULT_CANVAS_SIZE,
            handle_radius: DEFAULT_HANDLE_RADIUS.to_string(),
            series_level: false,
            is_point: false,
            prevent_handle_outside_image: false,
        }
    }
}

impl ToolConfig {
    /// Parse and validate a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails validation.
    pub fn from_json(json: &str) -> ToolResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn from_file(path: impl AsRef<Path>) -> ToolResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidConfig`] describing the first bad field.
    pub fn validate(&self) -> ToolResult<()> {
        if !self.canvas_position.iter().all(|v| v.is_finite()) {
            return Err(ToolError::InvalidConfig(format!(
                "canvasPosition must be finite, got {:?}",
                self.canvas_position
            )));
        }
        if !self.canvas_size.is_finite() || self.canvas_size < 0.0 {
            return Err(ToolError::InvalidConfig(format!(
                "canvasSize must be a non-negative number, got {}",
                self.canvas_size
            )));
        }
        self.handle_radius_px()?;
        Ok(())
    }

    /// The handle radius as a number of pixels.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidConfig`] if `handle_radius` is not a
    /// finite non-negative number.
    pub fn handle_radius_px(&self) -> ToolResult<f64> {
        let radius: f64 = self.handle_radius.trim().parse().map_err(|_| {
            ToolError::InvalidConfig(format!(
                "handleRadius must be numeric, got {:?}",
                self.handle_radius
            ))
        })?;
        if !radius.is_finite() || radius < 0.0 {
            return Err(ToolError::InvalidConfig(format!(
                "handleRadius must be non-negative, got {radius}"
            )));
        }
        Ok(radius)
    }

    /// The indicator anchor as a point.
    #[must_use]
    pub fn anchor(&self) -> Point2 {
        Point2::from(self.canvas_position)
    }
}
