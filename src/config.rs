use std::path::Path;

use serde::{
  Serialize,
  Deserialize,
};

use crate::error::HalaLightingError;

/// The maximum shadow bias that can be applied (in shadow map texels).
pub const MAX_SHADOW_BIAS: f32 = 10.0;

/// The maximum amount of lights that can be shaded per object on a capable device.
pub const MAX_PER_OBJECT_LIGHTS: i32 = 8;

/// The amount of lights that can be shaded per object on a device without fast dynamic indexing.
pub const LIMITED_PER_OBJECT_LIGHTS: i32 = 4;

/// The default ratio used to derive the inner spot cone from the outer one
/// when a light carries no inner angle.
pub const DEFAULT_SPOT_INNER_ANGLE_RATIO: f32 = 46.0 / 64.0;

/// The resolution of the shadow map.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "u32", into = "u32")]
pub enum HalaShadowMapSize {
  Size256,
  Size512,
  #[default]
  Size1024,
  Size2048,
  Size4096,
}

/// The implementation of the shadow map size.
impl HalaShadowMapSize {

  /// Get the resolution in texels.
  /// return: The resolution.
  pub fn resolution(&self) -> i32 {
    match self {
      HalaShadowMapSize::Size256 => 256,
      HalaShadowMapSize::Size512 => 512,
      HalaShadowMapSize::Size1024 => 1024,
      HalaShadowMapSize::Size2048 => 2048,
      HalaShadowMapSize::Size4096 => 4096,
    }
  }

  /// Get the shadow map size from a resolution.
  /// param resolution: The resolution in texels.
  /// return: The shadow map size or None if the resolution is not supported.
  pub fn from_resolution(resolution: u32) -> Option<Self> {
    match resolution {
      256 => Some(HalaShadowMapSize::Size256),
      512 => Some(HalaShadowMapSize::Size512),
      1024 => Some(HalaShadowMapSize::Size1024),
      2048 => Some(HalaShadowMapSize::Size2048),
      4096 => Some(HalaShadowMapSize::Size4096),
      _ => None,
    }
  }

}

impl std::convert::TryFrom<u32> for HalaShadowMapSize {
  type Error = String;

  fn try_from(value: u32) -> Result<Self, Self::Error> {
    Self::from_resolution(value)
      .ok_or_else(|| format!("Unsupported shadow map resolution {}, expected one of 256, 512, 1024, 2048 or 4096.", value))
  }
}

impl std::convert::From<HalaShadowMapSize> for u32 {
  fn from(value: HalaShadowMapSize) -> Self {
    value.resolution() as u32
  }
}

/// The device capabilities the pipeline depends on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HalaDeviceCaps {
  /// The depth buffer maps near to 1 and far to 0.
  pub uses_reversed_z_buffer: bool,
  /// The device can not index more than a few lights quickly in the shader.
  pub limited_light_indexing: bool,
}

/// The implementation of the device capabilities.
impl HalaDeviceCaps {

  /// Get the amount of lights that can be shaded per object.
  /// return: The maximum per object lights.
  pub fn max_per_object_lights(&self) -> i32 {
    if self.limited_light_indexing {
      LIMITED_PER_OBJECT_LIGHTS
    } else {
      MAX_PER_OBJECT_LIGHTS
    }
  }

}

fn default_lights_per_object_limit() -> i32 { 4 }
fn default_shadow_distance() -> f32 { 50.0 }
fn default_shadow_bias() -> f32 { 1.0 }
fn default_spot_inner_angle_ratio() -> f32 { DEFAULT_SPOT_INNER_ANGLE_RATIO }
fn default_as_true() -> bool { true }

/// The render pipeline configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HalaPipelineConfig {
  #[serde(default = "default_lights_per_object_limit")]
  pub lights_per_object_limit: i32,
  #[serde(default)]
  pub shadow_resolution: HalaShadowMapSize,
  /// Zero disables the shadow pass.
  #[serde(default = "default_shadow_distance")]
  pub shadow_distance: f32,
  #[serde(default = "default_shadow_bias")]
  pub shadow_depth_bias: f32,
  #[serde(default = "default_shadow_bias")]
  pub shadow_normal_bias: f32,
  #[serde(default)]
  pub supports_soft_shadows: bool,
  #[serde(default = "default_spot_inner_angle_ratio")]
  pub spot_inner_angle_ratio: f32,
  #[serde(default = "default_as_true")]
  pub enable_instancing: bool,
  #[serde(default = "default_as_true")]
  pub enable_dynamic_batching: bool,
  #[serde(default = "default_as_true")]
  pub use_srp_batcher: bool,
}

/// The default implementation of the render pipeline configuration.
impl Default for HalaPipelineConfig {
  fn default() -> Self {
    Self {
      lights_per_object_limit: default_lights_per_object_limit(),
      shadow_resolution: HalaShadowMapSize::default(),
      shadow_distance: default_shadow_distance(),
      shadow_depth_bias: default_shadow_bias(),
      shadow_normal_bias: default_shadow_bias(),
      supports_soft_shadows: false,
      spot_inner_angle_ratio: default_spot_inner_angle_ratio(),
      enable_instancing: true,
      enable_dynamic_batching: true,
      use_srp_batcher: true,
    }
  }
}

/// The implementation of the render pipeline configuration.
impl HalaPipelineConfig {

  /// Load the configuration from a JSON string.
  /// param json: The JSON string.
  /// return: The validated configuration.
  pub fn from_json_str(json: &str) -> Result<Self, HalaLightingError> {
    let config: Self = serde_json::from_str(json)
      .map_err(|err| HalaLightingError::new("Parse pipeline configuration failed.", Some(Box::new(err))))?;
    Ok(config.validated())
  }

  /// Load the configuration from a JSON file.
  /// param path: The path of the JSON file.
  /// return: The validated configuration.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HalaLightingError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
      .map_err(|err| HalaLightingError::new(&format!("Read pipeline configuration \"{:?}\" failed.", path), Some(Box::new(err))))?;
    let config = Self::from_json_str(&json)?;

    log::debug!("Pipeline configuration \"{:?}\" loaded.", path);
    Ok(config)
  }

  /// Save the configuration to a JSON file.
  /// param path: The path of the JSON file.
  pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), HalaLightingError> {
    let json = serde_json::to_string_pretty(self)?;
    std::fs::write(path, json)?;
    Ok(())
  }

  /// Clamp every field into its valid range.
  /// return: The validated configuration.
  pub fn validated(&self) -> Self {
    let mut config = self.clone();
    config.lights_per_object_limit = config.lights_per_object_limit.clamp(1, MAX_PER_OBJECT_LIGHTS);
    config.shadow_distance = config.shadow_distance.max(0.0);
    config.shadow_depth_bias = config.shadow_depth_bias.clamp(0.0, MAX_SHADOW_BIAS);
    config.shadow_normal_bias = config.shadow_normal_bias.clamp(0.0, MAX_SHADOW_BIAS);
    config.spot_inner_angle_ratio = config.spot_inner_angle_ratio.clamp(0.0, 1.0);
    if config != *self {
      log::warn!("Pipeline configuration contains out of range values, clamped.");
    }
    config
  }

  /// Check if the shadow pass is enabled.
  /// return: True if shadows are rendered.
  pub fn shadows_enabled(&self) -> bool {
    self.shadow_distance > 0.0
  }

  /// Get the per object light limit supported by the device.
  /// param caps: The device capabilities.
  /// param max_visible_lights: The capacity of the packed light arrays.
  /// return: The clamped limit.
  pub fn per_object_limit(&self, caps: &HalaDeviceCaps, max_visible_lights: usize) -> i32 {
    let upper = caps.max_per_object_lights().min(max_visible_lights as i32).max(1);
    self.lights_per_object_limit.clamp(1, upper)
  }

}
