use std::cell::Cell;
use std::collections::BTreeSet;

use glam::{
  Mat4,
  Vec4,
};

use crate::error::HalaLightingError;
use crate::forward_lights::HalaPerObjectData;
use crate::shader_property::HalaShaderPropertyId;

/// The opaque handle of a render texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalaTextureHandle(pub u32);

/// The render texture formats the pipeline asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HalaRenderTextureFormat {
  /// Native shadow map format with hardware depth comparison.
  Shadowmap,
  Depth,
}

/// The description of a transient render texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HalaRenderTextureDesc {
  pub width: u32,
  pub height: u32,
  pub depth_bits: u32,
  pub format: HalaRenderTextureFormat,
}

/// The settings of an opaque draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HalaDrawingSettings {
  pub per_object_data: HalaPerObjectData,
  pub enable_instancing: bool,
  pub enable_dynamic_batching: bool,
  /// Draw with the batched constant buffer path.
  pub use_srp_batcher: bool,
}

/// The sink of the named global shader constants.
pub trait HalaConstantSink {
  fn set_global_vector(&mut self, id: HalaShaderPropertyId, value: Vec4);
  fn set_global_vector_array(&mut self, id: HalaShaderPropertyId, values: &[Vec4]);
  fn set_global_matrix(&mut self, id: HalaShaderPropertyId, value: Mat4);
  fn set_global_texture(&mut self, id: HalaShaderPropertyId, texture: HalaTextureHandle);
}

/// The render context one camera records its frame into.
pub trait HalaRenderContext: HalaConstantSink {

  /// Check if the device can render into a format.
  /// param format: The render texture format.
  /// return: True if the format is supported.
  fn supports_render_texture_format(&self, format: HalaRenderTextureFormat) -> bool;

  /// Acquire a transient render texture from the pool.
  /// param desc: The description of the texture.
  /// return: The texture.
  fn get_temporary_render_texture(&mut self, desc: &HalaRenderTextureDesc) -> Result<HalaTextureHandle, HalaLightingError>;

  /// Return a transient render texture to the pool.
  /// param texture: The texture.
  fn release_temporary_render_texture(&mut self, texture: HalaTextureHandle);

  /// Set the active render target, None selects the camera target.
  fn set_render_target(&mut self, texture: Option<HalaTextureHandle>);

  fn clear_render_target(&mut self, clear_depth: bool, clear_color: bool, color: Vec4);

  /// Draw the shadow casters of a light into the active render target.
  /// param light_index: The index of the light in the visible lights.
  fn draw_shadows(&mut self, light_index: usize);

  /// Draw the opaque renderers with the given settings.
  fn draw_renderers(&mut self, settings: &HalaDrawingSettings);

}

/// A command recorded by the command recorder.
#[derive(Clone, Debug, PartialEq)]
pub enum HalaRenderCommand {
  SetGlobalVector(HalaShaderPropertyId, Vec4),
  SetGlobalVectorArray(HalaShaderPropertyId, Vec<Vec4>),
  SetGlobalMatrix(HalaShaderPropertyId, Mat4),
  SetGlobalTexture(HalaShaderPropertyId, HalaTextureHandle),
  GetTemporaryRenderTexture(HalaTextureHandle, HalaRenderTextureDesc),
  ReleaseTemporaryRenderTexture(HalaTextureHandle),
  SetRenderTarget(Option<HalaTextureHandle>),
  ClearRenderTarget { clear_depth: bool, clear_color: bool, color: Vec4 },
  DrawShadows(usize),
  DrawRenderers(HalaDrawingSettings),
}

/// A render context which records every command in order.
pub struct HalaCommandRecorder {
  pub commands: Vec<HalaRenderCommand>,
  supported_formats: BTreeSet<HalaRenderTextureFormat>,
  live_textures: BTreeSet<HalaTextureHandle>,
  next_texture: u32,
  format_queries: Cell<usize>,
}

/// The default implementation of the command recorder.
impl Default for HalaCommandRecorder {
  fn default() -> Self {
    Self::new(&[HalaRenderTextureFormat::Shadowmap, HalaRenderTextureFormat::Depth])
  }
}

/// The implementation of the command recorder.
impl HalaCommandRecorder {

  /// Create a new command recorder.
  /// param supported_formats: The render texture formats the device supports.
  /// return: The command recorder.
  pub fn new(supported_formats: &[HalaRenderTextureFormat]) -> Self {
    Self {
      commands: Vec::new(),
      supported_formats: supported_formats.iter().copied().collect(),
      live_textures: BTreeSet::new(),
      next_texture: 1,
      format_queries: Cell::new(0),
    }
  }

  /// Get the number of format support queries which reached the device.
  pub fn format_queries(&self) -> usize {
    self.format_queries.get()
  }

  /// Get the number of transient textures not yet released.
  pub fn live_temporaries(&self) -> usize {
    self.live_textures.len()
  }

  /// Check if any global constant was written.
  pub fn has_constant_writes(&self) -> bool {
    self.commands.iter().any(|command| matches!(
      command,
      HalaRenderCommand::SetGlobalVector(..)
        | HalaRenderCommand::SetGlobalVectorArray(..)
        | HalaRenderCommand::SetGlobalMatrix(..)
        | HalaRenderCommand::SetGlobalTexture(..)
    ))
  }

  /// Get the last vector written to a property.
  pub fn find_vector(&self, id: HalaShaderPropertyId) -> Option<Vec4> {
    self.commands.iter().rev().find_map(|command| match command {
      HalaRenderCommand::SetGlobalVector(property, value) if *property == id => Some(*value),
      _ => None,
    })
  }

  /// Get the last vector array written to a property.
  pub fn find_vector_array(&self, id: HalaShaderPropertyId) -> Option<&[Vec4]> {
    self.commands.iter().rev().find_map(|command| match command {
      HalaRenderCommand::SetGlobalVectorArray(property, values) if *property == id => Some(values.as_slice()),
      _ => None,
    })
  }

  /// Get the last matrix written to a property.
  pub fn find_matrix(&self, id: HalaShaderPropertyId) -> Option<Mat4> {
    self.commands.iter().rev().find_map(|command| match command {
      HalaRenderCommand::SetGlobalMatrix(property, value) if *property == id => Some(*value),
      _ => None,
    })
  }

  /// Get the last texture bound to a property.
  pub fn find_texture(&self, id: HalaShaderPropertyId) -> Option<HalaTextureHandle> {
    self.commands.iter().rev().find_map(|command| match command {
      HalaRenderCommand::SetGlobalTexture(property, texture) if *property == id => Some(*texture),
      _ => None,
    })
  }

}

impl HalaConstantSink for HalaCommandRecorder {

  fn set_global_vector(&mut self, id: HalaShaderPropertyId, value: Vec4) {
    self.commands.push(HalaRenderCommand::SetGlobalVector(id, value));
  }

  fn set_global_vector_array(&mut self, id: HalaShaderPropertyId, values: &[Vec4]) {
    self.commands.push(HalaRenderCommand::SetGlobalVectorArray(id, values.to_vec()));
  }

  fn set_global_matrix(&mut self, id: HalaShaderPropertyId, value: Mat4) {
    self.commands.push(HalaRenderCommand::SetGlobalMatrix(id, value));
  }

  fn set_global_texture(&mut self, id: HalaShaderPropertyId, texture: HalaTextureHandle) {
    self.commands.push(HalaRenderCommand::SetGlobalTexture(id, texture));
  }

}

impl HalaRenderContext for HalaCommandRecorder {

  fn supports_render_texture_format(&self, format: HalaRenderTextureFormat) -> bool {
    self.format_queries.set(self.format_queries.get() + 1);
    self.supported_formats.contains(&format)
  }

  fn get_temporary_render_texture(&mut self, desc: &HalaRenderTextureDesc) -> Result<HalaTextureHandle, HalaLightingError> {
    if !self.supported_formats.contains(&desc.format) {
      return Err(HalaLightingError::new(&format!("Render texture format {:?} is not supported.", desc.format), None));
    }
    let texture = HalaTextureHandle(self.next_texture);
    self.next_texture += 1;
    self.live_textures.insert(texture);
    self.commands.push(HalaRenderCommand::GetTemporaryRenderTexture(texture, *desc));
    Ok(texture)
  }

  fn release_temporary_render_texture(&mut self, texture: HalaTextureHandle) {
    if !self.live_textures.remove(&texture) {
      log::warn!("Release unknown temporary render texture {:?}.", texture);
    }
    self.commands.push(HalaRenderCommand::ReleaseTemporaryRenderTexture(texture));
  }

  fn set_render_target(&mut self, texture: Option<HalaTextureHandle>) {
    self.commands.push(HalaRenderCommand::SetRenderTarget(texture));
  }

  fn clear_render_target(&mut self, clear_depth: bool, clear_color: bool, color: Vec4) {
    self.commands.push(HalaRenderCommand::ClearRenderTarget { clear_depth, clear_color, color });
  }

  fn draw_shadows(&mut self, light_index: usize) {
    self.commands.push(HalaRenderCommand::DrawShadows(light_index));
  }

  fn draw_renderers(&mut self, settings: &HalaDrawingSettings) {
    self.commands.push(HalaRenderCommand::DrawRenderers(*settings));
  }

}
