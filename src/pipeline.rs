use glam::Vec4;

use crate::config::{
  HalaDeviceCaps,
  HalaPipelineConfig,
};
use crate::context::{
  HalaDrawingSettings,
  HalaRenderContext,
};
use crate::error::HalaLightingError;
use crate::forward_lights::{
  HalaForwardLights,
  HalaPerObjectData,
  MAX_VISIBLE_LIGHTS,
};
use crate::scene::culling::HalaCullingResults;
use crate::shadows::{
  HalaShadowFrame,
  HalaShadowProjector,
  HalaShadowSettings,
};

/// What the pipeline produced for one camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalaCameraFrame {
  pub per_object_data: HalaPerObjectData,
  pub shadow: Option<HalaShadowFrame>,
}

/// The forward pipeline of one camera.
pub struct HalaForwardPipeline<const N: usize = MAX_VISIBLE_LIGHTS> {
  pub name: String,
  pub background_color: Vec4,
  config: HalaPipelineConfig,
  caps: HalaDeviceCaps,
  forward_lights: HalaForwardLights<N>,
  shadows: HalaShadowProjector,

  // Statistic.
  pub total_frames: u64,
}

/// The Drop implementation of the forward pipeline.
impl<const N: usize> Drop for HalaForwardPipeline<N> {
  fn drop(&mut self) {
    log::debug!("A HalaForwardPipeline \"{}\" is dropped.", self.name);
  }
}

/// The implementation of the forward pipeline.
impl<const N: usize> HalaForwardPipeline<N> {

  /// Create a new forward pipeline.
  /// param name: The name of the pipeline.
  /// param config: The pipeline configuration.
  /// param caps: The device capabilities.
  /// return: The forward pipeline.
  pub fn new(name: &str, config: &HalaPipelineConfig, caps: HalaDeviceCaps) -> Self {
    let config = config.validated();
    log::debug!("A HalaForwardPipeline \"{}\" with {} light slots is created.", name, N);
    Self {
      name: name.to_string(),
      background_color: Vec4::new(25.0 / 255.0, 118.0 / 255.0, 210.0 / 255.0, 1.0),
      forward_lights: HalaForwardLights::new(config.spot_inner_angle_ratio),
      shadows: HalaShadowProjector::new(),
      config,
      caps,
      total_frames: 0,
    }
  }

  pub fn config(&self) -> &HalaPipelineConfig {
    &self.config
  }

  /// Replace the pipeline configuration.
  /// param config: The new configuration.
  pub fn set_config(&mut self, config: &HalaPipelineConfig) {
    self.config = config.validated();
    self.forward_lights.set_spot_inner_angle_ratio(self.config.spot_inner_angle_ratio);
  }

  /// Replace the device capabilities, e.g. after the device was restored.
  /// param caps: The new device capabilities.
  pub fn set_device_caps(&mut self, caps: HalaDeviceCaps) {
    self.caps = caps;
    self.shadows.reset_format_support();
  }

  pub fn forward_lights(&self) -> &HalaForwardLights<N> {
    &self.forward_lights
  }

  /// Render one camera.
  /// Lights are packed and pushed first, then the shadow map is rendered and
  /// the opaque renderers are drawn with the pushed constants.
  /// param context: The render context of the camera.
  /// param culling_results: The culling results of the camera.
  /// return: The camera frame.
  pub fn render_camera<X, C>(&mut self, context: &mut X, culling_results: &mut C) -> Result<HalaCameraFrame, HalaLightingError>
    where X: HalaRenderContext + ?Sized, C: HalaCullingResults + ?Sized
  {
    // Setup lighting.
    let per_object_limit = self.config.per_object_limit(&self.caps, N);
    let per_object_data = self.forward_lights.setup(context, culling_results, per_object_limit);

    // Setup shadows.
    let shadow_light = if self.config.shadows_enabled() {
      HalaShadowProjector::find_shadow_light(culling_results.visible_lights())
    } else {
      None
    };
    let settings = HalaShadowSettings::new(&self.config, &self.caps);
    let mut pass = self.shadows.render(context, &*culling_results, shadow_light, &settings)?;

    // Render opaque objects, the shadow map stays alive until the pass drops.
    pass.set_render_target(None);
    pass.clear_render_target(true, true, self.background_color);
    pass.draw_renderers(&HalaDrawingSettings {
      per_object_data,
      enable_instancing: self.config.enable_instancing,
      enable_dynamic_batching: self.config.enable_dynamic_batching,
      use_srp_batcher: self.config.use_srp_batcher,
    });
    let shadow = pass.frame().copied();
    drop(pass);

    self.total_frames += 1;
    Ok(HalaCameraFrame {
      per_object_data,
      shadow,
    })
  }

}
