use glam::{
  Mat4,
  Vec2,
  Vec3,
  Vec4,
};

use crate::config::{
  HalaDeviceCaps,
  HalaPipelineConfig,
};
use crate::context::{
  HalaConstantSink,
  HalaRenderContext,
  HalaRenderTextureDesc,
  HalaRenderTextureFormat,
  HalaTextureHandle,
};
use crate::error::HalaLightingError;
use crate::format_support::HalaFormatSupportCache;
use crate::scene::bounds::HalaBounds;
use crate::scene::culling::{
  HalaCullingResults,
  HalaShadowMatrices,
};
use crate::scene::light::{
  HalaLightKind,
  HalaVisibleLight,
};
use crate::shader_property::HalaLightingPropertyIds;

/// Soft shadows sample a 5x5 PCF kernel, the bias has to cover its radius.
pub const SOFT_SHADOW_KERNEL_RADIUS: f32 = 2.5;

/// The depth buffer bits of the shadow map.
pub const SHADOW_MAP_DEPTH_BITS: u32 = 16;

/// The shadow map formats in order of preference.
const SHADOW_MAP_FORMATS: [HalaRenderTextureFormat; 2] = [
  HalaRenderTextureFormat::Shadowmap,
  HalaRenderTextureFormat::Depth,
];

/// The settings of the shadow pass for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalaShadowSettings {
  pub resolution: i32,
  /// Depth bias in shadow map texels.
  pub depth_bias: f32,
  /// Normal bias in shadow map texels.
  pub normal_bias: f32,
  pub soft_shadows: bool,
  pub uses_reversed_z_buffer: bool,
}

/// The implementation of the shadow settings.
impl HalaShadowSettings {

  /// Create the shadow settings from the pipeline configuration.
  /// param config: The pipeline configuration.
  /// param caps: The device capabilities.
  /// return: The shadow settings.
  pub fn new(config: &HalaPipelineConfig, caps: &HalaDeviceCaps) -> Self {
    Self {
      resolution: config.shadow_resolution.resolution(),
      depth_bias: config.shadow_depth_bias,
      normal_bias: config.shadow_normal_bias,
      soft_shadows: config.supports_soft_shadows,
      uses_reversed_z_buffer: caps.uses_reversed_z_buffer,
    }
  }

}

/// The shadow data of one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalaShadowFrame {
  pub light_index: usize,
  pub view_matrix: Mat4,
  pub proj_matrix: Mat4,
  /// World space to shadow map texture space, depth convention of the device applied.
  pub world_to_shadow_matrix: Mat4,
  /// (depth bias, normal bias) in world units.
  pub bias: Vec2,
  /// The direction toward the light.
  pub light_direction: Vec3,
  pub shadow_map_resolution: i32,
}

/// Compute the world space size of the shadow frustum cross section.
/// param light: The shadow casting light.
/// param proj: The projection matrix of the light.
/// return: The frustum size, zero for point lights.
pub fn get_shadow_frustum_size(light: &HalaVisibleLight, proj: &Mat4) -> f32 {
  match light.kind {
    // The orthographic frustum is wrapped around a sphere, so it is a cube.
    HalaLightKind::Directional => 2.0 / proj.x_axis.x,
    // Texel size varies with depth in a perspective projection. The size at
    // the mid point is a constant approximation good enough for caster side bias.
    HalaLightKind::Spot { range, outer_angle, .. } => (outer_angle * 0.5).to_radians().tan() * range,
    HalaLightKind::Point { .. } => 0.0,
  }
}

/// Compute the shadow bias in world units.
/// param light: The shadow casting light.
/// param proj: The projection matrix of the light.
/// param resolution: The shadow map resolution.
/// param normal_bias: The normal bias in texels.
/// param depth_bias: The depth bias in texels.
/// param soft_shadows: Whether the shadows are PCF filtered.
/// return: (depth bias, normal bias, 0, 0).
pub fn get_shadow_bias(
  light: &HalaVisibleLight,
  proj: &Mat4,
  resolution: i32,
  normal_bias: f32,
  depth_bias: f32,
  soft_shadows: bool,
) -> Vec4 {
  let frustum_size = get_shadow_frustum_size(light, proj);
  if !frustum_size.is_finite() || frustum_size == 0.0 {
    if !light.is_directional() {
      log::warn!("Shadow frustum size of {:?} light is degenerate, shadow bias disabled.", light.kind);
    }
    return Vec4::ZERO;
  }

  // Depth and normal bias scale is the shadow map texel size in world space.
  let texel_size = frustum_size / resolution.max(1) as f32;
  let mut depth_bias = -depth_bias * texel_size;
  let mut normal_bias = -normal_bias * texel_size;

  if soft_shadows {
    depth_bias *= SOFT_SHADOW_KERNEL_RADIUS;
    normal_bias *= SOFT_SHADOW_KERNEL_RADIUS;
  }

  Vec4::new(depth_bias, normal_bias, 0.0, 0.0)
}

/// Compute the world to shadow map texture transform.
/// param proj: The projection matrix of the light in standard depth convention.
/// param view: The view matrix of the light.
/// param uses_reversed_z_buffer: Whether the device depth buffer is reversed.
/// return: The transform from world space to [0, 1] texture space.
pub fn get_shadow_transform(proj: &Mat4, view: &Mat4, uses_reversed_z_buffer: bool) -> Mat4 {
  let mut proj = *proj;
  if uses_reversed_z_buffer {
    proj.x_axis.z = -proj.x_axis.z;
    proj.y_axis.z = -proj.y_axis.z;
    proj.z_axis.z = -proj.z_axis.z;
    proj.w_axis.z = -proj.w_axis.z;
  }

  let world_to_shadow = proj * *view;

  // Apply texture scale and offset to save a MAD in shader.
  let texture_scale_and_bias = Mat4::from_cols(
    Vec4::new(0.5, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.5, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 0.0),
    Vec4::new(0.5, 0.5, 0.5, 1.0),
  );
  texture_scale_and_bias * world_to_shadow
}

/// Push the constants the shadow caster pass reads.
/// param sink: The constant sink.
/// param light: The shadow casting light.
/// param shadow_bias: The shadow bias in world units.
pub fn setup_shadow_caster_constants<S: HalaConstantSink + ?Sized>(sink: &mut S, light: &HalaVisibleLight, shadow_bias: Vec4) {
  let ids = HalaLightingPropertyIds::get();
  let light_direction = -light.forward().truncate();
  sink.set_global_vector(ids.shadow_bias, shadow_bias);
  sink.set_global_vector(ids.light_direction, light_direction.extend(0.0));
}

/// The shadow pass of one camera.
/// Derefs to the render context, the shadow map is released when it drops.
pub struct HalaShadowPass<'a, X: HalaRenderContext + ?Sized> {
  context: &'a mut X,
  shadow_map: Option<HalaTextureHandle>,
  frame: Option<HalaShadowFrame>,
}

/// The Drop implementation of the shadow pass.
impl<X: HalaRenderContext + ?Sized> Drop for HalaShadowPass<'_, X> {
  fn drop(&mut self) {
    if let Some(shadow_map) = self.shadow_map.take() {
      self.context.release_temporary_render_texture(shadow_map);
      log::trace!("Shadow map {:?} released.", shadow_map);
    }
  }
}

impl<X: HalaRenderContext + ?Sized> std::ops::Deref for HalaShadowPass<'_, X> {
  type Target = X;

  fn deref(&self) -> &Self::Target {
    &*self.context
  }
}

impl<X: HalaRenderContext + ?Sized> std::ops::DerefMut for HalaShadowPass<'_, X> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut *self.context
  }
}

/// The implementation of the shadow pass.
impl<'a, X: HalaRenderContext + ?Sized> HalaShadowPass<'a, X> {

  /// Get the shadow frame, None if no shadows were rendered.
  pub fn frame(&self) -> Option<&HalaShadowFrame> {
    self.frame.as_ref()
  }

  /// Get the shadow map bound as the global shadow texture.
  /// return: The shadow map or None if no shadows were rendered.
  pub fn shadow_map(&self) -> Option<HalaTextureHandle> {
    self.shadow_map
  }

}

/// Projects the shadows of the shadow casting light.
/// One instance per camera.
#[derive(Default)]
pub struct HalaShadowProjector {
  format_support: HalaFormatSupportCache,
}

/// The implementation of the shadow projector.
impl HalaShadowProjector {

  pub fn new() -> Self {
    Self::default()
  }

  /// Find the shadow casting light.
  /// param visible_lights: The visible lights.
  /// return: The index of the first directional or spot light casting shadows.
  pub fn find_shadow_light(visible_lights: &[HalaVisibleLight]) -> Option<usize> {
    for (index, light) in visible_lights.iter().enumerate() {
      if !light.casts_shadows {
        continue;
      }
      match light.kind {
        HalaLightKind::Directional | HalaLightKind::Spot { .. } => return Some(index),
        HalaLightKind::Point { .. } => log::warn!("Point light {} can not cast shadows, skipped.", index),
      }
    }
    None
  }

  /// Compute the shadow frame of a light.
  /// param light: The shadow casting light.
  /// param light_index: The index of the light in the visible lights.
  /// param caster_bounds: The bounds of the shadow casters.
  /// param matrices: The view and projection matrices of the light.
  /// param settings: The shadow settings.
  /// return: The shadow frame or None if the light has no shadow casters.
  pub fn compute(
    light: &HalaVisibleLight,
    light_index: usize,
    caster_bounds: Option<&HalaBounds>,
    matrices: Option<HalaShadowMatrices>,
    settings: &HalaShadowSettings,
  ) -> Option<HalaShadowFrame> {
    caster_bounds?;
    let HalaShadowMatrices { view, proj } = matrices?;

    let bias = get_shadow_bias(
      light,
      &proj,
      settings.resolution,
      settings.normal_bias,
      settings.depth_bias,
      settings.soft_shadows,
    );

    Some(HalaShadowFrame {
      light_index,
      view_matrix: view,
      proj_matrix: proj,
      world_to_shadow_matrix: get_shadow_transform(&proj, &view, settings.uses_reversed_z_buffer),
      bias: bias.truncate().truncate(),
      light_direction: -light.forward().truncate(),
      shadow_map_resolution: settings.resolution,
    })
  }

  /// Compute the shadow frame of a visible light from the culling results.
  /// param culling_results: The culling results of the camera.
  /// param light_index: The index of the light in the visible lights.
  /// param settings: The shadow settings.
  /// return: The shadow frame or None if the light has no shadow casters.
  pub fn compute_for<C: HalaCullingResults + ?Sized>(
    culling_results: &C,
    light_index: usize,
    settings: &HalaShadowSettings,
  ) -> Option<HalaShadowFrame> {
    let light = culling_results.visible_lights().get(light_index)?;
    let caster_bounds = culling_results.shadow_caster_bounds(light_index)?;
    let matrices = culling_results.compute_shadow_matrices(light_index);
    Self::compute(light, light_index, Some(&caster_bounds), matrices, settings)
  }

  /// Render the shadow map of a light.
  /// Without a light or shadow casters nothing is recorded and the returned pass is empty.
  /// param context: The render context.
  /// param culling_results: The culling results of the camera.
  /// param light_index: The index of the shadow casting light.
  /// param settings: The shadow settings.
  /// return: The shadow pass holding the shadow map until it drops.
  pub fn render<'a, X, C>(
    &mut self,
    context: &'a mut X,
    culling_results: &C,
    light_index: Option<usize>,
    settings: &HalaShadowSettings,
  ) -> Result<HalaShadowPass<'a, X>, HalaLightingError>
    where X: HalaRenderContext + ?Sized, C: HalaCullingResults + ?Sized
  {
    let mut pass = HalaShadowPass {
      context,
      shadow_map: None,
      frame: None,
    };

    let frame = match light_index.and_then(|index| Self::compute_for(culling_results, index, settings)) {
      Some(frame) => frame,
      None => {
        log::trace!("No shadow casters, shadow pass skipped.");
        return Ok(pass);
      },
    };
    let light = &culling_results.visible_lights()[frame.light_index];

    let format = self.format_support.pick(&*pass.context, &SHADOW_MAP_FORMATS)
      .ok_or(HalaLightingError::new("No supported shadow map format.", None))?;
    let resolution = settings.resolution.max(1) as u32;
    let shadow_map = pass.context.get_temporary_render_texture(&HalaRenderTextureDesc {
      width: resolution,
      height: resolution,
      depth_bits: SHADOW_MAP_DEPTH_BITS,
      format,
    })?;
    pass.shadow_map = Some(shadow_map);

    pass.context.set_render_target(Some(shadow_map));
    pass.context.clear_render_target(true, false, Vec4::ZERO);
    setup_shadow_caster_constants(&mut *pass.context, light, frame.bias.extend(0.0).extend(0.0));
    pass.context.draw_shadows(frame.light_index);
    pass.context.set_render_target(None);

    let ids = HalaLightingPropertyIds::get();
    pass.context.set_global_matrix(ids.world_to_shadow, frame.world_to_shadow_matrix);
    pass.context.set_global_texture(ids.shadow_map, shadow_map);

    log::trace!("Shadow map {:?} rendered for light {}.", shadow_map, frame.light_index);
    pass.frame = Some(frame);
    Ok(pass)
  }

  /// Forget the cached format support, e.g. after the device changed.
  pub fn reset_format_support(&mut self) {
    self.format_support.clear();
  }

}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::{
    HalaCommandRecorder,
    HalaRenderCommand,
  };
  use crate::scene::light_scene::HalaLightScene;

  fn settings(resolution: i32, soft_shadows: bool, uses_reversed_z_buffer: bool) -> HalaShadowSettings {
    HalaShadowSettings {
      resolution,
      depth_bias: 1.0,
      normal_bias: 1.0,
      soft_shadows,
      uses_reversed_z_buffer,
    }
  }

  fn sun() -> HalaVisibleLight {
    HalaVisibleLight::directional(Vec4::ONE, Mat4::from_rotation_x(1.1)).with_shadows()
  }

  #[test]
  fn test_directional_bias_is_one_texel() {
    let width = 20.0;
    let proj = Mat4::orthographic_rh_gl(-width * 0.5, width * 0.5, -width * 0.5, width * 0.5, 0.1, 50.0);
    let texel_size = width / 1024.0;
    assert!((get_shadow_frustum_size(&sun(), &proj) - width).abs() < 1e-4);

    let bias = get_shadow_bias(&sun(), &proj, 1024, 1.0, 1.0, false);
    assert!(bias.abs_diff_eq(Vec4::new(-texel_size, -texel_size, 0.0, 0.0), 1e-6));

    let soft = get_shadow_bias(&sun(), &proj, 1024, 1.0, 1.0, true);
    assert!(soft.abs_diff_eq(bias * SOFT_SHADOW_KERNEL_RADIUS, 1e-6));

    let scaled = get_shadow_bias(&sun(), &proj, 1024, 3.0, 2.0, false);
    assert!((scaled.x - -2.0 * texel_size).abs() < 1e-6);
    assert!((scaled.y - -3.0 * texel_size).abs() < 1e-6);
  }

  #[test]
  fn test_spot_frustum_size() {
    let spot = HalaVisibleLight::spot(Vec4::ONE, Mat4::IDENTITY, 10.0, 90.0, None);
    let proj = Mat4::perspective_rh_gl(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 10.0);
    assert!((get_shadow_frustum_size(&spot, &proj) - 10.0).abs() < 1e-4);
    let bias = get_shadow_bias(&spot, &proj, 512, 1.0, 2.0, false);
    assert!((bias.x - -2.0 * 10.0 / 512.0).abs() < 1e-5);
  }

  #[test]
  fn test_point_light_bias_is_zero() {
    let point = HalaVisibleLight::point(Vec4::ONE, Mat4::IDENTITY, 10.0);
    let bias = get_shadow_bias(&point, &Mat4::IDENTITY, 1024, 1.0, 1.0, true);
    assert_eq!(bias, Vec4::ZERO);
  }

  #[test]
  fn test_near_plane_center_maps_into_texture_space() {
    let bounds = HalaBounds::new(Vec3::new(2.0, 0.0, -1.0), Vec3::splat(3.0));
    let spot_transform = Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0)) * Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2);
    let lights = vec![
      sun(),
      HalaVisibleLight::spot(Vec4::ONE, spot_transform, 15.0, 70.0, Some(50.0)).with_shadows(),
    ];
    let scene = HalaLightScene::new(lights, Some(bounds));

    for light_index in 0..2 {
      let matrices = scene.compute_shadow_matrices(light_index).unwrap();
      let near_center = (matrices.proj * matrices.view).inverse() * Vec4::new(0.0, 0.0, -1.0, 1.0);
      let near_center = near_center / near_center.w;

      for uses_reversed_z_buffer in [false, true] {
        let frame = HalaShadowProjector::compute_for(&scene, light_index, &settings(1024, false, uses_reversed_z_buffer)).unwrap();
        let texture = frame.world_to_shadow_matrix * near_center;
        let texture = texture.truncate() / texture.w;
        assert!(texture.cmpge(Vec3::splat(-1e-4)).all() && texture.cmple(Vec3::splat(1.0 + 1e-4)).all(), "{:?}", texture);
        assert!((texture.x - 0.5).abs() < 1e-4 && (texture.y - 0.5).abs() < 1e-4);
        let expected_depth = if uses_reversed_z_buffer { 1.0 } else { 0.0 };
        assert!((texture.z - expected_depth).abs() < 1e-3, "{:?}", texture);
      }
    }
  }

  #[test]
  fn test_reversed_z_negates_depth_row() {
    let proj = Mat4::perspective_rh_gl(1.0, 1.0, 0.5, 20.0);
    let standard = get_shadow_transform(&proj, &Mat4::IDENTITY, false);
    let reversed = get_shadow_transform(&proj, &Mat4::IDENTITY, true);
    assert_eq!(standard.row(0), reversed.row(0));
    assert_eq!(standard.row(1), reversed.row(1));
    assert_eq!(standard.row(3), reversed.row(3));
    assert_ne!(standard.row(2), reversed.row(2));
  }

  #[test]
  fn test_compute_without_casters() {
    let scene = HalaLightScene::new(vec![sun()], None);
    assert!(HalaShadowProjector::compute_for(&scene, 0, &settings(1024, false, false)).is_none());
    let matrices = HalaShadowMatrices { view: Mat4::IDENTITY, proj: Mat4::IDENTITY };
    assert!(HalaShadowProjector::compute(&sun(), 0, None, Some(matrices), &settings(1024, false, false)).is_none());
  }

  #[test]
  fn test_no_caster_writes_nothing() {
    let scene = HalaLightScene::new(vec![sun()], None);
    let mut recorder = HalaCommandRecorder::default();
    let mut projector = HalaShadowProjector::new();
    {
      let pass = projector.render(&mut recorder, &scene, Some(0), &settings(1024, false, false)).unwrap();
      assert!(pass.frame().is_none());
      assert!(pass.shadow_map().is_none());
    }
    assert!(recorder.commands.is_empty());
  }

  #[test]
  fn test_render_releases_shadow_map() {
    let bounds = HalaBounds::new(Vec3::ZERO, Vec3::splat(4.0));
    let scene = HalaLightScene::new(vec![sun()], Some(bounds));
    let mut recorder = HalaCommandRecorder::new(&[HalaRenderTextureFormat::Depth]);
    let mut projector = HalaShadowProjector::new();

    let ids = HalaLightingPropertyIds::get();
    let frame = {
      let pass = projector.render(&mut recorder, &scene, Some(0), &settings(2048, true, false)).unwrap();
      assert_eq!(pass.live_temporaries(), 1);
      assert!(pass.shadow_map().is_some());
      assert_eq!(pass.find_texture(ids.shadow_map), pass.shadow_map());
      *pass.frame().unwrap()
    };
    assert_eq!(recorder.live_temporaries(), 0);
    assert_eq!(frame.shadow_map_resolution, 2048);

    assert_eq!(recorder.find_matrix(ids.world_to_shadow), Some(frame.world_to_shadow_matrix));
    assert_eq!(recorder.find_vector(ids.shadow_bias), Some(frame.bias.extend(0.0).extend(0.0)));
    assert_eq!(recorder.find_vector(ids.light_direction), Some(frame.light_direction.extend(0.0)));
    assert!(recorder.commands.contains(&HalaRenderCommand::DrawShadows(0)));
    match &recorder.commands[0] {
      HalaRenderCommand::GetTemporaryRenderTexture(_, desc) => {
        assert_eq!(desc.format, HalaRenderTextureFormat::Depth);
        assert_eq!((desc.width, desc.height), (2048, 2048));
      },
      command => panic!("Unexpected first command {:?}.", command),
    }
    assert!(matches!(recorder.commands.last(), Some(HalaRenderCommand::ReleaseTemporaryRenderTexture(_))));
  }

  #[test]
  fn test_unsupported_formats_fail_without_leaks() {
    let bounds = HalaBounds::new(Vec3::ZERO, Vec3::splat(4.0));
    let scene = HalaLightScene::new(vec![sun()], Some(bounds));
    let mut recorder = HalaCommandRecorder::new(&[]);
    let mut projector = HalaShadowProjector::new();
    assert!(projector.render(&mut recorder, &scene, Some(0), &settings(1024, false, false)).is_err());
    assert_eq!(recorder.live_temporaries(), 0);
    assert!(!recorder.has_constant_writes());
  }

  #[test]
  fn test_find_shadow_light_skips_points() {
    let lights = vec![
      HalaVisibleLight::point(Vec4::ONE, Mat4::IDENTITY, 5.0).with_shadows(),
      HalaVisibleLight::directional(Vec4::ONE, Mat4::IDENTITY),
      HalaVisibleLight::spot(Vec4::ONE, Mat4::IDENTITY, 5.0, 30.0, None).with_shadows(),
    ];
    assert_eq!(HalaShadowProjector::find_shadow_light(&lights), Some(2));
    assert_eq!(HalaShadowProjector::find_shadow_light(&lights[..2]), None);
  }
}
