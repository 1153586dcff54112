use glam::{
  Mat4,
  Vec3,
};

use super::bounds::HalaBounds;
use super::culling::{
  HalaCullingResults,
  HalaShadowMatrices,
};
use super::light::{
  HalaLightKind,
  HalaVisibleLight,
};

/// The default near plane of the shadow projections.
pub const DEFAULT_SHADOW_NEAR_PLANE: f32 = 0.1;

/// A flat list of lights which are all visible to the camera.
/// Shadow matrices are fitted to the bounds of the shadow casters.
pub struct HalaLightScene {
  pub lights: Vec<HalaVisibleLight>,
  pub caster_bounds: Option<HalaBounds>,
  pub shadow_near_plane: f32,
  light_index_map: Vec<i32>,
}

/// The Drop implementation of the light scene.
impl Drop for HalaLightScene {
  fn drop(&mut self) {
    log::debug!("A HalaLightScene dropped.");
  }
}

/// The implementation of the light scene.
impl HalaLightScene {

  /// Create a new light scene.
  /// param lights: The lights of the scene.
  /// param caster_bounds: The bounds of all shadow casters.
  /// return: The light scene.
  pub fn new(lights: Vec<HalaVisibleLight>, caster_bounds: Option<HalaBounds>) -> Self {
    let light_index_map = (0..lights.len() as i32).collect();
    log::debug!("A HalaLightScene with {} lights created.", lights.len());
    Self {
      lights,
      caster_bounds,
      shadow_near_plane: DEFAULT_SHADOW_NEAR_PLANE,
      light_index_map,
    }
  }

  /// Get the per object light index map.
  pub fn light_index_map(&self) -> &[i32] {
    &self.light_index_map
  }

  /// Check if the scene has light.
  /// return: True if the scene has light, false otherwise.
  pub fn has_light(&self) -> bool {
    !self.lights.is_empty()
  }

  /// Build the view matrix looking along the light forward axis.
  /// param light: The light.
  /// param eye: The eye position.
  /// return: The view matrix.
  fn light_view(light: &HalaVisibleLight, eye: Vec3) -> Option<Mat4> {
    let forward = light.forward().truncate().try_normalize()?;
    let mut up = light.local_to_world.y_axis.truncate();
    if up.cross(forward).length_squared() < 1e-8 {
      up = if forward.y.abs() < 0.99 { Vec3::Y } else { Vec3::Z };
    }
    Some(Mat4::look_to_rh(eye, forward, up))
  }

}

/// The culling results implementation of the light scene.
impl HalaCullingResults for HalaLightScene {

  fn visible_lights(&self) -> &[HalaVisibleLight] {
    &self.lights
  }

  fn set_light_index_map(&mut self, light_index_map: &[i32]) {
    self.light_index_map.clear();
    self.light_index_map.extend_from_slice(light_index_map);
  }

  fn shadow_caster_bounds(&self, light_index: usize) -> Option<HalaBounds> {
    let light = self.lights.get(light_index)?;
    if !light.casts_shadows {
      return None;
    }
    let bounds = self.caster_bounds?;
    match light.kind {
      HalaLightKind::Directional => Some(bounds),
      HalaLightKind::Point { range } | HalaLightKind::Spot { range, .. } => {
        let light_bounds = HalaBounds::new(light.position().truncate(), Vec3::splat(range));
        if light_bounds.intersects(&bounds) { Some(bounds) } else { None }
      },
    }
  }

  fn compute_shadow_matrices(&self, light_index: usize) -> Option<HalaShadowMatrices> {
    let light = self.lights.get(light_index)?;
    let bounds = self.shadow_caster_bounds(light_index)?;
    let near = self.shadow_near_plane;

    match light.kind {
      HalaLightKind::Directional => {
        // Wrap the orthographic frustum around the sphere of the casters.
        let radius = bounds.get_radius().max(near);
        let forward = light.forward().truncate().try_normalize()?;
        let eye = bounds.center - forward * (radius + near);
        let view = Self::light_view(light, eye)?;
        let proj = Mat4::orthographic_rh_gl(-radius, radius, -radius, radius, near, near + 2.0 * radius);
        Some(HalaShadowMatrices { view, proj })
      },
      HalaLightKind::Spot { range, outer_angle, .. } => {
        let view = Self::light_view(light, light.position().truncate())?;
        let fov = outer_angle.to_radians().clamp(1e-3, std::f32::consts::PI - 1e-3);
        let proj = Mat4::perspective_rh_gl(fov, 1.0, near, range.max(near * 2.0));
        Some(HalaShadowMatrices { view, proj })
      },
      HalaLightKind::Point { .. } => {
        log::warn!("Point light {} can not cast shadows.", light_index);
        None
      },
    }
  }

}
