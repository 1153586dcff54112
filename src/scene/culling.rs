use glam::Mat4;

use super::bounds::HalaBounds;
use super::light::HalaVisibleLight;

/// The view and projection matrices a shadow casting light renders its casters with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalaShadowMatrices {
  pub view: Mat4,
  /// The projection matrix in the standard (not reversed) depth convention.
  pub proj: Mat4,
}

/// The culling results of one camera.
/// Produced fresh every frame by the scene, read by the lighting stages.
pub trait HalaCullingResults {

  /// Get the lights visible to the camera.
  fn visible_lights(&self) -> &[HalaVisibleLight];

  /// Replace the per object light index map.
  /// The map has one entry per visible light, -1 means the light has no per object index.
  /// param light_index_map: The new light index map.
  fn set_light_index_map(&mut self, light_index_map: &[i32]);

  /// Get the bounds of the shadow casters seen by a light.
  /// param light_index: The index of the light in the visible lights.
  /// return: The bounds or None if the light has no shadow casters.
  fn shadow_caster_bounds(&self, light_index: usize) -> Option<HalaBounds>;

  /// Compute the shadow matrices of a light.
  /// param light_index: The index of the light in the visible lights.
  /// return: The matrices or None if they can not be computed.
  fn compute_shadow_matrices(&self, light_index: usize) -> Option<HalaShadowMatrices>;

}
