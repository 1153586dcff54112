use glam::{
  Mat4,
  Vec4,
};

/// The kind of a visible light with the attributes each kind uses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HalaLightKind {
  Directional,
  Point {
    range: f32,
  },
  Spot {
    range: f32,
    /// The full outer cone angle in degrees.
    outer_angle: f32,
    /// The full inner cone angle in degrees.
    /// Lights without one (e.g. particle lights) get a derived default cone.
    inner_angle: Option<f32>,
  },
}

/// A light source which survived the culling of the current camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalaVisibleLight {
  pub kind: HalaLightKind,
  /// The final linear color (color * intensity).
  pub color: Vec4,
  /// The local to world transform. +Z is the light forward axis.
  pub local_to_world: Mat4,
  pub casts_shadows: bool,
}

/// The implementation of the visible light.
impl HalaVisibleLight {

  /// Create a directional light.
  /// param color: The final linear color.
  /// param local_to_world: The local to world transform.
  /// return: The light.
  pub fn directional(color: Vec4, local_to_world: Mat4) -> Self {
    Self {
      kind: HalaLightKind::Directional,
      color,
      local_to_world,
      casts_shadows: false,
    }
  }

  /// Create a point light.
  /// param color: The final linear color.
  /// param local_to_world: The local to world transform.
  /// param range: The range of the light.
  /// return: The light.
  pub fn point(color: Vec4, local_to_world: Mat4, range: f32) -> Self {
    Self {
      kind: HalaLightKind::Point { range },
      color,
      local_to_world,
      casts_shadows: false,
    }
  }

  /// Create a spot light.
  /// param color: The final linear color.
  /// param local_to_world: The local to world transform.
  /// param range: The range of the light.
  /// param outer_angle: The full outer cone angle in degrees.
  /// param inner_angle: The full inner cone angle in degrees.
  /// return: The light.
  pub fn spot(color: Vec4, local_to_world: Mat4, range: f32, outer_angle: f32, inner_angle: Option<f32>) -> Self {
    Self {
      kind: HalaLightKind::Spot { range, outer_angle, inner_angle },
      color,
      local_to_world,
      casts_shadows: false,
    }
  }

  /// Mark the light as a shadow caster.
  pub fn with_shadows(mut self) -> Self {
    self.casts_shadows = true;
    self
  }

  pub fn is_directional(&self) -> bool {
    matches!(self.kind, HalaLightKind::Directional)
  }

  /// Get the range of the light, zero for directional lights.
  pub fn range(&self) -> f32 {
    match self.kind {
      HalaLightKind::Directional => 0.0,
      HalaLightKind::Point { range } | HalaLightKind::Spot { range, .. } => range,
    }
  }

  /// Get the forward axis (column 2) of the light transform.
  pub fn forward(&self) -> Vec4 {
    self.local_to_world.z_axis
  }

  /// Get the world position (column 3) of the light transform.
  pub fn position(&self) -> Vec4 {
    self.local_to_world.w_axis
  }

}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::Vec3;

  #[test]
  fn test_axes_and_range() {
    let transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    let light = HalaVisibleLight::spot(Vec4::ONE, transform, 7.0, 60.0, None).with_shadows();
    assert!(light.casts_shadows);
    assert!(!light.is_directional());
    assert_eq!(light.range(), 7.0);
    assert_eq!(light.forward(), Vec4::Z);
    assert_eq!(light.position(), Vec4::new(1.0, 2.0, 3.0, 1.0));
    assert_eq!(HalaVisibleLight::directional(Vec4::ONE, transform).range(), 0.0);
  }
}
