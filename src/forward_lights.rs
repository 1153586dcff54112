use bitflags::bitflags;
use glam::Vec4;

use crate::config::{
  DEFAULT_SPOT_INNER_ANGLE_RATIO,
  MAX_PER_OBJECT_LIGHTS,
};
use crate::context::HalaConstantSink;
use crate::scene::culling::HalaCullingResults;
use crate::scene::light::{
  HalaLightKind,
  HalaVisibleLight,
};
use crate::shader_property::HalaLightingPropertyIds;

/// The capacity of the packed light arrays.
pub const MAX_VISIBLE_LIGHTS: usize = 16;

/// The fade of point and spot lights starts at 80% of the range.
const FADE_START_RATIO_SQR: f32 = 0.8 * 0.8;

/// The smallest cosine range between the inner and outer spot cones.
const MIN_SPOT_ANGLE_RANGE: f32 = 0.001;

/// Stands in for non-positive or non-finite ranges, its square stays a normal float.
fn min_light_range() -> f32 {
  f32::MIN_POSITIVE.sqrt()
}

bitflags! {
  /// The per object data the opaque draw has to provide.
  #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
  pub struct HalaPerObjectData: u32 {
    const LIGHT_DATA = 1 << 0;
    const LIGHT_INDICES = 1 << 1;
  }
}

/// The per light vectors as the shader reads them.
/// Index i of every array is the same light.
#[derive(Clone, Debug, PartialEq)]
pub struct HalaPackedLightSet<const N: usize = MAX_VISIBLE_LIGHTS> {
  /// Directional lights store the direction toward the light (w = 0),
  /// others their world position (w = 1).
  pub directions: [Vec4; N],
  pub colors: [Vec4; N],
  /// x, y: distance fade. z, w: spot cone fade.
  pub attenuations: [Vec4; N],
  pub spot_directions: [Vec4; N],
  /// The number of packed lights.
  pub count: usize,
  /// The number of lights each object loops over.
  pub lights_per_object: i32,
}

/// The default implementation of the packed light set.
impl<const N: usize> Default for HalaPackedLightSet<N> {
  fn default() -> Self {
    Self {
      directions: [Vec4::ZERO; N],
      colors: [Vec4::ZERO; N],
      attenuations: [Vec4::ZERO; N],
      spot_directions: [Vec4::ZERO; N],
      count: 0,
      lights_per_object: 0,
    }
  }
}

/// The implementation of the packed light set.
impl<const N: usize> HalaPackedLightSet<N> {

  /// Clear the slots from index on, an all zero color marks an inert light.
  fn clear_from(&mut self, index: usize) {
    for i in index..N {
      self.directions[i] = Vec4::ZERO;
      self.colors[i] = Vec4::ZERO;
      self.attenuations[i] = Vec4::ZERO;
      self.spot_directions[i] = Vec4::ZERO;
    }
  }

}

/// Compute the distance attenuation of a point or spot light.
///
/// The shader evaluates `1 / distanceSqr * saturate(distanceSqr * x + y)`.
/// The smooth factor fades linearly from 1 at 80% of the range to 0 at the range:
/// `(rangeSqr - distanceSqr) / (rangeSqr - fadeStartSqr)`, rewritten into one MAD.
/// param range: The range of the light.
/// return: The attenuation with z = 0 and w = 1.
pub fn distance_attenuation(range: f32) -> Vec4 {
  let range = if range.is_finite() && range > 0.0 { range } else { min_light_range() };
  let light_range_sqr = range * range;
  let fade_start_distance_sqr = FADE_START_RATIO_SQR * light_range_sqr;
  let fade_range_sqr = fade_start_distance_sqr - light_range_sqr;
  let one_over_fade_range_sqr = 1.0 / fade_range_sqr;
  let light_range_sqr_over_fade_range_sqr = -light_range_sqr / fade_range_sqr;

  Vec4::new(one_over_fade_range_sqr, light_range_sqr_over_fade_range_sqr, 0.0, 1.0)
}

/// Compute the cosine of the inner cone of a spot light without an inner angle.
/// param outer_angle: The full outer cone angle in degrees.
/// param inner_angle_ratio: The ratio between the inner and outer cone tangents.
/// return: The cosine of the inner half angle.
pub fn default_cos_inner_angle(outer_angle: f32, inner_angle_ratio: f32) -> f32 {
  let tan_outer_angle = (outer_angle.to_radians() * 0.5).tan();
  (tan_outer_angle * inner_angle_ratio).atan().cos()
}

/// Compute the cone attenuation of a spot light.
///
/// The shader evaluates `saturate(dot(spotDir, L) * z + w)`, the linear fade
/// `(SdotL - cosOuter) / (cosInner - cosOuter)` rewritten into one MAD.
/// param outer_angle: The full outer cone angle in degrees.
/// param inner_angle: The full inner cone angle in degrees.
/// param inner_angle_ratio: The ratio used when there is no inner angle.
/// return: (z, w) of the attenuation.
pub fn spot_attenuation(outer_angle: f32, inner_angle: Option<f32>, inner_angle_ratio: f32) -> (f32, f32) {
  let cos_outer_angle = (outer_angle.to_radians() * 0.5).cos();
  let cos_inner_angle = match inner_angle {
    Some(inner_angle) => (inner_angle.to_radians() * 0.5).cos(),
    None => default_cos_inner_angle(outer_angle, inner_angle_ratio),
  };

  let smooth_angle_range = (cos_inner_angle - cos_outer_angle).max(MIN_SPOT_ANGLE_RANGE);
  let inv_angle_range = 1.0 / smooth_angle_range;

  (inv_angle_range, -cos_outer_angle * inv_angle_range)
}

/// Packs the visible lights of a camera into fixed size arrays.
/// One instance per camera, the arrays are overwritten every frame.
pub struct HalaForwardLights<const N: usize = MAX_VISIBLE_LIGHTS> {
  packed: HalaPackedLightSet<N>,
  light_index_map: Vec<i32>,
  spot_inner_angle_ratio: f32,
}

/// The default implementation of the forward lights.
impl<const N: usize> Default for HalaForwardLights<N> {
  fn default() -> Self {
    Self::new(DEFAULT_SPOT_INNER_ANGLE_RATIO)
  }
}

/// The implementation of the forward lights.
impl<const N: usize> HalaForwardLights<N> {

  /// Create new forward lights.
  /// param spot_inner_angle_ratio: The ratio deriving the inner cone of spot lights without one.
  /// return: The forward lights.
  pub fn new(spot_inner_angle_ratio: f32) -> Self {
    log::debug!("A HalaForwardLights with {} light slots created.", N);
    Self {
      packed: HalaPackedLightSet::default(),
      light_index_map: Vec::new(),
      spot_inner_angle_ratio: spot_inner_angle_ratio.clamp(0.0, 1.0),
    }
  }

  /// Set the ratio deriving the inner cone of spot lights without one.
  /// param ratio: The ratio between the inner and outer cone tangents, clamped to [0, 1].
  pub fn set_spot_inner_angle_ratio(&mut self, ratio: f32) {
    self.spot_inner_angle_ratio = ratio.clamp(0.0, 1.0);
  }

  /// Get the lights packed by the last call to pack.
  pub fn packed(&self) -> &HalaPackedLightSet<N> {
    &self.packed
  }

  /// Get the light index map of the last call to pack.
  /// return: The map or None if all visible lights fit into the arrays.
  pub fn light_index_map(&self) -> Option<&[i32]> {
    if self.light_index_map.is_empty() {
      None
    } else {
      Some(&self.light_index_map)
    }
  }

  /// Pack the visible lights.
  /// param visible_lights: The visible lights of the camera.
  /// param per_object_limit: The number of lights each object loops over.
  /// return: The per object data the opaque draw needs.
  pub fn pack(&mut self, visible_lights: &[HalaVisibleLight], per_object_limit: i32) -> HalaPerObjectData {
    let count = visible_lights.len().min(N);
    self.light_index_map.clear();
    self.packed.count = count;

    // No visible lights in scene.
    if count == 0 {
      self.packed.lights_per_object = 0;
      self.packed.clear_from(0);
      return HalaPerObjectData::empty();
    }

    // Lights past the capacity must not be indexed per object.
    if visible_lights.len() > N {
      log::debug!("{} visible lights exceed the {} light slots, the rest is not indexed.", visible_lights.len(), N);
      self.light_index_map.extend((0..visible_lights.len()).map(|i| if i < N { i as i32 } else { -1 }));
    }

    for (i, light) in visible_lights.iter().take(count).enumerate() {
      self.packed.directions[i] = match light.kind {
        HalaLightKind::Directional => {
          let dir = light.forward();
          Vec4::new(-dir.x, -dir.y, -dir.z, dir.w)
        },
        _ => light.position(),
      };

      self.packed.colors[i] = light.color;

      self.packed.attenuations[i] = match light.kind {
        HalaLightKind::Directional => Vec4::new(0.0, 1.0, 0.0, 1.0),
        HalaLightKind::Point { range } | HalaLightKind::Spot { range, .. } => distance_attenuation(range),
      };

      if let HalaLightKind::Spot { outer_angle, inner_angle, .. } = light.kind {
        let dir = light.forward();
        self.packed.spot_directions[i] = Vec4::new(-dir.x, -dir.y, -dir.z, 0.0);

        let (inv_angle_range, offset) = spot_attenuation(outer_angle, inner_angle, self.spot_inner_angle_ratio);
        self.packed.attenuations[i].z = inv_angle_range;
        self.packed.attenuations[i].w = offset;
      } else {
        self.packed.spot_directions[i] = Vec4::new(0.0, 0.0, 1.0, 0.0);
      }
    }

    self.packed.clear_from(count);

    let limit = per_object_limit.clamp(1, MAX_PER_OBJECT_LIGHTS.min(N as i32).max(1));
    self.packed.lights_per_object = limit;
    log::trace!("Packed {} lights, {} per object.", count, limit);

    HalaPerObjectData::LIGHT_DATA | HalaPerObjectData::LIGHT_INDICES
  }

  /// Pack the visible lights of the culling results and push the light constants.
  /// param sink: The constant sink.
  /// param culling_results: The culling results of the camera.
  /// param per_object_limit: The number of lights each object loops over.
  /// return: The per object data the opaque draw needs.
  pub fn setup<C, S>(&mut self, sink: &mut S, culling_results: &mut C, per_object_limit: i32) -> HalaPerObjectData
    where C: HalaCullingResults + ?Sized, S: HalaConstantSink + ?Sized
  {
    let per_object_data = self.pack(culling_results.visible_lights(), per_object_limit);

    if let Some(light_index_map) = self.light_index_map() {
      culling_results.set_light_index_map(light_index_map);
    }

    self.setup_light_constants(sink);
    per_object_data
  }

  /// Push the packed lights to the global shader constants.
  /// param sink: The constant sink.
  pub fn setup_light_constants<S: HalaConstantSink + ?Sized>(&self, sink: &mut S) {
    let ids = HalaLightingPropertyIds::get();
    let lights_count = (self.packed.lights_per_object as usize).min(N) as f32;

    sink.set_global_vector(ids.visible_lights_count, Vec4::new(lights_count, 0.0, 0.0, 0.0));
    sink.set_global_vector_array(ids.visible_light_directions, &self.packed.directions);
    sink.set_global_vector_array(ids.visible_light_colors, &self.packed.colors);
    sink.set_global_vector_array(ids.visible_light_attenuations, &self.packed.attenuations);
    sink.set_global_vector_array(ids.visible_light_spot_directions, &self.packed.spot_directions);
  }

}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::{
    Mat4,
    Vec3,
  };
  use crate::context::HalaCommandRecorder;
  use crate::scene::light_scene::HalaLightScene;

  fn colored(i: usize) -> Vec4 {
    Vec4::new(i as f32 + 1.0, 0.5, 0.25, 1.0)
  }

  fn point_lights(n: usize) -> Vec<HalaVisibleLight> {
    (0..n)
      .map(|i| HalaVisibleLight::point(colored(i), Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)), 5.0))
      .collect()
  }

  #[test]
  fn test_unused_slots_are_inert() {
    let mut forward_lights = HalaForwardLights::<MAX_VISIBLE_LIGHTS>::default();
    for n in (0..=MAX_VISIBLE_LIGHTS).chain(std::iter::once(MAX_VISIBLE_LIGHTS + 5)) {
      let lights = point_lights(n);
      forward_lights.pack(&lights, 4);
      let packed = forward_lights.packed();
      let count = n.min(MAX_VISIBLE_LIGHTS);
      assert_eq!(packed.count, count);
      for i in 0..count {
        assert_eq!(packed.colors[i], lights[i].color);
      }
      for i in count..MAX_VISIBLE_LIGHTS {
        assert_eq!(packed.colors[i], Vec4::ZERO);
      }
    }
  }

  #[test]
  fn test_no_lights() {
    let mut forward_lights = HalaForwardLights::<MAX_VISIBLE_LIGHTS>::default();
    forward_lights.pack(&point_lights(3), 4);
    let per_object_data = forward_lights.pack(&[], 4);
    assert!(per_object_data.is_empty());
    assert_eq!(forward_lights.packed().lights_per_object, 0);
    assert!(forward_lights.packed().colors.iter().all(|color| *color == Vec4::ZERO));
    assert!(forward_lights.light_index_map().is_none());
  }

  #[test]
  fn test_directional_light() {
    let transform = Mat4::from_rotation_x(0.7) * Mat4::from_translation(Vec3::new(3.0, 4.0, 5.0));
    let light = HalaVisibleLight::directional(Vec4::ONE, transform);
    let mut forward_lights = HalaForwardLights::<MAX_VISIBLE_LIGHTS>::default();
    let per_object_data = forward_lights.pack(&[light], 4);
    assert_eq!(per_object_data, HalaPerObjectData::LIGHT_DATA | HalaPerObjectData::LIGHT_INDICES);

    let packed = forward_lights.packed();
    assert_eq!(packed.attenuations[0], Vec4::new(0.0, 1.0, 0.0, 1.0));
    assert_eq!(packed.directions[0], -transform.z_axis);
    assert_eq!(packed.spot_directions[0], Vec4::new(0.0, 0.0, 1.0, 0.0));
  }

  #[test]
  fn test_point_light_fades_to_zero_at_range() {
    let mut forward_lights = HalaForwardLights::<MAX_VISIBLE_LIGHTS>::default();
    for range in [1e-5f32, 0.5, 1.0, 7.5, 40.0, 250.0] {
      let position = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
      forward_lights.pack(&[HalaVisibleLight::point(Vec4::ONE, position, range)], 4);
      let packed = forward_lights.packed();
      let attenuation = packed.attenuations[0];
      assert_eq!(packed.directions[0], Vec4::new(1.0, 2.0, 3.0, 1.0));
      assert_eq!((attenuation.z, attenuation.w), (0.0, 1.0));

      let range_sqr = range * range;
      let at_range = range_sqr * attenuation.x + attenuation.y;
      let at_fade_start = 0.64 * range_sqr * attenuation.x + attenuation.y;
      assert!(at_range.abs() < 1e-4, "range {} gives {}", range, at_range);
      assert!((at_fade_start - 1.0).abs() < 1e-4, "range {} gives {}", range, at_fade_start);
    }
  }

  #[test]
  fn test_degenerate_range_stays_finite() {
    for range in [0.0f32, -2.0, f32::NAN, f32::INFINITY] {
      let attenuation = distance_attenuation(range);
      assert!(attenuation.is_finite(), "range {} gives {:?}", range, attenuation);
      assert_eq!((attenuation.z, attenuation.w), (0.0, 1.0));
    }
  }

  #[test]
  fn test_spot_cone() {
    let (z, w) = spot_attenuation(60.0, Some(30.0), DEFAULT_SPOT_INNER_ANGLE_RATIO);
    let fade = |cos: f32| (cos * z + w).clamp(0.0, 1.0);
    assert!((fade(15.0f32.to_radians().cos()) - 1.0).abs() < 1e-5);
    assert!(fade(30.0f32.to_radians().cos()).abs() < 1e-5);
    assert_eq!(fade(1.0), 1.0);
    assert_eq!(fade(0.0), 0.0);
  }

  #[test]
  fn test_spot_equal_cones_are_guarded() {
    let (z, w) = spot_attenuation(40.0, Some(40.0), DEFAULT_SPOT_INNER_ANGLE_RATIO);
    assert!((z - 1.0 / MIN_SPOT_ANGLE_RANGE).abs() < 1e-2);
    assert!(w.is_finite());
  }

  #[test]
  fn test_spot_without_inner_angle_uses_ratio() {
    let outer_angle = 90.0f32;
    let (z, w) = spot_attenuation(outer_angle, None, 0.5);
    let cos_outer = 45.0f32.to_radians().cos();
    let cos_inner = (1.0f32 * 0.5).atan().cos();
    assert!((z - 1.0 / (cos_inner - cos_outer)).abs() < 1e-3);
    assert!((w + cos_outer * z).abs() < 1e-3);

    // The ratio is tunable per packer.
    let light = HalaVisibleLight::spot(Vec4::ONE, Mat4::IDENTITY, 10.0, outer_angle, None);
    let mut forward_lights = HalaForwardLights::<MAX_VISIBLE_LIGHTS>::new(0.5);
    forward_lights.pack(&[light], 4);
    let attenuation = forward_lights.packed().attenuations[0];
    assert_eq!((attenuation.z, attenuation.w), (z, w));
    assert_eq!(forward_lights.packed().spot_directions[0], Vec4::new(0.0, 0.0, -1.0, 0.0));

    forward_lights.set_spot_inner_angle_ratio(DEFAULT_SPOT_INNER_ANGLE_RATIO);
    forward_lights.pack(&[light], 4);
    assert_ne!(forward_lights.packed().attenuations[0].z, z);
  }

  #[test]
  fn test_overflow_lights_are_not_indexed() {
    let mut forward_lights = HalaForwardLights::<MAX_VISIBLE_LIGHTS>::default();
    forward_lights.pack(&point_lights(MAX_VISIBLE_LIGHTS), 4);
    assert!(forward_lights.light_index_map().is_none());

    let lights = point_lights(MAX_VISIBLE_LIGHTS + 5);
    forward_lights.pack(&lights, 4);
    let map = forward_lights.light_index_map().unwrap();
    assert_eq!(map.len(), lights.len());
    for (i, index) in map.iter().enumerate() {
      if i < MAX_VISIBLE_LIGHTS {
        assert_eq!(*index, i as i32);
      } else {
        assert_eq!(*index, -1);
      }
    }
    // The overflowing lights never reach the arrays.
    for light in &lights[MAX_VISIBLE_LIGHTS..] {
      assert!(!forward_lights.packed().colors.contains(&light.color));
    }
  }

  #[test]
  fn test_larger_capacity() {
    let mut forward_lights = HalaForwardLights::<32>::default();
    forward_lights.pack(&point_lights(20), 16);
    assert_eq!(forward_lights.packed().count, 20);
    assert_eq!(forward_lights.packed().lights_per_object, MAX_PER_OBJECT_LIGHTS);
    assert!(forward_lights.light_index_map().is_none());
  }

  #[test]
  fn test_setup_pushes_constants() {
    let mut scene = HalaLightScene::new(point_lights(MAX_VISIBLE_LIGHTS + 2), None);
    let mut recorder = HalaCommandRecorder::default();
    let mut forward_lights = HalaForwardLights::<MAX_VISIBLE_LIGHTS>::default();

    let per_object_data = forward_lights.setup(&mut recorder, &mut scene, 6);
    assert!(per_object_data.contains(HalaPerObjectData::LIGHT_INDICES));
    assert_eq!(scene.light_index_map()[MAX_VISIBLE_LIGHTS], -1);

    let ids = HalaLightingPropertyIds::get();
    assert_eq!(recorder.find_vector(ids.visible_lights_count), Some(Vec4::new(6.0, 0.0, 0.0, 0.0)));
    let colors = recorder.find_vector_array(ids.visible_light_colors).unwrap();
    assert_eq!(colors.len(), MAX_VISIBLE_LIGHTS);
    assert_eq!(colors[0], colored(0));
    assert!(recorder.find_vector_array(ids.visible_light_spot_directions).is_some());

    let mut empty = HalaLightScene::new(Vec::new(), None);
    forward_lights.setup(&mut recorder, &mut empty, 6);
    assert_eq!(recorder.find_vector(ids.visible_lights_count), Some(Vec4::ZERO));
  }
}
