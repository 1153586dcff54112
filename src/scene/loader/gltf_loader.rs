use std::path::Path;
use std::collections::VecDeque;

use glam::{
  Mat4,
  Vec3,
  Vec4,
};
use serde::{
  Serialize,
  Deserialize,
};

use crate::error::HalaLightingError;
use crate::scene::bounds::HalaBounds;
use crate::scene::light::HalaVisibleLight;
use crate::scene::light_scene::HalaLightScene;

/// The glTF light custom info.
#[derive(Serialize, Deserialize)]
struct _LightCustomInfo {
  #[serde(default)]
  pub shadows: bool,
}

/// glTF lights shine along -Z, visible lights along +Z.
const GLTF_TO_LIGHT_SPACE: Mat4 = Mat4::from_cols(
  Vec4::new(-1.0, 0.0, 0.0, 0.0),
  Vec4::new(0.0, 1.0, 0.0, 0.0),
  Vec4::new(0.0, 0.0, -1.0, 0.0),
  Vec4::new(0.0, 0.0, 0.0, 1.0),
);

/// The glTF light loader.
pub struct HalaGltfLightLoader;

/// The implementation of the glTF light loader.
impl HalaGltfLightLoader {

  /// Load the KHR_lights_punctual lights of a glTF file.
  /// param path: The path to the glTF file.
  /// param default_range: The range of point and spot lights without one.
  /// return The loaded light scene.
  pub fn load<P: AsRef<Path>>(path: P, default_range: f32) -> Result<HalaLightScene, HalaLightingError> {
    let path = path.as_ref();
    let gltf = gltf::Gltf::open(path)
      .map_err(|err| HalaLightingError::new(&format!("Load glTF file \"{:?}\" failed.", path), Some(Box::new(err))))?;

    let mut scenes = gltf.scenes();
    let scene = scenes.next()
      .ok_or(HalaLightingError::new(&format!("No scene in glTF file \"{:?}\".", path), None))?;
    if scenes.next().is_some() {
      log::warn!("More than one scene in glTF file \"{:?}\". Only the first scene will be loaded.", path);
    }
    log::debug!("Loading scene \"{}\".", scene.name().unwrap_or("<Unnamed>"));

    let mut lights = Vec::new();
    let mut caster_bounds: Option<HalaBounds> = None;
    let mut node_queue = VecDeque::new();
    node_queue.extend(scene.nodes().map(|node| (Mat4::IDENTITY, node)));

    while let Some((parent_transform, node)) = node_queue.pop_front() {
      let world_transform = parent_transform * Mat4::from_cols_array_2d(&node.transform().matrix());

      // If the node has a light, place it.
      if let Some(light) = node.light() {
        lights.push(Self::load_light(&light, world_transform, default_range)?);
      }

      // If the node has a mesh, grow the caster bounds.
      if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
          let bounds = Self::transform_bounds(primitive.bounding_box(), &world_transform);
          match caster_bounds.as_mut() {
            Some(caster_bounds) => caster_bounds.encapsulate_bounds(&bounds),
            None => caster_bounds = Some(bounds),
          }
        }
      }

      node_queue.extend(node.children().map(|child| (world_transform, child)));
    }

    Ok(HalaLightScene::new(lights, caster_bounds))
  }

  /// Load the light.
  /// param light The gltf light.
  /// param world_transform The world transform of the light node.
  /// param default_range The range used when the light has none.
  /// return The loaded light.
  fn load_light(
    light: &gltf::khr_lights_punctual::Light,
    world_transform: Mat4,
    default_range: f32,
  ) -> Result<HalaVisibleLight, HalaLightingError> {
    log::debug!("Loading light \"{}\".", light.name().unwrap_or("<Unnamed>"));

    let color = (Vec3::from(light.color()) * light.intensity()).extend(1.0);
    let local_to_world = world_transform * GLTF_TO_LIGHT_SPACE;
    let range = light.range().unwrap_or(default_range);

    let loaded = match light.kind() {
      gltf::khr_lights_punctual::Kind::Directional => HalaVisibleLight::directional(color, local_to_world),
      gltf::khr_lights_punctual::Kind::Point => HalaVisibleLight::point(color, local_to_world, range),
      gltf::khr_lights_punctual::Kind::Spot {
        inner_cone_angle,
        outer_cone_angle,
      } => {
        // glTF stores half angles in radians.
        let outer_angle = outer_cone_angle.to_degrees() * 2.0;
        let inner_angle = (inner_cone_angle.to_degrees() * 2.0).min(outer_angle);
        HalaVisibleLight::spot(color, local_to_world, range, outer_angle, Some(inner_angle))
      },
    };

    let casts_shadows = if let Some(extras) = light.extras() {
      let custom_info: _LightCustomInfo = serde_json::from_str(extras.get())
        .map_err(|err| HalaLightingError::new("Parse light extras failed.", Some(Box::new(err))))?;
      custom_info.shadows
    } else {
      false
    };

    Ok(if casts_shadows { loaded.with_shadows() } else { loaded })
  }

  /// Transform a local bounding box into a world space AABB.
  /// param bounding_box The local bounding box.
  /// param transform The local to world transform.
  /// return The world space bounds.
  fn transform_bounds(bounding_box: gltf::mesh::BoundingBox, transform: &Mat4) -> HalaBounds {
    let min = Vec3::from(bounding_box.min);
    let max = Vec3::from(bounding_box.max);
    let mut bounds = HalaBounds::new(transform.transform_point3(min), Vec3::ZERO);
    for corner in 1..8 {
      let point = Vec3::new(
        if corner & 1 != 0 { max.x } else { min.x },
        if corner & 2 != 0 { max.y } else { min.y },
        if corner & 4 != 0 { max.z } else { min.z },
      );
      bounds.encapsulate_point(transform.transform_point3(point));
    }
    bounds
  }

}
