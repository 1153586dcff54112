use std::collections::HashMap;
use std::sync::{
  OnceLock,
  RwLock,
};

/// The opaque handle of a named global shader constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalaShaderPropertyId(u32);

/// The implementation of the shader property id.
impl HalaShaderPropertyId {

  /// Get the shader property id of a name.
  /// param name: The name of the property.
  /// return: The property id.
  pub fn from_name(name: &str) -> Self {
    HalaShaderPropertyCache::get_instance().property_to_id(name)
  }

  /// Get the name the property id was resolved from.
  /// return: The name or None if the id is unknown.
  pub fn name(&self) -> Option<String> {
    HalaShaderPropertyCache::get_instance().id_to_property(*self)
  }

  /// Get the raw handle value.
  pub fn to_u32(&self) -> u32 {
    self.0
  }

}

#[derive(Default)]
struct HalaShaderPropertyTable {
  ids: HashMap<String, HalaShaderPropertyId>,
  names: Vec<String>,
}

/// The process wide shader property cache.
/// Resolving a name is idempotent, the same name always yields the same id.
pub struct HalaShaderPropertyCache {
  table: RwLock<HalaShaderPropertyTable>,
}

/// The implementation of the shader property cache.
impl HalaShaderPropertyCache {

  /// Get the shader property cache singleton instance.
  pub fn get_instance() -> &'static HalaShaderPropertyCache {
    static SINGLETON: OnceLock<HalaShaderPropertyCache> = OnceLock::new();
    SINGLETON.get_or_init(|| {
      log::debug!("A HalaShaderPropertyCache created.");
      HalaShaderPropertyCache {
        table: RwLock::new(HalaShaderPropertyTable::default()),
      }
    })
  }

  /// Resolve a property name to its id.
  /// param name: The name of the property.
  /// return: The property id.
  pub fn property_to_id(&self, name: &str) -> HalaShaderPropertyId {
    {
      let table = self.table.read().unwrap_or_else(|poisoned| poisoned.into_inner());
      if let Some(id) = table.ids.get(name) {
        return *id;
      }
    }

    let mut table = self.table.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(id) = table.ids.get(name) {
      return *id;
    }
    let id = HalaShaderPropertyId(table.names.len() as u32);
    table.names.push(name.to_string());
    table.ids.insert(name.to_string(), id);
    id
  }

  /// Get the name of a property id.
  /// param id: The property id.
  /// return: The name or None if the id is unknown.
  pub fn id_to_property(&self, id: HalaShaderPropertyId) -> Option<String> {
    let table = self.table.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    table.names.get(id.0 as usize).cloned()
  }

}

/// The ids of the global constants written by the lighting stages.
pub struct HalaLightingPropertyIds {
  pub visible_lights_count: HalaShaderPropertyId,
  pub visible_light_directions: HalaShaderPropertyId,
  pub visible_light_colors: HalaShaderPropertyId,
  pub visible_light_attenuations: HalaShaderPropertyId,
  pub visible_light_spot_directions: HalaShaderPropertyId,
  pub shadow_bias: HalaShaderPropertyId,
  pub light_direction: HalaShaderPropertyId,
  pub world_to_shadow: HalaShaderPropertyId,
  pub shadow_map: HalaShaderPropertyId,
}

/// The implementation of the lighting property ids.
impl HalaLightingPropertyIds {

  /// Get the ids, resolved on first use.
  pub fn get() -> &'static HalaLightingPropertyIds {
    static IDS: OnceLock<HalaLightingPropertyIds> = OnceLock::new();
    IDS.get_or_init(|| HalaLightingPropertyIds {
      visible_lights_count: HalaShaderPropertyId::from_name("_VisibleLightsCount"),
      visible_light_directions: HalaShaderPropertyId::from_name("_VisibleLightDirections"),
      visible_light_colors: HalaShaderPropertyId::from_name("_VisibleLightColors"),
      visible_light_attenuations: HalaShaderPropertyId::from_name("_VisibleLightAttenuations"),
      visible_light_spot_directions: HalaShaderPropertyId::from_name("_VisibleLightSpotDirections"),
      shadow_bias: HalaShaderPropertyId::from_name("_ShadowBias"),
      light_direction: HalaShaderPropertyId::from_name("_LightDirection"),
      world_to_shadow: HalaShaderPropertyId::from_name("_WorldToShadow"),
      shadow_map: HalaShaderPropertyId::from_name("_ShadowMap"),
    })
  }

}
