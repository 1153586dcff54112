pub use crate::error::HalaLightingError;
pub use crate::config::{
  HalaPipelineConfig,
  HalaShadowMapSize,
  HalaDeviceCaps,
};
pub use crate::scene::{
  HalaBounds,
  HalaLightKind,
  HalaVisibleLight,
  HalaCullingResults,
  HalaShadowMatrices,
  HalaLightScene,
  loader::HalaGltfLightLoader,
};
pub use crate::shader_property::{
  HalaShaderPropertyId,
  HalaLightingPropertyIds,
};
pub use crate::context::{
  HalaConstantSink,
  HalaRenderContext,
  HalaCommandRecorder,
  HalaTextureHandle,
};
pub use crate::forward_lights::{
  HalaForwardLights,
  HalaPackedLightSet,
  HalaPerObjectData,
  MAX_VISIBLE_LIGHTS,
};
pub use crate::shadows::{
  HalaShadowFrame,
  HalaShadowProjector,
  HalaShadowSettings,
};
pub use crate::pipeline::{
  HalaForwardPipeline,
  HalaCameraFrame,
};
