use std::collections::HashMap;

use crate::context::{
  HalaRenderContext,
  HalaRenderTextureFormat,
};

/// Caches the device render texture format support per format.
#[derive(Default)]
pub struct HalaFormatSupportCache {
  cache: HashMap<HalaRenderTextureFormat, bool>,
}

/// The implementation of the format support cache.
impl HalaFormatSupportCache {

  /// Check device support for a render texture format.
  /// Only the first query of a format reaches the device.
  /// param context: The render context.
  /// param format: The render texture format to check.
  /// return: True if the format is supported.
  pub fn supports<C: HalaRenderContext + ?Sized>(&mut self, context: &C, format: HalaRenderTextureFormat) -> bool {
    *self.cache.entry(format)
      .or_insert_with(|| context.supports_render_texture_format(format))
  }

  /// Pick the first supported format.
  /// param context: The render context.
  /// param candidates: The formats in order of preference.
  /// return: The format or None if no candidate is supported.
  pub fn pick<C: HalaRenderContext + ?Sized>(&mut self, context: &C, candidates: &[HalaRenderTextureFormat]) -> Option<HalaRenderTextureFormat> {
    candidates.iter().copied().find(|format| self.supports(context, *format))
  }

  /// Clear all cached results, e.g. after the device changed.
  pub fn clear(&mut self) {
    self.cache.clear();
  }

}
