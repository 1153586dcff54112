use glam::Vec3;

/// Axis-aligned bounding box (AABB) of the shadow casters seen by a light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaBounds {
  pub center: Vec3,
  pub extents: Vec3,
}

/// Implementation of HalaBounds.
impl HalaBounds {

  /// Create a new HalaBounds instance.
  /// param center: The center of the AABB.
  /// param extents: The half size of the AABB.
  /// return: The new HalaBounds instance.
  pub fn new(center: Vec3, extents: Vec3) -> Self {
    Self { center, extents: extents.abs() }
  }

  /// Create a new HalaBounds instance from the minimum and maximum corners.
  /// param min: The minimum bounds of the AABB.
  /// param max: The maximum bounds of the AABB.
  /// return: The new HalaBounds instance.
  pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
    let (min, max) = (min.min(max), min.max(max));
    let extents = (max - min) * 0.5;
    Self { center: min + extents, extents }
  }

  /// Get the minimum bounds of the AABB.
  pub fn get_min(&self) -> Vec3 {
    self.center - self.extents
  }

  /// Get the maximum bounds of the AABB.
  pub fn get_max(&self) -> Vec3 {
    self.center + self.extents
  }

  /// Get the radius of the sphere enclosing the AABB.
  pub fn get_radius(&self) -> f32 {
    self.extents.length()
  }

  /// Grows the AABB to include the given point.
  /// param point: The point to include.
  pub fn encapsulate_point(&mut self, point: Vec3) {
    *self = Self::from_min_max(self.get_min().min(point), self.get_max().max(point));
  }

  /// Grows the AABB to include the given bounds.
  /// param bounds: The bounds to include.
  pub fn encapsulate_bounds(&mut self, bounds: &HalaBounds) {
    *self = Self::from_min_max(self.get_min().min(bounds.get_min()), self.get_max().max(bounds.get_max()));
  }

  /// Does another AABB intersect with this AABB?
  /// param other: The other AABB to check.
  /// return: True if the AABBs intersect, false otherwise.
  pub fn intersects(&self, other: &HalaBounds) -> bool {
    let (min, max) = (self.get_min(), self.get_max());
    let (other_min, other_max) = (other.get_min(), other.get_max());
    min.cmple(other_max).all() && max.cmpge(other_min).all()
  }

}
