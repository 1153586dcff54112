pub mod loader;
pub mod bounds;
pub mod light;
pub mod culling;
pub mod light_scene;

pub use bounds::HalaBounds;
pub use light::{HalaLightKind, HalaVisibleLight};
pub use culling::{HalaCullingResults, HalaShadowMatrices};
pub use light_scene::HalaLightScene;
