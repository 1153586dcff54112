pub mod prelude;
pub mod error;
pub mod config;
pub mod scene;
pub mod shader_property;
pub mod context;
pub mod format_support;
pub mod forward_lights;
pub mod shadows;
pub mod pipeline;
