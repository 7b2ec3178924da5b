pub mod registry;
pub mod render;
pub mod settings;

pub use registry::{ImageRef, ResolvedReference, Resolver, ResolverConfig};
pub use render::{
    build_render_vars, failure_kind, load_images, write_render_vars, ImageSpec, RenderVars,
};
pub use settings::Settings;
