//! Path naming: templates, name normalization, the path registry and the
//! generator that ties them together.

pub mod generator;
pub mod normalize;
pub mod registry;
pub mod template;

pub use generator::Generator;
pub use normalize::normalize_name;
pub use registry::Registry;
pub use template::Template;
