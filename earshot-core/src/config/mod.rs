mod source_config;
mod world_desc;

pub(crate) use source_config::is_valid_distance;
pub use source_config::{DEFAULT_MAX_DISTANCE, SourceDefaults};
pub use world_desc::{EarshotWorldDesc, OutputChannels, SampleFormat};
