mod app_config;
mod render_desc;
mod sound_definition;

pub use app_config::{AppConfig, CONFIG_FILE_NAME, InsimConfig, SoundsConfig};
pub use render_desc::RenderDesc;
pub use sound_definition::{PannerParams, SoundDefinition};
