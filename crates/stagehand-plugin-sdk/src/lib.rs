pub use stagehand_plugin_api::*;

mod export;
mod mem;

pub use export::*;
pub use mem::*;
