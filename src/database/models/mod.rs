// Database models

mod settings;

pub use settings::{ClientSettings, Setting};
