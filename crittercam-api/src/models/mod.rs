mod config;
mod firmware;
mod status;

pub use config::*;
pub use firmware::*;
pub use status::*;
