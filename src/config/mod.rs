mod loader;
mod types;

pub use loader::{
    TOKEN_ENV, default_config_path, load_config, load_config_with_token, validate_local_addr,
};
pub use types::*;
