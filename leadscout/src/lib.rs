// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    AppContext, load_template, resolve_config_path, resolve_format, verbosity_filter,
    write_default_config,
};
