pub mod commands;
pub mod handlers;

pub use commands::{CLAP_STYLING, command_argument_builder};
pub use handlers::{build_options, load_keywords, parse_headers, parse_url_line};
