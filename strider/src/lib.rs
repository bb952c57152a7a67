// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    extract_url_path,
    load_seeds_from_file,
    load_seeds_from_source,
    parse_url_line,
    render_json_report,
    render_text_report,
};
