pub mod header;
pub mod utils;

pub use header::{draw_header, extract_domain};
pub use utils::{compact_count, pr_state_color, relative_time, status_color, truncate};
