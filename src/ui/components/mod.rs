mod command_input;
mod error_banner;
mod footer;
mod input;
mod key_result;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use error_banner::RetryBudget;
pub use footer::draw_footer;
pub use key_result::KeyResult;
pub use search_input::{SearchEvent, SearchInput};
