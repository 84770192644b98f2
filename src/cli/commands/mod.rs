mod add;
mod index;
mod search;
mod serve;
mod status;

pub use add::AddArgs;
pub use index::IndexArgs;
pub use search::SearchArgs;
pub use serve::ServeArgs;
pub use status::StatusArgs;

pub use add::handle_add;
pub use index::handle_index;
pub use search::handle_search;
pub use serve::handle_serve;
pub use status::handle_status;
