pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod refine;
pub mod types;

pub use cached_client::{CachedDashboardClient, Overview, RepositoryBundle};
pub use error::{ApiError, ErrorKind};
