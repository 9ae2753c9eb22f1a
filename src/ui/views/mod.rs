mod comment_list;
mod overview;
mod repo_detail;
mod repo_list;

pub use comment_list::CommentListView;
pub use overview::OverviewView;
pub use repo_detail::RepositoryDetailView;
pub use repo_list::RepositoryListView;
