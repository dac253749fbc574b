mod block_source;
mod pagination;
mod repository;

pub use block_source::*;
pub use pagination::*;
pub use repository::*;
