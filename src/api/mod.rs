pub mod format;
pub mod image;
pub mod query;
pub mod relation;

pub use format::{FindOneResponse, FindResponse, MutationResponse, Node, Pagination};
pub use image::ImageNode;
pub use query::{ListParams, ListQuery, QueryError};
pub use relation::RelationInput;
