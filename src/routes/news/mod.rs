mod handler;
pub mod model;

pub use handler::{create_news, delete_news, get_news, list_news, update_news};
