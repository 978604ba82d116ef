mod handler;
pub mod model;

pub use handler::{bootstrap_admin, list_categorias, login, logout, me, register};
