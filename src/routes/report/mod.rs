mod handler;
pub mod model;

pub use handler::{download, get_filters, overload_payment, teaching_overload};
