mod handler;
pub mod model;

pub use handler::{
    create_convocatoria, delete_convocatoria, get_convocatoria, list_convocatorias,
    update_convocatoria,
};
