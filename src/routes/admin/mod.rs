mod handler;
pub mod model;

pub use handler::{
    approve_user, delete_user, get_user, list_roles, list_users, toggle_cotizo,
    toggle_miembro_sociedad, update_user,
};
