mod handler;
pub mod model;

pub use handler::{
    admin_create_activity, admin_delete_activity, admin_get_overview, admin_get_summary,
    admin_list_activities, admin_update_activity, create_activity, delete_activity, get_overview,
    get_summary, list_activities, list_activity_types, update_activity,
};
