pub mod auth;
pub mod view;

pub use auth::Bearer;
pub use view::{VIEW_ID_HEADER, ViewOwner};
