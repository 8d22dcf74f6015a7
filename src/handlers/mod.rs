pub mod auth_handlers;
pub mod health_handlers;
pub mod object_handlers;
pub mod photo_handlers;
pub mod profile_handlers;
