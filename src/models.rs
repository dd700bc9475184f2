pub mod address;
pub mod auth;
pub mod bag;
pub mod invoice;
pub mod pickup;
pub mod preferences;
pub mod subscription;
