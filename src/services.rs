pub mod auth;
pub mod bag_service;
pub mod invoice_service;
pub mod pickup_service;
pub mod subscription_service;
