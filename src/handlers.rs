pub mod account;
pub mod auth;
pub mod bags;
pub mod billing;
pub mod pickups;
pub mod subscriptions;
