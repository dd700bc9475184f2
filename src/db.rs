pub mod address_repo;
pub use address_repo::AddressRepository;
pub mod bag_repo;
pub use bag_repo::BagRepository;
pub mod invoice_repo;
pub use invoice_repo::InvoiceRepository;
pub mod pickup_repo;
pub use pickup_repo::PickupRepository;
pub mod preferences_repo;
pub use preferences_repo::PreferencesRepository;
pub mod subscription_repo;
pub use subscription_repo::SubscriptionRepository;
pub mod user_repo;
pub use user_repo::UserRepository;
