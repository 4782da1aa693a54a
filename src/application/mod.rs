pub mod binder;
pub mod builders;
pub mod driver;
pub mod services;
