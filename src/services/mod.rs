pub mod password;
pub use password::SaltedHasher;

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, Authenticator, Identity};
pub use auth_service_impl::SeaOrmAuthenticator;

pub mod token;
pub use token::TokenService;

pub mod account_service;
pub mod account_service_impl;
pub use account_service::{AccountAdministrator, AccountError, UserInfo};
pub use account_service_impl::SeaOrmAccountAdministrator;

pub mod city_service;
pub mod city_service_impl;
pub use city_service::{City, CityError, CityRegistry};
pub use city_service_impl::SeaOrmCityRegistry;
