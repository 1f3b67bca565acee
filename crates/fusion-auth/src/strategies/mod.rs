mod api_key;
mod basic;
mod bearer;
mod none;
mod oauth2_device;
mod oauth2_external;
mod session_jwt;
mod user_credentials;

pub use api_key::ApiKeyStrategy;
pub use basic::BasicStrategy;
pub use bearer::BearerStrategy;
pub use none::NoneStrategy;
pub use oauth2_device::OAuth2DeviceStrategy;
pub use oauth2_external::OAuth2ExternalStrategy;
pub use session_jwt::SessionJwtStrategy;
pub use user_credentials::UserCredentialsStrategy;
