/*
[INPUT]:  HTTP client configuration and auth API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST communication with the session backend
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod api;
pub mod client;
pub mod error;

pub use api::AuthApi;
pub use client::{AuthClient, ClientConfig, DEFAULT_API_BASE_URL};
pub use error::{
    AUTHENTICATION_FAILED_MESSAGE, Result, SERVICE_UNAVAILABLE_MESSAGE, SESSION_EXPIRED_MESSAGE,
    SessionError,
};
