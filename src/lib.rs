//! A client for the BugWise bug tracker's HTTP API.

#![forbid(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

mod config;
pub mod endpoints;
pub mod presentation;
mod request;
pub mod session;
mod user;

pub use config::{Config, DEFAULT_BASE_URL};
pub use request::{
    interpret_response, ApiClient, ApiError, Method, UnknownMethod,
    FALLBACK_ERROR_MESSAGE,
};
pub use session::{FileStorage, MemoryStorage, SessionStore, Storage};
pub use user::{NewUser, Role, UnknownRole, User, UserUpdate};

/// The default user agent to use when communicating with the BugWise server.
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));
