//! # taskdeck-shared
//!
//! Domain types shared by the store and the HTTP server: the user-owned
//! records, their enumerations, the request DTOs with their validation
//! rules, and the JSON response envelope.

pub mod constants;
pub mod envelope;
pub mod error;
pub mod models;
pub mod requests;
pub mod types;
pub mod validate;

pub use envelope::{Envelope, ErrorBody, FieldDetail, Meta};
pub use error::{FieldError, ValidationErrors};
pub use models::*;
pub use types::*;
pub use validate::Validate;
