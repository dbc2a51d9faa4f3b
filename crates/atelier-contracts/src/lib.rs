//! Shared value types for the studio: conversation turns, request objects, the closed error
//! set, option enumerations, the model catalogue and the session event log.

pub mod chat;
pub mod conversation;
pub mod error;
pub mod events;
pub mod models;
pub mod options;
pub mod requests;

pub use error::{ErrorKind, StudioError, StudioResult};
