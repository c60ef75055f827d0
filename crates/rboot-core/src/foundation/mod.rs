//! Foundation layer - message model and error types.

pub mod contacts;
pub mod error;
pub mod message;

pub use contacts::Contacts;
pub use error::{
    AdapterError, AdapterResult, DispatchError, DispatchResult, EventError, EventResult,
    MemorizerError, MemorizerResult, RegistryError, RegistryResult, ScriptError, ScriptResult,
};
pub use message::{Message, RULE_HEADER, User};
