//! Handler module - declarations, registration and dispatch context.
//!
//! Provides:
//! - [`Handler`] - the trait every handler and listener implements (plain
//!   async closures implement it automatically)
//! - [`HandlerDeclaration`] - a handler plus its attached configuration, as
//!   the host framework declares it
//! - [`HandlerRegistry`] - the first-wins registration tables
//! - [`DispatchContext`] - the immutable per-dispatch snapshot handlers read
//! - [`extract`] - accessor functions over a context
//!
//! # Example
//!
//! ```
//! use queuewire::config::MessageHandlerConfig;
//! use queuewire::dispatch::Reply;
//! use queuewire::handler::{extract, DispatchContext, HandlerDeclaration};
//!
//! let config = MessageHandlerConfig::new("https://queue/Q1");
//! let decl = HandlerDeclaration::message(config, |ctx: DispatchContext| async move {
//!     let id = extract::message_id(&ctx)?.to_string();
//!     Ok(Reply::value(serde_json::json!({ "handled": id })))
//! });
//! ```

mod context;
pub mod extract;
mod registry;

pub use context::{DispatchContext, DispatchInput};
pub use registry::{
    BoxFuture, Handler, HandlerDeclaration, HandlerExtras, HandlerRegistry, HandlerResult,
    TypedHandler,
};
