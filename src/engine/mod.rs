//! The invocation engine: from a declared operation and its arguments to a
//! processed response.

pub mod builder;
pub mod classifier;
pub mod deserializer;
pub mod dispatcher;
pub mod entity;
pub mod executor;
pub mod interceptor;
pub mod metadata;
pub mod request;
pub mod response;
pub mod session;
pub mod transport;
