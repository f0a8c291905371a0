//! Execution backends: engines that turn a literal prompt into text.

pub mod command;
pub mod contract;
pub mod echo;
pub mod http;
pub mod profile;
pub mod registry;

pub use command::CommandBackend;
pub use contract::{Backend, BackendOutput, BackendRequest};
pub use echo::EchoBackend;
pub use http::HttpBackend;
pub use profile::{BackendConfig, BackendType};
pub use registry::{build_backend, BackendRegistry, ECHO_BACKEND};
