#[cfg(feature = "rtu")]
pub mod rtu;
#[cfg(feature = "tcp-server")]
pub mod tcp;

mod service;

pub use service::{NewService, Service, ServerContextService};
