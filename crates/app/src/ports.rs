//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod backend;
pub mod event_bus;
pub mod message_sink;
pub mod virtual_functions;

pub use backend::DeviceBackend;
pub use event_bus::EventPublisher;
pub use message_sink::MessageSink;
pub use virtual_functions::VirtualFunctionRegistry;
