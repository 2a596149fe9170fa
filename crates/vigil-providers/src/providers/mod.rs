//! Built-in providers

mod bus_interface;
mod display;
mod fallback;
mod init;
mod session_bus;

pub use bus_interface::BusInterface;
pub use display::DisplayProvider;
pub use fallback::FallbackProvider;
pub use init::InitProvider;
pub use session_bus::SessionBusProvider;
