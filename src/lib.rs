pub mod core;
pub mod provider;
pub mod proxy;
pub mod server;
pub mod session;
pub mod state;
