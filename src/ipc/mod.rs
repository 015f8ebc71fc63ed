//! IPC module for client and hook shim communication

mod protocol;
mod server;

pub use server::Server;
