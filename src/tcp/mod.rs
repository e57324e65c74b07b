//! TCP transport: terminal client and collection server

pub mod client;
pub mod server;

pub use client::Gt06TcpClient;
pub use server::Gt06TcpServer;
