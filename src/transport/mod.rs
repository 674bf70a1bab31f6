// Bundled coordination transport: frame format plus the TCP connection.
pub mod tcp;
pub mod wire;

pub use tcp::TcpTransport;
