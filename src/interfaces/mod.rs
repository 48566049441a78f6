//! Front ends over the engine: the interactive console and the
//! line-delimited JSON server.

pub mod console;
pub mod protocol;
pub mod server;
