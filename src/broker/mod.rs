//! TCP broker serving one segment over the produce/consume protocol.
pub mod connection;
pub mod server;
