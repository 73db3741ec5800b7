//! Binary produce/consume protocol.
//!
//! Every message travels in a length-prefixed frame (see `frame`). The first
//! payload byte selects the request or response type.
pub mod frame;
pub mod request;
pub mod response;
