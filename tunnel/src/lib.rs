//! Wire primitives shared by the tunnel client and the edge: the
//! authentication handshake sent on every control connection and the
//! bridge that splices two byte streams together.

pub mod bridge;
pub mod handshake;

pub use bridge::{bridge, Closed};
pub use handshake::{read_auth, write_auth, AuthMessage, HandshakeError};
