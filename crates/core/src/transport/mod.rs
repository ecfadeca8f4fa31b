//! Network transport for the HTTP shell.
//!
//! One TCP connection per client, with a thread per connection. A
//! streaming connection's thread is its stream pump, so a slow client or a
//! stalled upstream only ever blocks its own thread.

pub mod tcp;
