//! Accepting connections and polling them to completion.
//!
//! - **`listener`**: Binds the address, accepts, and registers connections
//! - **`connection`**: The per-connection read/dispatch/write state machine
//! - **`scheduler`**: Worker threads that busy-poll their assigned tasks
//! - **`backoff`**: How an idle worker waits between passes

pub mod backoff;
pub mod connection;
pub mod listener;
pub mod scheduler;

pub use backoff::{BusySpin, IdleBackoff, IdleStrategy};
pub use connection::{Connection, ConnectionPhase};
pub use listener::{Server, ShutdownHandle, serve};
pub use scheduler::{Scheduler, Task};
