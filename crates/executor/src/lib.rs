//! Call/create processor for one transaction: builds child-frame
//! `ActionParams`, drives `evm::Interpreter`s through `vm::Exec`, and
//! recurses on every `TrapError::Call`/`TrapError::Create`. Plays the role
//! the teacher's (unretrieved) `executive.rs` plays for `State<Backend>`.

mod executive;

pub use executive::{Executive, Outcome};
