#[macro_use]
extern crate serde;

#[macro_use]
extern crate log;

mod clock;
mod election;
mod error;
mod identity;
mod proof;
mod serde_hex;
mod service;
mod session;
mod store;
mod util;
mod verifier;
mod vote;

pub mod client;

pub use clock::*;
pub use election::*;
pub use error::*;
pub use identity::*;
pub use proof::*;
pub use serde_hex::*;
pub use service::*;
pub use session::*;
pub use store::*;
pub use util::*;
pub use verifier::*;
pub use vote::*;
