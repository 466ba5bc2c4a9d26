//! Register definitions for the RFM69
//! Addresses and bit layouts follow the SX1231 / RFM69HCW datasheets.

mod operational;
mod packet;
mod rf;

pub use operational::*;
pub use packet::*;
pub use rf::*;
