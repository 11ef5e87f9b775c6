/// Drivenet script - Script parsing, execution and sidechain commitments.
///
/// Provides the Script and Opcode types, the segregated witness stack, a
/// consensus script interpreter with P2SH and version 0 witness support, and
/// the CriticalData / BMM request format carried by drivechain commitments.

pub mod script;
pub mod opcodes;
pub mod opcode;
pub mod witness;
pub mod critical_data;
pub mod interpreter;

mod error;
pub use error::{CriticalDataError, ScriptError};
pub use script::Script;
pub use opcode::{Opcode, PushEncoding};
pub use witness::Witness;
pub use critical_data::{BmmRequest, CriticalData};
