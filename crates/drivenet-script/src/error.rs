/// Error types for script parsing and configuration.
///
/// Execution failures are reported separately through
/// `interpreter::InterpreterError`, which carries a stable code.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Invalid hex string.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Not enough data in script to complete a push operation.
    #[error("not enough data")]
    DataTooSmall,

    /// Push data does not fit the requested push encoding.
    #[error("data too big")]
    DataTooBig,

    /// Mnemonic that names no opcode.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),

    /// Verification flag name not in the flag table.
    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    /// Token the text script parser cannot interpret.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Error from primitives crate.
    #[error("primitives error: {0}")]
    Primitives(#[from] drivenet_primitives::PrimitivesError),
}

/// Errors raised while building or decoding a `CriticalData` record.
#[derive(Debug, thiserror::Error)]
pub enum CriticalDataError {
    /// Field values violate the record's shape.
    #[error("invalid critical data: {0}")]
    Construction(String),

    /// The byte cursor ran out of data.
    #[error("critical data read error: {0}")]
    Read(#[from] drivenet_primitives::PrimitivesError),
}
