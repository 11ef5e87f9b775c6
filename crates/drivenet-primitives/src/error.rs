/// Failures raised while decoding bytes, keys and signatures.
#[derive(Debug, thiserror::Error)]
pub enum PrimitivesError {
    /// A read ran past the end of the buffer.
    #[error("read past end of buffer")]
    UnexpectedEof,

    /// Scalar of the wrong length or outside `1..n`.
    #[error("bad private key: {0}")]
    InvalidPrivateKey(String),

    /// SEC1 bytes that do not name a point on the curve.
    #[error("bad public key encoding: {0}")]
    InvalidPublicKey(String),

    #[error("bad signature: {0}")]
    InvalidSignature(String),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::{PrivateKey, PublicKey};

    #[test]
    fn test_hex_errors_convert() {
        assert!(matches!(PrivateKey::from_hex("zz"), Err(PrimitivesError::Hex(_))));
        assert!(matches!(PublicKey::from_hex("0"), Err(PrimitivesError::Hex(_))));
        assert!(matches!(PublicKey::from_hex(""), Err(PrimitivesError::InvalidPublicKey(_))));
    }
}
