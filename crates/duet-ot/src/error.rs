use duet_comm::CommError;

/// An oblivious transfer error.
#[derive(Debug, thiserror::Error)]
pub enum OtError {
    /// The communication layer failed.
    #[error(transparent)]
    Comm(#[from] CommError),
    /// A vector was registered after setup had already started.
    #[error("OT registration is closed once setup has started")]
    RegistrationClosed,
    /// Lookup of an unknown vector id.
    #[error("unknown OT vector id {0}")]
    UnknownVector(u64),
    /// Sender inputs were not set before sending messages.
    #[error("sender inputs have not been set")]
    InputsMissing,
    /// Sender inputs were set twice.
    #[error("sender inputs have already been set")]
    InputsAlreadySet,
    /// Receiver choices were not set before sending corrections.
    #[error("receiver choices have not been set")]
    ChoicesMissing,
    /// Receiver choices were set twice.
    #[error("receiver choices have already been set")]
    ChoicesAlreadySet,
    /// The number of inputs does not match the registered vector size.
    #[error("expected {expected} inputs, got {actual}")]
    InputCountMismatch {
        /// Registered number of OTs.
        expected: usize,
        /// Provided number of inputs.
        actual: usize,
    },
    /// An input or output bit length does not match the registered one.
    #[error("expected bit length {expected}, got {actual}")]
    BitLengthMismatch {
        /// Registered bit length.
        expected: usize,
        /// Provided bit length.
        actual: usize,
    },
    /// The operation is not defined for the vector's OT flavor.
    #[error("operation not supported for {0:?}")]
    UnsupportedFlavor(crate::OtProtocol),
    /// The peer sent an invalid group element in the base OT.
    #[error("invalid curve point from peer")]
    InvalidPoint,
    /// The peer sent a malformed extension message.
    #[error("malformed OT extension message: {0}")]
    MalformedMessage(String),
}
