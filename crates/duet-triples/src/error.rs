use duet_ot::OtError;

/// An error raised by a correlated-material provider.
#[derive(Debug, thiserror::Error)]
pub enum TripleError {
    /// The OT layer failed.
    #[error(transparent)]
    Ot(#[from] OtError),
    /// A reservation was made after `pre_setup` had frozen the demand.
    #[error("requests are closed once pre-setup has started")]
    RequestsClosed,
    /// A getter asked for a range outside the reserved pool.
    #[error("range {offset}..{end} exceeds the pool of {size}")]
    OutOfRange {
        /// Start of the requested range.
        offset: usize,
        /// End of the requested range.
        end: usize,
        /// Size of the pool.
        size: usize,
    },
    /// An unsupported ring width was requested.
    #[error("unsupported ring width {0}")]
    UnsupportedWidth(usize),
}
