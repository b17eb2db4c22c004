use thiserror::Error;

#[derive(Debug, Error)]
pub enum RmzError {
    /// A flow with this id is already tracked
    #[error("Flow {0} is already registered")]
    DuplicateFlow(u64),

    /// Copying a payload or growing the queue failed
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    /// An encoder write would run past the end of its buffer
    #[error("Buffer overflow: write of {needed} bytes with only {remaining} remaining")]
    BufferOverflow { needed: usize, remaining: usize },

    /// Subscribing a flow to stream-layer events did not succeed
    #[error("Failed to associate flow {flow_id} with stream layer: {reason}")]
    AssociationFailure { flow_id: u64, reason: String },

    /// The packet queue has been shut down
    #[error("Packet queue is shutting down")]
    ShuttingDown,

    /// A record on the wire could not be decoded
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Operation not valid in the relay's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid replay script contents
    #[error("Invalid script: {0}")]
    Script(String),

    /// Settings file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Settings could not be written as TOML
    #[error("Config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// I/O errors from file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenient Result type alias using `RmzError`.
pub type Result<T> = std::result::Result<T, RmzError>;

impl RmzError {
    /// Creates an allocation failure for the given resource.
    pub fn allocation(resource: &str) -> Self {
        Self::AllocationFailure(format!("could not reserve memory for {}", resource))
    }

    /// Creates an association failure for a flow.
    pub fn association(flow_id: u64, reason: impl Into<String>) -> Self {
        Self::AssociationFailure {
            flow_id,
            reason: reason.into(),
        }
    }

    /// Whether this error indicates a caller bug rather than a runtime condition.
    ///
    /// Contract violations must be surfaced; everything else may be absorbed
    /// by the classifier.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::DuplicateFlow(_) | Self::BufferOverflow { .. })
    }

    /// Whether the classifier may degrade to "do not intercept" on this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailure(_) | Self::AssociationFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violations() {
        assert!(RmzError::DuplicateFlow(1).is_contract_violation());
        assert!(RmzError::BufferOverflow {
            needed: 8,
            remaining: 7
        }
        .is_contract_violation());
        assert!(!RmzError::ShuttingDown.is_contract_violation());
        assert!(!RmzError::allocation("payload").is_contract_violation());
    }

    #[test]
    fn test_recoverable() {
        assert!(RmzError::allocation("payload").is_recoverable());
        assert!(RmzError::association(42, "busy").is_recoverable());
        assert!(!RmzError::DuplicateFlow(42).is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = RmzError::association(42, "layer busy");
        assert_eq!(
            err.to_string(),
            "Failed to associate flow 42 with stream layer: layer busy"
        );
    }
}
