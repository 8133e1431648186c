/// Convenience result type used across sortlast.
pub type SortlastResult<T> = Result<T, SortlastError>;

/// Error taxonomy of the compositing core.
///
/// An empty contribution from a rank is not an error (it is replaced by a placeholder
/// sample), and render-target state restoration is guaranteed by guards, so neither has a
/// variant here.
#[derive(thiserror::Error, Debug)]
pub enum SortlastError {
    /// Fatal misconfiguration: zero tile dimensions, malformed viewports, too few ranks for
    /// the tile grid, incompatible merge settings. No partial frame is produced.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Group members diverged on collective call order/count, or a peer went away.
    #[error("collective error: {0}")]
    Collective(String),

    /// A payload received from another process could not be decoded.
    #[error("transfer error: {0}")]
    Transfer(String),

    /// A render stage or render target rejected its input.
    #[error("render error: {0}")]
    Render(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SortlastError {
    /// Build a [`SortlastError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`SortlastError::Collective`] value.
    pub fn collective(msg: impl Into<String>) -> Self {
        Self::Collective(msg.into())
    }

    /// Build a [`SortlastError::Transfer`] value.
    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }

    /// Build a [`SortlastError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// `true` for errors after which the process group is inconsistent and must be torn
    /// down rather than resumed.
    pub fn is_fatal_for_group(&self) -> bool {
        matches!(self, Self::Collective(_) | Self::Transfer(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
