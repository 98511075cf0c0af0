//! Error types for the timing core.

use tempora_value_core::ValueError;

/// Errors raised by schedule construction and sampling.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TimingError {
    /// A resolved time was required (interval begins, seek targets).
    #[error("unresolved time where a resolved time is required: {context}")]
    UnresolvedTime { context: String },

    /// A condition or child reference named an element that does not exist.
    #[error("unknown element id {id}")]
    UnknownElement { id: u32 },

    /// The root container was given a parent.
    #[error("the root container cannot be attached to a parent")]
    RootHasNoParent,

    /// Children can only be attached to containers.
    #[error("element {id} is not a time container")]
    NotAContainer { id: u32 },

    /// The child already has a parent.
    #[error("element {id} is already attached to a container")]
    ChildAlreadyAttached { id: u32 },

    /// The root's simple duration is always indefinite.
    #[error("the root container's simple duration cannot be changed")]
    RootSimpleDurationFixed,

    /// A sync-base notification cascade exceeded the configured depth,
    /// which is how a cyclic dependency graph surfaces.
    #[error("sync-base propagation exceeded depth {depth}; cyclic dependency graph?")]
    PropagationDepthExceeded { depth: usize },

    /// Animation functions attach to leaf elements only.
    #[error("element {id} is a container and cannot carry an animation function")]
    AnimationOnContainer { id: u32 },

    /// seekTo was handed an indefinite or unresolved target.
    #[error("seek target must be a resolved time")]
    SeekUnresolved,

    /// An animation value model rejected an operation.
    #[error(transparent)]
    Value(#[from] ValueError),
}
