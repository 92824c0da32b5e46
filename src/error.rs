use thiserror::Error;

/// The only error [`XmlBindings::register_element`](`crate::XmlBindings::register_element`)
/// and [`XmlBindings::register_attribute`](`crate::XmlBindings::register_attribute`) report to their caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}

/// Failures reported by a [`Host`](`crate::Host`).
///
/// These are logged by the runtime and never abort a registration or a mutation batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
	#[error("Unsupported by this host: {0}")]
	Unsupported(String),

	#[error("Rejected by the host: {0}")]
	Rejected(String),

	#[error("JavaScript exception: {0}")]
	Js(String),
}

/// Misuse of the in-memory tree in [`memory`](`crate::memory`).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
	#[error("The new child is an inclusive ancestor of the parent")]
	HierarchyRequest,

	#[error("The node is not a child of this parent")]
	NotFound,

	#[error("This node type is not allowed here")]
	InvalidNodeType,
}

/// Returned by failing lifecycle callbacks.
///
/// The error is logged together with the binding and lifecycle hook, then discarded.
pub type CallbackError = Box<dyn std::error::Error>;
