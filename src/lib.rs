#![doc(html_root_url = "https://docs.rs/xml-bindings-dom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Namespace-aware custom elements and custom attributes.
//!
//! Register a [`Binding`] for a `(namespace, local name)` pair with [`XmlBindings::register_element`]
//! or [`XmlBindings::register_attribute`], and every matching node in the [`Host`] tree is
//! converted exactly once per binding, attached once per attach and detached once per detach,
//! no matter how often (or through which ancestor) the host's mutation notifications report it.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod binding;
mod dispatch;
mod error;
mod reconcile;
mod runtime;

pub mod enumerate;
pub mod host;
pub mod memory;
pub mod registry;
pub mod tracker;
pub mod web;

pub use binding::{Binding, BindingId, BindingKey, BindingKind, Callback, Hook, RegisteredBinding, Subject};
pub use error::{CallbackError, HostError, RegistrationError, TreeError};
pub use host::{Host, MutationRecord, ObserveOptions, Target, WeakTable};
pub use runtime::{Options, XmlBindings};
