//! Per-call context.
//!
//! A fresh [`Context`] is created for every HTTP request, CLI invocation and
//! local call. The API's context factory may seed it (a database session, a
//! tenant id, ...) and context-aware types and handlers read from it. Once the
//! call finishes the API's cleanup hook receives the context together with the
//! [`Outcome`] so it can commit or roll back.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::ApiError;

/// Which interface flavour a call came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Http,
    Cli,
    Local,
}

/// Typed per-call storage.
pub struct Context {
    api_version: Option<u32>,
    interface: String,
    kind: InterfaceKind,
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Context {
    #[must_use]
    pub fn new(kind: InterfaceKind, interface: impl Into<String>, api_version: Option<u32>) -> Self {
        Self {
            api_version,
            interface: interface.into(),
            kind,
            values: HashMap::new(),
        }
    }

    #[must_use]
    pub fn api_version(&self) -> Option<u32> {
        self.api_version
    }

    /// Name of the function being invoked.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    #[must_use]
    pub fn kind(&self) -> InterfaceKind {
        self.kind
    }

    /// Store a value, returning the previous one of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(InterfaceKind::Local, "", None)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("api_version", &self.api_version)
            .field("interface", &self.interface)
            .field("kind", &self.kind)
            .field("values", &self.values.len())
            .finish()
    }
}

/// How a call ended, handed to the context cleanup hook.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Completed,
    /// Validation failed with these per-field errors.
    Invalid(&'a Map<String, Value>),
    /// A requirement rejected the call with this body.
    Lacking(&'a Value),
    Failed(&'a ApiError),
}

impl Outcome<'_> {
    /// The error to hand to rollback logic, if the call failed.
    #[must_use]
    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}
