//! Property accessors
//!
//! A [`Property`] is a named value that can be read and written from the
//! pulse context. Accessors are built ahead of time, either around a shared
//! cell ([`SharedValue`]) or around getter/setter closures ([`property`]).

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A property could not be read or written
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("property `{name}`: {message}")]
pub struct PropertyError {
    pub name: String,
    pub message: String,
}

impl PropertyError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Readable and writable animated value
pub trait Property<T>: Send + Sync {
    fn get(&self) -> Result<T, PropertyError>;

    fn set(&self, value: T) -> Result<(), PropertyError>;

    /// Name used in error messages
    fn name(&self) -> &str {
        "<anonymous>"
    }
}

/// Shared mutable cell usable as a property
///
/// Clones refer to the same value.
pub struct SharedValue<T> {
    name: Arc<str>,
    value: Arc<Mutex<T>>,
}

impl<T: Clone> SharedValue<T> {
    pub fn new(name: &str, value: T) -> Self {
        Self {
            name: Arc::from(name),
            value: Arc::new(Mutex::new(value)),
        }
    }

    /// Current value
    pub fn value(&self) -> T {
        self.value.lock().clone()
    }

    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.value.lock(), value)
    }

    /// Shared accessor for this cell
    pub fn as_property(&self) -> Arc<dyn Property<T>>
    where
        T: Send + 'static,
    {
        Arc::new(self.clone())
    }
}

impl<T> Clone for SharedValue<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedValue")
            .field("name", &self.name)
            .field("value", &*self.value.lock())
            .finish()
    }
}

impl<T: Clone + Send> Property<T> for SharedValue<T> {
    fn get(&self) -> Result<T, PropertyError> {
        Ok(self.value.lock().clone())
    }

    fn set(&self, value: T) -> Result<(), PropertyError> {
        *self.value.lock() = value;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Property backed by getter and setter closures
pub struct FnProperty<G, S> {
    name: String,
    getter: G,
    setter: S,
}

impl<T, G, S> Property<T> for FnProperty<G, S>
where
    G: Fn() -> Result<T, PropertyError> + Send + Sync,
    S: Fn(T) -> Result<(), PropertyError> + Send + Sync,
{
    fn get(&self) -> Result<T, PropertyError> {
        (self.getter)()
    }

    fn set(&self, value: T) -> Result<(), PropertyError> {
        (self.setter)(value)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a property from a getter and a setter
pub fn property<T, G, S>(name: impl Into<String>, getter: G, setter: S) -> Arc<dyn Property<T>>
where
    T: 'static,
    G: Fn() -> Result<T, PropertyError> + Send + Sync + 'static,
    S: Fn(T) -> Result<(), PropertyError> + Send + Sync + 'static,
{
    Arc::new(FnProperty {
        name: name.into(),
        getter,
        setter,
    })
}

/// Build a write-only property; reading it is an error
pub fn setter_property<T, S>(name: impl Into<String>, setter: S) -> Arc<dyn Property<T>>
where
    T: 'static,
    S: Fn(T) -> Result<(), PropertyError> + Send + Sync + 'static,
{
    let name = name.into();
    let getter_name = name.clone();
    property(
        name,
        move || Err(PropertyError::new(getter_name.clone(), "property is write-only")),
        setter,
    )
}
