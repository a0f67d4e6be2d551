//! Value evaluators and the per-type evaluator registry
//!
//! An [`Evaluator`] blends two values of one concrete type. Keyframes resolve
//! their evaluator once, at build time, by exact type match against an
//! [`EvaluatorRegistry`].

use crate::error::{ConfigError, Result};
use crate::values::Interpolate;
use rustc_hash::FxHashMap;
use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

/// Blends two values of type `T`
///
/// Implementations must return `start` at fraction 0 and `end` at fraction 1.
pub trait Evaluator<T>: Send + Sync {
    fn evaluate(&self, start: &T, end: &T, fraction: f64) -> T;
}

/// Shared, type-erased evaluator for `T`
pub type SharedEvaluator<T> = Arc<dyn Evaluator<T>>;

impl<T, F> Evaluator<T> for F
where
    F: Fn(&T, &T, f64) -> T + Send + Sync,
{
    fn evaluate(&self, start: &T, end: &T, fraction: f64) -> T {
        self(start, end, fraction)
    }
}

/// Evaluator delegating to the value's own [`Interpolate::lerp`]
pub struct LerpEvaluator<T>(PhantomData<fn() -> T>);

impl<T> LerpEvaluator<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for LerpEvaluator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Interpolate> Evaluator<T> for LerpEvaluator<T> {
    fn evaluate(&self, start: &T, end: &T, fraction: f64) -> T {
        start.lerp(end, fraction)
    }
}

/// Exact-type lookup table from value type to evaluator
///
/// Each entry stores a boxed `SharedEvaluator<T>` keyed by `TypeId::of::<T>()`.
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl EvaluatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the stock [`Interpolate`] types
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        macro_rules! register_all {
            ($($ty:ty),* $(,)?) => {
                $( registry.register_interpolate::<$ty>(); )*
            };
        }
        register_all!(
            f32, f64, i8, i16, i32, i64, u8, u16, u32, u64, isize, usize,
            (f32, f32), (f64, f64),
            [f32; 2], [f32; 3], [f32; 4],
            [f64; 2], [f64; 3], [f64; 4],
        );
        registry
    }

    /// Shared, immutable registry holding the stock evaluators
    ///
    /// Used by [`KeyFramesBuilder::build`](crate::KeyFramesBuilder::build).
    /// Callers that need additional types build their own registry and use
    /// `build_with`.
    pub fn builtin() -> &'static EvaluatorRegistry {
        static BUILTIN: OnceLock<EvaluatorRegistry> = OnceLock::new();
        BUILTIN.get_or_init(EvaluatorRegistry::with_defaults)
    }

    /// Register (or replace) the evaluator for `T`
    pub fn register<T, E>(&mut self, evaluator: E) -> &mut Self
    where
        T: 'static,
        E: Evaluator<T> + 'static,
    {
        let shared: SharedEvaluator<T> = Arc::new(evaluator);
        if self
            .evaluators
            .insert(TypeId::of::<T>(), Box::new(shared))
            .is_some()
        {
            tracing::debug!("EvaluatorRegistry: replaced evaluator for {}", type_name::<T>());
        }
        self
    }

    /// Register the [`LerpEvaluator`] for an [`Interpolate`] type
    pub fn register_interpolate<T: Interpolate>(&mut self) -> &mut Self {
        self.register::<T, _>(LerpEvaluator::<T>::new())
    }

    /// Check whether an evaluator for `T` is registered
    pub fn contains<T: 'static>(&self) -> bool {
        self.evaluators.contains_key(&TypeId::of::<T>())
    }

    /// Get the evaluator for `T`, if registered
    pub fn get<T: 'static>(&self) -> Option<SharedEvaluator<T>> {
        self.evaluators
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<SharedEvaluator<T>>())
            .cloned()
    }

    /// Resolve the evaluator for `T` or fail with a configuration error
    pub fn resolve<T: 'static>(&self) -> Result<SharedEvaluator<T>> {
        self.get::<T>().ok_or(ConfigError::MissingEvaluator {
            type_name: type_name::<T>(),
        })
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}
