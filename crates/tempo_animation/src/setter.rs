//! Property setter targets
//!
//! [`PropertySetter`] is a [`TimingTarget`] that writes keyframe values into a
//! [`Property`] on every timing event.
//!
//! Two forms exist:
//!
//! - **Fixed**: the keyframes are known up front
//! - **To**: only the destination values are known; the property's value at
//!   `begin` becomes the first keyframe, so the animation always starts from
//!   wherever the property currently is

use crate::animator::{Animator, Direction};
use crate::error::TargetResult;
use crate::property::Property;
use crate::target::TimingTarget;
use parking_lot::RwLock;
use std::sync::Arc;
use tempo_core::{ConfigError, EvaluatorRegistry, KeyFrames, KeyFramesBuilder, SharedEvaluator, SharedInterpolator};

struct ToFrames<T> {
    values: Vec<T>,
    interpolator: Option<SharedInterpolator>,
    evaluator: SharedEvaluator<T>,
}

/// Timing target animating one property through keyframes
pub struct PropertySetter<T> {
    property: Arc<dyn Property<T>>,
    keyframes: RwLock<Option<Arc<KeyFrames<T>>>>,
    to: Option<ToFrames<T>>,
}

impl<T> PropertySetter<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Animate `property` through `keyframes`
    pub fn new(property: Arc<dyn Property<T>>, keyframes: KeyFrames<T>) -> Self {
        Self {
            property,
            keyframes: RwLock::new(Some(Arc::new(keyframes))),
            to: None,
        }
    }

    /// Animate `property` through `values` with auto-distributed times
    pub fn from_values<I>(property: Arc<dyn Property<T>>, values: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
    {
        Ok(Self::new(property, KeyFrames::from_values(values)?))
    }

    /// Animate `property` from its value at `begin` through `values`
    pub fn to<I>(property: Arc<dyn Property<T>>, values: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
    {
        Self::to_frames(property, None, values)
    }

    /// As [`to`](Self::to), with `interpolator` on every segment
    pub fn to_with<I>(
        property: Arc<dyn Property<T>>,
        interpolator: SharedInterpolator,
        values: I,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
    {
        Self::to_frames(property, Some(interpolator), values)
    }

    fn to_frames<I>(
        property: Arc<dyn Property<T>>,
        interpolator: Option<SharedInterpolator>,
        values: I,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        if values.is_empty() {
            return Err(ConfigError::TooFewFrames { count: 1 });
        }
        let evaluator = EvaluatorRegistry::builtin().resolve::<T>()?;

        Ok(Self {
            property,
            keyframes: RwLock::new(None),
            to: Some(ToFrames {
                values,
                interpolator,
                evaluator,
            }),
        })
    }

    /// Whether the first keyframe is read from the property at `begin`
    pub fn is_to_animation(&self) -> bool {
        self.to.is_some()
    }

    pub fn property(&self) -> &Arc<dyn Property<T>> {
        &self.property
    }

    /// Keyframes in use; None for a "to" animation that hasn't begun
    pub fn keyframes(&self) -> Option<Arc<KeyFrames<T>>> {
        self.keyframes.read().clone()
    }
}

impl<T> TimingTarget for PropertySetter<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn begin(&self, _source: &Animator) -> TargetResult {
        let Some(to) = &self.to else {
            return Ok(());
        };

        let start = self.property.get()?;
        let mut builder = KeyFramesBuilder::with_start(start)
            .add_frames(to.values.iter().cloned())
            .set_shared_evaluator(Arc::clone(&to.evaluator));
        if let Some(interpolator) = &to.interpolator {
            builder = builder.set_interpolator(Arc::clone(interpolator));
        }
        *self.keyframes.write() = Some(Arc::new(builder.build()?));
        Ok(())
    }

    fn timing_event(&self, _source: &Animator, fraction: f64, _direction: Direction) -> TargetResult {
        let Some(keyframes) = self.keyframes() else {
            tracing::warn!(
                "PropertySetter for `{}` got a timing event before begin",
                self.property.name()
            );
            return Ok(());
        };
        self.property.set(keyframes.interpolated_value_at(fraction))?;
        Ok(())
    }
}
