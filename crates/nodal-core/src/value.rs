//! # Type System Seam
//!
//! The evaluator never inspects payloads. Everything it needs to know about
//! values goes through the [`TypeSystem`] trait:
//! - which declared socket types carry data at all (`is_supported`)
//! - what the default value of a type is (`default_value`)
//! - whether and how a value converts between types (`is_convertible`, `convert`)
//!
//! Values themselves are only cloned, moved and dropped.

use std::fmt;

/// The value/type system the evaluator is generic over.
///
/// Implementations are shared between worker threads, so the trait and both
/// associated types are `Send + Sync`.
pub trait TypeSystem: Send + Sync + 'static {
    /// A payload flowing between sockets.
    type Value: Clone + fmt::Debug + Send + Sync + 'static;

    /// The declared type of a socket.
    type DataType: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// The type of a concrete value.
    fn type_of(&self, value: &Self::Value) -> Self::DataType;

    /// Whether sockets of this type carry values the evaluator can move around.
    ///
    /// Sockets with an unsupported type are permanently unused.
    fn is_supported(&self, data_type: &Self::DataType) -> bool {
        let _ = data_type;
        true
    }

    /// The value an unlinked or unresolvable socket of this type receives.
    fn default_value(&self, data_type: &Self::DataType) -> Self::Value;

    /// Whether an implicit conversion from `from` to `to` exists.
    fn is_convertible(&self, from: &Self::DataType, to: &Self::DataType) -> bool;

    /// Convert `value` to `to`. Returns `None` when no conversion exists.
    fn convert(&self, value: &Self::Value, to: &Self::DataType) -> Option<Self::Value>;

    /// Convert `value` to `to`, falling back to the default of `to`.
    ///
    /// Returns the value and whether the fallback was taken.
    fn convert_or_default(&self, value: &Self::Value, to: &Self::DataType) -> (Self::Value, bool) {
        let from = self.type_of(value);
        if from == *to {
            return (value.clone(), false);
        }
        if self.is_convertible(&from, to) {
            if let Some(converted) = self.convert(value, to) {
                return (converted, false);
            }
        }
        (self.default_value(to), true)
    }
}
