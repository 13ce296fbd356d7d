//! Lookup results.
//!
//! Every read, single or batched, yields a [`Lookup`]: either `Empty` or a
//! `Value`. The value's shape is fixed by the handler that produced it: a
//! unique-key index yields `Lookup<T>`, a non-unique index yields
//! `Lookup<Vec<T>>`. At the repository boundary, where both kinds are
//! dispatched by field name, the shapes are unified as [`Records<T>`].

use serde::{Deserialize, Serialize};

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookup<V> {
    Empty,
    Value(V),
}

impl<V> Lookup<V> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Borrow the stored value.
    ///
    /// # Panics
    ///
    /// Panics on `Empty`. Check [`Lookup::is_empty`] first or use
    /// [`Lookup::as_option`].
    pub fn value(&self) -> &V {
        match self {
            Self::Value(v) => v,
            Self::Empty => panic!("cannot get the value of an empty result"),
        }
    }

    /// Take the stored value.
    ///
    /// # Panics
    ///
    /// Panics on `Empty`.
    pub fn into_value(self) -> V {
        match self {
            Self::Value(v) => v,
            Self::Empty => panic!("cannot inject an empty result"),
        }
    }

    pub fn as_option(&self) -> Option<&V> {
        match self {
            Self::Value(v) => Some(v),
            Self::Empty => None,
        }
    }

    pub fn into_option(self) -> Option<V> {
        match self {
            Self::Value(v) => Some(v),
            Self::Empty => None,
        }
    }

    pub fn map<U, F: FnOnce(V) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Self::Value(v) => Lookup::Value(f(v)),
            Self::Empty => Lookup::Empty,
        }
    }
}

impl<V> From<Option<V>> for Lookup<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Empty,
        }
    }
}

/// Records found for one key, as seen through a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Records<T> {
    /// From a unique-key index.
    Single(T),
    /// From a non-unique-key index.
    Sequence(Vec<T>),
}

impl<T> Records<T> {
    pub fn as_single(&self) -> Option<&T> {
        match self {
            Self::Single(t) => Some(t),
            Self::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[T]> {
        match self {
            Self::Sequence(v) => Some(v),
            Self::Single(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Sequence(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Single(t) => vec![t],
            Self::Sequence(v) => v,
        }
    }
}

impl<T> Lookup<Records<T>> {
    /// The single record, or `None` for `Empty`.
    ///
    /// # Panics
    ///
    /// Panics if the lookup came from a non-unique index.
    pub fn into_single(self) -> Option<T> {
        match self {
            Self::Empty => None,
            Self::Value(Records::Single(t)) => Some(t),
            Self::Value(Records::Sequence(_)) => {
                panic!("cannot read a sequence result as a single record")
            }
        }
    }

    /// The record group, or an empty vec for `Empty`.
    ///
    /// # Panics
    ///
    /// Panics if the lookup came from a unique index.
    pub fn into_sequence(self) -> Vec<T> {
        match self {
            Self::Empty => Vec::new(),
            Self::Value(Records::Sequence(v)) => v,
            Self::Value(Records::Single(_)) => {
                panic!("cannot read a single-record result as a sequence")
            }
        }
    }
}

/// Flatten batched unique-key results, `None` standing in for `Empty`.
pub fn collect_single<T>(results: Vec<Lookup<Records<T>>>) -> Vec<Option<T>> {
    results.into_iter().map(Lookup::into_single).collect()
}

/// Flatten batched non-unique results, an empty vec standing in for `Empty`.
pub fn collect_sequences<T>(results: Vec<Lookup<Records<T>>>) -> Vec<Vec<T>> {
    results.into_iter().map(Lookup::into_sequence).collect()
}
