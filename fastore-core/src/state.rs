//! State Shapes
//!
//! A store holds one value of a type implementing [`State`]. Updates are
//! expressed as a `Patch`: a partial value merged one level deep into the
//! current state. Fields absent from the patch keep their value; fields
//! present are replaced wholesale, nested structure included.
//!
//! Two kinds of shape are supported out of the box:
//!
//! - Struct shapes declared with the [`state!`](crate::state) macro, which
//!   generates the patch type alongside the state type.
//! - Dynamic JSON shapes (`serde_json::Value`), patched with a JSON object.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// A value that can live in a store.
///
/// The serde bounds are what the durable snapshot format needs; a store
/// without persistence never exercises them.
pub trait State: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// A partial update. `Default` must be the empty patch.
    type Patch: Default + Send + 'static;

    /// Shallow-merge `patch` into `self`.
    fn merge(&mut self, patch: Self::Patch);
}

impl State for Value {
    type Patch = Map<String, Value>;

    fn merge(&mut self, patch: Self::Patch) {
        match self {
            Value::Object(fields) => {
                for (key, value) in patch {
                    fields.insert(key, value);
                }
            }
            // Spreading a non-object contributes no keys.
            other => *other = Value::Object(patch),
        }
    }
}

/// Declare a struct state together with its patch type.
///
/// ```rust,ignore
/// fastore_core::state! {
///     #[derive(Debug, PartialEq)]
///     pub struct Name / NamePatch {
///         pub first: String,
///         pub last: String,
///     }
/// }
///
/// let patch = NamePatch::default().first("Ada");
/// ```
///
/// The state type derives `Clone`, `Serialize` and `Deserialize`, so the
/// calling crate needs `serde` among its dependencies. The patch type has
/// one `Option` field per state field and a chained setter of the same
/// name.
#[macro_export]
macro_rules! state {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident / $patch:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, ::serde::Serialize, ::serde::Deserialize)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        #[derive(Clone, Default)]
        $vis struct $patch {
            $( $field_vis $field: ::core::option::Option<$ty>, )*
        }

        #[allow(dead_code)]
        impl $patch {
            $(
                pub fn $field(mut self, value: impl ::core::convert::Into<$ty>) -> Self {
                    self.$field = ::core::option::Option::Some(value.into());
                    self
                }
            )*

            /// True when the patch touches no field.
            pub fn is_empty(&self) -> bool {
                true $( && self.$field.is_none() )*
            }
        }

        impl $crate::State for $name {
            type Patch = $patch;

            fn merge(&mut self, patch: Self::Patch) {
                $(
                    if let ::core::option::Option::Some(value) = patch.$field {
                        self.$field = value;
                    }
                )*
            }
        }
    };
}
