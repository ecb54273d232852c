//! Record types.
//!
//! A record type names its storage relation and lists its fields. The
//! [`model!`](crate::model!) macro declares both at compile time, together
//! with typed [`Field`](crate::query::Field) handles for the query builder.

use crate::error::Result;
use crate::types::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Name and field list of a record type, as the repo layer sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Schema {
    /// Storage relation and change-event key.
    pub name: &'static str,
    /// Fields in projection/insert order.
    pub fields: &'static [&'static str],
}

impl Schema {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }
}

/// A typed record stored in one relation.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable relation name.
    const NAME: &'static str;

    /// Field names in declaration order.
    const FIELDS: &'static [&'static str];

    fn schema() -> Schema {
        Schema {
            name: Self::NAME,
            fields: Self::FIELDS,
        }
    }

    fn to_row(&self) -> Result<Row> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(row) => Ok(row),
            other => Err(crate::error::SyncError::Serialization(format!(
                "{} did not serialize to an object: {}",
                Self::NAME,
                other
            ))),
        }
    }

    fn from_row(row: Row) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(row))?)
    }
}

/// Declare a record type.
///
/// Each field is followed by `=> CONST`, the name of the typed field handle
/// generated for queries. Derive `Serialize` and `Deserialize` yourself.
///
/// ```
/// use livesync::model;
/// use livesync::model::Model;
/// use serde::{Deserialize, Serialize};
///
/// model! {
///     #[derive(Clone, Debug, Serialize, Deserialize)]
///     pub struct Product {
///         pub id: String => ID,
///         pub name: String => NAME_FIELD,
///         pub price: f64 => PRICE,
///     }
/// }
///
/// assert_eq!(Product::NAME, "Product");
/// assert_eq!(Product::FIELDS, &["id", "name", "price"]);
/// assert_eq!(Product::PRICE.name(), "price");
/// ```
#[macro_export]
macro_rules! model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty => $handle:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::model::Model for $name {
            const NAME: &'static str = stringify!($name);
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];
        }

        #[allow(dead_code)]
        impl $name {
            $(
                pub const $handle: $crate::query::Field<$name, $ty> =
                    $crate::query::Field::new(stringify!($field));
            )*

            /// Start a typed query over this record type.
            pub fn query() -> $crate::query::QueryBuilder<$name> {
                $crate::query::QueryBuilder::new()
            }
        }
    };
}
