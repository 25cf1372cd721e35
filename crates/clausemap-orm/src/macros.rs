//! Typed wrappers over [`Instance`](crate::Instance).

/// Declares a typed handle for a mapped class.
///
/// Each field names an attribute and its setter. Getters return `None`
/// while the attribute is unset or does not convert to the field type.
///
/// ```rust
/// clausemap_orm::mapped_class! {
///     pub struct User: "User" {
///         user_id / set_user_id: i64,
///         user_name / set_user_name: String,
///     }
/// }
///
/// let user = User::new();
/// user.set_user_name("jack".to_string());
/// assert_eq!(user.user_name().as_deref(), Some("jack"));
/// assert_eq!(user.user_id(), None);
/// assert_eq!(user.instance().class(), User::CLASS);
/// ```
#[macro_export]
macro_rules! mapped_class {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $class:literal {
            $( $(#[$fmeta:meta])* $field:ident / $setter:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis struct $name($crate::Instance);

        impl $name {
            /// The mapped class.
            pub const CLASS: $crate::ClassId = $crate::ClassId::new($class);

            /// A new, untracked object.
            #[must_use]
            pub fn new() -> Self {
                Self($crate::Instance::new(Self::CLASS))
            }

            /// Wraps an instance, if it belongs to this class.
            #[must_use]
            pub fn wrap(instance: $crate::Instance) -> Option<Self> {
                if instance.class() == Self::CLASS {
                    Some(Self(instance))
                } else {
                    None
                }
            }

            /// The underlying instance.
            #[must_use]
            pub const fn instance(&self) -> &$crate::Instance {
                &self.0
            }

            $(
                $(#[$fmeta])*
                #[must_use]
                pub fn $field(&self) -> Option<$ty> {
                    self.0.get_as(stringify!($field))
                }

                #[allow(missing_docs)]
                pub fn $setter(&self, value: $ty) {
                    self.0.set(stringify!($field), value);
                }
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<$name> for $crate::Instance {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use clausemap_core::SqlValue;

    use crate::{ClassId, Instance};

    crate::mapped_class! {
        struct Keyword: "Keyword" {
            keyword_id / set_keyword_id: i64,
            name / set_name: String,
        }
    }

    #[test]
    fn test_accessors_read_instance_attributes() {
        let keyword = Keyword::new();
        keyword.set_keyword_id(3);
        keyword.set_name("blue".to_string());
        assert_eq!(keyword.instance().get("keyword_id"), Some(SqlValue::Int(3)));
        assert_eq!(keyword.name().as_deref(), Some("blue"));
    }

    #[test]
    fn test_wrap_checks_class() {
        assert!(Keyword::wrap(Instance::new(ClassId::new("Item"))).is_none());
        let raw = Instance::new(Keyword::CLASS);
        let keyword = Keyword::wrap(raw.clone()).unwrap();
        assert_eq!(Instance::from(keyword), raw);
    }
}
