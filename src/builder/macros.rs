//! Macros for ergonomic store state declaration.

/// Declare a record struct usable as store state.
///
/// Derives everything [`State`](crate::core::State) needs and implements it,
/// naming the state after the struct.
///
/// # Example
///
/// ```
/// use effect_store::state_record;
///
/// state_record! {
///     pub struct Profile {
///         pub name: String,
///         pub age: u32,
///     }
/// }
///
/// let store = effect_store::Store::new(Profile { name: "John".into(), age: 20 }).unwrap();
/// assert_eq!(store.value().age, 20);
/// ```
#[macro_export]
macro_rules! state_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }
        }
    };
}
