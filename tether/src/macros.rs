//! Ergonomics macros.

/// Build a `Vec<serde_json::Value>` argument list from JSON-able
/// expressions.
///
/// ```
/// use tether::args;
///
/// let params = args![10, "text", {"nested": true}];
/// assert_eq!(params.len(), 3);
/// let empty = args![];
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<::serde_json::Value>::new()
    };
    ($($arg:tt),+ $(,)?) => {
        ::std::vec![$(::serde_json::json!($arg)),+]
    };
}
