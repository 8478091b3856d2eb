//! Declarative descriptors consumed by admin and API layers.
//!
//! Both are pure functions of a synthesized schema plus the entity's
//! settings; nothing here touches storage.

pub mod admin;
pub mod api;

pub use admin::{AdminBinding, admin_binding};
pub use api::{ApiBinding, NestedSerializer, api_binding};

/// First letter upper-cased, the rest lower-cased.
pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::capitalize;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("task"), "Task");
        assert_eq!(capitalize("orderLine"), "Orderline");
        assert_eq!(capitalize(""), "");
    }
}
