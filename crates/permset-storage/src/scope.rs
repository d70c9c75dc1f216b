//! Canonical scope strings identifying one resource instance.
//!
//! A scope has the shape `<resource>:id:<resource_id>`, e.g. `datasources:id:1`.

const ID_ATTRIBUTE: &str = "id";
const SEPARATOR: char = ':';

/// Build the scope for a resource instance.
///
/// `resource_id` must not contain `:`; resource ids are validated upstream.
pub fn build_scope(resource: &str, resource_id: &str) -> String {
    format!("{resource}{SEPARATOR}{ID_ATTRIBUTE}{SEPARATOR}{resource_id}")
}

/// Split a scope back into `(resource, resource_id)`.
///
/// Returns `None` unless the scope has exactly three non-empty parts with `id`
/// in the middle.
pub fn parse_scope(scope: &str) -> Option<(&str, &str)> {
    let mut parts = scope.split(SEPARATOR);
    let resource = parts.next()?;
    let attribute = parts.next()?;
    let resource_id = parts.next()?;
    if parts.next().is_some()
        || attribute != ID_ATTRIBUTE
        || resource.is_empty()
        || resource_id.is_empty()
    {
        return None;
    }
    Some((resource, resource_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_scope() {
        assert_eq!(build_scope("datasources", "1"), "datasources:id:1");
        assert_eq!(build_scope("dashboards", "abc-123"), "dashboards:id:abc-123");
    }

    #[test]
    fn test_parse_scope() {
        assert_eq!(parse_scope("datasources:id:1"), Some(("datasources", "1")));
        assert_eq!(
            parse_scope(&build_scope("folders", "xyz")),
            Some(("folders", "xyz"))
        );
    }

    #[test]
    fn test_parse_scope_rejects_malformed() {
        assert_eq!(parse_scope(""), None);
        assert_eq!(parse_scope("datasources"), None);
        assert_eq!(parse_scope("datasources:id"), None);
        assert_eq!(parse_scope("datasources:uid:1"), None);
        assert_eq!(parse_scope("datasources:id:1:extra"), None);
        assert_eq!(parse_scope(":id:1"), None);
        assert_eq!(parse_scope("datasources:id:"), None);
        assert_eq!(parse_scope("datasources:*"), None);
    }
}
