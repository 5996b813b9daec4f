//! Translation of registry concept URIs into semantic URIs.
//!
//! A collection's semantic anchor looks like `SDN:L05`. A concept URI of the
//! form `<base>/collection/<C>/current/<ID>/` translates to `SDN:<C>::<ID>`,
//! which is how terms of other collections are keyed in the catalog.

/// Translate `target_uri` using the scheme of `anchor`.
///
/// Returns `None` when the anchor has no scheme or the URI does not follow
/// the registry's collection layout.
pub fn translate(target_uri: &str, anchor: &str) -> Option<String> {
    let (scheme, _) = anchor.split_once(':')?;
    if scheme.is_empty() {
        return None;
    }

    let segments: Vec<&str> = target_uri.split('/').filter(|s| !s.is_empty()).collect();
    let pos = segments.iter().rposition(|s| *s == "collection")?;
    match &segments[pos + 1..] {
        [collection, "current", id] => Some(format!("{scheme}:{collection}::{id}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_registry_uri() {
        assert_eq!(
            translate("http://vocab.nerc.ac.uk/collection/L22/current/TOOL0022/", "SDN:L05"),
            Some("SDN:L22::TOOL0022".to_string())
        );
        assert_eq!(
            translate("http://vocab.nerc.ac.uk/collection/P01/current/ALKYZZXX", "SDN:L05"),
            Some("SDN:P01::ALKYZZXX".to_string())
        );
    }

    #[test]
    fn test_translate_rejects_other_layouts() {
        assert_eq!(translate("http://x.org/concept/42", "SDN:L05"), None);
        assert_eq!(
            translate("http://vocab.nerc.ac.uk/collection/L22/current/", "SDN:L05"),
            None
        );
        assert_eq!(
            translate("http://vocab.nerc.ac.uk/collection/L22/2/TOOL0022/", "SDN:L05"),
            None
        );
    }

    #[test]
    fn test_translate_requires_anchor_scheme() {
        let uri = "http://vocab.nerc.ac.uk/collection/L22/current/TOOL0022/";
        assert_eq!(translate(uri, ""), None);
        assert_eq!(translate(uri, "L05"), None);
        assert_eq!(translate(uri, ":L05"), None);
    }
}
