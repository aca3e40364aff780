// shopifysync/src/shopify/pagination.rs
use regex::Regex;
use std::sync::LazyLock;

static PAGE_INFO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"page_info=([^&>;\s]+)").expect("valid page_info pattern"));

static REL_NEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"rel\s*=\s*"?next"?"#).expect("valid rel pattern"));

/// Extracts the `page_info` continuation token of the `rel="next"` entry in a
/// Shopify `Link` header.
///
/// Shopify sends both `previous` and `next` entries on middle pages and only
/// `previous` on the last page, so a token is returned only for the `next`
/// entry. Never fails: anything unparseable yields `None`.
pub fn parse_continuation_token(link_header: Option<&str>) -> Option<String> {
    let header = link_header?;

    header
        .split(',')
        .filter(|entry| REL_NEXT_RE.is_match(entry))
        .find_map(|entry| {
            PAGE_INFO_RE
                .captures(entry)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_token_extracted() {
        let header = r#"<https://test-store.myshopify.com/admin/api/2023-10/products.json?limit=10&page_info=ABC123>; rel="next""#;
        assert_eq!(parse_continuation_token(Some(header)), Some("ABC123".to_string()));
    }

    #[test]
    fn test_token_before_other_params() {
        let header = r#"<https://s.myshopify.com/admin/api/2023-10/orders.json?page_info=xyz-9_Q&limit=10>; rel="next""#;
        assert_eq!(parse_continuation_token(Some(header)), Some("xyz-9_Q".to_string()));
    }

    #[test]
    fn test_prefers_next_over_previous() {
        let header = concat!(
            r#"<https://s.myshopify.com/admin/api/2023-10/products.json?limit=10&page_info=PREV>; rel="previous", "#,
            r#"<https://s.myshopify.com/admin/api/2023-10/products.json?limit=10&page_info=NEXT>; rel="next""#
        );
        assert_eq!(parse_continuation_token(Some(header)), Some("NEXT".to_string()));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let header = r#"<https://s.myshopify.com/admin/api/2023-10/products.json?limit=10&page_info=PREV>; rel="previous""#;
        assert_eq!(parse_continuation_token(Some(header)), None);
    }

    #[test]
    fn test_absent_or_malformed_header() {
        assert_eq!(parse_continuation_token(None), None);
        assert_eq!(parse_continuation_token(Some("")), None);
        assert_eq!(parse_continuation_token(Some("garbage")), None);
        assert_eq!(parse_continuation_token(Some(r#"<https://x/products.json?limit=10>; rel="next""#)), None);
        assert_eq!(parse_continuation_token(Some(r#"<https://x/products.json?page_info=>; rel="next""#)), None);
    }

    #[test]
    fn test_unquoted_rel() {
        let header = "<https://x/products.json?page_info=tok>; rel=next";
        assert_eq!(parse_continuation_token(Some(header)), Some("tok".to_string()));
    }
}
