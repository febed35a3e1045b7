//! ISP name heuristics
//!
//! The keyword groups are checked in order and the first group with a match
//! wins. ISP names routinely contain words from several groups
//! ("T-Mobile Cable"), so the order is part of the contract.

use super::ConnectionType;

const KEYWORD_GROUPS: &[(ConnectionType, &[&str])] = &[
    (
        ConnectionType::Cellular,
        &[
            "mobile",
            "cellular",
            "wireless",
            "lte",
            "5g",
            "t-mobile",
            "verizon wireless",
            "at&t mobility",
        ],
    ),
    (
        ConnectionType::Cable,
        &["cable", "comcast", "xfinity", "spectrum", "cox", "charter"],
    ),
    (
        ConnectionType::Fiber,
        &["fiber", "fios", "att fiber", "google fiber"],
    ),
    (ConnectionType::Dsl, &["dsl", "centurylink", "frontier"]),
];

/// Infer the connection type from an ISP name
pub fn classify_connection(isp: Option<&str>) -> ConnectionType {
    let Some(isp) = isp else {
        return ConnectionType::None;
    };

    let isp_lower = isp.to_lowercase();
    KEYWORD_GROUPS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| isp_lower.contains(kw)))
        .map(|(kind, _)| *kind)
        .unwrap_or(ConnectionType::Unknown)
}

/// Split a combined `"AS7922 Comcast Cable"` organization string
///
/// Returns `(asn, isp)`. The leading whitespace-delimited token is the ASN
/// only when it starts with the literal `AS`; otherwise the whole string is
/// the ISP name.
pub fn split_org(org: &str) -> (Option<String>, Option<String>) {
    let org = org.trim();
    if org.is_empty() {
        return (None, None);
    }

    if !org.starts_with("AS") {
        return (None, Some(org.to_string()));
    }

    match org.split_once(char::is_whitespace) {
        Some((asn, rest)) if !rest.trim().is_empty() => {
            (Some(asn.to_string()), Some(rest.trim().to_string()))
        }
        // Nothing after the ASN: the whole string doubles as the ISP name
        _ => {
            let asn = org.split_whitespace().next().unwrap_or(org);
            (Some(asn.to_string()), Some(org.to_string()))
        }
    }
}

/// First whitespace token of an `"AS7922 Comcast Cable Communications"` field
pub fn parse_asn_token(as_field: &str) -> Option<String> {
    as_field.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cellular_wins_over_cable() {
        assert_eq!(
            classify_connection(Some("Mobile Cable Networks")),
            ConnectionType::Cellular
        );
        assert_eq!(
            classify_connection(Some("Verizon Wireless")),
            ConnectionType::Cellular
        );
    }

    #[test]
    fn test_each_group() {
        assert_eq!(classify_connection(Some("Comcast")), ConnectionType::Cable);
        assert_eq!(
            classify_connection(Some("Verizon FiOS")),
            ConnectionType::Fiber
        );
        assert_eq!(
            classify_connection(Some("CenturyLink")),
            ConnectionType::Dsl
        );
    }

    #[test]
    fn test_unknown_vs_none() {
        assert_eq!(
            classify_connection(Some("Private Network LLC")),
            ConnectionType::Unknown
        );
        assert_eq!(classify_connection(None), ConnectionType::None);
    }

    #[test]
    fn test_split_org_with_asn() {
        let (asn, isp) = split_org("AS7922 Comcast Cable");
        assert_eq!(asn.as_deref(), Some("AS7922"));
        assert_eq!(isp.as_deref(), Some("Comcast Cable"));
    }

    #[test]
    fn test_split_org_without_asn() {
        let (asn, isp) = split_org("Private Network LLC");
        assert_eq!(asn, None);
        assert_eq!(isp.as_deref(), Some("Private Network LLC"));
    }

    #[test]
    fn test_split_org_bare_asn() {
        let (asn, isp) = split_org("AS15169");
        assert_eq!(asn.as_deref(), Some("AS15169"));
        assert_eq!(isp.as_deref(), Some("AS15169"));
    }

    #[test]
    fn test_split_org_empty() {
        assert_eq!(split_org(""), (None, None));
    }

    #[test]
    fn test_parse_asn_token() {
        assert_eq!(
            parse_asn_token("AS7922 Comcast Cable Communications, LLC").as_deref(),
            Some("AS7922")
        );
        assert_eq!(parse_asn_token("   "), None);
    }
}
