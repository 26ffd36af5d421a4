use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::{InboundEnvelope, ParsedAddress};

/// Address translation tables, each keyed uniquely.
///
/// Lookups consult the tables in precedence order: exact address, then
/// domain to address, then domain to domain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressMapping {
    /// Exact address to address overrides.
    #[serde(default)]
    pub exact: HashMap<String, String>,

    /// Every address at the domain goes to one fixed address.
    #[serde(default)]
    pub domain_to_address: HashMap<String, String>,

    /// Rewrites only the domain, keeping the local part.
    #[serde(default)]
    pub domain_to_domain: HashMap<String, String>,
}

/// The type of match for a translation rule, ordered by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchType {
    /// Matches an exact email address (e.g. "admin@example.com").
    ExactAddress,
    /// Matches all users at a domain and maps them to one address.
    DomainToAddress,
    /// Matches all users at a domain and rewrites the domain only.
    DomainToDomain,
}

/// A single translation rule mapping a pattern to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    pub match_type: MatchType,
    pub pattern: String,
    pub target: String,
}

impl RoutingRule {
    /// Tests if this rule matches the given parsed address.
    pub fn matches(&self, address: &ParsedAddress) -> bool {
        match self.match_type {
            MatchType::ExactAddress => address.address().eq_ignore_ascii_case(&self.pattern),
            MatchType::DomainToAddress | MatchType::DomainToDomain => {
                address.domain.eq_ignore_ascii_case(&self.pattern)
            }
        }
    }

    /// Produces the destination address for an address this rule matches.
    pub fn apply(&self, address: &ParsedAddress) -> String {
        match self.match_type {
            MatchType::ExactAddress | MatchType::DomainToAddress => self.target.clone(),
            MatchType::DomainToDomain => format!("{}@{}", address.local, self.target),
        }
    }
}

/// Translated recipient lists, in the order of the original lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRecipients {
    pub to: Vec<String>,
    pub cc: Vec<String>,
}

impl ResolvedRecipients {
    /// Returns whether no address resolved at all.
    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.cc.is_empty()
    }

    /// Returns all resolved addresses, "to" entries first.
    pub fn all(&self) -> Vec<&str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Translates recipient addresses according to an [`AddressMapping`].
///
/// Rules are evaluated in precedence order: exact address > domain to
/// address > domain to domain. If no rule matches, the address has no
/// destination.
pub struct AddressRouter {
    rules: Vec<RoutingRule>,
}

impl std::fmt::Debug for AddressRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressRouter")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl AddressRouter {
    /// Creates a new [`AddressRouter`] from the given mapping tables.
    ///
    /// Rules are sorted by precedence (exact > domain to address > domain
    /// to domain), then by pattern so the order is deterministic.
    pub fn new(mapping: &AddressMapping) -> Self {
        let tables = [
            (MatchType::ExactAddress, &mapping.exact),
            (MatchType::DomainToAddress, &mapping.domain_to_address),
            (MatchType::DomainToDomain, &mapping.domain_to_domain),
        ];
        let mut rules = tables
            .into_iter()
            .flat_map(|(match_type, table)| {
                table.iter().map(move |(pattern, target)| RoutingRule {
                    match_type,
                    pattern: pattern.clone(),
                    target: target.clone(),
                })
            })
            .collect::<Vec<_>>();
        rules.sort_by(|a, b| {
            a.match_type
                .cmp(&b.match_type)
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        Self { rules }
    }

    /// Returns the ordered rule list.
    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// Resolves the destination for a single address.
    ///
    /// Addresses without an `@` separator have no destination.
    pub fn resolve(&self, address: &str) -> Option<String> {
        let parsed = ParsedAddress::parse(address)?;
        let rule = self.rules.iter().find(|rule| rule.matches(&parsed))?;
        Some(rule.apply(&parsed))
    }

    /// Resolves every "to" and "cc" address of the envelope independently,
    /// dropping the ones without a destination.
    pub fn resolve_all(&self, envelope: &InboundEnvelope) -> ResolvedRecipients {
        ResolvedRecipients {
            to: self.resolve_list(&envelope.to),
            cc: self.resolve_list(&envelope.cc),
        }
    }

    fn resolve_list(&self, addresses: &[String]) -> Vec<String> {
        addresses
            .iter()
            .filter_map(|address| {
                let resolved = self.resolve(address);
                debug!(
                    address = %address,
                    resolved = resolved.as_deref().unwrap_or("-"),
                    "Resolved recipient"
                );
                resolved
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mapping() -> AddressMapping {
        AddressMapping {
            exact: HashMap::from([(
                "sint@castle.es".to_string(),
                "santa@north.pole".to_string(),
            )]),
            domain_to_address: HashMap::from([(
                "world.com".to_string(),
                "hello@world.com".to_string(),
            )]),
            domain_to_domain: HashMap::from([("blue.com".to_string(), "red.com".to_string())]),
        }
    }

    #[test]
    fn test_resolve_sample_mapping() {
        let router = AddressRouter::new(&sample_mapping());
        assert_eq!(
            router.resolve("sint@castle.es").as_deref(),
            Some("santa@north.pole")
        );
        assert_eq!(
            router.resolve("goodbye@world.com").as_deref(),
            Some("hello@world.com")
        );
        assert_eq!(
            router.resolve("color@blue.com").as_deref(),
            Some("color@red.com")
        );
        assert_eq!(router.resolve("unknown@email.com"), None);
        assert_eq!(router.resolve("not an email"), None);
    }

    #[test]
    fn test_exact_address_wins_over_domains() {
        let mapping = AddressMapping {
            exact: HashMap::from([(
                "boss@world.com".to_string(),
                "ceo@corp.com".to_string(),
            )]),
            domain_to_address: HashMap::from([(
                "world.com".to_string(),
                "hello@world.com".to_string(),
            )]),
            domain_to_domain: HashMap::from([(
                "world.com".to_string(),
                "planet.com".to_string(),
            )]),
        };
        let router = AddressRouter::new(&mapping);

        assert_eq!(router.resolve("boss@world.com").as_deref(), Some("ceo@corp.com"));
        assert_eq!(
            router.resolve("other@world.com").as_deref(),
            Some("hello@world.com")
        );
    }

    #[test]
    fn test_domain_to_address_wins_over_domain_to_domain() {
        let mapping = AddressMapping {
            domain_to_address: HashMap::from([(
                "shared.com".to_string(),
                "inbox@shared.com".to_string(),
            )]),
            domain_to_domain: HashMap::from([(
                "shared.com".to_string(),
                "other.com".to_string(),
            )]),
            ..Default::default()
        };
        let router = AddressRouter::new(&mapping);

        assert_eq!(
            router.resolve("anyone@shared.com").as_deref(),
            Some("inbox@shared.com")
        );
    }

    #[test]
    fn test_rules_sorted_by_precedence() {
        let router = AddressRouter::new(&sample_mapping());
        let types = router
            .rules()
            .iter()
            .map(|rule| rule.match_type)
            .collect::<Vec<_>>();
        assert_eq!(
            types,
            vec![
                MatchType::ExactAddress,
                MatchType::DomainToAddress,
                MatchType::DomainToDomain
            ]
        );
    }

    #[test]
    fn test_resolve_case_insensitive_keeps_local_part() {
        let router = AddressRouter::new(&sample_mapping());
        assert_eq!(
            router.resolve("SINT@Castle.ES").as_deref(),
            Some("santa@north.pole")
        );
        assert_eq!(
            router.resolve("Color@BLUE.com").as_deref(),
            Some("Color@red.com")
        );
    }

    #[test]
    fn test_resolve_display_name() {
        let router = AddressRouter::new(&sample_mapping());
        assert_eq!(
            router.resolve("Sint <sint@castle.es>").as_deref(),
            Some("santa@north.pole")
        );
    }

    #[test]
    fn test_resolve_subdomain_does_not_match_domain() {
        let router = AddressRouter::new(&sample_mapping());
        assert_eq!(router.resolve("color@sub.blue.com"), None);
    }

    #[test]
    fn test_resolve_idempotent() {
        let router = AddressRouter::new(&sample_mapping());
        for address in ["sint@castle.es", "color@blue.com", "unknown@email.com"] {
            assert_eq!(router.resolve(address), router.resolve(address));
        }
    }

    #[test]
    fn test_resolve_all_preserves_order_and_drops_unmapped() {
        let router = AddressRouter::new(&sample_mapping());
        let envelope = InboundEnvelope {
            to: vec![
                "sint@castle.es".to_string(),
                "goodbye@world.com".to_string(),
                "unknown@email.com".to_string(),
            ],
            cc: vec![
                "apple@blue.com".to_string(),
                "unknown@courier.com".to_string(),
            ],
            ..Default::default()
        };

        let resolved = router.resolve_all(&envelope);

        assert_eq!(resolved.to, vec!["santa@north.pole", "hello@world.com"]);
        assert_eq!(resolved.cc, vec!["apple@red.com"]);
        assert!(!resolved.is_empty());
        assert_eq!(
            resolved.all(),
            vec!["santa@north.pole", "hello@world.com", "apple@red.com"]
        );
    }

    #[test]
    fn test_resolve_all_empty() {
        let router = AddressRouter::new(&sample_mapping());
        let envelope = InboundEnvelope {
            to: vec!["unknown@guardian.com".to_string()],
            ..Default::default()
        };
        assert!(router.resolve_all(&envelope).is_empty());
    }
}
