/// Decomposition of an email address into the parts used for routing.
///
/// The `subdomains` field holds the domain labels without the top label,
/// so `user@mail.example.com` yields `["mail", "example"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    /// Portion of the address before the first `@`.
    pub local: String,

    /// Portion of the address after the first `@`.
    pub domain: String,

    /// Domain labels excluding the top label, in order.
    pub subdomains: Vec<String>,
}

impl ParsedAddress {
    /// Parses a raw address, returning `None` when there is no `@` separator.
    ///
    /// A display-name form such as `Jane Doe <jane@example.com>` is reduced
    /// to its address part before splitting. The split happens on the first
    /// `@`, everything after it is the domain.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let address = relaymail_core::ParsedAddress::parse("color@blue.com").unwrap();
    /// assert_eq!(address.local, "color");
    /// assert_eq!(address.domain, "blue.com");
    /// assert_eq!(address.subdomains, vec!["blue".to_string()]);
    /// ```
    ///
    /// ```rust
    /// assert!(relaymail_core::ParsedAddress::parse("not an email").is_none());
    /// ```
    pub fn parse(address: &str) -> Option<Self> {
        let spec = addr_spec(address);
        let (local, domain) = spec.split_once('@')?;
        let mut labels = domain.split('.').map(str::to_string).collect::<Vec<_>>();
        labels.pop();
        Some(Self {
            local: local.to_string(),
            domain: domain.to_string(),
            subdomains: labels,
        })
    }

    /// Returns the bare `local@domain` form of the address.
    pub fn address(&self) -> String {
        format!("{}@{}", self.local, self.domain)
    }

    /// Returns the domain followed by each of its parent domains, most
    /// specific first, stopping before the top label.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let address = relaymail_core::ParsedAddress::parse("a@mail.example.com").unwrap();
    /// assert_eq!(address.domain_chain(), vec!["mail.example.com", "example.com"]);
    /// ```
    pub fn domain_chain(&self) -> Vec<String> {
        let top = match self.domain.rsplit_once('.') {
            Some((_, top)) => top,
            None => return vec![self.domain.clone()],
        };
        (0..self.subdomains.len())
            .map(|index| format!("{}.{}", self.subdomains[index..].join("."), top))
            .collect()
    }
}

/// Extracts the address inside angle brackets when present, otherwise
/// returns the trimmed input.
fn addr_spec(address: &str) -> &str {
    let trimmed = address.trim();
    if let Some(start) = trimmed.rfind('<') {
        if let Some(end) = trimmed[start..].find('>') {
            return trimmed[start + 1..start + end].trim();
        }
    }
    trimmed
}
