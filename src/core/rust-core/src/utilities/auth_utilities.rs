use regex::Regex;

use crate::core::{NexusPrincipal, claims};

/// A claim value interpreted as a literal match or, when it compiles, as a
/// regular expression.
#[derive(Debug)]
pub struct ClaimPattern {
    literal: String,
    regex: Option<Regex>,
}

impl ClaimPattern {
    /// Compiles the claim value.
    pub fn new(value: &str) -> Self {
        ClaimPattern {
            literal: value.to_string(),
            regex: Regex::new(value).ok(),
        }
    }

    /// Whether the pattern matches the candidate.
    pub fn matches(&self, candidate: &str) -> bool {
        if self.literal == candidate {
            return true;
        }

        self.regex
            .as_ref()
            .is_some_and(|regex| regex.is_match(candidate))
    }
}

/// The precomputed catalog permissions of one principal. Authorization
/// checks run once per enumerated catalog, so the claim set is compiled
/// ahead of time and admin status short-circuits.
#[derive(Debug)]
pub struct CatalogPermissions {
    is_admin: bool,
    read: Vec<ClaimPattern>,
    read_groups: Vec<ClaimPattern>,
    write: Vec<ClaimPattern>,
    write_groups: Vec<ClaimPattern>,
    enabled: Vec<ClaimPattern>,
}

impl CatalogPermissions {
    /// Compiles the permissions of the given principal. Personal access
    /// token principals carry their claims in the `pat_*` / `pat_user_*`
    /// namespaces; the admin role requires both the token and the user to
    /// claim it.
    pub fn from_principal(principal: &NexusPrincipal) -> Self {
        let is_admin = principal.has_claim(claims::ROLE, claims::ADMINISTRATOR)
            || (principal.has_claim(
                &claims::to_pat_claim_type(claims::ROLE),
                claims::ADMINISTRATOR,
            ) && principal.has_claim(
                &claims::to_pat_user_claim_type(claims::ROLE),
                claims::ADMINISTRATOR,
            ));

        CatalogPermissions {
            is_admin,
            read: Self::collect_patterns(principal, claims::CAN_READ_CATALOG),
            read_groups: Self::collect_patterns(principal, claims::CAN_READ_CATALOG_GROUP),
            write: Self::collect_patterns(principal, claims::CAN_WRITE_CATALOG),
            write_groups: Self::collect_patterns(principal, claims::CAN_WRITE_CATALOG_GROUP),
            enabled: Self::collect_patterns(principal, claims::ENABLED_CATALOGS_PATTERN),
        }
    }

    fn collect_patterns(principal: &NexusPrincipal, claim_type: &str) -> Vec<ClaimPattern> {
        let pat_user_claim_type = claims::to_pat_user_claim_type(claim_type);

        principal
            .claim_values(claim_type)
            .chain(principal.claim_values(&pat_user_claim_type))
            .map(ClaimPattern::new)
            .collect()
    }

    /// Whether the principal is an administrator.
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Whether the session may see the catalog at all.
    pub fn is_enabled(&self, catalog_id: &str) -> bool {
        self.enabled.is_empty()
            || self
                .enabled
                .iter()
                .any(|pattern| pattern.matches(catalog_id))
    }

    /// Whether the principal may read the catalog. Ownerless catalogs are
    /// public and readable by everyone the enabled pattern admits.
    pub fn can_read(&self, catalog_id: &str, groups: &[String], has_owner: bool) -> bool {
        if !self.is_enabled(catalog_id) {
            return false;
        }

        if self.is_admin || !has_owner {
            return true;
        }

        if self.read.iter().any(|pattern| pattern.matches(catalog_id)) {
            return true;
        }

        groups.iter().any(|group| {
            self.read_groups
                .iter()
                .any(|pattern| pattern.matches(group))
        })
    }

    /// Whether the principal may write the catalog. Unlike reads there is no
    /// public access rule.
    pub fn can_write(&self, catalog_id: &str, groups: &[String]) -> bool {
        if !self.is_enabled(catalog_id) {
            return false;
        }

        if self.is_admin {
            return true;
        }

        if self.write.iter().any(|pattern| pattern.matches(catalog_id)) {
            return true;
        }

        groups.iter().any(|group| {
            self.write_groups
                .iter()
                .any(|pattern| pattern.matches(group))
        })
    }
}
