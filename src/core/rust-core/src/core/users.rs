use serde::{Deserialize, Serialize};

/// Claim type constants.
pub mod claims {
    /// The role claim type.
    pub const ROLE: &str = "role";

    /// The administrator role value.
    pub const ADMINISTRATOR: &str = "Administrator";

    /// Grants read access to catalogs whose identifier matches the claim
    /// value, literally or as a regular expression.
    pub const CAN_READ_CATALOG: &str = "CanReadCatalog";

    /// Grants write access to catalogs whose identifier matches the claim
    /// value, literally or as a regular expression.
    pub const CAN_WRITE_CATALOG: &str = "CanWriteCatalog";

    /// Grants read access to catalogs with a matching group membership.
    pub const CAN_READ_CATALOG_GROUP: &str = "CanReadCatalogGroup";

    /// Grants write access to catalogs with a matching group membership.
    pub const CAN_WRITE_CATALOG_GROUP: &str = "CanWriteCatalogGroup";

    /// Restricts which catalog identifiers a session may see at all.
    pub const ENABLED_CATALOGS_PATTERN: &str = "EnabledCatalogsPattern";

    /// The claim type prefix of a personal access token identity.
    pub const PAT_PREFIX: &str = "pat_";

    /// The claim type prefix under which the owning user's claims are
    /// re-issued on a personal access token identity.
    pub const PAT_USER_PREFIX: &str = "pat_user_";

    /// Maps a claim type into the personal access token namespace.
    pub fn to_pat_claim_type(claim_type: &str) -> String {
        format!("{PAT_PREFIX}{claim_type}")
    }

    /// Maps a claim type into the personal access token user namespace.
    pub fn to_pat_user_claim_type(claim_type: &str) -> String {
        format!("{PAT_USER_PREFIX}{claim_type}")
    }
}

/// A single claim of a user or token.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NexusClaim {
    /// The claim type.
    pub r#type: String,

    /// The claim value.
    pub value: String,
}

impl NexusClaim {
    /// Creates a claim.
    pub fn new(r#type: impl Into<String>, value: impl Into<String>) -> Self {
        NexusClaim {
            r#type: r#type.into(),
            value: value.into(),
        }
    }
}

/// A user as provided by the user database.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NexusUser {
    /// The unique user identifier.
    pub id: String,

    /// The display name.
    pub name: String,

    /// The claims of the user.
    pub claims: Vec<NexusClaim>,
}

impl NexusUser {
    /// Creates a user.
    pub fn new(id: impl Into<String>, name: impl Into<String>, claims: Vec<NexusClaim>) -> Self {
        NexusUser {
            id: id.into(),
            name: name.into(),
            claims,
        }
    }

    /// Whether the user carries the administrator role.
    pub fn is_admin(&self) -> bool {
        self.claims.iter().any(|claim| {
            claim.r#type == claims::ROLE && claim.value == claims::ADMINISTRATOR
        })
    }
}

/// The authenticated caller of a request: either a user session or a
/// personal access token acting for a user.
#[derive(Clone, Debug)]
pub struct NexusPrincipal {
    user_id: String,
    claims: Vec<NexusClaim>,
}

impl NexusPrincipal {
    /// A principal for an interactive user session.
    pub fn for_user(user: &NexusUser) -> Self {
        NexusPrincipal {
            user_id: user.id.clone(),
            claims: user.claims.clone(),
        }
    }

    /// A principal for a personal access token. The token claims move into
    /// the `pat_*` namespace and the owning user's claims are re-issued
    /// under `pat_user_*`.
    pub fn for_personal_access_token(user: &NexusUser, token_claims: &[NexusClaim]) -> Self {
        let mut all_claims = Vec::with_capacity(token_claims.len() + user.claims.len());

        for claim in token_claims {
            all_claims.push(NexusClaim::new(
                claims::to_pat_claim_type(&claim.r#type),
                claim.value.clone(),
            ));
        }

        for claim in &user.claims {
            all_claims.push(NexusClaim::new(
                claims::to_pat_user_claim_type(&claim.r#type),
                claim.value.clone(),
            ));
        }

        NexusPrincipal {
            user_id: user.id.clone(),
            claims: all_claims,
        }
    }

    /// The identifier of the (owning) user.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// All claims of this principal.
    pub fn claims(&self) -> &[NexusClaim] {
        &self.claims
    }

    /// The values of all claims of the given type.
    pub fn claim_values<'a>(&'a self, claim_type: &str) -> impl Iterator<Item = &'a str> {
        self.claims
            .iter()
            .filter(move |claim| claim.r#type == claim_type)
            .map(|claim| claim.value.as_str())
    }

    /// Whether the principal has the given claim.
    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|claim| claim.r#type == claim_type && claim.value == value)
    }
}
