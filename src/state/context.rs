use crate::error::SessionError;

/// Identifiers for one play session, immutable once resolved.
///
/// `party_id` and `user_id` are fixed at construction; `creator_id` is
/// filled in by exactly one asynchronous resolution after the channel opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    party_id: String,
    user_id: Option<String>,
    creator_id: Option<String>,
}

impl SessionContext {
    /// Resolve the context from the join parameters and the persisted local
    /// identity.
    ///
    /// A missing or empty party id is terminal: the session can never start.
    /// A missing identity is not: the session degrades to an unauthenticated
    /// observer that sees events but cannot send commands.
    pub fn resolve(
        party_id: Option<String>,
        identity: Option<String>,
    ) -> Result<Self, SessionError> {
        let party_id = party_id
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingPartyId)?;

        Ok(Self {
            party_id,
            user_id: identity.filter(|id| !id.is_empty()),
            creator_id: None,
        })
    }

    /// The party this session plays in.
    pub fn party_id(&self) -> &str {
        &self.party_id
    }

    /// The authenticated local player, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The party creator, once resolved.
    pub fn creator_id(&self) -> Option<&str> {
        self.creator_id.as_deref()
    }

    /// Record the creator id fetched from the party metadata. Only the first
    /// resolution sticks.
    pub fn set_creator(&mut self, creator_id: String) {
        if self.creator_id.is_none() {
            self.creator_id = Some(creator_id);
        }
    }

    /// Whether the local player is the party creator. Requires the creator
    /// to be resolved; until then this is `false`.
    pub fn is_creator(&self) -> bool {
        match (&self.user_id, &self.creator_id) {
            (Some(user), Some(creator)) => user == creator,
            _ => false,
        }
    }
}
