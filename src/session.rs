use anyhow::Result;
use tracing::info;

use crate::conversation::Conversation;
use crate::credential::{Credential, CredentialStore};

/// A validated credential together with the conversation it authorizes.
///
/// The stored key outlives the process; the conversation does not.
#[derive(Debug)]
pub struct Session {
    credential: Credential,
    conversation: Conversation,
}

impl Session {
    pub fn begin(credential: Credential) -> Self {
        Self {
            credential,
            conversation: Conversation::new(),
        }
    }

    /// Persists the credential, then begins a session with it.
    pub fn establish(store: &CredentialStore, credential: Credential) -> Result<Self> {
        store.save(credential.expose())?;
        info!(path = %store.path().display(), "Stored API key");
        Ok(Self::begin(credential))
    }

    /// Picks up a key stored by an earlier login, if there is one.
    pub fn resume(store: &CredentialStore) -> Result<Option<Self>> {
        Ok(store.load()?.map(|key| {
            info!("Resuming session from stored API key");
            Self::begin(Credential::new(key))
        }))
    }

    /// Ends the session and forgets the stored key.
    pub fn end(self, store: &CredentialStore) -> Result<()> {
        store.clear()?;
        info!(turns = self.conversation.len(), "Session ended");
        Ok(())
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }
}
