//! Shared application state.

use std::sync::Arc;

use chrono_tz::Tz;
use pawfeed_storage::Storage;

use crate::auth::TokenSigner;
use crate::orchestrator::FeedOrchestrator;
use crate::voice::VoiceParser;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub orchestrator: FeedOrchestrator,
    pub tokens: TokenSigner,
    pub voice: Arc<VoiceParser>,
    pub timezone: Tz,
}

impl AppState {
    pub fn new(
        storage: Storage,
        orchestrator: FeedOrchestrator,
        tokens: TokenSigner,
        timezone: Tz,
    ) -> Self {
        Self {
            storage,
            orchestrator,
            tokens,
            voice: Arc::new(VoiceParser::new()),
            timezone,
        }
    }
}
