pub mod artifacts;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod inputs;
pub mod poller;
pub mod transport;

#[cfg(test)]
mod testing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use atelier_contracts::conversation::{ChatFlags, Conversation, Turn};
use atelier_contracts::events::{EventLog, EventPayload};
use atelier_contracts::models::{ModelRole, ModelRoster, ModelSelector};
use atelier_contracts::requests::{
    require_text, AnalyzeRequest, Artifact, GenerationRequest, ImageEditRequest,
    ImageGenerateRequest, RefineRequest, VideoRequest,
};
use atelier_contracts::{StudioError, StudioResult};
use serde_json::json;

pub use config::StudioConfig;
pub use credentials::{
    acquire_credential, Credential, CredentialGate, EnvCredentialGate, StaticCredentialGate,
};
pub use dispatcher::Dispatcher;
pub use poller::{CancelToken, JobHandle, JobPoller, PollClock, PollPolicy, ResolvedJob, SystemClock};
pub use transport::{FetchedArtifact, GeminiTransport, ProviderTransport};

/// Latest result shown to the user. Every operation replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioOutput {
    Text(String),
    Artifact(Artifact),
}

/// One interactive session: conversation, credential and the current output.
pub struct Studio {
    dispatcher: Dispatcher,
    gate: Box<dyn CredentialGate>,
    credential: Option<Credential>,
    clock: Box<dyn PollClock>,
    poll: PollPolicy,
    events: EventLog,
    out_dir: PathBuf,
    conversation: Conversation,
    current: Option<StudioOutput>,
}

impl Studio {
    pub fn new(
        config: &StudioConfig,
        gate: Box<dyn CredentialGate>,
        events: EventLog,
        out_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let roster = ModelRoster::resolve(&ModelSelector::default(), &config.model_overrides)
            .map_err(|err| anyhow!("model roster: {err}"))?;
        for reason in roster.fallback_reasons() {
            tracing::warn!("model fallback: {reason}");
        }
        let transport: Arc<dyn ProviderTransport> = Arc::new(GeminiTransport::new(config));
        Ok(Self::with_transport(
            transport,
            roster,
            gate,
            events,
            config.poll,
            out_dir,
        ))
    }

    pub fn with_transport(
        transport: Arc<dyn ProviderTransport>,
        roster: ModelRoster,
        gate: Box<dyn CredentialGate>,
        events: EventLog,
        poll: PollPolicy,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(transport, roster, events.clone()),
            gate,
            credential: None,
            clock: Box::new(SystemClock::default()),
            poll,
            events,
            out_dir: out_dir.into(),
            conversation: Conversation::new(),
            current: None,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn PollClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn current(&self) -> Option<&StudioOutput> {
        self.current.as_ref()
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn roster(&self) -> &ModelRoster {
        self.dispatcher.roster()
    }

    /// Appends the user turn, then the reply. Any failure after validation appends a failed
    /// turn and returns the error.
    pub fn send_message(&mut self, message: &str, flags: ChatFlags) -> StudioResult<Turn> {
        let message = require_text(message, "message")?.to_string();
        let history: Vec<Turn> = self.conversation.history().cloned().collect();
        self.conversation.push_user(&message);

        let result = self
            .credential(dispatcher::chat_role(flags))
            .and_then(|credential| {
                self.dispatcher
                    .chat_turn(&credential, &history, &message, flags)
            });
        match result {
            Ok(reply) => Ok(self.conversation.push_reply(reply).clone()),
            Err(err) => {
                self.forget_rejected_credential(&err);
                self.conversation.push_failure();
                Err(err)
            }
        }
    }

    pub fn refine(&mut self, request: &RefineRequest) -> StudioResult<String> {
        GenerationRequest::Refine(request.clone()).validate()?;
        self.current = None;
        let credential = self.credential(ModelRole::ChatSmart)?;
        let result = self.dispatcher.refine_prompt(&credential, request);
        let text = self.settle(result)?;
        self.current = Some(StudioOutput::Text(text.clone()));
        Ok(text)
    }

    pub fn analyze(&mut self, request: &AnalyzeRequest) -> StudioResult<String> {
        GenerationRequest::Analyze(request.clone()).validate()?;
        self.current = None;
        let credential = self.credential(ModelRole::ChatSmart)?;
        let result = self.dispatcher.analyze_image(&credential, request);
        let text = self.settle(result)?;
        self.current = Some(StudioOutput::Text(text.clone()));
        Ok(text)
    }

    pub fn generate_image(&mut self, request: &ImageGenerateRequest) -> StudioResult<Artifact> {
        GenerationRequest::Generate(request.clone()).validate()?;
        self.current = None;
        let credential = self.credential(ModelRole::ImagePro)?;
        let result = self.dispatcher.generate_image(&credential, request);
        let artifact = self.settle(result)?;
        self.current = Some(StudioOutput::Artifact(artifact.clone()));
        Ok(artifact)
    }

    pub fn edit_image(&mut self, request: &ImageEditRequest) -> StudioResult<Artifact> {
        GenerationRequest::Edit(request.clone()).validate()?;
        self.current = None;
        let credential = self.credential(ModelRole::ImageEdit)?;
        let result = self.dispatcher.edit_image(&credential, request);
        let artifact = self.settle(result)?;
        self.current = Some(StudioOutput::Artifact(artifact.clone()));
        Ok(artifact)
    }

    /// Submits the job, polls it to completion and writes the video under the output directory.
    pub fn generate_video(
        &mut self,
        request: &VideoRequest,
        cancel: &CancelToken,
    ) -> StudioResult<Artifact> {
        GenerationRequest::Video(request.clone()).validate()?;
        self.current = None;
        let credential = self.credential(dispatcher::video_role(request.resolution))?;
        let result = self.run_video(&credential, request, cancel);
        let artifact = self.settle(result)?;
        self.current = Some(StudioOutput::Artifact(artifact.clone()));
        Ok(artifact)
    }

    fn run_video(
        &self,
        credential: &Credential,
        request: &VideoRequest,
        cancel: &CancelToken,
    ) -> StudioResult<Artifact> {
        let handle = self.dispatcher.submit_video(credential, request)?;
        let poller = JobPoller::new(
            self.dispatcher.transport(),
            self.clock.as_ref(),
            self.poll,
            &self.events,
        );
        let resolved = poller.wait(handle, credential, cancel)?;
        tracing::info!(
            checks = resolved.status_checks,
            waited_s = resolved.waited.as_secs_f64(),
            "video job resolved"
        );
        if cancel.is_cancelled() {
            return Err(StudioError::Cancelled("video generation".to_string()));
        }
        let fetched = self
            .dispatcher
            .transport()
            .fetch_artifact(&resolved.artifact_uri, credential)?;
        let artifact = artifacts::write_video_artifact(&self.out_dir, fetched)?;

        let mut payload = EventPayload::new();
        payload.insert("operation".to_string(), json!("video"));
        payload.insert("locator".to_string(), json!(artifact.locator()));
        self.events.record("artifact_created", payload);
        Ok(artifact)
    }

    /// Paid-tier models run key selection first when the gate has none.
    fn credential(&mut self, role: ModelRole) -> StudioResult<Credential> {
        let paid = self.roster().get(role).paid;
        if let Some(credential) = self.credential.as_ref() {
            if !paid || self.gate.has_selected_key() {
                return Ok(credential.clone());
            }
        }
        let credential = acquire_credential(self.gate.as_ref(), paid)?;
        self.credential = Some(credential.clone());
        Ok(credential)
    }

    fn settle<T>(&mut self, result: StudioResult<T>) -> StudioResult<T> {
        if let Err(err) = result.as_ref() {
            self.forget_rejected_credential(err);
        }
        result
    }

    fn forget_rejected_credential(&mut self, err: &StudioError) {
        if matches!(err, StudioError::CredentialMissing(_)) {
            tracing::warn!("provider rejected the credential; it will be re-resolved");
            self.credential = None;
        }
    }
}
