use std::sync::Arc;

use atelier_contracts::conversation::{ChatFlags, ChatReply, Source, Turn};
use atelier_contracts::events::{EventLog, EventPayload};
use atelier_contracts::models::{ModelRole, ModelRoster};
use atelier_contracts::options::{PromptStyle, VideoResolution};
use atelier_contracts::requests::{
    require_image, require_text, AnalyzeRequest, Artifact, GenerationRequest,
    ImageEditRequest, ImageGenerateRequest, OperationKind, RefineRequest, VideoRequest,
};
use atelier_contracts::{StudioError, StudioResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};

use crate::credentials::Credential;
use crate::poller::JobHandle;
use crate::transport::ProviderTransport;

pub const SYSTEM_INSTRUCTION: &str = "\
You are a professional AI design assistant built for designers and creative professionals.

Support designers by answering design questions with clear, practical guidance; writing \
production-ready prompts for visual design, advertising, branding, social media, product \
design and 3D visuals; refining existing prompts; and analysing uploaded images \
(composition, lighting, color palette, camera angle, artistic style).

Tone: professional, concise, designer-focused.

Arabic is a first-class language. When the user writes in Arabic, answer in Modern Standard \
Arabic with correct design terminology, keeping widely used English terms (branding, mockup, \
cinematic lighting) in English. When a prompt is meant for an English-based model, give the \
explanation in Arabic and a clean English prompt. Always separate the explanation from the \
final prompt.";

pub const REFINE_SYSTEM_INSTRUCTION: &str = "You are an expert prompt engineer.";

pub const ANALYSIS_INSTRUCTION: &str = "Analyze this image as a professional designer.
Provide a structured breakdown:
1. Composition & Perspective
2. Color Palette & Lighting
3. Style & Mood
4. A high-quality AI prompt to recreate this image.";

pub const EMPTY_REPLY_TEXT: &str = "No response generated.";
pub const THINKING_BUDGET_TOKENS: u64 = 32768;

/// Turns one user action into exactly one provider call.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn ProviderTransport>,
    roster: ModelRoster,
    events: EventLog,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn ProviderTransport>, roster: ModelRoster, events: EventLog) -> Self {
        Self {
            transport,
            roster,
            events,
        }
    }

    pub fn transport(&self) -> &dyn ProviderTransport {
        self.transport.as_ref()
    }

    pub fn roster(&self) -> &ModelRoster {
        &self.roster
    }

    pub fn chat_turn(
        &self,
        credential: &Credential,
        history: &[Turn],
        message: &str,
        flags: ChatFlags,
    ) -> StudioResult<ChatReply> {
        let message = require_text(message, "message")?;
        let model = self.roster.name(chat_role(flags)).to_string();
        let payload = build_chat_payload(history, message, flags);
        let response = self.call(OperationKind::Chat, &model, &payload, credential)?;

        let text = extract_text(&response);
        let reply = ChatReply {
            text: if text.trim().is_empty() {
                EMPTY_REPLY_TEXT.to_string()
            } else {
                text
            },
            sources: extract_sources(&response),
            used_reasoning: flags.reasoning,
            model,
        };
        let mut payload = EventPayload::new();
        payload.insert("model".to_string(), json!(reply.model));
        payload.insert("sources".to_string(), json!(reply.sources.len()));
        payload.insert("used_reasoning".to_string(), json!(reply.used_reasoning));
        self.events.record("reply_received", payload);
        Ok(reply)
    }

    pub fn refine_prompt(&self, credential: &Credential, request: &RefineRequest) -> StudioResult<String> {
        GenerationRequest::Refine(request.clone()).validate()?;
        let model = self.roster.name(ModelRole::ChatSmart).to_string();
        let payload = build_refine_payload(request);
        let response = self.call(OperationKind::Refine, &model, &payload, credential)?;
        non_empty_text(&response, "prompt refinement returned no text")
    }

    pub fn analyze_image(&self, credential: &Credential, request: &AnalyzeRequest) -> StudioResult<String> {
        let image = require_image(request.image.as_ref(), "image to analyze")?;
        let model = self.roster.name(ModelRole::ChatSmart).to_string();
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [image.inline_part(), { "text": ANALYSIS_INSTRUCTION }],
            }],
        });
        let response = self.call(OperationKind::Analyze, &model, &payload, credential)?;
        non_empty_text(&response, "image analysis returned no text")
    }

    pub fn generate_image(
        &self,
        credential: &Credential,
        request: &ImageGenerateRequest,
    ) -> StudioResult<Artifact> {
        GenerationRequest::Generate(request.clone()).validate()?;
        let model = self.roster.name(ModelRole::ImagePro).to_string();
        let payload = build_generate_payload(request);
        let response = self.call(OperationKind::Generate, &model, &payload, credential)?;
        self.image_artifact(OperationKind::Generate, &model, &response, "No image generated.")
    }

    pub fn edit_image(&self, credential: &Credential, request: &ImageEditRequest) -> StudioResult<Artifact> {
        GenerationRequest::Edit(request.clone()).validate()?;
        let image = require_image(request.image.as_ref(), "image to edit")?;
        let model = self.roster.name(ModelRole::ImageEdit).to_string();
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [image.inline_part(), { "text": request.instruction.trim() }],
            }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        });
        let response = self.call(OperationKind::Edit, &model, &payload, credential)?;
        self.image_artifact(OperationKind::Edit, &model, &response, "No edited image returned.")
    }

    /// Submits the video job. The returned handle goes to the job poller.
    pub fn submit_video(&self, credential: &Credential, request: &VideoRequest) -> StudioResult<JobHandle> {
        GenerationRequest::Video(request.clone()).validate()?;
        let model = self.roster.name(video_role(request.resolution)).to_string();
        let payload = build_video_payload(request);
        self.dispatched(OperationKind::Video, &model);
        let operation = self
            .transport
            .submit_video(&model, &payload, credential)
            .and_then(|value| JobHandle::from_operation(&value))
            .inspect_err(|err| self.failed(OperationKind::Video, &model, err))?;

        let mut event = EventPayload::new();
        event.insert("operation".to_string(), json!(operation.name));
        event.insert("model".to_string(), json!(model));
        self.events.record("job_submitted", event);
        tracing::info!(operation = %operation.name, "video job submitted");
        Ok(operation)
    }

    fn call(
        &self,
        kind: OperationKind,
        model: &str,
        payload: &Value,
        credential: &Credential,
    ) -> StudioResult<Value> {
        self.dispatched(kind, model);
        let response = self
            .transport
            .generate_content(model, payload, credential)
            .inspect_err(|err| self.failed(kind, model, err))?;
        if let Some(reason) = blocked_prompt_reason(&response) {
            let err = StudioError::empty_result(format!("request was blocked: {reason}"));
            self.failed(kind, model, &err);
            return Err(err);
        }
        Ok(response)
    }

    fn image_artifact(
        &self,
        kind: OperationKind,
        model: &str,
        response: &Value,
        missing: &str,
    ) -> StudioResult<Artifact> {
        let Some(artifact) = extract_first_image(response)? else {
            let err = StudioError::empty_result(missing);
            self.failed(kind, model, &err);
            return Err(err);
        };
        let mut payload = EventPayload::new();
        payload.insert("operation".to_string(), json!(kind.as_str()));
        payload.insert("model".to_string(), json!(model));
        payload.insert("mime_type".to_string(), json!(artifact.mime_type()));
        self.events.record("artifact_created", payload);
        Ok(artifact)
    }

    fn dispatched(&self, kind: OperationKind, model: &str) {
        tracing::info!(operation = kind.as_str(), model, "dispatching provider call");
        let mut payload = EventPayload::new();
        payload.insert("operation".to_string(), json!(kind.as_str()));
        payload.insert("model".to_string(), json!(model));
        payload.insert("provider".to_string(), json!(self.transport.name()));
        self.events.record("request_dispatched", payload);
    }

    fn failed(&self, kind: OperationKind, model: &str, err: &StudioError) {
        tracing::warn!(operation = kind.as_str(), kind = %err.kind(), "provider call failed: {err}");
        let mut payload = EventPayload::new();
        payload.insert("operation".to_string(), json!(kind.as_str()));
        payload.insert("model".to_string(), json!(model));
        payload.insert("error_kind".to_string(), json!(err.kind().as_str()));
        payload.insert("message".to_string(), json!(err.to_string()));
        self.events.record("request_failed", payload);
    }
}

/// Reasoning switches chat to the smart tier.
pub fn chat_role(flags: ChatFlags) -> ModelRole {
    if flags.reasoning {
        ModelRole::ChatSmart
    } else {
        ModelRole::ChatFast
    }
}

pub fn video_role(resolution: VideoResolution) -> ModelRole {
    match resolution {
        VideoResolution::Hd1080 => ModelRole::VideoHq,
        VideoResolution::Hd720 => ModelRole::VideoFast,
    }
}

pub fn build_chat_payload(history: &[Turn], message: &str, flags: ChatFlags) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .filter(|turn| !turn.failed)
        .map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "parts": [{ "text": turn.text }],
            })
        })
        .collect();
    contents.push(json!({
        "role": "user",
        "parts": [{ "text": message }],
    }));

    let mut payload = Map::new();
    payload.insert(
        "systemInstruction".to_string(),
        json!({ "parts": [{ "text": SYSTEM_INSTRUCTION }] }),
    );
    payload.insert("contents".to_string(), Value::Array(contents));
    if flags.search {
        payload.insert("tools".to_string(), json!([{ "googleSearch": {} }]));
    }
    if flags.reasoning {
        payload.insert(
            "generationConfig".to_string(),
            json!({ "thinkingConfig": { "thinkingBudget": THINKING_BUDGET_TOKENS } }),
        );
    }
    Value::Object(payload)
}

pub fn refinement_instruction(prompt: &str, style: PromptStyle) -> String {
    format!(
        "Refine this AI image prompt to be production-ready, detailed, and visually stunning.\n\
         Target Style: {style}.\n\
         Original Prompt: \"{}\"\n\n\
         Output ONLY the refined prompt text.",
        prompt.trim()
    )
}

pub fn build_refine_payload(request: &RefineRequest) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": REFINE_SYSTEM_INSTRUCTION }] },
        "contents": [{
            "role": "user",
            "parts": [{ "text": refinement_instruction(&request.prompt, request.style) }],
        }],
    })
}

pub fn build_generate_payload(request: &ImageGenerateRequest) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt.trim() }],
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": {
                "aspectRatio": request.aspect_ratio.label(),
                "imageSize": request.size.label(),
            },
        },
    })
}

pub fn build_video_payload(request: &VideoRequest) -> Value {
    let mut instance = Map::new();
    instance.insert("prompt".to_string(), json!(request.prompt.trim()));
    if let Some(reference) = request.reference.as_ref() {
        instance.insert(
            "image".to_string(),
            json!({
                "bytesBase64Encoded": reference.to_base64(),
                "mimeType": reference.mime_type(),
            }),
        );
    }
    json!({
        "instances": [Value::Object(instance)],
        "parameters": {
            "aspectRatio": request.aspect_ratio.label(),
            "resolution": request.resolution.label(),
            "sampleCount": 1,
        },
    })
}

fn first_candidate_parts(response: &Value) -> Vec<Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Concatenated answer text, skipping thought-summary parts.
pub fn extract_text(response: &Value) -> String {
    first_candidate_parts(response)
        .iter()
        .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .join("")
}

pub fn extract_sources(response: &Value) -> Vec<Source> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("groundingMetadata"))
        .and_then(|metadata| metadata.get("groundingChunks"))
        .and_then(Value::as_array)
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| chunk.get("web"))
                .filter_map(|web| {
                    let uri = web.get("uri").and_then(Value::as_str)?.trim();
                    if uri.is_empty() {
                        return None;
                    }
                    Some(Source {
                        uri: uri.to_string(),
                        title: web
                            .get("title")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn extract_first_image(response: &Value) -> StudioResult<Option<Artifact>> {
    for part in first_candidate_parts(response) {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
            StudioError::provider("Gemini", None, format!("image base64 decode failed: {err}"))
        })?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png")
            .to_string();
        return Ok(Some(Artifact::Image { mime_type, bytes }));
    }
    Ok(None)
}

fn blocked_prompt_reason(response: &Value) -> Option<String> {
    let has_candidates = response
        .get("candidates")
        .and_then(Value::as_array)
        .map(|rows| !rows.is_empty())
        .unwrap_or(false);
    if has_candidates {
        return None;
    }
    response
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn non_empty_text(response: &Value, missing: &str) -> StudioResult<String> {
    let text = extract_text(response);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StudioError::empty_result(missing));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use atelier_contracts::conversation::{Conversation, Role};
    use atelier_contracts::options::{AspectRatio, ImageSize, VideoAspectRatio};
    use atelier_contracts::requests::ImageInput;
    use atelier_contracts::ErrorKind;

    use super::*;
    use crate::testing::ScriptedTransport;

    fn dispatcher(transport: &Arc<ScriptedTransport>) -> Dispatcher {
        Dispatcher::new(
            transport.clone(),
            ModelRoster::defaults(),
            EventLog::disabled("test"),
        )
    }

    fn credential() -> Credential {
        Credential::new("test-key").unwrap()
    }

    fn png() -> ImageInput {
        ImageInput::new(vec![0x89, b'P', b'N', b'G'], "image/png").unwrap()
    }

    fn text_response(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }] })
    }

    fn image_response() -> Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your design." },
                        { "inlineData": { "mimeType": "image/png", "data": "iVBORw==" } }
                    ]
                }
            }]
        })
    }

    #[test]
    fn empty_inputs_fail_without_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let dispatcher = dispatcher(&transport);
        let key = credential();

        let errors = vec![
            dispatcher
                .chat_turn(&key, &[], "   ", ChatFlags::default())
                .unwrap_err(),
            dispatcher
                .refine_prompt(
                    &key,
                    &RefineRequest {
                        prompt: String::new(),
                        style: PromptStyle::Cinematic,
                    },
                )
                .unwrap_err(),
            dispatcher
                .analyze_image(&key, &AnalyzeRequest { image: None })
                .unwrap_err(),
            dispatcher
                .generate_image(
                    &key,
                    &ImageGenerateRequest {
                        prompt: " ".to_string(),
                        aspect_ratio: AspectRatio::Square,
                        size: ImageSize::OneK,
                    },
                )
                .unwrap_err(),
            dispatcher
                .edit_image(
                    &key,
                    &ImageEditRequest {
                        image: None,
                        instruction: "add rim light".to_string(),
                    },
                )
                .unwrap_err(),
            dispatcher
                .edit_image(
                    &key,
                    &ImageEditRequest {
                        image: Some(png()),
                        instruction: String::new(),
                    },
                )
                .unwrap_err(),
            dispatcher
                .submit_video(
                    &key,
                    &VideoRequest {
                        prompt: String::new(),
                        aspect_ratio: VideoAspectRatio::Landscape,
                        resolution: VideoResolution::Hd720,
                        reference: None,
                    },
                )
                .unwrap_err(),
        ];

        for err in errors {
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{err}");
        }
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn search_flag_attaches_exactly_one_search_tool() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(text_response("ok"));
        transport.push_ok(text_response("ok"));
        let dispatcher = dispatcher(&transport);

        dispatcher.chat_turn(
            &credential(),
            &[],
            "latest packaging trends?",
            ChatFlags {
                reasoning: false,
                search: true,
            },
        )?;
        let with_search = transport.last_payload();
        assert_eq!(with_search["tools"], json!([{ "googleSearch": {} }]));

        dispatcher.chat_turn(&credential(), &[], "and now?", ChatFlags::default())?;
        let without_search = transport.last_payload();
        assert!(without_search.get("tools").is_none());
        Ok(())
    }

    #[test]
    fn reasoning_flag_selects_smart_tier_and_marks_reply() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(text_response("deep answer"));
        transport.push_ok(text_response("quick answer"));
        let dispatcher = dispatcher(&transport);

        let deep = dispatcher.chat_turn(
            &credential(),
            &[],
            "explain gestalt",
            ChatFlags {
                reasoning: true,
                search: false,
            },
        )?;
        assert!(deep.used_reasoning);
        assert_eq!(deep.model, "gemini-3-pro-preview");
        let payload = transport.last_payload();
        assert_eq!(
            payload["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            json!(32768)
        );

        let quick = dispatcher.chat_turn(&credential(), &[], "hi", ChatFlags::default())?;
        assert!(!quick.used_reasoning);
        assert_eq!(quick.model, "gemini-2.5-flash");
        assert!(transport.last_payload().get("generationConfig").is_none());

        let models: Vec<String> = transport.calls().into_iter().map(|call| call.target).collect();
        assert_eq!(models, vec!["gemini-3-pro-preview", "gemini-2.5-flash"]);
        Ok(())
    }

    #[test]
    fn chat_replays_history_in_order_and_reads_sources() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Trend report." }] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://a.example", "title": "A" } },
                        { "retrievedContext": { "uri": "ignored" } },
                        { "web": { "uri": "https://b.example" } }
                    ]
                }
            }]
        }));
        let dispatcher = dispatcher(&transport);

        let mut conversation = Conversation::new();
        conversation.push_user("hello");
        conversation.push_failure();
        let history: Vec<Turn> = conversation.turns().to_vec();

        let reply = dispatcher.chat_turn(
            &credential(),
            &history,
            "what is trending?",
            ChatFlags {
                reasoning: false,
                search: true,
            },
        )?;
        assert_eq!(reply.text, "Trend report.");
        assert_eq!(
            reply.sources,
            vec![
                Source {
                    uri: "https://a.example".to_string(),
                    title: "A".to_string()
                },
                Source {
                    uri: "https://b.example".to_string(),
                    title: String::new()
                },
            ]
        );

        let payload = transport.last_payload();
        let contents = payload["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], json!(Role::User.as_str()));
        assert_eq!(contents[1]["parts"][0]["text"], json!("what is trending?"));
        assert_eq!(
            payload["systemInstruction"]["parts"][0]["text"],
            json!(SYSTEM_INSTRUCTION)
        );
        Ok(())
    }

    #[test]
    fn empty_chat_reply_gets_placeholder() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({ "candidates": [{ "content": { "parts": [] } }] }));
        let reply = dispatcher(&transport).chat_turn(
            &credential(),
            &[],
            "hello",
            ChatFlags::default(),
        )?;
        assert_eq!(reply.text, EMPTY_REPLY_TEXT);
        Ok(())
    }

    #[test]
    fn chat_provider_failure_is_surfaced_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_err(StudioError::provider("Gemini", Some(500), "boom"));
        transport.push_ok(text_response("should not be used"));
        let err = dispatcher(&transport)
            .chat_turn(&credential(), &[], "hello", ChatFlags::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderFailure);
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn refinement_instruction_contains_style_verbatim() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(text_response("  A glossy red sports car, rain-soaked neon street  "));
        let refined = dispatcher(&transport).refine_prompt(
            &credential(),
            &RefineRequest {
                prompt: "a red car in the rain".to_string(),
                style: PromptStyle::StudioLighting,
            },
        )?;
        assert_eq!(refined, "A glossy red sports car, rain-soaked neon street");

        let payload = transport.last_payload();
        let instruction = payload["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(instruction.contains("Target Style: Studio Lighting."));
        assert!(instruction.contains("\"a red car in the rain\""));
        assert!(instruction.contains("Output ONLY the refined prompt text."));
        assert_eq!(
            payload["systemInstruction"]["parts"][0]["text"],
            json!(REFINE_SYSTEM_INSTRUCTION)
        );
        Ok(())
    }

    #[test]
    fn analysis_sends_image_then_instruction() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(text_response("1. Composition: rule of thirds"));
        let text = dispatcher(&transport).analyze_image(
            &credential(),
            &AnalyzeRequest { image: Some(png()) },
        )?;
        assert!(text.starts_with("1. Composition"));

        let payload = transport.last_payload();
        let parts = payload["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[1]["text"], json!(ANALYSIS_INSTRUCTION));
        assert_eq!(transport.calls()[0].target, "gemini-3-pro-preview");
        Ok(())
    }

    #[test]
    fn empty_analysis_is_empty_result() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(text_response("   "));
        let err = dispatcher(&transport)
            .analyze_image(&credential(), &AnalyzeRequest { image: Some(png()) })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn generation_returns_first_inline_image() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(image_response());
        let artifact = dispatcher(&transport).generate_image(
            &credential(),
            &ImageGenerateRequest {
                prompt: "brutalist poster".to_string(),
                aspect_ratio: AspectRatio::Ultrawide21x9,
                size: ImageSize::FourK,
            },
        )?;
        assert_eq!(artifact.locator(), "data:image/png;base64,iVBORw==");

        let payload = transport.last_payload();
        assert_eq!(
            payload["generationConfig"]["imageConfig"],
            json!({ "aspectRatio": "21:9", "imageSize": "4K" })
        );
        assert_eq!(transport.calls()[0].target, "gemini-3-pro-image-preview");
        Ok(())
    }

    #[test]
    fn generation_without_image_part_is_empty_result() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(text_response("I can only describe it."));
        let err = dispatcher(&transport)
            .generate_image(
                &credential(),
                &ImageGenerateRequest {
                    prompt: "logo".to_string(),
                    aspect_ratio: AspectRatio::Square,
                    size: ImageSize::OneK,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
        assert_eq!(err.to_string(), "No image generated.");
    }

    #[test]
    fn edit_without_image_part_is_empty_result() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({ "candidates": [] , "promptFeedback": {} }));
        let err = dispatcher(&transport)
            .edit_image(
                &credential(),
                &ImageEditRequest {
                    image: Some(png()),
                    instruction: "make it vintage".to_string(),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
        assert_eq!(err.to_string(), "No edited image returned.");
    }

    #[test]
    fn blocked_prompt_is_empty_result_with_reason() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        let err = dispatcher(&transport)
            .edit_image(
                &credential(),
                &ImageEditRequest {
                    image: Some(png()),
                    instruction: "something".to_string(),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn edit_sends_image_and_instruction_to_edit_model() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(image_response());
        dispatcher(&transport).edit_image(
            &credential(),
            &ImageEditRequest {
                image: Some(png()),
                instruction: " remove the background ".to_string(),
            },
        )?;
        let call = &transport.calls()[0];
        assert_eq!(call.target, "gemini-2.5-flash-image");
        assert_eq!(call.credential, "test-key");
        let parts = transport.last_payload()["contents"][0]["parts"].clone();
        assert_eq!(parts[1]["text"], json!("remove the background"));
        Ok(())
    }

    #[test]
    fn video_submission_shapes_payload_and_returns_handle() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({ "name": "models/veo/operations/op-9" }));
        let handle = dispatcher(&transport).submit_video(
            &credential(),
            &VideoRequest {
                prompt: "drone shot over a neon city".to_string(),
                aspect_ratio: VideoAspectRatio::Portrait,
                resolution: VideoResolution::Hd720,
                reference: Some(png()),
            },
        )?;
        assert_eq!(handle.name, "models/veo/operations/op-9");
        assert!(!handle.done);

        let payload = transport.last_payload();
        assert_eq!(payload["parameters"]["aspectRatio"], json!("9:16"));
        assert_eq!(payload["parameters"]["resolution"], json!("720p"));
        assert_eq!(payload["parameters"]["sampleCount"], json!(1));
        assert_eq!(
            payload["instances"][0]["image"]["mimeType"],
            json!("image/png")
        );
        assert_eq!(transport.calls()[0].method, "submit_video");
        assert_eq!(transport.calls()[0].target, "veo-3.1-fast-generate-preview");
        Ok(())
    }

    #[test]
    fn full_hd_video_uses_quality_tier() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_ok(json!({ "name": "operations/hq" }));
        dispatcher(&transport).submit_video(
            &credential(),
            &VideoRequest {
                prompt: "product turntable".to_string(),
                aspect_ratio: VideoAspectRatio::Landscape,
                resolution: VideoResolution::Hd1080,
                reference: None,
            },
        )?;
        assert_eq!(transport.calls()[0].target, "veo-3.1-generate-preview");
        assert!(transport.last_payload()["instances"][0].get("image").is_none());
        Ok(())
    }

    #[test]
    fn thought_parts_are_not_part_of_the_answer() {
        let response = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "planning...", "thought": true },
                { "text": "Answer." }
            ] } }]
        });
        assert_eq!(extract_text(&response), "Answer.");
    }
}
