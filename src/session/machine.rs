//! The edit session state machine.
//!
//! Every transition is synchronous. The only asynchronous step, the remote
//! edit, happens outside: [`Session::submit`] hands out a [`Submission`]
//! ticket, and the outcome comes back through [`Session::complete`] tagged
//! with the ticket's generation. Completions for a generation that is no
//! longer in flight are dropped.

use crate::error::{EditError, Result, VALIDATION_MESSAGE};
use crate::image::{EditedImage, SourceImage};
use crate::session::history::PromptHistory;
use serde::Serialize;

/// Observable phase of a session, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No image.
    Idle,
    /// Image present, nothing in flight, no result or error.
    Ready,
    /// An edit request is in flight.
    Submitting,
    /// The last edit produced a result.
    Succeeded,
    /// The last submission failed or was rejected. Takes precedence over a
    /// result kept from an earlier edit.
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Submitting => "submitting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Ticket for one accepted submission.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Generation the outcome must match to be applied.
    pub generation: u64,
    /// Image to edit.
    pub image: SourceImage,
    /// Trimmed, non-empty prompt.
    pub prompt: String,
}

/// What happened to a completion handed to [`Session::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The edit succeeded and its result is now current.
    Applied,
    /// The edit failed and the error is now current.
    Failed,
    /// The session moved on; the outcome was dropped.
    Stale,
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    prompt: String,
}

/// State of one editing session.
#[derive(Debug, Default)]
pub struct Session {
    current_image: Option<SourceImage>,
    current_result: Option<EditedImage>,
    prompt_text: String,
    in_flight: Option<InFlight>,
    last_error: Option<String>,
    history: PromptHistory,
    generation: u64,
}

impl Session {
    /// Creates an idle session with empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        if self.in_flight.is_some() {
            Phase::Submitting
        } else if self.current_image.is_none() {
            Phase::Idle
        } else if self.last_error.is_some() {
            Phase::Failed
        } else if self.current_result.is_some() {
            Phase::Succeeded
        } else {
            Phase::Ready
        }
    }

    /// Replaces the current image. Any in-flight edit becomes stale.
    pub fn upload_image(&mut self, image: SourceImage) {
        self.generation += 1;
        self.current_image = Some(image);
        self.current_result = None;
        self.last_error = None;
        self.in_flight = None;
    }

    /// Updates the prompt text without touching anything else.
    pub fn set_prompt_text(&mut self, text: impl Into<String>) {
        self.prompt_text = text.into();
    }

    /// Accepts the current image and prompt for editing.
    ///
    /// Rejected while another submission is in flight, leaving state as is.
    /// Rejected with a validation error, recorded as `last_error`, when the
    /// image is missing or the prompt is blank.
    pub fn submit(&mut self) -> Result<Submission> {
        if self.in_flight.is_some() {
            return Err(EditError::RequestInFlight);
        }

        let prompt = self.prompt_text.trim();
        let image = match &self.current_image {
            Some(image) if !prompt.is_empty() => image.clone(),
            _ => {
                self.last_error = Some(VALIDATION_MESSAGE.to_string());
                return Err(EditError::Validation(VALIDATION_MESSAGE.to_string()));
            }
        };
        let prompt = prompt.to_string();

        self.generation += 1;
        self.in_flight = Some(InFlight {
            generation: self.generation,
            prompt: prompt.clone(),
        });
        self.last_error = None;
        self.current_result = None;

        Ok(Submission {
            generation: self.generation,
            image,
            prompt,
        })
    }

    /// Applies the outcome of the submission tagged `generation`.
    pub fn complete(&mut self, generation: u64, outcome: Result<EditedImage>) -> Completion {
        let Some(in_flight) = self.in_flight.take_if(|f| f.generation == generation) else {
            return Completion::Stale;
        };

        match outcome {
            Ok(image) => {
                self.current_result = Some(image);
                self.history.record(&in_flight.prompt);
                Completion::Applied
            }
            Err(err) => {
                self.last_error = Some(err.user_message());
                Completion::Failed
            }
        }
    }

    /// Records a failure that happened outside a submission, such as an
    /// upload that could not be read. Nothing else changes.
    pub fn report_error(&mut self, err: &EditError) {
        self.last_error = Some(err.user_message());
    }

    /// Copies a history entry into the prompt. Does not submit.
    pub fn select_history_prompt(&mut self, text: &str) -> Result<()> {
        if self.in_flight.is_some() {
            return Err(EditError::RequestInFlight);
        }
        self.prompt_text = text.to_string();
        Ok(())
    }

    /// Starts over. History survives.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.current_image = None;
        self.current_result = None;
        self.prompt_text.clear();
        self.last_error = None;
        self.in_flight = None;
    }

    /// Current image, if any.
    pub fn current_image(&self) -> Option<&SourceImage> {
        self.current_image.as_ref()
    }

    /// Result of the last applied edit, if any.
    pub fn current_result(&self) -> Option<&EditedImage> {
        self.current_result.as_ref()
    }

    /// Prompt text as typed.
    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    /// Displayable message for the last failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True while an edit request is outstanding.
    pub fn is_request_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Prompt history.
    pub fn history(&self) -> &PromptHistory {
        &self.history
    }

    /// Current generation tag.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::REMOTE_FAILURE_MESSAGE;
    use crate::image::{encode_bytes, EditMetadata, ImageFormat};
    use crate::session::history::HISTORY_LIMIT;

    fn image(tag: &[u8]) -> SourceImage {
        encode_bytes(tag.to_vec(), "image/png").unwrap()
    }

    fn edited(bytes: &[u8]) -> EditedImage {
        EditedImage::new(bytes.to_vec(), ImageFormat::Png, EditMetadata::default())
    }

    fn succeed(session: &mut Session, prompt: &str, bytes: &[u8]) {
        session.set_prompt_text(prompt);
        let sub = session.submit().unwrap();
        assert_eq!(
            session.complete(sub.generation, Ok(edited(bytes))),
            Completion::Applied
        );
    }

    #[test]
    fn test_phases_through_success() {
        let mut session = Session::new();
        assert_eq!(session.phase(), Phase::Idle);

        session.upload_image(image(b"A"));
        assert_eq!(session.phase(), Phase::Ready);

        session.set_prompt_text("  add a hat ");
        let sub = session.submit().unwrap();
        assert_eq!(sub.prompt, "add a hat");
        assert_eq!(sub.image.data(), b"A");
        assert_eq!(session.phase(), Phase::Submitting);
        assert!(session.is_request_in_flight());

        let completion = session.complete(sub.generation, Ok(edited(b"B")));
        assert_eq!(completion, Completion::Applied);
        assert_eq!(session.phase(), Phase::Succeeded);
        assert_eq!(session.current_result().unwrap().data, b"B");
        assert_eq!(session.history().entries(), ["add a hat"]);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_failure_sets_message_and_leaves_history() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        session.set_prompt_text("remove the background");
        let sub = session.submit().unwrap();

        let completion = session.complete(
            sub.generation,
            Err(EditError::EmptyResponse("no candidates".into())),
        );
        assert_eq!(completion, Completion::Failed);
        assert_eq!(session.phase(), Phase::Failed);
        assert_eq!(session.last_error(), Some(REMOTE_FAILURE_MESSAGE));
        assert!(session.current_result().is_none());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_empty_prompt_is_rejected_with_message() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        session.set_prompt_text("   ");
        let generation = session.generation();

        let err = session.submit().unwrap_err();
        assert!(matches!(err, EditError::Validation(_)));
        assert_eq!(session.phase(), Phase::Failed);
        assert_eq!(session.last_error(), Some(VALIDATION_MESSAGE));
        assert!(!session.is_request_in_flight());
        assert_eq!(session.generation(), generation);
        assert!(session.history().is_empty());
        assert_eq!(session.prompt_text(), "   ");
    }

    #[test]
    fn test_rejection_after_success_reads_failed_and_keeps_result() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        succeed(&mut session, "x", b"B");

        session.set_prompt_text("   ");
        assert!(matches!(session.submit(), Err(EditError::Validation(_))));
        assert_eq!(session.phase(), Phase::Failed);
        assert_eq!(session.last_error(), Some(VALIDATION_MESSAGE));
        assert_eq!(session.current_result().unwrap().data, b"B");
        assert_eq!(session.history().entries(), ["x"]);
    }

    #[test]
    fn test_missing_image_is_rejected() {
        let mut session = Session::new();
        session.set_prompt_text("add a hat");
        assert!(matches!(session.submit(), Err(EditError::Validation(_))));
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.last_error(), Some(VALIDATION_MESSAGE));
    }

    #[test]
    fn test_single_flight() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        session.set_prompt_text("add a hat");
        let sub = session.submit().unwrap();

        assert!(matches!(session.submit(), Err(EditError::RequestInFlight)));
        assert!(matches!(
            session.select_history_prompt("other"),
            Err(EditError::RequestInFlight)
        ));
        assert_eq!(session.prompt_text(), "add a hat");
        assert!(session.last_error().is_none());

        // Prompt edits are still allowed while in flight.
        session.set_prompt_text("add a scarf");
        assert_eq!(session.phase(), Phase::Submitting);

        session.complete(sub.generation, Ok(edited(b"B")));
        assert_eq!(session.history().entries(), ["add a hat"]);
    }

    #[test]
    fn test_repeated_prompt_not_duplicated() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        succeed(&mut session, "x", b"B");
        succeed(&mut session, "x", b"C");
        assert_eq!(session.history().entries(), ["x"]);
        assert_eq!(session.current_result().unwrap().data, b"C");
    }

    #[test]
    fn test_reselected_prompt_moves_to_front() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        succeed(&mut session, "a", b"1");
        succeed(&mut session, "b", b"2");
        session.select_history_prompt("a").unwrap();
        let sub = session.submit().unwrap();
        session.complete(sub.generation, Ok(edited(b"3")));
        assert_eq!(session.history().entries(), ["a", "b"]);
    }

    #[test]
    fn test_history_bounded_through_session() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        for i in 0..20 {
            succeed(&mut session, &format!("p{i}"), b"B");
        }
        assert_eq!(session.history().len(), HISTORY_LIMIT);
        assert_eq!(session.history().get(0), Some("p19"));
    }

    #[test]
    fn test_upload_after_success_returns_to_ready() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        succeed(&mut session, "add a hat", b"B");

        session.upload_image(image(b"C"));
        assert_eq!(session.phase(), Phase::Ready);
        assert!(session.current_result().is_none());
        assert!(session.last_error().is_none());
        assert_eq!(session.prompt_text(), "add a hat");
    }

    #[test]
    fn test_stale_result_after_upload_is_discarded() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        session.set_prompt_text("add a hat");
        let stale = session.submit().unwrap();

        session.upload_image(image(b"C"));
        assert_eq!(session.phase(), Phase::Ready);

        let completion = session.complete(stale.generation, Ok(edited(b"B")));
        assert_eq!(completion, Completion::Stale);
        assert_eq!(session.phase(), Phase::Ready);
        assert!(session.current_result().is_none());
        assert_eq!(session.current_image().unwrap().data(), b"C");
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_stale_result_does_not_hit_newer_submission() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        session.set_prompt_text("first");
        let stale = session.submit().unwrap();

        session.upload_image(image(b"C"));
        session.set_prompt_text("second");
        let fresh = session.submit().unwrap();

        assert_eq!(
            session.complete(stale.generation, Err(EditError::RequestInFlight)),
            Completion::Stale
        );
        assert_eq!(session.phase(), Phase::Submitting);
        assert!(session.last_error().is_none());

        assert_eq!(
            session.complete(fresh.generation, Ok(edited(b"D"))),
            Completion::Applied
        );
        assert_eq!(session.history().entries(), ["second"]);
    }

    #[test]
    fn test_reset_is_idempotent_and_keeps_history() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        succeed(&mut session, "add a hat", b"B");

        session.reset();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.current_image().is_none());
        assert!(session.current_result().is_none());
        assert_eq!(session.prompt_text(), "");
        assert!(session.last_error().is_none());
        assert_eq!(session.history().entries(), ["add a hat"]);

        session.reset();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.current_image().is_none());
        assert_eq!(session.prompt_text(), "");
        assert_eq!(session.history().entries(), ["add a hat"]);
    }

    #[test]
    fn test_reset_while_in_flight_discards_result() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        session.set_prompt_text("add a hat");
        let sub = session.submit().unwrap();

        session.reset();
        assert_eq!(
            session.complete(sub.generation, Ok(edited(b"B"))),
            Completion::Stale
        );
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_report_error_keeps_current_image() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        session.report_error(&EditError::UnsupportedMediaType("image/bmp".into()));
        assert_eq!(session.phase(), Phase::Failed);
        assert_eq!(session.current_image().unwrap().data(), b"A");
        assert_eq!(session.last_error(), Some(crate::error::READ_FAILURE_MESSAGE));
    }

    #[test]
    fn test_validation_failure_then_success_clears_error() {
        let mut session = Session::new();
        session.upload_image(image(b"A"));
        let _ = session.submit();
        assert_eq!(session.phase(), Phase::Failed);

        succeed(&mut session, "add a hat", b"B");
        assert!(session.last_error().is_none());
        assert_eq!(session.phase(), Phase::Succeeded);
    }
}
