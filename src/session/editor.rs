//! Async driver that connects a [`Session`] to an [`EditClient`].
//!
//! The editor owns the session and is the only place it is mutated. Edit
//! requests run on spawned tasks that never see the session; each one reports
//! back over a channel with the generation it was issued under, and
//! [`Editor::next_completion`] folds that outcome into the session.

use crate::client::EditClient;
use crate::error::{EditError, Result};
use crate::image::{encode_file, EditedImage, SourceImage};
use crate::session::machine::{Completion, Session};
use crate::session::snapshot::SessionSnapshot;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

struct Outcome {
    generation: u64,
    result: Result<EditedImage>,
}

/// Drives one editing session against a remote edit client.
pub struct Editor {
    session: Session,
    client: Arc<dyn EditClient>,
    outcomes_tx: mpsc::UnboundedSender<Outcome>,
    outcomes_rx: mpsc::UnboundedReceiver<Outcome>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl Editor {
    /// Creates an editor with an idle session.
    pub fn new(client: Arc<dyn EditClient>) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        Self {
            session: Session::new(),
            client,
            outcomes_tx,
            outcomes_rx,
            snapshots,
        }
    }

    /// Read access to the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Subscribes to snapshots published after every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::of(&self.session)
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    /// Reads and uploads an image file.
    ///
    /// A file that cannot be used leaves the current image in place and
    /// records a generic failure message.
    pub async fn upload_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        match encode_file(path.as_ref()).await {
            Ok(image) => {
                self.upload_image(image);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    kind = ?err.kind(),
                    "upload failed: {err}"
                );
                self.session.report_error(&err);
                self.publish();
                Err(err)
            }
        }
    }

    /// Uploads an already encoded image.
    pub fn upload_image(&mut self, image: SourceImage) {
        tracing::info!(media_type = %image.media_type(), size = image.size(), "image uploaded");
        self.session.upload_image(image);
        self.publish();
    }

    /// Updates the prompt text.
    pub fn set_prompt_text(&mut self, text: impl Into<String>) {
        self.session.set_prompt_text(text);
        self.publish();
    }

    /// Copies the history entry at `index` (0 = most recent) into the prompt.
    ///
    /// Returns `Ok(false)` when there is no such entry.
    pub fn select_history(&mut self, index: usize) -> Result<bool> {
        let Some(prompt) = self.session.history().get(index).map(str::to_string) else {
            return Ok(false);
        };
        self.select_history_prompt(&prompt)?;
        Ok(true)
    }

    /// Copies `text` into the prompt. Rejected while a request is in flight.
    pub fn select_history_prompt(&mut self, text: &str) -> Result<()> {
        self.session.select_history_prompt(text)?;
        self.publish();
        Ok(())
    }

    /// Starts over, keeping history.
    pub fn reset(&mut self) {
        tracing::info!("session reset");
        self.session.reset();
        self.publish();
    }

    /// Submits the current image and prompt, returning the generation tag of
    /// the request. The request runs in the background.
    pub fn submit(&mut self) -> Result<u64> {
        let submission = match self.session.submit() {
            Ok(submission) => submission,
            Err(err) => {
                tracing::debug!(kind = ?err.kind(), "submission rejected: {err}");
                self.publish();
                return Err(err);
            }
        };

        let generation = submission.generation;
        tracing::info!(
            generation,
            prompt = %submission.prompt,
            client = self.client.name(),
            "submitting edit"
        );

        let client = Arc::clone(&self.client);
        let tx = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let result = client.edit(&submission.image, &submission.prompt).await;
            // The receiver lives as long as the editor; a dropped editor has
            // nobody left to tell.
            let _ = tx.send(Outcome { generation, result });
        });

        self.publish();
        Ok(generation)
    }

    /// Waits for the next outstanding request to settle and applies it.
    ///
    /// Returns `None` right away when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if !self.session.is_request_in_flight() {
            return None;
        }
        let Outcome { generation, result } = self.outcomes_rx.recv().await?;

        if let Err(ref err) = result {
            tracing::warn!(
                generation,
                kind = ?err.kind(),
                retry_after = ?err.retry_after(),
                "edit failed: {err}"
            );
        }

        let completion = self.session.complete(generation, result);
        match completion {
            Completion::Applied => tracing::info!(generation, "edit applied"),
            Completion::Failed => {}
            Completion::Stale => tracing::debug!(generation, "discarded stale edit result"),
        }

        self.publish();
        Some(completion)
    }

    /// Submits and waits until that submission settles.
    pub async fn submit_and_wait(&mut self) -> Result<Completion> {
        self.submit()?;
        while let Some(completion) = self.next_completion().await {
            if completion != Completion::Stale {
                return Ok(completion);
            }
        }
        Ok(Completion::Stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{REMOTE_FAILURE_MESSAGE, VALIDATION_MESSAGE};
    use crate::image::{encode_bytes, EditMetadata, ImageFormat};
    use crate::session::machine::Phase;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Client whose calls settle only when the test says so.
    #[derive(Default)]
    struct ScriptedClient {
        pending: Mutex<VecDeque<oneshot::Receiver<Result<EditedImage>>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn expect_call(&self) -> oneshot::Sender<Result<EditedImage>> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().push_back(rx);
            tx
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EditClient for ScriptedClient {
        async fn edit(&self, _image: &SourceImage, prompt: &str) -> Result<EditedImage> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let rx = self.pending.lock().unwrap().pop_front();
            match rx {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(EditError::EmptyResponse("dropped".into()))),
                None => Err(EditError::EmptyResponse("unexpected call".into())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn image(tag: &[u8]) -> SourceImage {
        encode_bytes(tag.to_vec(), "image/png").unwrap()
    }

    fn edited(bytes: &[u8]) -> EditedImage {
        EditedImage::new(bytes.to_vec(), ImageFormat::Png, EditMetadata::default())
    }

    fn editor() -> (Editor, Arc<ScriptedClient>) {
        let client = Arc::new(ScriptedClient::default());
        (Editor::new(client.clone()), client)
    }

    #[tokio::test]
    async fn test_add_a_hat() {
        let (mut editor, client) = editor();
        let reply = client.expect_call();

        editor.upload_image(image(b"A"));
        editor.set_prompt_text("add a hat");
        editor.submit().unwrap();
        assert_eq!(editor.session().phase(), Phase::Submitting);

        reply.send(Ok(edited(b"B"))).unwrap();
        assert_eq!(editor.next_completion().await, Some(Completion::Applied));

        let session = editor.session();
        assert_eq!(session.phase(), Phase::Succeeded);
        assert_eq!(session.current_result().unwrap().data, b"B");
        assert_eq!(session.history().entries(), ["add a hat"]);
        assert_eq!(client.prompts(), ["add a hat"]);
    }

    #[tokio::test]
    async fn test_empty_prompt_never_calls_client() {
        let (mut editor, client) = editor();
        editor.upload_image(image(b"A"));

        let err = editor.submit().unwrap_err();
        assert!(matches!(err, EditError::Validation(_)));
        assert_eq!(editor.session().phase(), Phase::Failed);
        assert_eq!(editor.session().last_error(), Some(VALIDATION_MESSAGE));
        assert!(client.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_normalized() {
        let (mut editor, client) = editor();
        let reply = client.expect_call();
        editor.upload_image(image(b"A"));
        editor.set_prompt_text("add a hat");
        editor.submit().unwrap();

        reply
            .send(Err(EditError::MalformedResponse("no inline data".into())))
            .unwrap();
        assert_eq!(editor.next_completion().await, Some(Completion::Failed));
        assert_eq!(editor.session().last_error(), Some(REMOTE_FAILURE_MESSAGE));
        assert!(editor.session().history().is_empty());
    }

    #[tokio::test]
    async fn test_stale_result_after_new_upload_is_discarded() {
        let (mut editor, client) = editor();
        let first = client.expect_call();
        let second = client.expect_call();

        editor.upload_image(image(b"A"));
        editor.set_prompt_text("add a hat");
        editor.submit().unwrap();

        // A fresh upload wins over the in-flight edit.
        editor.upload_image(image(b"C"));
        assert_eq!(editor.session().phase(), Phase::Ready);

        editor.set_prompt_text("make it blue");
        editor.submit().unwrap();

        first.send(Ok(edited(b"B"))).unwrap();
        assert_eq!(editor.next_completion().await, Some(Completion::Stale));
        assert_eq!(editor.session().phase(), Phase::Submitting);
        assert!(editor.session().current_result().is_none());

        second.send(Ok(edited(b"D"))).unwrap();
        assert_eq!(editor.next_completion().await, Some(Completion::Applied));
        assert_eq!(editor.session().current_result().unwrap().data, b"D");
        assert_eq!(editor.session().current_image().unwrap().data(), b"C");
        assert_eq!(editor.session().history().entries(), ["make it blue"]);
    }

    #[tokio::test]
    async fn test_second_submit_rejected_while_in_flight() {
        let (mut editor, client) = editor();
        let reply = client.expect_call();
        editor.upload_image(image(b"A"));
        editor.set_prompt_text("add a hat");
        editor.submit().unwrap();

        assert!(matches!(editor.submit(), Err(EditError::RequestInFlight)));

        reply.send(Ok(edited(b"B"))).unwrap();
        editor.next_completion().await;
        assert_eq!(client.prompts().len(), 1);
        assert_eq!(editor.next_completion().await, None);

        let reply = client.expect_call();
        editor.set_prompt_text("add a scarf");
        editor.submit().unwrap();
        assert!(matches!(editor.select_history(0), Err(EditError::RequestInFlight)));
        assert_eq!(editor.session().prompt_text(), "add a scarf");

        reply.send(Ok(edited(b"C"))).unwrap();
        assert_eq!(editor.next_completion().await, Some(Completion::Applied));
        assert_eq!(editor.session().history().entries(), ["add a scarf", "add a hat"]);
    }

    #[tokio::test]
    async fn test_submit_and_wait_and_history_reuse() {
        let (mut editor, client) = editor();
        editor.upload_image(image(b"A"));

        for _ in 0..2 {
            client.expect_call().send(Ok(edited(b"B"))).unwrap();
            editor.set_prompt_text("x");
            assert_eq!(editor.submit_and_wait().await.unwrap(), Completion::Applied);
        }
        assert_eq!(editor.session().history().entries(), ["x"]);

        editor.set_prompt_text("");
        assert!(editor.select_history(0).unwrap());
        assert_eq!(editor.session().prompt_text(), "x");
        assert!(!editor.select_history(5).unwrap());
        assert_eq!(editor.session().prompt_text(), "x");
        assert!(editor.session().last_error().is_none());
    }

    #[tokio::test]
    async fn test_snapshots_follow_transitions() {
        let (mut editor, client) = editor();
        let mut rx = editor.subscribe();
        assert_eq!(rx.borrow().phase, Phase::Idle);

        editor.upload_image(image(b"A"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().phase, Phase::Ready);

        client.expect_call().send(Ok(edited(b"B"))).unwrap();
        editor.set_prompt_text("add a hat");
        editor.submit_and_wait().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.phase, Phase::Succeeded);
        assert_eq!(snapshot.history, vec!["add a hat".to_string()]);

        editor.reset();
        editor.reset();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.prompt_text, "");
        assert_eq!(snapshot.history, vec!["add a hat".to_string()]);
    }

    #[tokio::test]
    async fn test_upload_file_errors_keep_image() {
        let (mut editor, _client) = editor();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"A").unwrap();

        editor.upload_file(&path).await.unwrap();
        assert_eq!(editor.session().phase(), Phase::Ready);

        let err = editor
            .upload_file(dir.path().join("missing.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::Read(_)));
        assert_eq!(editor.session().phase(), Phase::Failed);
        assert_eq!(editor.session().current_image().unwrap().data(), b"A");
    }
}
