//! Interactive line-based chat session.
//!
//! Reads commands from any `BufRead`, writes prompts and replies to any
//! `Write`, and drives the message log, the invocation client and the export
//! pipeline. One invocation is in flight at a time.

use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};

use crate::conversation::{MessageLog, Turn};
use crate::export::{self, ExportFormat};
use crate::llm::{self, Endpoint, InvokeError, RetryPolicy};
use crate::model::{GenerationParams, Model};

const GREETING: &str = "Hello! Please introduce yourself briefly.";

const HELP: &str = "\nAvailable commands:\n\
Type your message: Chat with the AI\n\
help: Show commands\n\
scribe: Save last response or extract code blocks as a file or script\n\
quit: Exit chat";

/// A line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Scribe,
    Chat(String),
}

impl Command {
    /// Parse a line; blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(match line.to_lowercase().as_str() {
            "help" => Command::Help,
            "quit" => Command::Quit,
            "scribe" => Command::Scribe,
            _ => Command::Chat(line.to_string()),
        })
    }
}

/// Fixed settings for one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: Model,
    pub params: GenerationParams,
    pub history_window: usize,
    pub retry: RetryPolicy,
    /// Directory exported files are written to.
    pub output_dir: PathBuf,
}

/// Owns the conversation for the lifetime of the process.
pub struct Session<E> {
    endpoint: E,
    settings: SessionSettings,
    log: MessageLog,
}

impl<E: Endpoint> Session<E> {
    pub fn new(endpoint: E, settings: SessionSettings, log: MessageLog) -> Self {
        Self {
            endpoint,
            settings,
            log,
        }
    }

    #[cfg(test)]
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Ask the model to introduce itself. Failure is reported but not fatal.
    pub async fn greet<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.log.append(Turn::user(GREETING));
        match self.complete().await {
            Ok(text) => {
                writeln!(out, "\nAssistant:\n{}", text)?;
            }
            Err(e) => {
                writeln!(out, "Error getting initial greeting: {}", e)?;
                writeln!(out, "Continuing with chat. Type your first message.")?;
            }
        }
        Ok(())
    }

    /// Run the command loop until `quit` or end of input.
    pub async fn run<R: BufRead, W: Write>(&mut self, mut input: R, out: &mut W) -> Result<()> {
        writeln!(out, "\nType 'help' to see available commands")?;

        loop {
            let Some(line) = prompt(&mut input, out, "\nYou (help/quit/scribe): ")? else {
                writeln!(out)?;
                break;
            };

            match Command::parse(&line) {
                None => continue,
                Some(Command::Help) => writeln!(out, "{}", HELP)?,
                Some(Command::Quit) => {
                    writeln!(out, "Goodbye!")?;
                    break;
                }
                Some(Command::Scribe) => self.scribe(&mut input, out)?,
                Some(Command::Chat(text)) => self.chat(text, out).await?,
            }
        }

        info!("Session ended after {} turns", self.log.len());
        Ok(())
    }

    /// Send a user message and print the reply.
    pub async fn chat<W: Write>(&mut self, text: String, out: &mut W) -> Result<()> {
        self.log.append(Turn::user(text));
        writeln!(out, "\nGetting response...")?;

        match self.complete().await {
            Ok(reply) => writeln!(out, "\nAssistant:\n{}", reply)?,
            Err(e) => writeln!(out, "\nError: {}", e)?,
        }
        Ok(())
    }

    /// Invoke the model on the current log.
    ///
    /// Success appends an assistant turn. Failure appends a system notice,
    /// which later requests ignore, so the error never reads as model output.
    async fn complete(&mut self) -> Result<String, InvokeError> {
        let settings = &self.settings;
        let body = settings.model.family.build_request(
            &self.log,
            &settings.params,
            settings.history_window,
        );

        match llm::invoke(&self.endpoint, &settings.model, &body, &settings.retry).await {
            Ok(text) => {
                self.log.append(Turn::assistant(text.clone()));
                Ok(text)
            }
            Err(e) => {
                error!("Error invoking model {}: {}", settings.model.id, e);
                self.log
                    .append(Turn::system(format!("Model invocation failed: {}", e)));
                Err(e)
            }
        }
    }

    /// Export the last assistant reply to a file.
    fn scribe<R: BufRead, W: Write>(&self, input: &mut R, out: &mut W) -> Result<()> {
        let Some(response) = self.log.last_assistant() else {
            writeln!(out, "No response to save yet.")?;
            return Ok(());
        };

        let Some(keyword) = prompt(
            input,
            out,
            "Save as (python/py/bash/sh/markdown/md/text/txt): ",
        )?
        else {
            return Ok(());
        };
        let format = ExportFormat::parse(&keyword);
        let result = export::export(response, format);
        if let Some(note) = result.note(format) {
            writeln!(out, "{}", note)?;
        }

        let prompt_text = format!("Enter filename (without {} extension): ", result.extension);
        let Some(stem) = prompt(input, out, &prompt_text)? else {
            return Ok(());
        };
        let stem = stem.trim();
        if stem.is_empty() {
            writeln!(out, "No filename given. Nothing saved.")?;
            return Ok(());
        }

        match export::write_export(&self.settings.output_dir, stem, &result) {
            Ok(path) => writeln!(out, "File saved as {}", path.display())?,
            Err(e) => {
                error!("Export failed: {:#}", e);
                writeln!(out, "Error: {:#}", e)?;
            }
        }
        Ok(())
    }
}

/// Print `text` and read one line; `None` at end of input.
fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, text: &str) -> Result<Option<String>> {
    write!(out, "{}", text)?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::llm::EndpointError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies with scripted texts and records every request body.
    struct FakeEndpoint {
        replies: Mutex<VecDeque<Result<String, EndpointError>>>,
        requests: Mutex<Vec<serde_json::Value>>,
    }

    impl FakeEndpoint {
        fn new(replies: Vec<Result<String, EndpointError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Endpoint for FakeEndpoint {
        async fn invoke(&self, _model_id: &str, body: Vec<u8>) -> Result<Vec<u8>, EndpointError> {
            self.requests
                .lock()
                .unwrap()
                .push(serde_json::from_slice(&body).unwrap());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".to_string()))?;
            Ok(serde_json::to_vec(&serde_json::json!({
                "content": [{"type": "text", "text": reply}]
            }))
            .unwrap())
        }
    }

    fn session(
        replies: Vec<Result<String, EndpointError>>,
        output_dir: PathBuf,
    ) -> Session<FakeEndpoint> {
        let settings = SessionSettings {
            model: Model::resolve("anthropic.claude-3-haiku-20240307-v1:0").unwrap(),
            params: GenerationParams::default(),
            history_window: 10,
            retry: RetryPolicy::new(0, Duration::ZERO),
            output_dir,
        };
        Session::new(
            FakeEndpoint::new(replies),
            settings,
            MessageLog::with_system_prompt("be helpful"),
        )
    }

    async fn run_with(session: &mut Session<FakeEndpoint>, input: &str) -> String {
        let mut out = Vec::new();
        session
            .run(Cursor::new(input.as_bytes()), &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("HELP"), Some(Command::Help));
        assert_eq!(Command::parse(" quit "), Some(Command::Quit));
        assert_eq!(Command::parse("Scribe"), Some(Command::Scribe));
        assert_eq!(
            Command::parse("help me"),
            Some(Command::Chat("help me".to_string()))
        );
        assert_eq!(Command::parse("   "), None);
    }

    #[tokio::test]
    async fn test_chat_appends_turns_and_prints_reply() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(vec![Ok("Hi!".to_string())], dir.path().to_path_buf());

        let output = run_with(&mut session, "hello\nquit\n").await;

        assert!(output.contains("Assistant:\nHi!"));
        assert!(output.contains("Goodbye!"));
        let roles: Vec<_> = session.log().turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);

        let requests = session.endpoint.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["system"], "be helpful");
        assert_eq!(requests[0]["messages"][0]["content"], "hello");
    }

    #[tokio::test]
    async fn test_failed_invocation_is_not_an_assistant_turn() {
        let dir = tempfile::tempdir().unwrap();
        let rejected = EndpointError::Rejected {
            status: 400,
            message: "bad request".to_string(),
        };
        let mut session = session(
            vec![Err(rejected), Ok("recovered".to_string())],
            dir.path().to_path_buf(),
        );

        let output = run_with(&mut session, "first\nsecond\n").await;

        assert!(output.contains("Error: request rejected with status 400: bad request"));
        assert!(output.contains("Assistant:\nrecovered"));
        let turns = session.log().turns();
        assert_eq!(turns[2].role, Role::System);
        assert!(turns[2].content.contains("bad request"));
        assert_eq!(session.log().last_assistant(), Some("recovered"));

        let requests = session.endpoint.requests.lock().unwrap();
        assert_eq!(requests[1]["system"], "be helpful");
        assert_eq!(requests[1]["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_throttled_without_retries_reports_max_retries() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(
            vec![Err(EndpointError::Throttled("slow down".to_string()))],
            dir.path().to_path_buf(),
        );

        let output = run_with(&mut session, "hi\n").await;

        assert!(output.contains("Error: maximum retries exceeded"));
        assert!(session.log().last_assistant().is_none());
    }

    #[tokio::test]
    async fn test_scribe_without_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(vec![], dir.path().to_path_buf());

        let output = run_with(&mut session, "scribe\nquit\n").await;

        assert!(output.contains("No response to save yet."));
    }

    #[tokio::test]
    async fn test_scribe_extracts_python_block() {
        let dir = tempfile::tempdir().unwrap();
        let reply = "Here you go:\n```python\nprint(1)\n```\nEnjoy!".to_string();
        let mut session = session(vec![Ok(reply)], dir.path().to_path_buf());

        let output = run_with(&mut session, "write code\nscribe\npy\nhello\nquit\n").await;

        assert!(output.contains("Extracted 1 Python block."));
        assert!(output.contains("Enter filename (without .py extension): "));
        let saved = std::fs::read_to_string(dir.path().join("hello.py")).unwrap();
        assert_eq!(saved, "print(1)");
    }

    #[tokio::test]
    async fn test_scribe_falls_back_with_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(vec![Ok("plain words".to_string())], dir.path().to_path_buf());

        let output = run_with(&mut session, "hi\nscribe\nsh\nscript\n").await;

        assert!(output.contains("No bash code blocks found. Saving full response..."));
        let saved = std::fs::read_to_string(dir.path().join("script.sh")).unwrap();
        assert_eq!(saved, "#!/bin/bash\n\nplain words");
    }

    #[tokio::test]
    async fn test_scribe_empty_filename_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(vec![Ok("words".to_string())], dir.path().to_path_buf());

        let output = run_with(&mut session, "hi\nscribe\ntxt\n\nquit\n").await;

        assert!(output.contains("No filename given."));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_greeting_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(
            vec![Err(EndpointError::Transport("connection refused".to_string()))],
            dir.path().to_path_buf(),
        );

        let mut out = Vec::new();
        session.greet(&mut out).await.unwrap();
        let output = String::from_utf8(out).unwrap();

        assert!(output.contains("Error getting initial greeting"));
        assert!(output.contains("Continuing with chat."));
        assert_eq!(session.log().turns()[1].content, GREETING);
    }

    #[tokio::test]
    async fn test_help_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(vec![], dir.path().to_path_buf());

        let output = run_with(&mut session, "\n  \nhelp\n").await;

        assert!(output.contains("Available commands:"));
        assert!(output.contains("scribe: Save last response"));
        assert!(session.endpoint.requests.lock().unwrap().is_empty());
    }
}
