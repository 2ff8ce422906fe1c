//! Interactive chat with the agent.

use super::{print_json, print_sources};
use clap::Args;
use finagent_agent::FinancialAgent;
use finagent_core::{config::AppConfig, AppError, AppResult};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

const HELP: &str = "Commands: /reset, /trace, /image <path>, /image (clear), /quit";

/// Interactive conversation with the agent
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Image attached to the next question
    #[arg(long)]
    pub image: Option<PathBuf>,
}

/// A line typed at the prompt.
#[derive(Debug, PartialEq)]
enum Input {
    Empty,
    Quit,
    Reset,
    Trace,
    Help,
    Image(Option<PathBuf>),
    Unknown(String),
    Question(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if !line.starts_with('/') {
        return Input::Question(line.to_string());
    }

    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };
    match command {
        "/quit" | "/exit" => Input::Quit,
        "/reset" => Input::Reset,
        "/trace" => Input::Trace,
        "/help" => Input::Help,
        "/image" if arg.is_empty() => Input::Image(None),
        "/image" => Input::Image(Some(PathBuf::from(arg))),
        other => Input::Unknown(other.to_string()),
    }
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Starting chat session");
        config.validate()?;

        let mut agent = FinancialAgent::from_config(config)?;
        let mut editor = DefaultEditor::new()
            .map_err(|e| AppError::Other(format!("Failed to start line editor: {}", e)))?;
        let mut image = self.image.clone();

        println!("Financial agent chat. {}", HELP);

        loop {
            let line = match editor.readline("you> ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(AppError::Other(format!("Input error: {}", e))),
            };
            let _ = editor.add_history_entry(line.as_str());

            match parse_input(&line) {
                Input::Empty => {}
                Input::Quit => break,
                Input::Help => println!("{}", HELP),
                Input::Reset => {
                    agent.reset_conversation();
                    println!("Conversation reset.");
                }
                Input::Trace => print_json(&agent.execution_trace())?,
                Input::Image(path) => {
                    match path {
                        Some(ref p) => println!("Image attached: {}", p.display()),
                        None => println!("Image cleared."),
                    }
                    image = path;
                }
                Input::Unknown(command) => println!("Unknown command {}. {}", command, HELP),
                Input::Question(question) => {
                    match agent.process_query(&question, image.as_deref()).await {
                        Ok(response) => {
                            println!("\n{}", response.response);
                            print_sources(&response.citations);
                            println!();
                        }
                        Err(e) => {
                            tracing::error!("Query failed: {}", e);
                            println!("Error: {}", e);
                        }
                    }
                    // The attachment applies to one question
                    image = None;
                }
            }
        }

        tracing::info!("Chat session ended");
        Ok(())
    }
}
