#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use zbakd::config::{AppConfig, PoolConfig};
use zbakd::core::executor::{CommandExecutor, CommandOutput};
use zbakd::core::notifications::{Notifier, Severity};

pub fn ok() -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: String::new(),
        stderr: String::new(),
    }
}

pub fn output(exit_code: i32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub input: Option<String>,
}

impl Invocation {
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Scripted command executor. Responses are keyed by a prefix of the full
/// command line; anything unscripted succeeds silently.
#[derive(Default)]
pub struct FakeExecutor {
    responses: Mutex<Vec<(String, CommandOutput)>>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, command_prefix: &str, response: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .push((command_prefix.to_string(), response));
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(Invocation::command_line)
            .collect()
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn run(&self, program: &str, args: &[String], input: Option<&str>) -> CommandOutput {
        let invocation = Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            input: input.map(str::to_string),
        };
        let line = invocation.command_line();
        self.calls.lock().unwrap().push(invocation);

        for (prefix, response) in self.responses.lock().unwrap().iter() {
            if line.starts_with(prefix.as_str()) {
                return response.clone();
            }
        }
        ok()
    }
}

/// Notifier that records every message for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Severity, String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Severity, String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.messages()
            .into_iter()
            .filter(|(severity, _, _)| *severity == Severity::Error)
            .map(|(_, subject, body)| (subject, body))
            .collect()
    }

    pub fn infos(&self) -> Vec<(String, String)> {
        self.messages()
            .into_iter()
            .filter(|(severity, _, _)| *severity == Severity::Info)
            .map(|(_, subject, body)| (subject, body))
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, severity: Severity, subject: &str, body: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((severity, subject.to_string(), body.to_string()));
    }
}

pub fn pool(name: &str, passphrase: Option<&str>, params: &[&str]) -> PoolConfig {
    PoolConfig {
        pool_name: name.to_string(),
        passphrase: passphrase.map(str::to_string),
        backup_parameters: params.iter().map(|p| p.to_string()).collect(),
        split_parameters: true,
    }
}

pub fn app_config(pools: Vec<(&str, PoolConfig)>, send_backup_output: bool) -> AppConfig {
    AppConfig {
        send_backup_output,
        notify: None,
        pools: pools
            .into_iter()
            .map(|(label, pool)| (label.to_string(), pool))
            .collect::<HashMap<_, _>>(),
    }
}
