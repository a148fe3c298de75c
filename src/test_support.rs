//! Scripted stand-in for `ipmitool`, used by the unit tests.

use crate::error::Error;
use crate::ipmi::executor::CommandRunner;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Fake executor that replays scripted responses and records every
/// sub-command it receives.
#[derive(Default)]
pub struct FakeRunner {
    responses: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> FakeRunner {
        Default::default()
    }

    /// Queues a successful response for a sub-command.
    ///
    /// The last queued response keeps being returned once the queue runs dry,
    /// so a single `respond` covers any number of invocations.
    pub fn respond(&self, subcommand: &str, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry(subcommand.to_string())
            .or_default()
            .push_back(Ok(output.to_string()));
    }

    /// Queues a command failure for a sub-command.
    pub fn fail(&self, subcommand: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry(subcommand.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
    }

    /// Every sub-command received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, subcommand: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == subcommand)
            .count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, subcommand: &str) -> Result<String, Error> {
        self.calls.lock().unwrap().push(subcommand.to_string());

        let mut responses = self.responses.lock().unwrap();
        let response = match responses.get_mut(subcommand) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match response {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(Error::Command {
                command: subcommand.to_string(),
                message,
            }),
            None => Err(Error::Command {
                command: subcommand.to_string(),
                message: String::from("no scripted response"),
            }),
        }
    }
}
