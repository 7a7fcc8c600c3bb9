//! Scripted collaborators for engine tests.

use crate::{ChallengeFuture, ChallengeIssuer, GatewayReply, GenerateFuture, GenerationCall, Generator};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Generator that replays a fixed list of replies and records every call.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<GatewayReply, String>>>,
    calls: Mutex<Vec<GenerationCall>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<GatewayReply, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|c| c.request.prompt)
            .collect()
    }
}

impl Generator for ScriptedGenerator {
    fn generate<'a>(&'a self, call: &'a GenerationCall) -> GenerateFuture<'a> {
        self.calls.lock().unwrap().push(call.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted reply left".to_string()));
        Box::pin(async move { reply })
    }
}

/// Challenge issuer that never has a token.
pub struct FailingChallenge;

impl ChallengeIssuer for FailingChallenge {
    fn issue<'a>(&'a self, _action: &'a str) -> ChallengeFuture<'a> {
        Box::pin(async { Err("challenge widget not loaded".to_string()) })
    }
}
