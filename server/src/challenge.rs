//! Chat commands for challenging other players to a race

use crate::entry_car::EntryCar;
use crate::outbox::{Outbox, OutboxError};
use crate::race::{Race, RaceError, RaceHandle};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How long a challenge stays open for `/accept`
pub const CHALLENGE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Race(String),
    Accept,
    Unknown(String),
}

impl ChatCommand {
    /// Parses a chat line. Returns None for plain chat.
    pub fn parse(message: &str) -> Option<ChatCommand> {
        let command = message.trim().strip_prefix('/')?;
        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (command, ""),
        };

        Some(match name.to_ascii_lowercase().as_str() {
            "race" => ChatCommand::Race(argument.to_string()),
            "accept" => ChatCommand::Accept,
            _ => ChatCommand::Unknown(name.to_string()),
        })
    }
}

#[derive(Debug)]
struct PendingChallenge {
    challenger: Arc<EntryCar>,
    issued: Instant,
}

/// Open challenges, keyed by the session id of the challenged player
#[derive(Debug, Default)]
pub struct ChallengeBook {
    pending: HashMap<u8, PendingChallenge>,
}

impl ChallengeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles `/race <name>`. `target` is the car the name resolved to.
    pub fn challenge(
        &mut self,
        challenger: &Arc<EntryCar>,
        target: Option<Arc<EntryCar>>,
        outbox: &Outbox,
    ) -> Result<(), OutboxError> {
        let Some(target) = target else {
            return outbox.send_chat(challenger, "Player not found.");
        };

        if target.session_id == challenger.session_id {
            return outbox.send_chat(challenger, "You cannot challenge yourself.");
        }
        if challenger.is_racing() {
            return outbox.send_chat(challenger, "You are already in a race.");
        }
        if target.is_racing() {
            return outbox.send_chat(challenger, &format!("{} is already in a race.", target.name));
        }

        self.pending.insert(
            target.session_id,
            PendingChallenge {
                challenger: Arc::clone(challenger),
                issued: Instant::now(),
            },
        );

        outbox.send_chat(
            &target,
            &format!(
                "{} has challenged you to a race. Send /accept within {} seconds to accept.",
                challenger.name,
                CHALLENGE_TIMEOUT.as_secs()
            ),
        )?;
        outbox.send_chat(challenger, &format!("You have challenged {} to a race.", target.name))
    }

    /// Handles `/accept`, starting the race when a challenge is open
    pub fn accept(
        &mut self,
        car: &Arc<EntryCar>,
        line_up_required: bool,
        outbox: &Outbox,
    ) -> Result<Option<RaceHandle>, OutboxError> {
        let challenge = match self.pending.remove(&car.session_id) {
            Some(challenge)
                if challenge.issued.elapsed() <= CHALLENGE_TIMEOUT
                    && challenge.challenger.is_connected() =>
            {
                challenge
            }
            _ => {
                outbox.send_chat(car, "There is no pending race challenge.")?;
                return Ok(None);
            }
        };

        let result = Race::create_and_start(
            Arc::clone(&challenge.challenger),
            Arc::clone(car),
            line_up_required,
            outbox.clone(),
        );

        match result {
            Ok(handle) => {
                info!(
                    "{} accepted the race challenge from {}",
                    car.name, challenge.challenger.name
                );
                Ok(Some(handle))
            }
            Err(RaceError::AlreadyRacing(name)) if name == car.name => {
                outbox.send_chat(car, "You are already in a race.")?;
                Ok(None)
            }
            Err(RaceError::AlreadyRacing(name)) => {
                outbox.send_chat(car, &format!("{} is already in a race.", name))?;
                Ok(None)
            }
            Err(RaceError::ServerClosed(e)) => Err(e),
        }
    }

    /// Drops every challenge the given player is part of
    pub fn forget(&mut self, session_id: u8) {
        self.pending.remove(&session_id);
        self.pending
            .retain(|_, challenge| challenge.challenger.session_id != session_id);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
