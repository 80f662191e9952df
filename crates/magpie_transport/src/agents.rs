//! User-agent rotation.

use magpie_error::{ConfigError, MagpieResult};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Shared rotation cursor over a finite list of user-agent strings.
///
/// The cursor advances every `rotate_after` seconds or every
/// `rotate_requests` requests - whichever trips first among the options that
/// are set. With neither set, the first agent is used for the whole run.
pub struct UserAgentCycle {
    agents: Vec<String>,
    rotate_after: Option<Duration>,
    rotate_requests: Option<u64>,
    state: Mutex<CycleState>,
}

struct CycleState {
    index: usize,
    since: Instant,
    requests: u64,
}

impl UserAgentCycle {
    /// Create a rotation cycle.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when `agents` is empty.
    pub fn new(
        agents: Vec<String>,
        rotate_after: Option<Duration>,
        rotate_requests: Option<u64>,
    ) -> MagpieResult<Self> {
        if agents.is_empty() {
            return Err(ConfigError::new("user_agents must not be empty").into());
        }
        Ok(Self {
            agents,
            rotate_after,
            rotate_requests,
            state: Mutex::new(CycleState {
                index: 0,
                since: Instant::now(),
                requests: 0,
            }),
        })
    }

    /// The agent to use for the next request, advancing the cursor when a
    /// rotation is due.
    pub fn next_agent(&self) -> String {
        let mut state = self.state.lock().unwrap();
        state.requests += 1;
        let due_by_time = self
            .rotate_after
            .is_some_and(|d| state.since.elapsed() >= d);
        let due_by_count = self.rotate_requests.is_some_and(|n| state.requests >= n);
        if due_by_time || due_by_count {
            state.index = (state.index + 1) % self.agents.len();
            state.since = Instant::now();
            state.requests = 0;
        }
        self.agents[state.index].clone()
    }
}

impl std::fmt::Debug for UserAgentCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserAgentCycle")
            .field("agents", &self.agents.len())
            .field("rotate_after", &self.rotate_after)
            .field("rotate_requests", &self.rotate_requests)
            .finish()
    }
}
