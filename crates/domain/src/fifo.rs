use serde::{Deserialize, Serialize};

use crate::util::now_ms;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FifoLock {
    pub actor: String,
    pub segregation_ref: String,
    pub locked: bool,
    pub locked_at_ms: Option<i64>,
}

impl FifoLock {
    pub fn acquired(actor: impl Into<String>, segregation_ref: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            segregation_ref: segregation_ref.into(),
            locked: true,
            locked_at_ms: Some(now_ms()),
        }
    }

    pub fn released(mut self) -> Self {
        self.locked = false;
        self.locked_at_ms = None;
        self
    }
}
