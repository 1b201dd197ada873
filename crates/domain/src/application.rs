use serde::{Deserialize, Serialize};

use crate::grant::QualifiedStatus;
use crate::util::now_ms;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Agreement {
    pub case_ref: String,
    pub status: String,
    pub data: serde_json::Value,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub client_ref: String,
    pub code: String,
    pub current_phase: String,
    pub current_stage: String,
    pub current_status: String,
    pub agreements: Vec<Agreement>,
    pub updated_at_ms: i64,
}

impl Application {
    pub fn new(
        client_ref: impl Into<String>,
        code: impl Into<String>,
        phase: impl Into<String>,
        stage: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            client_ref: client_ref.into(),
            code: code.into(),
            current_phase: phase.into(),
            current_stage: stage.into(),
            current_status: status.into(),
            agreements: Vec::new(),
            updated_at_ms: now_ms(),
        }
    }

    pub fn fully_qualified_status(&self) -> QualifiedStatus {
        QualifiedStatus {
            phase: self.current_phase.clone(),
            stage: self.current_stage.clone(),
            status: self.current_status.clone(),
        }
    }

    pub fn with_state(mut self, target: &QualifiedStatus) -> Self {
        self.current_phase = target.phase.clone();
        self.current_stage = target.stage.clone();
        self.current_status = target.status.clone();
        self.updated_at_ms = now_ms();
        self
    }

    pub fn agreement(&self, case_ref: &str) -> Option<&Agreement> {
        self.agreements
            .iter()
            .find(|agreement| agreement.case_ref == case_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_qualified_status_joins_components() {
        let application = Application::new(
            "client-1",
            "GRANT_A",
            "PRE_AWARD",
            "REVIEW_APPLICATION",
            "RECEIVED",
        );
        assert_eq!(
            application.fully_qualified_status().to_string(),
            "PRE_AWARD:REVIEW_APPLICATION:RECEIVED"
        );
    }

    #[test]
    fn with_state_replaces_all_three_components() {
        let application = Application::new(
            "client-1",
            "GRANT_A",
            "PRE_AWARD",
            "REVIEW_APPLICATION",
            "RECEIVED",
        );
        let target = QualifiedStatus {
            phase: "PRE_AWARD".to_string(),
            stage: "REVIEW_OFFER".to_string(),
            status: "OFFERED".to_string(),
        };
        let application = application.with_state(&target);
        assert_eq!(application.current_stage, "REVIEW_OFFER");
        assert_eq!(application.current_status, "OFFERED");
    }
}
