use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualifiedStatus {
    pub phase: String,
    pub stage: String,
    pub status: String,
}

impl fmt::Display for QualifiedStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}:{}:{}",
            self.phase, self.stage, self.status
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusDef {
    pub code: String,
    #[serde(default)]
    pub valid_from: Vec<String>,
    #[serde(default)]
    pub processes: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StageDef {
    pub code: String,
    #[serde(default)]
    pub statuses: Vec<StatusDef>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PhaseDef {
    pub code: String,
    #[serde(default)]
    pub stages: Vec<StageDef>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExternalStatusEntry {
    pub code: String,
    pub source: String,
    pub mapped_to: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExternalStageMap {
    pub code: String,
    #[serde(default)]
    pub statuses: Vec<ExternalStatusEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExternalPhaseMap {
    pub code: String,
    #[serde(default)]
    pub stages: Vec<ExternalStageMap>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExternalStatusMap {
    #[serde(default)]
    pub phases: Vec<ExternalPhaseMap>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Grant {
    pub code: String,
    #[serde(default)]
    pub phases: Vec<PhaseDef>,
    #[serde(default)]
    pub external_status_map: Option<ExternalStatusMap>,
}

impl Grant {
    pub fn map_external_state(
        &self,
        current_phase: &str,
        current_stage: &str,
        external_code: &str,
        source: &str,
    ) -> Option<&str> {
        let map = self.external_status_map.as_ref()?;
        let phase = map.phases.iter().find(|phase| phase.code == current_phase)?;
        let stage = phase.stages.iter().find(|stage| stage.code == current_stage)?;
        let entry = stage
            .statuses
            .iter()
            .find(|entry| entry.code == external_code && entry.source == source)?;
        Some(entry.mapped_to.as_str())
    }

    pub fn status_definition(&self, target: &QualifiedStatus) -> Option<&StatusDef> {
        let phase = self.phases.iter().find(|phase| phase.code == target.phase)?;
        let stage = phase.stages.iter().find(|stage| stage.code == target.stage)?;
        stage
            .statuses
            .iter()
            .find(|status| status.code == target.status)
    }
}

pub fn resolve_target(
    mapped_to: &str,
    current_phase: &str,
    current_stage: &str,
) -> Option<QualifiedStatus> {
    let parts: Vec<&str> = mapped_to.split(':').collect();
    let (phase, stage, status) = match parts.as_slice() {
        [status] => (current_phase, current_stage, *status),
        [phase, stage, status] => {
            let phase = if phase.is_empty() { current_phase } else { *phase };
            let stage = if stage.is_empty() { current_stage } else { *stage };
            (phase, stage, *status)
        }
        _ => return None,
    };
    if status.trim().is_empty() {
        return None;
    }
    Some(QualifiedStatus {
        phase: phase.to_string(),
        stage: stage.to_string(),
        status: status.to_string(),
    })
}

pub fn transition_allowed(definition: &StatusDef, current: &QualifiedStatus) -> bool {
    if definition.valid_from.is_empty() {
        return true;
    }
    let current_qualified = current.to_string();
    definition.valid_from.iter().any(|entry| {
        if entry.contains(':') {
            entry == &current_qualified
        } else {
            entry == &current.status
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> QualifiedStatus {
        QualifiedStatus {
            phase: "PRE_AWARD".to_string(),
            stage: "REVIEW_APPLICATION".to_string(),
            status: "IN_PROGRESS".to_string(),
        }
    }

    fn grant() -> Grant {
        Grant {
            code: "GRANT_A".to_string(),
            phases: vec![PhaseDef {
                code: "PRE_AWARD".to_string(),
                stages: vec![
                    StageDef {
                        code: "REVIEW_APPLICATION".to_string(),
                        statuses: vec![
                            StatusDef {
                                code: "RECEIVED".to_string(),
                                valid_from: Vec::new(),
                                processes: Vec::new(),
                            },
                            StatusDef {
                                code: "IN_PROGRESS".to_string(),
                                valid_from: vec!["RECEIVED".to_string()],
                                processes: Vec::new(),
                            },
                            StatusDef {
                                code: "APPROVED".to_string(),
                                valid_from: vec!["IN_PROGRESS".to_string()],
                                processes: vec!["GENERATE_OFFER".to_string()],
                            },
                        ],
                    },
                    StageDef {
                        code: "REVIEW_OFFER".to_string(),
                        statuses: vec![StatusDef {
                            code: "OFFERED".to_string(),
                            valid_from: vec![
                                "PRE_AWARD:REVIEW_APPLICATION:APPROVED".to_string(),
                            ],
                            processes: Vec::new(),
                        }],
                    },
                ],
            }],
            external_status_map: Some(ExternalStatusMap {
                phases: vec![ExternalPhaseMap {
                    code: "PRE_AWARD".to_string(),
                    stages: vec![ExternalStageMap {
                        code: "REVIEW_APPLICATION".to_string(),
                        statuses: vec![
                            ExternalStatusEntry {
                                code: "CASE_APPROVED".to_string(),
                                source: "caseworks".to_string(),
                                mapped_to: "::APPROVED".to_string(),
                            },
                            ExternalStatusEntry {
                                code: "CASE_OFFERED".to_string(),
                                source: "caseworks".to_string(),
                                mapped_to: "PRE_AWARD:REVIEW_OFFER:OFFERED".to_string(),
                            },
                        ],
                    }],
                }],
            }),
        }
    }

    #[test]
    fn mapping_is_scoped_to_current_phase_and_stage() {
        let grant = grant();
        assert_eq!(
            grant.map_external_state("PRE_AWARD", "REVIEW_APPLICATION", "CASE_APPROVED", "caseworks"),
            Some("::APPROVED")
        );
        assert_eq!(
            grant.map_external_state("PRE_AWARD", "REVIEW_OFFER", "CASE_APPROVED", "caseworks"),
            None
        );
        assert_eq!(
            grant.map_external_state("PRE_AWARD", "REVIEW_APPLICATION", "CASE_APPROVED", "other"),
            None
        );
    }

    #[test]
    fn missing_map_yields_no_mapping() {
        let mut grant = grant();
        grant.external_status_map = None;
        assert_eq!(
            grant.map_external_state("PRE_AWARD", "REVIEW_APPLICATION", "CASE_APPROVED", "caseworks"),
            None
        );
    }

    #[test]
    fn bare_and_prefixed_targets_default_to_current_position() {
        let bare = resolve_target("APPROVED", "PRE_AWARD", "REVIEW_APPLICATION").expect("target");
        assert_eq!(bare.to_string(), "PRE_AWARD:REVIEW_APPLICATION:APPROVED");

        let prefixed =
            resolve_target("::APPROVED", "PRE_AWARD", "REVIEW_APPLICATION").expect("target");
        assert_eq!(prefixed, bare);
    }

    #[test]
    fn qualified_target_moves_phase_and_stage() {
        let target = resolve_target(
            "PRE_AWARD:REVIEW_OFFER:OFFERED",
            "PRE_AWARD",
            "REVIEW_APPLICATION",
        )
        .expect("target");
        assert_eq!(target.stage, "REVIEW_OFFER");
        assert_eq!(target.status, "OFFERED");
    }

    #[test]
    fn malformed_targets_are_rejected() {
        assert!(resolve_target("A:B", "P", "S").is_none());
        assert!(resolve_target("::", "P", "S").is_none());
        assert!(resolve_target("A:B:C:D", "P", "S").is_none());
    }

    #[test]
    fn empty_valid_from_is_reachable_from_anywhere() {
        let definition = StatusDef {
            code: "RECEIVED".to_string(),
            valid_from: Vec::new(),
            processes: Vec::new(),
        };
        assert!(transition_allowed(&definition, &current()));
    }

    #[test]
    fn bare_valid_from_matches_status_component_only() {
        let definition = StatusDef {
            code: "APPROVED".to_string(),
            valid_from: vec!["IN_PROGRESS".to_string()],
            processes: Vec::new(),
        };
        assert!(transition_allowed(&definition, &current()));

        let elsewhere = QualifiedStatus {
            phase: "POST_AWARD".to_string(),
            stage: "MONITORING".to_string(),
            status: "IN_PROGRESS".to_string(),
        };
        assert!(transition_allowed(&definition, &elsewhere));
    }

    #[test]
    fn qualified_valid_from_requires_exact_state() {
        let definition = StatusDef {
            code: "OFFERED".to_string(),
            valid_from: vec!["PRE_AWARD:REVIEW_APPLICATION:APPROVED".to_string()],
            processes: Vec::new(),
        };
        assert!(!transition_allowed(&definition, &current()));

        let approved = QualifiedStatus {
            phase: "PRE_AWARD".to_string(),
            stage: "REVIEW_APPLICATION".to_string(),
            status: "APPROVED".to_string(),
        };
        assert!(transition_allowed(&definition, &approved));
    }

    #[test]
    fn status_definition_lookup_walks_the_graph() {
        let grant = grant();
        let target = QualifiedStatus {
            phase: "PRE_AWARD".to_string(),
            stage: "REVIEW_OFFER".to_string(),
            status: "OFFERED".to_string(),
        };
        assert!(grant.status_definition(&target).is_some());

        let missing = QualifiedStatus {
            phase: "PRE_AWARD".to_string(),
            stage: "REVIEW_OFFER".to_string(),
            status: "WITHDRAWN".to_string(),
        };
        assert!(grant.status_definition(&missing).is_none());
    }
}
