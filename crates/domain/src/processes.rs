use serde_json::{Value, json};

use crate::DomainResult;
use crate::application::{Agreement, Application};
use crate::delivery::{EventRecord, segregation_ref};
use crate::error::DomainError;
use crate::util::now_ms;

pub const OFFER_COMMANDS_TOPIC: &str = "grant-offer-commands";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryProcess {
    GenerateOffer,
    StoreAgreementCase,
    UpdateAgreementCase,
    WithdrawOffer,
}

impl EntryProcess {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "GENERATE_OFFER" => Some(Self::GenerateOffer),
            "STORE_AGREEMENT_CASE" => Some(Self::StoreAgreementCase),
            "UPDATE_AGREEMENT_CASE" => Some(Self::UpdateAgreementCase),
            "WITHDRAW_OFFER" => Some(Self::WithdrawOffer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateOffer => "GENERATE_OFFER",
            Self::StoreAgreementCase => "STORE_AGREEMENT_CASE",
            Self::UpdateAgreementCase => "UPDATE_AGREEMENT_CASE",
            Self::WithdrawOffer => "WITHDRAW_OFFER",
        }
    }

    pub fn run(
        &self,
        application: &mut Application,
        event_data: &Value,
        trace_parent: Option<&str>,
    ) -> DomainResult<Vec<EventRecord>> {
        match self {
            Self::GenerateOffer => offer_command(application, "GenerateOfferCommand", trace_parent),
            Self::WithdrawOffer => offer_command(application, "WithdrawOfferCommand", trace_parent),
            Self::StoreAgreementCase => store_agreement_case(application, event_data),
            Self::UpdateAgreementCase => update_agreement_case(application, event_data),
        }
    }
}

fn offer_command(
    application: &Application,
    command_type: &str,
    trace_parent: Option<&str>,
) -> DomainResult<Vec<EventRecord>> {
    let event = json!({
        "type": command_type,
        "data": {
            "clientRef": application.client_ref,
            "code": application.code,
        },
    });
    let record = EventRecord::outbox(
        OFFER_COMMANDS_TOPIC,
        event,
        segregation_ref(&application.client_ref, &application.code),
        trace_parent.map(str::to_string),
    )?;
    Ok(vec![record])
}

fn case_ref(event_data: &Value) -> DomainResult<String> {
    event_data
        .get("caseRef")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DomainError::Validation("missing caseRef in event data".into()))
}

fn case_status(event_data: &Value) -> String {
    event_data
        .get("caseStatus")
        .and_then(Value::as_str)
        .unwrap_or("OPEN")
        .to_string()
}

fn store_agreement_case(
    application: &mut Application,
    event_data: &Value,
) -> DomainResult<Vec<EventRecord>> {
    let case_ref = case_ref(event_data)?;
    let agreement = Agreement {
        case_ref: case_ref.clone(),
        status: case_status(event_data),
        data: event_data.clone(),
        updated_at_ms: now_ms(),
    };
    match application
        .agreements
        .iter_mut()
        .find(|existing| existing.case_ref == case_ref)
    {
        Some(existing) => *existing = agreement,
        None => application.agreements.push(agreement),
    }
    Ok(Vec::new())
}

fn update_agreement_case(
    application: &mut Application,
    event_data: &Value,
) -> DomainResult<Vec<EventRecord>> {
    let case_ref = case_ref(event_data)?;
    let agreement = application
        .agreements
        .iter_mut()
        .find(|existing| existing.case_ref == case_ref)
        .ok_or_else(|| {
            DomainError::Validation(format!("no agreement case {case_ref} to update"))
        })?;
    agreement.status = case_status(event_data);
    agreement.data = event_data.clone();
    agreement.updated_at_ms = now_ms();
    Ok(Vec::new())
}
