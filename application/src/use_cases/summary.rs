//! Summary Trigger
//!
//! Decides, once every primary channel is terminal, whether a summary
//! channel is created and what it is sent.

use crate::ports::backend_gateway::{Credential, CredentialMap, SummaryPayload};
use std::collections::BTreeMap;
use thinking_domain::{ChannelResult, Language, LanguageModels, Model};

/// Minimum usable answers for a summary to be worth asking for.
pub const MIN_SUMMARY_SOURCES: usize = 2;

/// Why no summary channel was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    TooFewResponses { usable: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "summary disabled"),
            SkipReason::TooFewResponses { usable } => {
                write!(f, "{usable} usable response(s), need {MIN_SUMMARY_SOURCES}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryDecision {
    /// `{model → final text}` to send
    Dispatch(BTreeMap<String, String>),
    Skip(SkipReason),
}

/// Apply the summary precondition to the settled primary channels.
///
/// Every non-error primary channel counts toward the precondition. The
/// forwarded map keeps only the language's subset, unless that leaves fewer
/// than [`MIN_SUMMARY_SOURCES`] answers, in which case all of them are sent.
pub fn decide(
    responses: &[ChannelResult],
    language: &Language,
    languages: &LanguageModels,
    enabled: bool,
) -> SummaryDecision {
    if !enabled {
        return SummaryDecision::Skip(SkipReason::Disabled);
    }

    let usable: Vec<(&Model, &str)> = responses
        .iter()
        .filter(|r| r.is_success())
        .filter_map(|r| Some((r.model()?, r.outcome.text())))
        .collect();

    if usable.len() < MIN_SUMMARY_SOURCES {
        return SummaryDecision::Skip(SkipReason::TooFewResponses {
            usable: usable.len(),
        });
    }

    let in_language = usable
        .iter()
        .filter(|(model, _)| languages.allows(language, model))
        .count();
    let restrict = in_language >= MIN_SUMMARY_SOURCES;

    SummaryDecision::Dispatch(
        usable
            .into_iter()
            .filter(|(model, _)| !restrict || languages.allows(language, model))
            .map(|(model, text)| (model.to_string(), text.to_string()))
            .collect(),
    )
}

pub fn payload(
    responses: BTreeMap<String, String>,
    question: &str,
    language: &Language,
    stream: bool,
) -> SummaryPayload {
    SummaryPayload {
        responses,
        question: question.to_string(),
        language: language.clone(),
        stream,
    }
}

/// Model whose key authenticates the summary call.
///
/// The language's summary model when it has a key, otherwise the first run
/// model that has one. Falls back to the summary model (or first run model)
/// without a key so the caller can report it as missing.
pub fn credential_owner<'a>(
    language: &Language,
    languages: &'a LanguageModels,
    run_models: &'a [Model],
    credentials: &CredentialMap,
) -> Option<&'a Model> {
    let preferred = languages.summary_model_for(language);
    preferred
        .filter(|m| credentials.contains(m))
        .or_else(|| run_models.iter().find(|m| credentials.contains(m)))
        .or(preferred)
        .or_else(|| run_models.first())
}

pub fn credential_for(
    owner: Option<&Model>,
    credentials: &CredentialMap,
) -> Option<Credential> {
    owner.and_then(|m| credentials.get(m)).cloned()
}
