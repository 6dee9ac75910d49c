//! Loading review inputs from JSON files.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use predicate_core::{DeviceId, RawMention, Role, SourceDocument, SubjectDevice};
use serde::de::DeserializeOwned;

pub fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {what} from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {what} in {}", path.display()))
}

/// Everything a review run reads from disk.
pub struct ReviewInputs {
    pub mentions: Vec<RawMention>,
    pub documents: Vec<SourceDocument>,
    pub subject: SubjectDevice,
    pub prior_roles: BTreeMap<DeviceId, Role>,
}

impl ReviewInputs {
    pub fn load(
        mentions: &Path,
        documents: &Path,
        subject: Option<&Path>,
        prior_roles: Option<&Path>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            mentions: load_json(mentions, "mentions")?,
            documents: load_json(documents, "documents")?,
            subject: subject
                .map(|p| load_json(p, "subject device"))
                .transpose()?
                .unwrap_or_default(),
            prior_roles: prior_roles
                .map(|p| load_json(p, "prior roles"))
                .transpose()?
                .unwrap_or_default(),
        })
    }
}
