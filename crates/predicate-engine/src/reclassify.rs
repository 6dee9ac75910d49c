//! Predicate / reference role reclassification.

use predicate_core::{CitationSummary, DeviceId, Role, RoleChange};

/// An SE-section citation makes the device a predicate; otherwise it is a
/// reference. De Novo devices qualify without any lineage.
pub fn reclassify(id: &DeviceId, prior: Option<Role>, citations: &CitationSummary) -> RoleChange {
    let se_docs = citations.documents.iter().filter(|d| d.has_se()).count();
    let to = if se_docs > 0 { Role::Predicate } else { Role::Reference };

    let reason = match (prior, to) {
        (None, Role::Predicate) => format!("new device cited in SE context by {se_docs} document(s)"),
        (None, Role::Reference) => "new device with no SE-context citation".to_string(),
        (Some(from), to) if from == to => match to {
            Role::Predicate => format!("SE-context citation confirmed by {se_docs} document(s)"),
            Role::Reference => "still no SE-context citation".to_string(),
        },
        (Some(_), Role::Predicate) => format!("upgraded: cited in SE context by {se_docs} document(s)"),
        (Some(_), Role::Reference) => "downgraded: no SE-context citation".to_string(),
    };

    let reason = if id.is_de_novo() && to == Role::Predicate {
        format!("{reason}; De Novo chain root")
    } else {
        reason
    };

    if prior.is_some_and(|p| p != to) {
        tracing::info!(device = %id, from = ?prior, to = to.as_str(), "role changed");
    }

    RoleChange { from: prior, to, reason }
}
