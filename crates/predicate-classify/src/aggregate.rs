//! Citation aggregation: group classified mentions by device.

use std::collections::{BTreeMap, BTreeSet};

use predicate_core::{
    CitationSummary, DeviceId, DeviceMention, DocumentCitation, NON_SE_DOCUMENT_WEIGHT,
    SE_DOCUMENT_WEIGHT, SectionCategory,
};

/// All mentions of one device and the evidence summary built from them.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCitations {
    pub mentions: Vec<DeviceMention>,
    pub summary: CitationSummary,
}

/// Group mentions by device identifier, ordered by identifier.
///
/// Every mention lands in exactly one group. A document counts once per
/// device no matter how often it repeats the identifier.
pub fn aggregate(mentions: Vec<DeviceMention>) -> BTreeMap<DeviceId, DeviceCitations> {
    let mut grouped: BTreeMap<DeviceId, Vec<DeviceMention>> = BTreeMap::new();
    for mention in mentions {
        grouped.entry(mention.device_id.clone()).or_default().push(mention);
    }

    grouped
        .into_iter()
        .map(|(id, mentions)| {
            let summary = summarize(&mentions);
            tracing::debug!(
                device = %id,
                sources = summary.unique_source_count,
                weighted = summary.weighted_citation_score,
                "aggregated citations"
            );
            (id, DeviceCitations { mentions, summary })
        })
        .collect()
}

/// Build the citation summary for one device's mentions.
pub fn summarize(mentions: &[DeviceMention]) -> CitationSummary {
    // Document order follows first appearance.
    let mut order: Vec<&str> = Vec::new();
    let mut per_doc: BTreeMap<&str, (BTreeSet<SectionCategory>, usize)> = BTreeMap::new();
    let mut histogram: BTreeMap<SectionCategory, usize> = BTreeMap::new();
    let mut low_confidence = 0;

    for m in mentions {
        let entry = per_doc.entry(m.document_id.as_str()).or_insert_with(|| {
            order.push(m.document_id.as_str());
            (BTreeSet::new(), 0)
        });
        entry.0.insert(m.section.category);
        entry.1 += 1;
        *histogram.entry(m.section.category).or_default() += 1;
        if m.section.low_confidence_section {
            low_confidence += 1;
        }
    }

    let documents: Vec<DocumentCitation> = order
        .into_iter()
        .filter_map(|doc| {
            let (categories, count) = per_doc.remove(doc)?;
            let weight = if categories.contains(&SectionCategory::Se) {
                SE_DOCUMENT_WEIGHT
            } else {
                NON_SE_DOCUMENT_WEIGHT
            };
            Some(DocumentCitation {
                document_id: doc.to_string(),
                categories,
                mention_count: count,
                weight,
            })
        })
        .collect();

    CitationSummary {
        unique_source_count: documents.len(),
        weighted_citation_score: documents.iter().map(|d| d.weight).sum(),
        documents,
        histogram,
        low_confidence_mentions: low_confidence,
    }
}
