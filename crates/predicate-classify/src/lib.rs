pub mod aggregate;
pub mod headings;
pub mod section;
pub mod strategy;

pub use aggregate::{DeviceCitations, aggregate, summarize};
pub use section::{Classified, ClassifyOutcome, DocumentSections, Heading, SectionClassifier, ocr_correct};
pub use strategy::{CentroidStrategy, KeywordWindowStrategy, SectionStrategy, StrategyVerdict};
