//! # safe-pipeline
//!
//! The SAFE enrichment pipeline: neighborhood construction, significance
//! computation, top-attribute selection, domain clustering and trimming.
//!
//! Stages run in sequence, each consuming the previous stage's output:
//!
//! ```text
//! Network + AttributeMatrix
//!     │
//!     ▼
//! NeighborhoodBuilder ──► EnrichmentEngine ──► TopAttributeSelector
//!                                                     │
//!                                                     ▼
//!                            DomainTrimmer ◄── DomainClusterer
//! ```
//!
//! [`pipeline::run_analysis`] wires the stages together; each stage is also
//! usable on its own for callers that need intermediate results.

pub mod attributes;
pub mod domains;
pub mod enrichment;
pub mod linkage;
pub mod neighborhood;
pub mod pipeline;
pub mod trim;

// Re-export commonly used items
pub use attributes::{TopAttributeSelector, TopAttributes};
pub use domains::{DomainClusterer, DomainPartition};
pub use enrichment::{
    EnrichmentEngine, EnrichmentMethod, EnrichmentResult, NullProgress, ProgressSink,
};
pub use neighborhood::{NeighborhoodBuilder, NeighborhoodMatrix};
pub use pipeline::{run_analysis, run_analysis_with_progress, SafeAnalysis};
pub use trim::{DomainTrimmer, TrimOutcome};
