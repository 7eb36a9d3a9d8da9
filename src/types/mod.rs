//! Core types: identifiers, incidences, marks and run tokens.

pub mod id;
pub mod incidence;
pub mod mark;
pub mod run;

pub use id::{
    EdgeId, Element, GlobalId, IdParseError, IncidenceId, PartitionId, VertexId, LOCAL_ID_BITS,
    SENTINEL_LOCAL_ID,
};
pub use incidence::{Direction, Incidence, TraversalDirection};
pub use mark::{ElementCounts, GlobalMarks, Mark, MarkTable};
pub use run::{DiscoveryOrder, RunState, RunToken};
