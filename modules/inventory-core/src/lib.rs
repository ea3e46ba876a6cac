//! Stock domain types plus the three pure decision functions that sit
//! above them: the optimistic mutator (C3), the FEFO allocator (C4), and
//! the slotting scorer (C5).

mod fefo;
mod model;
mod mutator;
mod slotting;

pub use fefo::{
    allocate, AllocationLine, AllocationRequest, AllocationSource, FefoResult, SkipReason,
    SkippedSource, SourceLot,
};
pub use model::{
    LotBatch, LotStatus, Reservation, ReservationReference, ReservationStatus, StockLevel,
};
pub use mutator::{MutatorError, MutatorResult, StockDeltas, StockMutator};
pub use slotting::{
    score_locations, AbcClass, LocationCandidate, LocationKind, ScoreBreakdown, ScoreWeights,
    ScoredLocation, SlottingContext, TemperatureZone,
};
