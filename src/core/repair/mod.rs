mod executor;
mod planner;

pub use executor::{RepairExecutor, RepairFailure, RepairReport, RepairRun};
pub use planner::{plan, RepairOperation, RepairPlan};
