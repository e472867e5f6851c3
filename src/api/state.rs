use std::sync::Arc;

use crate::engine::{StatusTracker, SuiteRegistry};
use crate::report::ReportGenerator;
use crate::scheduler::RunScheduler;
use crate::storage::Pool;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub scheduler: Arc<RunScheduler>,
    pub tracker: Arc<StatusTracker>,
    pub suites: SuiteRegistry,
    pub reports: Arc<ReportGenerator>,
}
