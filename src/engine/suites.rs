//! Suite registry -- named, ordered groups of canonical case names.

use std::collections::HashMap;

use anyhow::Result;

use crate::storage::{self, Pool};

const BLAZE_SMOKE: &[&str] = &[
    "BlazeDemo_HomePage_Test",
    "BlazeDemo_Dropdown_Test",
    "BlazeDemo_FlightSearch_Boston_London",
    "BlazeDemo_FlightSearch_NewYork_Paris",
    "BlazeDemo_ChooseFlight_Test",
    "BlazeDemo_PriceConsistency_Test",
    "BlazeDemo_CompleteBooking_Valid",
    "BlazeDemo_CompleteBooking_EmptyFields",
    "BlazeDemo_CompleteBooking_InvalidCard",
    "BlazeDemo_EndToEnd_Flow",
];

const REQRES_SMOKE: &[&str] = &[
    "ReqRes_GetUsers_Page2",
    "ReqRes_GetSingleUser_Valid",
    "ReqRes_GetSingleUser_NotFound",
    "ReqRes_CreateUser",
    "ReqRes_UpdateUser_PUT",
    "ReqRes_PatchUser",
    "ReqRes_DeleteUser",
    "ReqRes_Register_Valid",
    "ReqRes_Register_MissingPassword",
    "ReqRes_Login_Valid",
];

/// Case names for one suite id, in execution order. Unknown ids map to an
/// empty list.
fn names_for(suite_id: &str) -> Vec<&'static str> {
    match suite_id.to_uppercase().as_str() {
        "BLAZE_SMOKE" => BLAZE_SMOKE.to_vec(),
        "REQRES_SMOKE" => REQRES_SMOKE.to_vec(),
        "COMBINED_SMOKE" => BLAZE_SMOKE.iter().chain(REQRES_SMOKE).copied().collect(),
        _ => Vec::new(),
    }
}

/// Resolves suite ids to catalog case ids.
#[derive(Clone)]
pub struct SuiteRegistry {
    pool: Pool,
}

impl SuiteRegistry {
    pub fn new(pool: Pool) -> Self {
        SuiteRegistry { pool }
    }

    pub fn known_suites() -> &'static [&'static str] {
        &["BLAZE_SMOKE", "REQRES_SMOKE", "COMBINED_SMOKE"]
    }

    /// Resolve a suite id to catalog ids, preserving suite order.
    ///
    /// Resolution never fails on its own: an unknown suite id, or a suite
    /// name with no catalog entry, silently contributes nothing. Only a
    /// storage problem is an error.
    pub fn resolve(&self, suite_id: &str) -> Result<Vec<i64>> {
        let names = names_for(suite_id);
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let by_name: HashMap<String, i64> = storage::list_cases(&self.pool)?
            .into_iter()
            .map(|case| (case.name, case.id))
            .collect();

        Ok(names
            .iter()
            .filter_map(|name| by_name.get(*name).copied())
            .collect())
    }
}
