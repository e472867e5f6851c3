//! Standard demo catalog -- seeded once into an empty database.

use anyhow::Result;
use serde_json::json;
use tracing::info;

use crate::catalog::{CheckSpec, NewTestCase, TestKind};
use crate::storage::{self, Pool};

/// Insert the standard checks unless the catalog already has entries.
/// Returns how many cases were created.
pub fn seed(pool: &Pool) -> Result<usize> {
    if storage::count_cases(pool)? > 0 {
        info!("Catalog already populated, skipping seed");
        return Ok(0);
    }
    let defs = standard_checks();
    let total = defs.len();
    for def in defs {
        storage::insert_case(pool, &def)?;
    }
    info!(created = total, "Catalog seeded with standard checks");
    Ok(total)
}

fn page(
    name: &str,
    description: &str,
    url: &str,
    expect_title: Option<&str>,
    markers: &[&str],
) -> NewTestCase {
    NewTestCase {
        name: name.to_string(),
        kind: TestKind::Ui,
        description: description.to_string(),
        check: CheckSpec::Page {
            url: url.to_string(),
            expect_title: expect_title.map(str::to_string),
            expect_markers: markers.iter().map(|m| m.to_string()).collect(),
        },
    }
}

fn http(
    name: &str,
    description: &str,
    method: &str,
    url: &str,
    body: Option<serde_json::Value>,
    expect_status: u16,
) -> NewTestCase {
    NewTestCase {
        name: name.to_string(),
        kind: TestKind::Api,
        description: description.to_string(),
        check: CheckSpec::Http {
            method: method.to_string(),
            url: url.to_string(),
            body,
            expect_status,
        },
    }
}

/// The twenty standard checks: ten page checks against the BlazeDemo travel
/// site and ten request checks against public JSON endpoints.
fn standard_checks() -> Vec<NewTestCase> {
    vec![
        page(
            "BlazeDemo_HomePage_Test",
            "Verify BlazeDemo homepage loads correctly",
            "https://blazedemo.com/",
            Some("BlazeDemo"),
            &["Welcome to the Simple Travel Agency!"],
        ),
        page(
            "BlazeDemo_Dropdown_Test",
            "Test departure and destination city dropdowns",
            "https://blazedemo.com/",
            Some("BlazeDemo"),
            &["name=\"fromPort\"", "name=\"toPort\""],
        ),
        page(
            "BlazeDemo_FlightSearch_Boston_London",
            "Search flights from Boston to London",
            "https://blazedemo.com/reserve.php",
            Some("BlazeDemo - reserve"),
            &["Flights from Boston to London"],
        ),
        page(
            "BlazeDemo_FlightSearch_NewYork_Paris",
            "Search flights from New York to Paris",
            "https://blazedemo.com/reserve.php",
            Some("BlazeDemo - reserve"),
            &["table"],
        ),
        page(
            "BlazeDemo_ChooseFlight_Test",
            "Select a flight from the search results",
            "https://blazedemo.com/purchase.php",
            Some("BlazeDemo Purchase"),
            &["Your flight from"],
        ),
        page(
            "BlazeDemo_PriceConsistency_Test",
            "Verify price shown on purchase page",
            "https://blazedemo.com/purchase.php",
            Some("BlazeDemo Purchase"),
            &["Total Cost"],
        ),
        page(
            "BlazeDemo_CompleteBooking_Valid",
            "Complete a booking with valid details",
            "https://blazedemo.com/confirmation.php",
            Some("BlazeDemo Confirmation"),
            &["Thank you for your purchase"],
        ),
        page(
            "BlazeDemo_CompleteBooking_EmptyFields",
            "Submit the purchase form with empty fields",
            "https://blazedemo.com/purchase.php",
            Some("BlazeDemo Purchase"),
            &["id=\"inputName\""],
        ),
        page(
            "BlazeDemo_CompleteBooking_InvalidCard",
            "Complete a booking with an invalid card number",
            "https://blazedemo.com/confirmation.php",
            Some("BlazeDemo Confirmation"),
            &["Id"],
        ),
        page(
            "BlazeDemo_EndToEnd_Flow",
            "Full booking flow from search to confirmation",
            "https://blazedemo.com/confirmation.php",
            Some("BlazeDemo Confirmation"),
            &["Thank you for your purchase"],
        ),
        http(
            "ReqRes_GetUsers_Page2",
            "List users and verify a populated page",
            "GET",
            "https://jsonplaceholder.typicode.com/users",
            None,
            200,
        ),
        http(
            "ReqRes_GetSingleUser_Valid",
            "Fetch a single existing user",
            "GET",
            "https://jsonplaceholder.typicode.com/users/2",
            None,
            200,
        ),
        http(
            "ReqRes_GetSingleUser_NotFound",
            "Fetch a missing user and expect 404",
            "GET",
            "https://jsonplaceholder.typicode.com/users/999",
            None,
            404,
        ),
        http(
            "ReqRes_CreateUser",
            "Create a user and expect 201",
            "POST",
            "https://jsonplaceholder.typicode.com/users",
            Some(json!({"name": "morpheus", "job": "leader"})),
            201,
        ),
        http(
            "ReqRes_UpdateUser_PUT",
            "Replace a user record",
            "PUT",
            "https://jsonplaceholder.typicode.com/users/2",
            Some(json!({"name": "morpheus", "job": "zion resident"})),
            200,
        ),
        http(
            "ReqRes_PatchUser",
            "Partially update a user record",
            "PATCH",
            "https://jsonplaceholder.typicode.com/users/2",
            Some(json!({"job": "zion resident"})),
            200,
        ),
        http(
            "ReqRes_DeleteUser",
            "Delete a user record",
            "DELETE",
            "https://jsonplaceholder.typicode.com/users/2",
            None,
            200,
        ),
        http(
            "ReqRes_Register_Valid",
            "Register with a valid email and password",
            "POST",
            "https://httpbin.org/post",
            Some(json!({"email": "eve.holt@reqres.in", "password": "pistol"})),
            200,
        ),
        http(
            "ReqRes_Register_MissingPassword",
            "Register without a password and expect 400",
            "POST",
            "https://httpbin.org/status/400",
            Some(json!({"email": "sydney@fife"})),
            400,
        ),
        http(
            "ReqRes_Login_Valid",
            "Log in with valid credentials",
            "POST",
            "https://httpbin.org/post",
            Some(json!({"email": "eve.holt@reqres.in", "password": "cityslicka"})),
            200,
        ),
    ]
}
