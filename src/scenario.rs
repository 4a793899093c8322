//! Classification of the duplicate-search result into a creation scenario.
//!
//! The lookup endpoint answers with a positional array: element 0 is metadata
//! and every following element describes a matching account, with its
//! opportunities under `OPORTUNIDADES` and its sites under `UBICACIONES`.
//! The shape is undocumented upstream, so every read here tolerates missing
//! keys and wrong types instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

const OPPORTUNITIES_KEY: &str = "OPORTUNIDADES";
const LOCATIONS_KEY: &str = "UBICACIONES";
const OPPORTUNITY_STATUS_KEY: &str = "OPP: STATUS";
const ACCOUNT_ID_KEY: &str = "CUENTA: ID";

const CLOSED_STATUSES: [&str; 2] = ["Closed Won", "Closed Lost"];

/// Which Salesforce objects have to be created for a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scenario {
    /// The customer already has an opportunity in progress. Nothing is created.
    #[serde(rename = "Opportunity_open")]
    OpportunityOpen,
    /// Every existing opportunity is closed: add an opportunity and a quote.
    #[serde(rename = "Opportunity_close")]
    OpportunityClose,
    /// Account with sites but no opportunities: add an opportunity and a quote.
    #[serde(rename = "Opportunity_none")]
    OpportunityNone,
    /// Account without sites: add contact, site, opportunity and quote.
    #[serde(rename = "Location_none")]
    LocationNone,
    /// Unknown customer: create everything.
    #[serde(rename = "Client_none")]
    ClientNone,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::OpportunityOpen,
        Scenario::OpportunityClose,
        Scenario::OpportunityNone,
        Scenario::LocationNone,
        Scenario::ClientNone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::OpportunityOpen => "Opportunity_open",
            Scenario::OpportunityClose => "Opportunity_close",
            Scenario::OpportunityNone => "Opportunity_none",
            Scenario::LocationNone => "Location_none",
            Scenario::ClientNone => "Client_none",
        }
    }

    /// Whether the chat flow may go on to the creation step.
    pub fn allows_creation(&self) -> bool {
        !matches!(self, Scenario::OpportunityOpen)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownScenario(pub String);

impl fmt::Display for UnknownScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown scenario tag '{}'", self.0)
    }
}

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == s)
            .ok_or_else(|| UnknownScenario(s.to_string()))
    }
}

/// Scenario plus the reference account the chat flow must echo back on create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub scenario: Scenario,
    pub account_id: String,
}

pub fn classify(lookup: &Value) -> Classification {
    Classification {
        scenario: detect_scenario(lookup),
        account_id: extract_first_account_id(lookup),
    }
}

/// Rules, first match wins:
/// 1. not an array or fewer than two elements: `Client_none`
/// 2. any opportunity of element 1 not closed: `Opportunity_open`
/// 3. opportunities present (all closed): `Opportunity_close`
/// 4. locations present: `Opportunity_none`
/// 5. otherwise `Location_none`
pub fn detect_scenario(lookup: &Value) -> Scenario {
    let Some(first_match) = matches(lookup).and_then(|m| m.first()) else {
        return Scenario::ClientNone;
    };

    let opportunities = list_field(first_match, OPPORTUNITIES_KEY);
    if !opportunities.is_empty() {
        if opportunities.iter().any(is_open_opportunity) {
            return Scenario::OpportunityOpen;
        }
        return Scenario::OpportunityClose;
    }

    if list_field(first_match, LOCATIONS_KEY).is_empty() {
        Scenario::LocationNone
    } else {
        Scenario::OpportunityNone
    }
}

/// First non-empty `CUENTA: ID` from element 1 onward, or an empty string.
pub fn extract_first_account_id(lookup: &Value) -> String {
    matches(lookup)
        .into_iter()
        .flatten()
        .filter_map(|record| match record.get(ACCOUNT_ID_KEY)? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .next()
        .unwrap_or_default()
}

/// Elements after the metadata header, when the result has at least one.
fn matches(lookup: &Value) -> Option<&[Value]> {
    match lookup.as_array() {
        Some(items) if items.len() >= 2 => Some(&items[1..]),
        _ => None,
    }
}

fn list_field<'a>(record: &'a Value, key: &str) -> &'a [Value] {
    record
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// A missing or non-string status counts as open.
fn is_open_opportunity(opportunity: &Value) -> bool {
    match opportunity.get(OPPORTUNITY_STATUS_KEY).and_then(Value::as_str) {
        Some(status) => !CLOSED_STATUSES.contains(&status),
        None => true,
    }
}
