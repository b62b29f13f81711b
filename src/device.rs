// ABOUTME: Charger device identifiers in the dashboard's `<evse_id>_<connector_id>` form
// ABOUTME: Parses them and turns them into inference requests

use std::fmt;
use std::str::FromStr;

use crate::error::InferenceError;
use crate::remote::InferenceRequest;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId {
    pub evse_id: String,
    pub connector_id: u32,
}

impl DeviceId {
    pub fn new(evse_id: impl Into<String>, connector_id: u32) -> Self {
        Self {
            evse_id: evse_id.into(),
            connector_id,
        }
    }

    pub fn to_request(&self, limit: Option<u32>) -> InferenceRequest {
        let request = InferenceRequest::new(self.evse_id.clone(), self.connector_id);
        match limit {
            Some(limit) => request.with_limit(limit),
            None => request,
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.evse_id, self.connector_id)
    }
}

impl FromStr for DeviceId {
    type Err = InferenceError;

    // EVSE ids may themselves contain underscores; the connector is after the last one.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| InferenceError::InvalidDevice {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (evse_id, connector) = input
            .trim()
            .rsplit_once('_')
            .ok_or_else(|| invalid("expected format evseId_connectorId"))?;

        if evse_id.is_empty() {
            return Err(invalid("evse id is empty"));
        }

        let connector_id: u32 = connector
            .parse()
            .map_err(|_| invalid("connector id is not a number"))?;
        if connector_id < 1 {
            return Err(invalid("connector id must be >= 1"));
        }

        Ok(Self::new(evse_id, connector_id))
    }
}
