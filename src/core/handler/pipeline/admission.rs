// src/core/handler/pipeline/admission.rs

//! Rate-limit admission, applied to every command frame after identity
//! resolution and before parsing.

use crate::core::errors::GatewayError;
use crate::core::state::ServerState;

pub fn check_admission(state: &ServerState, client_id: &str) -> Result<(), GatewayError> {
    state.limiter.admit(client_id)
}
