// gateway/src/api/command.rs
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use super::sessions::{authorize, set_auth};
use crate::commands::CommandKind;
use crate::error::GatewayError;
use crate::state::Gateway;

#[derive(Debug, Deserialize)]
struct CommandRequest {
    cmd: String,
    #[serde(default)]
    id: String,
}

/// `/command`: queue the command, ack it over the client's socket and
/// return at once. The outcome arrives later as a refresh notice.
pub async fn command(
    req: HttpRequest,
    body: web::Bytes,
    gateway: web::Data<Gateway>,
) -> Result<HttpResponse, GatewayError> {
    let (token, viewer) = authorize(&req, &gateway)?;

    let request: CommandRequest = serde_json::from_slice(&body)
        .map_err(|_| GatewayError::BadRequest("Can't deserialize command request.".to_string()))?;

    tracing::info!("- invoking command '{}' ({})", request.cmd, request.id);
    let kind = CommandKind::parse(&request.cmd, &request.id);
    let name = kind.name().to_string();
    gateway.commands.invoke(&viewer.email, kind)?;

    if let Err(e) = gateway.clients.send_ack(&token, &name) {
        tracing::info!("- command.ack: [{}] {}", viewer.email, e);
    }

    let mut response = HttpResponse::Ok().finish();
    set_auth(&mut response, &token, gateway.cookie_max_age);
    Ok(response)
}
