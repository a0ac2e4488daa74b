use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
};
use std::sync::Arc;

use super::http::HttpPostman;
use super::protocol::{
    ClientGetResponse, ClientPutRequest, ClientPutResponse, Envelope, LocalDataResponse,
    NodesResponse,
};
use crate::node::protocol::{
    Command, GetAllLocalRequest, GetNodesRequest, GetRequest, PutRequest,
};
use crate::storage::Value;

pub async fn handle_message(
    Extension(postman): Extension<Arc<HttpPostman>>,
    Json(envelope): Json<Envelope>,
) -> StatusCode {
    postman.accept(envelope);
    StatusCode::ACCEPTED
}

pub async fn handle_put(
    Extension(postman): Extension<Arc<HttpPostman>>,
    Json(req): Json<ClientPutRequest>,
) -> (StatusCode, Json<ClientPutResponse>) {
    let answer = postman
        .ask(move |reply_to| {
            Command::PutRequest(PutRequest {
                key: req.key,
                value: Value::unversioned(req.value),
                reply_to,
            })
        })
        .await;

    match answer {
        Ok(Command::PutAnswer(answer)) => (
            StatusCode::OK,
            Json(ClientPutResponse {
                success: answer.success,
            }),
        ),
        Ok(other) => {
            tracing::error!("Unexpected answer to put: {}", other.kind());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ClientPutResponse { success: false }),
            )
        }
        Err(e) => {
            tracing::warn!("Put did not complete: {}", e);
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(ClientPutResponse { success: false }),
            )
        }
    }
}

pub async fn handle_get(
    Extension(postman): Extension<Arc<HttpPostman>>,
    Path(key): Path<String>,
) -> (StatusCode, Json<ClientGetResponse>) {
    let missing = |key: String| ClientGetResponse {
        key,
        value: None,
        found: false,
    };
    let request_key = key.clone();
    let answer = postman
        .ask(move |reply_to| {
            Command::GetRequest(GetRequest {
                key: request_key,
                reply_to,
            })
        })
        .await;

    match answer {
        Ok(Command::GetAnswer(answer)) => {
            let status = if answer.found {
                StatusCode::OK
            } else {
                StatusCode::NOT_FOUND
            };
            (
                status,
                Json(ClientGetResponse {
                    key: answer.key,
                    value: answer.value,
                    found: answer.found,
                }),
            )
        }
        Ok(other) => {
            tracing::error!("Unexpected answer to get: {}", other.kind());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(missing(key)))
        }
        Err(e) => {
            tracing::warn!("Get did not complete: {}", e);
            (StatusCode::GATEWAY_TIMEOUT, Json(missing(key)))
        }
    }
}

pub async fn handle_debug_local(
    Extension(postman): Extension<Arc<HttpPostman>>,
) -> (StatusCode, Json<LocalDataResponse>) {
    let answer = postman
        .ask(|reply_to| Command::GetAllLocalRequest(GetAllLocalRequest { reply_to }))
        .await;

    match answer {
        Ok(Command::GetAllLocalAnswer(answer)) => (
            StatusCode::OK,
            Json(LocalDataResponse {
                values: answer.values,
            }),
        ),
        _ => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(LocalDataResponse { values: Vec::new() }),
        ),
    }
}

pub async fn handle_debug_nodes(
    Extension(postman): Extension<Arc<HttpPostman>>,
) -> (StatusCode, Json<NodesResponse>) {
    let answer = postman
        .ask(|reply_to| Command::GetNodesRequest(GetNodesRequest { reply_to }))
        .await;

    match answer {
        Ok(Command::GetNodesAnswer(answer)) => (
            StatusCode::OK,
            Json(NodesResponse {
                nodes: answer.nodes,
            }),
        ),
        _ => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(NodesResponse { nodes: Vec::new() }),
        ),
    }
}
