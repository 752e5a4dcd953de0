/// Customer return status
use crate::{
    context::AppContext,
    error::{AppError, ErrorEnvelope},
    request::RequestContext,
};
use axum::{extract::Path, routing::get, Json, Router};
use serde::Serialize;

const MAX_ORDER_NUMBER_LEN: usize = 64;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/returns/:order_number/status", get(get_return_status))
}

/// Stage of a return request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnStage {
    Processing,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnStatus {
    pub status: ReturnStage,
    pub current_step: u32,
    pub estimated_days: u32,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReturnStatusResponse {
    pub status: ReturnStatus,
}

fn is_valid_order_number(order_number: &str) -> bool {
    !order_number.is_empty()
        && order_number.len() <= MAX_ORDER_NUMBER_LEN
        && order_number
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Status of the return filed against an order.
// TODO: look the return up in the order store once returns are persisted;
// every valid order number currently gets the same placeholder.
async fn get_return_status(
    request: RequestContext,
    Path(order_number): Path<String>,
) -> Result<Json<ReturnStatusResponse>, ErrorEnvelope> {
    if !is_valid_order_number(&order_number) {
        return Err(request.fail(AppError::Validation("無效的訂單編號".to_string())));
    }

    tracing::info!(
        request_id = %request.request_id,
        order_number = %order_number,
        "Return status requested"
    );

    Ok(Json(ReturnStatusResponse {
        status: ReturnStatus {
            status: ReturnStage::Processing,
            current_step: 2,
            estimated_days: 5,
            tracking_number: None,
        },
    }))
}
