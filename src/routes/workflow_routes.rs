use axum::{
    routing::{get, post},
    Router,
};

use crate::controllers::workflow_controller;
use crate::state::AppState;

pub fn create_workflow_router() -> Router<AppState> {
    Router::new()
        .route("/", post(workflow_controller::create_workflow))
        .route("/:id", get(workflow_controller::get_workflow))
        .route("/:id/back", post(workflow_controller::go_back))
        .route("/:id/customers", get(workflow_controller::search_customers))
        .route(
            "/:id/customer/select",
            post(workflow_controller::select_customer),
        )
        .route(
            "/:id/customer/create",
            post(workflow_controller::create_customer),
        )
        .route("/:id/vehicles", get(workflow_controller::list_vehicles))
        .route("/:id/vehicle", post(workflow_controller::select_vehicle))
        .route("/:id/contract", post(workflow_controller::prepare_contract))
        .route("/:id/payment", post(workflow_controller::submit_payment))
        .route("/:id/finalize", post(workflow_controller::finalize))
}
