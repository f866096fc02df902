use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};

use crate::controllers::customer_controller::CustomerController;
use crate::dto::customer_dto::{CustomerForm, NoticeQuery};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_customer_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/add", get(add_customer_form).post(add_customer))
        .route("/edit/:id", get(edit_customer_form).post(edit_customer))
        .route("/delete/:id", post(delete_customer))
        .route("/expiring-prb", get(expiring_prb))
        .route("/expiring-insurance", get(expiring_insurance))
}

fn render<T: Template>(status: StatusCode, page: T) -> Result<Response, AppError> {
    Ok((status, Html(page.render()?)).into_response())
}

/// Errores del usuario que se muestran en el propio formulario
fn form_error(err: &AppError) -> Option<StatusCode> {
    match err {
        AppError::Validation(_) | AppError::Conflict(_) => Some(err.status_code()),
        _ => None,
    }
}

async fn index(
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> Result<Response, AppError> {
    let controller = CustomerController::new(state.store.clone());
    let page = controller.index(state.today(), query.notice.as_deref()).await?;
    render(StatusCode::OK, page)
}

async fn add_customer_form(State(state): State<AppState>) -> Result<Response, AppError> {
    let controller = CustomerController::new(state.store.clone());
    let page = controller
        .add_form(state.today(), CustomerForm::default(), None)
        .await?;
    render(StatusCode::OK, page)
}

async fn add_customer(
    State(state): State<AppState>,
    Form(form): Form<CustomerForm>,
) -> Result<Response, AppError> {
    let controller = CustomerController::new(state.store.clone());
    match controller.create(&form).await {
        Ok(_) => Ok(Redirect::to("/?notice=created").into_response()),
        Err(err) => match form_error(&err) {
            Some(status) => {
                let page = controller
                    .add_form(state.today(), form, Some(err.to_string()))
                    .await?;
                render(status, page)
            }
            None => Err(err),
        },
    }
}

async fn edit_customer_form(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let controller = CustomerController::new(state.store.clone());
    let page = controller.edit_form(id, state.today(), None, None).await?;
    render(StatusCode::OK, page)
}

async fn edit_customer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Form(form): Form<CustomerForm>,
) -> Result<Response, AppError> {
    let controller = CustomerController::new(state.store.clone());
    match controller.update(id, &form).await {
        Ok(_) => Ok(Redirect::to("/?notice=updated").into_response()),
        Err(err) => match form_error(&err) {
            Some(status) => {
                let page = controller
                    .edit_form(id, state.today(), Some(form), Some(err.to_string()))
                    .await?;
                render(status, page)
            }
            None => Err(err),
        },
    }
}

async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    let controller = CustomerController::new(state.store.clone());
    controller.delete(id).await?;
    Ok(Redirect::to("/?notice=deleted"))
}

async fn expiring_prb(State(state): State<AppState>) -> Result<Response, AppError> {
    let controller = CustomerController::new(state.store.clone());
    let page = controller.expiring_prb(state.today()).await?;
    render(StatusCode::OK, page)
}

async fn expiring_insurance(State(state): State<AppState>) -> Result<Response, AppError> {
    let controller = CustomerController::new(state.store.clone());
    let page = controller.expiring_insurance(state.today()).await?;
    render(StatusCode::OK, page)
}
