use std::{path::PathBuf, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request},
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    http_objects::{ApiError, UploadResponse},
    pipeline::UploadPipeline,
};

mod upload;
use upload::upload_file;

#[derive(OpenApi)]
#[openapi(
    paths(upload::upload_file),
    components(schemas(ApiError, UploadResponse)),
    tags((name = "upload", description = "Pin a file and register its hash"))
)]
struct ApiDoc;

#[derive(Clone)]
pub struct RouteState {
    pub pipeline: Arc<UploadPipeline>,
    pub upload_dir: PathBuf,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/docs/swagger").url("/docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(index))
        .route("/upload", post(upload_file).with_state(route_state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(usize::MAX))
}

async fn index() -> &'static str {
    "Chainpin Server"
}
