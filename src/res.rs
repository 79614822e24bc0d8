use axum::{debug_handler, response::IntoResponse};

use crate::Markdown;

#[macro_export]
macro_rules! include_res {
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

#[debug_handler]
pub async fn index() -> impl IntoResponse {
    Markdown(include_res!(str, "/pages/index.md"))
}
