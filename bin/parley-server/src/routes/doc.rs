use utoipa::OpenApi;

use crate::routes::{api, health};

#[derive(OpenApi)]
#[openapi(info(
    title = "parley-server",
    description = "Streaming chat relay with server-side conversation history",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(api::api_docs());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = get_docs();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in ["/health", "/api/chat", "/api/conversations", "/api/conversations/{id}"] {
            assert!(paths.contains(&expected), "missing {expected} in {paths:?}");
        }
    }
}
