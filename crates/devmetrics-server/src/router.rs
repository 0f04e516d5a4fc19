use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{HeaderMap, Method, Request, Response};

use crate::error::ServerError;
use crate::handlers::{self, AppState, RawResponse};
use crate::middleware::{decrypt, gzip, trusted_subnet};

pub type ResponseBody = Full<Bytes>;

/// Raw `hyper::service::Service` performing manual method+path matching, in the style of
/// `foundations::telemetry::server::router::Router` (spec §4.3a): the parameterized routes
/// (`/value/{kind}/{id}`, `/update/{kind}/{id}/{value}`) are matched by splitting the path on
/// `/` rather than through a framework router, since the core of this system is the handler
/// and middleware contracts, not routing itself (spec §9).
#[derive(Clone)]
pub struct Router {
    state: Arc<AppState>,
}

impl Router {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    async fn handle(&self, req: Request<Incoming>) -> Response<ResponseBody> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let headers = req.headers().clone();

        if method == Method::POST {
            if let Err(err) = trusted_subnet::check(self.state.trusted_network.as_ref(), &headers)
            {
                return into_response(&headers, handlers::error_response(&err));
            }
        }

        let body_bytes = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes().to_vec(),
            Err(_) => {
                return into_response(
                    &headers,
                    handlers::error_response(&ServerError::BadRequest(
                        "failed to read request body".to_string(),
                    )),
                )
            }
        };

        let result = self.dispatch(&method, &path, &headers, body_bytes).await;

        match result {
            Ok(raw) => into_response(&headers, raw),
            Err(err) => into_response(&headers, handlers::error_response(&err)),
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        raw_body: Vec<u8>,
    ) -> Result<RawResponse, ServerError> {
        let state = &self.state;
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            (&Method::GET, [""]) => handlers::dashboard(state).await,
            (&Method::GET, ["ping"]) => handlers::ping(state).await,
            (&Method::GET, ["value", kind, id]) => {
                handlers::get_value_path(state, kind, id).await
            }
            (&Method::GET, ["value", kind]) => handlers::get_value_path(state, kind, "").await,
            (&Method::POST, ["value", ..]) => {
                let body = self.decoded_body(headers, raw_body)?;
                handlers::get_value_json(state, &body).await
            }
            (&Method::POST, ["update", kind, id, value]) => {
                handlers::update_path(state, kind, id, value).await
            }
            (&Method::POST, ["update", kind, id]) => {
                handlers::update_path(state, kind, id, "").await
            }
            (&Method::POST, ["update", ..]) => {
                let body = self.decoded_body(headers, raw_body)?;
                handlers::update_json(state, &body).await
            }
            (&Method::POST, ["updates", ..]) => {
                let body = self.decoded_body(headers, raw_body)?;
                handlers::update_batch(state, &body).await
            }
            _ => Err(ServerError::NotFound),
        }
    }

    fn decoded_body(&self, headers: &HeaderMap, raw_body: Vec<u8>) -> Result<Vec<u8>, ServerError> {
        let body = gzip::decode_request_body(headers, raw_body)?;
        decrypt::decrypt_if_configured(self.state.crypto_key.as_ref(), body)
    }
}

fn into_response(headers: &HeaderMap, raw: RawResponse) -> Response<ResponseBody> {
    let (body, used_gzip) = gzip::maybe_encode_response(headers, raw.body);

    let mut builder = Response::builder()
        .status(raw.status)
        .header("content-type", raw.content_type);
    if used_gzip {
        builder = builder.header(hyper::header::CONTENT_ENCODING, "gzip");
    }

    builder
        .body(Full::new(Bytes::from(body)))
        .expect("building a response from well-formed parts never fails")
}

impl Service<Request<Incoming>> for Router {
    type Response = Response<ResponseBody>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let router = self.clone();
        async move { Ok(router.handle(req).await) }.boxed()
    }
}
