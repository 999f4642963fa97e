use crate::http::make_boxed_error_response;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// Health/readiness endpoints served on each relay's admin listener.
///
/// `/health` answers as soon as the process accepts connections; `/ready`
/// consults the closure supplied by the relay service, so orchestration can
/// hold traffic until the platform client is configured and reachable.
pub struct AdminService<F, E> {
    service_name: &'static str,
    is_ready: F,
    _error: PhantomData<E>,
}

impl<F, E> AdminService<F, E>
where
    F: Fn() -> bool,
{
    pub fn new(service_name: &'static str, is_ready: F) -> Self {
        Self {
            service_name,
            is_ready,
            _error: PhantomData,
        }
    }
}

impl<F, E, B> Service<Request<B>> for AdminService<F, E>
where
    F: Fn() -> bool + Clone + Send + 'static,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let is_ready = (self.is_ready)();
        let service_name = self.service_name;
        let path = req.uri().path().to_string();

        Box::pin(async move {
            let ok_body = || Full::new(Bytes::from("ok\n")).boxed();

            let res = match path.as_str() {
                "/health" => Response::new(ok_body()),
                "/ready" => match is_ready {
                    true => Response::new(ok_body()),
                    false => make_boxed_error_response(StatusCode::SERVICE_UNAVAILABLE),
                },
                _ => {
                    tracing::debug!(service_name, path, "unknown admin path");
                    make_boxed_error_response(StatusCode::NOT_FOUND)
                }
            };
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Empty;
    use std::convert::Infallible;

    fn request(path: &str) -> Request<Empty<Bytes>> {
        Request::builder().uri(path).body(Empty::new()).unwrap()
    }

    async fn status_of<F>(service: &AdminService<F, Infallible>, path: &str) -> StatusCode
    where
        F: Fn() -> bool + Clone + Send + 'static,
    {
        service.call(request(path)).await.unwrap().status()
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let service = AdminService::new("alias-relay", || false);
        assert_eq!(status_of(&service, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_follows_the_probe() {
        let ready = AdminService::new("alias-relay", || true);
        assert_eq!(status_of(&ready, "/ready").await, StatusCode::OK);

        let not_ready = AdminService::new("alias-relay", || false);
        assert_eq!(
            status_of(&not_ready, "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let service = AdminService::new("alias-relay", || true);
        assert_eq!(status_of(&service, "/metrics").await, StatusCode::NOT_FOUND);
    }
}
