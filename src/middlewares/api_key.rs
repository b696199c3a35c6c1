use std::future::{Ready, ready};

use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    error::ErrorUnauthorized,
};
use futures_util::future::LocalBoxFuture;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Guards the analytics routes with a shared API key. The key is read from
/// the environment once at construction so a missing key rejects every
/// request instead of panicking mid-flight.
pub struct ApiKeyAuth {
    key: Option<String>,
}

impl ApiKeyAuth {
    pub fn from_env() -> Self {
        Self {
            key: std::env::var("ANALYTICS_API_KEY").ok(),
        }
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ApiKeyAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyAuthMiddleware {
            service,
            key: self.key.clone(),
        }))
    }
}

pub struct ApiKeyAuthMiddleware<S> {
    service: S,
    key: Option<String>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // An unconfigured key closes the analytics surface entirely
        let expected = match &self.key {
            Some(key) => key.clone(),
            None => {
                return Box::pin(async move {
                    Err(ErrorUnauthorized("Analytics API key not configured"))
                });
            }
        };

        let provided = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        match provided {
            Some(provided) if provided == expected => Box::pin(self.service.call(req)),
            Some(_) => Box::pin(async move { Err(ErrorUnauthorized("Invalid API key")) }),
            None => Box::pin(async move { Err(ErrorUnauthorized("No API key header")) }),
        }
    }
}
