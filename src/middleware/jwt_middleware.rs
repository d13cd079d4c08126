/// JWT Authentication Middleware
///
/// Runs the `AccessGuard` for every request to the wrapped resource and
/// injects the resolved `User` into request extensions, where handlers pick
/// it up with `web::ReqData<User>`.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::AccessGuard;

/// JWT middleware for protecting routes
///
/// ```ignore
/// web::resource("/auth/disable")
///     .route(web::patch().to(disable))
///     .wrap(JwtMiddleware::new(guard.require_roles(["admin"])))
/// ```
pub struct JwtMiddleware {
    guard: AccessGuard,
}

impl JwtMiddleware {
    pub fn new(guard: AccessGuard) -> Self {
        Self { guard }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            guard: Rc::new(self.guard.clone()),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    guard: Rc<AccessGuard>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // A header that is not valid UTF-8 is treated as present but malformed
        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .map(|h| h.to_str().unwrap_or_default().to_string());

        let guard = self.guard.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let user = guard.authorize(authorization.as_deref()).await?;

            tracing::debug!(
                user_id = user.id,
                path = %req.path(),
                "Request authorized"
            );
            req.extensions_mut().insert(user);

            service.call(req).await
        })
    }
}
