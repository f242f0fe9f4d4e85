use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use colored::Colorize;
use env_logger::Builder;
use futures_util::future::LocalBoxFuture;
use log::{info, Level};
use std::future::{ready, Ready};
use std::io::Write;

pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddlewareService { service }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
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
        let method = req.method().clone();
        let path = req.path().to_string();
        info!("server request: {} {}", method, path);
        let fut = self.service.call(req);

        Box::pin(async move {
            match fut.await {
                Ok(res) => {
                    info!("server response: {} {} -> {}", method, path, res.status());
                    Ok(res)
                }
                Err(err) => {
                    info!("server response: {} {} -> {}", method, path, err.as_response_error().status_code());
                    Err(err)
                }
            }
        })
    }
}

fn paint(level: Level) -> colored::ColoredString {
    let label = level.as_str();
    match level {
        Level::Error => label.red().bold(),
        Level::Warn => label.yellow().bold(),
        Level::Info => label.green().bold(),
        Level::Debug => label.blue().bold(),
        Level::Trace => label.magenta().bold(),
    }
}

/// Colored `LEVEL [target] message` lines; `RUST_LOG` picks the filter and
/// defaults to `info`.
pub fn init_logger() {
    Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(buf, "{} [{}] {}", paint(record.level()), record.target(), record.args())
        })
        .init()
}
