// SPDX-FileCopyrightText: Copyright (c) 2017-2022 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    future::{Future, Ready},
    io,
    rc::Rc,
    sync::{Arc, Mutex},
};

use crate::{
    datastore::SlaveContext,
    error::Error,
    execute::execute,
    frame::{ExceptionResponse, Request, ResponsePdu},
};

/// A Modbus server service.
pub trait Service {
    /// Requests handled by the service.
    type Request;

    /// Responses given by the service.
    type Response;

    /// Errors produced by the service.
    type Error;

    /// The future response value.
    type Future: Future<Output = Result<Self::Response, Self::Error>> + Send + Sync + Unpin;

    /// Process the request and return the response asynchronously.
    fn call(&self, req: Self::Request) -> Self::Future;
}

/// Creates new `Service` values.
pub trait NewService {
    /// Requests handled by the service
    type Request;

    /// Responses given by the service
    type Response;

    /// Errors produced by the service
    type Error;

    /// The `Service` value created by this factory
    type Instance: Service<Request = Self::Request, Response = Self::Response, Error = Self::Error>;

    /// Create and return a new service value.
    fn new_service(&self) -> io::Result<Self::Instance>;
}

impl<F, R> NewService for F
where
    F: Fn() -> io::Result<R>,
    R: Service,
{
    type Request = R::Request;
    type Response = R::Response;
    type Error = R::Error;
    type Instance = R;

    fn new_service(&self) -> io::Result<R> {
        (*self)()
    }
}

impl<S: NewService + ?Sized> NewService for Arc<S> {
    type Request = S::Request;
    type Response = S::Response;
    type Error = S::Error;
    type Instance = S::Instance;

    fn new_service(&self) -> io::Result<S::Instance> {
        (**self).new_service()
    }
}

impl<S: NewService + ?Sized> NewService for Rc<S> {
    type Request = S::Request;
    type Response = S::Response;
    type Error = S::Error;
    type Instance = S::Instance;

    fn new_service(&self) -> io::Result<S::Instance> {
        (**self).new_service()
    }
}

impl<S: Service + ?Sized + 'static> Service for Box<S> {
    type Request = S::Request;
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn call(&self, request: S::Request) -> Self::Future {
        (**self).call(request)
    }
}

impl<S: Service + ?Sized + 'static> Service for Rc<S> {
    type Request = S::Request;
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn call(&self, request: S::Request) -> Self::Future {
        (**self).call(request)
    }
}

impl<S: Service + ?Sized + 'static> Service for Arc<S> {
    type Request = S::Request;
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn call(&self, request: S::Request) -> Self::Future {
        (**self).call(request)
    }
}

/// Dispatches decoded requests against a shared [`SlaveContext`], producing
/// [`ResponsePdu`]s directly so Modbus exceptions are encoded in-band as a
/// response frame instead of aborting the connection.
///
/// Requests are not routed by unit id: every connection driven from a given
/// instance is answered from the same context, matching `ServerContext::single`.
/// Routing by unit id needs the request header, which this transport-agnostic
/// `Service` contract does not carry; implement `Service` directly against
/// [`crate::datastore::ServerContext`] for multi-unit dispatch.
#[derive(Clone)]
pub struct ServerContextService {
    context: Arc<Mutex<SlaveContext>>,
}

impl ServerContextService {
    /// Wraps a [`SlaveContext`] for sharing across all accepted connections.
    #[must_use]
    pub fn new(context: SlaveContext) -> Self {
        Self {
            context: Arc::new(Mutex::new(context)),
        }
    }
}

impl Service for ServerContextService {
    type Request = Request;
    type Response = ResponsePdu;
    type Error = Error;
    type Future = Ready<Result<ResponsePdu, Error>>;

    fn call(&self, req: Request) -> Self::Future {
        let function = crate::codec::req_to_fn_code(&req);
        let mut context = self.context.lock().unwrap();
        let pdu = match execute(&req, &mut context) {
            Ok(rsp) => ResponsePdu(Ok(rsp)),
            Err(exception) => ResponsePdu(Err(ExceptionResponse { function, exception })),
        };
        std::future::ready(Ok(pdu))
    }
}
