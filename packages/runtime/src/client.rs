//! [`Client`] executes IR functions; [`ServiceClient`] binds a client to one
//! validated service and looks functions up by name.
//!
//! A call goes through four steps:
//!
//! 1. required arguments are checked and the URL is resolved,
//! 2. headers and content are encoded into a [`Request`],
//! 3. the request runs through the interceptor chain, which always ends in
//!    a [`TransportInterceptor`],
//! 4. the [`CallResult`] is decoded for the call shape.
//!
//! Clients are cheap to clone. Converters and interceptors are fixed at
//! construction and shared without locks.

use std::fmt;
use std::sync::Arc;

use restwire::ir::{Function, ReturnShape, ServiceDescription};
use restwire::TypeRef;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::chain::{self, Interceptor, TransportInterceptor};
use crate::config::ClientConfig;
use crate::content::encode_content;
use crate::converter::ConverterRegistry;
use crate::decode::{self, capture};
use crate::error::{ClientError, ConfigError, ValueError};
use crate::headers::encode_headers;
use crate::request::Request;
use crate::resolve::{resolve, BaseUrl};
use crate::response::{ApiResult, CallResult};
use crate::transport::{ReqwestTransport, Transport};
use crate::value::Arguments;

#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: BaseUrl,
    converters: ConverterRegistry,
    /// User interceptors followed by the terminal transport interceptor.
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Client {
    /// Check the base URL and fix the converter and interceptor lists.
    ///
    /// Either list may be empty. With no converters, any call that needs a
    /// conversion fails when it happens.
    pub fn new(
        base_url: &str,
        transport: Arc<dyn Transport>,
        converters: ConverterRegistry,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> Result<Self, ConfigError> {
        let base_url = BaseUrl::parse(base_url)?;
        let mut interceptors = interceptors;
        interceptors.push(Arc::new(TransportInterceptor::new(transport)));
        Ok(Self {
            inner: Arc::new(Inner {
                base_url,
                converters,
                interceptors,
            }),
        })
    }

    /// Default converters and no interceptors.
    pub fn with_defaults(base_url: &str, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        Self::new(base_url, transport, ConverterRegistry::with_defaults(), Vec::new())
    }

    /// A `reqwest`-backed client built from [`ClientConfig`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::from_config(config)?;
        Self::with_defaults(config.require_base_url()?, Arc::new(transport))
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.inner.base_url
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.inner.converters
    }

    /// Build the request for one call without sending it.
    pub fn prepare(&self, function: &Function, args: &Arguments) -> Result<Request, ClientError> {
        for parameter in &function.parameters {
            if !parameter.ty.nullable && args.value(&parameter.name).is_null() {
                return Err(ValueError::Missing(parameter.name.clone()).into());
            }
        }

        let url = resolve(&self.inner.base_url, &function.url, args)?;
        let mut request = Request::new(function.method.clone(), url);
        request.headers = encode_headers(&function.headers, args)?;
        let body = encode_content(function.content.as_ref(), args, &self.inner.converters)?;
        if let Some(content_type) = body.as_ref().and_then(|b| b.content_type()) {
            request.set_header("Content-Type", content_type);
        }
        request.body = body;

        debug!(
            "client: {} prepared {} {}",
            function.name, request.method, request.url
        );
        Ok(request)
    }

    /// Prepare and run the chain. `Err` only when the request could not be
    /// built.
    pub async fn execute(
        &self,
        function: &Function,
        args: &Arguments,
    ) -> Result<CallResult, ClientError> {
        let request = self.prepare(function, args)?;
        let result = chain::execute(request, &self.inner.interceptors).await;
        match &result {
            CallResult::Response(r) => debug!(
                "client: {} received {} in {}ms",
                function.name,
                r.status(),
                r.elapsed().num_milliseconds()
            ),
            CallResult::Failure(f) => debug!("client: {} failed: {}", function.name, f.error),
        }
        Ok(result)
    }

    /// Plain shape: the decoded 2xx body, or the error.
    pub async fn call<T: DeserializeOwned>(
        &self,
        function: &Function,
        args: &Arguments,
    ) -> Result<T, ClientError> {
        let declared = plain_type(function)?;
        let result = self.execute(function, args).await?;
        decode::decode_plain(result, &self.inner.converters, declared)
    }

    /// Wrapped shape. `Err` carries a security error or a call-site
    /// mismatch; every other outcome is an [`ApiResult`].
    pub async fn call_wrapped<T: DeserializeOwned>(
        &self,
        function: &Function,
        args: &Arguments,
    ) -> Result<ApiResult<T>, ClientError> {
        let declared = match &function.returns {
            ReturnShape::Wrapped(t) => t,
            other => return Err(mismatch(function, other, "Result<T>")),
        };
        match self.execute(function, args).await {
            Ok(result) => Ok(decode::decode_wrapped(result, &self.inner.converters, declared)?),
            Err(e) => Ok(capture(e, None)?),
        }
    }

    /// Wildcard shape: outcome only, the body is never decoded.
    pub async fn call_discarding(
        &self,
        function: &Function,
        args: &Arguments,
    ) -> Result<ApiResult<()>, ClientError> {
        if function.returns != ReturnShape::WrappedWildcard {
            return Err(mismatch(function, &function.returns, "Result<*>"));
        }
        match self.execute(function, args).await {
            Ok(result) => Ok(decode::decode_discard(result)?),
            Err(e) => Ok(capture(e, None)?),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("converters", &self.inner.converters)
            .field("interceptors", &self.inner.interceptors.len())
            .finish()
    }
}

fn plain_type(function: &Function) -> Result<&TypeRef, ClientError> {
    match &function.returns {
        ReturnShape::Plain(t) => Ok(t),
        other => Err(mismatch(function, other, "a plain value")),
    }
}

fn mismatch(function: &Function, declared: &ReturnShape, requested: &'static str) -> ClientError {
    ClientError::ShapeMismatch {
        function: function.name.clone(),
        declared: declared.to_string(),
        requested,
    }
}

// ---------------------------------------------------------------------------
// ServiceClient
// ---------------------------------------------------------------------------

/// A validated service bound to a client: the executable form of a
/// [`ServiceDescription`].
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
    service: Arc<ServiceDescription>,
}

impl ServiceClient {
    pub fn new(client: Client, service: ServiceDescription) -> Self {
        Self {
            client,
            service: Arc::new(service),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn service(&self) -> &ServiceDescription {
        &self.service
    }

    pub fn function(&self, name: &str) -> Result<&Function, ClientError> {
        self.service
            .function(name)
            .ok_or_else(|| ClientError::UnknownFunction(name.to_string()))
    }

    pub async fn invoke<T: DeserializeOwned>(
        &self,
        function: &str,
        args: &Arguments,
    ) -> Result<T, ClientError> {
        self.client.call(self.function(function)?, args).await
    }

    pub async fn invoke_wrapped<T: DeserializeOwned>(
        &self,
        function: &str,
        args: &Arguments,
    ) -> Result<ApiResult<T>, ClientError> {
        self.client.call_wrapped(self.function(function)?, args).await
    }

    pub async fn invoke_discarding(
        &self,
        function: &str,
        args: &Arguments,
    ) -> Result<ApiResult<()>, ClientError> {
        self.client.call_discarding(self.function(function)?, args).await
    }

    /// Call any function whatever its shape, decoding to JSON.
    pub async fn invoke_json(
        &self,
        function: &str,
        args: &Arguments,
    ) -> Result<ApiResult<Value>, ClientError> {
        let f = self.function(function)?;
        match &f.returns {
            ReturnShape::Plain(declared) => {
                let result = match self.client.execute(f, args).await {
                    Ok(result) => result,
                    Err(e) => return Ok(capture(e, None)?),
                };
                Ok(decode::decode_wrapped(result, self.client.converters(), declared)?)
            }
            ReturnShape::Wrapped(_) => self.client.call_wrapped(f, args).await,
            ReturnShape::WrappedWildcard => {
                Ok(match self.client.call_discarding(f, args).await? {
                    ApiResult::Success { response, .. } => ApiResult::Success {
                        value: Value::Null,
                        response,
                    },
                    ApiResult::Error(response) => ApiResult::Error(response),
                    ApiResult::Failure { error, request } => ApiResult::Failure { error, request },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use restwire::{validate_service, ServiceDecl};
    use serde_json::json;

    use super::*;
    use crate::chain::Chain;
    use crate::error::{SecurityError, TransportError};
    use crate::response::RawResponse;

    /// Records what it was sent and answers with a fixed response.
    struct FakeTransport {
        sent: Mutex<Vec<(String, String, Vec<(String, String)>, Bytes)>>,
        status: u16,
        body: &'static str,
    }

    impl FakeTransport {
        fn new(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                status,
                body,
            })
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: &Request) -> Result<RawResponse, TransportError> {
            let body = match &request.body {
                Some(b) => b.to_bytes()?,
                None => Bytes::new(),
            };
            self.sent.lock().unwrap().push((
                request.method.to_string(),
                request.url.to_string(),
                request.headers.clone(),
                body,
            ));
            Ok(RawResponse::new(self.status, self.body).with_header("Content-Type", "application/json"))
        }
    }

    fn service() -> ServiceDescription {
        let decl: ServiceDecl = serde_json::from_value(json!({
            "name": "Users",
            "serializable_types": ["User"],
            "functions": [
                {
                    "name": "count",
                    "annotations": [{ "kind": "http", "method": "GET", "path": "users/count" }],
                    "return_type": "Int"
                },
                {
                    "name": "get",
                    "annotations": [{ "kind": "http", "method": "GET", "path": "users/{id}" }],
                    "parameters": [
                        { "name": "id", "type": "String", "annotations": [{ "kind": "path" }] }
                    ],
                    "return_type": "Result<User>"
                },
                {
                    "name": "create",
                    "annotations": [{ "kind": "http", "method": "POST", "path": "users" }],
                    "parameters": [
                        { "name": "user", "type": "User", "annotations": [{ "kind": "body" }] },
                        { "name": "trace", "type": "String?", "annotations": [{ "kind": "header", "name": "X-Trace" }] }
                    ],
                    "return_type": "Result<*>"
                }
            ]
        }))
        .unwrap();
        validate_service(&decl).unwrap()
    }

    fn service_client(transport: Arc<FakeTransport>) -> ServiceClient {
        let client = Client::with_defaults("https://x/base/", transport).unwrap();
        ServiceClient::new(client, service())
    }

    #[test]
    fn base_url_checked_at_construction() {
        let err = Client::with_defaults("https://x/base", FakeTransport::new(200, "")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingTrailingSlash(_)));
    }

    #[tokio::test]
    async fn plain_call_decodes() {
        let transport = FakeTransport::new(200, "42");
        let n: i64 = service_client(transport.clone())
            .invoke("count", &Arguments::new())
            .await
            .unwrap();
        assert_eq!(n, 42);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].0, "GET");
        assert_eq!(sent[0].1, "https://x/base/users/count");
    }

    #[tokio::test]
    async fn body_gets_content_type_and_optional_header_is_skipped() {
        let transport = FakeTransport::new(201, "");
        let args = Arguments::new().arg("user", json!({ "name": "ada" }));
        let result = service_client(transport.clone())
            .invoke_discarding("create", &args)
            .await
            .unwrap();
        assert!(result.is_success());

        let sent = transport.sent.lock().unwrap();
        let (method, _, headers, body) = &sent[0];
        assert_eq!(method, "POST");
        assert_eq!(headers, &[("Content-Type".to_string(), "application/json".to_string())]);
        assert_eq!(&body[..], br#"{"name":"ada"}"#);
    }

    #[tokio::test]
    async fn traversal_escapes_every_shape_without_a_request() {
        let transport = FakeTransport::new(200, "{}");
        let client = service_client(transport.clone());
        let args = Arguments::new().arg("id", "..");

        let err = client.invoke_wrapped::<Value>("get", &args).await.unwrap_err();
        assert!(matches!(err, ClientError::Security(SecurityError::PathTraversal { .. })));

        let err = client.invoke_json("get", &args).await.unwrap_err();
        assert!(err.is_security());
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn missing_argument_is_a_wrapped_failure() {
        let transport = FakeTransport::new(200, "{}");
        let result = service_client(transport.clone())
            .invoke_wrapped::<Value>("get", &Arguments::new())
            .await
            .unwrap();
        assert!(matches!(
            result,
            ApiResult::Failure {
                error: ClientError::Argument(ValueError::Missing(_)),
                request: None
            }
        ));
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn shape_and_name_are_checked() {
        let client = service_client(FakeTransport::new(200, "1"));
        let err = client.invoke::<i64>("get", &Arguments::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::ShapeMismatch { .. }));
        let err = client.invoke::<i64>("nope", &Arguments::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownFunction(_)));
    }

    #[tokio::test]
    async fn interceptors_run_before_the_transport() {
        struct Auth;
        #[async_trait]
        impl Interceptor for Auth {
            async fn intercept(&self, chain: &mut Chain<'_>) -> Result<CallResult, ClientError> {
                let request = chain.request().clone().with_header("Authorization", "Bearer t");
                Ok(chain.proceed(request).await)
            }
        }

        let transport = FakeTransport::new(200, r#"{"name":"ada"}"#);
        let client = Client::new(
            "https://x/base/",
            transport.clone(),
            ConverterRegistry::with_defaults(),
            vec![Arc::new(Auth)],
        )
        .unwrap();
        let users = ServiceClient::new(client, service());
        let user: ApiResult<Value> = users
            .invoke_wrapped("get", &Arguments::new().arg("id", "a b"))
            .await
            .unwrap();
        assert_eq!(user.value(), Some(&json!({ "name": "ada" })));

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].1, "https://x/base/users/a%20b");
        assert!(sent[0].2.contains(&("Authorization".to_string(), "Bearer t".to_string())));
    }
}
