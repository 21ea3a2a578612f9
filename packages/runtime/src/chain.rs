//! The interceptor chain.
//!
//! Interceptors run in registration order on the way in and in reverse on
//! the way out. Each one either answers on its own or calls
//! [`Chain::proceed`] to hand a (possibly replaced) request to the next.
//! The last interceptor must answer; the client always installs a
//! [`TransportInterceptor`] there.
//!
//! An `Err` from any interceptor becomes a [`CallResult::Failure`] carrying
//! the request as it stood at that point. That conversion happens in one
//! place, [`invoke`], so no interceptor needs its own catch.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{ChainError, ClientError};
use crate::request::Request;
use crate::response::{CallResult, Failure, Response};
use crate::transport::Transport;

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, chain: &mut Chain<'_>) -> Result<CallResult, ClientError>;
}

/// The cursor an interceptor sees.
pub struct Chain<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    index: usize,
    request: Request,
}

impl Chain<'_> {
    /// The current request. After [`proceed`](Self::proceed) returns this is
    /// the request that was passed downstream.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Position of the running interceptor, from 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Replace the request and run the rest of the chain.
    pub async fn proceed(&mut self, request: Request) -> CallResult {
        self.request = request;
        let next = self.index + 1;
        if next >= self.interceptors.len() {
            warn!("chain: interceptor {} called proceed but is the last one", self.index);
            return CallResult::failure(self.request.clone(), ChainError::ProceedPastTerminal);
        }
        let current = self.index;
        self.index = next;
        let result = invoke(self).await;
        self.index = current;
        result
    }
}

/// Run `request` through `interceptors`.
pub async fn execute(request: Request, interceptors: &[Arc<dyn Interceptor>]) -> CallResult {
    if interceptors.is_empty() {
        return CallResult::failure(request, ChainError::Empty);
    }
    let mut chain = Chain {
        interceptors,
        index: 0,
        request,
    };
    invoke(&mut chain).await
}

async fn invoke(chain: &mut Chain<'_>) -> CallResult {
    let Some(interceptor) = chain.interceptors.get(chain.index).cloned() else {
        return CallResult::failure(chain.request.clone(), ChainError::ProceedPastTerminal);
    };
    match interceptor.intercept(chain).await {
        Ok(result) => result,
        Err(error) => CallResult::Failure(Failure {
            request: chain.request.clone(),
            error,
        }),
    }
}

// ---------------------------------------------------------------------------
// Terminal interceptor
// ---------------------------------------------------------------------------

/// Hands the request to a [`Transport`]. Transport errors become failures.
pub struct TransportInterceptor {
    transport: Arc<dyn Transport>,
}

impl TransportInterceptor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Interceptor for TransportInterceptor {
    async fn intercept(&self, chain: &mut Chain<'_>) -> Result<CallResult, ClientError> {
        let request = chain.request().clone();
        match self.transport.send(&request).await {
            Ok(raw) => Ok(CallResult::Response(Response { request, raw })),
            Err(e) => {
                warn!("transport: {} {} failed: {e}", request.method, request.url);
                Ok(CallResult::failure(request, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use restwire::ir::HttpMethod;
    use url::Url;

    use super::*;
    use crate::error::TransportError;
    use crate::response::RawResponse;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl Interceptor for Recorder {
        async fn intercept(&self, chain: &mut Chain<'_>) -> Result<CallResult, ClientError> {
            self.log.lock().unwrap().push(format!("{}-enter", self.name));
            let request = chain.request().clone();
            let result = chain.proceed(request).await;
            self.log.lock().unwrap().push(format!("{}-exit", self.name));
            Ok(result)
        }
    }

    /// Answers without proceeding, echoing the headers it saw.
    struct Terminal {
        log: Log,
    }

    #[async_trait]
    impl Interceptor for Terminal {
        async fn intercept(&self, chain: &mut Chain<'_>) -> Result<CallResult, ClientError> {
            self.log.lock().unwrap().push("terminal".into());
            let mut raw = RawResponse::new(200, "ok");
            raw.headers = chain.request().headers.clone();
            Ok(CallResult::Response(Response {
                request: chain.request().clone(),
                raw,
            }))
        }
    }

    fn request() -> Request {
        Request::new(HttpMethod::Get, Url::parse("https://x/base/").unwrap())
    }

    fn recorder(name: &'static str, log: &Log) -> Arc<dyn Interceptor> {
        Arc::new(Recorder {
            name,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn enter_in_order_exit_in_reverse() {
        let log: Log = Arc::default();
        let chain = vec![
            recorder("A", &log),
            recorder("B", &log),
            recorder("C", &log),
            Arc::new(Terminal { log: log.clone() }) as Arc<dyn Interceptor>,
        ];
        let result = execute(request(), &chain).await;
        assert!(matches!(result, CallResult::Response(_)));
        assert_eq!(
            *log.lock().unwrap(),
            ["A-enter", "B-enter", "C-enter", "terminal", "C-exit", "B-exit", "A-exit"]
        );
    }

    #[tokio::test]
    async fn replaced_request_is_seen_downstream_and_by_the_caller() {
        struct Tagger;
        #[async_trait]
        impl Interceptor for Tagger {
            async fn intercept(&self, chain: &mut Chain<'_>) -> Result<CallResult, ClientError> {
                let tagged = chain.request().clone().with_header("X-Tag", "1");
                let result = chain.proceed(tagged).await;
                assert_eq!(chain.request().header("X-Tag"), Some("1"));
                Ok(result)
            }
        }

        let log: Log = Arc::default();
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Tagger), Arc::new(Terminal { log })];
        let CallResult::Response(response) = execute(request(), &chain).await else {
            panic!("expected a response");
        };
        assert_eq!(response.raw.header("X-Tag"), Some("1"));
        assert_eq!(response.request.header("X-Tag"), Some("1"));
    }

    #[tokio::test]
    async fn proceeding_from_the_last_interceptor_fails() {
        let log: Log = Arc::default();
        let chain = vec![recorder("A", &log)];
        let result = execute(request(), &chain).await;
        assert!(matches!(
            result,
            CallResult::Failure(Failure {
                error: ClientError::Chain(ChainError::ProceedPastTerminal),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn empty_chain_fails() {
        let result = execute(request(), &[]).await;
        assert!(matches!(
            result,
            CallResult::Failure(Failure {
                error: ClientError::Chain(ChainError::Empty),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn errors_become_failures_with_the_current_request() {
        struct Boom;
        #[async_trait]
        impl Interceptor for Boom {
            async fn intercept(&self, _chain: &mut Chain<'_>) -> Result<CallResult, ClientError> {
                Err(ClientError::Interceptor("boom".into()))
            }
        }

        struct Tagger;
        #[async_trait]
        impl Interceptor for Tagger {
            async fn intercept(&self, chain: &mut Chain<'_>) -> Result<CallResult, ClientError> {
                let tagged = chain.request().clone().with_header("X-Seen", "yes");
                Ok(chain.proceed(tagged).await)
            }
        }

        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Tagger), Arc::new(Boom)];
        let CallResult::Failure(failure) = execute(request(), &chain).await else {
            panic!("expected a failure");
        };
        assert_eq!(failure.error.to_string(), "interceptor error: boom");
        assert_eq!(failure.request.header("X-Seen"), Some("yes"));
    }

    #[tokio::test]
    async fn transport_errors_become_failures() {
        struct Refused;
        #[async_trait]
        impl Transport for Refused {
            async fn send(&self, _request: &Request) -> Result<RawResponse, TransportError> {
                Err(TransportError::Other("connection refused".into()))
            }
        }

        let chain: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(TransportInterceptor::new(Arc::new(Refused)))];
        let result = execute(request(), &chain).await;
        assert!(matches!(
            result,
            CallResult::Failure(Failure {
                error: ClientError::Transport(_),
                ..
            })
        ));
    }
}
