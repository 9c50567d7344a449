//! Callables whose results can be cached

use super::signature::Signature;
use crate::errors::BoxError;
use crate::value::{Kwargs, Value};
use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A function the cache can invoke and identify
///
/// The qualified name is part of every cache key, so it must be stable across
/// processes. When a signature is declared, arguments are bound against it
/// before hashing; otherwise they are hashed as given.
#[async_trait]
pub trait Callable: Send + Sync {
    fn qualified_name(&self) -> &str;

    fn signature(&self) -> Option<&Signature> {
        None
    }

    async fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value, BoxError>;
}

type CallFn =
    Arc<dyn Fn(Vec<Value>, Kwargs) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

/// Closure-backed [`Callable`]
#[derive(Clone)]
pub struct Function {
    name: String,
    signature: Option<Signature>,
    call: CallFn,
}

impl Function {
    /// Wrap an async closure
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>, Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            signature: None,
            call: Arc::new(move |args: Vec<Value>, kwargs: Kwargs| f(args, kwargs).boxed()),
        }
    }

    /// Wrap a synchronous closure
    pub fn sync<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>, Kwargs) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: None,
            call: Arc::new(move |args: Vec<Value>, kwargs: Kwargs| {
                future::ready(f(args, kwargs)).boxed()
            }),
        }
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Callable for Function {
    fn qualified_name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    async fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value, BoxError> {
        (self.call)(args, kwargs).await
    }
}
