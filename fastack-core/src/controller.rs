// Controller trait and the route build pipeline

use crate::context::current_app;
use crate::conventions::{ConventionTable, HttpMethod};
use crate::logging::{debug, trace};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::routing::{HandlerFn, Route, Router};
use crate::{ApiModel, Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

const CONTROLLER_SUFFIX: &str = "controller";

/// Derive the kebab-case endpoint name from a type label.
fn derive_endpoint_name(type_label: &str) -> String {
    kebab_case(strip_controller_suffix(type_basename(type_label)))
}

/// Reduce a possibly qualified, possibly generic type name to its
/// final path segment.
fn type_basename(label: &str) -> &str {
    let without_generics = label.split('<').next().unwrap_or(label);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

/// Strip a trailing "controller" (any case) when something remains.
fn strip_controller_suffix(name: &str) -> &str {
    if name.len() > CONTROLLER_SUFFIX.len() {
        let split = name.len() - CONTROLLER_SUFFIX.len();
        if name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(CONTROLLER_SUFFIX) {
            return &name[..split];
        }
    }
    name
}

/// CamelCase to kebab-case, never emitting consecutive hyphens.
fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_uppercase() {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Ensure exactly one leading slash.
fn normalize_prefix(prefix: &str) -> String {
    format!("/{}", prefix.trim_start_matches('/'))
}

/// Title-case the words of a kebab or snake case identifier.
fn title_words(value: &str) -> String {
    value
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Explicit route metadata attached to a responder.
///
/// Every field overrides the value the build pipeline would otherwise
/// derive. The builder consumes and returns self; instances never
/// mutate after attachment.
#[derive(Debug, Clone, Default)]
pub struct RouteMeta {
    pub path: Option<String>,
    pub verbs: Option<Vec<HttpMethod>>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub action: bool,
}

impl RouteMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the conventional path suffix.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a verb to the explicit verb set.
    pub fn verb(mut self, verb: HttpMethod) -> Self {
        self.verbs.get_or_insert_with(Vec::new).push(verb);
        self
    }

    /// Replace the explicit verb set.
    pub fn verbs(mut self, verbs: Vec<HttpMethod>) -> Self {
        self.verbs = Some(verbs);
        self
    }

    /// Override the route name. Used verbatim, never re-namespaced
    /// under the endpoint name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the generated summary.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Attach an extra tag beside the controller tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Expose a method whose name is neither a verb nor a convention
    /// table row.
    pub fn action(mut self) -> Self {
        self.action = true;
        self
    }
}

/// One controller method offered to the build pipeline.
pub struct Responder {
    pub method_name: String,
    pub meta: RouteMeta,
    pub handler: HandlerFn,
}

impl Responder {
    /// Wrap a controller method as a responder. The controller is
    /// shared into the handler, so `call` receives it by Arc alongside
    /// the request.
    pub fn new<C, F, Fut>(method_name: impl Into<String>, controller: Arc<C>, call: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |request| {
            let controller = Arc::clone(&controller);
            Box::pin(call(controller, request))
        });

        Self {
            method_name: method_name.into(),
            meta: RouteMeta::default(),
            handler,
        }
    }

    /// Attach explicit route metadata.
    pub fn with_meta(mut self, meta: RouteMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Trait for REST controllers.
///
/// A controller names itself, carries a convention table, and hands
/// the build pipeline one responder per exposed method. Everything
/// else has a default derived from the type name.
pub trait Controller: Send + Sync + 'static {
    /// Explicit endpoint name, overriding type-name derivation.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Explicit URL prefix, overriding the endpoint-name default.
    fn url_prefix(&self) -> Option<&str> {
        None
    }

    /// The method-name convention table used during the build.
    fn conventions(&self) -> ConventionTable {
        ConventionTable::standard()
    }

    /// Middleware applied to every route of this controller.
    fn middlewares(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }

    /// The responders this controller exposes.
    fn responders(self: Arc<Self>) -> Vec<Responder>;

    /// Label the endpoint name is derived from.
    fn type_label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The kebab-case endpoint name.
    fn endpoint_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => derive_endpoint_name(self.type_label()),
        }
    }

    /// The URL prefix, carrying exactly one leading slash.
    fn prefix(&self) -> String {
        match self.url_prefix() {
            Some(prefix) => normalize_prefix(prefix),
            None => normalize_prefix(&self.endpoint_name()),
        }
    }

    /// The default route name for a method on this controller.
    fn route_name(&self, method_name: &str) -> String {
        format!("{}:{}", self.endpoint_name(), method_name)
    }

    /// Reverse a route on this controller through the ambient app.
    fn url_for(&self, method_name: &str, params: &[(&str, &str)]) -> Result<String, Error> {
        let app = current_app()?;
        app.url_for(&self.route_name(method_name), params)
    }

    /// Wrap a payload in the standard envelope with a 200 status.
    fn json<T: ApiModel + ?Sized>(&self, data: &T) -> Result<HttpResponse, Error>
    where
        Self: Sized,
    {
        HttpResponse::envelope("OK", data, 200)
    }

    /// Wrap a payload in the standard envelope with an explicit detail
    /// and status.
    fn json_with_status<T: ApiModel + ?Sized>(
        &self,
        detail: &str,
        data: &T,
        status: u16,
    ) -> Result<HttpResponse, Error>
    where
        Self: Sized,
    {
        HttpResponse::envelope(detail, data, status)
    }
}

/// Collection read endpoint: GET at the controller prefix.
#[async_trait]
pub trait ListEndpoint: Controller {
    async fn list(&self, request: HttpRequest) -> Result<HttpResponse, Error>;

    fn list_responder(self: Arc<Self>) -> Responder
    where
        Self: Sized,
    {
        Responder::new("list", self, |controller, request| async move {
            controller.list(request).await
        })
    }
}

/// Collection write endpoint: POST at the controller prefix.
#[async_trait]
pub trait CreateEndpoint: Controller {
    async fn create(&self, request: HttpRequest) -> Result<HttpResponse, Error>;

    fn create_responder(self: Arc<Self>) -> Responder
    where
        Self: Sized,
    {
        Responder::new("create", self, |controller, request| async move {
            controller.create(request).await
        })
    }
}

/// Item read endpoint: GET at the id segment.
#[async_trait]
pub trait RetrieveEndpoint: Controller {
    async fn retrieve(&self, request: HttpRequest) -> Result<HttpResponse, Error>;

    fn retrieve_responder(self: Arc<Self>) -> Responder
    where
        Self: Sized,
    {
        Responder::new("retrieve", self, |controller, request| async move {
            controller.retrieve(request).await
        })
    }
}

/// Item replace endpoint: PUT at the id segment.
#[async_trait]
pub trait UpdateEndpoint: Controller {
    async fn update(&self, request: HttpRequest) -> Result<HttpResponse, Error>;

    fn update_responder(self: Arc<Self>) -> Responder
    where
        Self: Sized,
    {
        Responder::new("update", self, |controller, request| async move {
            controller.update(request).await
        })
    }
}

/// Item delete endpoint: DELETE at the id segment.
#[async_trait]
pub trait DestroyEndpoint: Controller {
    async fn destroy(&self, request: HttpRequest) -> Result<HttpResponse, Error>;

    fn destroy_responder(self: Arc<Self>) -> Responder
    where
        Self: Sized,
    {
        Responder::new("destroy", self, |controller, request| async move {
            controller.destroy(request).await
        })
    }
}

/// Assemble a controller's routes.
///
/// Responder method names resolve to verbs in two steps: a literal
/// verb name wins, then the controller's convention table. Methods
/// resolving to neither are skipped unless flagged as actions.
/// Explicit metadata overrides every derived value.
pub fn build_controller<C: Controller>(controller: Arc<C>) -> Result<Router, Error> {
    let endpoint_name = controller.endpoint_name();
    let prefix = controller.prefix();
    let tag = title_words(&endpoint_name);
    let table = controller.conventions();
    let middlewares = controller.middlewares();

    let has_middlewares = !middlewares.is_empty();
    let mut chain = MiddlewareChain::new();
    for middleware in middlewares {
        chain.use_shared(middleware);
    }

    debug!(
        endpoint = %endpoint_name,
        prefix = %prefix,
        "Building controller routes"
    );

    let mut router = Router::new();

    for responder in controller.responders() {
        let Responder {
            method_name,
            meta,
            handler,
        } = responder;

        // A literal verb name wins over the convention table
        let resolved =
            HttpMethod::from_str(&method_name).or_else(|| table.default_verb(&method_name));

        if resolved.is_none() && !meta.action {
            trace!(method = %method_name, "Skipping responder without verb or action flag");
            continue;
        }

        let methods = match meta.verbs {
            Some(verbs) if verbs.is_empty() => {
                return Err(Error::Build(format!(
                    "responder '{}' declares an empty verb list",
                    method_name
                )));
            }
            Some(verbs) => verbs,
            None => vec![resolved.unwrap_or(HttpMethod::GET)],
        };

        let suffix = meta
            .path
            .unwrap_or_else(|| table.default_path(&method_name));
        let name = meta
            .name
            .unwrap_or_else(|| format!("{}:{}", endpoint_name, method_name));
        let summary = meta
            .summary
            .unwrap_or_else(|| format!("{} {}", endpoint_name, title_words(&method_name)));

        let mut tags = vec![tag.clone()];
        tags.extend(meta.tags);

        let handler = if has_middlewares {
            let chain = chain.clone();
            let inner = handler;
            let wrapped: HandlerFn = Arc::new(move |request| {
                let chain = chain.clone();
                let inner = inner.clone();
                Box::pin(async move { chain.apply(request, inner).await })
            });
            wrapped
        } else {
            handler
        };

        router.add_route(Route {
            methods,
            path: format!("{}{}", prefix, suffix),
            name,
            summary,
            tags,
            handler,
        });
    }

    Ok(router)
}
