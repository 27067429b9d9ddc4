//! Action router: the single entry point for extension requests.
//!
//! Each request is classified by its action tag and answered exactly once
//! through its [`Reply`]. Local actions answer before [`ActionRouter::handle`]
//! returns; network actions answer later from a spawned task, and `handle`
//! returns [`Dispatch::Pending`] so the transport keeps the reply channel
//! open.

use std::sync::Arc;

use shared::{ArchiveApi, Response, ResponseData, Result, SearchQuery, SettingsStore};
use tracing::{debug, info, warn};

use crate::reply::{self, Reply};
use crate::request::{Action, Request, Timing};

pub const PING_MESSAGE: &str = "Marchiver extension is active";

/// What the caller should expect after [`ActionRouter::handle`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The response has already been sent.
    Replied,
    /// The response will be sent later; keep the reply channel open.
    Pending,
}

pub struct ActionRouter<A, S> {
    api: Arc<A>,
    settings: Arc<S>,
}

impl<A, S> Clone for ActionRouter<A, S> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<A, S> ActionRouter<A, S>
where
    A: ArchiveApi + 'static,
    S: SettingsStore + 'static,
{
    pub fn new(api: Arc<A>, settings: Arc<S>) -> Self {
        Self { api, settings }
    }

    /// Route `request` and answer it through `reply`.
    ///
    /// The request is only read; the spawned work owns a parsed copy.
    pub async fn handle(&self, request: &Request, reply: Reply) -> Dispatch {
        let action = match Action::parse(request) {
            Ok(action) => action,
            Err(e) => {
                warn!(action = %request.action, kind = e.kind(), error = %e, "Rejected request");
                reply.send(e.into());
                return Dispatch::Replied;
            }
        };

        debug!(action = action.name(), "Dispatching request");

        match action.timing() {
            Timing::Immediate => {
                let response = self.execute(action).await;
                reply.send(response);
                Dispatch::Replied
            }
            Timing::Deferred => {
                let router = self.clone();
                tokio::spawn(async move {
                    let response = router.execute(action).await;
                    reply.send(response);
                });
                Dispatch::Pending
            }
        }
    }

    /// Route `request` and wait for its response.
    pub async fn dispatch(&self, request: &Request) -> Response {
        let (reply, rx) = reply::channel();
        self.handle(request, reply).await;
        rx.await
            .unwrap_or_else(|_| Response::failure("Internal error: reply channel closed"))
    }

    async fn execute(&self, action: Action) -> Response {
        let name = action.name();
        match self.run(action).await {
            Ok(data) => {
                info!(action = name, "Request succeeded");
                Response::success(data)
            }
            Err(e) => {
                warn!(action = name, kind = e.kind(), status = ?e.status(), error = %e, "Request failed");
                e.into()
            }
        }
    }

    async fn run(&self, action: Action) -> Result<ResponseData> {
        match action {
            Action::Ping => Ok(ResponseData::Message(PING_MESSAGE.to_string())),
            Action::GetApiEndpoint => {
                let settings = self.settings.load().await?;
                Ok(ResponseData::ApiEndpoint(settings.api_base().to_string()))
            }
            Action::SavePage { url, summarize } => {
                let settings = self.settings.load().await?;
                let summarize = summarize.unwrap_or(false) || settings.auto_summarize;
                let doc = self.api.fetch_and_save(&settings, &url, summarize).await?;
                Ok(doc.into())
            }
            Action::SummarizePage { url } => {
                let settings = self.settings.load().await?;
                let doc = self.api.fetch_and_save(&settings, &url, true).await?;
                Ok(doc.into())
            }
            Action::Search {
                query,
                semantic,
                limit,
                offset,
            } => {
                let settings = self.settings.load().await?;
                let query = SearchQuery {
                    text: query,
                    semantic,
                    limit: limit.unwrap_or(settings.max_results),
                    offset,
                };
                let docs = self.api.query(&settings, &query).await?;
                Ok(docs.into())
            }
            Action::GetDocument { id } => {
                let settings = self.settings.load().await?;
                Ok(self.api.get_document(&settings, &id).await?.into())
            }
            Action::UpdateDocument { id, update } => {
                let settings = self.settings.load().await?;
                Ok(self.api.update_document(&settings, &id, &update).await?.into())
            }
            Action::GetSimilar { id } => {
                let settings = self.settings.load().await?;
                Ok(self.api.similar_documents(&settings, &id).await?.into())
            }
            Action::CheckHealth => {
                let settings = self.settings.load().await?;
                Ok(ResponseData::Healthy(self.api.health(&settings).await?))
            }
            Action::GetSettings => Ok(self.settings.load().await?.into()),
            Action::SaveSettings { patch } => Ok(self.settings.update(patch).await?.into()),
            Action::ResetSettings => Ok(self.settings.reset().await?.into()),
        }
    }
}
