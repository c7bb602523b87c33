//! Complete REST API demo
//!
//! A ticket tracker built from convention-routed controller methods:
//! `list`, `create`, `retrieve`, `update`, and `destroy` map to their
//! CRUD verbs and paths without any per-route wiring.
//!
//! Run with: `cargo run --example rest_api`

use fastack::RequestIdMiddleware;
use fastack::logging::{LogConfig, LogFormat, LogLevel};
use fastack::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

// =============================================================================
// Domain Models
// =============================================================================

/// A ticket in the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub title: String,
    pub status: String,
}

/// Request payload for opening a ticket.
#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
}

/// Request payload for updating a ticket.
#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub status: Option<String>,
}

// =============================================================================
// Repository (In-Memory Storage)
// =============================================================================

/// In-memory ticket storage shared across requests.
#[derive(Debug, Clone, Default)]
pub struct TicketStore {
    tickets: Arc<RwLock<HashMap<u64, Ticket>>>,
    next_id: Arc<RwLock<u64>>,
}

impl TicketStore {
    /// Seed with some initial data.
    pub fn with_seed_data() -> Self {
        let store = Self::default();
        {
            let mut tickets = store.tickets.write().unwrap();
            tickets.insert(
                1,
                Ticket {
                    id: 1,
                    title: "Fix login redirect".to_string(),
                    status: "open".to_string(),
                },
            );
            tickets.insert(
                2,
                Ticket {
                    id: 2,
                    title: "Upgrade billing webhook".to_string(),
                    status: "closed".to_string(),
                },
            );
            *store.next_id.write().unwrap() = 3;
        }
        store
    }

    pub fn all(&self) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self.tickets.read().unwrap().values().cloned().collect();
        tickets.sort_by_key(|ticket| ticket.id);
        tickets
    }

    pub fn find(&self, id: u64) -> Option<Ticket> {
        self.tickets.read().unwrap().get(&id).cloned()
    }

    pub fn create(&self, title: String) -> Ticket {
        let mut next_id = self.next_id.write().unwrap();
        let id = *next_id;
        *next_id += 1;

        let ticket = Ticket {
            id,
            title,
            status: "open".to_string(),
        };
        self.tickets.write().unwrap().insert(id, ticket.clone());
        ticket
    }

    pub fn update(&self, id: u64, update: UpdateTicketRequest) -> Option<Ticket> {
        let mut tickets = self.tickets.write().unwrap();
        let ticket = tickets.get_mut(&id)?;
        if let Some(title) = update.title {
            ticket.title = title;
        }
        if let Some(status) = update.status {
            ticket.status = status;
        }
        Some(ticket.clone())
    }

    pub fn delete(&self, id: u64) -> bool {
        self.tickets.write().unwrap().remove(&id).is_some()
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Named "ticket" by derivation, so its routes live under `/ticket`.
struct TicketController {
    store: TicketStore,
}

impl TicketController {
    fn new(store: TicketStore) -> Self {
        Self { store }
    }

    fn parse_id(request: &HttpRequest) -> Result<u64, Error> {
        request
            .param("id")
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| Error::BadRequest("Invalid ticket id".to_string()))
    }
}

#[async_trait::async_trait]
impl ListEndpoint for TicketController {
    /// GET /ticket
    async fn list(&self, _request: HttpRequest) -> Result<HttpResponse, Error> {
        HttpResponse::json(&self.store.all())
    }
}

#[async_trait::async_trait]
impl CreateEndpoint for TicketController {
    /// POST /ticket
    async fn create(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let payload: CreateTicketRequest = request.json()?;
        if payload.title.trim().is_empty() {
            return Err(Error::Validation("Title is required".to_string()));
        }

        let ticket = self.store.create(payload.title);
        HttpResponse::created().with_json(&ticket)
    }
}

#[async_trait::async_trait]
impl RetrieveEndpoint for TicketController {
    /// GET /ticket/{id}
    async fn retrieve(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let id = Self::parse_id(&request)?;
        match self.store.find(id) {
            Some(ticket) => HttpResponse::json(&ticket),
            None => Err(Error::NotFound(format!("Ticket {id} not found"))),
        }
    }
}

#[async_trait::async_trait]
impl UpdateEndpoint for TicketController {
    /// PUT /ticket/{id}
    async fn update(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let id = Self::parse_id(&request)?;
        let payload: UpdateTicketRequest = request.json()?;
        match self.store.update(id, payload) {
            Some(ticket) => HttpResponse::json(&ticket),
            None => Err(Error::NotFound(format!("Ticket {id} not found"))),
        }
    }
}

#[async_trait::async_trait]
impl DestroyEndpoint for TicketController {
    /// DELETE /ticket/{id}
    async fn destroy(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let id = Self::parse_id(&request)?;
        if self.store.delete(id) {
            Ok(HttpResponse::no_content())
        } else {
            Err(Error::NotFound(format!("Ticket {id} not found")))
        }
    }
}

impl Controller for TicketController {
    fn responders(self: Arc<Self>) -> Vec<Responder> {
        vec![
            Arc::clone(&self).list_responder(),
            Arc::clone(&self).create_responder(),
            Arc::clone(&self).retrieve_responder(),
            Arc::clone(&self).update_responder(),
            Arc::clone(&self).destroy_responder(),
        ]
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _guard = LogConfig::new()
        .level(LogLevel::Info)
        .format(LogFormat::Pretty)
        .with_colors(true)
        .init();

    let app = App::builder()
        .config(
            AppConfig::new()
                .title("Ticket API")
                .description("Convention-routed ticket tracker")
                .version("1.0.0"),
        )
        .include_controller(TicketController::new(TicketStore::with_seed_data()))?
        .add_middleware(RequestIdMiddleware)
        .exception_kind(ErrorKind::NotFound, |error, _ctx| {
            HttpResponse::detail(&error.to_string(), 404).ok()
        })
        .exception_kind(ErrorKind::Validation, |error, _ctx| {
            HttpResponse::detail(&error.to_string(), 422).ok()
        })
        .build();

    println!("Ticket API running at http://127.0.0.1:3000");
    println!("Try these endpoints:");
    println!("  GET    /ticket      - List tickets");
    println!("  POST   /ticket      - Open a ticket");
    println!("  GET    /ticket/1    - Get a ticket");
    println!("  PUT    /ticket/1    - Update a ticket");
    println!("  DELETE /ticket/1    - Close out a ticket");

    app.serve(3000).await
}
