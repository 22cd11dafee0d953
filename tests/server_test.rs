// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Integration tests driving the engine through a REST facade with
//! concurrent requests.
//!
//! These tests verify that the wallet and booking invariants hold when the
//! engine is shared by many request handlers at once.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mess_ledger_rs::{
    AccountId, BasketLine, Catalog, Engine, EngineConfig, EngineError, EntryKind, ItemId,
    MealType, MenuItem, NoopNotifier, Role,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

// === DTOs ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub account_id: u32,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub account_id: u32,
    pub meal_type: MealType,
    pub basket: Vec<BasketLine>,
    pub served_by: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_number: String,
    pub total: Decimal,
    pub new_balance: Decimal,
    pub low_balance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub account_id: u32,
    pub balance: Decimal,
    pub total_credited: Decimal,
    pub total_debited: Decimal,
    pub entry_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// === Server Setup ===

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub struct AppError(EngineError);

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidInput(_) | EngineError::InvalidBasket { .. } => {
                StatusCode::BAD_REQUEST
            }
            EngineError::InvalidRole => StatusCode::FORBIDDEN,
            EngineError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::RoomFull
            | EngineError::AlreadyAssigned
            | EngineError::NotAssignedHere
            | EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<TransactionRequest>,
) -> Result<StatusCode, AppError> {
    state.engine.create_transaction(
        AccountId(request.account_id),
        request.kind,
        request.amount,
        request.memo,
    )?;
    Ok(StatusCode::CREATED)
}

async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let receipt = state.engine.create_order(
        AccountId(request.account_id),
        request.meal_type,
        &request.basket,
        AccountId(request.served_by),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(OrderResponse {
            order_number: receipt.order.order_number.clone(),
            total: receipt.order.total,
            new_balance: receipt.new_balance,
            low_balance: receipt.low_balance,
        }),
    ))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<SummaryResponse>, AppError> {
    let summary = state.engine.wallet_summary(AccountId(id))?;
    Ok(Json(SummaryResponse {
        account_id: summary.account_id.0,
        balance: summary.balance,
        total_credited: summary.total_credited,
        total_debited: summary.total_debited,
        entry_count: summary.entry_count,
    }))
}

async fn assign_room(
    State(state): State<AppState>,
    Path((room_id, account_id)): Path<(u32, u32)>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .assign_room(mess_ledger_rs::RoomId(room_id), AccountId(account_id))?;
    Ok(StatusCode::CREATED)
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/transactions", post(create_transaction))
        .route("/orders", post(create_order))
        .route("/accounts/{id}/summary", get(get_summary))
        .route("/rooms/{room_id}/occupants/{account_id}", post(assign_room))
        .with_state(state)
}

/// Test server that binds to an ephemeral port over a pre-seeded engine.
struct TestServer {
    base_url: String,
    engine: Arc<Engine>,
}

const MANAGER: u32 = 1000;

impl TestServer {
    /// Engine seeded with `students` student accounts (ids 1..=students),
    /// one canteen manager, and a one-item menu (Tea at 10.00).
    async fn new(students: u32) -> Self {
        let catalog = Arc::new(Catalog::new());
        catalog.upsert(MenuItem {
            id: ItemId(1),
            name: "Tea".into(),
            category: "Beverages".into(),
            unit_price: "10.00".parse().unwrap(),
            available: true,
        });
        let engine = Arc::new(Engine::with_parts(
            catalog,
            Arc::new(NoopNotifier),
            EngineConfig::default(),
        ));
        for i in 1..=students {
            engine
                .register_account(AccountId(i), format!("s{i}"), Role::Student, None)
                .unwrap();
        }
        engine
            .register_account(AccountId(MANAGER), "Mani", Role::CanteenManager, None)
            .unwrap();

        let state = AppState { engine: engine.clone() };
        let app = create_router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to be ready by polling with retries
        let client = Client::new();
        let health_url = format!("{}/accounts/1/summary", base_url);
        for _ in 0..50 {
            match client.get(&health_url).send().await {
                Ok(_) => break,
                Err(_) => tokio::time::sleep(tokio::time::Duration::from_millis(50)).await,
            }
        }

        TestServer { base_url, engine }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn tea_order(account_id: u32, quantity: u32) -> OrderRequest {
    OrderRequest {
        account_id,
        meal_type: MealType::Lunch,
        basket: vec![BasketLine { item_id: ItemId(1), quantity }],
        served_by: MANAGER,
    }
}

// === Tests ===
// These tests are ignored in CI due to connection issues on some platforms.
// Run manually with: cargo test --test server_test -- --ignored

/// Concurrent top-ups to many students: every wallet ends with exactly the
/// sum of its credits.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_topups_to_many_students() {
    const NUM_STUDENTS: u32 = 25;
    const TOPUPS_PER_STUDENT: u32 = 20;

    let server = TestServer::new(NUM_STUDENTS).await;
    let client = Client::new();
    let start = Instant::now();

    let mut handles = Vec::new();
    for account_id in 1..=NUM_STUDENTS {
        for _ in 0..TOPUPS_PER_STUDENT {
            let client = client.clone();
            let url = server.url("/transactions");

            handles.push(tokio::spawn(async move {
                let request = TransactionRequest {
                    account_id,
                    kind: EntryKind::Credit,
                    amount: "10.00".parse().unwrap(),
                    memo: None,
                };
                let response = client.post(&url).json(&request).send().await.unwrap();
                response.status()
            }));
        }
    }

    let results: Vec<_> = futures::future::join_all(handles).await;
    let successful = results
        .iter()
        .filter(|r| r.as_ref().unwrap().is_success())
        .count();
    let elapsed = start.elapsed();
    let total = (NUM_STUDENTS * TOPUPS_PER_STUDENT) as usize;

    println!(
        "Processed {} top-ups in {:?} ({:.0} req/s)",
        total,
        elapsed,
        total as f64 / elapsed.as_secs_f64()
    );

    assert_eq!(successful, total, "All top-ups should succeed");

    let expected: Decimal =
        "10.00".parse::<Decimal>().unwrap() * Decimal::from(TOPUPS_PER_STUDENT);
    for account_id in 1..=NUM_STUDENTS {
        let summary = server.engine.wallet_summary(AccountId(account_id)).unwrap();
        assert_eq!(summary.balance, expected);
        assert_eq!(summary.entry_count, TOPUPS_PER_STUDENT as usize);
    }
}

/// Concurrent bookings against one wallet: only the affordable subset
/// succeeds, and the debited total exactly matches the placed orders.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_bookings_never_overdraw() {
    const NUM_BOOKINGS: u32 = 50;
    // Funds for exactly 10 single teas.
    const OPENING: &str = "100.00";

    let server = TestServer::new(1).await;
    let client = Client::new();

    server
        .engine
        .create_transaction(
            AccountId(1),
            EntryKind::Credit,
            OPENING.parse().unwrap(),
            None,
        )
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..NUM_BOOKINGS {
        let client = client.clone();
        let url = server.url("/orders");
        handles.push(tokio::spawn(async move {
            let response = client.post(&url).json(&tea_order(1, 1)).send().await.unwrap();
            response.status()
        }));
    }

    let results: Vec<_> = futures::future::join_all(handles).await;
    let created = results
        .iter()
        .filter(|r| *r.as_ref().unwrap() == StatusCode::CREATED)
        .count();
    let rejected = results
        .iter()
        .filter(|r| *r.as_ref().unwrap() == StatusCode::UNPROCESSABLE_ENTITY)
        .count();

    assert_eq!(created, 10, "Exactly the affordable bookings should succeed");
    assert_eq!(rejected, (NUM_BOOKINGS as usize) - 10);

    let summary = server.engine.wallet_summary(AccountId(1)).unwrap();
    assert_eq!(summary.balance, Decimal::ZERO);
    assert_eq!(summary.total_debited, OPENING.parse::<Decimal>().unwrap());
    assert_eq!(server.engine.orders_for_account(AccountId(1)).len(), 10);
}

/// Wallet summaries read while top-ups are in flight are always internally
/// consistent.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_reads_and_writes() {
    const NUM_WRITES: u32 = 200;
    const NUM_READS: u32 = 200;

    let server = TestServer::new(1).await;
    let client = Client::new();

    let mut handles = Vec::new();
    for _ in 0..NUM_WRITES {
        let client = client.clone();
        let url = server.url("/transactions");
        handles.push(tokio::spawn(async move {
            let request = TransactionRequest {
                account_id: 1,
                kind: EntryKind::Credit,
                amount: "1.00".parse().unwrap(),
                memo: None,
            };
            let response = client.post(&url).json(&request).send().await.unwrap();
            assert!(response.status().is_success());
        }));
    }
    for _ in 0..NUM_READS {
        let client = client.clone();
        let url = server.url("/accounts/1/summary");
        handles.push(tokio::spawn(async move {
            let response = client.get(&url).send().await.unwrap();
            assert!(response.status().is_success());
            let summary: SummaryResponse = response.json().await.unwrap();
            // Every observed snapshot is balanced.
            assert_eq!(summary.balance, summary.total_credited - summary.total_debited);
        }));
    }

    for result in futures::future::join_all(handles).await {
        result.unwrap();
    }

    let summary = server.engine.wallet_summary(AccountId(1)).unwrap();
    assert_eq!(summary.balance, Decimal::from(NUM_WRITES));
}

/// Concurrent room assignment over HTTP grants at most `capacity` slots.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_room_assignment_respects_capacity() {
    const NUM_STUDENTS: u32 = 20;
    const CAPACITY: u32 = 3;

    let server = TestServer::new(NUM_STUDENTS).await;
    let client = Client::new();
    server
        .engine
        .add_room(mess_ledger_rs::RoomId(1), "101", 1, CAPACITY)
        .unwrap();

    let mut handles = Vec::new();
    for account_id in 1..=NUM_STUDENTS {
        let client = client.clone();
        let url = server.url(&format!("/rooms/1/occupants/{account_id}"));
        handles.push(tokio::spawn(async move {
            let response = client.post(&url).send().await.unwrap();
            response.status()
        }));
    }

    let results: Vec<_> = futures::future::join_all(handles).await;
    let granted = results
        .iter()
        .filter(|r| *r.as_ref().unwrap() == StatusCode::CREATED)
        .count();
    let full = results
        .iter()
        .filter(|r| *r.as_ref().unwrap() == StatusCode::CONFLICT)
        .count();

    assert_eq!(granted, CAPACITY as usize);
    assert_eq!(full, (NUM_STUDENTS - CAPACITY) as usize);

    let room = server.engine.room(mess_ledger_rs::RoomId(1)).unwrap();
    assert_eq!(room.occupied, CAPACITY);
}

/// Engine failure modes surface as the expected HTTP statuses.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn error_paths_map_to_http_statuses() {
    let server = TestServer::new(1).await;
    let client = Client::new();

    // Unknown account: 404.
    let response = client
        .get(server.url("/accounts/99/summary"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Booking with an empty wallet: 422.
    let response = client
        .post(server.url("/orders"))
        .json(&tea_order(1, 1))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Booking for the manager: staff cannot hold a wallet, 403.
    let response = client
        .post(server.url("/orders"))
        .json(&tea_order(MANAGER, 1))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Empty basket: 400 with the reason in the body.
    let request = OrderRequest {
        account_id: 1,
        meal_type: MealType::Lunch,
        basket: vec![],
        served_by: MANAGER,
    };
    let response = client
        .post(server.url("/orders"))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.unwrap();
    assert!(body.error.contains("at least one item"));
}
