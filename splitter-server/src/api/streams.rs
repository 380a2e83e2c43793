//! Live resource streams.
//!
//! Every endpoint upgrades to a websocket and runs one session: the
//! current value first, then a new frame per change and a `still_alive`
//! frame after each quiet heartbeat period.
//!
//! # Endpoints
//!
//! - `GET /groups/ws`, `/groups/{id}/ws`
//! - `GET /people/ws`, `/groups/{id}/people/ws`, `/people/{id}/ws`
//! - `GET /groups/{id}/categories/ws`, `/categories/{id}/ws`
//! - `GET /groups/{id}/expenses/ws`, `/expenses/{id}/ws`
//! - `GET /groups/{id}/stakes/ws`, `/expenses/{id}/stakes/ws`, `/expense-stakes/{id}/ws`
//! - `GET /expenses/{id}/categories/ws`, `/categories/{id}/expenses/ws`
//! - `GET /currencies/ws`, `/currencies/{id}/ws`
//! - `GET /exchange-rate/ws?source=…&destination=…`

use crate::api::session::{Session, invalid_argument};
use crate::state::AppState;
use axum::{
    Router,
    extract::{
        Path, Query, State,
        ws::WebSocketUpgrade,
    },
    response::Response,
    routing::get,
};
use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use splitter_core::entities::category::{CategoryRecord, ListCategoryIdsInGroup};
use splitter_core::entities::currency::{CurrencyRecord, ListCurrencyIds};
use splitter_core::entities::expense::{ExpenseRecord, ListExpenseIdsInGroup};
use splitter_core::entities::expense_category_relation::{
    ListCategoryIdsForExpense, ListExpenseIdsForCategory,
};
use splitter_core::entities::expense_stake::{
    ExpenseStakeRecord, ListExpenseStakeIdsInExpense, ListExpenseStakeIdsInGroup,
};
use splitter_core::entities::group::{GroupRecord, ListGroupIds};
use splitter_core::entities::person::{ListPersonIds, ListPersonIdsInGroup, PersonRecord};
use splitter_core::entities::{GetById, Record, ResourceKind};
use splitter_core::events::{SubjectRouter, Token, is_valid_token};
use splitter_core::framework::DatabaseProcessor;
use splitter_core::streaming::{
    DerivedStream, ResourceStream, StreamError, exchange_rate_patterns,
};
use splitter_sdk::objects::{
    Category, Currency, ExchangeRateUpdate, Expense, ExpenseStake, Group, IdSetUpdate, Person,
    ResourceUpdate,
};
use tracing::Instrument;
use uuid::Uuid;

/// Build the stream router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups/ws", get(group_ids))
        .route("/groups/{id}/ws", get(group))
        .route("/people/ws", get(person_ids))
        .route("/groups/{id}/people/ws", get(person_ids_in_group))
        .route("/people/{id}/ws", get(person))
        .route("/groups/{id}/categories/ws", get(category_ids_in_group))
        .route("/categories/{id}/ws", get(category))
        .route("/groups/{id}/expenses/ws", get(expense_ids_in_group))
        .route("/expenses/{id}/ws", get(expense))
        .route("/groups/{id}/stakes/ws", get(stake_ids_in_group))
        .route("/expenses/{id}/stakes/ws", get(stake_ids_in_expense))
        .route("/expense-stakes/{id}/ws", get(expense_stake))
        .route("/expenses/{id}/categories/ws", get(category_ids_for_expense))
        .route("/categories/{id}/expenses/ws", get(expense_ids_for_category))
        .route("/currencies/ws", get(currency_ids))
        .route("/currencies/{id}/ws", get(currency))
        .route("/exchange-rate/ws", get(exchange_rate))
}

// ---------------------------------------------------------------------------
// Single resources
// ---------------------------------------------------------------------------

async fn group(state: State<AppState>, Path(id): Path<String>, ws: WebSocketUpgrade) -> Response {
    single::<GroupRecord, Group>(state.0, id, ws)
}

async fn person(state: State<AppState>, Path(id): Path<String>, ws: WebSocketUpgrade) -> Response {
    single::<PersonRecord, Person>(state.0, id, ws)
}

async fn category(
    state: State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    single::<CategoryRecord, Category>(state.0, id, ws)
}

async fn expense(
    state: State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    single::<ExpenseRecord, Expense>(state.0, id, ws)
}

async fn expense_stake(
    state: State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    single::<ExpenseStakeRecord, ExpenseStake>(state.0, id, ws)
}

async fn currency(
    state: State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    single::<CurrencyRecord, Currency>(state.0, id, ws)
}

/// Stream one row of `R`, sent as `T`.
///
/// The scope of a row is unknown before it is loaded, so every scope
/// segment of the subscription is a wildcard.
fn single<R, T>(state: AppState, id: String, ws: WebSocketUpgrade) -> Response
where
    R: Record,
    T: From<R> + Serialize + Send + 'static,
{
    let kind = R::KIND;
    let span = session_span(kind, "resource", &[id.as_str()]);
    ws.on_upgrade(move |socket| {
        async move {
            let session = Session::open(socket, state.shutdown.clone());
            if !is_valid_token(&id) {
                session.fail(invalid_argument("id")).await;
                return;
            }
            let scope = vec![Token::Any; kind.table().scope_columns.len()];
            let pattern = state.router.resource_pattern(kind, &scope, &id);
            let db = state.db.clone();
            let fetch = move || {
                let db = db.clone();
                let id = id.clone();
                async move {
                    let record = db.process(GetById::<R>::new(id)).await?;
                    Ok::<_, StreamError>(record.map(T::from))
                }
            };
            run_resource::<ResourceUpdate<T>, _, _>(session, &state, pattern, fetch).await;
        }
        .instrument(span)
    })
}

// ---------------------------------------------------------------------------
// Id sets
// ---------------------------------------------------------------------------

async fn group_ids(state: State<AppState>, ws: WebSocketUpgrade) -> Response {
    let pattern = state.router.scoped_wildcard(ResourceKind::Group, &[]);
    id_set(state.0, ws, IdSetScope::unscoped(ResourceKind::Group, pattern), ListGroupIds)
}

async fn currency_ids(state: State<AppState>, ws: WebSocketUpgrade) -> Response {
    let pattern = state.router.scoped_wildcard(ResourceKind::Currency, &[]);
    id_set(
        state.0,
        ws,
        IdSetScope::unscoped(ResourceKind::Currency, pattern),
        ListCurrencyIds,
    )
}

async fn person_ids(state: State<AppState>, ws: WebSocketUpgrade) -> Response {
    let pattern = all_people_pattern(&state.router);
    id_set(state.0, ws, IdSetScope::unscoped(ResourceKind::Person, pattern), ListPersonIds)
}

async fn person_ids_in_group(
    state: State<AppState>,
    Path(group_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let scope = IdSetScope::new(&state, ResourceKind::Person, &group_id, |router, id| {
        router.scoped_wildcard(ResourceKind::Person, &[Token::Id(id)])
    });
    id_set(state.0, ws, scope, ListPersonIdsInGroup { group_id })
}

async fn category_ids_in_group(
    state: State<AppState>,
    Path(group_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let scope = IdSetScope::new(&state, ResourceKind::Category, &group_id, |router, id| {
        router.scoped_wildcard(ResourceKind::Category, &[Token::Id(id)])
    });
    id_set(state.0, ws, scope, ListCategoryIdsInGroup { group_id })
}

async fn expense_ids_in_group(
    state: State<AppState>,
    Path(group_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let scope = IdSetScope::new(&state, ResourceKind::Expense, &group_id, |router, id| {
        router.scoped_wildcard(ResourceKind::Expense, &[Token::Id(id)])
    });
    id_set(state.0, ws, scope, ListExpenseIdsInGroup { group_id })
}

async fn stake_ids_in_group(
    state: State<AppState>,
    Path(group_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let scope = IdSetScope::new(
        &state,
        ResourceKind::ExpenseStake,
        &group_id,
        stake_ids_in_group_pattern,
    );
    id_set(state.0, ws, scope, ListExpenseStakeIdsInGroup { group_id })
}

async fn stake_ids_in_expense(
    state: State<AppState>,
    Path(expense_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let scope = IdSetScope::new(&state, ResourceKind::ExpenseStake, &expense_id, |router, id| {
        router.scoped_wildcard(ResourceKind::ExpenseStake, &[Token::Any, Token::Id(id)])
    });
    id_set(state.0, ws, scope, ListExpenseStakeIdsInExpense { expense_id })
}

async fn category_ids_for_expense(
    state: State<AppState>,
    Path(expense_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let kind = ResourceKind::ExpenseCategoryRelation;
    let scope = IdSetScope::new(&state, kind, &expense_id, |router, id| {
        router.scoped_wildcard(kind, &[Token::Any, Token::Id(id)])
    });
    id_set(state.0, ws, scope, ListCategoryIdsForExpense { expense_id })
}

async fn expense_ids_for_category(
    state: State<AppState>,
    Path(category_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let kind = ResourceKind::ExpenseCategoryRelation;
    let scope = IdSetScope::new(&state, kind, &category_id, |router, id| {
        router.resource_pattern(kind, &[Token::Any, Token::Any], id)
    });
    id_set(state.0, ws, scope, ListExpenseIdsForCategory { category_id })
}

/// People of every group.
fn all_people_pattern(router: &SubjectRouter) -> String {
    router.scoped_wildcard(ResourceKind::Person, &[])
}

/// Stakes of every expense in `group_id`.
fn stake_ids_in_group_pattern(router: &SubjectRouter, group_id: &str) -> String {
    router.scoped_wildcard(ResourceKind::ExpenseStake, &[Token::Id(group_id)])
}

/// Subscription of an id-set stream, or the reason it cannot be built.
struct IdSetScope {
    kind: ResourceKind,
    scope_id: Option<String>,
    pattern: Option<String>,
}

impl IdSetScope {
    fn unscoped(kind: ResourceKind, pattern: String) -> Self {
        Self {
            kind,
            scope_id: None,
            pattern: Some(pattern),
        }
    }

    fn new(
        state: &AppState,
        kind: ResourceKind,
        scope_id: &str,
        pattern: impl FnOnce(&SubjectRouter, &str) -> String,
    ) -> Self {
        Self {
            kind,
            scope_id: Some(scope_id.to_string()),
            pattern: is_valid_token(scope_id).then(|| pattern(&state.router, scope_id)),
        }
    }
}

/// Stream the ids returned by `query`. An empty set is a valid value, so
/// these streams never end with not-found.
fn id_set<Q>(state: AppState, ws: WebSocketUpgrade, scope: IdSetScope, query: Q) -> Response
where
    Q: Clone + Send + Sync + 'static,
    DatabaseProcessor: Processor<Q, Output = Vec<String>, Error = sqlx::Error>,
{
    let ids: Vec<&str> = scope.scope_id.as_deref().into_iter().collect();
    let span = session_span(scope.kind, "ids", &ids);
    ws.on_upgrade(move |socket| {
        async move {
            let session = Session::open(socket, state.shutdown.clone());
            let Some(pattern) = scope.pattern else {
                session.fail(invalid_argument("scope id")).await;
                return;
            };
            let db = state.db.clone();
            let fetch = move || {
                let db = db.clone();
                let query = query.clone();
                async move { Ok::<_, StreamError>(Some(db.process(query).await?)) }
            };
            run_resource::<IdSetUpdate, _, _>(session, &state, pattern, fetch).await;
        }
        .instrument(span)
    })
}

// ---------------------------------------------------------------------------
// Exchange rate
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExchangeRateQuery {
    source: String,
    destination: String,
}

async fn exchange_rate(
    state: State<AppState>,
    Query(query): Query<ExchangeRateQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let state = state.0;
    let span = session_span(
        ResourceKind::Currency,
        "exchange_rate",
        &[query.source.as_str(), query.destination.as_str()],
    );
    ws.on_upgrade(move |socket| {
        async move {
            let mut session = Session::open(socket, state.shutdown.clone());
            let ExchangeRateQuery {
                source,
                destination,
            } = query;
            if !is_valid_token(&source) || !is_valid_token(&destination) {
                session
                    .fail(invalid_argument("source or destination"))
                    .await;
                return;
            }
            let patterns = exchange_rate_patterns(&state.router, &source, &destination);
            let rates = state.rates.clone();
            let compute = move || {
                let rates = rates.clone();
                let source = source.clone();
                let destination = destination.clone();
                async move { rates.current(&source, &destination).await }
            };
            let stream = DerivedStream::new(state.bus.clone(), state.streaming.get());
            let done = session.done();
            let result = stream
                .run::<ExchangeRateUpdate, _, _, _, _>(patterns, compute, &mut session.sink, done)
                .await;
            session.finish(result, &state.error_domain).await;
        }
        .instrument(span)
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn run_resource<M, F, Fut>(mut session: Session, state: &AppState, pattern: String, fetch: F)
where
    M: splitter_core::streaming::LiveMessage + Serialize,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<M::Value>, StreamError>> + Send,
{
    let stream = ResourceStream::new(state.bus.clone(), state.streaming.get());
    let done = session.done();
    let result = stream
        .run::<M, _, _, _, _>(pattern, fetch, &mut session.sink, done)
        .await;
    session.finish(result, &state.error_domain).await;
}

fn session_span(kind: ResourceKind, stream: &'static str, ids: &[&str]) -> tracing::Span {
    tracing::info_span!(
        "stream_session",
        session = %Uuid::now_v7(),
        %kind,
        stream,
        ids = ?ids,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitter_core::events::{EventKind, subject_matches};

    fn router() -> SubjectRouter {
        SubjectRouter::new("splitter").unwrap()
    }

    #[test]
    fn test_all_people_pattern_spans_groups() {
        let r = router();
        let pattern = all_people_pattern(&r);
        for group in ["grp-1", "grp-2"] {
            let subject = r.subject(ResourceKind::Person, &[group], "per-1", EventKind::Created);
            assert!(subject_matches(&pattern, &subject), "{pattern} vs {subject}");
        }
        let category = r.subject(ResourceKind::Category, &["grp-1"], "cat-1", EventKind::Created);
        assert!(!subject_matches(&pattern, &category));
    }

    #[test]
    fn test_stake_ids_in_group_pattern_covers_every_expense() {
        let r = router();
        let pattern = stake_ids_in_group_pattern(&r, "grp-1");
        for expense in ["exp-1", "exp-2"] {
            let subject = r.subject(
                ResourceKind::ExpenseStake,
                &["grp-1", expense],
                "stk-1",
                EventKind::Deleted,
            );
            assert!(subject_matches(&pattern, &subject), "{pattern} vs {subject}");
        }
        let other_group = r.subject(
            ResourceKind::ExpenseStake,
            &["grp-2", "exp-1"],
            "stk-1",
            EventKind::Updated,
        );
        assert!(!subject_matches(&pattern, &other_group));
    }
}
