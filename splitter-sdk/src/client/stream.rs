//! Websocket consumer for the live resource streams.

use std::marker::PhantomData;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::{ClientError, endpoint};
use crate::objects::{
    Category, Currency, Expense, ExchangeRateUpdate, ExpenseStake, Group, IdSetUpdate, Person,
    ResourceUpdate, StreamTermination,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum Frame<M> {
    Update(M),
    Termination(StreamTermination),
}

/// One open stream session.
///
/// [`next`](Self::next) yields value and `still_alive` frames until the
/// server closes the socket. A terminal `error` frame is returned once as
/// [`ClientError::Rejected`] and ends the stream.
pub struct LiveStream<M> {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    finished: bool,
    _frame: PhantomData<fn() -> M>,
}

impl<M: DeserializeOwned> LiveStream<M> {
    async fn open(url: Url) -> Result<Self, ClientError> {
        let (socket, _) = connect_async(url.as_str()).await?;
        Ok(Self {
            socket,
            finished: false,
            _frame: PhantomData,
        })
    }

    /// Wait for the next frame. `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Result<M, ClientError>> {
        while !self.finished {
            let message = match self.socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => break,
            };
            match message {
                Message::Text(text) => {
                    return match serde_json::from_str::<Frame<M>>(&text) {
                        Ok(Frame::Update(update)) => Some(Ok(update)),
                        Ok(Frame::Termination(StreamTermination::Error(body))) => {
                            self.finished = true;
                            Some(Err(ClientError::Rejected(body)))
                        }
                        Err(e) => Some(Err(e.into())),
                    };
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        self.finished = true;
        None
    }

    /// Cancel the stream.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }
}

/// Opens live streams against a server's websocket base URL
/// (e.g. `ws://localhost:8080/`).
#[derive(Debug, Clone)]
pub struct StreamClient {
    base_url: Url,
}

impl StreamClient {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    async fn open<M: DeserializeOwned>(&self, segments: &[&str]) -> Result<LiveStream<M>, ClientError> {
        LiveStream::open(endpoint(&self.base_url, segments)?).await
    }

    pub async fn group(&self, id: &str) -> Result<LiveStream<ResourceUpdate<Group>>, ClientError> {
        self.open(&["groups", id, "ws"]).await
    }

    pub async fn group_ids(&self) -> Result<LiveStream<IdSetUpdate>, ClientError> {
        self.open(&["groups", "ws"]).await
    }

    pub async fn person(&self, id: &str) -> Result<LiveStream<ResourceUpdate<Person>>, ClientError> {
        self.open(&["people", id, "ws"]).await
    }

    /// Ids of the people of every group.
    pub async fn person_ids(&self) -> Result<LiveStream<IdSetUpdate>, ClientError> {
        self.open(&["people", "ws"]).await
    }

    pub async fn person_ids_in_group(
        &self,
        group_id: &str,
    ) -> Result<LiveStream<IdSetUpdate>, ClientError> {
        self.open(&["groups", group_id, "people", "ws"]).await
    }

    pub async fn category(
        &self,
        id: &str,
    ) -> Result<LiveStream<ResourceUpdate<Category>>, ClientError> {
        self.open(&["categories", id, "ws"]).await
    }

    pub async fn category_ids_in_group(
        &self,
        group_id: &str,
    ) -> Result<LiveStream<IdSetUpdate>, ClientError> {
        self.open(&["groups", group_id, "categories", "ws"]).await
    }

    pub async fn expense(&self, id: &str) -> Result<LiveStream<ResourceUpdate<Expense>>, ClientError> {
        self.open(&["expenses", id, "ws"]).await
    }

    pub async fn expense_ids_in_group(
        &self,
        group_id: &str,
    ) -> Result<LiveStream<IdSetUpdate>, ClientError> {
        self.open(&["groups", group_id, "expenses", "ws"]).await
    }

    pub async fn expense_stake(
        &self,
        id: &str,
    ) -> Result<LiveStream<ResourceUpdate<ExpenseStake>>, ClientError> {
        self.open(&["expense-stakes", id, "ws"]).await
    }

    pub async fn expense_stake_ids_in_group(
        &self,
        group_id: &str,
    ) -> Result<LiveStream<IdSetUpdate>, ClientError> {
        self.open(&["groups", group_id, "stakes", "ws"]).await
    }

    pub async fn expense_stake_ids_in_expense(
        &self,
        expense_id: &str,
    ) -> Result<LiveStream<IdSetUpdate>, ClientError> {
        self.open(&["expenses", expense_id, "stakes", "ws"]).await
    }

    pub async fn category_ids_for_expense(
        &self,
        expense_id: &str,
    ) -> Result<LiveStream<IdSetUpdate>, ClientError> {
        self.open(&["expenses", expense_id, "categories", "ws"]).await
    }

    pub async fn expense_ids_for_category(
        &self,
        category_id: &str,
    ) -> Result<LiveStream<IdSetUpdate>, ClientError> {
        self.open(&["categories", category_id, "expenses", "ws"]).await
    }

    pub async fn currency(
        &self,
        id: &str,
    ) -> Result<LiveStream<ResourceUpdate<Currency>>, ClientError> {
        self.open(&["currencies", id, "ws"]).await
    }

    pub async fn currency_ids(&self) -> Result<LiveStream<IdSetUpdate>, ClientError> {
        self.open(&["currencies", "ws"]).await
    }

    /// Stream the rate converting one unit of `source` into `destination`.
    pub async fn exchange_rate(
        &self,
        source_currency_id: &str,
        destination_currency_id: &str,
    ) -> Result<LiveStream<ExchangeRateUpdate>, ClientError> {
        let mut url = endpoint(&self.base_url, &["exchange-rate", "ws"])?;
        url.query_pairs_mut()
            .append_pair("source", source_currency_id)
            .append_pair("destination", destination_currency_id);
        LiveStream::open(url).await
    }
}
