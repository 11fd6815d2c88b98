// src/subgraph.rs
use eyre::{eyre, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{str::FromStr, time::Duration};
use tracing::debug;

const TOKEN_DATA_QUERY: &str = r#"
query GetTokenData($tokenAddress: String!) {
  token(id: $tokenAddress) {
    id
    name
    symbol
    decimals
    totalSupply
    txCount
    volume
    volumeUSD
    totalValueLocked
    totalValueLockedUSD
    tokenDayData(first: 7, orderBy: date, orderDirection: desc) {
      date
      volume
      volumeUSD
      totalValueLocked
      totalValueLockedUSD
      priceUSD
    }
  }
}
"#;

const TOKEN_TRANSFERS_QUERY: &str = r#"
query GetTokenTransfers($tokenAddress: String!, $first: Int = 10) {
  transfers: mints(
    first: $first
    orderBy: timestamp
    orderDirection: desc
    where: { token: $tokenAddress }
  ) {
    id
    timestamp
    token {
      symbol
    }
    amount
    amountUSD
    transaction {
      id
    }
  }
}
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDayData {
    pub date: i64,
    pub volume: String,
    #[serde(rename = "volumeUSD")]
    pub volume_usd: String,
    #[serde(rename = "totalValueLocked")]
    pub total_value_locked: String,
    #[serde(rename = "totalValueLockedUSD")]
    pub total_value_locked_usd: String,
    #[serde(rename = "priceUSD")]
    pub price_usd: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenData {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub decimals: String,
    #[serde(rename = "totalSupply")]
    pub total_supply: String,
    #[serde(rename = "txCount")]
    pub tx_count: String,
    pub volume: String,
    #[serde(rename = "volumeUSD")]
    pub volume_usd: String,
    #[serde(rename = "totalValueLocked")]
    pub total_value_locked: String,
    #[serde(rename = "totalValueLockedUSD")]
    pub total_value_locked_usd: String,
    #[serde(rename = "tokenDayData", default)]
    pub token_day_data: Vec<TokenDayData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRef {
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub id: String,
    pub timestamp: String,
    pub token: TokenRef,
    pub amount: String,
    #[serde(rename = "amountUSD")]
    pub amount_usd: String,
    pub transaction: TransactionRef,
}

/// A mapping entity as served by the subgraph (BigInts arrive as strings)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntity {
    pub id: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    pub value: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockTimestamp")]
    pub block_timestamp: String,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
}

/// Entity collections written by the event mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCollection {
    Transfers,
    Burns,
    Freezes,
    Unfreezes,
}

impl EventCollection {
    fn field(self) -> &'static str {
        match self {
            Self::Transfers => "transfers",
            Self::Burns => "burns",
            Self::Freezes => "freezes",
            Self::Unfreezes => "unfreezes",
        }
    }

    fn query(self) -> String {
        let to = if self == Self::Transfers { "to" } else { "" };
        format!(
            "query RecentEvents($first: Int!) {{ {}(first: $first, orderBy: blockNumber, orderDirection: desc) {{ id from {} value blockNumber blockTimestamp transactionHash }} }}",
            self.field(),
            to
        )
    }
}

impl FromStr for EventCollection {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "transfers" => Ok(Self::Transfers),
            "burns" => Ok(Self::Burns),
            "freezes" => Ok(Self::Freezes),
            "unfreezes" => Ok(Self::Unfreezes),
            other => Err(eyre!("Unknown event collection {:?}", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

fn into_data<T>(resp: GraphQlResponse<T>) -> Result<T> {
    if !resp.errors.is_empty() {
        let messages: Vec<_> = resp.errors.into_iter().map(|e| e.message).collect();
        return Err(eyre!("Subgraph query failed: {}", messages.join("; ")));
    }
    resp.data.ok_or_else(|| eyre!("Subgraph returned no data"))
}

async fn query<T: DeserializeOwned>(url: &str, query: &str, variables: Value) -> Result<T> {
    let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
    debug!("Subgraph query → {} ({})", url, variables);

    let resp: GraphQlResponse<T> = client
        .post(url)
        .json(&json!({ "query": query, "variables": variables }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    into_data(resp)
}

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    token: Option<TokenData>,
}

#[derive(Debug, Deserialize)]
struct TransfersEnvelope {
    transfers: Vec<TokenTransfer>,
}

/// Token totals plus the last seven days of activity; `None` if not indexed.
pub async fn token_data(url: &str, token: &str) -> Result<Option<TokenData>> {
    let envelope: TokenEnvelope = query(
        url,
        TOKEN_DATA_QUERY,
        json!({ "tokenAddress": token.to_lowercase() }),
    )
    .await?;
    Ok(envelope.token)
}

pub async fn token_transfers(url: &str, token: &str, first: u32) -> Result<Vec<TokenTransfer>> {
    let envelope: TransfersEnvelope = query(
        url,
        TOKEN_TRANSFERS_QUERY,
        json!({ "tokenAddress": token.to_lowercase(), "first": first }),
    )
    .await?;
    Ok(envelope.transfers)
}

pub async fn recent_events(
    url: &str,
    collection: EventCollection,
    first: u32,
) -> Result<Vec<EventEntity>> {
    let mut data: serde_json::Map<String, Value> =
        query(url, &collection.query(), json!({ "first": first })).await?;
    let rows = data
        .remove(collection.field())
        .ok_or_else(|| eyre!("Subgraph response lacks {}", collection.field()))?;
    Ok(serde_json::from_value(rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphql_errors_are_reported() {
        let resp: GraphQlResponse<TokenEnvelope> = serde_json::from_str(
            r#"{"errors":[{"message":"indexing error"},{"message":"bad block"}]}"#,
        )
        .unwrap();
        let err = into_data(resp).unwrap_err().to_string();
        assert!(err.contains("indexing error; bad block"));
    }

    #[test]
    fn parses_token_data() {
        let resp: GraphQlResponse<TokenEnvelope> = serde_json::from_str(
            r#"{"data":{"token":{
                "id":"0xb8c7","name":"BNB","symbol":"BNB","decimals":"18",
                "totalSupply":"16579517","txCount":"12","volume":"1.5","volumeUSD":"900",
                "totalValueLocked":"3","totalValueLockedUSD":"1800",
                "tokenDayData":[{"date":1755388800,"volume":"1","volumeUSD":"600",
                    "totalValueLocked":"3","totalValueLockedUSD":"1800","priceUSD":"600"}]
            }}}"#,
        )
        .unwrap();
        let token = into_data(resp).unwrap().token.unwrap();
        assert_eq!(token.symbol, "BNB");
        assert_eq!(token.token_day_data[0].price_usd, "600");
    }

    #[test]
    fn missing_token_is_none() {
        let resp: GraphQlResponse<TokenEnvelope> =
            serde_json::from_str(r#"{"data":{"token":null}}"#).unwrap();
        assert!(into_data(resp).unwrap().token.is_none());
    }

    #[test]
    fn event_collection_queries() {
        assert_eq!("Burns".parse::<EventCollection>().unwrap(), EventCollection::Burns);
        assert!("mints".parse::<EventCollection>().is_err());

        let q = EventCollection::Transfers.query();
        assert!(q.contains("transfers(first: $first"));
        assert!(q.contains(" to "));
        assert!(!EventCollection::Freezes.query().contains(" to "));
    }

    #[test]
    fn parses_event_entities() {
        let rows: Vec<EventEntity> = serde_json::from_str(
            r#"[{"id":"0x01","from":"0xaa","value":"5","blockNumber":"10",
                 "blockTimestamp":"1755455364","transactionHash":"0xfeed"}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].to, None);
        assert_eq!(rows[0].block_number, "10");
    }
}
