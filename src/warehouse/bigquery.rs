//! BigQuery backend over the REST `jobs.query` / `getQueryResults` endpoints.

use crate::warehouse::error::WarehouseError;
use crate::warehouse::query::{Query, WarehouseTables};
use crate::warehouse::Warehouse;
use bon::bon;
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use polars::prelude::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const WAIT_TIMEOUT_MS: u64 = 10_000;
const PAGE_SIZE: u32 = 10_000;

pub const PROJECT_ID_VAR: &str = "BIGQUERY_PROJECT_ID";
pub const ACCESS_TOKEN_VAR: &str = "BIGQUERY_ACCESS_TOKEN";
pub const LOCATION_VAR: &str = "BIGQUERY_LOCATION";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    timeout_ms: u64,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableSchema {
    fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableFieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: Option<serde_json::Value>,
}

/// Runs the templates as BigQuery Standard SQL.
///
/// Authentication is a bearer access token (e.g. from
/// `gcloud auth print-access-token`); refreshing it is left to the caller.
pub struct BigQueryWarehouse {
    client: Client,
    base_url: String,
    project_id: String,
    access_token: String,
    location: Option<String>,
    tables: WarehouseTables,
}

#[bon]
impl BigQueryWarehouse {
    #[builder]
    pub fn new(
        #[builder(into)] project_id: String,
        #[builder(into)] access_token: String,
        #[builder(into)] location: Option<String>,
        tables: Option<WarehouseTables>,
        #[builder(into)] base_url: Option<String>,
        /// HTTP client to reuse, e.g. one with custom timeouts or proxy settings.
        client: Option<Client>,
    ) -> Self {
        BigQueryWarehouse {
            client: client.unwrap_or_default(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            project_id,
            access_token,
            location,
            tables: tables.unwrap_or_default(),
        }
    }

    /// Reads the project, token and optional location from
    /// `BIGQUERY_PROJECT_ID`, `BIGQUERY_ACCESS_TOKEN` and `BIGQUERY_LOCATION`.
    pub fn from_env() -> Result<Self, WarehouseError> {
        let project_id = std::env::var(PROJECT_ID_VAR)
            .map_err(|_| WarehouseError::MissingSetting(PROJECT_ID_VAR))?;
        let access_token = std::env::var(ACCESS_TOKEN_VAR)
            .map_err(|_| WarehouseError::MissingSetting(ACCESS_TOKEN_VAR))?;
        Ok(Self::builder()
            .project_id(project_id)
            .access_token(access_token)
            .maybe_location(std::env::var(LOCATION_VAR).ok())
            .build())
    }

    pub fn tables(&self) -> &WarehouseTables {
        &self.tables
    }

    async fn run_sql(&self, sql: &str) -> Result<DataFrame, WarehouseError> {
        let url = format!("{}/projects/{}/queries", self.base_url, self.project_id);
        let request = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            location: self.location.as_deref(),
            timeout_ms: WAIT_TIMEOUT_MS,
            max_results: PAGE_SIZE,
        };
        debug!("Submitting query to {}: {}", url, sql);
        let mut response: QueryResponse = self
            .send(self.client.post(&url).json(&request), url)
            .await?;

        let job = response.job_reference.clone();
        while !response.job_complete {
            let job = job.as_ref().ok_or_else(|| WarehouseError::JobIncomplete {
                job_id: "<unknown>".to_string(),
            })?;
            info!("Waiting for BigQuery job {}", job.job_id);
            response = self.results_page(job, None).await?;
        }

        let schema = response.schema.clone().ok_or_else(|| WarehouseError::JobIncomplete {
            job_id: job
                .as_ref()
                .map(|j| j.job_id.clone())
                .unwrap_or_default(),
        })?;
        let mut columns = ColumnSet::new(&schema)?;
        columns.extend(&response.rows)?;

        let mut page_token = response.page_token.take();
        while let Some(token) = page_token {
            let job = job.as_ref().ok_or_else(|| WarehouseError::JobIncomplete {
                job_id: "<unknown>".to_string(),
            })?;
            let page = self.results_page(job, Some(&token)).await?;
            columns.extend(&page.rows)?;
            page_token = page.page_token;
        }

        let frame = columns.finish()?;
        info!("BigQuery returned {} rows", frame.height());
        Ok(frame)
    }

    async fn results_page(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, WarehouseError> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.base_url, self.project_id, job.job_id
        );
        let mut params: Vec<(&str, String)> = vec![
            ("timeoutMs", WAIT_TIMEOUT_MS.to_string()),
            ("maxResults", PAGE_SIZE.to_string()),
        ];
        if let Some(location) = job.location.as_ref().or(self.location.as_ref()) {
            params.push(("location", location.clone()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        self.send(self.client.get(&url).query(&params), url).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: String,
    ) -> Result<T, WarehouseError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| WarehouseError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    WarehouseError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    WarehouseError::NetworkRequest(url, e)
                });
            }
        };

        response
            .json::<T>()
            .await
            .map_err(|e| WarehouseError::ResponseDecode { url, source: e })
    }
}

impl Warehouse for BigQueryWarehouse {
    async fn execute(&self, query: &Query) -> Result<DataFrame, WarehouseError> {
        let sql = query.sql(&self.tables);
        info!("Running {} on BigQuery project {}", query, self.project_id);
        self.run_sql(&sql).await
    }
}

/// Typed column buffers for one result set.
struct ColumnSet {
    names: Vec<String>,
    buffers: Vec<Buffer>,
}

enum Buffer {
    Str(Vec<Option<String>>),
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
    /// Days since the Unix epoch.
    Date(Vec<Option<i32>>),
    /// Milliseconds since the Unix epoch.
    Datetime(Vec<Option<i64>>),
}

impl ColumnSet {
    fn new(schema: &TableSchema) -> Result<Self, WarehouseError> {
        let buffers = schema
            .fields
            .iter()
            .map(|field| match field.field_type.as_str() {
                "STRING" => Ok(Buffer::Str(Vec::new())),
                "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => Ok(Buffer::Float(Vec::new())),
                "INTEGER" | "INT64" => Ok(Buffer::Int(Vec::new())),
                "BOOLEAN" | "BOOL" => Ok(Buffer::Bool(Vec::new())),
                "DATE" => Ok(Buffer::Date(Vec::new())),
                "DATETIME" | "TIMESTAMP" => Ok(Buffer::Datetime(Vec::new())),
                other => Err(WarehouseError::UnsupportedFieldType {
                    column: field.name.clone(),
                    field_type: other.to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ColumnSet {
            names: schema.fields.iter().map(|f| f.name.clone()).collect(),
            buffers,
        })
    }

    fn extend(&mut self, rows: &[TableRow]) -> Result<(), WarehouseError> {
        for row in rows {
            let targets = self.names.iter().zip(self.buffers.iter_mut());
            for ((name, buffer), cell) in targets.zip(&row.f) {
                let raw = match &cell.v {
                    Some(serde_json::Value::String(s)) => Some(s.as_str()),
                    _ => None,
                };
                buffer.push(name, raw)?;
            }
        }
        Ok(())
    }

    fn finish(self) -> PolarsResult<DataFrame> {
        let columns = self
            .names
            .into_iter()
            .zip(self.buffers)
            .map(|(name, buffer)| buffer.into_column(&name))
            .collect::<PolarsResult<Vec<_>>>()?;
        DataFrame::new(columns)
    }
}

impl Buffer {
    fn push(&mut self, column: &str, raw: Option<&str>) -> Result<(), WarehouseError> {
        let parse_error = |field_type: &str, value: &str| WarehouseError::ValueParse {
            column: column.to_string(),
            field_type: field_type.to_string(),
            value: value.to_string(),
        };
        match self {
            Buffer::Str(values) => values.push(raw.map(str::to_string)),
            Buffer::Float(values) => values.push(
                raw.map(|v| v.parse::<f64>().map_err(|_| parse_error("FLOAT", v)))
                    .transpose()?,
            ),
            Buffer::Int(values) => values.push(
                raw.map(|v| v.parse::<i64>().map_err(|_| parse_error("INTEGER", v)))
                    .transpose()?,
            ),
            Buffer::Bool(values) => values.push(
                raw.map(|v| v.parse::<bool>().map_err(|_| parse_error("BOOLEAN", v)))
                    .transpose()?,
            ),
            Buffer::Date(values) => values.push(
                raw.map(|v| parse_date(v).ok_or_else(|| parse_error("DATE", v)))
                    .transpose()?,
            ),
            Buffer::Datetime(values) => values.push(
                raw.map(|v| parse_datetime_millis(v).ok_or_else(|| parse_error("DATETIME", v)))
                    .transpose()?,
            ),
        }
        Ok(())
    }

    fn into_column(self, name: &str) -> PolarsResult<Column> {
        let name: PlSmallStr = name.into();
        let series = match self {
            Buffer::Str(values) => Series::new(name, values),
            Buffer::Float(values) => Series::new(name, values),
            Buffer::Int(values) => Series::new(name, values),
            Buffer::Bool(values) => Series::new(name, values),
            Buffer::Date(values) => Series::new(name, values).cast(&DataType::Date)?,
            Buffer::Datetime(values) => Series::new(name, values)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        };
        Ok(series.into())
    }
}

fn parse_date(raw: &str) -> Option<i32> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    i32::try_from((date - epoch).num_days()).ok()
}

/// DATETIME values come as ISO strings, TIMESTAMP values as (possibly
/// fractional, possibly exponent-notation) seconds since the epoch.
fn parse_datetime_millis(raw: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_millis());
    }
    let seconds = raw.parse::<f64>().ok()?;
    seconds
        .is_finite()
        .then(|| (seconds * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ts;
    use crate::types::granularity::{read_temporal_keys, TemporalKey};
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    const RESPONSE: &str = r#"{
        "kind": "bigquery#queryResponse",
        "jobComplete": true,
        "jobReference": {"projectId": "p", "jobId": "job_1", "location": "US"},
        "totalRows": "2",
        "schema": {"fields": [
            {"name": "timestamp", "type": "TIMESTAMP", "mode": "NULLABLE"},
            {"name": "date", "type": "DATE"},
            {"name": "day", "type": "INTEGER"},
            {"name": "commune", "type": "STRING"},
            {"name": "emission_pm25", "type": "FLOAT"}
        ]},
        "rows": [
            {"f": [{"v": "1.4306112E9"}, {"v": "2015-05-03"}, {"v": "7"}, {"v": "Talca"}, {"v": "0.25"}]},
            {"f": [{"v": null}, {"v": null}, {"v": "1"}, {"v": "Curicó"}, {"v": null}]}
        ],
        "pageToken": "next"
    }"#;

    fn decode(body: &str) -> Result<(QueryResponse, DataFrame), WarehouseError> {
        let response: QueryResponse = serde_json::from_str(body).unwrap();
        let schema = response.schema.clone().unwrap();
        let mut columns = ColumnSet::new(&schema)?;
        columns.extend(&response.rows)?;
        Ok((response, columns.finish()?))
    }

    #[test]
    fn decodes_typed_rows() -> Result<(), WarehouseError> {
        let (response, frame) = decode(RESPONSE)?;
        assert!(response.job_complete);
        assert_eq!(response.page_token.as_deref(), Some("next"));
        assert_eq!(frame.shape(), (2, 5));

        let timestamps = read_temporal_keys(frame.column("timestamp")?)?;
        assert_eq!(
            timestamps,
            vec![Some(TemporalKey::Timestamp(ts(2015, 5, 3, 0))), None]
        );
        let dates = read_temporal_keys(frame.column("date")?)?;
        assert_eq!(
            dates[0],
            Some(TemporalKey::Date(NaiveDate::from_ymd_opt(2015, 5, 3).unwrap()))
        );
        let days: Vec<Option<i64>> = frame.column("day")?.i64()?.into_iter().collect();
        assert_eq!(days, vec![Some(7), Some(1)]);
        let emission: Vec<Option<f64>> =
            frame.column("emission_pm25")?.f64()?.into_iter().collect();
        assert_eq!(emission, vec![Some(0.25), None]);
        Ok(())
    }

    #[test]
    fn rejects_unsupported_types_and_bad_values() {
        let schema = TableSchema {
            fields: vec![TableFieldSchema {
                name: "geo".into(),
                field_type: "GEOGRAPHY".into(),
            }],
        };
        assert!(matches!(
            ColumnSet::new(&schema),
            Err(WarehouseError::UnsupportedFieldType { .. })
        ));

        let bad = RESPONSE.replace("\"0.25\"", "\"abc\"");
        assert!(matches!(
            decode(&bad),
            Err(WarehouseError::ValueParse { .. })
        ));
    }

    #[test]
    fn datetime_strings_and_epoch_seconds_agree() {
        assert_eq!(
            parse_datetime_millis("2015-05-03T00:00:00"),
            parse_datetime_millis("1430611200")
        );
        assert_eq!(
            parse_datetime_millis("2015-05-03T01:30:00.5"),
            Some(1_430_611_200_000 + 5_400_500)
        );
    }

    #[test]
    fn request_body_uses_standard_sql() {
        let body = serde_json::to_value(QueryRequest {
            query: "SELECT 1",
            use_legacy_sql: false,
            location: None,
            timeout_ms: WAIT_TIMEOUT_MS,
            max_results: PAGE_SIZE,
        })
        .unwrap();
        assert_eq!(body["useLegacySql"], serde_json::Value::Bool(false));
        assert_eq!(body["timeoutMs"], serde_json::json!(10_000));
        assert!(body.get("location").is_none());
    }

    /// Serves `bodies` as JSON, one per connection, and returns the request
    /// lines it saw.
    async fn serve(bodies: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut request_lines = Vec::new();
            for body in bodies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let head = read_request(&mut socket).await;
                request_lines.push(head.lines().next().unwrap_or_default().to_string());
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            request_lines
        });
        (base_url, handle)
    }

    /// Reads one request, body included, and returns its head.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                assert!(n > 0, "connection closed before the request head ended");
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let body_len = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < end + 4 + body_len {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before the request body ended");
                buf.extend_from_slice(&chunk[..n]);
            }
            return head;
        }
    }

    fn stub_warehouse(base_url: String) -> BigQueryWarehouse {
        BigQueryWarehouse::builder()
            .project_id("sandbox")
            .access_token("token")
            .base_url(base_url)
            .client(Client::builder().no_proxy().build().unwrap())
            .build()
    }

    const PENDING: &str = r#"{
        "jobComplete": false,
        "jobReference": {"projectId": "sandbox", "jobId": "job_9", "location": "EU"}
    }"#;

    const FIRST_PAGE: &str = r#"{
        "jobComplete": true,
        "jobReference": {"projectId": "sandbox", "jobId": "job_9", "location": "EU"},
        "schema": {"fields": [
            {"name": "commune", "type": "STRING"},
            {"name": "population", "type": "INTEGER"}
        ]},
        "rows": [{"f": [{"v": "Talca"}, {"v": "220357"}]}],
        "pageToken": "page_2"
    }"#;

    const LAST_PAGE: &str = r#"{
        "jobComplete": true,
        "rows": [
            {"f": [{"v": "Curicó"}, {"v": "149136"}]},
            {"f": [{"v": "Santiago"}, {"v": "404495"}]}
        ]
    }"#;

    #[tokio::test]
    async fn waits_for_the_job_and_follows_pages() -> Result<(), WarehouseError> {
        let (base_url, server) = serve(vec![PENDING, FIRST_PAGE, LAST_PAGE]).await;
        let frame = stub_warehouse(base_url).run_sql("SELECT 1").await?;

        let communes: Vec<Option<&str>> = frame.column("commune")?.str()?.into_iter().collect();
        assert_eq!(
            communes,
            vec![Some("Talca"), Some("Curicó"), Some("Santiago")]
        );
        let population: Vec<Option<i64>> =
            frame.column("population")?.i64()?.into_iter().collect();
        assert_eq!(population, vec![Some(220_357), Some(149_136), Some(404_495)]);

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("POST /projects/sandbox/queries "));
        assert!(requests[1].starts_with("GET /projects/sandbox/queries/job_9?"));
        assert!(requests[1].contains("location=EU"));
        assert!(!requests[1].contains("pageToken"));
        assert!(requests[2].contains("pageToken=page_2"));
        Ok(())
    }

    #[tokio::test]
    async fn pending_job_without_reference_fails() {
        let (base_url, server) = serve(vec![r#"{"jobComplete": false}"#]).await;
        let result = stub_warehouse(base_url).run_sql("SELECT 1").await;
        assert!(matches!(result, Err(WarehouseError::JobIncomplete { .. })));
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[test]
    fn builder_defaults() {
        let warehouse = BigQueryWarehouse::builder()
            .project_id("sandbox")
            .access_token("token")
            .build();
        assert_eq!(warehouse.base_url, DEFAULT_BASE_URL);
        assert_eq!(warehouse.tables(), &WarehouseTables::default());
        assert_eq!(warehouse.location, None);
    }
}
